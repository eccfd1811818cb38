//! Client-side media caching and lazy loading for video listings.
//!
//! [`cache::TimeBoundedCache`] memoizes video lists, single videos and
//! thumbnails with a fixed TTL, persisting a JSON snapshot through a
//! [`host::DurableStorage`]. [`media::LazyMediaController`] defers media loads
//! until placeholders become visible and adapts quality to network and device
//! signals supplied by a [`host::MediaHost`].

pub mod cache;
pub mod config;
pub mod error;
pub mod host;
pub mod media;
pub mod telemetry;
