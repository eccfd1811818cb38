//! Namespaced accessors for the video listing caches.

use std::fmt::Display;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::join_all;
use tracing::{debug, warn};

use super::TimeBoundedCache;
use crate::error::LoadError;
use crate::host::ImageLoader;
use crate::media::{extract_provider_id, thumbnail_url, MediaDescriptor, Provider, ThumbnailQuality};

pub fn videos_key(site_id: impl Display) -> String {
    format!("videos_{site_id}")
}

pub fn video_key(video_id: impl Display) -> String {
    format!("video_{video_id}")
}

pub fn thumbnail_key(source_url: &str) -> String {
    thumbnail_tier_key(source_url, ThumbnailQuality::Standard)
}

/// Key of the memoized thumbnail for one tier. The standard tier keeps the
/// bare `thumbnail_` prefix shared with [`preload_thumbnails`].
pub fn thumbnail_tier_key(source_url: &str, quality: ThumbnailQuality) -> String {
    let encoded = STANDARD.encode(source_url);
    match quality {
        ThumbnailQuality::Low => format!("thumbnail_low_{encoded}"),
        ThumbnailQuality::Standard => format!("thumbnail_{encoded}"),
        ThumbnailQuality::High => format!("thumbnail_high_{encoded}"),
    }
}

impl TimeBoundedCache {
    pub fn cached_videos(&mut self, site_id: impl Display) -> Option<Vec<MediaDescriptor>> {
        self.get_as(&videos_key(site_id))
    }

    pub fn set_cached_videos(&mut self, site_id: impl Display, videos: &[MediaDescriptor]) {
        self.set_as(videos_key(site_id), videos);
    }

    pub fn cached_video(&mut self, video_id: impl Display) -> Option<MediaDescriptor> {
        self.get_as(&video_key(video_id))
    }

    pub fn set_cached_video(&mut self, video: &MediaDescriptor) {
        self.set_as(video_key(&video.id), video);
    }

    /// Drop one site's listing, or everything when no site is given.
    pub fn invalidate_videos(&mut self, site_id: Option<&str>) {
        match site_id {
            Some(site_id) => {
                self.delete(&videos_key(site_id));
            }
            None => self.clear(),
        }
    }

    pub fn cached_thumbnail(&mut self, source_url: &str) -> Option<String> {
        self.get_as(&thumbnail_key(source_url))
    }

    pub fn set_cached_thumbnail(&mut self, source_url: &str, thumbnail: &str) {
        self.set_as(thumbnail_key(source_url), thumbnail);
    }

    pub fn cached_thumbnail_tier(
        &mut self,
        source_url: &str,
        quality: ThumbnailQuality,
    ) -> Option<String> {
        self.get_as(&thumbnail_tier_key(source_url, quality))
    }

    pub fn set_cached_thumbnail_tier(
        &mut self,
        source_url: &str,
        quality: ThumbnailQuality,
        thumbnail: &str,
    ) {
        self.set_as(thumbnail_tier_key(source_url, quality), thumbnail);
    }
}

/// Result of preloading one video's thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailPreload {
    /// Already memoized; no request made.
    Cached(String),
    /// Loaded and memoized.
    Loaded(String),
    /// No preloadable thumbnail for this provider.
    Skipped,
    Failed(LoadError),
}

/// Warm the thumbnail cache for `videos`. Loads run concurrently and every
/// video settles to an outcome, in input order.
pub async fn preload_thumbnails(
    cache: &mut TimeBoundedCache,
    loader: &dyn ImageLoader,
    videos: &[MediaDescriptor],
) -> Vec<ThumbnailPreload> {
    let mut outcomes = Vec::with_capacity(videos.len());
    let mut pending = Vec::new();

    for (index, video) in videos.iter().enumerate() {
        if let Some(cached) = cache.cached_thumbnail(&video.url) {
            outcomes.push(ThumbnailPreload::Cached(cached));
            continue;
        }
        if extract_provider_id(&video.url, Provider::YouTube).is_none() {
            outcomes.push(ThumbnailPreload::Skipped);
            continue;
        }
        outcomes.push(ThumbnailPreload::Skipped);
        pending.push((index, thumbnail_url(&video.url, ThumbnailQuality::Standard)));
    }

    let results = join_all(pending.iter().map(|(_, thumbnail)| loader.load(thumbnail))).await;

    for ((index, thumbnail), result) in pending.into_iter().zip(results) {
        let video = &videos[index];
        outcomes[index] = match result {
            Ok(()) => {
                cache.set_cached_thumbnail(&video.url, &thumbnail);
                debug!(video_id = %video.id, thumbnail = %thumbnail, "Thumbnail preloaded");
                ThumbnailPreload::Loaded(thumbnail)
            }
            Err(err) => {
                warn!(video_id = %video.id, url = %video.url, error = %err, "Failed to preload thumbnail");
                ThumbnailPreload::Failed(err)
            }
        };
    }

    outcomes
}
