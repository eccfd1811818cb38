pub mod classifier;
pub mod policy;
pub mod timing;

mod controller;

pub use classifier::{
    classify_provider, embed_url, extract_provider_id, is_valid_video_url, thumbnail_ladder,
    thumbnail_url, ClassifiedUrl, Provider, ThumbnailQuality,
};
pub use controller::*;
pub use policy::{optimize_for_device, optimize_for_network, DeviceHint, NetworkHint};

use serde::{Deserialize, Serialize};

/// A video record as fetched from the content backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub loaded: bool,
}

impl MediaDescriptor {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            loaded: false,
        }
    }

    pub fn provider(&self) -> Provider {
        classify_provider(&self.url)
    }
}
