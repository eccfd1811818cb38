//! Provider detection and URL derivation for embedded videos.
//!
//! Every function here is total: malformed input yields a fallback, never a
//! panic or an error.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

static YOUTUBE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
    )
    .unwrap()
});

static TIKTOK_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:tiktok\.com/@[^/]+/video/(\d+)|tiktok\.com/v/(\d+)|vm\.tiktok\.com/([A-Za-z0-9]+))",
    )
    .unwrap()
});

const YOUTUBE_THUMBNAIL_BASE: &str = "https://img.youtube.com/vi";
const YOUTUBE_EMBED_BASE: &str = "https://www.youtube.com/embed";
const YOUTUBE_EMBED_PARAMS: &str = "rel=0&modestbranding=1&showinfo=0&controls=1&autoplay=0";
const TIKTOK_EMBED_BASE: &str = "https://www.tiktok.com/embed/v2";

pub const PLACEHOLDER_LOW: &str = "/placeholder-video-low.jpg";
pub const PLACEHOLDER_VIDEO: &str = "/placeholder-video.jpg";
pub const PLACEHOLDER_TIKTOK: &str = "/placeholder-tiktok.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    YouTube,
    TikTok,
    Vimeo,
    Generic,
}

impl Provider {
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::YouTube => "YouTube",
            Provider::TikTok => "TikTok",
            Provider::Vimeo => "Vimeo",
            Provider::Generic => "Video",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailQuality {
    Low,
    #[default]
    Standard,
    High,
}

pub fn classify_provider(url: &str) -> Provider {
    if url.contains("youtube.com") || url.contains("youtu.be") {
        Provider::YouTube
    } else if url.contains("tiktok.com") {
        Provider::TikTok
    } else if url.contains("vimeo.com") {
        Provider::Vimeo
    } else {
        Provider::Generic
    }
}

/// Extract the provider's video id. Only YouTube and TikTok have id rules.
pub fn extract_provider_id(url: &str, provider: Provider) -> Option<String> {
    match provider {
        Provider::YouTube => YOUTUBE_ID_REGEX
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()),
        Provider::TikTok => TIKTOK_ID_REGEX.captures(url).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
        }),
        Provider::Vimeo | Provider::Generic => None,
    }
}

fn youtube_id(url: &str) -> Option<String> {
    extract_provider_id(url, Provider::YouTube)
}

fn placeholder(provider: Provider, quality: ThumbnailQuality) -> &'static str {
    match (quality, provider) {
        (ThumbnailQuality::Low, _) => PLACEHOLDER_LOW,
        (ThumbnailQuality::Standard, Provider::TikTok) => PLACEHOLDER_TIKTOK,
        (ThumbnailQuality::Standard, _) | (ThumbnailQuality::High, _) => PLACEHOLDER_VIDEO,
    }
}

pub fn thumbnail_url(url: &str, quality: ThumbnailQuality) -> String {
    let provider = classify_provider(url);
    if provider == Provider::YouTube {
        if let Some(id) = youtube_id(url) {
            let variant = match quality {
                ThumbnailQuality::Low => "sddefault",
                ThumbnailQuality::Standard => "mqdefault",
                ThumbnailQuality::High => "maxresdefault",
            };
            return format!("{YOUTUBE_THUMBNAIL_BASE}/{id}/{variant}.jpg");
        }
    }
    placeholder(provider, quality).to_string()
}

/// Low and high thumbnail tiers: show the first immediately and swap to the
/// second once it has loaded.
pub fn thumbnail_ladder(url: &str) -> (String, String) {
    (
        thumbnail_url(url, ThumbnailQuality::Low),
        thumbnail_url(url, ThumbnailQuality::High),
    )
}

pub fn embed_url(url: &str) -> String {
    let provider = classify_provider(url);
    match (provider, extract_provider_id(url, provider)) {
        (Provider::YouTube, Some(id)) => format!("{YOUTUBE_EMBED_BASE}/{id}?{YOUTUBE_EMBED_PARAMS}"),
        (Provider::TikTok, Some(id)) => format!("{TIKTOK_EMBED_BASE}/{id}"),
        _ => url.to_string(),
    }
}

/// Absolute URL, and for providers with an id rule, a URL that matches it.
/// Everything else is accepted.
pub fn is_valid_video_url(url: &str) -> bool {
    if Url::parse(url).is_err() {
        return false;
    }
    match classify_provider(url) {
        Provider::YouTube => YOUTUBE_ID_REGEX.is_match(url),
        Provider::TikTok => TIKTOK_ID_REGEX.is_match(url),
        Provider::Vimeo | Provider::Generic => true,
    }
}

/// Everything the classifier can say about one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedUrl {
    pub url: String,
    pub provider: Provider,
    pub platform: &'static str,
    pub id: Option<String>,
    pub thumbnail_low: String,
    pub thumbnail: String,
    pub thumbnail_high: String,
    pub embed_url: String,
    pub valid: bool,
}

impl ClassifiedUrl {
    pub fn from_url(url: &str) -> Self {
        let provider = classify_provider(url);
        Self {
            url: url.to_string(),
            provider,
            platform: provider.display_name(),
            id: extract_provider_id(url, provider),
            thumbnail_low: thumbnail_url(url, ThumbnailQuality::Low),
            thumbnail: thumbnail_url(url, ThumbnailQuality::Standard),
            thumbnail_high: thumbnail_url(url, ThumbnailQuality::High),
            embed_url: embed_url(url),
            valid: is_valid_video_url(url),
        }
    }
}
