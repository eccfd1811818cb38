//! Network and device adaptation. Pure decisions, evaluated per call.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::classifier::{self, Provider, ThumbnailQuality};
use crate::error::NetworkHintError;

static MOBILE_UA_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Android|webOS|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini").unwrap()
});

const SLOW_LINK_LIMIT: usize = 3;
const MODERATE_LINK_LIMIT: usize = 6;
const LOW_END_CORES: u32 = 2;

/// Effective connection type reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkHint {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

impl NetworkHint {
    /// Maximum number of items worth loading on this link.
    pub fn item_limit(self) -> Option<usize> {
        match self {
            NetworkHint::Slow2g | NetworkHint::TwoG => Some(SLOW_LINK_LIMIT),
            NetworkHint::ThreeG => Some(MODERATE_LINK_LIMIT),
            NetworkHint::FourG => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkHint::Slow2g => "slow-2g",
            NetworkHint::TwoG => "2g",
            NetworkHint::ThreeG => "3g",
            NetworkHint::FourG => "4g",
        }
    }
}

impl FromStr for NetworkHint {
    type Err = NetworkHintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(NetworkHint::Slow2g),
            "2g" => Ok(NetworkHint::TwoG),
            "3g" => Ok(NetworkHint::ThreeG),
            "4g" => Ok(NetworkHint::FourG),
            other => Err(NetworkHintError(other.to_string())),
        }
    }
}

/// Trim a candidate list for the current link, keeping order. No hint means
/// no restriction.
pub fn optimize_for_network<T>(items: &[T], hint: Option<NetworkHint>) -> &[T] {
    match hint.and_then(NetworkHint::item_limit) {
        Some(limit) => &items[..items.len().min(limit)],
        None => items,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHint {
    pub user_agent: String,
    /// Logical core count, when the host reports it.
    pub hardware_concurrency: Option<u32>,
}

impl DeviceHint {
    pub fn new(user_agent: impl Into<String>, hardware_concurrency: Option<u32>) -> Self {
        Self {
            user_agent: user_agent.into(),
            hardware_concurrency,
        }
    }

    pub fn is_mobile(&self) -> bool {
        MOBILE_UA_REGEX.is_match(&self.user_agent)
    }

    pub fn is_low_end(&self) -> bool {
        self.hardware_concurrency
            .is_some_and(|cores| cores <= LOW_END_CORES)
    }

    pub fn is_constrained(&self) -> bool {
        self.is_mobile() || self.is_low_end()
    }
}

pub fn preferred_thumbnail_quality(device: &DeviceHint) -> ThumbnailQuality {
    if device.is_constrained() {
        ThumbnailQuality::Low
    } else {
        ThumbnailQuality::Standard
    }
}

/// On constrained devices, swap a YouTube URL for its low-tier thumbnail.
/// Anything else passes through.
pub fn optimize_for_device(url: &str, device: &DeviceHint) -> String {
    if device.is_constrained()
        && classifier::extract_provider_id(url, Provider::YouTube).is_some()
    {
        return classifier::thumbnail_url(url, ThumbnailQuality::Low);
    }
    url.to_string()
}

/// Grid column count for a listing of `item_count` videos.
pub fn grid_columns(viewport_width: u32, item_count: usize) -> usize {
    let columns = match viewport_width {
        0..=767 => 1,
        768..=1023 => 2,
        1024..=1439 => 3,
        _ => 4,
    };
    columns.min(item_count)
}
