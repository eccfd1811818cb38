use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::classifier::{self, Provider, ThumbnailQuality};
use super::policy::{self, preferred_thumbnail_quality};
use super::MediaDescriptor;
use crate::cache::TimeBoundedCache;
use crate::host::{Clock, MediaHost, ObserveOptions, PreloadHint, VisibilityEntry};

pub const DEFAULT_METADATA_PREFIX: &str = "/api/videos/";
pub const DEFAULT_CRITICAL_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Unobserved,
    Observed,
    Loading,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderKind {
    /// Swapped for the provider's embeddable player.
    Player,
    /// Swapped for a thumbnail image in the device-preferred tier.
    Thumbnail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub id: String,
    pub media: MediaDescriptor,
    pub kind: PlaceholderKind,
}

impl Placeholder {
    pub fn player(id: impl Into<String>, media: MediaDescriptor) -> Self {
        Self {
            id: id.into(),
            media,
            kind: PlaceholderKind::Player,
        }
    }

    pub fn thumbnail(id: impl Into<String>, media: MediaDescriptor) -> Self {
        Self {
            id: id.into(),
            media,
            kind: PlaceholderKind::Thumbnail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetricSample {
    pub subject_id: String,
    pub metric_name: String,
    pub value: f64,
    /// Milliseconds since the Unix epoch.
    pub captured_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOptions {
    pub observe: ObserveOptions,
    /// Path prefix of the per-video metadata endpoint used for fetch hints.
    pub metadata_prefix: String,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            observe: ObserveOptions::default(),
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
        }
    }
}

struct Tracked {
    placeholder: Placeholder,
    state: LoadState,
}

/// Defers media loads until their placeholders become visible.
///
/// Each placeholder moves `Unobserved -> Observed -> Loading -> Loaded`.
/// The first visibility report unsubscribes the placeholder, so a load is
/// triggered at most once. A failed source assignment leaves the placeholder
/// in `Loading` until [`retry`](Self::retry) is called.
///
/// After [`dispose`](Self::dispose) the controller is inert: registrations
/// and visibility reports are ignored.
pub struct LazyMediaController<H: MediaHost> {
    host: H,
    cache: TimeBoundedCache,
    clock: Arc<dyn Clock>,
    options: ControllerOptions,
    placeholders: HashMap<String, Tracked>,
    metrics: BTreeMap<(String, String), PerformanceMetricSample>,
    disposed: bool,
}

impl<H: MediaHost> LazyMediaController<H> {
    pub fn new(host: H, cache: TimeBoundedCache, options: ControllerOptions) -> Self {
        let clock = cache.clock().clone();
        Self {
            host,
            cache,
            clock,
            options,
            placeholders: HashMap::new(),
            metrics: BTreeMap::new(),
            disposed: false,
        }
    }

    /// Start observing a placeholder. Returns `false` when the controller is
    /// disposed or the id is already registered.
    pub fn register(&mut self, placeholder: Placeholder) -> bool {
        if self.disposed {
            debug!(id = %placeholder.id, "Ignoring registration on disposed controller");
            return false;
        }
        if self.placeholders.contains_key(&placeholder.id) {
            return false;
        }

        self.host.observe(&placeholder.id, &self.options.observe);
        debug!(id = %placeholder.id, "Placeholder observed");
        self.placeholders.insert(
            placeholder.id.clone(),
            Tracked {
                placeholder,
                state: LoadState::Observed,
            },
        );
        true
    }

    /// Handle a batch of visibility reports from the host observer.
    pub fn on_visible(&mut self, entries: &[VisibilityEntry]) {
        if self.disposed {
            return;
        }
        for entry in entries.iter().filter(|entry| entry.is_intersecting) {
            let Some(tracked) = self.placeholders.get_mut(&entry.id) else {
                continue;
            };
            if tracked.state != LoadState::Observed {
                continue;
            }
            tracked.state = LoadState::Loading;
            self.host.unobserve(&entry.id);
            debug!(id = %entry.id, "Placeholder visible, loading");
            self.load(&entry.id);
        }
    }

    /// Re-run the load of a placeholder left in `Loading` by a failure.
    /// Returns whether it is now `Loaded`.
    pub fn retry(&mut self, id: &str) -> bool {
        if self.disposed || self.state(id) != LoadState::Loading {
            return false;
        }
        self.load(id)
    }

    fn load(&mut self, id: &str) -> bool {
        let Some(placeholder) = self.placeholders.get(id).map(|t| t.placeholder.clone()) else {
            return false;
        };
        let source = self.resolve_source(&placeholder);

        match self.host.assign_source(id, &source) {
            Ok(()) => {
                if let Some(tracked) = self.placeholders.get_mut(id) {
                    tracked.state = LoadState::Loaded;
                    tracked.placeholder.media.loaded = true;
                }
                debug!(id, source = %source, "Placeholder loaded");
                true
            }
            Err(err) => {
                warn!(id, source = %source, error = %err, "Failed to load media source");
                false
            }
        }
    }

    fn resolve_source(&mut self, placeholder: &Placeholder) -> String {
        let url = &placeholder.media.url;
        match placeholder.kind {
            PlaceholderKind::Player => classifier::embed_url(url),
            PlaceholderKind::Thumbnail => {
                let quality = preferred_thumbnail_quality(&self.host.device());
                if let Some(cached) = self.cache.cached_thumbnail_tier(url, quality) {
                    return cached;
                }
                let thumbnail = classifier::thumbnail_url(url, quality);
                // Static placeholder paths are never memoized.
                if classifier::extract_provider_id(url, Provider::YouTube).is_some() {
                    self.cache.set_cached_thumbnail_tier(url, quality, &thumbnail);
                }
                thumbnail
            }
        }
    }

    /// Issue prefetch hints for the first `count` items regardless of
    /// visibility.
    pub fn preload_critical(&mut self, media: &[MediaDescriptor], count: usize) {
        if self.disposed {
            return;
        }
        for item in media.iter().take(count) {
            let thumbnail = classifier::thumbnail_url(&item.url, ThumbnailQuality::High);
            self.host.preload(PreloadHint::image(thumbnail));
            self.host.preload(PreloadHint::fetch(format!(
                "{}{}",
                self.options.metadata_prefix, item.id
            )));
        }
    }

    /// Trim `items` for the host's current connection.
    pub fn select_for_network<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        policy::optimize_for_network(items, self.host.network())
    }

    /// Keep the latest value of `name` for `subject_id`. Ignored once disposed.
    pub fn record_metric(&mut self, subject_id: &str, name: &str, value: f64) {
        if self.disposed {
            return;
        }
        let sample = PerformanceMetricSample {
            subject_id: subject_id.to_string(),
            metric_name: name.to_string(),
            value,
            captured_at: self.clock.now_ms(),
        };
        debug!(
            target: "video_performance",
            video_id = subject_id,
            metric = name,
            value,
            "video_performance"
        );
        self.metrics
            .insert((subject_id.to_string(), name.to_string()), sample);
    }

    /// All metrics recorded for exactly `subject_id`, keyed by metric name.
    ///
    /// Unlike a prefix scan over `"<subject>_<metric>"` keys, this never mixes
    /// in subjects that merely share a prefix (`v1` and `v1_extra`).
    pub fn metrics(&self, subject_id: &str) -> BTreeMap<String, PerformanceMetricSample> {
        self.metrics
            .iter()
            .filter(|((subject, _), _)| subject == subject_id)
            .map(|((_, name), sample)| (name.clone(), sample.clone()))
            .collect()
    }

    pub fn placeholder(&self, id: &str) -> Option<&Placeholder> {
        self.placeholders.get(id).map(|tracked| &tracked.placeholder)
    }

    /// Current state of `id`; ids never registered are `Unobserved`.
    pub fn state(&self, id: &str) -> LoadState {
        self.placeholders
            .get(id)
            .map_or(LoadState::Unobserved, |tracked| tracked.state)
    }

    /// Disconnect the observer and drop metrics. In-flight host loads are not
    /// aborted.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.host.disconnect();
        self.metrics.clear();
        self.disposed = true;
        debug!(placeholders = self.placeholders.len(), "Controller disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn cache(&self) -> &TimeBoundedCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TimeBoundedCache {
        &mut self.cache
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;
    use crate::error::LoadError;
    use crate::host::{ManualClock, PreloadKind};
    use crate::media::policy::{DeviceHint, NetworkHint};

    const START: i64 = 1_700_000_000_000;

    #[derive(Default)]
    struct FakeHost {
        observed: Vec<String>,
        unobserved: Vec<String>,
        assigned: Vec<(String, String)>,
        preloads: Vec<PreloadHint>,
        disconnected: bool,
        fail_loads: bool,
        network: Option<NetworkHint>,
        device: DeviceHint,
    }

    impl MediaHost for FakeHost {
        fn observe(&mut self, id: &str, _options: &ObserveOptions) {
            self.observed.push(id.to_string());
        }

        fn unobserve(&mut self, id: &str) {
            self.unobserved.push(id.to_string());
        }

        fn disconnect(&mut self) {
            self.disconnected = true;
        }

        fn assign_source(&mut self, id: &str, source: &str) -> Result<(), LoadError> {
            if self.fail_loads {
                return Err(LoadError::failed(source, "network error"));
            }
            self.assigned.push((id.to_string(), source.to_string()));
            Ok(())
        }

        fn preload(&mut self, hint: PreloadHint) {
            self.preloads.push(hint);
        }

        fn network(&self) -> Option<NetworkHint> {
            self.network
        }

        fn device(&self) -> DeviceHint {
            self.device.clone()
        }
    }

    fn controller(host: FakeHost) -> (LazyMediaController<FakeHost>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let cache = TimeBoundedCache::with_defaults(Arc::new(MemoryStorage::new()), clock.clone());
        (
            LazyMediaController::new(host, cache, ControllerOptions::default()),
            clock,
        )
    }

    fn rick() -> MediaDescriptor {
        MediaDescriptor::new("v1", "Best tacos in town", "https://youtu.be/dQw4w9WgXcQ")
    }

    #[test]
    fn register_observes_once() {
        let (mut controller, _) = controller(FakeHost::default());
        assert_eq!(controller.state("p1"), LoadState::Unobserved);
        assert!(controller.register(Placeholder::player("p1", rick())));
        assert!(!controller.register(Placeholder::player("p1", rick())));
        assert_eq!(controller.state("p1"), LoadState::Observed);
        assert_eq!(controller.host().observed, vec!["p1".to_string()]);
    }

    #[test]
    fn double_visibility_triggers_loading_once() {
        let (mut controller, _) = controller(FakeHost::default());
        controller.register(Placeholder::player("p1", rick()));

        controller.on_visible(&[VisibilityEntry::visible("p1")]);
        controller.on_visible(&[VisibilityEntry::visible("p1")]);

        let host = controller.host();
        assert_eq!(host.unobserved, vec!["p1".to_string()]);
        assert_eq!(host.assigned.len(), 1);
        assert_eq!(
            host.assigned[0].1,
            "https://www.youtube.com/embed/dQw4w9WgXcQ?rel=0&modestbranding=1&showinfo=0&controls=1&autoplay=0"
        );
        assert_eq!(controller.state("p1"), LoadState::Loaded);
        assert!(controller.placeholder("p1").unwrap().media.loaded);
    }

    #[test]
    fn hidden_and_unknown_entries_are_ignored() {
        let (mut controller, _) = controller(FakeHost::default());
        controller.register(Placeholder::player("p1", rick()));
        controller.on_visible(&[
            VisibilityEntry::hidden("p1"),
            VisibilityEntry::visible("nope"),
        ]);
        assert_eq!(controller.state("p1"), LoadState::Observed);
        assert!(controller.host().assigned.is_empty());
    }

    #[test]
    fn failed_load_stays_loading_until_retry() {
        let (mut controller, _) = controller(FakeHost {
            fail_loads: true,
            ..Default::default()
        });
        controller.register(Placeholder::player("p1", rick()));
        controller.on_visible(&[VisibilityEntry::visible("p1")]);
        assert_eq!(controller.state("p1"), LoadState::Loading);

        controller.on_visible(&[VisibilityEntry::visible("p1")]);
        assert_eq!(controller.host().unobserved.len(), 1);

        assert!(!controller.retry("p1"));
        controller.host_mut().fail_loads = false;
        assert!(controller.retry("p1"));
        assert_eq!(controller.state("p1"), LoadState::Loaded);
        assert!(!controller.retry("p1"));
    }

    #[test]
    fn thumbnails_are_memoized_in_cache() {
        let (mut controller, _) = controller(FakeHost::default());
        let media = rick();
        controller.register(Placeholder::thumbnail("t1", media.clone()));
        controller.on_visible(&[VisibilityEntry::visible("t1")]);

        let expected = "https://img.youtube.com/vi/dQw4w9WgXcQ/mqdefault.jpg";
        assert_eq!(controller.host().assigned[0].1, expected);
        assert_eq!(
            controller.cache_mut().cached_thumbnail(&media.url).as_deref(),
            Some(expected)
        );
    }

    #[test]
    fn cached_thumbnail_wins_over_derivation() {
        let (mut controller, _) = controller(FakeHost::default());
        let media = rick();
        controller
            .cache_mut()
            .set_cached_thumbnail(&media.url, "https://cdn.example.com/t.jpg");
        controller.register(Placeholder::thumbnail("t1", media));
        controller.on_visible(&[VisibilityEntry::visible("t1")]);
        assert_eq!(controller.host().assigned[0].1, "https://cdn.example.com/t.jpg");
    }

    #[test]
    fn constrained_devices_get_low_tier_thumbnails() {
        let (mut controller, _) = controller(FakeHost {
            device: DeviceHint::new("Mozilla/5.0 (Linux; Android 14)", Some(8)),
            ..Default::default()
        });
        controller.register(Placeholder::thumbnail("t1", rick()));
        controller.on_visible(&[VisibilityEntry::visible("t1")]);
        assert_eq!(
            controller.host().assigned[0].1,
            "https://img.youtube.com/vi/dQw4w9WgXcQ/sddefault.jpg"
        );
    }

    #[test]
    fn preload_critical_hints_first_items() {
        let (mut controller, _) = controller(FakeHost::default());
        let media = vec![
            rick(),
            MediaDescriptor::new("v2", "Dumplings", "https://vimeo.com/1"),
            MediaDescriptor::new("v3", "Pho", "https://youtu.be/aaaaaaaaaaa"),
        ];
        controller.preload_critical(&media, 2);

        let preloads = &controller.host().preloads;
        assert_eq!(preloads.len(), 4);
        assert_eq!(
            preloads[0],
            PreloadHint::image("https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg")
        );
        assert_eq!(preloads[1], PreloadHint::fetch("/api/videos/v1"));
        assert_eq!(preloads[2].kind, PreloadKind::Image);
        assert_eq!(preloads[2].href, "/placeholder-video.jpg");
        assert_eq!(preloads[3].href, "/api/videos/v2");
    }

    #[test]
    fn select_for_network_uses_current_hint() {
        let (mut controller, _) = controller(FakeHost {
            network: Some(NetworkHint::Slow2g),
            ..Default::default()
        });
        let items: Vec<u32> = (0..20).collect();
        assert_eq!(controller.select_for_network(&items), &[0, 1, 2]);

        controller.host_mut().network = Some(NetworkHint::ThreeG);
        assert_eq!(controller.select_for_network(&items).len(), 6);
    }

    #[test]
    fn metrics_are_scoped_to_exact_subject() {
        let (mut controller, clock) = controller(FakeHost::default());
        controller.record_metric("v1", "load_time", 120.0);
        clock.advance(std::time::Duration::from_millis(5));
        controller.record_metric("v1", "load_time", 80.0);
        controller.record_metric("v1_extra", "load_time", 1.0);
        controller.record_metric("v1", "first_frame", 40.5);

        let metrics = controller.metrics("v1");
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics["load_time"].value, 80.0);
        assert_eq!(metrics["load_time"].captured_at, START + 5);
        assert_eq!(metrics["first_frame"].value, 40.5);
        assert!(controller.metrics("unknown").is_empty());
    }

    #[test]
    fn dispose_makes_controller_inert() {
        let (mut controller, _) = controller(FakeHost::default());
        controller.register(Placeholder::player("p1", rick()));
        controller.record_metric("v1", "load_time", 1.0);
        controller.dispose();

        assert!(controller.is_disposed());
        assert!(controller.host().disconnected);
        assert!(controller.metrics("v1").is_empty());
        assert!(!controller.register(Placeholder::player("p2", rick())));
        assert_eq!(controller.state("p2"), LoadState::Unobserved);

        controller.on_visible(&[VisibilityEntry::visible("p1")]);
        assert_eq!(controller.state("p1"), LoadState::Observed);
        controller.preload_critical(&[rick()], 1);
        assert!(controller.host().preloads.is_empty());

        controller.record_metric("v1", "load_time", 5.0);
        assert!(controller.metrics("v1").is_empty());
    }

    #[test]
    fn constrained_devices_memoize_low_tier() {
        let (mut controller, _) = controller(FakeHost {
            device: DeviceHint::new("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)", None),
            ..Default::default()
        });
        let media = rick();
        controller.register(Placeholder::thumbnail("t1", media.clone()));
        controller.on_visible(&[VisibilityEntry::visible("t1")]);

        let low = "https://img.youtube.com/vi/dQw4w9WgXcQ/sddefault.jpg";
        assert_eq!(controller.host().assigned[0].1, low);
        assert_eq!(controller.cache().size(), 1);
        assert_eq!(
            controller
                .cache_mut()
                .cached_thumbnail_tier(&media.url, ThumbnailQuality::Low)
                .as_deref(),
            Some(low)
        );
        assert_eq!(controller.cache_mut().cached_thumbnail(&media.url), None);
    }

    #[test]
    fn memoized_low_tier_wins_over_derivation() {
        let (mut controller, _) = controller(FakeHost {
            device: DeviceHint::new("Mozilla/5.0 (X11; Linux x86_64)", Some(2)),
            ..Default::default()
        });
        let media = rick();
        controller.cache_mut().set_cached_thumbnail_tier(
            &media.url,
            ThumbnailQuality::Low,
            "https://cdn.example.com/low.jpg",
        );
        controller.register(Placeholder::thumbnail("t1", media));
        controller.on_visible(&[VisibilityEntry::visible("t1")]);
        assert_eq!(controller.host().assigned[0].1, "https://cdn.example.com/low.jpg");
    }

    #[test]
    fn placeholder_thumbnails_are_not_memoized() {
        let (mut controller, _) = controller(FakeHost::default());
        let tiktok = MediaDescriptor::new("v9", "Street food", "https://www.tiktok.com/@chef/video/1");
        controller.register(Placeholder::thumbnail("t9", tiktok.clone()));
        controller.on_visible(&[VisibilityEntry::visible("t9")]);

        assert_eq!(controller.host().assigned[0].1, "/placeholder-tiktok.jpg");
        assert_eq!(controller.state("t9"), LoadState::Loaded);
        assert_eq!(controller.cache().size(), 0);
    }
}
