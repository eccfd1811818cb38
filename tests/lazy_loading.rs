use std::collections::HashSet;
use std::sync::Arc;

use video_media_cache::cache::{MemoryStorage, TimeBoundedCache};
use video_media_cache::error::LoadError;
use video_media_cache::host::{
    ManualClock, MediaHost, ObserveOptions, PreloadHint, VisibilityEntry,
};
use video_media_cache::media::{
    ControllerOptions, DeviceHint, LazyMediaController, LoadState, MediaDescriptor, NetworkHint,
    Placeholder,
};

/// Host double with an observer that remembers which ids are subscribed.
#[derive(Default)]
struct PageHost {
    subscribed: HashSet<String>,
    sources: Vec<(String, String)>,
    preloads: Vec<PreloadHint>,
    broken: HashSet<String>,
    network: Option<NetworkHint>,
}

impl PageHost {
    /// Report every subscribed id as visible, like a full-page scroll.
    fn scroll_all(&self) -> Vec<VisibilityEntry> {
        let mut ids: Vec<&String> = self.subscribed.iter().collect();
        ids.sort();
        ids.into_iter().map(VisibilityEntry::visible).collect()
    }
}

impl MediaHost for PageHost {
    fn observe(&mut self, id: &str, options: &ObserveOptions) {
        assert_eq!(options.threshold, 0.1);
        self.subscribed.insert(id.to_string());
    }

    fn unobserve(&mut self, id: &str) {
        self.subscribed.remove(id);
    }

    fn disconnect(&mut self) {
        self.subscribed.clear();
    }

    fn assign_source(&mut self, id: &str, source: &str) -> Result<(), LoadError> {
        if self.broken.contains(id) {
            return Err(LoadError::failed(source, "decode error"));
        }
        self.sources.push((id.to_string(), source.to_string()));
        Ok(())
    }

    fn preload(&mut self, hint: PreloadHint) {
        self.preloads.push(hint);
    }

    fn network(&self) -> Option<NetworkHint> {
        self.network
    }

    fn device(&self) -> DeviceHint {
        DeviceHint::new("Mozilla/5.0 (X11; Linux x86_64)", Some(8))
    }
}

fn listing(count: usize) -> Vec<MediaDescriptor> {
    (0..count)
        .map(|i| {
            MediaDescriptor::new(
                format!("v{i}"),
                format!("Review {i}"),
                format!("https://youtu.be/{:0>11}", i),
            )
        })
        .collect()
}

fn controller(host: PageHost) -> LazyMediaController<PageHost> {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let cache = TimeBoundedCache::with_defaults(Arc::new(MemoryStorage::new()), clock);
    LazyMediaController::new(host, cache, ControllerOptions::default())
}

#[test]
fn listing_flows_from_cache_miss_to_loaded_placeholders() {
    let mut controller = controller(PageHost {
        network: Some(NetworkHint::ThreeG),
        ..Default::default()
    });
    let site_videos = listing(10);

    assert_eq!(controller.cache_mut().cached_videos("7"), None);
    controller.cache_mut().set_cached_videos("7", &site_videos);
    let videos = controller
        .cache_mut()
        .cached_videos("7")
        .expect("listing was just cached");

    let selected = controller.select_for_network(&videos).to_vec();
    assert_eq!(selected.len(), 6);

    controller.preload_critical(&selected, 3);
    assert_eq!(controller.host().preloads.len(), 6);

    for video in &selected {
        assert!(controller.register(Placeholder::thumbnail(video.id.clone(), video.clone())));
    }
    assert_eq!(controller.host().subscribed.len(), 6);

    let entries = controller.host().scroll_all();
    controller.on_visible(&entries);
    controller.on_visible(&entries);

    assert!(controller.host().subscribed.is_empty());
    assert_eq!(controller.host().sources.len(), 6);
    for video in &selected {
        assert_eq!(controller.state(&video.id), LoadState::Loaded);
        assert!(controller.cache_mut().cached_thumbnail(&video.url).is_some());
    }
}

#[test]
fn broken_media_can_be_retried_after_fix() {
    let mut broken = HashSet::new();
    broken.insert("v1".to_string());
    let mut controller = controller(PageHost {
        broken,
        ..Default::default()
    });

    for video in listing(2) {
        controller.register(Placeholder::player(video.id.clone(), video));
    }
    let entries = controller.host().scroll_all();
    controller.on_visible(&entries);

    assert_eq!(controller.state("v0"), LoadState::Loaded);
    assert_eq!(controller.state("v1"), LoadState::Loading);

    controller.host_mut().broken.clear();
    assert!(controller.retry("v1"));
    assert_eq!(controller.state("v1"), LoadState::Loaded);
    assert_eq!(controller.host().sources.len(), 2);
}

#[test]
fn dispose_stops_future_callbacks() {
    let mut controller = controller(PageHost::default());
    for video in listing(3) {
        controller.register(Placeholder::player(video.id.clone(), video));
    }
    let entries = controller.host().scroll_all();
    controller.dispose();
    controller.on_visible(&entries);

    assert!(controller.host().subscribed.is_empty());
    assert!(controller.host().sources.is_empty());
    assert_eq!(controller.state("v0"), LoadState::Observed);
}
