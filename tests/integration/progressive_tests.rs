//! Progressive loading integration tests.
//!
//! Tests verify:
//! - Lazy images load nothing until scrolled into view
//! - Low quality loads before high quality
//! - Missing observer support falls back to visible
//! - Instances sharing an image share the cache entry

use std::sync::Arc;

use image_preloader::{
    ElementId, EntryStatus, IntersectionWatch, LoadOutcome, ObserverCapability, PreloadCache,
    ProgressiveImageProps, ProgressiveLoader, Rect, RenderPlan, ViewportObserver,
};

use super::test_utils::{jpeg_bytes, ManualSource, MockImageSource};

const LOW: &str = "/case-study.jpg?w=64&q=20";
const HIGH: &str = "/case-study.jpg?w=640&h=480&q=85";

fn source() -> Arc<MockImageSource> {
    Arc::new(MockImageSource::new().with_image("/case-study.jpg", jpeg_bytes(32, 24)))
}

fn viewport() -> ViewportObserver {
    ViewportObserver::new(Rect::new(0.0, 0.0, 1280.0, 800.0))
}

#[tokio::test]
async fn test_lazy_image_loads_after_scroll() {
    let source = source();
    let cache = PreloadCache::new(Arc::clone(&source));
    let viewport = viewport();
    viewport.place("case-study", Rect::new(0.0, 2400.0, 640.0, 480.0));

    let props = ProgressiveImageProps::new("/case-study.jpg", "Case study", 640, 480);
    let (_watch, visible) = IntersectionWatch::visibility(
        viewport.capability(),
        Some(ElementId::from("case-study")),
        props.observer_options().unwrap(),
    );
    assert!(!*visible.borrow());

    let mut loader = ProgressiveLoader::new(cache.clone(), props);
    let run = tokio::spawn(async move {
        let outcome = loader.run(visible).await;
        (loader, outcome)
    });

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(source.requests().await.is_empty(), "nothing loads off-screen");

    // Within the 50px root margin counts as visible
    viewport.scroll_to(0.0, 1620.0);

    let (loader, outcome) = run.await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Loaded(_)));
    assert!(loader.image().is_visible());
    assert_eq!(
        source.requests().await,
        vec![
            "/case-study.jpg?w=64&q=20".to_string(),
            "/case-study.jpg?w=640&h=480&q=85".to_string(),
        ]
    );

    let RenderPlan::Layers {
        placeholder,
        low_quality,
        high_quality,
    } = loader.image().render()
    else {
        panic!("expected image layers");
    };
    assert!(placeholder.is_none());
    assert!(low_quality.is_none());
    assert!(high_quality.unwrap().opaque);
}

#[tokio::test]
async fn test_unsupported_observer_assumes_visible() {
    let source = source();
    let cache = PreloadCache::new(Arc::clone(&source));
    let props = ProgressiveImageProps::new("/case-study.jpg", "Case study", 640, 480);

    let (_watch, visible) = IntersectionWatch::visibility(
        ObserverCapability::Unsupported,
        Some(ElementId::from("case-study")),
        props.observer_options().unwrap(),
    );
    assert!(*visible.borrow());

    let mut loader = ProgressiveLoader::new(cache, props);
    assert!(matches!(loader.run(visible).await, LoadOutcome::Loaded(_)));
    assert_eq!(source.requests().await.len(), 2);
}

#[tokio::test]
async fn test_missing_image_shows_unavailable() {
    let cache = PreloadCache::new(source());
    let props = ProgressiveImageProps::new("/gone.jpg", "Gone", 640, 480).priority(true);

    let (_watch, visible) =
        IntersectionWatch::visibility(ObserverCapability::Unsupported, None, Default::default());

    let mut loader = ProgressiveLoader::new(cache, props);
    let outcome = loader.run(visible).await;

    assert!(matches!(outcome, LoadOutcome::Failed(ref e) if e.is_not_found()));
    assert!(matches!(
        loader.image().render(),
        RenderPlan::Unavailable {
            message: "Image unavailable"
        }
    ));
}

#[tokio::test]
async fn test_instances_share_cached_image() {
    let source = source();
    let cache = PreloadCache::new(Arc::clone(&source));

    let props = ProgressiveImageProps::new("/case-study.jpg", "Case study", 640, 480).lazy(false);
    let mut first = ProgressiveLoader::new(cache.clone(), props.clone());
    let mut second = ProgressiveLoader::new(cache.clone(), props);

    let (_tx, rx) = tokio::sync::watch::channel(false);
    let (a, b) = tokio::join!(first.run(rx.clone()), second.run(rx));

    let (LoadOutcome::Loaded(a), LoadOutcome::Loaded(b)) = (a, b) else {
        panic!("both instances should load");
    };
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(source.requests().await.len(), 2, "one request per quality level");
}

#[tokio::test]
async fn test_preload_flag_warms_before_low_quality_settles() {
    let source = ManualSource::new();
    let cache = PreloadCache::new(source.clone());
    let props = ProgressiveImageProps::new("/case-study.jpg", "Case study", 640, 480).preload(true);
    let mut loader = ProgressiveLoader::new(cache.clone(), props);
    let (_tx, rx) = tokio::sync::watch::channel(false);

    let (outcome, ()) = tokio::join!(loader.run(rx), async {
        source.wait_pending(2).await;
        assert_eq!(cache.status(LOW).await, Some(EntryStatus::Pending));
        assert_eq!(cache.status(HIGH).await, Some(EntryStatus::Pending));

        source.succeed(LOW);
        source.succeed(HIGH);
    });

    assert!(matches!(outcome, LoadOutcome::Loaded(_)));
    // The instance's own high quality request joined the warm-up
    assert_eq!(source.issued(), 2);
}

#[tokio::test]
async fn test_low_quality_failure_stops_further_loads() {
    let source = ManualSource::new();
    let cache = PreloadCache::new(source.clone());
    let props = ProgressiveImageProps::new("/case-study.jpg", "Case study", 640, 480).preload(true);
    let mut loader = ProgressiveLoader::new(cache.clone(), props);
    let (_tx, rx) = tokio::sync::watch::channel(false);

    let (outcome, ()) = tokio::join!(loader.run(rx), async {
        source.wait_pending(2).await;
        source.fail(LOW);
    });

    assert!(matches!(outcome, LoadOutcome::Failed(_)));
    assert!(loader.image().has_error());

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(source.issued(), 2, "no load starts after the error");
    assert_eq!(cache.status(HIGH).await, Some(EntryStatus::Pending));

    source.succeed(HIGH);
}
