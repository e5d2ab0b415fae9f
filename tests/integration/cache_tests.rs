//! Preload cache integration tests.
//!
//! Tests verify:
//! - Concurrent requests for one URL share a single load
//! - Cache hits issue no new load
//! - Stats track entry states and reset on clear
//! - Batch preloading isolates failures and bounds concurrency

use std::sync::Arc;
use std::time::Duration;

use image_preloader::{
    BatchOptions, CacheStats, EntryStatus, ImageLoadOptions, PreloadCache, PreloadRequest,
};

use super::test_utils::{jpeg_bytes, png_bytes, ManualSource, MockImageSource};

fn opts() -> ImageLoadOptions {
    ImageLoadOptions::default()
}

// =============================================================================
// De-duplication
// =============================================================================

#[tokio::test]
async fn test_three_concurrent_requests_share_one_load() {
    let opts = opts();
    let source = ManualSource::new();
    let cache = PreloadCache::new(source.clone());

    let complete = async {
        source.wait_pending(1).await;
        source.succeed("/a.jpg");
    };

    let (a, b, c, ()) = tokio::join!(
        cache.preload_image("/a.jpg", &opts),
        cache.preload_image("/a.jpg", &opts),
        cache.preload_image("/a.jpg", &opts),
        complete,
    );

    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&b, &c));
    assert_eq!(source.issued(), 1);

    assert_eq!(
        cache.cache_stats().await,
        CacheStats {
            total: 1,
            loaded: 1,
            loading: 0,
            errors: 0,
        }
    );
}

#[tokio::test]
async fn test_concurrent_failure_reaches_every_caller() {
    let opts = opts();
    let source = ManualSource::new();
    let cache = PreloadCache::new(source.clone());

    let complete = async {
        source.wait_pending(1).await;
        source.fail("/broken.jpg");
    };

    let (a, b, ()) = tokio::join!(
        cache.preload_image("/broken.jpg", &opts),
        cache.preload_image("/broken.jpg", &opts),
        complete,
    );

    let (a, b) = (a.unwrap_err(), b.unwrap_err());
    assert_eq!(a.to_string(), "Failed to preload image: /broken.jpg");
    assert_eq!(a.to_string(), b.to_string());
    assert_eq!(source.issued(), 1);
    assert_eq!(cache.cache_stats().await.errors, 1);
}

#[tokio::test]
async fn test_cache_hit_issues_no_new_load() {
    let opts = opts();
    let source = Arc::new(MockImageSource::new().with_image("/hero.png", png_bytes(64, 32)));
    let cache = PreloadCache::new(Arc::clone(&source));

    let first = cache.preload_image("/hero.png", &opts).await.unwrap();
    let second = cache.preload_image("/hero.png", &opts).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.dimensions, Some((64, 32)));
    assert_eq!(source.request_count("/hero.png").await, 1);
}

#[tokio::test]
async fn test_clones_share_entries() {
    let opts = opts();
    let source = Arc::new(MockImageSource::new().with_image("/a.png", png_bytes(2, 2)));
    let cache = PreloadCache::new(Arc::clone(&source));
    let other = cache.clone();

    cache.preload_image("/a.png", &opts).await.unwrap();
    other.preload_image("/a.png", &opts).await.unwrap();

    assert_eq!(source.requests().await.len(), 1);
    assert_eq!(other.cache_stats().await.loaded, 1);
}

// =============================================================================
// Stats and Clearing
// =============================================================================

#[tokio::test]
async fn test_fresh_cache_stats_are_zero() {
    let cache = PreloadCache::new(MockImageSource::new());
    assert_eq!(cache.cache_stats().await, CacheStats::default());
}

#[tokio::test]
async fn test_stats_track_each_state() {
    let opts = opts();
    let source = ManualSource::new();
    let cache = PreloadCache::new(source.clone());

    let (ok, err, ()) = tokio::join!(
        cache.preload_image("/ok.jpg", &opts),
        cache.preload_image("/err.jpg", &opts),
        async {
            source.wait_pending(2).await;
            let stats = cache.cache_stats().await;
            assert_eq!(stats.total, 2);
            assert_eq!(stats.loading, 2);

            source.succeed("/ok.jpg");
            source.fail("/err.jpg");
        },
    );
    assert!(ok.is_ok());
    assert!(err.is_err());

    let stats = cache.cache_stats().await;
    assert_eq!(
        stats,
        CacheStats {
            total: 2,
            loaded: 1,
            loading: 0,
            errors: 1,
        }
    );
    assert_eq!(
        stats.loaded + stats.loading + stats.errors,
        stats.total,
        "settled entries account for every URL"
    );
}

#[tokio::test]
async fn test_clear_resets_stats() {
    let opts = opts();
    let source = MockImageSource::new()
        .with_image("/a.png", png_bytes(2, 2))
        .with_image("/b.jpg", jpeg_bytes(8, 8));
    let cache = PreloadCache::new(source);

    cache.preload_image("/a.png", &opts).await.unwrap();
    cache.preload_image("/b.jpg", &opts).await.unwrap();
    let _ = cache.preload_image("/missing.png", &opts).await;

    assert_eq!(cache.cache_stats().await.total, 3);
    assert_eq!(cache.clear_cache().await, 3);
    assert_eq!(cache.cache_stats().await, CacheStats::default());
    assert_eq!(cache.status("/a.png").await, None);
}

#[tokio::test]
async fn test_clear_does_not_strand_pending_callers() {
    let opts = opts();
    let source = ManualSource::new();
    let cache = PreloadCache::new(source.clone());

    let (result, ()) = tokio::join!(cache.preload_image("/slow.jpg", &opts), async {
        source.wait_pending(1).await;
        assert_eq!(cache.clear_cache().await, 1);
        assert_eq!(cache.cache_stats().await, CacheStats::default());
        source.succeed("/slow.jpg");
    });

    assert!(result.is_ok());
    // The detached load does not repopulate the cleared cache
    assert_eq!(cache.cache_stats().await.total, 0);
}

#[tokio::test]
async fn test_failed_entry_is_retried_on_next_request() {
    let opts = opts();
    let source = ManualSource::new();
    let cache = PreloadCache::new(source.clone());

    let (first, ()) = tokio::join!(cache.preload_image("/flaky.jpg", &opts), async {
        source.wait_pending(1).await;
        source.fail("/flaky.jpg");
    });
    assert!(first.is_err());
    assert_eq!(cache.status("/flaky.jpg").await, Some(EntryStatus::Error));

    let (second, ()) = tokio::join!(cache.preload_image("/flaky.jpg", &opts), async {
        source.wait_pending(1).await;
        source.succeed("/flaky.jpg");
    });
    assert!(second.is_ok());
    assert_eq!(source.issued(), 2);
    assert_eq!(cache.status("/flaky.jpg").await, Some(EntryStatus::Loaded));
}

// =============================================================================
// Batch Preloading
// =============================================================================

#[tokio::test]
async fn test_batch_reports_success_and_failure() {
    let source = MockImageSource::new().with_image("/x.jpg", jpeg_bytes(16, 16));
    let cache = PreloadCache::new(source);

    let results = cache
        .preload_images(
            vec![PreloadRequest::new("/x.jpg"), PreloadRequest::new("/y.jpg")],
            &BatchOptions::new(1, Duration::from_secs(10)),
        )
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].url, "/x.jpg");
    assert!(results[0].success);
    assert!(results[0].result.is_some());
    assert_eq!(results[1].url, "/y.jpg");
    assert!(!results[1].success);
    assert!(results[1].error.as_ref().unwrap().is_not_found());
}

#[tokio::test]
async fn test_batch_with_manual_events() {
    let source = ManualSource::new();
    let cache = PreloadCache::new(source.clone());
    let batch = BatchOptions::new(1, Duration::from_secs(10));

    let (results, ()) = tokio::join!(
        cache.preload_images(vec!["/x.jpg".into(), "/y.jpg".into()], &batch),
        async {
            source.wait_pending(1).await;
            // Concurrency 1: /y.jpg is not admitted until /x.jpg settles
            assert_eq!(source.issued(), 1);
            source.succeed("/x.jpg");

            source.wait_pending(1).await;
            source.fail("/y.jpg");
        },
    );

    let flags: Vec<bool> = results.iter().map(|r| r.success).collect();
    assert_eq!(flags, vec![true, false]);
}

#[tokio::test]
async fn test_batch_timeout_isolated_per_item() {
    let source = MockImageSource::new()
        .with_image("/a.png", png_bytes(2, 2))
        .with_delay(Duration::from_millis(200));
    let cache = PreloadCache::new(source);

    let results = cache
        .preload_images(
            vec!["/a.png".into(), "/b.png".into()],
            &BatchOptions::new(2, Duration::from_millis(20)),
        )
        .await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| !r.success));
    assert!(results[0]
        .error
        .as_ref()
        .unwrap()
        .to_string()
        .starts_with("Timed out"));
}

#[tokio::test]
async fn test_batch_dedups_repeated_urls() {
    let source = Arc::new(MockImageSource::new().with_image("/a.png", png_bytes(2, 2)));
    let cache = PreloadCache::new(Arc::clone(&source));

    let results = cache
        .preload_images(
            vec!["/a.png".into(), "/a.png".into(), "/a.png".into()],
            &BatchOptions::default(),
        )
        .await;

    assert!(results.iter().all(|r| r.success));
    assert_eq!(source.request_count("/a.png").await, 1);
}
