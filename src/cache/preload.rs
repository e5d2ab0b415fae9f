//! Deduplicating image preload cache.
//!
//! One entry per URL moves `pending -> loaded` or `pending -> error`. The
//! lookup-or-insert of an entry happens under a single lock acquisition, so
//! two callers can never both start a load for the same URL. Callers that
//! arrive while a load is pending are appended to that entry's subscriber
//! list and are resolved, in the order they attached, when the load settles.
//!
//! Every load runs on its own task. Dropping a caller's future does not
//! cancel the load for the other subscribers, and `clear_cache` detaches
//! pending subscribers instead of dropping them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::PreloadError;
use crate::source::{ImageHandle, ImageLoadOptions, ImageSource};

type LoadResult = Result<ImageHandle, PreloadError>;
type Subscriber = oneshot::Sender<LoadResult>;

// =============================================================================
// Entry State
// =============================================================================

/// Public view of a cache entry's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Loaded,
    Error,
}

/// Snapshot of entry counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub loaded: usize,
    pub loading: usize,
    pub errors: usize,
}

struct CacheEntry {
    state: EntryState,
}

enum EntryState {
    Pending {
        /// Identifies the load task that owns this entry
        flight: u64,
        subscribers: Vec<Subscriber>,
    },
    Loaded(ImageHandle),
    Failed(PreloadError),
}

impl CacheEntry {
    fn pending(flight: u64, first: Subscriber) -> Self {
        Self {
            state: EntryState::Pending {
                flight,
                subscribers: vec![first],
            },
        }
    }

    fn status(&self) -> EntryStatus {
        match self.state {
            EntryState::Pending { .. } => EntryStatus::Pending,
            EntryState::Loaded(_) => EntryStatus::Loaded,
            EntryState::Failed(_) => EntryStatus::Error,
        }
    }

    fn is_flight(&self, id: u64) -> bool {
        matches!(self.state, EntryState::Pending { flight, .. } if flight == id)
    }
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,

    /// Subscribers of loads whose entries were cleared while pending
    detached: HashMap<u64, Vec<Subscriber>>,
}

struct CacheInner<S> {
    source: S,
    state: Mutex<CacheState>,
    next_flight: AtomicU64,
}

enum Subscription {
    Ready(ImageHandle),
    Waiting(oneshot::Receiver<LoadResult>),
}

/// A load registered with the cache whose outcome has not been awaited.
pub struct PendingLoad {
    url: String,
    subscription: Subscription,
}

impl PendingLoad {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the load to settle.
    pub async fn wait(self) -> LoadResult {
        match self.subscription {
            Subscription::Ready(handle) => Ok(handle),
            Subscription::Waiting(rx) => rx
                .await
                .unwrap_or(Err(PreloadError::Interrupted { url: self.url })),
        }
    }
}

// =============================================================================
// Preload Cache
// =============================================================================

/// Keyed, in-memory cache of image loads.
///
/// Cloning is cheap and yields a handle to the same cache, so one instance
/// can be shared by every progressive image on a page (or every request in
/// the HTTP layer) while tests construct isolated caches.
///
/// A failed entry stays visible in [`cache_stats`](Self::cache_stats) until
/// the URL is requested again, at which point the load is re-attempted.
///
/// # Example
///
/// ```ignore
/// use image_preloader::{ImageLoadOptions, PreloadCache};
///
/// let cache = PreloadCache::new(source);
/// let image = cache.preload_image("/blog/hero.jpg", &ImageLoadOptions::default()).await?;
/// println!("{:?}", image.dimensions);
/// ```
pub struct PreloadCache<S> {
    inner: Arc<CacheInner<S>>,
}

impl<S> Clone for PreloadCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ImageSource + 'static> PreloadCache<S> {
    /// Create an empty cache backed by `source`.
    pub fn new(source: S) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source,
                state: Mutex::new(CacheState {
                    entries: HashMap::new(),
                    detached: HashMap::new(),
                }),
                next_flight: AtomicU64::new(0),
            }),
        }
    }

    /// The source loads are issued against.
    pub fn source(&self) -> &S {
        &self.inner.source
    }

    /// Load `url` at most once and share the outcome with every caller.
    ///
    /// - loaded entry: resolves immediately with the cached handle
    /// - pending entry: waits on the in-flight load
    /// - no entry, or a failed one: starts a new load
    pub async fn preload_image(&self, url: &str, options: &ImageLoadOptions) -> LoadResult {
        self.begin_load(url, options).await.wait().await
    }

    /// Register interest in `url` and return once its load is cached or in
    /// flight. The outcome is awaited separately with [`PendingLoad::wait`].
    pub async fn begin_load(&self, url: &str, options: &ImageLoadOptions) -> PendingLoad {
        PendingLoad {
            url: url.to_string(),
            subscription: self.subscribe(url, options).await,
        }
    }

    /// Start loading `url` without waiting for the result. Returns once the
    /// entry exists, so a later request for `url` joins this load.
    pub async fn warm(&self, url: &str, options: &ImageLoadOptions) {
        let pending = self.begin_load(url, options).await;
        tokio::spawn(async move {
            let url = pending.url.clone();
            if let Err(e) = pending.wait().await {
                debug!(url = %url, error = %e, "cache warm-up failed");
            }
        });
    }

    /// Return the cached handle for `url` if it has finished loading.
    pub async fn lookup(&self, url: &str) -> Option<ImageHandle> {
        let state = self.inner.state.lock().await;
        match state.entries.get(url).map(|entry| &entry.state) {
            Some(EntryState::Loaded(handle)) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    /// Current state of the entry for `url`, if any.
    pub async fn status(&self, url: &str) -> Option<EntryStatus> {
        let state = self.inner.state.lock().await;
        state.entries.get(url).map(CacheEntry::status)
    }

    /// Count entries by state.
    pub async fn cache_stats(&self) -> CacheStats {
        let state = self.inner.state.lock().await;
        state
            .entries
            .values()
            .fold(CacheStats::default(), |mut stats, entry| {
                stats.total += 1;
                match entry.status() {
                    EntryStatus::Pending => stats.loading += 1,
                    EntryStatus::Loaded => stats.loaded += 1,
                    EntryStatus::Error => stats.errors += 1,
                }
                stats
            })
    }

    /// Drop every entry and return how many were removed.
    ///
    /// In-flight loads keep running and still resolve the callers already
    /// waiting on them, but their results are not written back.
    pub async fn clear_cache(&self) -> usize {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        let cleared = state.entries.len();

        for (_, entry) in state.entries.drain() {
            if let EntryState::Pending {
                flight,
                subscribers,
            } = entry.state
            {
                state.detached.insert(flight, subscribers);
            }
        }

        debug!(cleared, "preload cache cleared");
        cleared
    }

    /// Get-or-create step. Nothing in here awaits between the lookup and the
    /// insert, so it is atomic with respect to other callers.
    async fn subscribe(&self, url: &str, options: &ImageLoadOptions) -> Subscription {
        let mut state = self.inner.state.lock().await;

        match state.entries.get_mut(url).map(|entry| &mut entry.state) {
            Some(EntryState::Loaded(handle)) => {
                debug!(url, "preload cache hit");
                return Subscription::Ready(Arc::clone(handle));
            }
            Some(EntryState::Pending { subscribers, .. }) => {
                let (tx, rx) = oneshot::channel();
                subscribers.push(tx);
                debug!(url, waiting = subscribers.len(), "joined in-flight load");
                return Subscription::Waiting(rx);
            }
            Some(EntryState::Failed(previous)) => {
                debug!(url, error = %previous, "retrying previously failed load");
            }
            None => {}
        }

        let flight = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        state
            .entries
            .insert(url.to_string(), CacheEntry::pending(flight, tx));
        drop(state);

        debug!(url, flight, "starting image load");
        self.spawn_load(url.to_string(), options.clone(), flight);

        Subscription::Waiting(rx)
    }

    fn spawn_load(&self, url: String, options: ImageLoadOptions, flight: u64) {
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            // The fetch runs in its own task so a panicking source still
            // settles the entry.
            let fetch = {
                let inner = Arc::clone(&inner);
                let url = url.clone();
                tokio::spawn(async move { inner.source.load(&url, &options).await })
            };

            let result = match fetch.await {
                Ok(Ok(image)) => Ok(Arc::new(image)),
                Ok(Err(source)) => {
                    warn!(url = %url, error = %source, "image load failed");
                    Err(PreloadError::Failed {
                        url: url.clone(),
                        source,
                    })
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "image load task aborted");
                    Err(PreloadError::Interrupted { url: url.clone() })
                }
            };

            inner.settle(&url, flight, result).await;
        });
    }
}

impl<S> CacheInner<S> {
    /// Record the outcome of `flight` and notify its subscribers in order.
    async fn settle(&self, url: &str, flight: u64, result: LoadResult) {
        let subscribers = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            match state.entries.get_mut(url) {
                Some(entry) if entry.is_flight(flight) => {
                    let settled = match &result {
                        Ok(handle) => EntryState::Loaded(Arc::clone(handle)),
                        Err(e) => EntryState::Failed(e.clone()),
                    };
                    match std::mem::replace(&mut entry.state, settled) {
                        EntryState::Pending { subscribers, .. } => subscribers,
                        _ => Vec::new(),
                    }
                }
                _ => state.detached.remove(&flight).unwrap_or_default(),
            }
        };

        for subscriber in subscribers {
            // A receiver that went away just isn't interested any more
            let _ = subscriber.send(result.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
