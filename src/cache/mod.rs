//! Image preload cache.
//!
//! ```text
//! preload_image(url) ──┐
//! preload_image(url) ──┼──► get-or-create entry ──► one load task ──► ImageSource
//! preload_image(url) ──┘           │                      │
//!                                  ▼                      ▼
//!                          subscribers [1,2,3] ◄──── settle (in order)
//! ```
//!
//! # Components
//!
//! - [`PreloadCache`]: keyed cache of loads with request de-duplication
//! - [`CacheStats`]: entry counts by state
//! - [`BatchOptions`] / [`PreloadRequest`] / [`PreloadOutcome`]: batch preloading

mod batch;
mod preload;

pub use batch::{
    BatchOptions, PreloadOutcome, PreloadRequest, DEFAULT_BATCH_CONCURRENCY,
    DEFAULT_BATCH_TIMEOUT, DEFAULT_BATCH_TIMEOUT_MS,
};
pub use preload::{CacheStats, EntryStatus, PendingLoad, PreloadCache};
