//! # Image Preloader
//!
//! A deduplicating image preload cache with progressive, visibility-gated
//! image loading.
//!
//! Pages ask for the same hero images, thumbnails and avatars many times
//! over. This library loads each URL once, shares the outcome with every
//! caller, and drives a low-quality-first loading sequence for images that
//! only load once they scroll into view.
//!
//! ## Features
//!
//! - **Request de-duplication**: concurrent requests for one URL share a single load
//! - **Batch preloading**: bounded concurrency with per-item timeouts
//! - **Visibility gating**: intersection observation with an always-visible fallback
//! - **Progressive loading**: placeholder, low-quality, then full-quality image
//! - **HTTP API**: Axum server exposing preload, stats and image endpoints
//!
//! ## Architecture
//!
//! - [`source`] - Image sources (HTTP origin, S3) behind the [`ImageSource`] trait
//! - [`cache`] - Preload cache and batch preloading
//! - [`visibility`] - Intersection observation and the viewport backend
//! - [`progressive`] - Progressive image state machine, loader and URL helpers
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use image_preloader::{HttpImageSource, ImageLoadOptions, PreloadCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = HttpImageSource::new(Some("https://cdn.example.com"), Duration::from_secs(30))?;
//!     let cache = PreloadCache::new(source);
//!
//!     let hero = cache.preload_image("/blog/hero.jpg", &ImageLoadOptions::high_priority()).await?;
//!     println!("{} bytes, {:?}", hero.len(), hero.dimensions);
//!     println!("{:?}", cache.cache_stats().await);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod progressive;
pub mod server;
pub mod source;
pub mod visibility;

// Re-export commonly used types
pub use cache::{
    BatchOptions, CacheStats, EntryStatus, PendingLoad, PreloadCache, PreloadOutcome,
    PreloadRequest, DEFAULT_BATCH_CONCURRENCY, DEFAULT_BATCH_TIMEOUT, DEFAULT_BATCH_TIMEOUT_MS,
};
pub use config::{Cli, Command, ServeConfig, SourceConfig, UrlConfig, WarmConfig};
pub use error::{LoadError, ObserverError, PreloadError};
pub use progressive::{
    blur_placeholder, clamp_quality, optimized_url, srcset, Breakpoints, Effect, ImageEvent,
    ImageLayer, ImageUrlParams, LoadOutcome, LoadPhase, Placeholder, ProgressiveImage,
    ProgressiveImageProps, ProgressiveLoader, RenderPlan, IMAGE_UNAVAILABLE,
};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use source::{
    create_s3_client, ConfiguredSource, FetchPriority, HttpImageSource, ImageHandle,
    ImageLoadOptions, ImageSource, LoadedImage, S3ImageSource,
};
pub use visibility::{
    ElementId, IntersectionEntry, IntersectionWatch, ObserverBackend, ObserverCapability,
    ObserverOptions, Rect, RootMargin, ViewportObserver,
};
