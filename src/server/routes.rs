//! Router configuration for the preload server.
//!
//! # Route Structure
//!
//! ```text
//! /health           GET     - Health check
//! /stats            GET     - Cache statistics
//! /cache            DELETE  - Clear the cache
//! /preload          POST    - Preload one image
//! /preload/batch    POST    - Preload a batch of images
//! /image?url=       GET     - Serve an image through the cache
//! ```
//!
//! # Example
//!
//! ```ignore
//! use image_preloader::{create_router, PreloadCache, RouterConfig};
//!
//! let cache = PreloadCache::new(source);
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(cache, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    routing::{delete, get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    batch_preload_handler, clear_cache_handler, health_handler, image_handler, preload_handler,
    stats_handler, AppState,
};
use crate::cache::{BatchOptions, PreloadCache};
use crate::source::ImageSource;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Default batch settings for `POST /preload/batch`
    pub batch: BatchOptions,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    /// - Batches run 3 loads at a time with a 10 second timeout
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
            batch: BatchOptions::default(),
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    pub fn with_batch_options(mut self, batch: BatchOptions) -> Self {
        self.batch = batch;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router over `cache`.
pub fn create_router<S>(cache: PreloadCache<S>, config: RouterConfig) -> Router
where
    S: ImageSource + 'static,
{
    let app_state = AppState::new(cache)
        .with_cache_max_age(config.cache_max_age)
        .with_batch_options(config.batch);

    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler::<S>))
        .route("/cache", delete(clear_cache_handler::<S>))
        .route("/preload", post(preload_handler::<S>))
        .route("/preload/batch", post(batch_preload_handler::<S>))
        .route("/image", get(image_handler::<S>))
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        // No origins allowed
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
