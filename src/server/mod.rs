//! HTTP server layer.
//!
//! Exposes the preload cache to page renderers and build tooling so they
//! can warm images ahead of scroll and read cache statistics.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   /preload   /preload/batch   /image   /stats   /cache          │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (requests, error mapping)│  │  (router, CORS, tracing)    │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 ▼
//!                           PreloadCache
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    batch_preload_handler, clear_cache_handler, health_handler, image_handler, preload_handler,
    stats_handler, AppState, BatchBody, BatchItemResponse, BatchResponse, ClearResponse,
    ErrorResponse, HandlerError, HealthResponse, ImageMetadata, ImageQueryParams, PreloadBody,
    PreloadResponse, CACHE_HIT_HEADER,
};
pub use routes::{create_router, RouterConfig};
