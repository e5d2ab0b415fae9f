//! HTTP request handlers for the image preload API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /stats` - Cache entry counts
//! - `DELETE /cache` - Drop every cache entry
//! - `POST /preload` - Preload one image
//! - `POST /preload/batch` - Preload many images with bounded concurrency
//! - `GET /image?url=` - Serve an image through the cache

use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::cache::{
    BatchOptions, CacheStats, EntryStatus, PreloadCache, PreloadOutcome, PreloadRequest,
};
use crate::error::{LoadError, PreloadError};
use crate::source::{ImageHandle, ImageLoadOptions, ImageSource};

/// Response header telling whether the image was already cached.
pub const CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-preload-cache-hit");

// =============================================================================
// Application State
// =============================================================================

/// Shared application state passed to all handlers via Axum's State extractor.
pub struct AppState<S> {
    /// The preload cache every request goes through
    pub cache: PreloadCache<S>,

    /// Cache-Control max-age for served images, in seconds
    pub cache_max_age: u32,

    /// Batch settings used when a request does not specify them
    pub batch: BatchOptions,
}

impl<S: ImageSource + 'static> AppState<S> {
    pub fn new(cache: PreloadCache<S>) -> Self {
        Self {
            cache,
            cache_max_age: 3600,
            batch: BatchOptions::default(),
        }
    }

    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }

    pub fn with_batch_options(mut self, batch: BatchOptions) -> Self {
        self.batch = batch;
        self
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            cache_max_age: self.cache_max_age,
            batch: self.batch,
        }
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// Body of `POST /preload`.
#[derive(Debug, Deserialize)]
pub struct PreloadBody {
    pub url: String,

    #[serde(flatten)]
    pub options: ImageLoadOptions,
}

/// Body of `POST /preload/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchBody {
    pub items: Vec<PreloadRequest>,

    /// Overrides the server's default concurrency
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Overrides the server's default per-item timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Query parameters of `GET /image`.
#[derive(Debug, Deserialize)]
pub struct ImageQueryParams {
    #[serde(default)]
    pub url: String,

    #[serde(flatten)]
    pub options: ImageLoadOptions,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "timeout")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: status.as_u16(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response of `DELETE /cache`.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    /// Number of entries dropped
    pub cleared: usize,
}

/// Metadata of a loaded image.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageMetadata {
    pub url: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub bytes: usize,
}

impl From<&ImageHandle> for ImageMetadata {
    fn from(image: &ImageHandle) -> Self {
        Self {
            url: image.url.clone(),
            content_type: image.content_type().to_string(),
            width: image.width(),
            height: image.height(),
            bytes: image.len(),
        }
    }
}

/// Response of `POST /preload`.
#[derive(Debug, Serialize)]
pub struct PreloadResponse {
    #[serde(flatten)]
    pub image: ImageMetadata,

    /// Whether the image was already loaded before this request
    pub cache_hit: bool,
}

/// One item of a batch response.
#[derive(Debug, Serialize)]
pub struct BatchItemResponse {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<PreloadOutcome> for BatchItemResponse {
    fn from(outcome: PreloadOutcome) -> Self {
        Self {
            url: outcome.url,
            success: outcome.success,
            image: outcome.result.as_ref().map(ImageMetadata::from),
            error: outcome.error.map(|e| e.to_string()),
        }
    }
}

/// Response of `POST /preload/batch`.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItemResponse>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert PreloadError to HTTP response.
///
/// 5xx errors are logged at ERROR level; missing images at DEBUG.
impl IntoResponse for PreloadError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            PreloadError::Failed {
                source: LoadError::NotFound(_),
                ..
            } => (StatusCode::NOT_FOUND, "not_found"),
            PreloadError::Failed { .. } => (StatusCode::BAD_GATEWAY, "load_failed"),
            PreloadError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            PreloadError::Interrupted { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "interrupted")
            }
        };

        let message = match &self {
            PreloadError::Failed { source, .. } => format!("{}: {}", self, source),
            _ => self.to_string(),
        };

        if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Image not found: {}",
                message
            );
        } else {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        }

        (status, Json(ErrorResponse::new(error_type, message, status))).into_response()
    }
}

/// Errors returned by handlers.
#[derive(Debug)]
pub enum HandlerError {
    Preload(PreloadError),
    BadRequest(String),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Preload(err) => err.into_response(),
            HandlerError::BadRequest(message) => {
                warn!(status = 400, "Client error: {}", message);
                let status = StatusCode::BAD_REQUEST;
                (
                    status,
                    Json(ErrorResponse::new("invalid_request", message, status)),
                )
                    .into_response()
            }
        }
    }
}

impl From<PreloadError> for HandlerError {
    fn from(err: PreloadError) -> Self {
        HandlerError::Preload(err)
    }
}

fn require_url(url: &str) -> Result<&str, HandlerError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(HandlerError::BadRequest("url must not be empty".to_string()));
    }
    Ok(url)
}

/// Preload through the cache, reporting whether the entry was already loaded.
async fn load_through_cache<S: ImageSource + 'static>(
    cache: &PreloadCache<S>,
    url: &str,
    options: &ImageLoadOptions,
) -> Result<(ImageHandle, bool), PreloadError> {
    let cache_hit = cache.status(url).await == Some(EntryStatus::Loaded);
    let image = cache.preload_image(url, options).await?;
    Ok((image, cache_hit))
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// `GET /health` always returns `200 OK` with `{"status": "healthy", "version": ...}`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /stats`: snapshot of cache entry counts.
pub async fn stats_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<CacheStats> {
    Json(state.cache.cache_stats().await)
}

/// `DELETE /cache`: drop every entry. Waiters on in-flight loads still
/// receive their results.
pub async fn clear_cache_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<ClearResponse> {
    let cleared = state.cache.clear_cache().await;
    Json(ClearResponse { cleared })
}

/// Handle single preload requests.
///
/// # Endpoint
///
/// `POST /preload` with body `{"url": ..., "sizes"?: ..., "priority"?: "high"|"low"}`
///
/// # Response
///
/// - `200 OK`: image metadata and whether it was a cache hit
/// - `400 Bad Request`: empty URL
/// - `404 Not Found`: the source has no such image
/// - `502 Bad Gateway`: the load failed
pub async fn preload_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Json(body): Json<PreloadBody>,
) -> Result<Json<PreloadResponse>, HandlerError> {
    let url = require_url(&body.url)?;
    let (image, cache_hit) = load_through_cache(&state.cache, url, &body.options).await?;

    Ok(Json(PreloadResponse {
        image: ImageMetadata::from(&image),
        cache_hit,
    }))
}

/// Handle batch preload requests.
///
/// # Endpoint
///
/// `POST /preload/batch` with body `{"items": [{"src": ...}], "concurrency"?: n, "timeout_ms"?: n}`
///
/// Always `200 OK`; per-item failures are reported in `results`, in
/// request order.
pub async fn batch_preload_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Json(body): Json<BatchBody>,
) -> Json<BatchResponse> {
    let options = BatchOptions::new(
        body.concurrency.unwrap_or(state.batch.concurrency),
        body.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(state.batch.timeout),
    );

    let outcomes = state.cache.preload_images(body.items, &options).await;
    Json(BatchResponse {
        results: outcomes.into_iter().map(BatchItemResponse::from).collect(),
    })
}

/// Serve an image through the cache.
///
/// # Endpoint
///
/// `GET /image?url={url}&sizes={sizes}&priority={high|low}`
///
/// # Headers
///
/// - `Content-Type`: sniffed from the image bytes
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Preload-Cache-Hit: true|false`
pub async fn image_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<ImageQueryParams>,
) -> Result<Response, HandlerError> {
    let url = require_url(&query.url)?;
    let (image, cache_hit) = load_through_cache(&state.cache, url, &query.options).await?;

    let headers = [
        (header::CONTENT_TYPE, image.content_type().to_string()),
        (
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        ),
        (CACHE_HIT_HEADER, cache_hit.to_string()),
    ];

    Ok((StatusCode::OK, headers, Body::from(image.data.clone())).into_response())
}

// =============================================================================
// Tests
// =============================================================================
