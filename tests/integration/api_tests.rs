//! API integration tests for preloading and error handling.
//!
//! Tests verify:
//! - Single and batch preload endpoints
//! - Image serving with cache headers
//! - Stats and cache clearing
//! - Error cases (missing image, empty URL, malformed body)

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use image_preloader::{create_router, PreloadCache, RouterConfig};

use super::test_utils::{jpeg_bytes, png_bytes, MockImageSource};

fn test_source() -> Arc<MockImageSource> {
    Arc::new(
        MockImageSource::new()
            .with_image("/hero.png", png_bytes(120, 80))
            .with_image("/team.jpg", jpeg_bytes(40, 30)),
    )
}

fn test_router(source: Arc<MockImageSource>) -> Router {
    create_router(
        PreloadCache::new(source),
        RouterConfig::new().with_tracing(false),
    )
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Health and Stats
// =============================================================================

#[tokio::test]
async fn test_health() {
    let response = test_router(test_source()).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_stats_empty() {
    let response = test_router(test_source()).oneshot(get("/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(
        json,
        serde_json::json!({"total": 0, "loaded": 0, "loading": 0, "errors": 0})
    );
}

// =============================================================================
// Single Preload
// =============================================================================

#[tokio::test]
async fn test_preload_success_then_cache_hit() {
    let source = test_source();
    let router = test_router(Arc::clone(&source));

    let response = router
        .clone()
        .oneshot(post_json("/preload", serde_json::json!({"url": "/hero.png"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["url"], "/hero.png");
    assert_eq!(json["content_type"], "image/png");
    assert_eq!(json["width"], 120);
    assert_eq!(json["height"], 80);
    assert_eq!(json["cache_hit"], false);

    let response = router
        .clone()
        .oneshot(post_json(
            "/preload",
            serde_json::json!({"url": "/hero.png", "priority": "high"}),
        ))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["cache_hit"], true);
    assert_eq!(source.request_count("/hero.png").await, 1);

    let stats = json_body(router.oneshot(get("/stats")).await.unwrap()).await;
    assert_eq!(stats["loaded"], 1);
}

#[tokio::test]
async fn test_preload_missing_image_returns_404() {
    let response = test_router(test_source())
        .oneshot(post_json("/preload", serde_json::json!({"url": "/nope.png"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = json_body(response).await;
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to preload image: /nope.png"));
}

#[tokio::test]
async fn test_preload_undecodable_image_returns_502() {
    let source = Arc::new(
        MockImageSource::new().with_image("/notes.txt", bytes::Bytes::from_static(b"hello")),
    );
    let response = test_router(source)
        .oneshot(post_json("/preload", serde_json::json!({"url": "/notes.txt"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["error"], "load_failed");
}

#[tokio::test]
async fn test_preload_empty_url_returns_400() {
    let response = test_router(test_source())
        .oneshot(post_json("/preload", serde_json::json!({"url": "  "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_preload_malformed_body_rejected() {
    let response = test_router(test_source())
        .oneshot(post_json("/preload", serde_json::json!({"src": "/hero.png"})))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

// =============================================================================
// Batch Preload
// =============================================================================

#[tokio::test]
async fn test_batch_always_ok_with_per_item_results() {
    let response = test_router(test_source())
        .oneshot(post_json(
            "/preload/batch",
            serde_json::json!({
                "items": [{"src": "/team.jpg"}, {"src": "/missing.jpg"}, {"src": "/hero.png"}],
                "concurrency": 1,
                "timeout_ms": 5000
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);

    assert_eq!(results[0]["url"], "/team.jpg");
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["image"]["content_type"], "image/jpeg");

    assert_eq!(results[1]["url"], "/missing.jpg");
    assert_eq!(results[1]["success"], false);
    assert!(results[1]["error"].is_string());
    assert!(results[1].get("image").is_none());

    assert_eq!(results[2]["success"], true);
}

#[tokio::test]
async fn test_batch_empty_items() {
    let response = test_router(test_source())
        .oneshot(post_json("/preload/batch", serde_json::json!({"items": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["results"], serde_json::json!([]));
}

// =============================================================================
// Image Serving
// =============================================================================

#[tokio::test]
async fn test_image_served_with_headers() {
    let router = create_router(
        PreloadCache::new(test_source()),
        RouterConfig::new()
            .with_tracing(false)
            .with_cache_max_age(600),
    );

    let response = router
        .clone()
        .oneshot(get("/image?url=%2Fteam.jpg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=600"
    );
    assert_eq!(
        response.headers().get("x-preload-cache-hit").unwrap(),
        "false"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..2], &[0xFF, 0xD8], "body should be the JPEG bytes");

    let response = router.oneshot(get("/image?url=%2Fteam.jpg")).await.unwrap();
    assert_eq!(
        response.headers().get("x-preload-cache-hit").unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_image_missing_url_returns_400() {
    let response = test_router(test_source())
        .oneshot(get("/image"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_image_not_found() {
    let response = test_router(test_source())
        .oneshot(get("/image?url=%2Fabsent.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Cache Clearing
// =============================================================================

#[tokio::test]
async fn test_clear_cache() {
    let source = test_source();
    let router = test_router(Arc::clone(&source));

    for url in ["/hero.png", "/team.jpg"] {
        let response = router
            .clone()
            .oneshot(post_json("/preload", serde_json::json!({ "url": url })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let request = Request::builder()
        .method("DELETE")
        .uri("/cache")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["cleared"], 2);

    let stats = json_body(router.clone().oneshot(get("/stats")).await.unwrap()).await;
    assert_eq!(stats["total"], 0);

    // Cleared entries are fetched again
    router
        .oneshot(post_json("/preload", serde_json::json!({"url": "/hero.png"})))
        .await
        .unwrap();
    assert_eq!(source.request_count("/hero.png").await, 2);
}
