//! Test utilities for integration tests.
//!
//! Provides mock image sources and helpers for building real image payloads.

use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};

use image_preloader::{ImageLoadOptions, ImageSource, LoadError, LoadedImage};

// =============================================================================
// Image Payloads
// =============================================================================

/// Encode a solid-colour PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 120, 40]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    Bytes::from(buf)
}

/// Encode a solid-colour JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_pixel(width, height, Rgb([10, 60, 200]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .expect("encode jpeg");
    Bytes::from(buf)
}

// =============================================================================
// Mock Image Source
// =============================================================================

/// Serves pre-configured images by path, like an image CDN: query strings
/// (resize parameters) are ignored when looking an image up, but every
/// request is recorded with its full URL.
pub struct MockImageSource {
    images: HashMap<String, Bytes>,
    requests: Arc<RwLock<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockImageSource {
    pub fn new() -> Self {
        Self {
            images: HashMap::new(),
            requests: Arc::new(RwLock::new(Vec::new())),
            delay: None,
        }
    }

    pub fn with_image(mut self, path: impl Into<String>, data: Bytes) -> Self {
        self.images.insert(path.into(), data);
        self
    }

    /// Delay every load by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn requests(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }

    pub async fn request_count(&self, url: &str) -> usize {
        self.requests
            .read()
            .await
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

impl Default for MockImageSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageSource for MockImageSource {
    async fn load(&self, url: &str, _options: &ImageLoadOptions) -> Result<LoadedImage, LoadError> {
        self.requests.write().await.push(url.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let path = url.split('?').next().unwrap_or(url);
        match self.images.get(path) {
            Some(data) => LoadedImage::decode(url, data.clone()),
            None => Err(LoadError::NotFound(url.to_string())),
        }
    }

    fn describe(&self) -> &str {
        "mock://images"
    }
}

// =============================================================================
// Manually Completed Source
// =============================================================================

type Completion = oneshot::Sender<Result<LoadedImage, LoadError>>;

/// A source whose loads stay pending until the test settles them, standing
/// in for the load/error events of a real fetch.
#[derive(Clone, Default)]
pub struct ManualSource {
    pending: Arc<Mutex<Vec<(String, Completion)>>>,
    issued: Arc<Mutex<Vec<String>>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loads ever issued.
    pub fn issued(&self) -> usize {
        self.issued.lock().unwrap().len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Wait until `count` loads are pending.
    pub async fn wait_pending(&self, count: usize) {
        while self.pending_count() < count {
            tokio::task::yield_now().await;
        }
    }

    /// Fire the success event for `url`.
    pub fn succeed(&self, url: &str) {
        let image = LoadedImage::decode(url, png_bytes(4, 3)).expect("decode png");
        self.settle(url, Ok(image));
    }

    /// Fire the error event for `url`.
    pub fn fail(&self, url: &str) {
        self.settle(url, Err(LoadError::Connection("connection reset".into())));
    }

    fn settle(&self, url: &str, result: Result<LoadedImage, LoadError>) {
        let mut pending = self.pending.lock().unwrap();
        let index = pending
            .iter()
            .position(|(u, _)| u == url)
            .unwrap_or_else(|| panic!("no pending load for {}", url));
        let (_, completion) = pending.remove(index);
        let _ = completion.send(result);
    }
}

#[async_trait]
impl ImageSource for ManualSource {
    async fn load(&self, url: &str, _options: &ImageLoadOptions) -> Result<LoadedImage, LoadError> {
        let (tx, rx) = oneshot::channel();
        self.issued.lock().unwrap().push(url.to_string());
        self.pending.lock().unwrap().push((url.to_string(), tx));

        rx.await
            .unwrap_or_else(|_| Err(LoadError::Connection("load abandoned".into())))
    }

    fn describe(&self) -> &str {
        "manual"
    }
}
