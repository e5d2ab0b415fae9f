use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Advisory fetch priority for an image request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPriority {
    High,
    #[default]
    Low,
}

impl FetchPriority {
    /// RFC 9218 `Priority` header value for this hint.
    pub fn header_value(self) -> &'static str {
        match self {
            FetchPriority::High => "u=1",
            FetchPriority::Low => "u=5",
        }
    }
}

/// Options passed through to the image source.
///
/// `sizes` is a responsive width hint; sources may ignore it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLoadOptions {
    #[serde(default)]
    pub sizes: Option<String>,

    #[serde(default)]
    pub priority: FetchPriority,
}

impl ImageLoadOptions {
    pub fn high_priority() -> Self {
        Self {
            sizes: None,
            priority: FetchPriority::High,
        }
    }

    pub fn with_sizes(mut self, sizes: impl Into<String>) -> Self {
        self.sizes = Some(sizes.into());
        self
    }
}

/// A fetched image with the metadata sniffed from its header.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    /// URL the image was requested with (cache key)
    pub url: String,

    /// Raw encoded bytes
    pub data: Bytes,

    /// Width and height, when the header could be read
    pub dimensions: Option<(u32, u32)>,

    /// Detected container format; `None` for SVG
    pub format: Option<ImageFormat>,
}

/// Shared handle to a loaded image. All subscribers of one load receive
/// clones of the same `Arc`.
pub type ImageHandle = Arc<LoadedImage>;

impl LoadedImage {
    pub fn from_parts(
        url: impl Into<String>,
        data: Bytes,
        dimensions: Option<(u32, u32)>,
        format: Option<ImageFormat>,
    ) -> Self {
        Self {
            url: url.into(),
            data,
            dimensions,
            format,
        }
    }

    /// Sniff format and dimensions from the encoded bytes.
    ///
    /// Only the header is parsed. SVG documents are accepted without
    /// dimensions; anything else unrecognisable is a decode error.
    pub fn decode(url: impl Into<String>, data: Bytes) -> Result<Self, LoadError> {
        let url = url.into();

        if data.is_empty() {
            return Err(LoadError::Decode(format!("empty response body for {}", url)));
        }

        if is_svg(&data) {
            return Ok(Self::from_parts(url, data, None, None));
        }

        let reader = ImageReader::new(Cursor::new(&data[..]))
            .with_guessed_format()
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let format = reader
            .format()
            .ok_or_else(|| LoadError::Decode(format!("unrecognised image format for {}", url)))?;

        let dimensions = reader
            .into_dimensions()
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        Ok(Self::from_parts(url, data, Some(dimensions), Some(format)))
    }

    /// MIME type for serving the bytes back out.
    pub fn content_type(&self) -> &'static str {
        match self.format {
            Some(format) => format.to_mime_type(),
            None => "image/svg+xml",
        }
    }

    pub fn width(&self) -> Option<u32> {
        self.dimensions.map(|(w, _)| w)
    }

    pub fn height(&self) -> Option<u32> {
        self.dimensions.map(|(_, h)| h)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn is_svg(data: &[u8]) -> bool {
    let head = &data[..data.len().min(256)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && text.contains("<svg"))
}

/// The image-loading primitive the cache is built on.
///
/// Implementations must be shareable across tasks; each call performs one
/// network (or storage) fetch.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetch and sniff the image at `url`.
    async fn load(&self, url: &str, options: &ImageLoadOptions) -> Result<LoadedImage, LoadError>;

    /// Human-readable description of the backing store (for logging).
    fn describe(&self) -> &str;
}

#[async_trait]
impl<T: ImageSource + ?Sized> ImageSource for Arc<T> {
    async fn load(&self, url: &str, options: &ImageLoadOptions) -> Result<LoadedImage, LoadError> {
        (**self).load(url, options).await
    }

    fn describe(&self) -> &str {
        (**self).describe()
    }
}
