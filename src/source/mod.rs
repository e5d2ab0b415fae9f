//! Image sources: where the preload cache actually fetches bytes from.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             PreloadCache                │
//! └────────────────────┬────────────────────┘
//!                      │ load(url, options)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          ImageSource Trait              │
//! └────────────────────┬────────────────────┘
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │ HttpImageSource │    │   S3ImageSource     │
//! └─────────────────┘    └─────────────────────┘
//! ```

mod http_source;
mod image_source;
mod s3_source;

use async_trait::async_trait;

pub use http_source::{HttpImageSource, DEFAULT_HTTP_TIMEOUT};
pub use image_source::{FetchPriority, ImageHandle, ImageLoadOptions, ImageSource, LoadedImage};
pub use s3_source::{create_s3_client, S3ImageSource};

use crate::error::LoadError;

/// Whichever backend the command line selected.
#[derive(Clone)]
pub enum ConfiguredSource {
    Http(HttpImageSource),
    S3(S3ImageSource),
}

#[async_trait]
impl ImageSource for ConfiguredSource {
    async fn load(&self, url: &str, options: &ImageLoadOptions) -> Result<LoadedImage, LoadError> {
        match self {
            ConfiguredSource::Http(source) => source.load(url, options).await,
            ConfiguredSource::S3(source) => source.load(url, options).await,
        }
    }

    fn describe(&self) -> &str {
        match self {
            ConfiguredSource::Http(source) => source.describe(),
            ConfiguredSource::S3(source) => source.describe(),
        }
    }
}
