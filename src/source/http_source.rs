//! HTTP-backed image source.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use super::{ImageLoadOptions, ImageSource, LoadedImage};
use crate::error::LoadError;

/// Default per-request timeout for the HTTP client.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches images over HTTP(S).
///
/// Relative URLs such as `/images/hero.jpg` are resolved against the base
/// URL given at construction; absolute URLs are fetched as-is.
#[derive(Clone)]
pub struct HttpImageSource {
    client: Client,
    base_url: Option<Url>,
    identifier: String,
}

impl HttpImageSource {
    /// Create a source with an optional base URL and request timeout.
    pub fn new(base_url: Option<&str>, timeout: Duration) -> Result<Self, LoadError> {
        let base_url = base_url
            .map(|base| Url::parse(base).map_err(|e| LoadError::InvalidUrl(format!("{}: {}", base, e))))
            .transpose()?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Connection(e.to_string()))?;

        let identifier = match &base_url {
            Some(base) => base.to_string(),
            None => "http".to_string(),
        };

        Ok(Self {
            client,
            base_url,
            identifier,
        })
    }

    /// The base URL relative paths are resolved against.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Resolve a possibly-relative image URL to an absolute one.
    pub fn resolve(&self, url: &str) -> Result<Url, LoadError> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base
                    .join(url)
                    .map_err(|e| LoadError::InvalidUrl(format!("{}: {}", url, e))),
                None => Err(LoadError::InvalidUrl(format!(
                    "{}: relative URL without a base URL",
                    url
                ))),
            },
            Err(e) => Err(LoadError::InvalidUrl(format!("{}: {}", url, e))),
        }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn load(&self, url: &str, options: &ImageLoadOptions) -> Result<LoadedImage, LoadError> {
        let resolved = self.resolve(url)?;
        debug!(url, resolved = %resolved, "fetching image over HTTP");

        let response = self
            .client
            .get(resolved.clone())
            .header("Priority", options.priority.header_value())
            .send()
            .await
            .map_err(|e| LoadError::Connection(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LoadError::NotFound(resolved.to_string()));
        }
        if !status.is_success() {
            return Err(LoadError::Http {
                status: status.as_u16(),
                url: resolved.to_string(),
            });
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| LoadError::Connection(e.to_string()))?;

        LoadedImage::decode(url, data)
    }

    fn describe(&self) -> &str {
        &self.identifier
    }
}
