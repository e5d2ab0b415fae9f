use thiserror::Error;

/// Errors reported by an image source when fetching or sniffing an image.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The image does not exist at the source
    #[error("Image not found: {0}")]
    NotFound(String),

    /// Non-success HTTP status from an HTTP source
    #[error("HTTP {status} while fetching {url}")]
    Http { status: u16, url: String },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Payload is not a recognisable image
    #[error("Decode error: {0}")]
    Decode(String),

    /// URL could not be parsed or resolved against the base URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors surfaced to callers of the preload cache.
///
/// Cloneable because one load outcome is delivered to every subscriber
/// waiting on the same URL.
#[derive(Debug, Clone, Error)]
pub enum PreloadError {
    /// The underlying load failed
    #[error("Failed to preload image: {url}")]
    Failed {
        url: String,
        #[source]
        source: LoadError,
    },

    /// A batch item did not settle within the batch timeout
    #[error("Timed out preloading image after {timeout_ms}ms: {url}")]
    Timeout { url: String, timeout_ms: u64 },

    /// The load task ended without reporting an outcome
    #[error("Preload interrupted: {url}")]
    Interrupted { url: String },
}

impl PreloadError {
    /// URL of the image this error refers to.
    pub fn url(&self) -> &str {
        match self {
            PreloadError::Failed { url, .. }
            | PreloadError::Timeout { url, .. }
            | PreloadError::Interrupted { url } => url,
        }
    }

    /// Whether the source reported the image as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PreloadError::Failed {
                source: LoadError::NotFound(_),
                ..
            }
        )
    }
}

/// Errors from intersection observer configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObserverError {
    /// Threshold outside 0.0..=1.0
    #[error("Invalid threshold {0}: must be between 0.0 and 1.0")]
    InvalidThreshold(f64),

    /// Root margin is not a 1-4 component `px`/`%` list
    #[error("Invalid root margin '{0}': expected 1-4 values in px or %")]
    InvalidRootMargin(String),
}
