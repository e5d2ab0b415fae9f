//! Batch preloading with admission control.
//!
//! At most `concurrency` items are in flight at once. Items are admitted in
//! submission order as earlier ones settle, and each admitted item is bounded
//! by `timeout`. A timed-out item is reported as failed; the underlying load
//! keeps running and may still populate the cache.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time;
use tracing::{debug, warn};

use super::preload::PreloadCache;
use crate::error::PreloadError;
use crate::source::{ImageHandle, ImageLoadOptions, ImageSource};

/// Default number of simultaneous loads in a batch.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 3;

/// Default per-item timeout in a batch, in milliseconds.
pub const DEFAULT_BATCH_TIMEOUT_MS: u64 = 10_000;

/// Default per-item timeout in a batch.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_millis(DEFAULT_BATCH_TIMEOUT_MS);

/// One image in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadRequest {
    pub src: String,

    #[serde(flatten)]
    pub options: ImageLoadOptions,
}

impl PreloadRequest {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            options: ImageLoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ImageLoadOptions) -> Self {
        self.options = options;
        self
    }
}

impl From<&str> for PreloadRequest {
    fn from(src: &str) -> Self {
        Self::new(src)
    }
}

/// Admission and timeout settings for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Maximum simultaneous loads (0 is treated as 1)
    pub concurrency: usize,

    /// Upper bound for each admitted item
    pub timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_BATCH_CONCURRENCY,
            timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }
}

impl BatchOptions {
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            concurrency,
            timeout,
        }
    }
}

/// Settled result of one batch item.
#[derive(Debug, Clone)]
pub struct PreloadOutcome {
    pub url: String,
    pub success: bool,
    pub result: Option<ImageHandle>,
    pub error: Option<PreloadError>,
}

impl PreloadOutcome {
    fn from_result(url: String, result: Result<ImageHandle, PreloadError>) -> Self {
        match result {
            Ok(handle) => Self {
                url,
                success: true,
                result: Some(handle),
                error: None,
            },
            Err(error) => Self {
                url,
                success: false,
                result: None,
                error: Some(error),
            },
        }
    }
}

impl<S: ImageSource + 'static> PreloadCache<S> {
    /// Preload a list of images with bounded concurrency.
    ///
    /// Always returns one outcome per request, in request order. Individual
    /// failures and timeouts are reported in the outcomes, never as an error
    /// for the whole batch.
    pub async fn preload_images(
        &self,
        requests: Vec<PreloadRequest>,
        options: &BatchOptions,
    ) -> Vec<PreloadOutcome> {
        let admission = Arc::new(Semaphore::new(options.concurrency.max(1)));
        let timeout = options.timeout;
        let mut tasks = Vec::with_capacity(requests.len());

        for request in requests {
            // Acquired here rather than inside the task so admission is FIFO
            let permit = Arc::clone(&admission).acquire_owned().await.ok();
            let cache = self.clone();
            let url = request.src.clone();

            let task = tokio::spawn(async move {
                let _permit = permit;
                let result =
                    match time::timeout(timeout, cache.preload_image(&request.src, &request.options))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => {
                            warn!(url = %request.src, ?timeout, "batch preload timed out");
                            Err(PreloadError::Timeout {
                                url: request.src.clone(),
                                timeout_ms: millis(timeout),
                            })
                        }
                    };
                PreloadOutcome::from_result(request.src, result)
            });

            tasks.push((url, task));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (url, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(url = %url, error = %e, "batch preload task aborted");
                    PreloadOutcome::from_result(url.clone(), Err(PreloadError::Interrupted { url }))
                }
            };
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        debug!(
            succeeded,
            failed = outcomes.len() - succeeded,
            "batch preload settled"
        );

        outcomes
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
