//! Configuration management for the image preloader.
//!
//! This module provides the command-line interface:
//! - Subcommands via clap (`serve`, `warm`, `url`)
//! - Environment variables with `PRELOAD_` prefix
//! - Defaults as named constants
//!
//! # Environment Variables
//!
//! - `PRELOAD_HOST` - Server bind address (default: 0.0.0.0)
//! - `PRELOAD_PORT` - Server port (default: 3000)
//! - `PRELOAD_BASE_URL` - Origin that relative image URLs are fetched from
//! - `PRELOAD_S3_BUCKET` - S3 bucket holding the images
//! - `PRELOAD_S3_PREFIX` - Key prefix inside the bucket
//! - `PRELOAD_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `PRELOAD_S3_REGION` - AWS region (default: us-east-1)
//! - `PRELOAD_FETCH_TIMEOUT_MS` - Per-request fetch timeout (default: 30000)
//! - `PRELOAD_BATCH_CONCURRENCY` - Default batch concurrency (default: 3)
//! - `PRELOAD_BATCH_TIMEOUT_MS` - Default per-item batch timeout (default: 10000)
//! - `PRELOAD_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `PRELOAD_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::cache::{BatchOptions, DEFAULT_BATCH_CONCURRENCY, DEFAULT_BATCH_TIMEOUT_MS};
use crate::progressive::{DEFAULT_LOW_QUALITY, DEFAULT_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// Default timeout of one upstream fetch, in milliseconds.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image Preloader - deduplicating image preload cache and server.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-preloader")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP preload server
    Serve(ServeConfig),

    /// Preload a list of images and report the results as JSON
    Warm(WarmConfig),

    /// Print the optimized URLs and responsive hints for an image
    Url(UrlConfig),
}

/// Where images are fetched from. Exactly one backend must be selected.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceConfig {
    /// Base URL relative image URLs are resolved against (HTTP source).
    #[arg(long, env = "PRELOAD_BASE_URL")]
    pub base_url: Option<String>,

    /// S3 bucket holding the images (S3 source).
    #[arg(long, env = "PRELOAD_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix prepended to image paths inside the bucket.
    #[arg(long, env = "PRELOAD_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "PRELOAD_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "PRELOAD_S3_REGION")]
    pub s3_region: String,

    /// Timeout of a single upstream fetch in milliseconds.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_MS, env = "PRELOAD_FETCH_TIMEOUT_MS")]
    pub fetch_timeout_ms: u64,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), String> {
        match (&self.base_url, &self.s3_bucket) {
            (Some(_), Some(_)) => {
                return Err("Choose one image source: --base-url or --s3-bucket, not both".to_string())
            }
            (None, None) => {
                return Err(
                    "An image source is required. Set --base-url (PRELOAD_BASE_URL) \
                     or --s3-bucket (PRELOAD_S3_BUCKET)"
                        .to_string(),
                )
            }
            (Some(base), None) if base.trim().is_empty() => {
                return Err("--base-url must not be empty".to_string())
            }
            (None, Some(bucket)) if bucket.trim().is_empty() => {
                return Err("S3 bucket name must not be empty".to_string())
            }
            _ => {}
        }

        if self.fetch_timeout_ms == 0 {
            return Err("fetch_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Bucket with any `s3://` scheme stripped.
    pub fn bucket(&self) -> Option<String> {
        self.s3_bucket
            .as_deref()
            .map(|b| b.trim_start_matches("s3://").trim_end_matches('/').to_string())
    }
}

/// Batch settings shared by `serve` and `warm`.
#[derive(Args, Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of simultaneous loads in a batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_CONCURRENCY, env = "PRELOAD_BATCH_CONCURRENCY")]
    pub concurrency: usize,

    /// Per-item batch timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_BATCH_TIMEOUT_MS, env = "PRELOAD_BATCH_TIMEOUT_MS")]
    pub timeout_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_BATCH_CONCURRENCY,
            timeout_ms: DEFAULT_BATCH_TIMEOUT_MS,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn options(&self) -> BatchOptions {
        BatchOptions::new(self.concurrency, Duration::from_millis(self.timeout_ms))
    }
}

/// Configuration of the `serve` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PRELOAD_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PRELOAD_PORT")]
    pub port: u16,

    #[command(flatten)]
    pub source: SourceConfig,

    #[command(flatten)]
    pub batch: BatchConfig,

    /// HTTP Cache-Control max-age in seconds for served images.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "PRELOAD_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated). Any origin when unset.
    #[arg(long, env = "PRELOAD_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.source.validate()?;
        self.batch.validate()?;
        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration of the `warm` subcommand.
#[derive(Args, Debug, Clone)]
pub struct WarmConfig {
    /// Image URLs to preload.
    pub urls: Vec<String>,

    /// File with one URL per line (`#` starts a comment).
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub source: SourceConfig,

    #[command(flatten)]
    pub batch: BatchConfig,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl WarmConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.urls.is_empty() && self.file.is_none() {
            return Err("Nothing to warm: pass URLs or --file".to_string());
        }
        self.source.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}

/// Configuration of the `url` subcommand.
#[derive(Args, Debug, Clone)]
pub struct UrlConfig {
    /// Source image URL.
    pub src: String,

    /// Rendered width in CSS pixels.
    #[arg(long)]
    pub width: u32,

    /// Rendered height in CSS pixels.
    #[arg(long)]
    pub height: u32,

    /// Quality of the full-resolution request (1-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY)]
    pub quality: u8,

    /// Quality of the low-quality request (1-100).
    #[arg(long, default_value_t = DEFAULT_LOW_QUALITY)]
    pub low_quality: u8,

    /// Explicit `sizes` hint; derived from breakpoints when unset.
    #[arg(long)]
    pub sizes: Option<String>,
}

impl UrlConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.src.trim().is_empty() {
            return Err("src must not be empty".to_string());
        }
        if self.width == 0 || self.height == 0 {
            return Err("width and height must be greater than 0".to_string());
        }
        if !(1..=100).contains(&self.quality) || !(1..=100).contains(&self.low_quality) {
            return Err("quality must be between 1 and 100".to_string());
        }
        Ok(())
    }
}

/// Parse a URL list: one URL per line, blank lines and `#` comments ignored.
pub fn parse_url_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
