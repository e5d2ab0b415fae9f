//! S3-backed image source.
//!
//! Image URLs are mapped to object keys: the leading `/` is stripped and an
//! optional key prefix is prepended, so `/blog/hero.jpg` with prefix
//! `public/` reads `s3://bucket/public/blog/hero.jpg`.

use async_trait::async_trait;
use aws_sdk_s3::Client;

use super::{ImageLoadOptions, ImageSource, LoadedImage};
use crate::error::LoadError;

/// S3-backed implementation of `ImageSource`.
#[derive(Clone)]
pub struct S3ImageSource {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    identifier: String,
}

impl S3ImageSource {
    /// Create a new source for the given bucket and optional key prefix.
    pub fn new(client: Client, bucket: String, prefix: Option<String>) -> Self {
        let identifier = match &prefix {
            Some(prefix) => format!("s3://{}/{}", bucket, prefix),
            None => format!("s3://{}", bucket),
        };
        Self {
            client,
            bucket,
            prefix,
            identifier,
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key for an image URL.
    pub fn key_for(&self, url: &str) -> String {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let path = path.trim_start_matches('/');
        match &self.prefix {
            Some(prefix) if prefix.ends_with('/') || prefix.is_empty() => {
                format!("{}{}", prefix, path)
            }
            Some(prefix) => format!("{}/{}", prefix, path),
            None => path.to_string(),
        }
    }
}

#[async_trait]
impl ImageSource for S3ImageSource {
    async fn load(&self, url: &str, _options: &ImageLoadOptions) -> Result<LoadedImage, LoadError> {
        let key = self.key_for(url);

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let location = format!("s3://{}/{}", self.bucket, key);

                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if is_not_found {
                    return LoadError::NotFound(location);
                }

                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);
                if status_is_404 {
                    return LoadError::NotFound(location);
                }

                LoadError::S3(e.to_string())
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| LoadError::Connection(e.to_string()))?
            .into_bytes();

        LoadedImage::decode(url, data)
    }

    fn describe(&self) -> &str {
        &self.identifier
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Custom endpoints (MinIO and friends) use path-style addressing.
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
