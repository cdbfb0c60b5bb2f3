use async_trait::async_trait;
use aws_sdk_s3::Client;
use bytes::{Bytes, BytesMut};
use tracing::debug;

use super::Locator;
use crate::error::IoError;

/// Progress callback: bytes received so far and the total when known.
pub type Progress<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// Fetches whole resources by locator.
///
/// Implementations must be thread-safe (Send + Sync) so one fetcher can serve
/// concurrent chunk and file requests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the full content of a resource.
    async fn fetch_binary(
        &self,
        locator: &Locator,
        progress: Option<Progress<'_>>,
    ) -> Result<Bytes, IoError>;

    /// Fetch and parse a JSON document.
    async fn fetch_json(&self, locator: &Locator) -> Result<serde_json::Value, IoError> {
        let bytes = self.fetch_binary(locator, None).await?;
        serde_json::from_slice(&bytes).map_err(|e| IoError::Json {
            locator: locator.to_string(),
            message: e.to_string(),
        })
    }
}

// =============================================================================
// DefaultFetcher
// =============================================================================

/// Fetcher backed by reqwest for HTTP, the AWS SDK for S3 and tokio for
/// local files.
#[derive(Clone)]
pub struct DefaultFetcher {
    http: reqwest::Client,
    s3: Option<Client>,
}

impl DefaultFetcher {
    pub fn new(http: reqwest::Client, s3: Option<Client>) -> Self {
        Self { http, s3 }
    }

    /// Fetcher without S3 support.
    pub fn without_s3() -> Self {
        Self::new(reqwest::Client::new(), None)
    }

    async fn fetch_http(
        &self,
        url: &url::Url,
        progress: Option<Progress<'_>>,
    ) -> Result<Bytes, IoError> {
        let mut response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(IoError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(IoError::Http(format!("{} returned {}", url, status)));
        }

        let total = response.content_length();
        let mut buf = BytesMut::with_capacity(total.unwrap_or(0) as usize);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?
        {
            buf.extend_from_slice(&chunk);
            if let Some(progress) = progress {
                progress(buf.len() as u64, total);
            }
        }
        Ok(buf.freeze())
    }

    async fn fetch_s3(&self, bucket: &str, key: &str) -> Result<Bytes, IoError> {
        let client = self
            .s3
            .as_ref()
            .ok_or_else(|| IoError::S3("no S3 client configured".to_string()))?;

        let resp = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);
                if is_not_found || status_is_404 {
                    IoError::NotFound(format!("s3://{}/{}", bucket, key))
                } else {
                    IoError::S3(e.to_string())
                }
            })?;

        Ok(resp
            .body
            .collect()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?
            .into_bytes())
    }
}

#[async_trait]
impl Fetcher for DefaultFetcher {
    async fn fetch_binary(
        &self,
        locator: &Locator,
        progress: Option<Progress<'_>>,
    ) -> Result<Bytes, IoError> {
        debug!(%locator, "fetching");
        let data = match locator {
            Locator::Http(url) => return self.fetch_http(url, progress).await,
            Locator::S3 { bucket, key } => self.fetch_s3(bucket, key).await?,
            Locator::Local(path) => match tokio::fs::read(path).await {
                Ok(data) => Bytes::from(data),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(IoError::NotFound(path.display().to_string()))
                }
                Err(e) => return Err(IoError::Local(format!("{}: {}", path.display(), e))),
            },
        };
        if let Some(progress) = progress {
            progress(data.len() as u64, Some(data.len() as u64));
        }
        Ok(data)
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// A custom endpoint (MinIO and other S3-compatible stores) switches to
/// path-style addressing.
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);
    if let Some(endpoint) = endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    let sdk_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(endpoint_url.is_some())
        .build();
    Client::from_conf(s3_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_fetch_local_file_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        tokio::fs::write(&path, br#"[[1, "liver"]]"#).await.unwrap();

        let fetcher = DefaultFetcher::without_s3();
        let seen = AtomicU64::new(0);
        let progress = |received: u64, _total: Option<u64>| {
            seen.store(received, Ordering::SeqCst);
        };
        let data = fetcher
            .fetch_binary(&Locator::Local(path.clone()), Some(&progress))
            .await
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), data.len() as u64);

        let json = fetcher.fetch_json(&Locator::Local(path)).await.unwrap();
        assert_eq!(json[0][1], "liver");
    }

    #[tokio::test]
    async fn test_fetch_local_missing() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = DefaultFetcher::without_s3();
        let result = fetcher
            .fetch_binary(&Locator::Local(dir.path().join("nope")), None)
            .await;
        assert!(matches!(result, Err(IoError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".zattrs");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let fetcher = DefaultFetcher::without_s3();
        let result = fetcher.fetch_json(&Locator::Local(path)).await;
        assert!(matches!(result, Err(IoError::Json { .. })));
    }

    #[tokio::test]
    async fn test_fetch_s3_without_client() {
        let fetcher = DefaultFetcher::without_s3();
        let locator: Locator = "s3://bucket/key".parse().unwrap();
        let result = fetcher.fetch_binary(&locator, None).await;
        assert!(matches!(result, Err(IoError::S3(_))));
    }
}
