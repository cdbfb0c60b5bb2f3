use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

use crate::error::IoError;

/// Location of a fetchable resource.
///
/// Parsed from `http(s)://` URLs, `s3://bucket/key` URIs, `file://` URLs and
/// bare filesystem paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Http(Url),
    S3 { bucket: String, key: String },
    Local(PathBuf),
}

impl Locator {
    /// Resolve a relative key below this locator.
    ///
    /// The locator is treated as a directory, so `https://host/a.zarr` joined
    /// with `0/.zarray` gives `https://host/a.zarr/0/.zarray`.
    pub fn join(&self, key: &str) -> Result<Locator, IoError> {
        let key = key.trim_start_matches('/');
        match self {
            Locator::Http(url) => {
                let mut base = url.clone();
                if !base.path().ends_with('/') {
                    let path = format!("{}/", base.path());
                    base.set_path(&path);
                }
                base.join(key)
                    .map(Locator::Http)
                    .map_err(|e| IoError::InvalidLocator(format!("{}: {}", key, e)))
            }
            Locator::S3 { bucket, key: prefix } => {
                let prefix = prefix.trim_end_matches('/');
                let key = if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{}/{}", prefix, key)
                };
                Ok(Locator::S3 {
                    bucket: bucket.clone(),
                    key,
                })
            }
            Locator::Local(path) => Ok(Locator::Local(path.join(key))),
        }
    }

    /// Last non-empty path segment, used to name fetched inputs.
    pub fn file_name(&self) -> String {
        let path = match self {
            Locator::Http(url) => url.path().to_string(),
            Locator::S3 { key, .. } => key.clone(),
            Locator::Local(path) => path.to_string_lossy().into_owned(),
        };
        path.trim_end_matches(['/', '\\'])
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

impl FromStr for Locator {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IoError::InvalidLocator("empty locator".to_string()));
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            let url = Url::parse(s).map_err(|e| IoError::InvalidLocator(format!("{}: {}", s, e)))?;
            return Ok(Locator::Http(url));
        }

        if let Some(rest) = s.strip_prefix("s3://") {
            let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(IoError::InvalidLocator(format!("{}: missing bucket", s)));
            }
            return Ok(Locator::S3 {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        if s.starts_with("file://") {
            let url = Url::parse(s).map_err(|e| IoError::InvalidLocator(format!("{}: {}", s, e)))?;
            let path = url
                .to_file_path()
                .map_err(|_| IoError::InvalidLocator(format!("{}: not a file path", s)))?;
            return Ok(Locator::Local(path));
        }

        if s.contains("://") {
            return Err(IoError::InvalidLocator(format!("{}: unsupported scheme", s)));
        }

        Ok(Locator::Local(PathBuf::from(s)))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Http(url) => write!(f, "{}", url),
            Locator::S3 { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
            Locator::Local(path) => write!(f, "{}", path.display()),
        }
    }
}
