pub mod gcs;

pub use gcs::GcsBucket;

use std::fmt;
use std::str::FromStr;

use crate::error::{PipelineError, Result};

const SCHEME: &str = "gs://";

/// Byte storage bound to a single bucket.
pub trait BlobStore {
    fn bucket(&self) -> &str;

    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    fn read_bytes(&self, name: &str) -> Result<Vec<u8>>;

    fn read_text(&self, name: &str) -> Result<String> {
        String::from_utf8(self.read_bytes(name)?)
            .map_err(|e| PipelineError::MalformedResult(format!("{} is not UTF-8: {}", name, e)))
    }

    /// Locator for an object in this bucket.
    fn locator(&self, name: &str) -> BlobLocator {
        BlobLocator::new(self.bucket(), name)
    }
}

/// A `gs://bucket/path` reference as used in annotation requests and results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobLocator {
    pub bucket: String,
    pub path: String,
}

impl BlobLocator {
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    /// The last path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl fmt::Display for BlobLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", SCHEME, self.bucket, self.path)
    }
}

impl FromStr for BlobLocator {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix(SCHEME)
            .ok_or_else(|| PipelineError::InvalidLocator(s.to_string()))?;
        match rest.split_once('/') {
            Some((bucket, path)) if !bucket.is_empty() && !path.is_empty() => {
                Ok(Self::new(bucket, path))
            }
            _ => Err(PipelineError::InvalidLocator(s.to_string())),
        }
    }
}
