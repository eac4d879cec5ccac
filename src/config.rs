//! Configuration management with serde serialization/deserialization
//!
//! This module holds the run configuration for the publisher: where the archive
//! comes from, which bucket receives the site, and how the pipeline is sized.

use crate::PublishError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for a publishing run
///
/// # Examples
///
/// ```rust
/// use warc_publisher::Config;
///
/// let config = Config {
///     input: Some("crawl.warc.gz".into()),
///     bucket: Some("static-archive".to_string()),
///     concurrency: 32,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// WARC file to read (plain or gzip compressed)
    pub input: Option<PathBuf>,

    /// Destination bucket for the published site
    pub bucket: Option<String>,

    /// Number of concurrent upload workers (default: 16)
    pub concurrency: usize,

    /// Capacity of the transaction queue between the reader and the workers (default: 100)
    ///
    /// The reader blocks once this many transactions are waiting, which keeps
    /// memory bounded when uploads fall behind parsing.
    pub queue_capacity: usize,

    /// Insert the archive warning banner into UTF-8 HTML pages (default: false)
    pub add_banner: bool,

    /// Object store client tuning
    pub storage: StorageSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: None,
            bucket: None,
            concurrency: 16,
            queue_capacity: 100,
            add_banner: false,
            storage: StorageSettings::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, PublishError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<(), PublishError> {
        if self.input.as_ref().map_or(true, |p| p.as_os_str().is_empty()) {
            return Err(PublishError::Configuration("--input is required".to_string()));
        }

        if self.bucket.as_deref().map_or(true, str::is_empty) {
            return Err(PublishError::Configuration("--bucket is required".to_string()));
        }

        if self.concurrency == 0 {
            return Err(PublishError::Configuration(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(PublishError::Configuration(
                "Queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.storage.multipart_part_size == 0 {
            return Err(PublishError::Configuration(
                "Multipart part size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Bucket name, empty if unset. Only meaningful after `validate`.
    pub fn bucket_name(&self) -> &str {
        self.bucket.as_deref().unwrap_or_default()
    }
}

/// Object store client settings
///
/// Credentials and region always come from the environment; these only
/// shape the transport and retry behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Connection establishment timeout (default: 5 seconds)
    pub connect_timeout: Duration,

    /// Per-request timeout (default: 30 seconds)
    pub request_timeout: Duration,

    /// Maximum retries for a single put (default: 5)
    pub max_retries: usize,

    /// Total time allowed across retries (default: 120 seconds)
    pub retry_timeout: Duration,

    /// Bodies larger than this are sent as a multipart upload (default: 64 MiB)
    pub multipart_threshold: usize,

    /// Part size for multipart uploads (default: 16 MiB, S3 minimum is 5 MiB)
    pub multipart_part_size: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            max_retries: 5,
            retry_timeout: Duration::from_secs(120),
            multipart_threshold: 64 * 1024 * 1024,
            multipart_part_size: 16 * 1024 * 1024,
        }
    }
}
