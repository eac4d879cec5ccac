//! Object storage sink for published pages.
//!
//! Workers only see the [`ObjectSink`] capability. The production sink keeps
//! one `object_store` client per bucket, built on first use from the
//! environment's AWS credentials and region. Bodies above the multipart
//! threshold go up in parts.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use object_store::aws::{AmazonS3Builder, AmazonS3ConfigKey};
use object_store::path::Path;
use object_store::{
    Attribute, Attributes, BackoffConfig, ClientConfigKey, ClientOptions, ObjectStore,
    PutMultipartOpts, PutOptions, PutPayload, RetryConfig, WriteMultipart,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::{PublishError, StorageSettings};

/// Put-object capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectSink: Send + Sync {
    /// Store `body` at `key` in `bucket` with the given content type.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<(), PublishError>;
}

type StoreFactory = dyn Fn(&str) -> Result<Arc<dyn ObjectStore>, PublishError> + Send + Sync;

/// [`ObjectSink`] backed by `object_store` clients, cached per bucket.
pub struct ObjectStoreSink {
    stores: DashMap<String, Arc<dyn ObjectStore>>,
    factory: Box<StoreFactory>,
    multipart_threshold: usize,
    multipart_part_size: usize,
}

impl ObjectStoreSink {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn ObjectStore>, PublishError> + Send + Sync + 'static,
    {
        let defaults = StorageSettings::default();
        Self {
            stores: DashMap::new(),
            factory: Box::new(factory),
            multipart_threshold: defaults.multipart_threshold,
            multipart_part_size: defaults.multipart_part_size,
        }
    }

    /// Authenticated S3 clients configured from the environment.
    pub fn s3(settings: StorageSettings) -> Self {
        let (threshold, part_size) = (settings.multipart_threshold, settings.multipart_part_size);
        Self::new(move |bucket| create_s3_store(bucket, &settings))
            .with_multipart(threshold, part_size)
    }

    /// Send bodies larger than `threshold` bytes as multipart uploads.
    pub fn with_multipart(mut self, threshold: usize, part_size: usize) -> Self {
        self.multipart_threshold = threshold;
        self.multipart_part_size = part_size.max(1);
        self
    }

    /// A sink bound to a single, already built store.
    pub fn with_store(bucket: &str, store: Arc<dyn ObjectStore>) -> Self {
        let bound = bucket.to_string();
        let sink = Self::new(move |requested| {
            Err(PublishError::Configuration(format!(
                "No store configured for bucket {requested} (sink is bound to {bound})"
            )))
        });
        sink.stores.insert(bucket.to_string(), store);
        sink
    }

    fn store_for(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, PublishError> {
        if let Some(store) = self.stores.get(bucket) {
            return Ok(store.clone());
        }

        let store = (self.factory)(bucket)?;
        Ok(self
            .stores
            .entry(bucket.to_string())
            .or_insert(store)
            .clone())
    }
}

#[async_trait]
impl ObjectSink for ObjectStoreSink {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<(), PublishError> {
        let store = self.store_for(bucket)?;
        let path = Path::parse(key)
            .map_err(|e| PublishError::Upload(format!("invalid object key {key:?}: {e}")))?;

        let mut attributes = Attributes::new();
        if !content_type.is_empty() {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }

        if body.len() > self.multipart_threshold {
            debug!("Multipart upload of {} bytes to {}/{}", body.len(), bucket, key);
            let options = PutMultipartOpts {
                attributes,
                ..Default::default()
            };
            let upload = store.put_multipart_opts(&path, options).await?;
            let mut writer = WriteMultipart::new_with_chunk_size(upload, self.multipart_part_size);
            writer.write(&body);
            writer.finish().await?;
            return Ok(());
        }

        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        store
            .put_opts(&path, PutPayload::from(body), options)
            .await?;
        Ok(())
    }
}

fn create_client_options(settings: &StorageSettings) -> ClientOptions {
    ClientOptions::new()
        .with_connect_timeout(settings.connect_timeout)
        .with_timeout(settings.request_timeout)
        .with_pool_idle_timeout(Duration::from_secs(90))
        .with_pool_max_idle_per_host(64)
}

fn create_retry_config(settings: &StorageSettings) -> RetryConfig {
    RetryConfig {
        max_retries: settings.max_retries,
        backoff: BackoffConfig {
            init_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            base: 2.0,
        },
        retry_timeout: settings.retry_timeout,
    }
}

/// Create an authenticated S3 client for writing.
///
/// Credentials and region are loaded from (in order):
/// - Environment variables (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_REGION)
/// - AWS config files (~/.aws/credentials, ~/.aws/config)
/// - EC2 instance profile (IMDS)
///
/// Requests use path-style addressing unless `AWS_VIRTUAL_HOSTED_STYLE_REQUEST`
/// is set, so dotted bucket names and custom `AWS_ENDPOINT`s keep working.
pub fn create_s3_store(
    bucket: &str,
    settings: &StorageSettings,
) -> Result<Arc<dyn ObjectStore>, PublishError> {
    info!("Creating authenticated S3 client for bucket: {}", bucket);
    build_s3_store(AmazonS3Builder::from_env(), bucket, settings)
}

fn build_s3_store(
    builder: AmazonS3Builder,
    bucket: &str,
    settings: &StorageSettings,
) -> Result<Arc<dyn ObjectStore>, PublishError> {
    // Client options replace the builder's, including AWS_ALLOW_HTTP.
    let allow_http = builder
        .get_config_value(&AmazonS3ConfigKey::Client(ClientConfigKey::AllowHttp))
        .is_some_and(|value| value.eq_ignore_ascii_case("true"));

    let store = builder
        .with_bucket_name(bucket)
        .with_client_options(create_client_options(settings).with_allow_http(allow_http))
        .with_retry(create_retry_config(settings))
        .build()
        .map_err(|e| PublishError::Configuration(format!("Couldn't create S3 client: {e}")))?;
    Ok(Arc::new(store))
}
