use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{
    path::Path as ObjPath, ClientOptions, MultipartUpload, ObjectStore, PutPayload, RetryConfig,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ServiceError;
use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Fallible stream of body chunks returned by [`StorageManager::fetch`].
pub type ByteStream = BoxStream<'static, object_store::Result<Bytes>>;

const READ_CHUNK_SIZE: usize = 64 * 1024;
/// Minimum size of every part but the last in an S3 multipart upload.
const PART_SIZE: usize = 5 * 1024 * 1024;

#[derive(Clone)]
enum Backend {
    Ready(DynStore),
    Unavailable(Arc<str>),
}

/// Object storage facade bound to one backend and one bucket for its lifetime.
#[derive(Clone)]
pub struct StorageManager {
    backend: Backend,
    backend_kind: StorageKind,
    bucket: String,
}

impl StorageManager {
    /// Create a new StorageManager from configuration.
    ///
    /// Never fails: a backend that cannot be built is recorded and every later
    /// operation reports it as `DelegateUnavailable`.
    pub async fn new(cfg: &AppConfig) -> Self {
        Self::with_client_options(cfg, ClientOptions::new(), RetryConfig::default()).await
    }

    /// Like [`StorageManager::new`] with explicit HTTP client and retry settings for S3.
    pub async fn with_client_options(
        cfg: &AppConfig,
        client_options: ClientOptions,
        retry: RetryConfig,
    ) -> Self {
        let backend = match create_storage_backend(cfg, client_options, retry).await {
            Ok(store) => Backend::Ready(store),
            Err(err) => {
                warn!(
                    error = %err,
                    backend = ?cfg.storage,
                    "Storage backend unavailable; operations will fail"
                );
                Backend::Unavailable(err.to_string().into())
            }
        };

        if cfg.aws_bucket_name.is_empty() && cfg.storage == StorageKind::S3 {
            warn!("No bucket name configured");
        }

        Self {
            backend,
            backend_kind: cfg.storage.clone(),
            bucket: cfg.aws_bucket_name.clone(),
        }
    }

    /// Create a StorageManager with a custom storage backend.
    ///
    /// Useful for tests that want to inject a specific store.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind, bucket: &str) -> Self {
        Self {
            backend: Backend::Ready(store),
            backend_kind,
            bucket: bucket.to_string(),
        }
    }

    /// Get the storage backend kind.
    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    /// Bucket this manager is bound to (may be empty).
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn store(&self) -> Result<&DynStore, ServiceError> {
        match &self.backend {
            Backend::Ready(store) => Ok(store),
            Backend::Unavailable(reason) => {
                Err(ServiceError::DelegateUnavailable(reason.to_string()))
            }
        }
    }

    /// Upload a byte stream under `name`, returning `true` on success.
    ///
    /// Failures are logged and collapse to `false`.
    pub async fn upload<R>(&self, reader: R, name: &str) -> bool
    where
        R: AsyncRead + Unpin + Send,
    {
        match self.try_upload(reader, name).await {
            Ok(()) => true,
            Err(err) => {
                error!(key = %name, bucket = %self.bucket, error = %err, "Error uploading file");
                false
            }
        }
    }

    /// Streamed multipart upload of `reader` to `name`.
    ///
    /// Parts are sent one at a time. Any failure after the upload was started,
    /// including a rejected final part or completion, aborts it before the error
    /// is returned.
    #[instrument(skip_all, fields(key = %name, bucket = %self.bucket))]
    pub async fn try_upload<R>(&self, mut reader: R, name: &str) -> Result<(), ServiceError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let path = ObjPath::parse(name).map_err(object_store::Error::from)?;
        let store = self.store()?;

        let mut upload = store.put_multipart(&path).await?;
        let total = match send_parts(upload.as_mut(), &mut reader).await {
            Ok(total) => total,
            Err(err) => {
                abort_upload(upload.as_mut()).await;
                return Err(err);
            }
        };
        if let Err(err) = upload.complete().await {
            abort_upload(upload.as_mut()).await;
            return Err(err.into());
        }

        info!(bytes = total, "Uploaded object");
        Ok(())
    }

    /// Fetch the body of `name` as a byte stream, or `None` on any failure.
    pub async fn fetch(&self, name: &str) -> Option<ByteStream> {
        match self.try_fetch(name).await {
            Ok(stream) => Some(stream),
            Err(err) => {
                error!(key = %name, bucket = %self.bucket, error = %err, "Error retrieving file");
                None
            }
        }
    }

    /// Fetch the body of `name`, reporting why it failed.
    #[instrument(skip_all, fields(key = %name, bucket = %self.bucket))]
    pub async fn try_fetch(&self, name: &str) -> Result<ByteStream, ServiceError> {
        let path = ObjPath::parse(name).map_err(object_store::Error::from)?;
        let result = self.store()?.get(&path).await?;
        debug!(size = result.meta.size, "Fetched object metadata");
        Ok(result.into_stream())
    }

    /// Store bytes at the specified location in a single request.
    pub async fn put(&self, location: &str, data: Bytes) -> Result<(), ServiceError> {
        let path = ObjPath::parse(location).map_err(object_store::Error::from)?;
        let payload = object_store::PutPayload::from_bytes(data);
        self.store()?.put(&path, payload).await?;
        Ok(())
    }

    /// Retrieve bytes from the specified location, buffered in memory.
    pub async fn get(&self, location: &str) -> Result<Bytes, ServiceError> {
        let path = ObjPath::parse(location).map_err(object_store::Error::from)?;
        let result = self.store()?.get(&path).await?;
        Ok(result.bytes().await?)
    }

    /// Delete the object at `location`.
    pub async fn delete(&self, location: &str) -> Result<(), ServiceError> {
        let path = ObjPath::parse(location).map_err(object_store::Error::from)?;
        self.store()?.delete(&path).await?;
        Ok(())
    }

    /// List all objects below the specified prefix.
    pub async fn list(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<object_store::ObjectMeta>, ServiceError> {
        let prefix_path = prefix.map(ObjPath::from);
        let store = self.store()?;
        Ok(store.list(prefix_path.as_ref()).try_collect().await?)
    }

    /// Check if an object exists at the specified location.
    pub async fn exists(&self, location: &str) -> Result<bool, ServiceError> {
        let path = ObjPath::parse(location).map_err(object_store::Error::from)?;
        match self.store()?.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read `reader` to the end, sending `PART_SIZE` parts and a final remainder.
///
/// At least one part is always sent so that an empty source still completes.
async fn send_parts<R>(upload: &mut dyn MultipartUpload, reader: &mut R) -> Result<u64, ServiceError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut part: Vec<u8> = Vec::with_capacity(PART_SIZE);
    let mut parts_sent: usize = 0;
    let mut total: u64 = 0;

    loop {
        let read = reader.read(&mut buf).await.map_err(|err| {
            ServiceError::InvalidInput(format!("failed to read upload source: {err}"))
        })?;
        if read == 0 {
            break;
        }
        part.extend_from_slice(buf.get(..read).unwrap_or_default());
        total = total.saturating_add(read as u64);

        if part.len() >= PART_SIZE {
            let payload = PutPayload::from(std::mem::take(&mut part));
            upload.put_part(payload).await?;
            parts_sent = parts_sent.saturating_add(1);
        }
    }

    if !part.is_empty() || parts_sent == 0 {
        upload.put_part(PutPayload::from(part)).await?;
    }

    Ok(total)
}

async fn abort_upload(upload: &mut dyn MultipartUpload) {
    if let Err(err) = upload.abort().await {
        debug!(error = %err, "Failed to abort multipart upload");
    }
}

/// Endpoint override from config; blank values count as unset.
fn endpoint_override(cfg: &AppConfig) -> object_store::Result<Option<&str>> {
    let Some(endpoint) = cfg.aws_endpoint.as_deref().map(str::trim) else {
        return Ok(None);
    };
    if endpoint.is_empty() {
        return Ok(None);
    }
    let invalid = |reason: String| object_store::Error::Generic {
        store: "S3",
        source: format!("invalid endpoint {endpoint:?}: {reason}").into(),
    };
    let parsed = url::Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host().is_none() {
        return Err(invalid("expected an absolute http(s) URL".into()));
    }
    Ok(Some(endpoint))
}

/// Create a storage backend based on configuration.
async fn create_storage_backend(
    cfg: &AppConfig,
    client_options: ClientOptions,
    retry: RetryConfig,
) -> object_store::Result<DynStore> {
    match cfg.storage {
        StorageKind::S3 => {
            let mut builder = AmazonS3Builder::new()
                .with_access_key_id(&cfg.aws_access_key)
                .with_secret_access_key(&cfg.aws_secret_key)
                .with_bucket_name(&cfg.aws_bucket_name)
                .with_region(&cfg.aws_region)
                .with_client_options(client_options)
                .with_retry(retry);
            if let Some(endpoint) = endpoint_override(cfg)? {
                builder = builder
                    .with_endpoint(endpoint)
                    .with_allow_http(endpoint.starts_with("http://"));
            }
            Ok(Arc::new(builder.build()?))
        }
        StorageKind::Local => {
            let base = resolve_base_dir(cfg);
            if !base.exists() {
                tokio::fs::create_dir_all(&base).await.map_err(|e| {
                    object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: e.into(),
                    }
                })?;
            }
            let store = LocalFileSystem::new_with_prefix(base)?;
            Ok(Arc::new(store))
        }
        StorageKind::Memory => Ok(Arc::new(InMemory::new())),
    }
}

/// Resolve the absolute base directory used for local storage from config.
///
/// If `data_dir` is relative, it is resolved against the current working directory.
pub fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    if cfg.data_dir.starts_with('/') {
        PathBuf::from(&cfg.data_dir)
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&cfg.data_dir)
    }
}

/// Testing utilities for storage operations.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;

    /// Create a test configuration with memory storage.
    pub fn test_config_memory() -> AppConfig {
        AppConfig {
            open_ai_key: "test".into(),
            aws_bucket_name: "test-bucket".into(),
            storage: StorageKind::Memory,
            ..Default::default()
        }
    }

    /// Create a test configuration rooted at `dir` with local storage.
    pub fn test_config_local(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            open_ai_key: "test".into(),
            aws_bucket_name: "test-bucket".into(),
            data_dir: dir.to_string_lossy().into_owned(),
            storage: StorageKind::Local,
            ..Default::default()
        }
    }

    /// Collect a fetched body into a single buffer.
    pub async fn collect_stream(stream: ByteStream) -> object_store::Result<Vec<u8>> {
        stream
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
    }
}
