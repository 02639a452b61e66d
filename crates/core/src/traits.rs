//! StorageBackend trait definition
//!
//! This trait is the capability set every provider backend implements. The
//! facade only ever talks to a `dyn StorageBackend`, so it stays independent
//! of any vendor SDK and can be tested against a mock or the in-memory
//! backend.

use std::fmt;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::error::Result;
use crate::provider::AccessMode;
use crate::transfer::TransferConfig;

/// A container (bucket) as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Container name
    pub name: String,

    /// Creation timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<Timestamp>,
}

impl ContainerInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created: None,
        }
    }
}

/// Metadata for a record (object)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInfo {
    /// Record key
    pub key: String,

    /// Size in bytes
    pub size_bytes: i64,

    /// Human-readable size
    pub size_human: String,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// ETag without surrounding quotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Storage class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

impl RecordInfo {
    /// Create a new RecordInfo for a key of `size` bytes
    pub fn new(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size_bytes: size,
            size_human: humansize::format_size(size.max(0) as u64, humansize::BINARY),
            last_modified: None,
            etag: None,
            storage_class: None,
        }
    }

    /// Set the ETag, stripping the quotes providers wrap it in
    pub fn with_etag(mut self, etag: &str) -> Self {
        self.etag = Some(etag.trim_matches('"').to_string());
        self
    }
}

/// Streamed content of a record
///
/// Reads straight from the provider's response body. Use `collect` to buffer
/// the whole record.
pub struct RecordBody {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    content_length: Option<u64>,
}

/// Upper bound on the buffer reserved up front by [`RecordBody::collect`]
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

impl RecordBody {
    pub fn new(reader: impl AsyncRead + Send + 'static, content_length: Option<u64>) -> Self {
        Self {
            reader: Box::pin(reader),
            content_length,
        }
    }

    /// Body backed by an in-memory buffer
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self::new(std::io::Cursor::new(data), Some(len))
    }

    /// Content length announced by the provider
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Read the whole body into memory
    pub async fn collect(mut self) -> Result<Vec<u8>> {
        let hint = self.content_length.unwrap_or(0).min(MAX_PREALLOCATION);
        let mut data = Vec::with_capacity(hint as usize);
        self.reader.read_to_end(&mut data).await?;
        Ok(data)
    }
}

impl AsyncRead for RecordBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.reader.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for RecordBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Capability set of a storage provider
///
/// Implementations pass vendor errors through unchanged. The one exception is
/// `record_exists`, which turns the vendor's "not found" into `Ok(false)`.
/// Thread safety is whatever the wrapped vendor client provides.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// List containers
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>>;

    /// Create a container
    async fn create_container(&self, name: &str) -> Result<()>;

    /// List every record in a container
    async fn list_records(&self, container: &str) -> Result<Vec<RecordInfo>>;

    /// Open a record for reading
    async fn get_record(&self, container: &str, key: &str) -> Result<RecordBody>;

    /// Store a record from an in-memory payload
    async fn put_record(&self, container: &str, key: &str, data: Vec<u8>) -> Result<()>;

    /// Upload a local file in a single request
    async fn upload_file(&self, path: &Path, container: &str, key: &str) -> Result<()>;

    /// Upload a local file, in parts when it reaches the multipart threshold
    async fn upload_large_file(
        &self,
        path: &Path,
        container: &str,
        key: &str,
        config: &TransferConfig,
    ) -> Result<()>;

    /// Check whether a record exists
    async fn record_exists(&self, container: &str, key: &str) -> Result<bool>;

    /// List the records directly under a prefix ("/" delimited)
    async fn list_records_by_prefix(&self, container: &str, prefix: &str)
    -> Result<Vec<RecordInfo>>;

    /// Generate a time-limited URL granting `mode` access to a record
    async fn generate_signed_url(
        &self,
        container: &str,
        key: &str,
        mode: AccessMode,
        expires_in: Duration,
    ) -> Result<String>;
}
