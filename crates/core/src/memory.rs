//! In-memory storage backend
//!
//! Behaves like an S3 bucket store held in process memory: containers must be
//! created before use, prefix listings are "/" delimited and multipart
//! uploads are assembled from their parts on completion. Useful as a test
//! double for code built on `StorageService`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{Error, Result};
use crate::provider::AccessMode;
use crate::traits::{ContainerInfo, RecordBody, RecordInfo, StorageBackend};
use crate::transfer::{
    CompletedPart, MultipartUpload, PartSpec, PartUploader, TransferConfig, UploadTarget,
    upload_from_path,
};

#[derive(Debug, Clone)]
struct StoredRecord {
    data: Vec<u8>,
    last_modified: Timestamp,
}

#[derive(Debug)]
struct Container {
    created: Timestamp,
    records: BTreeMap<String, StoredRecord>,
}

/// Call counters, useful to observe which upload path was taken
#[derive(Debug, Default)]
struct Counters {
    whole_uploads: AtomicUsize,
    multipart_uploads: AtomicUsize,
    parts: AtomicUsize,
    aborted: AtomicUsize,
}

/// Storage backend keeping containers and records in memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    containers: Mutex<BTreeMap<String, Container>>,
    pending: Mutex<HashMap<String, BTreeMap<i32, Vec<u8>>>>,
    next_upload_id: AtomicU64,
    counters: Counters,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files uploaded in a single request
    pub fn whole_uploads(&self) -> usize {
        self.counters.whole_uploads.load(Ordering::SeqCst)
    }

    /// Number of multipart uploads started
    pub fn multipart_uploads(&self) -> usize {
        self.counters.multipart_uploads.load(Ordering::SeqCst)
    }

    /// Number of parts received across all multipart uploads
    pub fn parts_uploaded(&self) -> usize {
        self.counters.parts.load(Ordering::SeqCst)
    }

    /// Number of multipart uploads aborted
    pub fn aborted_uploads(&self) -> usize {
        self.counters.aborted.load(Ordering::SeqCst)
    }

    fn store(&self, container: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let mut containers = lock(&self.containers);
        let bucket = containers
            .get_mut(container)
            .ok_or_else(|| Error::NotFound(format!("container {container}")))?;
        bucket.records.insert(
            key.to_string(),
            StoredRecord {
                data,
                last_modified: Timestamp::now(),
            },
        );
        Ok(())
    }

    fn require_container(&self, container: &str) -> Result<()> {
        if lock(&self.containers).contains_key(container) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("container {container}")))
        }
    }
}

fn describe(key: &str, record: &StoredRecord) -> RecordInfo {
    let mut info = RecordInfo::new(key, record.data.len() as i64);
    info.last_modified = Some(record.last_modified);
    info
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        Ok(lock(&self.containers)
            .iter()
            .map(|(name, c)| ContainerInfo {
                name: name.clone(),
                created: Some(c.created),
            })
            .collect())
    }

    async fn create_container(&self, name: &str) -> Result<()> {
        let mut containers = lock(&self.containers);
        if containers.contains_key(name) {
            return Err(Error::Conflict(format!("container {name} already exists")));
        }
        containers.insert(
            name.to_string(),
            Container {
                created: Timestamp::now(),
                records: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn list_records(&self, container: &str) -> Result<Vec<RecordInfo>> {
        let containers = lock(&self.containers);
        let bucket = containers
            .get(container)
            .ok_or_else(|| Error::NotFound(format!("container {container}")))?;
        Ok(bucket
            .records
            .iter()
            .map(|(key, record)| describe(key, record))
            .collect())
    }

    async fn get_record(&self, container: &str, key: &str) -> Result<RecordBody> {
        let containers = lock(&self.containers);
        let record = containers
            .get(container)
            .and_then(|c| c.records.get(key))
            .ok_or_else(|| Error::NotFound(format!("{container}/{key}")))?;
        Ok(RecordBody::from_bytes(record.data.clone()))
    }

    async fn put_record(&self, container: &str, key: &str, data: Vec<u8>) -> Result<()> {
        self.store(container, key, data)
    }

    async fn upload_file(&self, path: &Path, container: &str, key: &str) -> Result<()> {
        let data = tokio::fs::read(path).await?;
        self.store(container, key, data)
    }

    async fn upload_large_file(
        &self,
        path: &Path,
        container: &str,
        key: &str,
        config: &TransferConfig,
    ) -> Result<()> {
        let target = UploadTarget {
            container,
            key,
            content_type: None,
        };
        upload_from_path(self, path, target, config).await?;
        Ok(())
    }

    async fn record_exists(&self, container: &str, key: &str) -> Result<bool> {
        Ok(lock(&self.containers)
            .get(container)
            .is_some_and(|c| c.records.contains_key(key)))
    }

    async fn list_records_by_prefix(
        &self,
        container: &str,
        prefix: &str,
    ) -> Result<Vec<RecordInfo>> {
        let containers = lock(&self.containers);
        let bucket = containers
            .get(container)
            .ok_or_else(|| Error::NotFound(format!("container {container}")))?;
        Ok(bucket
            .records
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .map(|(key, record)| describe(key, record))
            .collect())
    }

    async fn generate_signed_url(
        &self,
        container: &str,
        key: &str,
        mode: AccessMode,
        expires_in: Duration,
    ) -> Result<String> {
        Ok(format!(
            "memory://{container}/{key}?mode={}&expires={}",
            mode.as_str().to_ascii_lowercase(),
            expires_in.as_secs()
        ))
    }
}

#[async_trait]
impl PartUploader for MemoryBackend {
    async fn upload_whole(&self, source: &Path, target: UploadTarget<'_>) -> Result<()> {
        self.require_container(target.container)?;
        self.counters.whole_uploads.fetch_add(1, Ordering::SeqCst);
        let data = tokio::fs::read(source).await?;
        self.store(target.container, target.key, data)
    }

    async fn create_upload(&self, target: UploadTarget<'_>) -> Result<MultipartUpload> {
        self.require_container(target.container)?;
        self.counters.multipart_uploads.fetch_add(1, Ordering::SeqCst);
        let id = self.next_upload_id.fetch_add(1, Ordering::SeqCst);
        let upload_id = format!("memory-upload-{id}");
        lock(&self.pending).insert(upload_id.clone(), BTreeMap::new());
        Ok(MultipartUpload {
            container: target.container.to_string(),
            key: target.key.to_string(),
            upload_id,
        })
    }

    async fn upload_part(
        &self,
        upload: &MultipartUpload,
        source: &Path,
        part: PartSpec,
    ) -> Result<CompletedPart> {
        let mut file = tokio::fs::File::open(source).await?;
        file.seek(std::io::SeekFrom::Start(part.offset)).await?;
        let mut data = vec![0; part.length as usize];
        file.read_exact(&mut data).await?;

        lock(&self.pending)
            .get_mut(&upload.upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload {}", upload.upload_id)))?
            .insert(part.part_number, data);
        self.counters.parts.fetch_add(1, Ordering::SeqCst);

        Ok(CompletedPart {
            part_number: part.part_number,
            etag: format!("{}-{}", upload.upload_id, part.part_number),
        })
    }

    async fn complete_upload(
        &self,
        upload: &MultipartUpload,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let mut received = lock(&self.pending)
            .remove(&upload.upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload {}", upload.upload_id)))?;

        let mut data = Vec::new();
        for part in &parts {
            let chunk = received.remove(&part.part_number).ok_or_else(|| {
                Error::General(format!("part {} was never uploaded", part.part_number))
            })?;
            data.extend_from_slice(&chunk);
        }
        self.store(&upload.container, &upload.key, data)
    }

    async fn abort_upload(&self, upload: &MultipartUpload) -> Result<()> {
        lock(&self.pending).remove(&upload.upload_id);
        self.counters.aborted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
