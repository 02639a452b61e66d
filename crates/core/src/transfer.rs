//! Large file transfers
//!
//! `TransferConfig` decides whether a file goes up in a single request or as
//! a multipart upload, and how it is split. `upload_from_path` drives the
//! upload against any `PartUploader`, keeping at most `max_concurrency`
//! parts in flight.

use std::path::Path;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One gibibyte
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Default multipart threshold: 1 GiB
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = GIB;

/// Default part size: 1 GiB
pub const DEFAULT_MULTIPART_CHUNKSIZE: u64 = GIB;

/// Default number of parts in flight
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: u64 = 10_000;

/// Transfer settings for large file uploads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Files of at least this many bytes are uploaded in parts
    pub multipart_threshold: u64,

    /// Size of each part in bytes
    pub multipart_chunksize: u64,

    /// Number of concurrent part uploads
    pub max_concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            multipart_chunksize: DEFAULT_MULTIPART_CHUNKSIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl TransferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn multipart_threshold(mut self, bytes: u64) -> Self {
        self.multipart_threshold = bytes;
        self
    }

    pub fn multipart_chunksize(mut self, bytes: u64) -> Self {
        self.multipart_chunksize = bytes.max(1);
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Keep the part size inside a provider's accepted range
    pub fn clamp_chunksize(mut self, min: u64, max: u64) -> Self {
        self.multipart_chunksize = self.multipart_chunksize.clamp(min, max);
        self
    }

    /// Reject settings that cannot drive an upload
    ///
    /// Values deserialized from a file bypass the builder, so zero sizes are
    /// caught here.
    pub fn validate(&self) -> Result<()> {
        if self.multipart_chunksize == 0 {
            return Err(Error::Config(
                "multipart_chunksize must be greater than zero".into(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(Error::Config(
                "max_concurrency must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Part size for a file, enlarged when needed to stay within MAX_PARTS
    pub fn part_size_for(&self, file_size: u64) -> u64 {
        let part_size = self.multipart_chunksize.max(1);
        if file_size.div_ceil(part_size) <= MAX_PARTS {
            part_size
        } else {
            file_size.div_ceil(MAX_PARTS)
        }
    }

    /// Decide how a file of `file_size` bytes is uploaded
    pub fn plan(&self, file_size: u64) -> UploadPlan {
        if file_size == 0 || file_size < self.multipart_threshold {
            return UploadPlan::Single { size: file_size };
        }

        let part_size = self.part_size_for(file_size);
        UploadPlan::Multipart {
            size: file_size,
            part_size,
            part_count: calculate_parts(file_size, part_size),
        }
    }
}

/// How a file is sent to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPlan {
    /// One request carrying the whole file
    Single { size: u64 },
    /// Multipart upload
    Multipart {
        size: u64,
        part_size: u64,
        part_count: usize,
    },
}

impl UploadPlan {
    pub fn is_multipart(&self) -> bool {
        matches!(self, UploadPlan::Multipart { .. })
    }

    /// Byte ranges of every part, in part order
    pub fn parts(&self) -> Vec<PartSpec> {
        match *self {
            UploadPlan::Single { .. } => Vec::new(),
            UploadPlan::Multipart {
                size,
                part_size,
                part_count,
            } => (1..=part_count as i32)
                .map(|part_number| {
                    let (start, end) = part_byte_range(part_number, part_size, size);
                    PartSpec {
                        part_number,
                        offset: start,
                        length: end - start,
                    }
                })
                .collect(),
        }
    }
}

/// Calculate number of parts for a file
pub fn calculate_parts(file_size: u64, part_size: u64) -> usize {
    file_size.div_ceil(part_size) as usize
}

/// Get byte range for a part
pub fn part_byte_range(part_number: i32, part_size: u64, total_size: u64) -> (u64, u64) {
    let start = (part_number as u64 - 1) * part_size;
    let end = (start + part_size).min(total_size);
    (start, end)
}

/// Byte range of the source file sent as one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSpec {
    /// 1-based part number
    pub part_number: i32,
    pub offset: u64,
    pub length: u64,
}

/// A part accepted by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// Destination of an upload
#[derive(Debug, Clone, Copy)]
pub struct UploadTarget<'a> {
    pub container: &'a str,
    pub key: &'a str,
    pub content_type: Option<&'a str>,
}

/// A multipart upload in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUpload {
    pub container: String,
    pub key: String,
    pub upload_id: String,
}

/// Provider primitives needed to upload a file, whole or in parts
#[async_trait]
pub trait PartUploader: Send + Sync {
    /// Upload the whole file in one request
    async fn upload_whole(&self, source: &Path, target: UploadTarget<'_>) -> Result<()>;

    /// Start a multipart upload
    async fn create_upload(&self, target: UploadTarget<'_>) -> Result<MultipartUpload>;

    /// Upload one byte range of the source file
    async fn upload_part(
        &self,
        upload: &MultipartUpload,
        source: &Path,
        part: PartSpec,
    ) -> Result<CompletedPart>;

    /// Assemble the uploaded parts, sorted by part number
    async fn complete_upload(
        &self,
        upload: &MultipartUpload,
        parts: Vec<CompletedPart>,
    ) -> Result<()>;

    /// Discard an unfinished upload
    async fn abort_upload(&self, upload: &MultipartUpload) -> Result<()>;
}

/// Upload a local file, in parts when it reaches the multipart threshold
///
/// Returns the plan that was executed. A failed part or completion aborts
/// the multipart upload and returns the original error.
pub async fn upload_from_path<U>(
    uploader: &U,
    source: &Path,
    target: UploadTarget<'_>,
    config: &TransferConfig,
) -> Result<UploadPlan>
where
    U: PartUploader + ?Sized,
{
    config.validate()?;
    let size = tokio::fs::metadata(source).await?.len();
    let plan = config.plan(size);

    if !plan.is_multipart() {
        uploader.upload_whole(source, target).await?;
        return Ok(plan);
    }

    let upload = uploader.create_upload(target).await?;
    tracing::info!(
        container = target.container,
        key = target.key,
        size,
        parts = plan.parts().len(),
        concurrency = config.max_concurrency,
        "started multipart upload"
    );

    let uploaded: Result<Vec<CompletedPart>> = stream::iter(plan.parts())
        .map(|part| uploader.upload_part(&upload, source, part))
        .buffer_unordered(config.max_concurrency)
        .try_collect()
        .await;

    let result = match uploaded {
        Ok(mut parts) => {
            parts.sort_by_key(|p| p.part_number);
            uploader.complete_upload(&upload, parts).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        if let Err(abort_err) = uploader.abort_upload(&upload).await {
            tracing::warn!(
                upload_id = %upload.upload_id,
                error = %abort_err,
                "failed to abort multipart upload"
            );
        }
        return Err(e);
    }

    tracing::info!(
        container = target.container,
        key = target.key,
        "completed multipart upload"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransferConfig::default();
        assert_eq!(config.multipart_threshold, GIB);
        assert_eq!(config.multipart_chunksize, GIB);
        assert_eq!(config.max_concurrency, 10);
    }

    #[test]
    fn test_config_builder() {
        let config = TransferConfig::new()
            .multipart_threshold(8 * 1024 * 1024)
            .multipart_chunksize(16 * 1024 * 1024)
            .max_concurrency(0);

        assert_eq!(config.multipart_threshold, 8 * 1024 * 1024);
        assert_eq!(config.multipart_chunksize, 16 * 1024 * 1024);
        assert_eq!(config.max_concurrency, 1);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = TransferConfig {
            multipart_chunksize: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TransferConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_chunksize() {
        let config = TransferConfig::new().multipart_chunksize(1024).clamp_chunksize(4096, 8192);
        assert_eq!(config.multipart_chunksize, 4096);

        let config = TransferConfig::new().clamp_chunksize(4096, 8192);
        assert_eq!(config.multipart_chunksize, 8192);
    }

    #[test]
    fn test_plan_below_threshold_is_single() {
        let config = TransferConfig::new().multipart_threshold(100);
        assert_eq!(config.plan(99), UploadPlan::Single { size: 99 });
        assert!(config.plan(99).parts().is_empty());
    }

    #[test]
    fn test_plan_at_threshold_is_multipart() {
        let config = TransferConfig::new()
            .multipart_threshold(100)
            .multipart_chunksize(40);
        let plan = config.plan(100);
        assert_eq!(
            plan,
            UploadPlan::Multipart {
                size: 100,
                part_size: 40,
                part_count: 3
            }
        );

        let parts = plan.parts();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].part_number, 3);
        assert_eq!(parts[2].offset, 80);
        assert_eq!(parts[2].length, 20);
        assert_eq!(parts.iter().map(|p| p.length).sum::<u64>(), 100);
    }

    #[test]
    fn test_plan_empty_file_is_single() {
        let config = TransferConfig::new().multipart_threshold(0);
        assert_eq!(config.plan(0), UploadPlan::Single { size: 0 });
    }

    #[test]
    fn test_part_size_respects_part_limit() {
        let config = TransferConfig::new().multipart_chunksize(1024);
        let huge_file = 1024 * MAX_PARTS * 3;
        let size = config.part_size_for(huge_file);
        assert!(calculate_parts(huge_file, size) as u64 <= MAX_PARTS);
    }

    #[test]
    fn test_calculate_parts() {
        assert_eq!(calculate_parts(100, 10), 10);
        assert_eq!(calculate_parts(101, 10), 11);
        assert_eq!(calculate_parts(99, 10), 10);
    }

    #[test]
    fn test_part_byte_range() {
        assert_eq!(part_byte_range(1, 100, 250), (0, 100));
        assert_eq!(part_byte_range(2, 100, 250), (100, 200));
        assert_eq!(part_byte_range(3, 100, 250), (200, 250));
    }

    /// Records every call and reassembles parts in memory
    #[derive(Default)]
    struct RecordingUploader {
        whole: AtomicUsize,
        created: AtomicUsize,
        aborted: AtomicUsize,
        parts: Mutex<Vec<(i32, Vec<u8>)>>,
        completed: Mutex<Option<Vec<i32>>>,
        fail_part: Option<i32>,
        part_delay: Option<std::time::Duration>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl PartUploader for RecordingUploader {
        async fn upload_whole(&self, _source: &Path, _target: UploadTarget<'_>) -> Result<()> {
            self.whole.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn create_upload(&self, target: UploadTarget<'_>) -> Result<MultipartUpload> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(MultipartUpload {
                container: target.container.to_string(),
                key: target.key.to_string(),
                upload_id: "upload-1".to_string(),
            })
        }

        async fn upload_part(
            &self,
            _upload: &MultipartUpload,
            source: &Path,
            part: PartSpec,
        ) -> Result<CompletedPart> {
            if self.fail_part == Some(part.part_number) {
                return Err(Error::General("part rejected".into()));
            }
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
            if let Some(delay) = self.part_delay {
                tokio::time::sleep(delay).await;
            }
            let mut file = tokio::fs::File::open(source).await?;
            file.seek(std::io::SeekFrom::Start(part.offset)).await?;
            let mut buf = vec![0; part.length as usize];
            file.read_exact(&mut buf).await?;
            self.parts.lock().unwrap().push((part.part_number, buf));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(CompletedPart {
                part_number: part.part_number,
                etag: format!("etag-{}", part.part_number),
            })
        }

        async fn complete_upload(
            &self,
            _upload: &MultipartUpload,
            parts: Vec<CompletedPart>,
        ) -> Result<()> {
            *self.completed.lock().unwrap() = Some(parts.iter().map(|p| p.part_number).collect());
            Ok(())
        }

        async fn abort_upload(&self, _upload: &MultipartUpload) -> Result<()> {
            self.aborted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn write_source(len: usize) -> (tempfile::NamedTempFile, Vec<u8>) {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &data).unwrap();
        (file, data)
    }

    fn target() -> UploadTarget<'static> {
        UploadTarget {
            container: "bucket",
            key: "data.bin",
            content_type: None,
        }
    }

    #[tokio::test]
    async fn test_small_file_skips_multipart() {
        let (file, _) = write_source(1000);
        let uploader = RecordingUploader::default();
        let config = TransferConfig::new().multipart_threshold(1001);

        let plan = upload_from_path(&uploader, file.path(), target(), &config)
            .await
            .unwrap();

        assert!(!plan.is_multipart());
        assert_eq!(uploader.whole.load(Ordering::SeqCst), 1);
        assert_eq!(uploader.created.load(Ordering::SeqCst), 0);
        assert!(uploader.parts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_large_file_uploads_every_part_in_order() {
        let (file, data) = write_source(1000);
        let uploader = RecordingUploader::default();
        let config = TransferConfig::new()
            .multipart_threshold(500)
            .multipart_chunksize(128)
            .max_concurrency(3);

        let plan = upload_from_path(&uploader, file.path(), target(), &config)
            .await
            .unwrap();

        assert!(plan.is_multipart());
        assert_eq!(uploader.whole.load(Ordering::SeqCst), 0);
        assert_eq!(uploader.created.load(Ordering::SeqCst), 1);

        let completed = uploader.completed.lock().unwrap().clone().unwrap();
        assert_eq!(completed, (1..=8).collect::<Vec<_>>());

        let mut parts = uploader.parts.lock().unwrap().clone();
        parts.sort_by_key(|(n, _)| *n);
        let reassembled: Vec<u8> = parts.into_iter().flat_map(|(_, b)| b).collect();
        assert_eq!(reassembled, data);
    }

    #[tokio::test]
    async fn test_parts_in_flight_bounded_by_max_concurrency() {
        let (file, data) = write_source(1000);
        let uploader = RecordingUploader {
            part_delay: Some(std::time::Duration::from_millis(20)),
            ..Default::default()
        };
        let config = TransferConfig::new()
            .multipart_threshold(100)
            .multipart_chunksize(50)
            .max_concurrency(3);

        upload_from_path(&uploader, file.path(), target(), &config)
            .await
            .unwrap();

        assert_eq!(uploader.peak_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(uploader.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(uploader.parts.lock().unwrap().len(), 20);

        let mut parts = uploader.parts.lock().unwrap().clone();
        parts.sort_by_key(|(n, _)| *n);
        let reassembled: Vec<u8> = parts.into_iter().flat_map(|(_, b)| b).collect();
        assert_eq!(reassembled, data);
    }

    #[tokio::test]
    async fn test_single_concurrency_uploads_one_part_at_a_time() {
        let (file, _) = write_source(400);
        let uploader = RecordingUploader {
            part_delay: Some(std::time::Duration::from_millis(5)),
            ..Default::default()
        };
        let config = TransferConfig::new()
            .multipart_threshold(100)
            .multipart_chunksize(100)
            .max_concurrency(1);

        upload_from_path(&uploader, file.path(), target(), &config)
            .await
            .unwrap();

        assert_eq!(uploader.peak_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_part_aborts_upload() {
        let (file, _) = write_source(1000);
        let uploader = RecordingUploader {
            fail_part: Some(2),
            ..Default::default()
        };
        let config = TransferConfig::new()
            .multipart_threshold(100)
            .multipart_chunksize(256);

        let err = upload_from_path(&uploader, file.path(), target(), &config)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("part rejected"));
        assert_eq!(uploader.aborted.load(Ordering::SeqCst), 1);
        assert!(uploader.completed.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_source_is_io_error() {
        let uploader = RecordingUploader::default();
        let err = upload_from_path(
            &uploader,
            Path::new("/nonexistent/source.bin"),
            target(),
            &TransferConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(uploader.whole.load(Ordering::SeqCst), 0);
    }
}
