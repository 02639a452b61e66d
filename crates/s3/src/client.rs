//! S3 backend implementation
//!
//! Wraps aws-sdk-s3 and implements the StorageBackend trait from ags-core.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::head_object::{HeadObjectError, HeadObjectOutput};
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, Object};

use ags_core::{
    AccessMode, ContainerInfo, Error, RecordBody, RecordInfo, Result, StorageBackend,
    StorageConfig, TransferConfig, UploadTarget, upload_from_path,
};

use crate::multipart::{MAX_PART_SIZE, MIN_PART_SIZE};

/// Region in which S3 rejects an explicit LocationConstraint
const DEFAULT_REGION: &str = "us-east-1";

/// S3 storage backend
#[derive(Debug, Clone)]
pub struct S3Backend {
    pub(crate) inner: aws_sdk_s3::Client,
    region: String,
}

impl S3Backend {
    /// Create a new S3 backend from a storage configuration
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        let creds = &config.credentials;

        let credentials = aws_credential_types::Credentials::new(
            creds.access_key.clone(),
            creds.secret_key.clone(),
            None, // session token
            None, // expiry
            "agnostic-storages-static",
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(creds.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::debug!(
            region = %creds.region,
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            "created S3 client"
        );

        Ok(Self::from_client(
            aws_sdk_s3::Client::from_conf(s3_config),
            creds.region.clone(),
        ))
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: aws_sdk_s3::Client, region: impl Into<String>) -> Self {
        Self {
            inner: client,
            region: region.into(),
        }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    /// List records, optionally restricted to the direct children of a prefix
    async fn list(&self, container: &str, prefix: Option<&str>) -> Result<Vec<RecordInfo>> {
        let records = collect_pages(|token| async move {
            let mut request = self
                .inner
                .list_objects_v2()
                .bucket(container)
                .set_continuation_token(token);

            if let Some(p) = prefix {
                request = request.prefix(p).delimiter("/");
            }

            let output = request
                .send()
                .await
                .map_err(|e| vendor_error("ListObjectsV2", e))?;
            Ok(ListPage::from_output(&output))
        })
        .await?;

        tracing::debug!(container, prefix, count = records.len(), "listed records");
        Ok(records)
    }
}

/// One page of a ListObjectsV2 response
#[derive(Debug)]
pub(crate) struct ListPage {
    pub(crate) records: Vec<RecordInfo>,
    /// Token for the following page, set only while the listing is truncated
    pub(crate) next_token: Option<String>,
}

impl ListPage {
    pub(crate) fn from_output(output: &ListObjectsV2Output) -> Self {
        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Self {
            records: output.contents().iter().map(record_info).collect(),
            next_token,
        }
    }
}

/// Fetch pages until one comes back without a continuation token
///
/// `fetch` receives the token of the previous page, `None` for the first.
pub(crate) async fn collect_pages<F, Fut>(mut fetch: F) -> Result<Vec<RecordInfo>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListPage>>,
{
    let mut records = Vec::new();
    let mut token = None;

    loop {
        let page = fetch(token).await?;
        records.extend(page.records);

        match page.next_token {
            Some(next) => token = Some(next),
            None => return Ok(records),
        }
    }
}

/// Bucket configuration for a region; us-east-1 takes none
pub(crate) fn bucket_configuration(region: &str) -> Option<CreateBucketConfiguration> {
    (region != DEFAULT_REGION).then(|| {
        CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(region))
            .build()
    })
}

/// Wrap an SDK error for `operation`, keeping it as the error source
pub(crate) fn vendor_error<E, R>(operation: &'static str, e: SdkError<E, R>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&e).to_string();
    Error::vendor(operation, message, e)
}

/// Turn a HeadObject result into an existence flag
///
/// Only the service's "not found" answer means the record is absent; every
/// other failure is propagated.
pub(crate) fn exists_from_head<R>(
    result: std::result::Result<HeadObjectOutput, SdkError<HeadObjectError, R>>,
) -> Result<bool>
where
    R: Debug + Send + Sync + 'static,
{
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
        Err(e) => Err(vendor_error("HeadObject", e)),
    }
}

/// Content type sent with uploads, guessed from the file extension
pub(crate) fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn record_info(object: &Object) -> RecordInfo {
    let key = object.key().unwrap_or_default();
    let mut info = RecordInfo::new(key, object.size().unwrap_or(0));

    if let Some(modified) = object.last_modified() {
        info.last_modified = jiff::Timestamp::from_second(modified.secs()).ok();
    }

    if let Some(etag) = object.e_tag() {
        info = info.with_etag(etag);
    }

    if let Some(sc) = object.storage_class() {
        info.storage_class = Some(sc.as_str().to_string());
    }

    info
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let response = self
            .inner
            .list_buckets()
            .send()
            .await
            .map_err(|e| vendor_error("ListBuckets", e))?;

        let buckets = response
            .buckets()
            .iter()
            .map(|b| {
                let mut info = ContainerInfo::new(b.name().unwrap_or_default());
                if let Some(creation_date) = b.creation_date() {
                    info.created = jiff::Timestamp::from_second(creation_date.secs()).ok();
                }
                info
            })
            .collect();

        Ok(buckets)
    }

    async fn create_container(&self, name: &str) -> Result<()> {
        self.inner
            .create_bucket()
            .bucket(name)
            .set_create_bucket_configuration(bucket_configuration(&self.region))
            .send()
            .await
            .map_err(|e| vendor_error("CreateBucket", e))?;

        tracing::info!(bucket = name, region = %self.region, "created bucket");
        Ok(())
    }

    async fn list_records(&self, container: &str) -> Result<Vec<RecordInfo>> {
        self.list(container, None).await
    }

    async fn get_record(&self, container: &str, key: &str) -> Result<RecordBody> {
        let response = self
            .inner
            .get_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| vendor_error("GetObject", e))?;

        let length = response
            .content_length()
            .and_then(|len| u64::try_from(len).ok());

        Ok(RecordBody::new(response.body.into_async_read(), length))
    }

    async fn put_record(&self, container: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let size = data.len();
        let body = aws_sdk_s3::primitives::ByteStream::from(data);

        self.inner
            .put_object()
            .bucket(container)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| vendor_error("PutObject", e))?;

        tracing::debug!(bucket = container, key, size, "stored object");
        Ok(())
    }

    async fn upload_file(&self, path: &Path, container: &str, key: &str) -> Result<()> {
        use ags_core::PartUploader as _;

        let content_type = content_type_for(path);
        let target = UploadTarget {
            container,
            key,
            content_type: Some(&content_type),
        };
        self.upload_whole(path, target).await
    }

    async fn upload_large_file(
        &self,
        path: &Path,
        container: &str,
        key: &str,
        config: &TransferConfig,
    ) -> Result<()> {
        let content_type = content_type_for(path);
        let target = UploadTarget {
            container,
            key,
            content_type: Some(&content_type),
        };

        // Parts outside this range are rejected by S3
        let config = config
            .clone()
            .clamp_chunksize(MIN_PART_SIZE, MAX_PART_SIZE);

        upload_from_path(self, path, target, &config).await?;
        Ok(())
    }

    async fn record_exists(&self, container: &str, key: &str) -> Result<bool> {
        let result = self
            .inner
            .head_object()
            .bucket(container)
            .key(key)
            .send()
            .await;

        exists_from_head(result)
    }

    async fn list_records_by_prefix(
        &self,
        container: &str,
        prefix: &str,
    ) -> Result<Vec<RecordInfo>> {
        self.list(container, Some(prefix)).await
    }

    async fn generate_signed_url(
        &self,
        container: &str,
        key: &str,
        mode: AccessMode,
        expires_in: Duration,
    ) -> Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| Error::Config(format!("Invalid signed URL expiry: {e}")))?;

        let request = match mode {
            AccessMode::Read => self
                .inner
                .get_object()
                .bucket(container)
                .key(key)
                .presigned(presigning)
                .await
                .map_err(|e| vendor_error("PresignGetObject", e))?,
            AccessMode::Write => self
                .inner
                .put_object()
                .bucket(container)
                .key(key)
                .presigned(presigning)
                .await
                .map_err(|e| vendor_error("PresignPutObject", e))?,
        };

        Ok(request.uri().to_string())
    }
}
