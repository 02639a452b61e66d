//! Multipart upload support
//!
//! Implements the `PartUploader` primitives over the S3 multipart API. The
//! driver in ags-core decides when to use them and how many parts run at
//! once; this module only issues the requests.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use aws_smithy_types::byte_stream::{ByteStream, Length};

use ags_core::{CompletedPart, Error, MultipartUpload, PartSpec, PartUploader, Result, UploadTarget};

use crate::client::{S3Backend, vendor_error};

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

fn read_error(e: aws_smithy_types::byte_stream::error::Error) -> Error {
    Error::Io(std::io::Error::other(e))
}

#[async_trait]
impl PartUploader for S3Backend {
    async fn upload_whole(&self, source: &Path, target: UploadTarget<'_>) -> Result<()> {
        let body = ByteStream::from_path(source).await.map_err(read_error)?;

        self.inner
            .put_object()
            .bucket(target.container)
            .key(target.key)
            .set_content_type(target.content_type.map(str::to_string))
            .body(body)
            .send()
            .await
            .map_err(|e| vendor_error("PutObject", e))?;

        tracing::debug!(
            bucket = target.container,
            key = target.key,
            source = %source.display(),
            "uploaded file"
        );
        Ok(())
    }

    async fn create_upload(&self, target: UploadTarget<'_>) -> Result<MultipartUpload> {
        let response = self
            .inner
            .create_multipart_upload()
            .bucket(target.container)
            .key(target.key)
            .set_content_type(target.content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| vendor_error("CreateMultipartUpload", e))?;

        let upload_id = response
            .upload_id()
            .ok_or_else(|| Error::General("CreateMultipartUpload returned no upload id".into()))?;

        Ok(MultipartUpload {
            container: target.container.to_string(),
            key: target.key.to_string(),
            upload_id: upload_id.to_string(),
        })
    }

    async fn upload_part(
        &self,
        upload: &MultipartUpload,
        source: &Path,
        part: PartSpec,
    ) -> Result<CompletedPart> {
        let body = ByteStream::read_from()
            .path(source)
            .offset(part.offset)
            .length(Length::Exact(part.length))
            .build()
            .await
            .map_err(read_error)?;

        let response = self
            .inner
            .upload_part()
            .bucket(&upload.container)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .part_number(part.part_number)
            .content_length(part.length as i64)
            .body(body)
            .send()
            .await
            .map_err(|e| vendor_error("UploadPart", e))?;

        let etag = response.e_tag().ok_or_else(|| {
            Error::General(format!("UploadPart {} returned no ETag", part.part_number))
        })?;

        tracing::debug!(
            upload_id = %upload.upload_id,
            part = part.part_number,
            bytes = part.length,
            "uploaded part"
        );

        Ok(CompletedPart {
            part_number: part.part_number,
            etag: etag.to_string(),
        })
    }

    async fn complete_upload(
        &self,
        upload: &MultipartUpload,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let parts = parts
            .into_iter()
            .map(|p| {
                S3CompletedPart::builder()
                    .e_tag(p.etag)
                    .part_number(p.part_number)
                    .build()
            })
            .collect();

        let multipart = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.inner
            .complete_multipart_upload()
            .bucket(&upload.container)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .multipart_upload(multipart)
            .send()
            .await
            .map_err(|e| vendor_error("CompleteMultipartUpload", e))?;

        Ok(())
    }

    async fn abort_upload(&self, upload: &MultipartUpload) -> Result<()> {
        self.inner
            .abort_multipart_upload()
            .bucket(&upload.container)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .send()
            .await
            .map_err(|e| vendor_error("AbortMultipartUpload", e))?;

        tracing::debug!(upload_id = %upload.upload_id, "aborted multipart upload");
        Ok(())
    }
}
