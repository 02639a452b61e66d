//! ags-core: core library for agnostic-storages
//!
//! This crate provides the provider-independent pieces of the storage facade:
//! - Error type and configuration handling
//! - Provider selector and signed URL access modes
//! - Container and record descriptors
//! - The StorageBackend trait every provider implements
//! - Transfer configuration and the multipart upload driver
//! - An in-memory backend for tests
//!
//! It does not depend on any vendor SDK.

pub mod config;
pub mod error;
pub mod memory;
pub mod provider;
pub mod traits;
pub mod transfer;

pub use config::{ConfigManager, Credentials, StorageConfig};
pub use error::{Error, Result};
pub use memory::MemoryBackend;
pub use provider::{AccessMode, DEFAULT_SIGNED_URL_EXPIRY, Provider};
pub use traits::{ContainerInfo, RecordBody, RecordInfo, StorageBackend};
pub use transfer::{
    CompletedPart, MultipartUpload, PartSpec, PartUploader, TransferConfig, UploadPlan,
    UploadTarget, upload_from_path,
};
