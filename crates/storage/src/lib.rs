//! agnostic-storages: cloud agnostic object storage
//!
//! A single `StorageService` facade over per-provider backends. The provider
//! is chosen once at construction; every call is forwarded to its backend.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use agnostic_storages::StorageService;
//!
//! # async fn run() -> agnostic_storages::Result<()> {
//! let storage = StorageService::new("access", "secret", "eu-west-1", "AWS").await?;
//! storage.create_container("demo-bucket").await?;
//! storage
//!     .upload_large_file(
//!         Path::new("a/b.csv"),
//!         "demo-bucket",
//!         "a/b.csv",
//!         storage.transfer_config(),
//!     )
//!     .await?;
//! assert!(storage.record_exists("demo-bucket", "a/b.csv").await?);
//! let url = storage.signed_read_url("demo-bucket", "a/b.csv").await?;
//! # let _ = url;
//! # Ok(())
//! # }
//! ```

pub mod factory;
pub mod service;

pub use ags_core::{
    AccessMode, ConfigManager, ContainerInfo, Credentials, DEFAULT_SIGNED_URL_EXPIRY, Error,
    MemoryBackend, Provider, RecordBody, RecordInfo, Result, StorageBackend, StorageConfig,
    TransferConfig,
};
pub use factory::create_backend;
pub use service::StorageService;
