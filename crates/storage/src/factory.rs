//! Provider to backend factory
//!
//! Maps each `Provider` variant to its backend. The match is exhaustive, so a
//! new provider variant does not compile until it is either wired to a
//! backend or explicitly rejected here.

use std::sync::Arc;

use ags_core::{Error, Provider, Result, StorageBackend, StorageConfig};
use ags_s3::S3Backend;

/// Construct the backend selected by `config.provider`
pub async fn create_backend(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    match config.provider {
        Provider::Aws => Ok(Arc::new(S3Backend::new(config).await?)),
        Provider::Azure => Err(Error::BackendNotImplemented(Provider::Azure)),
    }
}
