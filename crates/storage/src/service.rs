//! Storage facade
//!
//! `StorageService` is the single entry point for callers. It owns exactly
//! one backend, chosen at construction, and forwards every operation to it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ags_core::{
    AccessMode, ConfigManager, ContainerInfo, Credentials, DEFAULT_SIGNED_URL_EXPIRY, Provider,
    RecordBody, RecordInfo, Result, StorageBackend, StorageConfig, TransferConfig,
};

use crate::factory::create_backend;

/// Cloud agnostic storage facade
///
/// Cheap to clone; clones share the backend. Concurrent use is as safe as
/// the backend's vendor client, which for the AWS SDK is safe to share.
#[derive(Clone)]
pub struct StorageService {
    provider: Provider,
    backend: Arc<dyn StorageBackend>,
    transfer: TransferConfig,
}

impl StorageService {
    /// Connect with explicit credentials and a provider selector
    ///
    /// The selector is one of `"AWS"` or `"AZURE"`; anything else fails with
    /// `Error::InvalidProvider` before any client is built.
    pub async fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
        provider: &str,
    ) -> Result<Self> {
        let provider: Provider = provider.parse()?;
        let credentials = Credentials::new(access_key, secret_key, region);
        Self::from_config(&StorageConfig::new(provider, credentials)).await
    }

    /// Connect using a full configuration
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let backend = create_backend(config).await?;
        tracing::info!(provider = %config.provider, "storage service ready");
        Ok(Self {
            provider: config.provider,
            backend,
            transfer: config.transfer.clone(),
        })
    }

    /// Connect using the configuration file managed by `manager`
    pub async fn from_config_file(manager: &ConfigManager) -> Result<Self> {
        let config = manager.load()?;
        Self::from_config(&config).await
    }

    /// Wrap an existing backend
    pub fn with_backend(provider: Provider, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            provider,
            backend,
            transfer: TransferConfig::default(),
        }
    }

    /// Replace the default transfer settings
    pub fn with_transfer_config(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }

    /// Selected provider
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Default transfer settings for `upload_large_file`
    pub fn transfer_config(&self) -> &TransferConfig {
        &self.transfer
    }

    pub async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        self.backend.list_containers().await
    }

    pub async fn create_container(&self, name: &str) -> Result<()> {
        self.backend.create_container(name).await
    }

    pub async fn list_records(&self, container: &str) -> Result<Vec<RecordInfo>> {
        self.backend.list_records(container).await
    }

    /// Open a record for streaming
    pub async fn get_record(&self, container: &str, key: &str) -> Result<RecordBody> {
        self.backend.get_record(container, key).await
    }

    pub async fn put_record(&self, container: &str, key: &str, data: Vec<u8>) -> Result<()> {
        self.backend.put_record(container, key, data).await
    }

    pub async fn upload_file(&self, path: &Path, container: &str, key: &str) -> Result<()> {
        self.backend.upload_file(path, container, key).await
    }

    /// Upload a file, in parts once it reaches `config.multipart_threshold`
    ///
    /// Pass `self.transfer_config()` for the configured defaults.
    pub async fn upload_large_file(
        &self,
        path: &Path,
        container: &str,
        key: &str,
        config: &TransferConfig,
    ) -> Result<()> {
        self.backend
            .upload_large_file(path, container, key, config)
            .await
    }

    /// Check whether a record exists; a missing record is `Ok(false)`
    pub async fn record_exists(&self, container: &str, key: &str) -> Result<bool> {
        self.backend.record_exists(container, key).await
    }

    pub async fn list_records_by_prefix(
        &self,
        container: &str,
        prefix: &str,
    ) -> Result<Vec<RecordInfo>> {
        self.backend.list_records_by_prefix(container, prefix).await
    }

    /// Generate a signed URL for `action` (`"READ"` or `"WRITE"`)
    ///
    /// An unknown action fails with `Error::InvalidAccessMode` without
    /// reaching the backend.
    pub async fn generate_signed_url(
        &self,
        container: &str,
        key: &str,
        action: &str,
        expires_in: Duration,
    ) -> Result<String> {
        let mode: AccessMode = action.parse()?;
        self.backend
            .generate_signed_url(container, key, mode, expires_in)
            .await
    }

    /// Signed read URL valid for the default two hours
    pub async fn signed_read_url(&self, container: &str, key: &str) -> Result<String> {
        self.backend
            .generate_signed_url(container, key, AccessMode::Read, DEFAULT_SIGNED_URL_EXPIRY)
            .await
    }
}

impl fmt::Debug for StorageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageService")
            .field("provider", &self.provider)
            .field("transfer", &self.transfer)
            .finish_non_exhaustive()
    }
}
