//! Configuration management
//!
//! A `StorageConfig` carries everything needed to construct a backend:
//! provider selector, credentials, optional endpoint override and the
//! default transfer settings. It can be built in code or loaded from a TOML
//! file at ~/.config/agnostic-storages/config.toml.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::transfer::TransferConfig;

/// Current configuration schema version
///
/// Bumping this version requires a migration in `ConfigManager::migrate`.
pub const SCHEMA_VERSION: u32 = 1;

/// Access key, secret key and region handed to the backend unmodified
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// Provider region
    pub region: String,
}

impl Credentials {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
        }
    }

    /// Check that every field is present
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("region", &self.region),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Complete storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Selected cloud provider
    pub provider: Provider,

    /// Custom endpoint URL (S3-compatible services and local emulators)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Use path-style bucket addressing
    #[serde(default)]
    pub force_path_style: bool,

    /// Provider credentials
    pub credentials: Credentials,

    /// Default settings for large file uploads
    #[serde(default)]
    pub transfer: TransferConfig,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl StorageConfig {
    /// Create a configuration with default endpoint and transfer settings
    pub fn new(provider: Provider, credentials: Credentials) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            provider,
            credentials,
            endpoint: None,
            force_path_style: false,
            transfer: TransferConfig::default(),
        }
    }

    /// Point the backend at a custom endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }

    pub fn with_transfer(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }

    /// Validate credentials, endpoint and transfer settings
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)?;
        }
        self.transfer.validate()
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        let config_path = config_dir.join("agnostic-storages").join("config.toml");
        Ok(Self { config_path })
    }

    /// Create a ConfigManager with a custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load and validate the configuration from disk
    ///
    /// A missing file is an error.
    pub fn load(&self) -> Result<StorageConfig> {
        if !self.config_path.exists() {
            return Err(Error::Config(format!(
                "Configuration file not found: {}",
                self.config_path.display()
            )));
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: StorageConfig = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        config.validate()?;
        tracing::debug!(
            path = %self.config_path.display(),
            provider = %config.provider,
            "loaded storage configuration"
        );
        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist. The file holds
    /// credentials, so on Unix it is restricted to the owner (0600).
    pub fn save(&self, config: &StorageConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, mut config: StorageConfig) -> Result<StorageConfig> {
        // Version 0 files predate the field; their layout matches version 1.
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = ConfigManager::with_path(config_path);
        (manager, temp_dir)
    }

    fn sample_config() -> StorageConfig {
        StorageConfig::new(
            Provider::Aws,
            Credentials::new("minioadmin", "minioadmin", "us-east-1"),
        )
    }

    #[test]
    fn test_new_config_defaults() {
        let config = sample_config();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.provider, Provider::Aws);
        assert!(config.endpoint.is_none());
        assert!(!config.force_path_style);
        assert_eq!(config.transfer, TransferConfig::default());
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials::new("AKIAEXAMPLE", "super-secret", "eu-west-1");
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_validate_missing_credentials() {
        let config = StorageConfig::new(Provider::Aws, Credentials::new("", "secret", "us-east-1"));
        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("access_key"));

        let config = StorageConfig::new(Provider::Aws, Credentials::new("key", "secret", " "));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_endpoint() {
        let config = sample_config().with_endpoint("http://localhost:9000");
        assert!(config.validate().is_ok());

        let config = sample_config().with_endpoint("not a url");
        assert!(matches!(config.validate(), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let (manager, _temp_dir) = temp_config_manager();
        let err = manager.load().unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_save_and_load() {
        let (manager, _temp_dir) = temp_config_manager();

        let config = sample_config()
            .with_endpoint("http://localhost:9000")
            .with_path_style(true)
            .with_transfer(TransferConfig::new().max_concurrency(4));
        manager.save(&config).unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded.provider, Provider::Aws);
        assert_eq!(loaded.credentials, config.credentials);
        assert_eq!(loaded.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(loaded.force_path_style);
        assert_eq!(loaded.transfer.max_concurrency, 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (manager, _temp_dir) = temp_config_manager();
        manager.save(&sample_config()).unwrap();

        let mode = std::fs::metadata(manager.config_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_load_minimal_file_uses_defaults() {
        let (manager, _temp_dir) = temp_config_manager();
        let content = r#"
            provider = "AWS"

            [credentials]
            access_key = "ak"
            secret_key = "sk"
            region = "eu-central-1"
        "#;
        std::fs::write(manager.config_path(), content).unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.credentials.region, "eu-central-1");
        assert_eq!(config.transfer, TransferConfig::default());
    }

    #[test]
    fn test_load_unknown_provider() {
        let (manager, _temp_dir) = temp_config_manager();
        let content = r#"
            provider = "GCP"

            [credentials]
            access_key = "ak"
            secret_key = "sk"
            region = "us-east-1"
        "#;
        std::fs::write(manager.config_path(), content).unwrap();

        let err = manager.load().unwrap_err();
        assert!(matches!(err, Error::TomlParse(_)));
        assert!(err.to_string().contains("GCP"));
    }

    #[test]
    fn test_schema_version_too_new() {
        let (manager, _temp_dir) = temp_config_manager();

        let content = format!(
            r#"
            schema_version = {}
            provider = "AWS"

            [credentials]
            access_key = "ak"
            secret_key = "sk"
            region = "us-east-1"
            "#,
            SCHEMA_VERSION + 1
        );
        std::fs::write(manager.config_path(), content).unwrap();

        let result = manager.load();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("newer than supported")
        );
    }

    #[test]
    fn test_schema_version_zero_is_migrated() {
        let (manager, _temp_dir) = temp_config_manager();
        let content = r#"
            schema_version = 0
            provider = "AWS"

            [credentials]
            access_key = "ak"
            secret_key = "sk"
            region = "us-east-1"
        "#;
        std::fs::write(manager.config_path(), content).unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
    }
}
