//! Error types for ags-core
//!
//! One error type is shared by the facade and every backend so callers can
//! match on a single enum regardless of the selected provider.

use thiserror::Error;

use crate::provider::Provider;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error, as returned by a vendor SDK
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for storage operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file or parameter error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider selector outside the supported set
    #[error("Unsupported provider: {0} (expected one of: {expected})", expected = Provider::expected())]
    InvalidProvider(String),

    /// Signed URL access mode outside the supported set
    #[error("Unsupported access mode: {0} (expected one of: READ, WRITE)")]
    InvalidAccessMode(String),

    /// Provider is declared but has no backend
    #[error("Storage backend not implemented for provider {0}")]
    BackendNotImplemented(Provider),

    /// Failure reported by the provider SDK, carried unchanged as the source
    #[error("{operation} failed: {message}")]
    Vendor {
        operation: &'static str,
        message: String,
        #[source]
        source: BoxError,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Resource not found (in-memory backend)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict error (in-memory backend)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Wrap an SDK error for the named operation
    pub fn vendor<E>(operation: &'static str, message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Vendor {
            operation,
            message: message.into(),
            source: source.into(),
        }
    }

    /// Whether this error was raised before any network interaction
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::InvalidProvider(_)
                | Error::InvalidAccessMode(_)
                | Error::BackendNotImplemented(_)
                | Error::TomlParse(_)
                | Error::TomlSerialize(_)
                | Error::InvalidUrl(_)
        )
    }

    /// Whether this error came from the provider SDK
    pub const fn is_vendor_error(&self) -> bool {
        matches!(self, Error::Vendor { .. })
    }
}
