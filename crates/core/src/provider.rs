//! Provider selector and signed URL access modes
//!
//! Both are closed sets parsed from their symbolic names. Anything outside
//! the set is rejected before a backend is constructed or called.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default lifetime of a signed URL: two hours
pub const DEFAULT_SIGNED_URL_EXPIRY: Duration = Duration::from_secs(7200);

/// Cloud provider selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Provider {
    /// Amazon S3 and S3-compatible services
    Aws,
    /// Azure Blob Storage (declared, no backend yet)
    Azure,
}

impl Provider {
    /// Every selectable provider
    pub const ALL: [Provider; 2] = [Provider::Aws, Provider::Azure];

    /// Symbolic name of the provider
    pub const fn as_str(self) -> &'static str {
        match self {
            Provider::Aws => "AWS",
            Provider::Azure => "AZURE",
        }
    }

    /// Comma separated list of accepted selector values
    pub fn expected() -> String {
        Self::ALL
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidProvider(s.to_string()))
    }
}

impl TryFrom<String> for Provider {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Provider> for String {
    fn from(provider: Provider) -> Self {
        provider.as_str().to_string()
    }
}

/// Access granted by a signed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Download the record (presigned GET)
    Read,
    /// Upload the record (presigned PUT)
    Write,
}

impl AccessMode {
    pub const ALL: [AccessMode; 2] = [AccessMode::Read, AccessMode::Write];

    pub const fn as_str(self) -> &'static str {
        match self {
            AccessMode::Read => "READ",
            AccessMode::Write => "WRITE",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidAccessMode(s.to_string()))
    }
}
