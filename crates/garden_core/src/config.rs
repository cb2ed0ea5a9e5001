//! Garden configuration.
//!
//! # Responsibility
//! - Carry quota thresholds and repair policy into `Garden::open`.
//! - Parse optional JSON settings documents with every field defaulted.
//!
//! # Invariants
//! - `warn_limit_bytes < hard_limit_bytes` and both are non-zero.
//! - Config is passed explicitly; core never reads environment variables.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Hard ceiling for the backend (≈9.5 MiB).
pub const DEFAULT_HARD_LIMIT_BYTES: u64 = 9_961_472;
/// Warning threshold (8 MiB).
pub const DEFAULT_WARN_LIMIT_BYTES: u64 = 8 * 1024 * 1024;
/// Sentinel category receiving notes whose category was deleted.
pub const DEFAULT_UNCATEGORIZED_NAME: &str = "Uncategorized";

/// Invalid configuration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Settings document is not valid JSON for `GardenConfig`.
    Parse(String),
    /// Quota thresholds are zero or out of order.
    InvalidQuota { warn: u64, hard: u64 },
    /// Sentinel category name is blank.
    BlankUncategorizedName,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid garden config: {message}"),
            Self::InvalidQuota { warn, hard } => write!(
                f,
                "quota warn limit ({warn} bytes) must be non-zero and below hard limit ({hard} bytes)"
            ),
            Self::BlankUncategorizedName => write!(f, "uncategorized_name must not be blank"),
        }
    }
}

impl Error for ConfigError {}

/// Byte thresholds enforced by `CollectionStore::save`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuotaPolicy {
    /// Writes pushing total usage above this are refused.
    pub hard_limit_bytes: u64,
    /// Writes pushing total usage above this succeed with a warning.
    pub warn_limit_bytes: u64,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            hard_limit_bytes: DEFAULT_HARD_LIMIT_BYTES,
            warn_limit_bytes: DEFAULT_WARN_LIMIT_BYTES,
        }
    }
}

impl QuotaPolicy {
    /// Builds a policy, rejecting zero or inverted thresholds.
    pub fn new(warn_limit_bytes: u64, hard_limit_bytes: u64) -> Result<Self, ConfigError> {
        let policy = Self {
            hard_limit_bytes,
            warn_limit_bytes,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.warn_limit_bytes == 0 || self.warn_limit_bytes >= self.hard_limit_bytes {
            return Err(ConfigError::InvalidQuota {
                warn: self.warn_limit_bytes,
                hard: self.hard_limit_bytes,
            });
        }
        Ok(())
    }
}

/// Top-level garden settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GardenConfig {
    pub quota: QuotaPolicy,
    /// Category notes fall back to when their category is deleted.
    pub uncategorized_name: String,
    /// Whether a missing Categories collection yields the seed categories.
    pub seed_default_categories: bool,
}

impl Default for GardenConfig {
    fn default() -> Self {
        Self {
            quota: QuotaPolicy::default(),
            uncategorized_name: DEFAULT_UNCATEGORIZED_NAME.to_string(),
            seed_default_categories: true,
        }
    }
}

impl GardenConfig {
    /// Parses and validates a JSON settings document.
    ///
    /// Absent fields keep their defaults; unknown fields are rejected.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quota.validate()?;
        if self.uncategorized_name.trim().is_empty() {
            return Err(ConfigError::BlankUncategorizedName);
        }
        Ok(())
    }
}
