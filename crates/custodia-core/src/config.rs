//! Ledger configuration loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid configuration.
//!
//! ```toml
//! [ledger]
//! max_append_attempts = 128
//! default_jurisdiction = "ZA"
//!
//! [anchor]
//! batch_size = 256
//! max_attempts = 5
//! base_backoff_ms = 200
//! max_backoff_ms = 10000
//! poll_interval_secs = 60
//!
//! [disposal]
//! method = "ANONYMIZE"
//! interval_secs = 86400
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use custodia_contracts::{
    error::{LedgerError, LedgerResult},
    record::DisposalMethod,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub ledger: AppendConfig,
    pub anchor: AnchorConfig,
    pub disposal: DisposalConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppendConfig {
    /// Compare-and-swap attempts before an append gives up with
    /// `ConcurrencyConflict`. A writer can only lose a race to another
    /// writer that succeeded, so this bounds the tolerated fan-in per tenant.
    pub max_append_attempts: u32,
    /// Used when an event does not name its jurisdiction.
    pub default_jurisdiction: String,
}

impl Default for AppendConfig {
    fn default() -> Self {
        Self {
            max_append_attempts: 128,
            default_jurisdiction: "ZA".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Hashes per submission.
    pub batch_size: usize,
    /// Submission attempts per batch, the first included.
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub poll_interval_secs: u64,
}

impl AnchorConfig {
    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        Duration::from_millis(
            self.base_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            max_attempts: 5,
            base_backoff_ms: 200,
            max_backoff_ms: 10_000,
            poll_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisposalConfig {
    pub method: DisposalMethod,
    pub interval_secs: u64,
}

impl Default for DisposalConfig {
    fn default() -> Self {
        Self {
            method: DisposalMethod::Anonymize,
            interval_secs: 24 * 60 * 60,
        }
    }
}

impl LedgerConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `LedgerError::ConfigError` if the TOML is malformed or a value
    /// is out of range.
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        let config: LedgerConfig = toml::from_str(s).map_err(|e| LedgerError::ConfigError {
            reason: format!("failed to parse ledger config TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML ledger configuration.
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LedgerError::ConfigError {
            reason: format!("failed to read ledger config '{}': {}", path.display(), e),
        })?;
        let config = Self::from_toml_str(&contents)?;
        debug!(path = %path.display(), "ledger configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        let invalid = |reason: &str| {
            Err(LedgerError::ConfigError {
                reason: reason.to_string(),
            })
        };
        if self.ledger.max_append_attempts == 0 {
            return invalid("ledger.max_append_attempts must be > 0");
        }
        if self.ledger.default_jurisdiction.trim().is_empty() {
            return invalid("ledger.default_jurisdiction must not be empty");
        }
        if self.anchor.batch_size == 0 {
            return invalid("anchor.batch_size must be > 0");
        }
        if self.anchor.max_attempts == 0 {
            return invalid("anchor.max_attempts must be > 0");
        }
        if self.anchor.base_backoff_ms > self.anchor.max_backoff_ms {
            return invalid("anchor.base_backoff_ms must not exceed anchor.max_backoff_ms");
        }
        if self.disposal.interval_secs == 0 {
            return invalid("disposal.interval_secs must be > 0");
        }
        Ok(())
    }
}
