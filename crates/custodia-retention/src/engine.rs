//! TOML-driven retention policy.
//!
//! `TomlRetentionPolicy` loads a `RetentionTable` from a TOML string or file
//! and implements the `RetentionPolicy` trait from custodia-core.
//!
//! Resolution algorithm:
//!
//! 1. Iterate rules in declaration order.
//! 2. The first rule whose `category` and `jurisdiction` patterns match
//!    supplies the period.
//! 3. If no rule matched, the table default applies.

use std::path::Path;

use tracing::{debug, warn};

use custodia_contracts::{
    error::{LedgerError, LedgerResult},
    retention::RetentionPeriod,
};
use custodia_core::traits::RetentionPolicy;

use crate::rule::RetentionTable;

/// A `RetentionPolicy` backed by a TOML table.
///
/// ```rust,ignore
/// use custodia_retention::TomlRetentionPolicy;
///
/// let policy = TomlRetentionPolicy::from_file(Path::new("retention/za.toml"))?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlRetentionPolicy {
    table: RetentionTable,
}

impl TomlRetentionPolicy {
    pub fn new(table: RetentionTable) -> LedgerResult<Self> {
        validate(&table)?;
        Ok(Self { table })
    }

    /// Parse `s` as TOML and build a policy.
    ///
    /// Returns `LedgerError::ConfigError` if the TOML is malformed, does not
    /// match `RetentionTable`, or contains a zero-length period.
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        let table: RetentionTable = toml::from_str(s).map_err(|e| LedgerError::ConfigError {
            reason: format!("failed to parse retention TOML: {}", e),
        })?;
        Self::new(table)
    }

    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LedgerError::ConfigError {
            reason: format!("failed to read retention file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn table(&self) -> &RetentionTable {
        &self.table
    }
}

fn validate(table: &RetentionTable) -> LedgerResult<()> {
    if table.default.is_zero() {
        return Err(LedgerError::ConfigError {
            reason: "retention default period must not be zero".to_string(),
        });
    }
    for rule in &table.rules {
        if rule.period.is_zero() {
            return Err(LedgerError::ConfigError {
                reason: format!("retention rule '{}' has a zero-length period", rule.id),
            });
        }
        if rule.category.trim().is_empty() {
            return Err(LedgerError::ConfigError {
                reason: format!("retention rule '{}' has an empty category", rule.id),
            });
        }
    }
    Ok(())
}

impl RetentionPolicy for TomlRetentionPolicy {
    fn period(&self, category: &str, jurisdiction: &str) -> RetentionPeriod {
        if let Some(rule) = self
            .table
            .rules
            .iter()
            .find(|rule| rule.matches(category, jurisdiction))
        {
            debug!(
                rule_id = %rule.id,
                category = %category,
                jurisdiction = %jurisdiction,
                "retention rule matched"
            );
            return rule.period;
        }

        if self.table.rules.is_empty() {
            warn!(category = %category, "retention table has no rules; using default period");
        }
        self.table.default
    }
}
