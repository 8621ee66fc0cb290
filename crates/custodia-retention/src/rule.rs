//! Retention rule types and configuration schema.
//!
//! A `RetentionTable` is deserialized from TOML and holds an ordered list of
//! `RetentionRule`s. Rules are evaluated in declaration order; the first
//! matching rule wins. If no rule matches, the table's default applies.

use serde::{Deserialize, Serialize};

use custodia_contracts::retention::RetentionPeriod;

/// A single retention rule loaded from TOML.
///
/// Both `category` and `jurisdiction` support the wildcard `"*"`. Matching
/// is case-insensitive, since categories come from caller-supplied taxonomy
/// strings.
///
/// ```toml
/// [[rules]]
/// id = "fica-records"
/// category = "kyc"
/// jurisdiction = "ZA"
/// years = 5
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionRule {
    /// Stable identifier used in logs.
    pub id: String,

    #[serde(default)]
    pub description: String,

    pub category: String,

    #[serde(default = "wildcard")]
    pub jurisdiction: String,

    #[serde(flatten)]
    pub period: RetentionPeriod,
}

fn wildcard() -> String {
    "*".to_string()
}

impl RetentionRule {
    pub fn matches(&self, category: &str, jurisdiction: &str) -> bool {
        let category_matches = self.category == "*" || self.category.eq_ignore_ascii_case(category);
        let jurisdiction_matches =
            self.jurisdiction == "*" || self.jurisdiction.eq_ignore_ascii_case(jurisdiction);
        category_matches && jurisdiction_matches
    }
}

/// The top-level structure deserialized from a TOML retention file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionTable {
    /// Applied when no rule matches.
    #[serde(default = "default_period")]
    pub default: RetentionPeriod,

    /// Ordered list of rules. First match wins.
    #[serde(default)]
    pub rules: Vec<RetentionRule>,
}

fn default_period() -> RetentionPeriod {
    RetentionPeriod::years(7)
}

impl Default for RetentionTable {
    /// The built-in table: financial records ten years, FICA/KYC records in
    /// South Africa five years, informational events one year, seven years
    /// for everything else.
    fn default() -> Self {
        let rule = |id: &str, category: &str, jurisdiction: &str, period| RetentionRule {
            id: id.to_string(),
            description: String::new(),
            category: category.to_string(),
            jurisdiction: jurisdiction.to_string(),
            period,
        };
        Self {
            default: default_period(),
            rules: vec![
                rule("financial", "financial", "*", RetentionPeriod::years(10)),
                rule("fica-kyc", "kyc", "ZA", RetentionPeriod::years(5)),
                rule("informational", "informational", "*", RetentionPeriod::years(1)),
            ],
        }
    }
}
