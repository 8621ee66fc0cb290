//! # custodia-retention
//!
//! Table-driven retention for the Custodia audit ledger.
//!
//! This crate provides [`TomlRetentionPolicy`], which implements the
//! [`RetentionPolicy`](custodia_core::traits::RetentionPolicy) trait. The
//! compliance layer supplies its own table per jurisdiction; the ledger only
//! asks it for a period.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use custodia_retention::TomlRetentionPolicy;
//!
//! let policy = TomlRetentionPolicy::from_toml_str(r#"
//!     [default]
//!     years = 7
//!
//!     [[rules]]
//!     id = "financial"
//!     category = "financial"
//!     years = 10
//! "#)?;
//! ```

pub mod engine;
pub mod rule;

pub use engine::TomlRetentionPolicy;
pub use rule::{RetentionRule, RetentionTable};

// ── Tests ─────────────────────────────────────────────────────────────────────
