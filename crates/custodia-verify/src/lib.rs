//! # custodia-verify
//!
//! Integrity verification for Custodia hash chains.
//!
//! [`ChainVerifier`] recomputes each record's integrity hash and checks each
//! chain link over a sequence range, producing a
//! [`VerificationReport`](custodia_contracts::verify::VerificationReport).
//! [`verify_records`] runs the same checks over records already in hand,
//! e.g. an export handed to an external auditor.

pub mod chain;
pub mod engine;

pub use chain::verify_records;
pub use engine::ChainVerifier;

// ── Tests ─────────────────────────────────────────────────────────────────────
