//! Chain verification report types.
//!
//! The verifier runs two independent checks per record, so a report can tell
//! a corrupted record (`mismatches`) apart from a broken chain
//! (`broken_links`). Disposed records cannot have their content hash
//! recomputed and are listed separately as `unverifiable`.

use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

/// The stored `integrity_hash` differs from the one recomputed from the
/// record's stored fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashMismatch {
    pub sequence_number: u64,
    /// Hash stored on the record at append.
    pub expected_hash: String,
    /// Hash recomputed from the record's current field values.
    pub actual_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkFailure {
    /// A sequence position is empty and no purge tombstone accounts for it.
    MissingRecord,
    /// `previous_hash` does not equal the prior record's `integrity_hash`.
    PreviousHashMismatch,
    /// The first record of the chain carries a `previous_hash`.
    UnexpectedGenesisLink,
    /// The record's `previous_hash` is absent past the start of the chain.
    MissingPreviousHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    pub sequence_number: u64,
    pub reason: LinkFailure,
}

/// A record whose content hash cannot be re-derived because it was disposed.
///
/// Not evidence of tampering: the payload was scrubbed on purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unverifiable {
    pub sequence_number: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub tenant_id: TenantId,
    pub from_sequence: u64,
    pub to_sequence: u64,
    /// Records present in the range, disposed ones included.
    pub total_checked: u64,
    pub mismatches: Vec<HashMismatch>,
    pub broken_links: Vec<BrokenLink>,
    pub unverifiable: Vec<Unverifiable>,
}

impl VerificationReport {
    /// True when no tampering or breakage was detected.
    ///
    /// Unverifiable (disposed) records do not fail the report.
    pub fn is_intact(&self) -> bool {
        self.mismatches.is_empty() && self.broken_links.is_empty()
    }
}
