//! Disposal certificates and scheduler run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    record::DisposalMethod,
    tenant::{RecordId, TenantId},
};

/// Evidence that a record was disposed of, and how.
///
/// `certificate_hash` commits to every other field so the certificate can be
/// filed with the compliance layer and later checked for alteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposalCertificate {
    pub certificate_id: uuid::Uuid,
    pub tenant_id: TenantId,
    pub record_id: RecordId,
    pub sequence_number: u64,
    /// The disposed record's `integrity_hash`, which outlives its content.
    pub integrity_hash: String,
    pub method: DisposalMethod,
    pub disposed_at: DateTime<Utc>,
    pub certificate_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedDisposal {
    pub tenant_id: TenantId,
    pub record_id: RecordId,
    pub reason: String,
}

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisposalRun {
    pub certificates: Vec<DisposalCertificate>,
    /// Records found eligible that a concurrent change made ineligible.
    pub blocked: Vec<BlockedDisposal>,
}
