//! Trait seams for the audit ledger.
//!
//! - `RecordStore`     — the backing store; insert-only, guards immutability
//! - `RetentionPolicy` — maps a record's category and jurisdiction to a period
//! - `AnchorClient`    — external timestamping authority
//! - `Clock`           — the source of "now"
//!
//! The ledger service in `custodia-store` wires them together. Backends
//! enforce the immutability rules themselves rather than trusting callers,
//! so no code path can edit or delete an active record outside disposal.

use chrono::{DateTime, Utc};

use custodia_contracts::{
    anchor::{AnchorSubmission, ReceiptStatus},
    error::LedgerResult,
    record::{
        AuditRecord, ChainHead, DisposalAction, LegalHold, PurgeTombstone, RecordUpdate,
    },
    retention::RetentionPeriod,
    tenant::{RecordId, TenantId},
};

/// Persistence for audit records.
///
/// Every method is scoped by tenant. Implementations must be safe to share
/// across request threads.
pub trait RecordStore: Send + Sync {
    /// The current head of the tenant's chain (an empty head for a new tenant).
    fn head(&self, tenant: &TenantId) -> LedgerResult<ChainHead>;

    /// Insert a fully formed record if the tenant head still equals `expected`.
    ///
    /// This is the compare-and-swap that serializes appends per tenant. The
    /// record must carry `expected.next_sequence()` and `expected.last_hash`
    /// as its previous hash. Returns `ConcurrencyConflict` when the head has
    /// moved; nothing is written in that case.
    fn insert(&self, record: AuditRecord, expected: &ChainHead) -> LedgerResult<()>;

    fn get(&self, tenant: &TenantId, id: RecordId) -> LedgerResult<Option<AuditRecord>>;

    /// Records with `from <= sequence_number <= to`, ordered by sequence.
    fn range(&self, tenant: &TenantId, from: u64, to: u64) -> LedgerResult<Vec<AuditRecord>>;

    /// Every stored record of the tenant, ordered by sequence.
    fn records(&self, tenant: &TenantId) -> LedgerResult<Vec<AuditRecord>>;

    /// Records about one resource, served from the resource index.
    fn by_resource(
        &self,
        tenant: &TenantId,
        resource_type: &str,
        resource_id: &str,
    ) -> LedgerResult<Vec<AuditRecord>>;

    fn by_hash(&self, tenant: &TenantId, integrity_hash: &str) -> LedgerResult<Option<AuditRecord>>;

    /// Tenants that have at least one append.
    fn tenants(&self) -> LedgerResult<Vec<TenantId>>;

    /// Tombstones of purged records with `from <= sequence_number <= to`.
    fn tombstones(&self, tenant: &TenantId, from: u64, to: u64)
        -> LedgerResult<Vec<PurgeTombstone>>;

    /// Apply a change to a stored record and return the updated record.
    ///
    /// Only sanctioned updates succeed; everything else is
    /// `ImmutabilityViolation`.
    fn update(&self, tenant: &TenantId, id: RecordId, update: RecordUpdate)
        -> LedgerResult<AuditRecord>;

    /// Toggle a record's legal hold and set the expiry that goes with it.
    ///
    /// The hold must actually change state: placing a hold on a held record
    /// or releasing an unheld one is `ImmutabilityViolation`, as is any hold
    /// change on a disposed record. `retention_expiry` must be `None` exactly
    /// when `hold.active`.
    fn set_legal_hold(
        &self,
        tenant: &TenantId,
        id: RecordId,
        hold: LegalHold,
        retention_expiry: Option<DateTime<Utc>>,
    ) -> LedgerResult<AuditRecord>;

    /// The disposal path: anonymize in place or purge to a tombstone.
    ///
    /// Returns the record as it stands after disposal (for a purge, the last
    /// state before removal with `disposition = Disposed`). Fails with
    /// `DisposalBlocked` if the record is held, unexpired at
    /// `action.disposed_at`, or already disposed.
    fn dispose(&self, tenant: &TenantId, id: RecordId, action: &DisposalAction)
        -> LedgerResult<AuditRecord>;

    /// General deletion. Always rejected.
    fn delete(&self, tenant: &TenantId, id: RecordId) -> LedgerResult<()>;
}

/// Table-driven retention. Implementations must be pure: the same inputs
/// always yield the same period.
pub trait RetentionPolicy: Send + Sync {
    fn period(&self, category: &str, jurisdiction: &str) -> RetentionPeriod;

    /// The expiry for a record, or `None` while a legal hold is active.
    fn resolve(
        &self,
        category: &str,
        jurisdiction: &str,
        legal_hold_active: bool,
        from: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if legal_hold_active {
            return None;
        }
        Some(self.period(category, jurisdiction).expiry_from(from))
    }
}

/// An external notarization or timestamping service.
///
/// Anchoring is best-effort: failures here never affect appends.
pub trait AnchorClient: Send + Sync {
    /// Submit a batch of record hashes. Returns the service's reference.
    fn submit_batch(&self, hashes: &[String]) -> LedgerResult<AnchorSubmission>;

    /// Poll the status of a previously submitted batch.
    fn fetch_receipt(&self, external_ref: &str) -> LedgerResult<ReceiptStatus>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
