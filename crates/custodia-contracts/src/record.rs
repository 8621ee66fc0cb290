//! The audit record, its lifecycle sub-states, and the inputs that create or
//! change it.
//!
//! `AuditRecord` is the one entity the ledger persists. Its core fields are
//! fixed at append; the only sanctioned post-creation changes are expressed
//! as `RecordUpdate::LegalHold`, `RecordUpdate::AnchorReceipt`, and the
//! disposal actions in `DisposalAction`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{LedgerError, LedgerResult},
    tenant::{RecordId, TenantId},
};

/// Whether a record still carries its original content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    Active,
    /// Terminal. Payload and direct identifiers have been scrubbed.
    Disposed,
}

/// Litigation or regulatory hold suspending retention expiry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LegalHold {
    pub active: bool,
    pub reason: Option<String>,
    pub hold_id: Option<String>,
}

impl LegalHold {
    /// An active hold with the given reason and external hold reference.
    pub fn placed(reason: impl Into<String>, hold_id: impl Into<String>) -> Self {
        Self {
            active: true,
            reason: Some(reason.into()),
            hold_id: Some(hold_id.into()),
        }
    }

    /// No hold.
    pub fn released() -> Self {
        Self::default()
    }
}

/// Proof that a record's hash was timestamped by an external authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub external_ref: String,
    pub anchored_at: DateTime<Utc>,
}

/// One immutable entry in a tenant's hash chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: RecordId,
    pub tenant_id: TenantId,
    /// Position in the tenant's chain, starting at 1.
    pub sequence_number: u64,
    /// `None` for system-generated events.
    pub actor_id: Option<String>,
    pub actor_role: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    /// Opaque to the ledger.
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    /// Lowercase hex SHA-256 over the canonical immutable fields.
    pub integrity_hash: String,
    /// `integrity_hash` of the previous record, `None` for sequence 1.
    pub previous_hash: Option<String>,
    pub retention_expiry: Option<DateTime<Utc>>,
    pub legal_hold: LegalHold,
    pub anchor_receipt: Option<AnchorReceipt>,
    pub disposition: Disposition,

    /// Retention category the expiry was resolved from.
    pub category: String,
    pub jurisdiction: String,
    pub correlation_id: Option<String>,
    /// Wall-clock time the ledger accepted the record.
    pub recorded_at: DateTime<Utc>,
    pub disposed_at: Option<DateTime<Utc>>,
}

impl AuditRecord {
    pub fn is_active(&self) -> bool {
        self.disposition == Disposition::Active
    }

    /// True when disposal may proceed at `now`.
    pub fn is_disposal_eligible(&self, now: DateTime<Utc>) -> bool {
        self.is_active()
            && !self.legal_hold.active
            && self.retention_expiry.is_some_and(|expiry| expiry <= now)
    }
}

/// Everything a caller supplies to record one event.
///
/// `category` defaults to `resource_type` and `jurisdiction` to the ledger's
/// configured default when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditEvent {
    pub tenant_id: TenantId,
    pub actor_id: Option<String>,
    pub actor_role: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// Hold to apply at creation. The record then has no retention expiry.
    #[serde(default)]
    pub legal_hold: Option<LegalHold>,
}

impl NewAuditEvent {
    /// Start an event with the required descriptive fields.
    ///
    /// The timestamp defaults to now; the payload to `null`.
    pub fn new(
        tenant_id: TenantId,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            actor_id: None,
            actor_role: "system".to_string(),
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            payload: serde_json::Value::Null,
            timestamp: Utc::now(),
            category: None,
            jurisdiction: None,
            correlation_id: None,
            legal_hold: None,
        }
    }

    pub fn actor(mut self, actor_id: impl Into<String>, actor_role: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self.actor_role = actor_role.into();
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = Some(jurisdiction.into());
        self
    }

    pub fn correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn held(mut self, hold: LegalHold) -> Self {
        self.legal_hold = Some(hold);
        self
    }

    /// Reject malformed input before anything is written.
    pub fn validate(&self, now: DateTime<Utc>) -> LedgerResult<()> {
        if self.timestamp > now {
            return Err(LedgerError::validation(format!(
                "event timestamp {} is in the future (now {})",
                self.timestamp, now
            )));
        }
        for (name, value) in [
            ("action", &self.action),
            ("resource_type", &self.resource_type),
            ("actor_role", &self.actor_role),
        ] {
            if value.trim().is_empty() {
                return Err(LedgerError::validation(format!("{name} must not be empty")));
            }
        }
        if self.actor_id.as_deref().is_some_and(|a| a.trim().is_empty()) {
            return Err(LedgerError::validation(
                "actor_id must be omitted rather than empty",
            ));
        }
        Ok(())
    }
}

/// The last link of a tenant's chain: the compare-and-swap token for appends.
///
/// Survives disposal, so sequence numbers are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainHead {
    /// 0 for an empty chain.
    pub last_sequence: u64,
    pub last_hash: Option<String>,
}

impl ChainHead {
    pub fn next_sequence(&self) -> u64 {
        self.last_sequence + 1
    }
}

/// The chain-link residue of a purged record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeTombstone {
    pub tenant_id: TenantId,
    pub record_id: RecordId,
    pub sequence_number: u64,
    pub integrity_hash: String,
    pub previous_hash: Option<String>,
    pub disposed_at: DateTime<Utc>,
}

/// A requested change to a stored record.
///
/// Only `LegalHold` and `AnchorReceipt` are sanctioned; every other variant
/// exists so that attempts through the general update path can be named and
/// rejected with `LedgerError::ImmutabilityViolation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordUpdate {
    TenantId(TenantId),
    SequenceNumber(u64),
    ActorId(Option<String>),
    ActorRole(String),
    Action(String),
    ResourceType(String),
    ResourceId(String),
    Payload(serde_json::Value),
    Timestamp(DateTime<Utc>),
    IntegrityHash(String),
    PreviousHash(Option<String>),
    Category(String),
    Jurisdiction(String),
    CorrelationId(Option<String>),
    RetentionExpiry(Option<DateTime<Utc>>),
    Disposition(Disposition),
    /// Place (`active`) or release a hold. The resulting expiry is never
    /// caller-supplied: the ledger resolves it from the retention policy.
    LegalHold(LegalHold),
    AnchorReceipt(AnchorReceipt),
}

impl RecordUpdate {
    /// The record field this update targets.
    pub fn field(&self) -> &'static str {
        match self {
            RecordUpdate::TenantId(_) => "tenant_id",
            RecordUpdate::SequenceNumber(_) => "sequence_number",
            RecordUpdate::ActorId(_) => "actor_id",
            RecordUpdate::ActorRole(_) => "actor_role",
            RecordUpdate::Action(_) => "action",
            RecordUpdate::ResourceType(_) => "resource_type",
            RecordUpdate::ResourceId(_) => "resource_id",
            RecordUpdate::Payload(_) => "payload",
            RecordUpdate::Timestamp(_) => "timestamp",
            RecordUpdate::IntegrityHash(_) => "integrity_hash",
            RecordUpdate::PreviousHash(_) => "previous_hash",
            RecordUpdate::Category(_) => "category",
            RecordUpdate::Jurisdiction(_) => "jurisdiction",
            RecordUpdate::CorrelationId(_) => "correlation_id",
            RecordUpdate::RetentionExpiry(_) => "retention_expiry",
            RecordUpdate::Disposition(_) => "disposition",
            RecordUpdate::LegalHold(_) => "legal_hold",
            RecordUpdate::AnchorReceipt(_) => "anchor_receipt",
        }
    }

    /// True for the sanctioned post-creation mutations.
    pub fn is_sanctioned(&self) -> bool {
        matches!(
            self,
            RecordUpdate::LegalHold(_) | RecordUpdate::AnchorReceipt(_)
        )
    }
}

/// How a record leaves the active ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisposalMethod {
    /// Scrub payload and direct identifiers, keep chain metadata.
    Anonymize,
    /// Remove the record, keep a tombstone.
    Purge,
}

/// The disposal instruction handed to the store's dedicated disposal path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposalAction {
    pub method: DisposalMethod,
    pub disposed_at: DateTime<Utc>,
}

/// Marker written into scrubbed identifier fields.
pub const REDACTED: &str = "[redacted]";
