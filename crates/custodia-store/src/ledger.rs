//! The ledger service: append, read, and the sanctioned lifecycle mutations.
//!
//! `LedgerStore` wires a `RecordStore` backend, a `RetentionPolicy`, and a
//! `Clock` together. It never bypasses the backend's guards; its job is to
//! build fully formed records (hash, chain link, expiry) and to retry the
//! compare-and-swap insert when another writer for the same tenant wins.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use custodia_contracts::{
    error::{LedgerError, LedgerResult},
    query::{ComplianceStats, Page, Pagination, QueryFilter, Sort, SortField, SortOrder},
    record::{
        AnchorReceipt, AuditRecord, ChainHead, Disposition, LegalHold, NewAuditEvent,
        RecordUpdate,
    },
    tenant::{RecordId, TenantId},
};
use custodia_core::{
    config::AppendConfig,
    hash::{compute_hash, CanonicalFields},
    traits::{Clock, RecordStore, RetentionPolicy},
};

/// Append-only, tenant-scoped access to the audit ledger.
///
/// Cheap to share: wrap in an `Arc` and hand a clone to every worker.
pub struct LedgerStore {
    store: Arc<dyn RecordStore>,
    retention: Arc<dyn RetentionPolicy>,
    clock: Arc<dyn Clock>,
    config: AppendConfig,
}

impl LedgerStore {
    pub fn new(
        store: Arc<dyn RecordStore>,
        retention: Arc<dyn RetentionPolicy>,
        clock: Arc<dyn Clock>,
        config: AppendConfig,
    ) -> Self {
        Self {
            store,
            retention,
            clock,
            config,
        }
    }

    /// The backend, for read-only collaborators such as the chain verifier.
    pub fn record_store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ── Append ────────────────────────────────────────────────────────────────

    /// Record one event as the next link of its tenant's chain.
    ///
    /// Reads the tenant head, computes the integrity hash and retention
    /// expiry, then inserts with a compare-and-swap on the head. A lost race
    /// is retried with a fresh head; after `max_append_attempts` the
    /// `ConcurrencyConflict` is returned. Either the record is fully stored
    /// or nothing is.
    pub fn append(&self, event: NewAuditEvent) -> LedgerResult<AuditRecord> {
        event.validate(self.clock.now())?;

        let attempts = self.config.max_append_attempts.max(1);
        let mut last_conflict = None;
        for attempt in 1..=attempts {
            let head = self.store.head(&event.tenant_id)?;
            let record = self.build_record(&event, &head);

            match self.store.insert(record.clone(), &head) {
                Ok(()) => {
                    debug!(
                        tenant_id = %record.tenant_id,
                        sequence = record.sequence_number,
                        action = %record.action,
                        attempt,
                        "audit record appended"
                    );
                    return Ok(record);
                }
                Err(e @ LedgerError::ConcurrencyConflict { .. }) => {
                    debug!(tenant_id = %event.tenant_id, attempt, "append lost head race; retrying");
                    last_conflict = Some(e);
                    std::thread::yield_now();
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            tenant_id = %event.tenant_id,
            attempts,
            "append gave up after repeated sequence conflicts"
        );
        Err(last_conflict.unwrap_or_else(|| LedgerError::ConcurrencyConflict {
            tenant_id: event.tenant_id.to_string(),
            reason: "no append attempt was made".to_string(),
        }))
    }

    fn build_record(&self, event: &NewAuditEvent, head: &ChainHead) -> AuditRecord {
        let sequence_number = head.next_sequence();
        let integrity_hash = compute_hash(CanonicalFields {
            tenant_id: &event.tenant_id,
            sequence_number,
            actor_id: event.actor_id.as_deref(),
            action: &event.action,
            resource_type: &event.resource_type,
            resource_id: &event.resource_id,
            payload: &event.payload,
            timestamp: event.timestamp,
        });

        let category = event
            .category
            .clone()
            .unwrap_or_else(|| event.resource_type.clone());
        let jurisdiction = event
            .jurisdiction
            .clone()
            .unwrap_or_else(|| self.config.default_jurisdiction.clone());
        let legal_hold = event
            .legal_hold
            .clone()
            .filter(|hold| hold.active)
            .unwrap_or_default();
        let retention_expiry = self.retention.resolve(
            &category,
            &jurisdiction,
            legal_hold.active,
            event.timestamp,
        );

        AuditRecord {
            id: RecordId::new(),
            tenant_id: event.tenant_id.clone(),
            sequence_number,
            actor_id: event.actor_id.clone(),
            actor_role: event.actor_role.clone(),
            action: event.action.clone(),
            resource_type: event.resource_type.clone(),
            resource_id: event.resource_id.clone(),
            payload: event.payload.clone(),
            timestamp: event.timestamp,
            integrity_hash,
            previous_hash: head.last_hash.clone(),
            retention_expiry,
            legal_hold,
            anchor_receipt: None,
            disposition: Disposition::Active,
            category,
            jurisdiction,
            correlation_id: event.correlation_id.clone(),
            recorded_at: self.clock.now(),
            disposed_at: None,
        }
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Fetch one record. Unknown ids, and ids belonging to another tenant,
    /// are `NotFound`.
    pub fn get(&self, tenant: &TenantId, id: RecordId) -> LedgerResult<AuditRecord> {
        self.store
            .get(tenant, id)?
            .ok_or_else(|| LedgerError::NotFound {
                what: format!("record {id} for tenant '{tenant}'"),
            })
    }

    /// Filtered, sorted, paginated listing of one tenant's records.
    ///
    /// No match is an empty page, not an error.
    pub fn query(
        &self,
        tenant: &TenantId,
        filter: &QueryFilter,
        pagination: Pagination,
        sort: Sort,
    ) -> LedgerResult<Page<AuditRecord>> {
        let candidates = match (&filter.resource_type, &filter.resource_id) {
            (Some(resource_type), Some(resource_id)) => {
                self.store.by_resource(tenant, resource_type, resource_id)?
            }
            _ => self.store.records(tenant)?,
        };

        let mut matched: Vec<AuditRecord> = candidates
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();

        matched.sort_by(|a, b| {
            let ord = match sort.field {
                SortField::SequenceNumber => a.sequence_number.cmp(&b.sequence_number),
                SortField::Timestamp => a
                    .timestamp
                    .cmp(&b.timestamp)
                    .then(a.sequence_number.cmp(&b.sequence_number)),
            };
            match sort.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let pagination = pagination.normalized();
        let total = matched.len();
        let items = matched
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.per_page as usize)
            .collect();

        Ok(Page {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }

    /// Every record about one resource, in chain order.
    pub fn audit_trail(
        &self,
        tenant: &TenantId,
        resource_type: &str,
        resource_id: &str,
    ) -> LedgerResult<Vec<AuditRecord>> {
        self.store.by_resource(tenant, resource_type, resource_id)
    }

    pub fn find_by_hash(
        &self,
        tenant: &TenantId,
        integrity_hash: &str,
    ) -> LedgerResult<Option<AuditRecord>> {
        self.store.by_hash(tenant, integrity_hash)
    }

    pub fn head(&self, tenant: &TenantId) -> LedgerResult<ChainHead> {
        self.store.head(tenant)
    }

    // ── Mutation paths ────────────────────────────────────────────────────────

    /// The general update path. The backend rejects every change to a core
    /// field with `ImmutabilityViolation`. Hold changes are routed through
    /// `place_legal_hold`/`release_legal_hold` so their expiry always comes
    /// from the retention policy.
    pub fn update(
        &self,
        tenant: &TenantId,
        id: RecordId,
        update: RecordUpdate,
    ) -> LedgerResult<AuditRecord> {
        match update {
            RecordUpdate::LegalHold(hold) if hold.active => self.place_legal_hold(
                tenant,
                id,
                hold.reason.as_deref().unwrap_or_default(),
                hold.hold_id.as_deref().unwrap_or_default(),
            ),
            RecordUpdate::LegalHold(_) => self.release_legal_hold(tenant, id),
            other => self.store.update(tenant, id, other),
        }
    }

    /// General deletion. Always `ImmutabilityViolation`; records leave the
    /// ledger only through disposal.
    pub fn delete(&self, tenant: &TenantId, id: RecordId) -> LedgerResult<()> {
        self.store.delete(tenant, id)
    }

    /// Write the receipt of a confirmed anchoring round trip onto a record.
    /// A record is anchored at most once.
    pub fn attach_anchor_receipt(
        &self,
        tenant: &TenantId,
        id: RecordId,
        receipt: AnchorReceipt,
    ) -> LedgerResult<AuditRecord> {
        let external_ref = receipt.external_ref.clone();
        let record = self
            .store
            .update(tenant, id, RecordUpdate::AnchorReceipt(receipt))?;
        info!(
            tenant_id = %tenant,
            record_id = %id,
            sequence = record.sequence_number,
            external_ref = %external_ref,
            "anchor receipt attached"
        );
        Ok(record)
    }

    /// Suspend retention expiry for a record.
    ///
    /// `ImmutabilityViolation` if the record is already held or disposed.
    pub fn place_legal_hold(
        &self,
        tenant: &TenantId,
        id: RecordId,
        reason: &str,
        hold_id: &str,
    ) -> LedgerResult<AuditRecord> {
        if hold_id.trim().is_empty() {
            return Err(LedgerError::Validation {
                reason: "hold_id must not be empty".to_string(),
            });
        }
        let record =
            self.store
                .set_legal_hold(tenant, id, LegalHold::placed(reason, hold_id), None)?;
        info!(
            tenant_id = %tenant,
            record_id = %id,
            hold_id = %hold_id,
            "legal hold placed"
        );
        Ok(record)
    }

    /// Lift a hold. Expiry is recomputed from the release time.
    ///
    /// `ImmutabilityViolation` if the record is not held.
    pub fn release_legal_hold(&self, tenant: &TenantId, id: RecordId) -> LedgerResult<AuditRecord> {
        let current = self.get(tenant, id)?;
        let released_at = self.clock.now();
        // Category and jurisdiction are immutable, so resolving outside the
        // chain lock is safe; the backend re-checks the hold state under it.
        let retention_expiry = self.retention.resolve(
            &current.category,
            &current.jurisdiction,
            false,
            released_at,
        );
        let record =
            self.store
                .set_legal_hold(tenant, id, LegalHold::released(), retention_expiry)?;
        info!(
            tenant_id = %tenant,
            record_id = %id,
            hold_id = %current.legal_hold.hold_id.as_deref().unwrap_or_default(),
            "legal hold released"
        );
        Ok(record)
    }

    // ── Reporting ─────────────────────────────────────────────────────────────

    /// Activity summary for the trailing `window_days` days.
    pub fn compliance_stats(
        &self,
        tenant: &TenantId,
        window_days: u32,
    ) -> LedgerResult<ComplianceStats> {
        if window_days == 0 {
            return Err(LedgerError::Validation {
                reason: "window_days must be > 0".to_string(),
            });
        }

        let now = self.clock.now();
        let window_start = now
            .checked_sub_signed(Duration::days(i64::from(window_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let records = self.store.records(tenant)?;

        let mut events_by_action = BTreeMap::new();
        let mut events_by_actor_role = BTreeMap::new();
        let mut actors = HashSet::new();
        let mut total_events = 0;
        for record in records
            .iter()
            .filter(|r| r.timestamp >= window_start && r.timestamp <= now)
        {
            total_events += 1;
            *events_by_action.entry(record.action.clone()).or_insert(0) += 1;
            *events_by_actor_role
                .entry(record.actor_role.clone())
                .or_insert(0) += 1;
            if let Some(actor) = &record.actor_id {
                actors.insert(actor.as_str());
            }
        }

        let purged = self.store.tombstones(tenant, 1, u64::MAX)?.len();
        Ok(ComplianceStats {
            tenant_id: tenant.clone(),
            window_start,
            window_end: now,
            total_events,
            events_by_action,
            events_by_actor_role,
            unique_actors: actors.len(),
            anchored: records.iter().filter(|r| r.anchor_receipt.is_some()).count(),
            under_legal_hold: records.iter().filter(|r| r.legal_hold.active).count(),
            disposed: records.iter().filter(|r| !r.is_active()).count() + purged,
            eligible_for_disposal: records
                .iter()
                .filter(|r| r.is_disposal_eligible(now))
                .count(),
            last_sequence: self.store.head(tenant)?.last_sequence,
        })
    }
}

impl std::fmt::Debug for LedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
