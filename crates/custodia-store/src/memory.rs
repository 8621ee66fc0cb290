//! In-memory implementation of `RecordStore`.
//!
//! `InMemoryRecordStore` is the reference backend. Each tenant owns a
//! `TenantChain` behind its own `Mutex`; the outer `RwLock` only guards the
//! tenant map, so appends for different tenants never wait on each other.
//!
//! The chain head (last sequence and last hash) is the per-tenant counter
//! row. `insert` is a compare-and-swap against it: a writer that read a stale
//! head gets `ConcurrencyConflict` and nothing is written.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use tracing::{error, info};

use custodia_contracts::{
    error::{LedgerError, LedgerResult},
    record::{
        AuditRecord, ChainHead, DisposalAction, DisposalMethod, Disposition, LegalHold,
        PurgeTombstone, RecordUpdate, REDACTED,
    },
    tenant::{RecordId, TenantId},
};
use custodia_core::traits::RecordStore;

// ── Per-tenant state ──────────────────────────────────────────────────────────

/// One tenant's chain and its secondary indexes.
#[derive(Default)]
pub(crate) struct TenantChain {
    pub(crate) head: ChainHead,
    /// Unique (tenant, sequence) index and primary storage.
    pub(crate) records: BTreeMap<u64, AuditRecord>,
    pub(crate) by_id: HashMap<RecordId, u64>,
    /// (resource_type, resource_id) index.
    pub(crate) by_resource: HashMap<(String, String), BTreeSet<u64>>,
    /// Unique integrity-hash index. Hashes commit to the tenant id, so
    /// uniqueness within a tenant is uniqueness across the store.
    pub(crate) by_hash: HashMap<String, u64>,
    pub(crate) tombstones: BTreeMap<u64, PurgeTombstone>,
}

impl TenantChain {
    fn record_mut(&mut self, id: RecordId) -> LedgerResult<&mut AuditRecord> {
        let seq = self.sequence_of(id)?;
        self.records
            .get_mut(&seq)
            .ok_or_else(|| LedgerError::NotFound {
                what: format!("record {id}"),
            })
    }

    fn sequence_of(&self, id: RecordId) -> LedgerResult<u64> {
        self.by_id.get(&id).copied().ok_or_else(|| LedgerError::NotFound {
            what: format!("record {id}"),
        })
    }

    fn unindex_resource(&mut self, record: &AuditRecord) {
        let key = (record.resource_type.clone(), record.resource_id.clone());
        if let Some(seqs) = self.by_resource.get_mut(&key) {
            seqs.remove(&record.sequence_number);
            if seqs.is_empty() {
                self.by_resource.remove(&key);
            }
        }
    }
}

// ── Public store ──────────────────────────────────────────────────────────────

/// An in-memory, append-only record store.
///
/// # Thread safety
///
/// All methods take `&self`. Reads clone records out under the tenant lock,
/// so callers always see a consistent snapshot of each record.
#[derive(Default)]
pub struct InMemoryRecordStore {
    pub(crate) tenants: RwLock<HashMap<TenantId, Arc<Mutex<TenantChain>>>>,
}

fn poisoned(what: &str) -> LedgerError {
    LedgerError::StorageFailure {
        reason: format!("{what} lock poisoned"),
    }
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn chain(&self, tenant: &TenantId) -> LedgerResult<Option<Arc<Mutex<TenantChain>>>> {
        let tenants = self.tenants.read().map_err(|_| poisoned("tenant map"))?;
        Ok(tenants.get(tenant).cloned())
    }

    fn chain_or_create(&self, tenant: &TenantId) -> LedgerResult<Arc<Mutex<TenantChain>>> {
        if let Some(chain) = self.chain(tenant)? {
            return Ok(chain);
        }
        let mut tenants = self.tenants.write().map_err(|_| poisoned("tenant map"))?;
        Ok(tenants.entry(tenant.clone()).or_default().clone())
    }

    /// Run `f` against the tenant's chain, or return `default` when the tenant
    /// has never appended.
    fn with_chain<T>(
        &self,
        tenant: &TenantId,
        default: T,
        f: impl FnOnce(&mut TenantChain) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        match self.chain(tenant)? {
            Some(chain) => {
                let mut guard = lock(&chain)?;
                f(&mut guard)
            }
            None => Ok(default),
        }
    }

    /// Run `f` against an existing tenant chain; a missing tenant is `NotFound`.
    fn with_existing<T>(
        &self,
        tenant: &TenantId,
        id: RecordId,
        f: impl FnOnce(&mut TenantChain) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let chain = self.chain(tenant)?.ok_or_else(|| LedgerError::NotFound {
            what: format!("record {id}"),
        })?;
        let mut guard = lock(&chain)?;
        f(&mut guard)
    }
}

fn rejected(record: &AuditRecord, field: &str) -> LedgerError {
    error!(
        tenant_id = %record.tenant_id,
        record_id = %record.id,
        sequence = record.sequence_number,
        field = %field,
        "rejected mutation of immutable audit record"
    );
    LedgerError::ImmutabilityViolation {
        record_id: record.id.to_string(),
        field: field.to_string(),
    }
}

fn lock(chain: &Mutex<TenantChain>) -> LedgerResult<MutexGuard<'_, TenantChain>> {
    chain.lock().map_err(|_| poisoned("tenant chain"))
}

// ── Tamper helpers ────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "test-util"))]
impl InMemoryRecordStore {
    /// Edit a stored record in place, bypassing every guard. Simulates
    /// corruption of the backing store.
    pub fn tamper(&self, tenant: &TenantId, sequence: u64, edit: impl FnOnce(&mut AuditRecord)) {
        if let Ok(Some(chain)) = self.chain(tenant) {
            if let Ok(mut guard) = chain.lock() {
                if let Some(record) = guard.records.get_mut(&sequence) {
                    edit(record);
                }
            }
        }
    }

    /// Remove a record without leaving a tombstone.
    pub fn erase(&self, tenant: &TenantId, sequence: u64) {
        if let Ok(Some(chain)) = self.chain(tenant) {
            if let Ok(mut guard) = chain.lock() {
                if let Some(record) = guard.records.remove(&sequence) {
                    guard.by_id.remove(&record.id);
                }
            }
        }
    }
}

// ── RecordStore impl ──────────────────────────────────────────────────────────

impl RecordStore for InMemoryRecordStore {
    fn head(&self, tenant: &TenantId) -> LedgerResult<ChainHead> {
        self.with_chain(tenant, ChainHead::default(), |chain| Ok(chain.head.clone()))
    }

    fn insert(&self, record: AuditRecord, expected: &ChainHead) -> LedgerResult<()> {
        let chain = self.chain_or_create(&record.tenant_id)?;
        let mut chain = lock(&chain)?;

        if chain.head != *expected {
            return Err(LedgerError::ConcurrencyConflict {
                tenant_id: record.tenant_id.to_string(),
                reason: format!(
                    "chain head moved from sequence {} to {}",
                    expected.last_sequence, chain.head.last_sequence
                ),
            });
        }
        if record.sequence_number != expected.next_sequence()
            || record.previous_hash != expected.last_hash
        {
            return Err(LedgerError::Validation {
                reason: format!(
                    "record {} does not extend the chain head at sequence {}",
                    record.id, expected.last_sequence
                ),
            });
        }
        if chain.by_hash.contains_key(&record.integrity_hash) {
            return Err(LedgerError::Validation {
                reason: format!("integrity hash {} already stored", record.integrity_hash),
            });
        }

        let seq = record.sequence_number;
        chain.by_id.insert(record.id, seq);
        chain
            .by_resource
            .entry((record.resource_type.clone(), record.resource_id.clone()))
            .or_default()
            .insert(seq);
        chain.by_hash.insert(record.integrity_hash.clone(), seq);
        chain.head = ChainHead {
            last_sequence: seq,
            last_hash: Some(record.integrity_hash.clone()),
        };
        chain.records.insert(seq, record);
        Ok(())
    }

    fn get(&self, tenant: &TenantId, id: RecordId) -> LedgerResult<Option<AuditRecord>> {
        self.with_chain(tenant, None, |chain| {
            Ok(chain
                .by_id
                .get(&id)
                .and_then(|seq| chain.records.get(seq))
                .cloned())
        })
    }

    fn range(&self, tenant: &TenantId, from: u64, to: u64) -> LedgerResult<Vec<AuditRecord>> {
        if from > to {
            return Ok(Vec::new());
        }
        self.with_chain(tenant, Vec::new(), |chain| {
            Ok(chain.records.range(from..=to).map(|(_, r)| r.clone()).collect())
        })
    }

    fn records(&self, tenant: &TenantId) -> LedgerResult<Vec<AuditRecord>> {
        self.with_chain(tenant, Vec::new(), |chain| {
            Ok(chain.records.values().cloned().collect())
        })
    }

    fn by_resource(
        &self,
        tenant: &TenantId,
        resource_type: &str,
        resource_id: &str,
    ) -> LedgerResult<Vec<AuditRecord>> {
        self.with_chain(tenant, Vec::new(), |chain| {
            let key = (resource_type.to_string(), resource_id.to_string());
            Ok(chain
                .by_resource
                .get(&key)
                .map(|seqs| {
                    seqs.iter()
                        .filter_map(|seq| chain.records.get(seq).cloned())
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    fn by_hash(&self, tenant: &TenantId, integrity_hash: &str) -> LedgerResult<Option<AuditRecord>> {
        self.with_chain(tenant, None, |chain| {
            Ok(chain
                .by_hash
                .get(integrity_hash)
                .and_then(|seq| chain.records.get(seq))
                .cloned())
        })
    }

    fn tenants(&self) -> LedgerResult<Vec<TenantId>> {
        let tenants = self.tenants.read().map_err(|_| poisoned("tenant map"))?;
        let mut ids: Vec<TenantId> = tenants.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn tombstones(
        &self,
        tenant: &TenantId,
        from: u64,
        to: u64,
    ) -> LedgerResult<Vec<PurgeTombstone>> {
        if from > to {
            return Ok(Vec::new());
        }
        self.with_chain(tenant, Vec::new(), |chain| {
            Ok(chain
                .tombstones
                .range(from..=to)
                .map(|(_, t)| t.clone())
                .collect())
        })
    }

    fn update(
        &self,
        tenant: &TenantId,
        id: RecordId,
        update: RecordUpdate,
    ) -> LedgerResult<AuditRecord> {
        self.with_existing(tenant, id, |chain| {
            let record = chain.record_mut(id)?;
            match update {
                RecordUpdate::AnchorReceipt(receipt) if record.anchor_receipt.is_none() => {
                    record.anchor_receipt = Some(receipt);
                    Ok(record.clone())
                }
                // Holds carry a policy-derived expiry; they go through
                // `set_legal_hold`.
                other => Err(rejected(record, other.field())),
            }
        })
    }

    fn set_legal_hold(
        &self,
        tenant: &TenantId,
        id: RecordId,
        hold: LegalHold,
        retention_expiry: Option<DateTime<Utc>>,
    ) -> LedgerResult<AuditRecord> {
        if hold.active == retention_expiry.is_some() {
            return Err(LedgerError::Validation {
                reason: "retention_expiry must be unset exactly while a legal hold is active"
                    .to_string(),
            });
        }
        self.with_existing(tenant, id, |chain| {
            let record = chain.record_mut(id)?;
            if record.disposition == Disposition::Disposed
                || record.legal_hold.active == hold.active
            {
                return Err(rejected(record, "legal_hold"));
            }
            record.legal_hold = hold;
            record.retention_expiry = retention_expiry;
            Ok(record.clone())
        })
    }

    fn dispose(
        &self,
        tenant: &TenantId,
        id: RecordId,
        action: &DisposalAction,
    ) -> LedgerResult<AuditRecord> {
        self.with_existing(tenant, id, |chain| {
            let seq = chain.sequence_of(id)?;
            let current = chain
                .records
                .get(&seq)
                .ok_or_else(|| LedgerError::NotFound {
                    what: format!("record {id}"),
                })?;

            let blocked = |reason: &str| LedgerError::DisposalBlocked {
                record_id: id.to_string(),
                reason: reason.to_string(),
            };
            if current.disposition == Disposition::Disposed {
                return Err(blocked("record is already disposed"));
            }
            if current.legal_hold.active {
                return Err(blocked("record is under legal hold"));
            }
            match current.retention_expiry {
                Some(expiry) if expiry <= action.disposed_at => {}
                _ => return Err(blocked("retention period has not expired")),
            }

            let mut disposed = current.clone();
            chain.unindex_resource(&disposed);
            disposed.disposition = Disposition::Disposed;
            disposed.disposed_at = Some(action.disposed_at);

            match action.method {
                DisposalMethod::Anonymize => {
                    disposed.payload = serde_json::Value::Null;
                    disposed.actor_id = None;
                    disposed.resource_id = REDACTED.to_string();
                    disposed.correlation_id = None;
                    chain.records.insert(seq, disposed.clone());
                }
                DisposalMethod::Purge => {
                    chain.records.remove(&seq);
                    chain.by_id.remove(&id);
                    chain.by_hash.remove(&disposed.integrity_hash);
                    chain.tombstones.insert(
                        seq,
                        PurgeTombstone {
                            tenant_id: disposed.tenant_id.clone(),
                            record_id: id,
                            sequence_number: seq,
                            integrity_hash: disposed.integrity_hash.clone(),
                            previous_hash: disposed.previous_hash.clone(),
                            disposed_at: action.disposed_at,
                        },
                    );
                }
            }

            info!(
                tenant_id = %disposed.tenant_id,
                record_id = %id,
                sequence = seq,
                method = ?action.method,
                "audit record disposed"
            );
            Ok(disposed)
        })
    }

    fn delete(&self, tenant: &TenantId, id: RecordId) -> LedgerResult<()> {
        self.with_existing(tenant, id, |chain| {
            let seq = chain.sequence_of(id)?;
            error!(
                tenant_id = %tenant,
                record_id = %id,
                sequence = seq,
                "rejected deletion of audit record outside the disposal path"
            );
            Err(LedgerError::ImmutabilityViolation {
                record_id: id.to_string(),
                field: "record".to_string(),
            })
        })
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tenant_count = self.tenants.read().map(|t| t.len()).unwrap_or_default();
        f.debug_struct("InMemoryRecordStore")
            .field("tenants", &tenant_count)
            .finish()
    }
}
