//! Demo scenarios and the shared runtime they run against.

pub mod anchoring;
pub mod chain;
pub mod disposal;
pub mod legal_hold;

use std::sync::Arc;

use chrono::Utc;

use custodia_contracts::{
    error::LedgerResult,
    record::{AuditRecord, NewAuditEvent},
    tenant::TenantId,
};
use custodia_core::{
    traits::{Clock, RetentionPolicy},
    LedgerConfig, ManualClock,
};
use custodia_retention::TomlRetentionPolicy;
use custodia_store::{InMemoryRecordStore, LedgerStore};

/// One ledger shared by every scenario. Each scenario uses its own tenant.
pub struct Runtime {
    pub config: LedgerConfig,
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryRecordStore>,
    pub retention: Arc<TomlRetentionPolicy>,
    pub ledger: Arc<LedgerStore>,
}

impl Runtime {
    pub fn new(config: LedgerConfig, retention: TomlRetentionPolicy) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(InMemoryRecordStore::new());
        let retention = Arc::new(retention);
        let ledger = Arc::new(LedgerStore::new(
            store.clone(),
            retention.clone(),
            clock.clone(),
            config.ledger.clone(),
        ));
        Self {
            config,
            clock,
            store,
            retention,
            ledger,
        }
    }

    /// An event stamped with the runtime clock's current time.
    pub fn event(
        &self,
        tenant: &TenantId,
        action: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> NewAuditEvent {
        NewAuditEvent::new(tenant.clone(), action, resource_type, resource_id)
            .at(self.clock.now())
    }
}

pub fn resolve(runtime: &Runtime, category: &str, jurisdiction: &str) -> LedgerResult<()> {
    let period = runtime.retention.period(category, jurisdiction);
    let now = runtime.clock.now();
    println!("=== Retention: {category} / {jurisdiction} ===");
    println!();
    println!(
        "  Period:                 {}y {}m {}d",
        period.years, period.months, period.days
    );
    println!("  Expiry if recorded now: {}", period.expiry_from(now));
    println!();
    Ok(())
}

pub(crate) fn print_record(label: &str, record: &AuditRecord) {
    let expiry = record
        .retention_expiry
        .map(|e| e.to_rfc3339())
        .unwrap_or_else(|| "none (legal hold)".to_string());
    println!(
        "  {label:<10} seq={:<3} {:<18} {}/{}  hash={}…  expiry={}",
        record.sequence_number,
        record.action,
        record.resource_type,
        record.resource_id,
        record.integrity_hash.get(..12).unwrap_or_default(),
        expiry
    );
}
