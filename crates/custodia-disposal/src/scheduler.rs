//! The disposal scheduler.
//!
//! Finds records whose retention has lapsed and which carry no legal hold,
//! and disposes of them through the store's sanctioned disposal path. Every
//! disposal yields a `DisposalCertificate`.
//!
//! Runs are non-reentrant per tenant: a run claims the tenant for its whole
//! duration, and a second run for that tenant fails with
//! `ConcurrencyConflict` instead of racing the first.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use custodia_contracts::{
    disposal::{BlockedDisposal, DisposalCertificate, DisposalRun},
    error::{LedgerError, LedgerResult},
    record::{AuditRecord, DisposalAction, DisposalMethod},
    tenant::{RecordId, TenantId},
};
use custodia_core::Shutdown;
use custodia_store::LedgerStore;

use crate::certificate;

pub struct DisposalScheduler {
    ledger: Arc<LedgerStore>,
    running: Mutex<HashSet<TenantId>>,
}

/// A tenant claimed by an in-progress run. Released on drop.
pub(crate) struct RunClaim<'a> {
    running: &'a Mutex<HashSet<TenantId>>,
    tenant: TenantId,
}

impl Drop for RunClaim<'_> {
    fn drop(&mut self) {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        running.remove(&self.tenant);
    }
}

impl DisposalScheduler {
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        Self {
            ledger,
            running: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn claim(&self, tenant: &TenantId) -> LedgerResult<RunClaim<'_>> {
        let mut running = self.running.lock().map_err(|_| LedgerError::StorageFailure {
            reason: "disposal run registry lock poisoned".to_string(),
        })?;
        if !running.insert(tenant.clone()) {
            return Err(LedgerError::ConcurrencyConflict {
                tenant_id: tenant.to_string(),
                reason: "a disposal run is already in progress for this tenant".to_string(),
            });
        }
        Ok(RunClaim {
            running: &self.running,
            tenant: tenant.clone(),
        })
    }

    fn tenants(&self, tenant: Option<&TenantId>) -> LedgerResult<Vec<TenantId>> {
        match tenant {
            Some(t) => Ok(vec![t.clone()]),
            None => self.ledger.record_store().tenants(),
        }
    }

    /// Active, unheld records whose retention expiry is at or before now.
    /// Scans every tenant when `tenant` is `None`.
    pub fn find_eligible(&self, tenant: Option<&TenantId>) -> LedgerResult<Vec<AuditRecord>> {
        let now = self.ledger.clock().now();
        let mut eligible = Vec::new();
        for t in self.tenants(tenant)? {
            eligible.extend(
                self.ledger
                    .record_store()
                    .records(&t)?
                    .into_iter()
                    .filter(|r| r.is_disposal_eligible(now)),
            );
        }
        Ok(eligible)
    }

    /// Dispose of one record now and certify it.
    ///
    /// Fails with `DisposalBlocked` if the record is held, unexpired or
    /// already disposed.
    pub fn dispose(
        &self,
        tenant: &TenantId,
        id: RecordId,
        method: DisposalMethod,
    ) -> LedgerResult<DisposalCertificate> {
        let action = DisposalAction {
            method,
            disposed_at: self.ledger.clock().now(),
        };
        let disposed = self.ledger.record_store().dispose(tenant, id, &action)?;
        let certificate = certificate::issue(&disposed, method, action.disposed_at);
        info!(
            tenant_id = %tenant,
            record_id = %id,
            sequence = disposed.sequence_number,
            certificate_id = %certificate.certificate_id,
            "disposal certificate issued"
        );
        Ok(certificate)
    }

    pub fn place_legal_hold(
        &self,
        tenant: &TenantId,
        id: RecordId,
        reason: &str,
        hold_id: &str,
    ) -> LedgerResult<AuditRecord> {
        self.ledger.place_legal_hold(tenant, id, reason, hold_id)
    }

    /// Lift a hold. Retention expiry is recomputed from the release time.
    pub fn release_legal_hold(&self, tenant: &TenantId, id: RecordId) -> LedgerResult<AuditRecord> {
        self.ledger.release_legal_hold(tenant, id)
    }

    /// One disposal pass.
    ///
    /// With an explicit tenant, fails with `ConcurrencyConflict` if a run for
    /// that tenant is already in progress. A pass over every tenant skips the
    /// busy ones instead. Records that became ineligible between the scan and
    /// the disposal are reported in `blocked`.
    pub fn run(&self, tenant: Option<&TenantId>, method: DisposalMethod) -> LedgerResult<DisposalRun> {
        let mut outcome = DisposalRun::default();
        for t in self.tenants(tenant)? {
            let _claim = match self.claim(&t) {
                Ok(claim) => claim,
                Err(e) if tenant.is_none() && e.is_retryable() => {
                    debug!(tenant_id = %t, "disposal run already in progress; skipping tenant");
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.run_tenant(&t, method, &mut outcome)?;
        }

        info!(
            disposed = outcome.certificates.len(),
            blocked = outcome.blocked.len(),
            method = ?method,
            "disposal run complete"
        );
        Ok(outcome)
    }

    fn run_tenant(
        &self,
        tenant: &TenantId,
        method: DisposalMethod,
        outcome: &mut DisposalRun,
    ) -> LedgerResult<()> {
        for record in self.find_eligible(Some(tenant))? {
            match self.dispose(tenant, record.id, method) {
                Ok(certificate) => outcome.certificates.push(certificate),
                Err(LedgerError::DisposalBlocked { reason, .. }) => {
                    warn!(tenant_id = %tenant, record_id = %record.id, reason = %reason, "disposal blocked");
                    outcome.blocked.push(BlockedDisposal {
                        tenant_id: tenant.clone(),
                        record_id: record.id,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Run a pass over every tenant each `interval` until `shutdown` fires.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        method: DisposalMethod,
        shutdown: Shutdown,
    ) -> JoinHandle<()> {
        std::thread::spawn(move || loop {
            if let Err(e) = self.run(None, method) {
                warn!(error = %e, "disposal run failed");
            }
            if !shutdown.sleep(interval) {
                info!("disposal scheduler stopped");
                break;
            }
        })
    }
}
