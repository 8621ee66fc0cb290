//! The anchoring loop.
//!
//! `AnchorWorker` runs off the append path. Each cycle it:
//!
//! 1. collects, per tenant, active records with no receipt that are not
//!    already in flight, up to `batch_size`;
//! 2. submits their hashes, retrying transient failures with exponential
//!    backoff;
//! 3. polls every in-flight batch and, once confirmed, writes the receipt
//!    onto each record through `LedgerStore::attach_anchor_receipt`.
//!
//! In-flight batches live only in this worker. If the process stops, or the
//! service loses a batch, they are forgotten and the still-unanchored records
//! are resubmitted on the next cycle; receipts are optional metadata, so
//! nothing is lost.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use custodia_contracts::{
    anchor::AnchorSubmission,
    error::{ErrorKind, LedgerError, LedgerResult},
    record::AnchorReceipt,
    tenant::{RecordId, TenantId},
};
use custodia_core::{config::AnchorConfig, traits::AnchorClient, Shutdown};
use custodia_store::LedgerStore;

/// A submitted batch awaiting confirmation.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub tenant_id: TenantId,
    pub external_ref: String,
    pub submitted_at: DateTime<Utc>,
    pub records: Vec<RecordId>,
    /// Consecutive polls that failed with a transient error.
    pub failed_polls: u32,
}

/// What one `run_once` cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorCycle {
    pub batches_submitted: usize,
    pub records_anchored: usize,
    /// Tenants whose submission failed after all retries.
    pub failed_tenants: Vec<TenantId>,
}

pub struct AnchorWorker {
    ledger: Arc<LedgerStore>,
    client: Arc<dyn AnchorClient>,
    config: AnchorConfig,
    pending: Mutex<Vec<PendingBatch>>,
}

impl AnchorWorker {
    pub fn new(ledger: Arc<LedgerStore>, client: Arc<dyn AnchorClient>, config: AnchorConfig) -> Self {
        Self {
            ledger,
            client,
            config,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn pending(&self) -> LedgerResult<MutexGuard<'_, Vec<PendingBatch>>> {
        self.pending.lock().map_err(|_| LedgerError::StorageFailure {
            reason: "anchor pending-batch lock poisoned".to_string(),
        })
    }

    /// Batches submitted but not yet confirmed.
    pub fn in_flight(&self) -> LedgerResult<Vec<PendingBatch>> {
        Ok(self.pending()?.clone())
    }

    /// Submit one batch of the tenant's unanchored records.
    ///
    /// Returns `Ok(None)` when there is nothing to anchor. After
    /// `max_attempts` transient failures, or if `shutdown` fires during a
    /// backoff, returns `AnchorSubmissionFailed`; the records stay
    /// unanchored and are picked up by a later cycle.
    pub fn submit_pending(
        &self,
        tenant: &TenantId,
        shutdown: &Shutdown,
    ) -> LedgerResult<Option<AnchorSubmission>> {
        let in_flight: HashSet<RecordId> = self
            .pending()?
            .iter()
            .filter(|b| &b.tenant_id == tenant)
            .flat_map(|b| b.records.iter().copied())
            .collect();

        let batch: Vec<_> = self
            .ledger
            .record_store()
            .records(tenant)?
            .into_iter()
            .filter(|r| r.is_active() && r.anchor_receipt.is_none() && !in_flight.contains(&r.id))
            .take(self.config.batch_size)
            .collect();
        if batch.is_empty() {
            return Ok(None);
        }

        let hashes: Vec<String> = batch.iter().map(|r| r.integrity_hash.clone()).collect();
        let submission = self.submit_with_retry(tenant, &hashes, shutdown)?;

        info!(
            tenant_id = %tenant,
            external_ref = %submission.external_ref,
            records = batch.len(),
            "anchor batch submitted"
        );
        self.pending()?.push(PendingBatch {
            tenant_id: tenant.clone(),
            external_ref: submission.external_ref.clone(),
            submitted_at: submission.submitted_at,
            records: batch.iter().map(|r| r.id).collect(),
            failed_polls: 0,
        });
        Ok(Some(submission))
    }

    fn submit_with_retry(
        &self,
        tenant: &TenantId,
        hashes: &[String],
        shutdown: &Shutdown,
    ) -> LedgerResult<AnchorSubmission> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.client.submit_batch(hashes) {
                Ok(submission) => return Ok(submission),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.backoff(attempt);
                    warn!(
                        tenant_id = %tenant,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "anchor submission failed; backing off"
                    );
                    if !shutdown.sleep(delay) {
                        return Err(LedgerError::AnchorSubmissionFailed {
                            reason: "abandoned on shutdown".to_string(),
                        });
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!(tenant_id = %tenant, attempt, error = %e, "anchor submission gave up");
                    return Err(match e {
                        e @ LedgerError::AnchorSubmissionFailed { .. } => e,
                        other => LedgerError::AnchorSubmissionFailed {
                            reason: other.to_string(),
                        },
                    });
                }
            }
        }
    }

    /// Poll every in-flight batch and attach receipts for confirmed ones.
    ///
    /// Returns the number of records that received a receipt. Unconfirmed
    /// batches stay in flight. A batch is dropped when the service reports a
    /// permanent error for it, or after `max_attempts` consecutive transient
    /// poll failures; its records become eligible for resubmission.
    pub fn poll_receipts(&self) -> LedgerResult<usize> {
        let batches = std::mem::take(&mut *self.pending()?);
        let max_failed_polls = self.config.max_attempts.max(1);
        let mut still_pending = Vec::new();
        let mut anchored = 0;

        for mut batch in batches {
            let status = match self.client.fetch_receipt(&batch.external_ref) {
                Ok(status) => status,
                Err(e) => {
                    batch.failed_polls += 1;
                    if e.is_retryable() && batch.failed_polls < max_failed_polls {
                        warn!(
                            external_ref = %batch.external_ref,
                            failed_polls = batch.failed_polls,
                            error = %e,
                            "anchor receipt poll failed"
                        );
                        still_pending.push(batch);
                    } else {
                        warn!(
                            tenant_id = %batch.tenant_id,
                            external_ref = %batch.external_ref,
                            records = batch.records.len(),
                            error = %e,
                            "anchor batch dropped; records will be resubmitted"
                        );
                    }
                    continue;
                }
            };
            batch.failed_polls = 0;
            let Some(anchored_at) = status.anchored_at.filter(|_| status.confirmed) else {
                still_pending.push(batch);
                continue;
            };

            for id in &batch.records {
                let receipt = AnchorReceipt {
                    external_ref: batch.external_ref.clone(),
                    anchored_at,
                };
                match self.ledger.attach_anchor_receipt(&batch.tenant_id, *id, receipt) {
                    Ok(_) => anchored += 1,
                    // Purged while the batch was in flight.
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        debug!(record_id = %id, "anchored record no longer stored");
                    }
                    Err(e) => {
                        warn!(record_id = %id, error = %e, "failed to attach anchor receipt");
                    }
                }
            }
        }

        self.pending()?.extend(still_pending);
        Ok(anchored)
    }

    /// One full cycle over every tenant. Per-tenant failures are logged and
    /// reported, never propagated.
    pub fn run_once(&self, shutdown: &Shutdown) -> LedgerResult<AnchorCycle> {
        let mut cycle = AnchorCycle::default();
        for tenant in self.ledger.record_store().tenants()? {
            if shutdown.is_triggered() {
                break;
            }
            match self.submit_pending(&tenant, shutdown) {
                Ok(Some(_)) => cycle.batches_submitted += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(tenant_id = %tenant, error = %e, "anchoring deferred to next cycle");
                    cycle.failed_tenants.push(tenant);
                }
            }
        }
        cycle.records_anchored = self.poll_receipts()?;
        Ok(cycle)
    }

    /// Run `run_once` every `interval` on a background thread until
    /// `shutdown` fires.
    pub fn spawn(self: Arc<Self>, interval: Duration, shutdown: Shutdown) -> JoinHandle<()> {
        std::thread::spawn(move || loop {
            match self.run_once(&shutdown) {
                Ok(cycle) => debug!(?cycle, "anchor cycle complete"),
                Err(e) => warn!(error = %e, "anchor cycle failed"),
            }
            if !shutdown.sleep(interval) {
                info!("anchor worker stopped");
                break;
            }
        })
    }
}
