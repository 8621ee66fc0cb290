//! # custodia-anchor
//!
//! Periodic, best-effort anchoring of record hashes to an external
//! timestamping authority.
//!
//! Anchoring never blocks an append. [`AnchorWorker`] batches unanchored
//! records, submits them through an
//! [`AnchorClient`](custodia_core::traits::AnchorClient), and writes the
//! confirmed receipt back onto each record. [`LocalNotary`] is an
//! in-process client for tests and the demo.

pub mod notary;
pub mod worker;

pub use notary::LocalNotary;
pub use worker::{AnchorCycle, AnchorWorker, PendingBatch};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    use custodia_contracts::{
        anchor::{AnchorSubmission, ReceiptStatus},
        error::{ErrorKind, LedgerError, LedgerResult},
        record::{AuditRecord, DisposalAction, DisposalMethod, NewAuditEvent},
        tenant::TenantId,
    };
    use custodia_core::{
        config::{AnchorConfig, AppendConfig},
        traits::AnchorClient,
        ManualClock, Shutdown,
    };
    use custodia_retention::TomlRetentionPolicy;
    use custodia_store::{InMemoryRecordStore, LedgerStore};

    use crate::{AnchorWorker, LocalNotary};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
    }

    fn tenant(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    fn fast_config() -> AnchorConfig {
        AnchorConfig {
            batch_size: 10,
            max_attempts: 3,
            base_backoff_ms: 1,
            max_backoff_ms: 4,
            poll_interval_secs: 1,
        }
    }

    struct Fixture {
        ledger: Arc<LedgerStore>,
        notary: Arc<LocalNotary>,
        worker: Arc<AnchorWorker>,
    }

    fn fixture(confirm_after_polls: u32, config: AnchorConfig) -> Fixture {
        let clock = Arc::new(ManualClock::new(t0()));
        let ledger = Arc::new(LedgerStore::new(
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(TomlRetentionPolicy::default()),
            clock.clone(),
            AppendConfig::default(),
        ));
        let notary = Arc::new(LocalNotary::new(clock, confirm_after_polls));
        let worker = Arc::new(AnchorWorker::new(ledger.clone(), notary.clone(), config));
        Fixture {
            ledger,
            notary,
            worker,
        }
    }

    fn append(ledger: &LedgerStore, tenant_id: &str, n: usize) -> Vec<AuditRecord> {
        (0..n)
            .map(|i| {
                ledger
                    .append(
                        NewAuditEvent::new(tenant(tenant_id), "invoice.issue", "invoice", format!("inv-{i}"))
                            .actor("u-7", "clerk")
                            .payload(json!({ "amount": i }))
                            .at(t0() - Duration::minutes(5)),
                    )
                    .unwrap()
            })
            .collect()
    }

    /// Accepts every batch but never produces a receipt for it.
    struct ReceiptlessNotary {
        transient: bool,
        submissions: AtomicUsize,
    }

    impl ReceiptlessNotary {
        fn new(transient: bool) -> Self {
            Self {
                transient,
                submissions: AtomicUsize::new(0),
            }
        }
    }

    impl AnchorClient for ReceiptlessNotary {
        fn submit_batch(&self, _hashes: &[String]) -> LedgerResult<AnchorSubmission> {
            let n = self.submissions.fetch_add(1, Ordering::SeqCst);
            Ok(AnchorSubmission {
                external_ref: format!("lost-{n}"),
                submitted_at: t0(),
            })
        }

        fn fetch_receipt(&self, external_ref: &str) -> LedgerResult<ReceiptStatus> {
            if self.transient {
                Err(LedgerError::AnchorSubmissionFailed {
                    reason: "notary unavailable".to_string(),
                })
            } else {
                Err(LedgerError::NotFound {
                    what: format!("anchor batch {external_ref}"),
                })
            }
        }
    }

    fn receiptless_fixture(transient: bool) -> (Arc<LedgerStore>, Arc<ReceiptlessNotary>, AnchorWorker) {
        let f = fixture(1, fast_config());
        let notary = Arc::new(ReceiptlessNotary::new(transient));
        let worker = AnchorWorker::new(f.ledger.clone(), notary.clone(), fast_config());
        (f.ledger, notary, worker)
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_run_once_anchors_all_tenants() {
        let f = fixture(1, fast_config());
        let a = append(&f.ledger, "T1", 3);
        append(&f.ledger, "T2", 2);

        let cycle = f.worker.run_once(&Shutdown::new()).unwrap();
        assert_eq!(cycle.batches_submitted, 2);
        assert_eq!(cycle.records_anchored, 5);
        assert!(cycle.failed_tenants.is_empty());

        let stored = f.ledger.get(&tenant("T1"), a[0].id).unwrap();
        let receipt = stored.anchor_receipt.expect("receipt attached");
        assert!(receipt.external_ref.starts_with("local:"));
        assert_eq!(receipt.anchored_at, t0());

        let hashes = f.notary.batch(&receipt.external_ref).unwrap();
        assert_eq!(hashes, a.iter().map(|r| r.integrity_hash.clone()).collect::<Vec<_>>());
        assert!(f.worker.in_flight().unwrap().is_empty());
    }

    /// Receipts never touch the hashed fields.
    #[test]
    fn test_receipt_leaves_integrity_hash_unchanged() {
        let f = fixture(1, fast_config());
        let before = append(&f.ledger, "T1", 1).remove(0);
        f.worker.run_once(&Shutdown::new()).unwrap();

        let after = f.ledger.get(&tenant("T1"), before.id).unwrap();
        assert!(after.anchor_receipt.is_some());
        assert_eq!(after.integrity_hash, before.integrity_hash);
        assert_eq!(custodia_core::hash::hash_record(&after), before.integrity_hash);
    }

    #[test]
    fn test_batch_size_limits_submission() {
        let f = fixture(1, AnchorConfig {
            batch_size: 2,
            ..fast_config()
        });
        append(&f.ledger, "T1", 5);

        f.worker.submit_pending(&tenant("T1"), &Shutdown::new()).unwrap().unwrap();
        assert_eq!(f.worker.in_flight().unwrap()[0].records.len(), 2);
    }

    #[test]
    fn test_in_flight_records_are_not_resubmitted() {
        let f = fixture(3, fast_config());
        append(&f.ledger, "T1", 2);
        let shutdown = Shutdown::new();

        assert!(f.worker.submit_pending(&tenant("T1"), &shutdown).unwrap().is_some());
        assert!(f.worker.submit_pending(&tenant("T1"), &shutdown).unwrap().is_none());

        append(&f.ledger, "T1", 1);
        f.worker.submit_pending(&tenant("T1"), &shutdown).unwrap().unwrap();
        let in_flight = f.worker.in_flight().unwrap();
        assert_eq!(in_flight.len(), 2);
        assert_eq!(in_flight[1].records.len(), 1);
    }

    /// Unconfirmed batches stay pending until the notary confirms them.
    #[test]
    fn test_receipts_wait_for_confirmation() {
        let f = fixture(2, fast_config());
        let r = append(&f.ledger, "T1", 1).remove(0);
        f.worker.submit_pending(&tenant("T1"), &Shutdown::new()).unwrap();

        assert_eq!(f.worker.poll_receipts().unwrap(), 0);
        assert!(f.ledger.get(&tenant("T1"), r.id).unwrap().anchor_receipt.is_none());
        assert_eq!(f.worker.in_flight().unwrap().len(), 1);

        assert_eq!(f.worker.poll_receipts().unwrap(), 1);
        assert!(f.ledger.get(&tenant("T1"), r.id).unwrap().anchor_receipt.is_some());
        assert!(f.worker.in_flight().unwrap().is_empty());
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let f = fixture(1, fast_config());
        append(&f.ledger, "T1", 1);
        f.notary.fail_next_submissions(2);

        let submission = f.worker.submit_pending(&tenant("T1"), &Shutdown::new()).unwrap();
        assert!(submission.is_some());
    }

    /// After `max_attempts` the worker gives up; records stay unanchored and
    /// the next cycle picks them up.
    #[test]
    fn test_gives_up_after_max_attempts() {
        let f = fixture(1, fast_config());
        let r = append(&f.ledger, "T1", 1).remove(0);
        f.notary.fail_next_submissions(3);

        let err = f.worker.submit_pending(&tenant("T1"), &Shutdown::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AnchorSubmissionFailed);
        assert!(f.worker.in_flight().unwrap().is_empty());

        let cycle = f.worker.run_once(&Shutdown::new()).unwrap();
        assert_eq!(cycle.records_anchored, 1);
        assert!(f.ledger.get(&tenant("T1"), r.id).unwrap().anchor_receipt.is_some());
    }

    #[test]
    fn test_failed_tenant_reported_not_propagated() {
        let f = fixture(1, AnchorConfig {
            max_attempts: 1,
            ..fast_config()
        });
        append(&f.ledger, "T1", 1);
        f.notary.fail_next_submissions(1);

        let cycle = f.worker.run_once(&Shutdown::new()).unwrap();
        assert_eq!(cycle.failed_tenants, vec![tenant("T1")]);
        assert_eq!(cycle.records_anchored, 0);
    }

    #[test]
    fn test_disposed_records_are_skipped() {
        let f = fixture(1, fast_config());
        let records = append(&f.ledger, "T1", 2);
        f.ledger
            .record_store()
            .dispose(
                &tenant("T1"),
                records[0].id,
                &DisposalAction {
                    method: DisposalMethod::Anonymize,
                    disposed_at: t0() + Duration::days(365 * 11),
                },
            )
            .unwrap();

        f.worker.submit_pending(&tenant("T1"), &Shutdown::new()).unwrap().unwrap();
        let in_flight = f.worker.in_flight().unwrap();
        assert_eq!(in_flight[0].records, vec![records[1].id]);
    }

    /// A purge between submit and confirm does not fail the batch.
    #[test]
    fn test_purged_while_in_flight() {
        let f = fixture(1, fast_config());
        let records = append(&f.ledger, "T1", 2);
        f.worker.submit_pending(&tenant("T1"), &Shutdown::new()).unwrap();
        f.ledger
            .record_store()
            .dispose(
                &tenant("T1"),
                records[0].id,
                &DisposalAction {
                    method: DisposalMethod::Purge,
                    disposed_at: t0() + Duration::days(365 * 11),
                },
            )
            .unwrap();

        assert_eq!(f.worker.poll_receipts().unwrap(), 1);
        assert!(f.worker.in_flight().unwrap().is_empty());
    }

    #[test]
    fn test_shutdown_abandons_backoff() {
        let f = fixture(1, AnchorConfig {
            base_backoff_ms: 60_000,
            max_backoff_ms: 60_000,
            ..fast_config()
        });
        append(&f.ledger, "T1", 1);
        f.notary.fail_next_submissions(1);

        let shutdown = Shutdown::new();
        shutdown.trigger();
        let err = f.worker.submit_pending(&tenant("T1"), &shutdown).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AnchorSubmissionFailed);
    }

    /// A batch the service no longer knows is dropped, and its records go
    /// out again in the next cycle.
    #[test]
    fn test_lost_batch_is_dropped_and_resubmitted() {
        let (ledger, notary, worker) = receiptless_fixture(false);
        let r = append(&ledger, "T1", 1).remove(0);
        let shutdown = Shutdown::new();

        let cycle = worker.run_once(&shutdown).unwrap();
        assert_eq!(cycle.batches_submitted, 1);
        assert!(worker.in_flight().unwrap().is_empty());

        for _ in 0..4 {
            worker.run_once(&shutdown).unwrap();
        }
        assert_eq!(notary.submissions.load(Ordering::SeqCst), 5);
        assert!(worker.in_flight().unwrap().is_empty());
        assert!(ledger.get(&tenant("T1"), r.id).unwrap().anchor_receipt.is_none());
    }

    /// Transient poll failures keep the batch until `max_attempts` polls in a
    /// row have failed.
    #[test]
    fn test_batch_dropped_after_repeated_poll_failures() {
        let (ledger, _notary, worker) = receiptless_fixture(true);
        append(&ledger, "T1", 2);
        worker.submit_pending(&tenant("T1"), &Shutdown::new()).unwrap();

        assert_eq!(worker.poll_receipts().unwrap(), 0);
        assert_eq!(worker.in_flight().unwrap()[0].failed_polls, 1);
        assert_eq!(worker.poll_receipts().unwrap(), 0);
        assert_eq!(worker.in_flight().unwrap()[0].failed_polls, 2);

        worker.poll_receipts().unwrap();
        assert!(worker.in_flight().unwrap().is_empty());
        let resubmitted = worker.submit_pending(&tenant("T1"), &Shutdown::new()).unwrap();
        assert!(resubmitted.is_some());
        assert_eq!(worker.in_flight().unwrap()[0].records.len(), 2);
    }

    #[test]
    fn test_spawned_worker_stops_on_shutdown() {
        let f = fixture(1, fast_config());
        let r = append(&f.ledger, "T1", 1).remove(0);

        let shutdown = Shutdown::new();
        let handle = f.worker.clone().spawn(StdDuration::from_millis(20), shutdown.clone());

        let mut anchored = false;
        for _ in 0..200 {
            if f.ledger.get(&tenant("T1"), r.id).unwrap().anchor_receipt.is_some() {
                anchored = true;
                break;
            }
            std::thread::sleep(StdDuration::from_millis(10));
        }
        shutdown.trigger();
        handle.join().unwrap();
        assert!(anchored);
    }
}
