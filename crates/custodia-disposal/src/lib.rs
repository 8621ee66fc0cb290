//! # custodia-disposal
//!
//! The end of a record's lifecycle. [`DisposalScheduler`] finds records past
//! their retention expiry and not under legal hold, anonymizes or purges
//! them, and issues a tamper-evident
//! [`DisposalCertificate`](custodia_contracts::disposal::DisposalCertificate)
//! for each. It also exposes the legal-hold transitions that block disposal.

pub mod certificate;
pub mod scheduler;

pub use certificate::verify_certificate;
pub use scheduler::DisposalScheduler;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::{json, Value};

    use custodia_contracts::{
        error::{ErrorKind, LedgerError},
        record::{AuditRecord, DisposalMethod, Disposition, LegalHold, NewAuditEvent, REDACTED},
        tenant::TenantId,
    };
    use custodia_core::{config::AppendConfig, traits::RecordStore, ManualClock, Shutdown};
    use custodia_retention::TomlRetentionPolicy;
    use custodia_store::{InMemoryRecordStore, LedgerStore};

    use crate::{verify_certificate, DisposalScheduler};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
    }

    fn tenant(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    struct Fixture {
        ledger: Arc<LedgerStore>,
        store: Arc<InMemoryRecordStore>,
        clock: Arc<ManualClock>,
        scheduler: Arc<DisposalScheduler>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryRecordStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let ledger = Arc::new(LedgerStore::new(
            store.clone(),
            Arc::new(TomlRetentionPolicy::default()),
            clock.clone(),
            AppendConfig::default(),
        ));
        let scheduler = Arc::new(DisposalScheduler::new(ledger.clone()));
        Fixture {
            ledger,
            store,
            clock,
            scheduler,
        }
    }

    /// An informational event (one-year retention) recorded at `t0()`.
    fn informational(f: &Fixture, tenant_id: &str, resource_id: &str) -> AuditRecord {
        f.ledger
            .append(
                NewAuditEvent::new(tenant(tenant_id), "page.view", "page", resource_id)
                    .actor("u-3", "associate")
                    .category("informational")
                    .payload(json!({ "path": format!("/pages/{resource_id}") }))
                    .correlation("req-1")
                    .at(t0()),
            )
            .unwrap()
    }

    /// A financial event (ten-year retention) recorded at `t0()`.
    fn financial(f: &Fixture, tenant_id: &str) -> AuditRecord {
        f.ledger
            .append(
                NewAuditEvent::new(tenant(tenant_id), "invoice.issue", "invoice", "inv-1")
                    .actor("u-3", "associate")
                    .category("financial")
                    .at(t0()),
            )
            .unwrap()
    }

    fn past_one_year(f: &Fixture) {
        f.clock.set(t0() + Duration::days(367));
    }

    // ── Eligibility ───────────────────────────────────────────────────────────

    #[test]
    fn test_nothing_eligible_before_expiry() {
        let f = fixture();
        informational(&f, "T1", "p-1");
        f.clock.set(t0() + Duration::days(300));
        assert!(f.scheduler.find_eligible(None).unwrap().is_empty());
    }

    #[test]
    fn test_find_eligible_by_tenant_and_category() {
        let f = fixture();
        let a = informational(&f, "T1", "p-1");
        financial(&f, "T1");
        let b = informational(&f, "T2", "p-2");
        past_one_year(&f);

        let all: Vec<_> = f.scheduler.find_eligible(None).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(all.len(), 2);
        assert!(all.contains(&a.id) && all.contains(&b.id));

        let t1 = f.scheduler.find_eligible(Some(&tenant("T1"))).unwrap();
        assert_eq!(t1.len(), 1);
        assert_eq!(t1[0].id, a.id);
    }

    #[test]
    fn test_held_record_is_never_eligible() {
        let f = fixture();
        let r = informational(&f, "T1", "p-1");
        f.scheduler
            .place_legal_hold(&tenant("T1"), r.id, "litigation", "LH-7")
            .unwrap();
        f.clock.set(t0() + Duration::days(365 * 20));

        assert!(f.scheduler.find_eligible(None).unwrap().is_empty());
        let err = f
            .scheduler
            .dispose(&tenant("T1"), r.id, DisposalMethod::Purge)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisposalBlocked);
    }

    // ── Dispose ───────────────────────────────────────────────────────────────

    #[test]
    fn test_anonymize_scrubs_identifiers_and_certifies() {
        let f = fixture();
        let r = informational(&f, "T1", "p-1");
        past_one_year(&f);

        let cert = f
            .scheduler
            .dispose(&tenant("T1"), r.id, DisposalMethod::Anonymize)
            .unwrap();
        assert_eq!(cert.record_id, r.id);
        assert_eq!(cert.sequence_number, 1);
        assert_eq!(cert.integrity_hash, r.integrity_hash);
        assert_eq!(cert.method, DisposalMethod::Anonymize);
        assert_eq!(cert.disposed_at, t0() + Duration::days(367));
        assert!(verify_certificate(&cert));

        let stored = f.ledger.get(&tenant("T1"), r.id).unwrap();
        assert_eq!(stored.disposition, Disposition::Disposed);
        assert_eq!(stored.payload, Value::Null);
        assert_eq!(stored.actor_id, None);
        assert_eq!(stored.correlation_id, None);
        assert_eq!(stored.resource_id, REDACTED);
        assert_eq!(stored.integrity_hash, r.integrity_hash);
        assert_eq!(stored.previous_hash, r.previous_hash);
    }

    #[test]
    fn test_purge_removes_record_and_leaves_tombstone() {
        let f = fixture();
        informational(&f, "T1", "p-1");
        let r = informational(&f, "T1", "p-2");
        past_one_year(&f);

        f.scheduler
            .dispose(&tenant("T1"), r.id, DisposalMethod::Purge)
            .unwrap();
        let err = f.ledger.get(&tenant("T1"), r.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let tombstones = f.store.tombstones(&tenant("T1"), 1, 10).unwrap();
        assert_eq!(tombstones.len(), 1);
        assert_eq!(tombstones[0].sequence_number, 2);
        assert_eq!(tombstones[0].integrity_hash, r.integrity_hash);
        // The head outlives the purge.
        assert_eq!(f.ledger.head(&tenant("T1")).unwrap().last_sequence, 2);
    }

    #[test]
    fn test_unexpired_and_repeated_disposal_blocked() {
        let f = fixture();
        let r = informational(&f, "T1", "p-1");

        let err = f
            .scheduler
            .dispose(&tenant("T1"), r.id, DisposalMethod::Anonymize)
            .unwrap_err();
        assert!(matches!(err, LedgerError::DisposalBlocked { .. }));

        past_one_year(&f);
        f.scheduler
            .dispose(&tenant("T1"), r.id, DisposalMethod::Anonymize)
            .unwrap();
        let err = f
            .scheduler
            .dispose(&tenant("T1"), r.id, DisposalMethod::Anonymize)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisposalBlocked);
    }

    #[test]
    fn test_altered_certificate_fails_verification() {
        let f = fixture();
        let r = informational(&f, "T1", "p-1");
        past_one_year(&f);

        let mut cert = f
            .scheduler
            .dispose(&tenant("T1"), r.id, DisposalMethod::Purge)
            .unwrap();
        cert.disposed_at = t0();
        assert!(!verify_certificate(&cert));
    }

    // ── Legal hold ────────────────────────────────────────────────────────────

    /// Held at creation: no expiry until release, then expiry runs from the
    /// release time.
    #[test]
    fn test_release_recomputes_expiry_from_release_time() {
        let f = fixture();
        let r = f
            .ledger
            .append(
                NewAuditEvent::new(tenant("T1"), "matter.create", "matter", "m-1")
                    .held(LegalHold::placed("regulator inquiry", "LH-1"))
                    .at(t0()),
            )
            .unwrap();
        assert_eq!(r.retention_expiry, None);

        let released_at = t0() + Duration::days(30);
        f.clock.set(released_at);
        let released = f.scheduler.release_legal_hold(&tenant("T1"), r.id).unwrap();
        assert!(!released.legal_hold.active);
        assert_eq!(
            released.retention_expiry,
            Some(Utc.with_ymd_and_hms(2032, 5, 31, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_release_without_hold_is_rejected() {
        let f = fixture();
        let r = informational(&f, "T1", "p-1");
        let err = f.scheduler.release_legal_hold(&tenant("T1"), r.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImmutabilityViolation);
        assert_eq!(f.ledger.get(&tenant("T1"), r.id).unwrap(), r);
    }

    // ── Runs ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_run_disposes_every_eligible_record() {
        let f = fixture();
        informational(&f, "T1", "p-1");
        informational(&f, "T1", "p-2");
        informational(&f, "T2", "p-3");
        financial(&f, "T2");
        past_one_year(&f);

        let run = f.scheduler.run(None, DisposalMethod::Anonymize).unwrap();
        assert_eq!(run.certificates.len(), 3);
        assert!(run.blocked.is_empty());
        assert!(run.certificates.iter().all(verify_certificate));
        assert!(f.scheduler.find_eligible(None).unwrap().is_empty());

        let again = f.scheduler.run(None, DisposalMethod::Anonymize).unwrap();
        assert!(again.certificates.is_empty());
    }

    #[test]
    fn test_concurrent_run_for_same_tenant_conflicts() {
        let f = fixture();
        informational(&f, "T1", "p-1");
        informational(&f, "T2", "p-2");
        past_one_year(&f);

        let claim = f.scheduler.claim(&tenant("T1")).unwrap();
        let err = f
            .scheduler
            .run(Some(&tenant("T1")), DisposalMethod::Purge)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConcurrencyConflict);

        // A pass over every tenant skips the busy one.
        let run = f.scheduler.run(None, DisposalMethod::Purge).unwrap();
        assert_eq!(run.certificates.len(), 1);
        assert_eq!(run.certificates[0].tenant_id, tenant("T2"));

        drop(claim);
        let run = f
            .scheduler
            .run(Some(&tenant("T1")), DisposalMethod::Purge)
            .unwrap();
        assert_eq!(run.certificates.len(), 1);
    }

    #[test]
    fn test_spawned_scheduler_stops_on_shutdown() {
        let f = fixture();
        let r = informational(&f, "T1", "p-1");
        past_one_year(&f);

        let shutdown = Shutdown::new();
        let handle = f.scheduler.clone().spawn(
            StdDuration::from_millis(20),
            DisposalMethod::Anonymize,
            shutdown.clone(),
        );

        let mut disposed = false;
        for _ in 0..200 {
            if !f.ledger.get(&tenant("T1"), r.id).unwrap().is_active() {
                disposed = true;
                break;
            }
            std::thread::sleep(StdDuration::from_millis(10));
        }
        shutdown.trigger();
        handle.join().unwrap();
        assert!(disposed);
    }
}
