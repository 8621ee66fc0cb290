//! Scenario 3: Retention-driven disposal
//!
//! Records informational and financial events, fast-forwards the clock past
//! the informational retention period, and runs the disposal scheduler with
//! the configured method. Only the informational record is disposed; the
//! held and financial ones survive. A purge of another expired record leaves
//! a tombstone, and the chain still verifies, with the anonymized record
//! reported as unverifiable rather than tampered.

use chrono::Duration;
use serde_json::json;

use custodia_contracts::{
    error::LedgerResult,
    record::{DisposalMethod, LegalHold},
    tenant::TenantId,
};
use custodia_disposal::{verify_certificate, DisposalScheduler};
use custodia_verify::ChainVerifier;

use super::{print_record, Runtime};

pub fn run_scenario(runtime: &Runtime) -> LedgerResult<()> {
    println!("=== Scenario 3: Retention-driven disposal ===");
    println!();

    let firm = TenantId::new("mokoena-partners")?;
    let scheduler = DisposalScheduler::new(runtime.ledger.clone());

    let viewed = runtime.ledger.append(
        runtime
            .event(&firm, "portal.login", "session", "s-301")
            .actor("c-12", "client")
            .category("informational")
            .payload(json!({ "ip": "198.51.100.7" })),
    )?;
    let invoice = runtime.ledger.append(
        runtime
            .event(&firm, "invoice.issue", "invoice", "inv-88")
            .actor("u-acc-2", "accountant")
            .category("financial")
            .payload(json!({ "amount_cents": 480_000 })),
    )?;
    let held = runtime.ledger.append(
        runtime
            .event(&firm, "portal.login", "session", "s-302")
            .actor("c-13", "client")
            .category("informational")
            .held(LegalHold::placed("fraud investigation", "LH-2025-020")),
    )?;
    let browsed = runtime.ledger.append(
        runtime
            .event(&firm, "portal.browse", "session", "s-303")
            .actor("c-14", "client")
            .category("informational"),
    )?;
    for record in [&viewed, &invoice, &held, &browsed] {
        print_record("created", record);
    }

    runtime.clock.advance(Duration::days(400));
    println!();
    println!("  Clock advanced 400 days.");

    let eligible = scheduler.find_eligible(Some(&firm))?;
    println!("  Eligible for disposal:  {} record(s)", eligible.len());

    let purged = scheduler.dispose(&firm, browsed.id, DisposalMethod::Purge)?;
    println!(
        "  Purged seq={}:           certificate {} (valid={})",
        purged.sequence_number,
        purged.certificate_id,
        verify_certificate(&purged)
    );

    let method = runtime.config.disposal.method;
    let run = scheduler.run(Some(&firm), method)?;
    for certificate in &run.certificates {
        println!(
            "  {:?} seq={}:        certificate {} (valid={})",
            certificate.method,
            certificate.sequence_number,
            certificate.certificate_id,
            verify_certificate(certificate)
        );
    }

    let report = ChainVerifier::new(runtime.store.clone()).verify_all(&firm)?;
    println!(
        "  Verify after disposal:  intact={}, checked={}, unverifiable={}",
        report.is_intact(),
        report.total_checked,
        report.unverifiable.len()
    );
    let stats = runtime.ledger.compliance_stats(&firm, 3650)?;
    println!(
        "  Compliance stats:       {} events, {} disposed, {} under hold",
        stats.total_events, stats.disposed, stats.under_legal_hold
    );
    println!();
    println!("  Scenario 3 complete.");
    println!();
    Ok(())
}
