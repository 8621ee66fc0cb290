//! Scenario 4: External anchoring
//!
//! Submits a tenant's unanchored record hashes to a local notary. The first
//! submission fails and is retried with backoff; the batch confirms on the
//! second poll, after which every record carries an anchor receipt. The
//! receipt is metadata outside the hash, so the chain still verifies.

use std::sync::Arc;

use serde_json::json;

use custodia_anchor::{AnchorWorker, LocalNotary};
use custodia_contracts::{error::LedgerResult, tenant::TenantId};
use custodia_core::Shutdown;
use custodia_verify::ChainVerifier;

use super::Runtime;

pub fn run_scenario(runtime: &Runtime) -> LedgerResult<()> {
    println!("=== Scenario 4: External anchoring ===");
    println!();

    let firm = TenantId::new("botha-mahlangu")?;
    for i in 1..=3 {
        runtime.ledger.append(
            runtime
                .event(&firm, "trust.deposit", "trust-account", "ta-9")
                .actor("u-acc-4", "accountant")
                .payload(json!({ "deposit": i })),
        )?;
    }

    let notary = Arc::new(LocalNotary::new(runtime.clock.clone(), 2));
    notary.fail_next_submissions(1);
    let worker = AnchorWorker::new(
        runtime.ledger.clone(),
        notary.clone(),
        runtime.config.anchor.clone(),
    );
    let shutdown = Shutdown::new();

    let submission = worker.submit_pending(&firm, &shutdown)?;
    if let Some(submission) = &submission {
        println!("  Submitted (after one retry): {}", submission.external_ref);
    }
    println!("  First poll anchored:    {} record(s)", worker.poll_receipts()?);
    println!("  Second poll anchored:   {} record(s)", worker.poll_receipts()?);

    let records = runtime.ledger.audit_trail(&firm, "trust-account", "ta-9")?;
    for record in &records {
        if let Some(receipt) = &record.anchor_receipt {
            println!(
                "  seq={} anchored at {} ({})",
                record.sequence_number,
                receipt.anchored_at.to_rfc3339(),
                receipt.external_ref.get(..24).unwrap_or_default()
            );
        }
    }

    let report = ChainVerifier::new(runtime.store.clone()).verify_all(&firm)?;
    println!("  Verify after anchoring: intact={}", report.is_intact());
    println!();
    println!("  Scenario 4 complete.");
    println!();
    Ok(())
}
