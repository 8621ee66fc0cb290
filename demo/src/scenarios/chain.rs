//! Scenario 1: Hash chain
//!
//! Records a short matter history for one tenant, shows the per-tenant
//! sequence and hash links, queries the audit trail, proves that core fields
//! cannot be edited or deleted, and finally corrupts one record directly in
//! the backing store to show the verifier pinpointing it.

use serde_json::json;

use custodia_contracts::{
    error::{LedgerError, LedgerResult},
    query::{Pagination, QueryFilter, Sort, SortField, SortOrder},
    record::RecordUpdate,
    tenant::TenantId,
};
use custodia_verify::ChainVerifier;

use super::{print_record, Runtime};

pub fn run_scenario(runtime: &Runtime) -> LedgerResult<()> {
    println!("=== Scenario 1: Hash chain ===");
    println!();

    let firm = TenantId::new("okafor-attorneys")?;
    let other = TenantId::new("van-wyk-inc")?;

    let history = [
        ("matter.open", "m-1042", json!({ "client": "c-77", "type": "conveyancing" })),
        ("document.upload", "m-1042", json!({ "document": "deed-of-sale.pdf" })),
        ("document.sign", "m-1042", json!({ "document": "deed-of-sale.pdf", "signer": "c-77" })),
        ("invoice.issue", "m-1042", json!({ "amount_cents": 1_250_000 })),
        ("matter.close", "m-1042", json!({ "outcome": "registered" })),
    ];
    for (action, matter, payload) in history {
        let record = runtime.ledger.append(
            runtime
                .event(&firm, action, "matter", matter)
                .actor("u-adv-3", "attorney")
                .payload(payload)
                .correlation("req-8841"),
        )?;
        print_record("appended", &record);
    }
    let foreign = runtime
        .ledger
        .append(runtime.event(&other, "matter.open", "matter", "m-1042"))?;
    println!();
    println!(
        "  Other tenant's first record starts its own chain at seq={}",
        foreign.sequence_number
    );

    let trail = runtime.ledger.audit_trail(&firm, "matter", "m-1042")?;
    println!("  Audit trail for matter/m-1042: {} record(s)", trail.len());

    let latest = runtime.ledger.query(
        &firm,
        &QueryFilter {
            actor_id: Some("u-adv-3".to_string()),
            ..Default::default()
        },
        Pagination::new(1, 2),
        Sort {
            field: SortField::SequenceNumber,
            order: SortOrder::Desc,
        },
    )?;
    println!(
        "  Query (actor u-adv-3, newest first, 2 per page): page 1 of {}, seqs {:?}",
        latest.total_pages(),
        latest.items.iter().map(|r| r.sequence_number).collect::<Vec<_>>()
    );
    println!();

    // Immutability.
    let Some(target) = trail.get(1) else {
        return Err(LedgerError::NotFound {
            what: "second record of matter/m-1042".to_string(),
        });
    };
    match runtime.ledger.update(
        &firm,
        target.id,
        RecordUpdate::Payload(json!({ "document": "forged.pdf" })),
    ) {
        Err(LedgerError::ImmutabilityViolation { field, .. }) => {
            println!("  Payload edit:           rejected (ImmutabilityViolation on '{field}')");
        }
        other => println!("  Payload edit:           unexpected outcome {other:?}"),
    }
    match runtime.ledger.delete(&firm, target.id) {
        Err(LedgerError::ImmutabilityViolation { .. }) => {
            println!("  Delete:                 rejected (ImmutabilityViolation)");
        }
        other => println!("  Delete:                 unexpected outcome {other:?}"),
    }
    match runtime.ledger.get(&other, target.id) {
        Err(LedgerError::NotFound { .. }) => {
            println!("  Cross-tenant read:      NotFound");
        }
        other => println!("  Cross-tenant read:      unexpected outcome {other:?}"),
    }

    // Verification before and after corruption.
    let verifier = ChainVerifier::new(runtime.store.clone());
    let report = verifier.verify_all(&firm)?;
    println!(
        "  Verify 1..={}:            {} checked, intact={}",
        report.to_sequence,
        report.total_checked,
        report.is_intact()
    );

    runtime.store.tamper(&firm, 3, |record| {
        record.payload = json!({ "document": "deed-of-sale.pdf", "signer": "someone-else" });
    });
    let report = verifier.verify_all(&firm)?;
    println!(
        "  After store corruption: intact={}, mismatches at {:?}, broken links {}",
        report.is_intact(),
        report
            .mismatches
            .iter()
            .map(|m| m.sequence_number)
            .collect::<Vec<_>>(),
        report.broken_links.len()
    );
    println!();
    println!("  Scenario 1 complete.");
    println!();
    Ok(())
}
