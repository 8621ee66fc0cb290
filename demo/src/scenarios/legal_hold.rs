//! Scenario 2: Legal hold
//!
//! A record created under a litigation hold carries no retention expiry.
//! Releasing the hold thirty days later recomputes expiry from the release
//! time, not from the original event time. A second record is held after
//! creation, which clears its expiry until release.

use chrono::Duration;
use serde_json::json;

use custodia_contracts::{error::LedgerResult, record::LegalHold, tenant::TenantId};
use custodia_core::traits::Clock;
use custodia_disposal::DisposalScheduler;

use super::{print_record, Runtime};

pub fn run_scenario(runtime: &Runtime) -> LedgerResult<()> {
    println!("=== Scenario 2: Legal hold ===");
    println!();

    let firm = TenantId::new("ndlovu-legal")?;
    let scheduler = DisposalScheduler::new(runtime.ledger.clone());

    let held = runtime.ledger.append(
        runtime
            .event(&firm, "evidence.ingest", "evidence", "ev-19")
            .actor("u-para-1", "paralegal")
            .category("financial")
            .payload(json!({ "exhibit": "bank statements 2019-2021" }))
            .held(LegalHold::placed("pending litigation", "LH-2025-004")),
    )?;
    print_record("created", &held);

    runtime.clock.advance(Duration::days(30));
    let released = scheduler.release_legal_hold(&firm, held.id)?;
    print_record("released", &released);
    println!("  Released at:            {}", runtime.clock.now().to_rfc3339());
    println!();

    let plain = runtime.ledger.append(
        runtime
            .event(&firm, "document.view", "document", "doc-5")
            .actor("u-adv-9", "attorney"),
    )?;
    print_record("created", &plain);
    let placed = scheduler.place_legal_hold(&firm, plain.id, "regulator request", "LH-2025-011")?;
    print_record("held", &placed);

    match scheduler.place_legal_hold(&firm, plain.id, "duplicate", "LH-2025-012") {
        Err(e) => println!("  Second hold:            rejected ({e})"),
        Ok(_) => println!("  Second hold:            unexpectedly accepted"),
    }
    println!();
    println!("  Scenario 2 complete.");
    println!();
    Ok(())
}
