//! Custodia Audit Ledger — Demo CLI
//!
//! Runs one or all of the ledger demo scenarios against an in-memory backend.
//! Each scenario wires the real components (ledger store, retention policy,
//! chain verifier, anchor worker, disposal scheduler) together with a manual
//! clock so retention can be fast-forwarded.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- chain
//!   cargo run -p demo -- legal-hold
//!   cargo run -p demo -- disposal
//!   cargo run -p demo -- anchor
//!   cargo run -p demo -- --retention retention.toml resolve financial ZA

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use custodia_contracts::error::LedgerResult;
use custodia_core::LedgerConfig;
use custodia_retention::TomlRetentionPolicy;

mod scenarios;

use scenarios::{anchoring, chain, disposal, legal_hold, Runtime};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Custodia — immutable, hash-chained audit ledger demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Custodia audit ledger demo",
    long_about = "Runs Custodia demo scenarios showing hash-chained appends, tamper\n\
                  detection, legal holds, retention-driven disposal, and anchoring."
)]
struct Cli {
    /// Ledger configuration TOML (`[ledger]`, `[anchor]`, `[disposal]`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Retention table TOML. Defaults to the built-in table.
    #[arg(long, global = true)]
    retention: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// Appends, queries, immutability, and tamper detection.
    Chain,
    /// Hold at creation, then release and expiry recomputation.
    LegalHold,
    /// Retention-driven anonymize and purge with certificates.
    Disposal,
    /// Batch anchoring through a local notary, with a transient outage.
    Anchor,
    /// Print the retention period that applies to a category/jurisdiction.
    Resolve {
        category: String,
        #[arg(default_value = "ZA")]
        jurisdiction: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=info to see the ledger's own log lines.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = load_runtime(&cli).and_then(|runtime| match cli.command {
        Command::RunAll => run_all(&runtime),
        Command::Chain => chain::run_scenario(&runtime),
        Command::LegalHold => legal_hold::run_scenario(&runtime),
        Command::Disposal => disposal::run_scenario(&runtime),
        Command::Anchor => anchoring::run_scenario(&runtime),
        Command::Resolve {
            ref category,
            ref jurisdiction,
        } => scenarios::resolve(&runtime, category, jurisdiction),
    });

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_runtime(cli: &Cli) -> LedgerResult<Runtime> {
    let config = match &cli.config {
        Some(path) => LedgerConfig::from_file(path)?,
        None => LedgerConfig::default(),
    };
    let retention = match &cli.retention {
        Some(path) => TomlRetentionPolicy::from_file(path)?,
        None => TomlRetentionPolicy::default(),
    };
    Ok(Runtime::new(config, retention))
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all(runtime: &Runtime) -> LedgerResult<()> {
    chain::run_scenario(runtime)?;
    legal_hold::run_scenario(runtime)?;
    disposal::run_scenario(runtime)?;
    anchoring::run_scenario(runtime)?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Custodia — Immutable Audit Ledger");
    println!("=================================");
    println!();
    println!("Per append:");
    println!("  [1] Event validated (no future timestamps, no blank fields)");
    println!("  [2] Next per-tenant sequence claimed by compare-and-swap on the chain head");
    println!("  [3] SHA-256 over canonical fields, linked to the previous record's hash");
    println!("  [4] Retention expiry resolved from category + jurisdiction (none while held)");
    println!("  [5] Record persisted; core fields immutable from here on");
    println!();
}
