//! # custodia-store
//!
//! Append-only, tenant-isolated storage for the Custodia audit ledger.
//!
//! ## Overview
//!
//! [`LedgerStore`] is the service callers talk to. It assigns each event the
//! next sequence number of its tenant's chain, links it to the previous
//! record's hash, resolves its retention expiry, and persists it through a
//! [`RecordStore`](custodia_core::traits::RecordStore) backend.
//! [`InMemoryRecordStore`] is the reference backend.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use custodia_store::{InMemoryRecordStore, LedgerStore};
//!
//! let ledger = LedgerStore::new(
//!     Arc::new(InMemoryRecordStore::new()),
//!     Arc::new(TomlRetentionPolicy::default()),
//!     Arc::new(SystemClock),
//!     config.ledger,
//! );
//! let record = ledger.append(NewAuditEvent::new(tenant, "matter.create", "matter", "m-1"))?;
//! ```

pub mod ledger;
pub mod memory;

pub use ledger::LedgerStore;
pub use memory::InMemoryRecordStore;

// ── Tests ─────────────────────────────────────────────────────────────────────
