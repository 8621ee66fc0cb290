//! # custodia-contracts
//!
//! Shared types, query contracts, and errors for the Custodia audit ledger.
//!
//! All crates in the workspace import from here. No ledger logic lives in
//! this crate, only data definitions and error types.

pub mod anchor;
pub mod disposal;
pub mod error;
pub mod query;
pub mod record;
pub mod retention;
pub mod tenant;
pub mod verify;
