//! Error types for the Custodia audit ledger.
//!
//! All fallible ledger operations return `LedgerResult<T>`. Every variant is
//! classified by `ErrorKind` so the HTTP layer in front of the ledger can map
//! errors to status codes without matching on message text.

use thiserror::Error;

/// The unified error type for the audit ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed input, rejected before any write.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// The tenant identifier is missing or empty.
    #[error("invalid tenant: {reason}")]
    InvalidTenant { reason: String },

    /// An update or delete touched a field that is immutable after append.
    ///
    /// Never retried. Indicates a caller bug.
    #[error("immutability violation on record {record_id}: field '{field}' cannot be modified")]
    ImmutabilityViolation { record_id: String, field: String },

    /// Another append won the race for the tenant's next sequence number.
    #[error("concurrency conflict for tenant '{tenant_id}': {reason}")]
    ConcurrencyConflict { tenant_id: String, reason: String },

    /// The requested record does not exist in the tenant's ledger.
    #[error("record not found: {what}")]
    NotFound { what: String },

    /// The external anchoring service could not be reached or refused a batch.
    #[error("anchor submission failed: {reason}")]
    AnchorSubmissionFailed { reason: String },

    /// Disposal was attempted on a record that is held, unexpired, or already disposed.
    #[error("disposal of record {record_id} blocked: {reason}")]
    DisposalBlocked { record_id: String, reason: String },

    /// A configuration file or retention table is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The backing store failed (lock poisoning, I/O).
    #[error("storage failure: {reason}")]
    StorageFailure { reason: String },
}

/// Stable classification of a `LedgerError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvalidTenant,
    ImmutabilityViolation,
    ConcurrencyConflict,
    NotFound,
    AnchorSubmissionFailed,
    DisposalBlocked,
    Config,
    Storage,
}

impl LedgerError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. } => ErrorKind::Validation,
            LedgerError::InvalidTenant { .. } => ErrorKind::InvalidTenant,
            LedgerError::ImmutabilityViolation { .. } => ErrorKind::ImmutabilityViolation,
            LedgerError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::AnchorSubmissionFailed { .. } => ErrorKind::AnchorSubmissionFailed,
            LedgerError::DisposalBlocked { .. } => ErrorKind::DisposalBlocked,
            LedgerError::ConfigError { .. } => ErrorKind::Config,
            LedgerError::StorageFailure { .. } => ErrorKind::Storage,
        }
    }

    /// True when the same call may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::ConcurrencyConflict { .. } | LedgerError::AnchorSubmissionFailed { .. }
        )
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        LedgerError::Validation {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the Custodia crates.
pub type LedgerResult<T> = Result<T, LedgerError>;
