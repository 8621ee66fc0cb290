//! External anchoring round-trip types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Acknowledgement that a batch of hashes was accepted for anchoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorSubmission {
    pub external_ref: String,
    pub submitted_at: DateTime<Utc>,
}

/// Result of polling the anchoring service for a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptStatus {
    pub confirmed: bool,
    /// Set once `confirmed` is true.
    pub anchored_at: Option<DateTime<Utc>>,
}
