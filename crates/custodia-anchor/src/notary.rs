//! A local stand-in for an external timestamping authority.
//!
//! `LocalNotary` implements `AnchorClient` without leaving the process. The
//! batch reference is the canonical digest of the submitted hashes, and a
//! batch confirms after a configurable number of polls, which mimics the
//! delay of a real anchoring service. Outages can be injected with
//! `fail_next_submissions`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;

use custodia_contracts::{
    anchor::{AnchorSubmission, ReceiptStatus},
    error::{LedgerError, LedgerResult},
};
use custodia_core::{
    hash::digest_value,
    traits::{AnchorClient, Clock},
};

struct NotarizedBatch {
    hashes: Vec<String>,
    polls: u32,
    anchored_at: Option<DateTime<Utc>>,
}

pub struct LocalNotary {
    clock: Arc<dyn Clock>,
    confirm_after_polls: u32,
    batches: Mutex<HashMap<String, NotarizedBatch>>,
    failures_remaining: AtomicU32,
}

impl LocalNotary {
    /// A notary that confirms a batch on the `confirm_after_polls`-th poll.
    pub fn new(clock: Arc<dyn Clock>, confirm_after_polls: u32) -> Self {
        Self {
            clock,
            confirm_after_polls: confirm_after_polls.max(1),
            batches: Mutex::new(HashMap::new()),
            failures_remaining: AtomicU32::new(0),
        }
    }

    /// Make the next `n` submissions fail with `AnchorSubmissionFailed`.
    pub fn fail_next_submissions(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// The hashes recorded under `external_ref`, if any.
    pub fn batch(&self, external_ref: &str) -> Option<Vec<String>> {
        let batches = self.batches.lock().ok()?;
        batches.get(external_ref).map(|b| b.hashes.clone())
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl AnchorClient for LocalNotary {
    fn submit_batch(&self, hashes: &[String]) -> LedgerResult<AnchorSubmission> {
        if hashes.is_empty() {
            return Err(LedgerError::Validation {
                reason: "cannot anchor an empty batch".to_string(),
            });
        }
        if self.take_failure() {
            return Err(LedgerError::AnchorSubmissionFailed {
                reason: "notary unavailable".to_string(),
            });
        }

        let external_ref = format!(
            "local:{}",
            digest_value("custodia.anchor-batch.v1", &json!(hashes))
        );
        let mut batches = self
            .batches
            .lock()
            .map_err(|_| LedgerError::AnchorSubmissionFailed {
                reason: "notary state lock poisoned".to_string(),
            })?;
        batches
            .entry(external_ref.clone())
            .or_insert_with(|| NotarizedBatch {
                hashes: hashes.to_vec(),
                polls: 0,
                anchored_at: None,
            });

        debug!(external_ref = %external_ref, hashes = hashes.len(), "batch notarized locally");
        Ok(AnchorSubmission {
            external_ref,
            submitted_at: self.clock.now(),
        })
    }

    fn fetch_receipt(&self, external_ref: &str) -> LedgerResult<ReceiptStatus> {
        let mut batches = self
            .batches
            .lock()
            .map_err(|_| LedgerError::AnchorSubmissionFailed {
                reason: "notary state lock poisoned".to_string(),
            })?;
        let batch = batches
            .get_mut(external_ref)
            .ok_or_else(|| LedgerError::NotFound {
                what: format!("anchor batch {external_ref}"),
            })?;

        batch.polls += 1;
        if batch.anchored_at.is_none() && batch.polls >= self.confirm_after_polls {
            batch.anchored_at = Some(self.clock.now());
        }
        Ok(ReceiptStatus {
            confirmed: batch.anchored_at.is_some(),
            anchored_at: batch.anchored_at,
        })
    }
}
