//! Canonical hashing for audit records.
//!
//! Every digest in the ledger goes through `canonical_bytes`, a type-tagged,
//! length-prefixed encoding of a JSON value that is independent of map key
//! insertion order. The encoded bytes are fed into SHA-256 and returned as
//! lowercase hex.
//!
//! Encoding (tag byte, then body):
//!   `n`                      null
//!   `T` / `F`                true / false
//!   `d<text>;`               number, serde_json's textual form
//!   `s<len>:<utf8>`          string, byte length prefix
//!   `a<count>:<items…>`      array, items in order
//!   `o<count>:<k v…>`        object, keys sorted bytewise, key as a string item
//!
//! `previous_hash` is not part of the record hash. The chain link is stored
//! beside `integrity_hash`, so a record's content can be re-verified without
//! knowing its neighbours.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use custodia_contracts::{record::AuditRecord, tenant::TenantId};

/// Domain separator prefixed to every record hash input.
const RECORD_DOMAIN: &[u8] = b"custodia.audit-record.v1\n";

/// The immutable fields a record's `integrity_hash` commits to.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalFields<'a> {
    pub tenant_id: &'a TenantId,
    pub sequence_number: u64,
    pub actor_id: Option<&'a str>,
    pub action: &'a str,
    pub resource_type: &'a str,
    pub resource_id: &'a str,
    pub payload: &'a Value,
    pub timestamp: DateTime<Utc>,
}

impl<'a> CanonicalFields<'a> {
    /// Borrow the hashed fields of a stored record.
    pub fn of(record: &'a AuditRecord) -> Self {
        Self {
            tenant_id: &record.tenant_id,
            sequence_number: record.sequence_number,
            actor_id: record.actor_id.as_deref(),
            action: &record.action,
            resource_type: &record.resource_type,
            resource_id: &record.resource_id,
            payload: &record.payload,
            timestamp: record.timestamp,
        }
    }

    fn to_value(self) -> Value {
        json!({
            "tenant_id": self.tenant_id.as_str(),
            "sequence_number": self.sequence_number,
            "actor_id": self.actor_id,
            "action": self.action,
            "resource_type": self.resource_type,
            "resource_id": self.resource_id,
            "payload": self.payload,
            "timestamp": canonical_timestamp(self.timestamp),
        })
    }
}

/// RFC 3339, UTC `Z` suffix, nanosecond precision.
pub fn canonical_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Compute the `integrity_hash` for a set of canonical fields.
///
/// Returns a lowercase 64-character hex string.
pub fn compute_hash(fields: CanonicalFields<'_>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(RECORD_DOMAIN);
    hasher.update(canonical_bytes(&fields.to_value()));
    hex::encode(hasher.finalize())
}

/// Recompute the `integrity_hash` of a stored record from its current fields.
pub fn hash_record(record: &AuditRecord) -> String {
    compute_hash(CanonicalFields::of(record))
}

/// SHA-256 over the canonical encoding of an arbitrary value, under a
/// caller-chosen domain separator. Used for certificates and anchor batches.
pub fn digest_value(domain: &str, value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_bytes(value));
    hex::encode(hasher.finalize())
}

/// Encode `value` into the canonical byte form described in the module docs.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    encode(value, &mut out);
    out
}

fn encode(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(b'n'),
        Value::Bool(true) => out.push(b'T'),
        Value::Bool(false) => out.push(b'F'),
        Value::Number(n) => {
            out.push(b'd');
            out.extend_from_slice(n.to_string().as_bytes());
            out.push(b';');
        }
        Value::String(s) => encode_str(s, out),
        Value::Array(items) => {
            out.push(b'a');
            out.extend_from_slice(items.len().to_string().as_bytes());
            out.push(b':');
            for item in items {
                encode(item, out);
            }
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'o');
            out.extend_from_slice(entries.len().to_string().as_bytes());
            out.push(b':');
            for (key, item) in entries {
                encode_str(key, out);
                encode(item, out);
            }
        }
    }
}

fn encode_str(s: &str, out: &mut Vec<u8>) {
    out.push(b's');
    out.extend_from_slice(s.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(s.as_bytes());
}
