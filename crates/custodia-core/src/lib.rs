//! # custodia-core
//!
//! The pieces every other Custodia crate builds on:
//!
//! - canonical SHA-256 record hashing (`hash`)
//! - the `RecordStore`, `RetentionPolicy`, `AnchorClient`, and `Clock` traits
//! - TOML ledger configuration (`config`)
//! - clocks and the worker shutdown flag
//!
//! ## Usage
//!
//! ```rust,ignore
//! use custodia_core::hash::{hash_record, CanonicalFields};
//!
//! let recomputed = hash_record(&record);
//! assert_eq!(recomputed, record.integrity_hash);
//! ```

pub mod clock;
pub mod config;
pub mod hash;
pub mod shutdown;
pub mod traits;

pub use clock::{ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use shutdown::Shutdown;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{json, Map, Value};

    use custodia_contracts::{record::DisposalMethod, tenant::TenantId};

    use crate::{
        clock::ManualClock,
        config::LedgerConfig,
        hash::{canonical_bytes, compute_hash, digest_value, CanonicalFields},
        traits::Clock,
        Shutdown,
    };

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn fields<'a>(tenant: &'a TenantId, payload: &'a Value) -> CanonicalFields<'a> {
        CanonicalFields {
            tenant_id: tenant,
            sequence_number: 7,
            actor_id: Some("u-42"),
            action: "document.sign",
            resource_type: "document",
            resource_id: "doc-9",
            payload,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
        }
    }

    // ── Hashing ───────────────────────────────────────────────────────────────

    /// Same logical content, same digest.
    #[test]
    fn test_hash_is_deterministic() {
        let tenant = TenantId::new("firm-a").unwrap();
        let payload = json!({ "before": { "status": "draft" }, "after": { "status": "signed" } });

        let a = compute_hash(fields(&tenant, &payload));
        let b = compute_hash(fields(&tenant, &payload));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    /// Key insertion order in the payload must not affect the digest.
    #[test]
    fn test_hash_ignores_key_insertion_order() {
        let tenant = TenantId::new("firm-a").unwrap();

        let mut forward = Map::new();
        forward.insert("alpha".into(), json!(1));
        forward.insert("beta".into(), json!({ "x": true, "y": null }));
        let mut reverse = Map::new();
        reverse.insert("beta".into(), json!({ "y": null, "x": true }));
        reverse.insert("alpha".into(), json!(1));

        let forward = Value::Object(forward);
        let reverse = Value::Object(reverse);
        assert_eq!(
            compute_hash(fields(&tenant, &forward)),
            compute_hash(fields(&tenant, &reverse))
        );
    }

    /// Every hashed field contributes to the digest.
    #[test]
    fn test_hash_covers_each_field() {
        let tenant = TenantId::new("firm-a").unwrap();
        let other_tenant = TenantId::new("firm-b").unwrap();
        let payload = json!({ "k": "v" });
        let other_payload = json!({ "k": "w" });
        let base = compute_hash(fields(&tenant, &payload));

        let variants = [
            CanonicalFields { tenant_id: &other_tenant, ..fields(&tenant, &payload) },
            CanonicalFields { sequence_number: 8, ..fields(&tenant, &payload) },
            CanonicalFields { actor_id: None, ..fields(&tenant, &payload) },
            CanonicalFields { action: "document.view", ..fields(&tenant, &payload) },
            CanonicalFields { resource_type: "matter", ..fields(&tenant, &payload) },
            CanonicalFields { resource_id: "doc-10", ..fields(&tenant, &payload) },
            CanonicalFields { payload: &other_payload, ..fields(&tenant, &payload) },
            CanonicalFields {
                timestamp: fields(&tenant, &payload).timestamp + Duration::nanoseconds(1),
                ..fields(&tenant, &payload)
            },
        ];
        for (i, v) in variants.into_iter().enumerate() {
            assert_ne!(compute_hash(v), base, "variant {i} must change the hash");
        }
    }

    /// Null, missing, and the string "null" encode differently.
    #[test]
    fn test_canonical_encoding_tags_types() {
        assert_ne!(canonical_bytes(&json!(null)), canonical_bytes(&json!("null")));
        assert_ne!(canonical_bytes(&json!({})), canonical_bytes(&json!({ "a": null })));
        assert_ne!(canonical_bytes(&json!(["ab"])), canonical_bytes(&json!(["a", "b"])));
        assert_ne!(canonical_bytes(&json!(1)), canonical_bytes(&json!("1")));
        assert_eq!(canonical_bytes(&json!({ "b": 1, "a": 2 })), b"o2:s1:ad2;s1:bd1;".to_vec());
    }

    #[test]
    fn test_digest_value_is_domain_separated() {
        let v = json!({ "x": 1 });
        assert_ne!(digest_value("certificate", &v), digest_value("anchor-batch", &v));
    }

    // ── Config ────────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.ledger.max_append_attempts, 128);
        assert_eq!(config.disposal.method, DisposalMethod::Anonymize);
    }

    #[test]
    fn test_partial_config_overrides() {
        let toml = r#"
            [ledger]
            default_jurisdiction = "UK"

            [disposal]
            method = "PURGE"
        "#;
        let config = LedgerConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.ledger.default_jurisdiction, "UK");
        assert_eq!(config.ledger.max_append_attempts, 128);
        assert_eq!(config.disposal.method, DisposalMethod::Purge);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = LedgerConfig::from_toml_str("[anchor]\nbatch_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("batch_size"));

        let err = LedgerConfig::from_toml_str("[ledger]\nmax_append_attempts = \"x\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("configuration error"));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let anchor = LedgerConfig::default().anchor;
        assert_eq!(anchor.backoff(1), StdDuration::from_millis(200));
        assert_eq!(anchor.backoff(2), StdDuration::from_millis(400));
        assert_eq!(anchor.backoff(3), StdDuration::from_millis(800));
        assert_eq!(anchor.backoff(30), StdDuration::from_millis(10_000));
    }

    // ── Clock / Shutdown ──────────────────────────────────────────────────────

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::days(3));
        assert_eq!(clock.now(), start + Duration::days(3));
    }

    #[test]
    fn test_shutdown_interrupts_sleep() {
        let shutdown = Shutdown::new();
        assert!(shutdown.sleep(StdDuration::from_millis(1)));
        shutdown.trigger();
        assert!(!shutdown.sleep(StdDuration::from_secs(60)));
    }
}
