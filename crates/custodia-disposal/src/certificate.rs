//! Disposal certificates.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use custodia_contracts::{
    disposal::DisposalCertificate,
    record::{AuditRecord, DisposalMethod},
};
use custodia_core::hash::{canonical_timestamp, digest_value};

const CERTIFICATE_DOMAIN: &str = "custodia.disposal-certificate.v1";

/// Issue a certificate for a record the store has just disposed of.
pub fn issue(
    record: &AuditRecord,
    method: DisposalMethod,
    disposed_at: DateTime<Utc>,
) -> DisposalCertificate {
    let mut certificate = DisposalCertificate {
        certificate_id: uuid::Uuid::new_v4(),
        tenant_id: record.tenant_id.clone(),
        record_id: record.id,
        sequence_number: record.sequence_number,
        integrity_hash: record.integrity_hash.clone(),
        method,
        disposed_at,
        certificate_hash: String::new(),
    };
    certificate.certificate_hash = certificate_hash(&certificate);
    certificate
}

/// True if `certificate_hash` still commits to the certificate's fields.
pub fn verify_certificate(certificate: &DisposalCertificate) -> bool {
    certificate_hash(certificate) == certificate.certificate_hash
}

fn certificate_hash(certificate: &DisposalCertificate) -> String {
    digest_value(CERTIFICATE_DOMAIN, &certified_fields(certificate))
}

fn certified_fields(c: &DisposalCertificate) -> Value {
    let method = match c.method {
        DisposalMethod::Anonymize => "anonymize",
        DisposalMethod::Purge => "purge",
    };
    json!({
        "certificate_id": c.certificate_id.to_string(),
        "tenant_id": c.tenant_id.as_str(),
        "record_id": c.record_id.to_string(),
        "sequence_number": c.sequence_number,
        "integrity_hash": c.integrity_hash,
        "method": method,
        "disposed_at": canonical_timestamp(c.disposed_at),
    })
}
