//! Report data structure (HTML is generated in the attestor_report crate).

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::crypto::canonical_json;
use crate::distribute::Distribution;
use crate::verify::{Attestation, ReserveProofRecord};

/// Data passed to the HTML report generator: resolved records plus a hash
/// that lets two runs over the same ledger window be compared.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportData {
    pub attestations: Vec<Attestation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reserve_proofs: Vec<ReserveProofRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    pub generated_at: String,
    pub reproducibility_hash_sha256: String,
}

impl ReportData {
    /// The hash covers the records only, not `generated_at`, so re-running
    /// over the same window reproduces it.
    pub fn assemble(
        attestations: Vec<Attestation>,
        reserve_proofs: Vec<ReserveProofRecord>,
        distribution: Option<Distribution>,
    ) -> Self {
        let body = json!({
            "attestations": attestations,
            "reserveProofs": reserve_proofs,
            "distribution": distribution,
        });
        let reproducibility_hash_sha256 = reproducibility_hash(&body);
        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            attestations,
            reserve_proofs,
            distribution,
            generated_at,
            reproducibility_hash_sha256,
        }
    }
}

/// SHA-256 over key-sorted compact JSON, hex encoded. Map order and
/// formatting cannot change the digest.
pub fn reproducibility_hash(value: &serde_json::Value) -> String {
    hex::encode(Sha256::digest(canonical_json(value).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::{IpfsPointer, Status};

    fn attestation(tx: &str) -> Attestation {
        Attestation {
            week: 4,
            reserve_usd: 1000.0,
            ipfs: IpfsPointer {
                hash: "QmaozNR7DZHQK1ZcU9p7QdrshMvXqWK6gpu5rmrkPdT3L4".to_string(),
                url: "https://ipfs.io/ipfs/QmaozNR7DZHQK1ZcU9p7QdrshMvXqWK6gpu5rmrkPdT3L4"
                    .to_string(),
                mime: None,
                size: None,
            },
            metadata_cid: "QmaozNR7DZHQK1ZcU9p7QdrshMvXqWK6gpu5rmrkPdT3L4".to_string(),
            proof_cid: None,
            memo_hash_hex: None,
            signed_by: "GABC".to_string(),
            signature: String::new(),
            signature_type: "ed25519".to_string(),
            nonce: String::new(),
            status: Status::Verified,
            ts: "2024-03-08T00:00:00Z".to_string(),
            tx_hash: tx.to_string(),
            request_cid: None,
            request_memo_hash_hex: None,
            status_reason: None,
            metadata_fetch_failed: false,
            signature_count: Some(1),
            fee_xlm: Some(0.00001),
            tx_source_account: Some("GABC".to_string()),
        }
    }

    #[test]
    fn same_records_reproduce_the_hash() {
        let a = ReportData::assemble(vec![attestation("tx1")], Vec::new(), None);
        let b = ReportData::assemble(vec![attestation("tx1")], Vec::new(), None);
        assert_eq!(a.reproducibility_hash_sha256, b.reproducibility_hash_sha256);
        assert_eq!(a.reproducibility_hash_sha256.len(), 64);
    }

    #[test]
    fn different_records_change_the_hash() {
        let a = ReportData::assemble(vec![attestation("tx1")], Vec::new(), None);
        let b = ReportData::assemble(vec![attestation("tx2")], Vec::new(), None);
        assert_ne!(a.reproducibility_hash_sha256, b.reproducibility_hash_sha256);
    }

    #[test]
    fn key_order_does_not_change_the_hash() {
        let one =
            serde_json::from_str::<serde_json::Value>(r#"{"b":1,"a":{"y":2,"x":3}}"#).unwrap();
        let two =
            serde_json::from_str::<serde_json::Value>(r#"{"a":{"x":3,"y":2},"b":1}"#).unwrap();
        assert_eq!(reproducibility_hash(&one), reproducibility_hash(&two));
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = ReportData::assemble(vec![attestation("tx1")], Vec::new(), None);
        let text = serde_json::to_string(&report).unwrap();
        let parsed: ReportData = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.attestations.len(), 1);
        assert_eq!(
            parsed.reproducibility_hash_sha256,
            report.reproducibility_hash_sha256
        );
    }
}
