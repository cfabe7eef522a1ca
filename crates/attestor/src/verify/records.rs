//! Published record shapes for attestations and reserve proofs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fetch::ReserveMetadata;

/// Lifecycle of a custody record. `Pending` is the state before any fetch
/// attempt; resolution only ever emits the other three.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Recorded,
    Verified,
    Invalid,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Pending => "Pending",
            Status::Recorded => "Recorded",
            Status::Verified => "Verified",
            Status::Invalid => "Invalid",
        };
        f.write_str(label)
    }
}

/// Where the attested document lives.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IpfsPointer {
    pub hash: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
}

/// One reconciled attestation, assembled from the ledger candidate, its
/// effect bundle, and whatever the metadata fetch produced. Every field has
/// a fallback so a record exists even when the fetch fails.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub week: u32,
    #[serde(rename = "reserveUSD")]
    pub reserve_usd: f64,
    pub ipfs: IpfsPointer,
    pub metadata_cid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo_hash_hex: Option<String>,
    pub signed_by: String,
    pub signature: String,
    pub signature_type: String,
    pub nonce: String,
    pub status: Status,
    pub ts: String,
    pub tx_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_memo_hash_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub metadata_fetch_failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_xlm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_source_account: Option<String>,
}

/// One reserve proof surfaced from a manage-data entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveProofRecord {
    pub cid: String,
    pub tx_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo_hash_hex: Option<String>,
    pub status: Status,
    pub ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ReserveMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_error: Option<String>,
    pub gateway_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_xlm: Option<f64>,
}
