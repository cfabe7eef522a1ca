//! Transaction-scoped auxiliary data recovered from account data entries
//! and manage-data operations.

use crate::cid::normalize_cid;
use crate::ledger::records::{DataEntryRecord, OperationRecord, OP_MANAGE_DATA};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// On-chain limit for a manage-data entry value.
const MANAGE_DATA_VALUE_LIMIT: usize = 64;

/// Signature material and identifiers attached to one transaction.
/// All fields optional; entries for the same transaction merge by presence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectBundle {
    pub metadata_cid: Option<String>,
    pub signature: Option<String>,
    pub public_key: Option<String>,
    pub nonce: Option<String>,
    pub request_cid: Option<String>,
    pub manage_data_name: Option<String>,
    pub metadata_error: Option<String>,
}

impl EffectBundle {
    /// Presence merge: a field the incoming bundle supplies wins, anything
    /// it leaves unset is preserved from the existing bundle.
    pub fn merge(existing: Option<EffectBundle>, incoming: EffectBundle) -> EffectBundle {
        let Some(e) = existing else {
            return incoming;
        };
        EffectBundle {
            metadata_cid: incoming.metadata_cid.or(e.metadata_cid),
            signature: incoming.signature.or(e.signature),
            public_key: incoming.public_key.or(e.public_key),
            nonce: incoming.nonce.or(e.nonce),
            request_cid: incoming.request_cid.or(e.request_cid),
            manage_data_name: incoming.manage_data_name.or(e.manage_data_name),
            metadata_error: incoming.metadata_error.or(e.metadata_error),
        }
    }
}

/// Build bundles keyed by transaction hash from `data_created` /
/// `data_updated` entries. Undecodable entries are skipped.
pub fn build_effect_bundles(entries: &[DataEntryRecord]) -> HashMap<String, EffectBundle> {
    let mut map: HashMap<String, EffectBundle> = HashMap::new();
    for entry in entries {
        if entry.entry_type != "data_created" && entry.entry_type != "data_updated" {
            continue;
        }
        let Some(tx_hash) = entry.transaction_hash.as_deref() else {
            continue;
        };
        let Some(value) = entry.value.as_deref() else {
            continue;
        };
        let Ok(bytes) = b64_decode(value) else {
            continue;
        };
        let Ok(decoded) = String::from_utf8(bytes) else {
            continue;
        };
        let Ok(parsed) = serde_json::from_str::<Value>(&decoded) else {
            continue;
        };
        let mut bundle = bundle_from_json(&parsed);
        // the data-entry path drops identifiers that fail normalization
        bundle.metadata_cid = bundle
            .metadata_cid
            .and_then(|raw| normalize_cid(&raw).ok());
        let merged = EffectBundle::merge(map.remove(tx_hash), bundle);
        map.insert(tx_hash.to_string(), merged);
    }
    map
}

/// Fold manage-data operations into the bundle map. A value that decodes
/// but is not JSON is taken as a raw identifier string; decode failures are
/// recorded on the bundle rather than dropped, so the transaction still
/// surfaces with a diagnostic.
pub fn merge_manage_data_bundles(
    operations: &[OperationRecord],
    bundles: &mut HashMap<String, EffectBundle>,
) {
    for op in operations {
        if op.op_type != OP_MANAGE_DATA {
            continue;
        }
        let Some(tx_hash) = op.transaction_hash.as_deref() else {
            continue;
        };
        let mut bundle = EffectBundle {
            manage_data_name: op.name.clone().filter(|n| !n.is_empty()),
            ..Default::default()
        };

        if let Some(raw_value) = op.value.as_deref() {
            match decode_manage_data_value(raw_value) {
                Ok(decoded) => match serde_json::from_str::<Value>(&decoded) {
                    Ok(parsed) => {
                        let from_json = bundle_from_json(&parsed);
                        bundle.metadata_cid = from_json
                            .metadata_cid
                            .map(|raw| normalize_cid(&raw).unwrap_or(raw));
                        bundle.signature = from_json.signature;
                        bundle.public_key = from_json.public_key;
                        bundle.nonce = from_json.nonce;
                        bundle.request_cid = from_json.request_cid;
                    }
                    Err(_) => {
                        let raw = decoded.trim().to_string();
                        if !raw.is_empty() {
                            bundle.metadata_cid = Some(normalize_cid(&raw).unwrap_or(raw));
                        }
                    }
                },
                Err(reason) => {
                    debug!(tx = %tx_hash, %reason, "manage_data value rejected");
                    bundle.metadata_error = Some(reason);
                }
            }
        }

        let merged = EffectBundle::merge(bundles.remove(tx_hash), bundle);
        bundles.insert(tx_hash.to_string(), merged);
    }
}

/// Decode and sanity-check a manage-data value: canonical base64 (verified
/// by re-encoding), within the ledger's 64-byte limit, valid UTF-8.
pub fn decode_manage_data_value(raw: &str) -> Result<String, String> {
    let bytes = b64_decode(raw).map_err(|_| "invalid base64 in manage_data value".to_string())?;
    let reencoded = general_purpose::STANDARD.encode(&bytes);
    if raw.trim_end_matches('=') != reencoded.trim_end_matches('=') {
        return Err("invalid base64 in manage_data value".to_string());
    }
    if bytes.len() > MANAGE_DATA_VALUE_LIMIT {
        return Err(format!(
            "manage_data value exceeds {} bytes",
            MANAGE_DATA_VALUE_LIMIT
        ));
    }
    String::from_utf8(bytes).map_err(|_| "manage_data value is not utf-8".to_string())
}

fn b64_decode(raw: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(raw).or_else(|_| {
        general_purpose::STANDARD_NO_PAD.decode(raw.trim_end_matches('='))
    })
}

/// Probe the signature fields out of a decoded payload. Fields may sit at
/// the top level or nested under an `attestation` key; `signedBy` doubles
/// as the public key in older payloads.
fn bundle_from_json(parsed: &Value) -> EffectBundle {
    let nested = parsed.get("attestation").cloned().unwrap_or(Value::Null);
    let objs = [parsed, &nested];
    EffectBundle {
        metadata_cid: probe_string(&objs, &["metadataCid"]),
        signature: probe_string(&objs, &["signature"]),
        public_key: probe_string(&objs, &["publicKey", "signedBy"]),
        nonce: probe_string(&objs, &["nonce"]),
        request_cid: probe_string(&objs, &["requestCid"]),
        manage_data_name: None,
        metadata_error: None,
    }
}

fn probe_string(objs: &[&Value], keys: &[&str]) -> Option<String> {
    for obj in objs {
        for key in keys {
            if let Some(s) = obj.get(*key).and_then(Value::as_str) {
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
    }
    None
}
