//! Detached-signature resolution and checking for attestation documents.
//!
//! Signing material arrives scattered: ledger effects carry some fields, the
//! fetched metadata document carries others (either in its `attestation`
//! block or as loose legacy keys), and older documents leave the signer
//! implicit in the transaction source account. [`SignatureBundle::resolve`]
//! merges those layers, and [`verify_detached_signature`] tries every payload
//! encoding a signer could plausibly have committed to.

use std::collections::HashSet;

use base64::engine::general_purpose::{STANDARD as BASE64, STANDARD_NO_PAD as BASE64_NO_PAD};
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::crypto::{
    decode_ed25519_public_key, serialize_statement, ReserveStatement, SignatureBackend,
};
use crate::fetch::MetadataEnvelope;
use crate::ledger::EffectBundle;

const SIGNED_MESSAGE_PREFIX: &[u8] = b"Stellar Signed Message:\n";

/// Signing material gathered from every layer that may carry it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignatureBundle {
    pub signature_string: Option<String>,
    pub signature_bytes: Option<Vec<u8>>,
    pub public_key: Option<String>,
    pub nonce: Option<String>,
    pub request_cid: Option<String>,
    pub message_base64: Option<String>,
}

impl SignatureBundle {
    /// Merge signing material with ledger effects first, then the metadata
    /// document's `attestation` block, then loose top-level keys left by
    /// older uploaders, and finally the transaction source account as a
    /// last-resort signer.
    pub fn resolve(
        effect: Option<&EffectBundle>,
        envelope: Option<&MetadataEnvelope>,
        tx_source_account: Option<&str>,
    ) -> Self {
        let att = envelope.and_then(|env| env.attestation.as_ref());
        let extra = |key: &str| {
            envelope
                .and_then(|env| env.extra_str(key))
                .map(str::to_string)
        };

        let signature_string = effect
            .and_then(|b| b.signature.clone())
            .or_else(|| att.and_then(|a| a.signature.clone()))
            .or_else(|| extra("signature"));
        let public_key = effect
            .and_then(|b| b.public_key.clone())
            .or_else(|| att.and_then(|a| a.public_key.clone()))
            .or_else(|| att.and_then(|a| a.signed_by.clone()))
            .or_else(|| extra("publicKey"))
            .or_else(|| extra("signedBy"))
            .or_else(|| tx_source_account.map(str::to_string));
        let nonce = effect
            .and_then(|b| b.nonce.clone())
            .or_else(|| att.map(|a| a.nonce.clone()))
            .or_else(|| extra("nonce"))
            .filter(|n| !n.trim().is_empty());
        let request_cid = effect
            .and_then(|b| b.request_cid.clone())
            .or_else(|| envelope.and_then(|env| env.request.as_ref().map(|r| r.cid.clone())))
            .or_else(|| att.and_then(|a| a.request_cid.clone()));
        let message_base64 = att
            .and_then(|a| a.message.clone())
            .or_else(|| extra("messageBase64"))
            .or_else(|| extra("message"))
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        let signature_bytes = signature_string.as_deref().and_then(decode_signature);

        Self {
            signature_string,
            signature_bytes,
            public_key,
            nonce,
            request_cid,
            message_base64,
        }
    }
}

/// Signatures show up hex encoded in some documents and base64 in others.
/// Even-length all-hex strings decode as hex; everything else as base64.
fn decode_signature(raw: &str) -> Option<Vec<u8>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.len() % 2 == 0 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        if let Ok(bytes) = hex::decode(trimmed) {
            return Some(bytes);
        }
    }
    decode_base64(trimmed)
}

fn decode_base64(raw: &str) -> Option<Vec<u8>> {
    BASE64
        .decode(raw)
        .or_else(|_| BASE64_NO_PAD.decode(raw.trim_end_matches('=')))
        .ok()
}

/// Digest of a payload wrapped in the Stellar signed-message envelope:
/// the text prefix, the payload length as little-endian u32, the payload.
pub fn hash_signed_message(payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(SIGNED_MESSAGE_PREFIX);
    hasher.update((payload.len() as u32).to_le_bytes());
    hasher.update(payload);
    hasher.finalize().into()
}

/// One payload a signer may have committed to, labelled with where it came
/// from so a match can be reported.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationCandidate {
    pub source: String,
    pub bytes: Vec<u8>,
}

fn register(candidates: &mut Vec<VerificationCandidate>, source: &str, bytes: Vec<u8>) {
    if bytes.is_empty() {
        return;
    }
    let wrapped = hash_signed_message(&bytes).to_vec();
    let digest = Sha256::digest(&bytes).to_vec();
    candidates.push(VerificationCandidate {
        source: source.to_string(),
        bytes,
    });
    candidates.push(VerificationCandidate {
        source: format!("{source}:signed-message"),
        bytes: wrapped,
    });
    candidates.push(VerificationCandidate {
        source: format!("{source}:sha256"),
        bytes: digest,
    });
}

/// Every payload encoding the signer could have signed: the embedded message
/// (as text and as decoded bytes) plus the statement reconstructed from the
/// document fields and the bundle nonce, each also in signed-message-wrapped
/// and pre-hashed form. Deduplicated by payload bytes, order preserved.
pub fn build_verification_candidates(
    envelope: &MetadataEnvelope,
    bundle: &SignatureBundle,
) -> Vec<VerificationCandidate> {
    let mut candidates = Vec::new();

    if let Some(message) = bundle.message_base64.as_deref() {
        // Some signers signed the base64 text itself rather than the bytes
        // it encodes, so both interpretations are candidates.
        register(&mut candidates, "bundle:message-text", message.as_bytes().to_vec());
        if let Some(decoded) = decode_base64(message) {
            register(&mut candidates, "bundle:message-bytes", decoded);
        }
    }

    if let Some(nonce) = bundle.nonce.as_deref() {
        let statement = ReserveStatement {
            week: envelope.week,
            reserve_amount: envelope.reserve_amount,
            timestamp: envelope.timestamp.clone(),
            nonce: nonce.to_string(),
        };
        if let Ok(serialized) = serialize_statement(&statement) {
            let embedded_matches_serialized =
                bundle.message_base64.as_deref() == Some(serialized.base64.as_str());
            register(
                &mut candidates,
                "statement:json-text",
                serialized.text.into_bytes(),
            );
            register(
                &mut candidates,
                "statement:canonical-bytes",
                serialized.canonical_bytes,
            );
            if !embedded_matches_serialized {
                if let Some(decoded) = decode_base64(&serialized.base64) {
                    register(&mut candidates, "statement:serialized-bytes", decoded);
                }
            }
        }
    }

    let mut seen: HashSet<Vec<u8>> = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.bytes.clone()))
        .collect()
}

/// Outcome of a detached-signature check. `Pending` means the material is
/// incomplete rather than wrong.
#[derive(Clone, Debug, PartialEq)]
pub enum SignatureOutcome {
    Pending { reason: String },
    Verified { matched: String },
    Invalid { reason: String },
}

/// Check the bundle's signature against every candidate payload. Candidates
/// a provider rejects outright (malformed lengths) are skipped, not fatal;
/// only a clean mismatch across all of them is `Invalid`.
pub fn verify_detached_signature(
    backend: &SignatureBackend,
    envelope: &MetadataEnvelope,
    bundle: &SignatureBundle,
) -> SignatureOutcome {
    let Some(signature_bytes) = bundle.signature_bytes.as_deref() else {
        return SignatureOutcome::Pending {
            reason: "awaiting attestation signature".to_string(),
        };
    };
    let (Some(public_key), Some(_nonce)) = (bundle.public_key.as_deref(), bundle.nonce.as_deref())
    else {
        return SignatureOutcome::Pending {
            reason: "awaiting attestation nonce or signer details".to_string(),
        };
    };

    let public_key_raw = match decode_ed25519_public_key(public_key) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(error = %err, "signer address rejected");
            return SignatureOutcome::Invalid {
                reason: "invalid signer public key".to_string(),
            };
        }
    };

    let candidates = build_verification_candidates(envelope, bundle);
    if candidates.is_empty() {
        return SignatureOutcome::Pending {
            reason: "no verification payloads available yet".to_string(),
        };
    }

    for candidate in &candidates {
        match backend.verify(&public_key_raw, &candidate.bytes, signature_bytes) {
            Ok(true) => {
                return SignatureOutcome::Verified {
                    matched: candidate.source.clone(),
                }
            }
            Ok(false) => {}
            Err(err) => {
                debug!(source = %candidate.source, error = %err, "candidate skipped");
            }
        }
    }
    SignatureOutcome::Invalid {
        reason: "signature verification failed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{encode_ed25519_public_key, normalize_secret_key};
    use crate::fetch::parse_envelope;
    use serde_json::json;

    const NONCE: &str = "nonce-12345678";

    fn envelope_fixture() -> MetadataEnvelope {
        let value = json!({
            "week": 12,
            "reserveAmount": 250000.0,
            "fileCid": "QmaozNR7DZHQK1ZcU9p7QdrshMvXqWK6gpu5rmrkPdT3L4",
            "issuer": "custodian",
            "timestamp": "2024-03-01T00:00:00Z",
            "attestation": { "nonce": NONCE }
        });
        parse_envelope(&value).unwrap()
    }

    fn statement_fixture() -> ReserveStatement {
        ReserveStatement {
            week: 12,
            reserve_amount: 250000.0,
            timestamp: "2024-03-01T00:00:00Z".to_string(),
            nonce: NONCE.to_string(),
        }
    }

    fn keypair() -> ([u8; 32], String) {
        let seed = [7u8; 32];
        let expanded = normalize_secret_key(&seed).unwrap();
        let public: [u8; 32] = expanded[32..].try_into().unwrap();
        (seed, encode_ed25519_public_key(&public))
    }

    #[test]
    fn effect_bundle_fields_win_over_document_fields() {
        let effect = EffectBundle {
            signature: Some(hex::encode([1u8; 64])),
            public_key: Some("GEFFECT".to_string()),
            nonce: Some("effect-nonce".to_string()),
            ..Default::default()
        };
        let value = json!({
            "week": 1,
            "reserveAmount": 1.0,
            "fileCid": "QmaozNR7DZHQK1ZcU9p7QdrshMvXqWK6gpu5rmrkPdT3L4",
            "issuer": "custodian",
            "timestamp": "2024-03-01T00:00:00Z",
            "attestation": {
                "nonce": "document-nonce",
                "signature": "ZG9jdW1lbnQ=",
                "signedBy": "GDOCUMENT"
            }
        });
        let envelope = parse_envelope(&value).unwrap();

        let bundle = SignatureBundle::resolve(Some(&effect), Some(&envelope), Some("GSOURCE"));
        assert_eq!(bundle.public_key.as_deref(), Some("GEFFECT"));
        assert_eq!(bundle.nonce.as_deref(), Some("effect-nonce"));
        assert_eq!(bundle.signature_bytes.as_deref(), Some(&[1u8; 64][..]));
    }

    #[test]
    fn loose_document_keys_and_source_account_fill_gaps() {
        let value = json!({
            "week": 1,
            "reserveAmount": 1.0,
            "fileCid": "QmaozNR7DZHQK1ZcU9p7QdrshMvXqWK6gpu5rmrkPdT3L4",
            "issuer": "custodian",
            "timestamp": "2024-03-01T00:00:00Z",
            "signature": "c2ln",
            "nonce": "legacy-nonce"
        });
        let envelope = parse_envelope(&value).unwrap();

        let bundle = SignatureBundle::resolve(None, Some(&envelope), Some("GSOURCE"));
        assert_eq!(bundle.signature_string.as_deref(), Some("c2ln"));
        assert_eq!(bundle.nonce.as_deref(), Some("legacy-nonce"));
        assert_eq!(bundle.public_key.as_deref(), Some("GSOURCE"));
    }

    #[test]
    fn signature_decodes_hex_then_base64() {
        let hex_sig = hex::encode([0xabu8; 64]);
        assert_eq!(decode_signature(&hex_sig), Some(vec![0xab; 64]));

        let b64_sig = BASE64.encode([0xcdu8; 64]);
        assert_eq!(decode_signature(&b64_sig), Some(vec![0xcd; 64]));
    }

    #[test]
    fn candidates_cover_statement_encodings_without_duplicates() {
        let envelope = envelope_fixture();
        let serialized = serialize_statement(&statement_fixture()).unwrap();
        let bundle = SignatureBundle {
            nonce: Some(NONCE.to_string()),
            message_base64: Some(serialized.base64.clone()),
            ..Default::default()
        };

        let candidates = build_verification_candidates(&envelope, &bundle);
        let sources: Vec<&str> = candidates.iter().map(|c| c.source.as_str()).collect();
        assert!(sources.contains(&"bundle:message-text"));
        assert!(sources.contains(&"bundle:message-bytes"));
        assert!(sources.contains(&"statement:json-text"));
        // The embedded message matches the rebuilt statement, so the decoded
        // bytes already entered as bundle:message-bytes and the serialized
        // duplicate is dropped.
        assert!(!sources.contains(&"statement:canonical-bytes"));
        assert!(!sources.contains(&"statement:serialized-bytes"));

        let mut seen = HashSet::new();
        for candidate in &candidates {
            assert!(seen.insert(candidate.bytes.clone()), "duplicate payload");
        }
    }

    #[test]
    fn missing_signature_is_pending() {
        let backend = SignatureBackend::new();
        let envelope = envelope_fixture();
        let outcome = verify_detached_signature(&backend, &envelope, &SignatureBundle::default());
        assert_eq!(
            outcome,
            SignatureOutcome::Pending {
                reason: "awaiting attestation signature".to_string()
            }
        );
    }

    #[test]
    fn missing_signer_details_are_pending() {
        let backend = SignatureBackend::new();
        let envelope = envelope_fixture();
        let bundle = SignatureBundle {
            signature_string: Some(hex::encode([1u8; 64])),
            signature_bytes: Some(vec![1u8; 64]),
            ..Default::default()
        };
        let outcome = verify_detached_signature(&backend, &envelope, &bundle);
        assert_eq!(
            outcome,
            SignatureOutcome::Pending {
                reason: "awaiting attestation nonce or signer details".to_string()
            }
        );
    }

    #[test]
    fn malformed_signer_address_is_invalid() {
        let backend = SignatureBackend::new();
        let envelope = envelope_fixture();
        let bundle = SignatureBundle {
            signature_string: Some(hex::encode([1u8; 64])),
            signature_bytes: Some(vec![1u8; 64]),
            public_key: Some("not-a-strkey".to_string()),
            nonce: Some(NONCE.to_string()),
            ..Default::default()
        };
        let outcome = verify_detached_signature(&backend, &envelope, &bundle);
        assert_eq!(
            outcome,
            SignatureOutcome::Invalid {
                reason: "invalid signer public key".to_string()
            }
        );
    }

    #[test]
    fn canonical_bytes_signature_verifies_with_matched_source() {
        let backend = SignatureBackend::new();
        let (seed, address) = keypair();
        let envelope = envelope_fixture();
        let serialized = serialize_statement(&statement_fixture()).unwrap();
        let signature = backend.sign(&seed, &serialized.canonical_bytes).unwrap();

        let bundle = SignatureBundle {
            signature_string: Some(hex::encode(signature)),
            signature_bytes: Some(signature.to_vec()),
            public_key: Some(address),
            nonce: Some(NONCE.to_string()),
            ..Default::default()
        };
        let outcome = verify_detached_signature(&backend, &envelope, &bundle);
        assert_eq!(
            outcome,
            SignatureOutcome::Verified {
                matched: "statement:canonical-bytes".to_string()
            }
        );
    }

    #[test]
    fn wrapped_text_signature_verifies() {
        let backend = SignatureBackend::new();
        let (seed, address) = keypair();
        let envelope = envelope_fixture();
        let serialized = serialize_statement(&statement_fixture()).unwrap();
        let digest = hash_signed_message(serialized.text.as_bytes());
        let signature = backend.sign(&seed, &digest).unwrap();

        let bundle = SignatureBundle {
            signature_string: Some(BASE64.encode(signature)),
            signature_bytes: Some(signature.to_vec()),
            public_key: Some(address),
            nonce: Some(NONCE.to_string()),
            ..Default::default()
        };
        let outcome = verify_detached_signature(&backend, &envelope, &bundle);
        assert_eq!(
            outcome,
            SignatureOutcome::Verified {
                matched: "statement:json-text:signed-message".to_string()
            }
        );
    }

    #[test]
    fn wrong_signature_is_invalid() {
        let backend = SignatureBackend::new();
        let (seed, address) = keypair();
        let envelope = envelope_fixture();
        let signature = backend.sign(&seed, b"a different payload entirely").unwrap();

        let bundle = SignatureBundle {
            signature_string: Some(hex::encode(signature)),
            signature_bytes: Some(signature.to_vec()),
            public_key: Some(address),
            nonce: Some(NONCE.to_string()),
            ..Default::default()
        };
        let outcome = verify_detached_signature(&backend, &envelope, &bundle);
        assert_eq!(
            outcome,
            SignatureOutcome::Invalid {
                reason: "signature verification failed".to_string()
            }
        );
    }

    #[test]
    fn short_nonce_leaves_no_payloads() {
        let backend = SignatureBackend::new();
        let (seed, address) = keypair();
        let envelope = envelope_fixture();
        let signature = backend.sign(&seed, b"payload").unwrap();

        let bundle = SignatureBundle {
            signature_string: Some(hex::encode(signature)),
            signature_bytes: Some(signature.to_vec()),
            public_key: Some(address),
            nonce: Some("short".to_string()),
            ..Default::default()
        };
        let outcome = verify_detached_signature(&backend, &envelope, &bundle);
        assert_eq!(
            outcome,
            SignatureOutcome::Pending {
                reason: "no verification payloads available yet".to_string()
            }
        );
    }
}
