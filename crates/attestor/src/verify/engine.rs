//! The verification engine: fetch each candidate's metadata document, join
//! it back to the ledger context, apply hash and signature checks, and
//! assemble the published records.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cid::{cid_sha256_hex, normalize_cid};
use crate::config::AttestorConfig;
use crate::crypto::SignatureBackend;
use crate::fetch::{FetchError, IpfsFetcher, MetadataEnvelope};
use crate::ledger::{
    decode_manage_data_value, memo_hash_from_attr, parse_created_at, resolve_candidates,
    AttestationCandidate, DataEntryRecord, EffectBundle, OperationRecord, TxAttributes,
    OP_MANAGE_DATA,
};

use super::records::{Attestation, IpfsPointer, ReserveProofRecord, Status};
use super::signature::{verify_detached_signature, SignatureBundle, SignatureOutcome};

/// Only ed25519 detached signatures are in circulation.
pub const SIGNATURE_TYPE: &str = "ed25519";

/// Ledger-side identifiers a fetched document is joined against.
#[derive(Clone, Debug, Default)]
pub struct JoinContext {
    pub metadata_cid: String,
    pub proof_cid: Option<String>,
    pub request_cid: Option<String>,
    pub memo_hash_hex: Option<String>,
    pub request_memo_hash_hex: Option<String>,
    pub manage_data_name: Option<String>,
}

/// What verification concluded for one candidate document.
#[derive(Clone, Debug)]
pub struct VerifyResult {
    pub status: Status,
    pub reason: Option<String>,
    pub metadata: Option<MetadataEnvelope>,
    /// `None` when the document never arrived, so no check was attempted.
    pub signature: Option<SignatureOutcome>,
}

/// Detached hash proof: the digest of the identifier string must reproduce
/// the memo hash the transaction committed to.
pub fn check_hash_proof(cid: &str, memo_hash_hex: Option<&str>) -> (Status, Option<String>) {
    let Some(expected) = memo_hash_hex.map(str::trim).filter(|h| !h.is_empty()) else {
        return (
            Status::Recorded,
            Some("no memo hash on transaction".to_string()),
        );
    };
    if cid_sha256_hex(cid).eq_ignore_ascii_case(expected) {
        (Status::Verified, None)
    } else {
        (Status::Invalid, Some("memo hash mismatch".to_string()))
    }
}

pub struct VerificationEngine {
    config: AttestorConfig,
    fetcher: Arc<IpfsFetcher>,
    backend: SignatureBackend,
}

impl VerificationEngine {
    pub fn new(config: AttestorConfig) -> Result<Self, FetchError> {
        let fetcher = Arc::new(IpfsFetcher::new(&config)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    pub fn with_fetcher(config: AttestorConfig, fetcher: Arc<IpfsFetcher>) -> Self {
        Self {
            config,
            fetcher,
            backend: SignatureBackend::new(),
        }
    }

    pub fn fetcher(&self) -> &Arc<IpfsFetcher> {
        &self.fetcher
    }

    /// A document joins its ledger context when any one rule holds: the
    /// manage-data entry used a recognized key, an embedded proof or request
    /// identifier matches the ledger-side one (case-insensitive), or the
    /// transaction's memo hash equals the request transaction's memo hash.
    fn join_matches(&self, ctx: &JoinContext, envelope: &MetadataEnvelope) -> bool {
        if let Some(name) = ctx.manage_data_name.as_deref() {
            if self.config.is_recognized_key(name) {
                return true;
            }
        }
        if let (Some(embedded), Some(ledger)) =
            (envelope.proof_cid.as_deref(), ctx.proof_cid.as_deref())
        {
            if embedded.eq_ignore_ascii_case(ledger) {
                return true;
            }
        }
        let embedded_request = envelope
            .request
            .as_ref()
            .map(|r| r.cid.as_str())
            .or_else(|| {
                envelope
                    .attestation
                    .as_ref()
                    .and_then(|a| a.request_cid.as_deref())
            });
        if let (Some(embedded), Some(ledger)) = (embedded_request, ctx.request_cid.as_deref()) {
            if embedded.eq_ignore_ascii_case(ledger) {
                return true;
            }
        }
        if let (Some(memo), Some(request)) = (
            ctx.memo_hash_hex.as_deref(),
            ctx.request_memo_hash_hex.as_deref(),
        ) {
            if memo.eq_ignore_ascii_case(request) {
                return true;
            }
        }
        false
    }

    /// Fetch one candidate's document and run the join and signature checks.
    ///
    /// Transport failures record, never invalidate: an unreachable gateway
    /// says nothing about the document. A schema failure always invalidates.
    /// A failed signature degrades to `Invalid` in strict mode, `Recorded`
    /// otherwise; incomplete signing material degrades nothing.
    pub async fn verify_candidate(
        &self,
        ctx: &JoinContext,
        effect: Option<&EffectBundle>,
        tx_source_account: Option<&str>,
    ) -> VerifyResult {
        let envelope = match self.fetcher.fetch_envelope(&ctx.metadata_cid).await {
            Ok(envelope) => envelope,
            Err(err) => {
                let status = if err.is_schema() {
                    Status::Invalid
                } else {
                    Status::Recorded
                };
                debug!(cid = %ctx.metadata_cid, status = %status, error = %err, "fetch did not produce a document");
                return VerifyResult {
                    status,
                    reason: Some(err.to_string()),
                    metadata: None,
                    signature: None,
                };
            }
        };

        let (mut status, mut reason) = if self.join_matches(ctx, &envelope) {
            (Status::Verified, None)
        } else if self.config.strict {
            (Status::Invalid, Some("join-mismatch".to_string()))
        } else {
            (Status::Recorded, Some("join-mismatch".to_string()))
        };

        let bundle = SignatureBundle::resolve(effect, Some(&envelope), tx_source_account);
        let outcome = verify_detached_signature(&self.backend, &envelope, &bundle);
        match &outcome {
            SignatureOutcome::Invalid { reason: sig_reason } => {
                if status != Status::Invalid {
                    status = if self.config.strict {
                        Status::Invalid
                    } else {
                        Status::Recorded
                    };
                }
                if reason.is_none() {
                    reason = Some(sig_reason.clone());
                }
            }
            SignatureOutcome::Verified { matched } => {
                debug!(cid = %ctx.metadata_cid, matched = %matched, "detached signature verified");
            }
            SignatureOutcome::Pending { .. } => {}
        }

        VerifyResult {
            status,
            reason,
            metadata: Some(envelope),
            signature: Some(outcome),
        }
    }

    /// Resolve every attestation candidate in the given operations and data
    /// entries into a published record, newest first. Infallible by
    /// construction: fetch and check failures land in the record's status
    /// and reason instead of propagating.
    pub async fn resolve_attestations(
        &self,
        operations: &[OperationRecord],
        data_entries: &[DataEntryRecord],
    ) -> Vec<Attestation> {
        let set = resolve_candidates(operations, data_entries);
        let mut attestations = Vec::with_capacity(set.candidates.len());
        for candidate in &set.candidates {
            let effect = set.bundle_for(&candidate.payment.transaction_hash);
            attestations.push(self.build_attestation(candidate, effect).await);
        }
        info!(
            count = attestations.len(),
            verified = attestations.iter().filter(|a| a.status == Status::Verified).count(),
            "attestations resolved"
        );
        attestations
    }

    async fn build_attestation(
        &self,
        candidate: &AttestationCandidate,
        effect: Option<&EffectBundle>,
    ) -> Attestation {
        let payment = &candidate.payment;
        let attrs = payment.transaction_attr.as_ref();
        let tx_source_account = attrs
            .and_then(|a| a.source_account.clone())
            .or_else(|| payment.source_account.clone())
            .or_else(|| payment.from.clone());

        let ctx = JoinContext {
            metadata_cid: candidate.metadata_cid.clone(),
            proof_cid: effect.and_then(|b| b.metadata_cid.clone()),
            request_cid: effect.and_then(|b| b.request_cid.clone()),
            memo_hash_hex: candidate.memo_hash_hex.clone(),
            request_memo_hash_hex: candidate.memo_hash_hex.clone(),
            manage_data_name: effect.and_then(|b| b.manage_data_name.clone()),
        };
        let result = self
            .verify_candidate(&ctx, effect, tx_source_account.as_deref())
            .await;
        let metadata = result.metadata.as_ref();
        let signing = SignatureBundle::resolve(effect, metadata, tx_source_account.as_deref());

        let file_cid = metadata
            .map(|m| m.file_cid.clone())
            .unwrap_or_else(|| candidate.metadata_cid.clone());
        let signed_by = metadata
            .and_then(|m| m.attestation.as_ref().and_then(|a| a.signed_by.clone()))
            .or_else(|| metadata.map(|m| m.issuer.clone()))
            .or_else(|| effect.and_then(|b| b.public_key.clone()))
            .or_else(|| tx_source_account.clone())
            .unwrap_or_default();
        let (week, reserve_usd, ts) = match metadata {
            Some(m) => (m.week, m.reserve_amount, m.timestamp.clone()),
            None => (0, 0.0, payment.created_at.clone()),
        };

        Attestation {
            week,
            reserve_usd,
            ipfs: IpfsPointer {
                url: self.fetcher.primary_url(&file_cid),
                hash: file_cid,
                mime: metadata.and_then(|m| m.mime.clone()),
                size: metadata.and_then(|m| m.size),
            },
            metadata_cid: candidate.metadata_cid.clone(),
            proof_cid: ctx.proof_cid.clone(),
            memo_hash_hex: candidate.memo_hash_hex.clone(),
            signed_by,
            signature: signing.signature_string.unwrap_or_default(),
            signature_type: SIGNATURE_TYPE.to_string(),
            nonce: signing.nonce.unwrap_or_default(),
            status: result.status,
            ts,
            tx_hash: payment.transaction_hash.clone(),
            request_cid: signing.request_cid,
            request_memo_hash_hex: candidate.memo_hash_hex.clone(),
            status_reason: result.reason,
            metadata_fetch_failed: result.status == Status::Recorded && result.metadata.is_none(),
            signature_count: attrs.and_then(TxAttributes::signature_count),
            fee_xlm: attrs.and_then(TxAttributes::fee_xlm),
            tx_source_account,
        }
    }

    /// Surface reserve proofs: manage-data entries under a recognized
    /// reserve key whose value decodes to a content identifier. The memo
    /// hash, when the transaction carried one, must reproduce the digest of
    /// that identifier or the proof is `Invalid`. Newest first.
    pub async fn resolve_reserve_proofs(
        &self,
        operations: &[OperationRecord],
    ) -> Vec<ReserveProofRecord> {
        let mut records = Vec::new();
        for op in operations {
            if op.op_type != OP_MANAGE_DATA {
                continue;
            }
            let Some(name) = op.name.as_deref() else {
                continue;
            };
            if !self.config.is_reserve_key(name) {
                continue;
            }
            let Some(tx_hash) = op.transaction_hash.as_deref() else {
                continue;
            };
            let Some(raw_value) = op.value.as_deref() else {
                continue;
            };
            // The ledger's own spelling of the identifier is kept: the memo
            // hash was computed over that exact string, so normalizing here
            // would break the proof.
            let cid = match decode_manage_data_value(raw_value) {
                Ok(decoded) => {
                    let trimmed = decoded.trim().to_string();
                    if let Err(err) = normalize_cid(&trimmed) {
                        debug!(tx = %tx_hash, error = %err, "reserve value is not an identifier");
                        continue;
                    }
                    trimmed
                }
                Err(reason) => {
                    debug!(tx = %tx_hash, error = %reason, "reserve value undecodable");
                    continue;
                }
            };

            let (mut status, metadata, mut metadata_error) =
                match self.fetcher.fetch_reserve(&cid).await {
                    Ok(metadata) => (Status::Verified, Some(metadata), None),
                    Err(err) if err.is_schema() => (Status::Invalid, None, Some(err.to_string())),
                    Err(err) => (Status::Recorded, None, Some(err.to_string())),
                };

            let attrs = op.transaction_attr.as_ref();
            let memo_hash_hex = attrs.and_then(memo_hash_from_attr);
            if status == Status::Verified {
                if let Some(expected) = memo_hash_hex.as_deref() {
                    if let (Status::Invalid, reason) = check_hash_proof(&cid, Some(expected)) {
                        status = Status::Invalid;
                        metadata_error = reason;
                    }
                }
            }

            records.push(ReserveProofRecord {
                gateway_url: self.fetcher.primary_url(&cid),
                cid,
                tx_hash: tx_hash.to_string(),
                memo_hash_hex,
                status,
                ts: op.created_at.clone(),
                metadata,
                metadata_error,
                signature_count: attrs.and_then(TxAttributes::signature_count),
                fee_xlm: attrs.and_then(TxAttributes::fee_xlm),
            });
        }
        records.sort_by_key(|r| std::cmp::Reverse(parse_created_at(&r.ts).unwrap_or(i64::MIN)));
        info!(count = records.len(), "reserve proofs resolved");
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encode_ed25519_public_key;
    use crate::fetch::{GatewayTransport, TransportResponse};
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde_json::{json, Value};
    use sha2::{Digest, Sha256};

    const META_CID: &str = "QmaozNR7DZHQK1ZcU9p7QdrshMvXqWK6gpu5rmrkPdT3L4";
    const FILE_CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    struct OneDoc {
        response: Result<TransportResponse, String>,
        head_status: u16,
    }

    #[async_trait]
    impl GatewayTransport for OneDoc {
        async fn get(&self, _url: &str) -> Result<TransportResponse, String> {
            self.response.clone()
        }

        async fn head(&self, _url: &str) -> Result<u16, String> {
            Ok(self.head_status)
        }
    }

    fn json_response(body: &Value) -> TransportResponse {
        TransportResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: serde_json::to_vec(body).unwrap(),
        }
    }

    fn engine_serving(config: AttestorConfig, response: Result<TransportResponse, String>) -> VerificationEngine {
        let transport = Arc::new(OneDoc {
            response,
            head_status: 200,
        });
        let fetcher = Arc::new(IpfsFetcher::with_transport(
            transport,
            vec!["https://gw.test/ipfs/".to_string()],
            &[0],
        ));
        VerificationEngine::with_fetcher(config, fetcher)
    }

    fn attestation_doc() -> Value {
        json!({
            "week": 12,
            "reserveAmount": 250000.0,
            "fileCid": FILE_CID,
            "issuer": "Custody Trust Ltd",
            "timestamp": "2024-03-08T00:00:00Z"
        })
    }

    fn reserve_doc() -> Value {
        json!({
            "schema": "custody.reserve@1",
            "week": 9,
            "reserveUSD": 1500000.0,
            "spvBalanceXLM": "2000000.0000000",
            "spvBalanceUSDC": "1500000.25",
            "asOf": "2024-03-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn recognized_manage_data_key_verifies() {
        let engine = engine_serving(AttestorConfig::default(), Ok(json_response(&attestation_doc())));
        let ctx = JoinContext {
            metadata_cid: META_CID.to_string(),
            manage_data_name: Some("Custody.Attestation.CID".to_string()),
            ..Default::default()
        };
        let result = engine.verify_candidate(&ctx, None, None).await;
        assert_eq!(result.status, Status::Verified);
        assert_eq!(result.reason, None);
    }

    #[tokio::test]
    async fn unlinked_document_records_in_lenient_mode() {
        let engine = engine_serving(AttestorConfig::default(), Ok(json_response(&attestation_doc())));
        let ctx = JoinContext {
            metadata_cid: META_CID.to_string(),
            ..Default::default()
        };
        let result = engine.verify_candidate(&ctx, None, None).await;
        assert_eq!(result.status, Status::Recorded);
        assert_eq!(result.reason.as_deref(), Some("join-mismatch"));
        assert!(result.metadata.is_some());
    }

    #[tokio::test]
    async fn unlinked_document_invalid_in_strict_mode() {
        let config = AttestorConfig {
            strict: true,
            ..Default::default()
        };
        let engine = engine_serving(config, Ok(json_response(&attestation_doc())));
        let ctx = JoinContext {
            metadata_cid: META_CID.to_string(),
            ..Default::default()
        };
        let result = engine.verify_candidate(&ctx, None, None).await;
        assert_eq!(result.status, Status::Invalid);
        assert_eq!(result.reason.as_deref(), Some("join-mismatch"));
    }

    #[tokio::test]
    async fn embedded_request_identifier_links_case_insensitively() {
        let mut doc = attestation_doc();
        doc["request"] = json!({ "cid": FILE_CID.to_uppercase() });
        let engine = engine_serving(AttestorConfig::default(), Ok(json_response(&doc)));
        let ctx = JoinContext {
            metadata_cid: META_CID.to_string(),
            request_cid: Some(FILE_CID.to_lowercase()),
            ..Default::default()
        };
        let result = engine.verify_candidate(&ctx, None, None).await;
        assert_eq!(result.status, Status::Verified);
    }

    #[tokio::test]
    async fn matching_ledger_memo_hashes_verify() {
        let engine = engine_serving(AttestorConfig::default(), Ok(json_response(&attestation_doc())));
        let digest = "ab".repeat(32);
        let ctx = JoinContext {
            metadata_cid: META_CID.to_string(),
            memo_hash_hex: Some(digest.clone()),
            request_memo_hash_hex: Some(digest.to_uppercase()),
            ..Default::default()
        };
        let result = engine.verify_candidate(&ctx, None, None).await;
        assert_eq!(result.status, Status::Verified);
    }

    #[tokio::test]
    async fn schema_failure_is_always_invalid() {
        let body = json!({ "week": 3, "reserveAmount": 1.0 });
        let engine = engine_serving(AttestorConfig::default(), Ok(json_response(&body)));
        let ctx = JoinContext {
            metadata_cid: META_CID.to_string(),
            manage_data_name: Some("custody.attestation.cid".to_string()),
            ..Default::default()
        };
        let result = engine.verify_candidate(&ctx, None, None).await;
        assert_eq!(result.status, Status::Invalid);
        assert!(result.reason.unwrap().contains("fileCid"));
        assert!(result.metadata.is_none());
    }

    #[tokio::test]
    async fn failed_signature_records_in_lenient_mode() {
        let address = encode_ed25519_public_key(&[3u8; 32]);
        let mut doc = attestation_doc();
        doc["attestation"] = json!({
            "nonce": "nonce-12345678",
            "signature": hex::encode([9u8; 64]),
            "signedBy": address
        });
        let engine = engine_serving(AttestorConfig::default(), Ok(json_response(&doc)));
        let ctx = JoinContext {
            metadata_cid: META_CID.to_string(),
            manage_data_name: Some("custody.attestation.cid".to_string()),
            ..Default::default()
        };
        let result = engine.verify_candidate(&ctx, None, None).await;
        assert_eq!(result.status, Status::Recorded);
        assert_eq!(result.reason.as_deref(), Some("signature verification failed"));
        assert_eq!(
            result.signature,
            Some(SignatureOutcome::Invalid {
                reason: "signature verification failed".to_string()
            })
        );
    }

    #[tokio::test]
    async fn resolve_attestations_assembles_verified_record() {
        let engine = engine_serving(AttestorConfig::default(), Ok(json_response(&attestation_doc())));
        let attr = TxAttributes {
            memo_type: Some("text".to_string()),
            memo: Some(META_CID.to_string()),
            ..Default::default()
        };
        let operations = vec![
            OperationRecord {
                op_type: "payment".to_string(),
                created_at: "2024-03-08T12:00:00Z".to_string(),
                transaction_hash: Some("tx1".to_string()),
                source_account: Some("GSOURCE".to_string()),
                transaction_attr: Some(attr.clone()),
                ..Default::default()
            },
            OperationRecord {
                op_type: "manage_data".to_string(),
                created_at: "2024-03-08T12:00:01Z".to_string(),
                transaction_hash: Some("tx1".to_string()),
                name: Some("custody.attestation.cid".to_string()),
                value: Some(BASE64.encode(META_CID)),
                transaction_attr: Some(attr),
                ..Default::default()
            },
        ];

        let attestations = engine.resolve_attestations(&operations, &[]).await;
        assert_eq!(attestations.len(), 1);
        let record = &attestations[0];
        assert_eq!(record.status, Status::Verified);
        assert_eq!(record.week, 12);
        assert_eq!(record.reserve_usd, 250000.0);
        assert_eq!(record.signed_by, "Custody Trust Ltd");
        assert_eq!(record.signature_type, "ed25519");
        assert_eq!(record.tx_hash, "tx1");
        assert_eq!(record.ts, "2024-03-08T00:00:00Z");
        assert_eq!(record.ipfs.hash, FILE_CID);
        assert!(record.ipfs.url.starts_with("https://gw.test/ipfs/"));
        assert!(!record.metadata_fetch_failed);
    }

    #[tokio::test]
    async fn fetch_failure_record_uses_ledger_fallbacks() {
        let engine = engine_serving(
            AttestorConfig::default(),
            Err("connect: refused".to_string()),
        );
        let operations = vec![OperationRecord {
            op_type: "payment".to_string(),
            created_at: "2024-03-08T12:00:00Z".to_string(),
            transaction_hash: Some("tx9".to_string()),
            source_account: Some("GSOURCE".to_string()),
            transaction_attr: Some(TxAttributes {
                memo_type: Some("text".to_string()),
                memo: Some(META_CID.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }];

        let attestations = engine.resolve_attestations(&operations, &[]).await;
        assert_eq!(attestations.len(), 1);
        let record = &attestations[0];
        assert_eq!(record.status, Status::Recorded);
        assert!(record.metadata_fetch_failed);
        assert_eq!(record.week, 0);
        assert_eq!(record.reserve_usd, 0.0);
        assert_eq!(record.ts, "2024-03-08T12:00:00Z");
        assert_eq!(record.signed_by, "GSOURCE");
        assert_eq!(record.ipfs.hash, record.metadata_cid);
        assert!(record.status_reason.as_deref().unwrap().contains("refused"));
    }

    fn reserve_operation(memo_hash: Option<String>) -> OperationRecord {
        OperationRecord {
            op_type: "manage_data".to_string(),
            created_at: "2024-03-01T09:00:00Z".to_string(),
            transaction_hash: Some("txr".to_string()),
            name: Some("custody.reserve.cid".to_string()),
            value: Some(BASE64.encode(META_CID)),
            transaction_attr: memo_hash.map(|h| TxAttributes {
                memo_type: Some("hash".to_string()),
                memo_hash: Some(h),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn reserve_proof_without_memo_hash_verifies_on_fetch() {
        let engine = engine_serving(AttestorConfig::default(), Ok(json_response(&reserve_doc())));
        let proofs = engine.resolve_reserve_proofs(&[reserve_operation(None)]).await;
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].status, Status::Verified);
        assert_eq!(proofs[0].metadata.as_ref().unwrap().week, 9);
        assert!(proofs[0].gateway_url.starts_with("https://gw.test/ipfs/"));
    }

    #[tokio::test]
    async fn reserve_proof_memo_hash_mismatch_is_invalid() {
        let engine = engine_serving(AttestorConfig::default(), Ok(json_response(&reserve_doc())));
        let wrong = hex::encode([0x11u8; 32]);
        let proofs = engine
            .resolve_reserve_proofs(&[reserve_operation(Some(wrong))])
            .await;
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].status, Status::Invalid);
        assert_eq!(proofs[0].metadata_error.as_deref(), Some("memo hash mismatch"));
    }

    #[tokio::test]
    async fn reserve_proof_memo_hash_match_stays_verified() {
        let engine = engine_serving(AttestorConfig::default(), Ok(json_response(&reserve_doc())));
        // Memo hash committed to the identifier exactly as the ledger
        // carries it, not the canonical form.
        let digest = hex::encode(Sha256::digest(META_CID.as_bytes()));
        let proofs = engine
            .resolve_reserve_proofs(&[reserve_operation(Some(digest))])
            .await;
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].status, Status::Verified);
        assert_eq!(proofs[0].cid, META_CID);
    }

    #[tokio::test]
    async fn reserve_proof_fetch_failure_records_with_error() {
        let engine = engine_serving(AttestorConfig::default(), Err("gateway down".to_string()));
        let proofs = engine.resolve_reserve_proofs(&[reserve_operation(None)]).await;
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].status, Status::Recorded);
        assert!(proofs[0].metadata_error.as_deref().unwrap().contains("gateway down"));
        assert!(proofs[0].metadata.is_none());
    }

    #[test]
    fn hash_proof_outcomes() {
        let digest = cid_sha256_hex(META_CID);
        assert_eq!(
            check_hash_proof(META_CID, Some(&digest.to_uppercase())),
            (Status::Verified, None)
        );
        let (status, reason) = check_hash_proof(META_CID, Some("00"));
        assert_eq!(status, Status::Invalid);
        assert_eq!(reason.as_deref(), Some("memo hash mismatch"));
        let (status, reason) = check_hash_proof(META_CID, None);
        assert_eq!(status, Status::Recorded);
        assert!(reason.is_some());
    }
}
