//! Candidate resolution: join payments with their transaction envelope,
//! attach effect bundles and dedupe by metadata identifier.

use crate::cid::normalize_cid;
use crate::ledger::effects::{build_effect_bundles, merge_manage_data_bundles, EffectBundle};
use crate::ledger::memo::{extract_memo_cid, memo_hash_from_attr};
use crate::ledger::records::{
    parse_created_at, DataEntryRecord, OperationRecord, PaymentRecord, TxAttributes, OP_PAYMENT,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

/// One payment that references an evidence document.
#[derive(Clone, Debug)]
pub struct AttestationCandidate {
    pub payment: PaymentRecord,
    /// Canonical (v1) metadata identifier.
    pub metadata_cid: String,
    /// Lowercase hex of a hash-type memo on the same transaction, if any.
    pub memo_hash_hex: Option<String>,
}

/// Deduped candidates plus the per-transaction bundle map they join against.
#[derive(Clone, Debug, Default)]
pub struct CandidateSet {
    pub candidates: Vec<AttestationCandidate>,
    pub bundles: HashMap<String, EffectBundle>,
}

impl CandidateSet {
    pub fn bundle_for(&self, tx_hash: &str) -> Option<&EffectBundle> {
        self.bundles.get(tx_hash)
    }
}

/// Collapse the operation list into payment records. Transaction envelope
/// attributes scattered across sibling operations are folded into one
/// `TxAttributes` per transaction before being attached.
pub fn build_payments(
    operations: &[OperationRecord],
) -> (Vec<PaymentRecord>, HashMap<String, TxAttributes>) {
    let mut attr_by_tx: HashMap<String, TxAttributes> = HashMap::new();
    for op in operations {
        let Some(tx_hash) = op.transaction_hash.as_deref() else {
            continue;
        };
        let Some(attr) = op.transaction_attr.as_ref() else {
            continue;
        };
        let merged = attr_by_tx.entry(tx_hash.to_string()).or_default();
        fold_attr(merged, attr);
    }

    let mut payments = Vec::new();
    for op in operations {
        if op.op_type != OP_PAYMENT {
            continue;
        }
        let Some(tx_hash) = op.transaction_hash.clone() else {
            continue;
        };
        let attr = attr_by_tx.get(&tx_hash).cloned();
        payments.push(PaymentRecord {
            id: op.id.clone(),
            created_at: op.created_at.clone(),
            transaction_hash: tx_hash,
            source_account: op.source_account.clone().or_else(|| op.from.clone()),
            from: op.from.clone().or_else(|| op.source_account.clone()),
            to: op.to.clone(),
            amount: op.amount.clone(),
            asset_type: op.asset_type.clone(),
            asset_code: op.asset_code.clone(),
            asset_issuer: op.asset_issuer.clone(),
            memo: attr.as_ref().and_then(|a| a.memo.clone()),
            transaction_attr: attr,
        });
    }
    (payments, attr_by_tx)
}

/// First non-empty value wins for memo fields; signature lists are replaced
/// whenever a later operation carries a non-empty one.
fn fold_attr(merged: &mut TxAttributes, attr: &TxAttributes) {
    if merged.memo_type.is_none() {
        merged.memo_type = attr.memo_type.clone().filter(|s| !s.is_empty());
    }
    if merged.memo.is_none() {
        merged.memo = attr.memo.clone().filter(|s| !s.is_empty());
    }
    if merged.memo_hash.is_none() {
        merged.memo_hash = attr.memo_hash.clone().filter(|s| !s.is_empty());
    }
    if let Some(signatures) = &attr.signatures {
        if !signatures.is_empty() {
            merged.signatures = Some(signatures.clone());
        }
    }
    if merged.fee_charged.is_none() {
        merged.fee_charged = attr.fee_charged.clone();
    }
    if merged.source_account.is_none() {
        merged.source_account = attr.source_account.clone().filter(|s| !s.is_empty());
    }
}

/// Resolve the full candidate set from raw operations and data entries.
pub fn resolve_candidates(
    operations: &[OperationRecord],
    data_entries: &[DataEntryRecord],
) -> CandidateSet {
    let (payments, attr_by_tx) = build_payments(operations);
    let mut bundles = build_effect_bundles(data_entries);
    merge_manage_data_bundles(operations, &mut bundles);

    let memo_hash_by_tx: HashMap<String, String> = attr_by_tx
        .iter()
        .filter_map(|(tx, attr)| memo_hash_from_attr(attr).map(|hex| (tx.clone(), hex)))
        .collect();

    let candidates = dedupe_candidates(payments, &bundles, &memo_hash_by_tx);
    CandidateSet {
        candidates,
        bundles,
    }
}

/// One candidate per canonical identifier; when several payments reference
/// the same document the one with the latest `created_at` wins. Identifiers
/// that fail normalization are dropped without surfacing an error.
fn dedupe_candidates(
    payments: Vec<PaymentRecord>,
    bundles: &HashMap<String, EffectBundle>,
    memo_hash_by_tx: &HashMap<String, String>,
) -> Vec<AttestationCandidate> {
    let mut by_cid: HashMap<String, AttestationCandidate> = HashMap::new();
    for payment in payments {
        let raw = extract_memo_cid(&payment).or_else(|| {
            bundles
                .get(&payment.transaction_hash)
                .and_then(|b| b.metadata_cid.clone())
        });
        let Some(raw) = raw else {
            continue;
        };
        let cid = match normalize_cid(&raw) {
            Ok(cid) => cid,
            Err(err) => {
                debug!(raw = %raw, tx = %payment.transaction_hash, error = %err,
                    "dropping candidate with malformed identifier");
                continue;
            }
        };
        let memo_hash_hex = memo_hash_by_tx.get(&payment.transaction_hash).cloned();
        let candidate = AttestationCandidate {
            metadata_cid: cid.clone(),
            memo_hash_hex,
            payment,
        };
        match by_cid.entry(cid) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                let held = parse_created_at(&slot.get().payment.created_at).unwrap_or(i64::MIN);
                let newer = parse_created_at(&candidate.payment.created_at).unwrap_or(i64::MIN);
                if newer > held {
                    slot.insert(candidate);
                }
            }
        }
    }

    let mut out: Vec<AttestationCandidate> = by_cid.into_values().collect();
    out.sort_by(|a, b| {
        let ta = parse_created_at(&a.payment.created_at).unwrap_or(i64::MIN);
        let tb = parse_created_at(&b.payment.created_at).unwrap_or(i64::MIN);
        tb.cmp(&ta).then_with(|| a.metadata_cid.cmp(&b.metadata_cid))
    });
    out
}
