//! Memo classification: text memos can embed an identifier directly, hash
//! memos commit to one out-of-band.

use crate::cid::{decode_binary_cid, normalize_cid};
use crate::ledger::records::{PaymentRecord, TxAttributes};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

const MEMO_HASH_LEN: usize = 32;

/// Recover a content identifier from a payment's memo, canonical form.
///
/// The payment's own memo is preferred; the joined envelope memo is the
/// fallback. Non-text envelope memos are tried as a binary identifier.
/// `None` is the normal outcome for unrelated payments, not an error.
pub fn extract_memo_cid(payment: &PaymentRecord) -> Option<String> {
    if let Some(direct) = payment.memo.as_deref() {
        let direct = direct.trim();
        if !direct.is_empty() {
            if let Ok(cid) = normalize_cid(direct) {
                return Some(cid);
            }
        }
    }

    let attr = payment.transaction_attr.as_ref()?;
    let attr_memo = attr.memo.as_deref()?.trim();
    if attr_memo.is_empty() {
        return None;
    }

    match attr.memo_type.as_deref() {
        Some(t) if t != "text" => {
            let bytes = BASE64.decode(attr_memo).ok()?;
            decode_binary_cid(&bytes).ok()
        }
        _ => normalize_cid(attr_memo).ok(),
    }
}

/// Decode a hash memo value to lowercase hex. Ledger APIs serve base64;
/// older exports are already hex. Values that are not a 32-byte digest
/// are ignored.
pub fn memo_hash_hex(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(bytes) = BASE64.decode(trimmed) {
        if bytes.len() == MEMO_HASH_LEN {
            return Some(hex::encode(bytes));
        }
    }
    let lower = trimmed.to_lowercase();
    if lower.len() == MEMO_HASH_LEN * 2 && lower.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Some(lower);
    }
    None
}

/// The digest a hash-typed envelope memo commits to, lowercase hex.
pub fn memo_hash_from_attr(attr: &TxAttributes) -> Option<String> {
    if attr.memo_type.as_deref() != Some("hash") {
        return None;
    }
    let raw = attr.memo_hash.as_deref().or(attr.memo.as_deref())?;
    memo_hash_hex(raw)
}
