//! Ledger record ingestion: operation and effect records in, deduped
//! attestation candidates out.

mod effects;
mod memo;
mod records;
mod resolve;

pub use effects::{
    build_effect_bundles, decode_manage_data_value, merge_manage_data_bundles, EffectBundle,
};
pub use memo::{extract_memo_cid, memo_hash_from_attr, memo_hash_hex};
pub use records::{
    parse_created_at, DataEntryRecord, OperationRecord, PaymentRecord, TxAttributes,
    OP_MANAGE_DATA, OP_PAYMENT,
};
pub use resolve::{build_payments, resolve_candidates, AttestationCandidate, CandidateSet};
