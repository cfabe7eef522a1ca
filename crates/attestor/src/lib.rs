//! attestor — custody attestation reconciliation for Stellar-anchored SPVs.
//!
//! Resolves attestation candidates from ledger operation and effect records,
//! fetches their metadata documents through IPFS gateways, verifies joins,
//! memo hashes, and detached signatures, and computes pro-rata income
//! distribution across SPV holders.
//! Read-only against the ledger; verifies signatures, never submits.

pub mod cid;
pub mod config;
pub mod crypto;
pub mod distribute;
pub mod fetch;
pub mod ledger;
pub mod report;
pub mod verify;

pub use cid::{cid_sha256_hex, normalize_cid, CidError};
pub use config::AttestorConfig;
pub use distribute::{
    calculate_distribution, format_amount, Asset, DistributeError, Distribution, Payout, SpvHolder,
};
pub use fetch::{FetchError, IpfsFetcher, MetadataEnvelope, ReserveMetadata};
pub use ledger::{resolve_candidates, DataEntryRecord, OperationRecord, PaymentRecord};
pub use report::{reproducibility_hash, ReportData};
pub use verify::{
    Attestation, IpfsPointer, JoinContext, ReserveProofRecord, Status, VerificationEngine,
    VerifyResult,
};
