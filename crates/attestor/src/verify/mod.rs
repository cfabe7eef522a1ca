//! Verification: join rules, detached signatures, and record assembly.

mod engine;
mod records;
mod signature;

pub use engine::{
    check_hash_proof, JoinContext, VerificationEngine, VerifyResult, SIGNATURE_TYPE,
};
pub use records::{Attestation, IpfsPointer, ReserveProofRecord, Status};
pub use signature::{
    build_verification_candidates, hash_signed_message, verify_detached_signature,
    SignatureBundle, SignatureOutcome, VerificationCandidate,
};
