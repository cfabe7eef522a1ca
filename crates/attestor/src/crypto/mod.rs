//! Canonical statement encoding and dual-provider Ed25519.

mod canonical;
mod ed25519;
mod strkey;

pub use canonical::{
    canonical_cbor, canonical_json, decode_cbor_value, serialize_statement, CanonicalError,
    ReserveStatement, SerializedMessage,
};
pub use ed25519::{masked, normalize_secret_key, Ed25519Error, SignatureBackend};
pub use strkey::{decode_ed25519_public_key, encode_ed25519_public_key, StrkeyError};
