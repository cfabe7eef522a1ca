//! Content identifier validation and canonical (v1, base32) form.

use cid::{Cid, Version};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CidError {
    #[error("empty identifier")]
    Empty,
    #[error("invalid cid: {0}")]
    Parse(String),
}

/// Parse a content identifier string and return its canonical form:
/// version 1, base32 lowercase. Version 0 identifiers are upgraded
/// transparently (the upgrade preserves codec and digest).
pub fn normalize_cid(raw: &str) -> Result<String, CidError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(CidError::Empty);
    }
    let parsed = Cid::try_from(s).map_err(|e| CidError::Parse(e.to_string()))?;
    let canonical = to_v1_string(&parsed);
    if parsed.version() == Version::V0 {
        debug!(original = %s, upgraded = %canonical, "cid upgraded to v1");
    }
    Ok(canonical)
}

/// Decode a binary-encoded content identifier (e.g. from a non-text memo)
/// into its canonical string form.
pub fn decode_binary_cid(bytes: &[u8]) -> Result<String, CidError> {
    let parsed = Cid::try_from(bytes).map_err(|e| CidError::Parse(e.to_string()))?;
    Ok(to_v1_string(&parsed))
}

fn to_v1_string(c: &Cid) -> String {
    let v1 = match c.version() {
        Version::V0 => Cid::new_v1(c.codec(), *c.hash()),
        Version::V1 => *c,
    };
    // Display for a v1 cid is base32 lowercase, the canonical text form.
    v1.to_string()
}

/// SHA-256 of the identifier's canonical UTF-8 string, lowercase hex.
/// This is the value a hash-typed memo carries when a transaction commits
/// to an identifier without embedding it.
pub fn cid_sha256_hex(cid_str: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cid_str.as_bytes());
    hex::encode(hasher.finalize())
}
