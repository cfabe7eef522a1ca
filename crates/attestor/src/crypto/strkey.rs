//! Strkey codec for Ed25519 public keys (`G...` account identifiers).
//!
//! Layout: version byte, 32-byte key, CRC16-XModem checksum (little-endian),
//! base32 RFC4648 upper-case without padding. 56 characters total.

use data_encoding::BASE32_NOPAD;
use thiserror::Error;

const VERSION_ED25519_PUBLIC: u8 = 6 << 3; // renders as leading 'G'
const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum StrkeyError {
    #[error("invalid base32: {0}")]
    Base32(String),
    #[error("wrong payload length: {0}")]
    Length(usize),
    #[error("unexpected version byte: {0:#04x}")]
    Version(u8),
    #[error("checksum mismatch")]
    Checksum,
}

/// Decode a `G...` account identifier to its raw 32-byte Ed25519 public key.
pub fn decode_ed25519_public_key(address: &str) -> Result<[u8; KEY_LEN], StrkeyError> {
    let decoded = BASE32_NOPAD
        .decode(address.trim().as_bytes())
        .map_err(|e| StrkeyError::Base32(e.to_string()))?;
    if decoded.len() != 1 + KEY_LEN + 2 {
        return Err(StrkeyError::Length(decoded.len()));
    }
    let (payload, checksum) = decoded.split_at(1 + KEY_LEN);
    if payload[0] != VERSION_ED25519_PUBLIC {
        return Err(StrkeyError::Version(payload[0]));
    }
    let expected = crc16_xmodem(payload);
    let got = u16::from_le_bytes([checksum[0], checksum[1]]);
    if expected != got {
        return Err(StrkeyError::Checksum);
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&payload[1..]);
    Ok(key)
}

/// Encode a raw 32-byte Ed25519 public key as a `G...` account identifier.
pub fn encode_ed25519_public_key(key: &[u8; KEY_LEN]) -> String {
    let mut payload = Vec::with_capacity(1 + KEY_LEN + 2);
    payload.push(VERSION_ED25519_PUBLIC);
    payload.extend_from_slice(key);
    let checksum = crc16_xmodem(&payload);
    payload.extend_from_slice(&checksum.to_le_bytes());
    BASE32_NOPAD.encode(&payload)
}

// CRC16-XModem: poly 0x1021, init 0x0000, no reflection.
fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key: [u8; 32] = core::array::from_fn(|i| i as u8);
        let address = encode_ed25519_public_key(&key);
        assert_eq!(address.len(), 56);
        assert!(address.starts_with('G'));
        assert_eq!(decode_ed25519_public_key(&address).unwrap(), key);
    }

    #[test]
    fn corrupt_checksum_rejected() {
        let key = [7u8; 32];
        let address = encode_ed25519_public_key(&key);
        let mut chars: Vec<char> = address.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        let corrupted: String = chars.into_iter().collect();
        assert!(matches!(
            decode_ed25519_public_key(&corrupted),
            Err(StrkeyError::Checksum) | Err(StrkeyError::Base32(_))
        ));
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(matches!(
            decode_ed25519_public_key("GAAA"),
            Err(StrkeyError::Length(_)) | Err(StrkeyError::Base32(_))
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(decode_ed25519_public_key("not an address").is_err());
        assert!(decode_ed25519_public_key("").is_err());
    }
}
