//! Canonical statement encoding: recursive key sort, deterministic bytes.
//!
//! Signer and verifier never need to agree on field insertion order: maps are
//! sorted lexicographically before encoding, arrays keep their order. The
//! binary form is definite-length CBOR; the text form is compact JSON over
//! the same sorted structure.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

const MIN_NONCE_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("invalid statement: {0}")]
    Schema(String),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("cbor encode: {0}")]
    Encode(String),
    #[error("cbor decode: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("unsupported cbor item: {0}")]
    Unsupported(String),
}

/// The statement a custodian signs: the reserve figures plus a nonce.
/// Field names here are the wire names; the canonical encodings sort them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReserveStatement {
    pub week: u32,
    #[serde(rename = "reserveAmount")]
    pub reserve_amount: f64,
    pub timestamp: String,
    pub nonce: String,
}

impl ReserveStatement {
    /// Reject statements that do not conform before any encoding happens.
    pub fn validate(&self) -> Result<(), CanonicalError> {
        if !self.reserve_amount.is_finite() || self.reserve_amount < 0.0 {
            return Err(CanonicalError::Schema(
                "reserveAmount must be a non-negative number".to_string(),
            ));
        }
        if self.timestamp.trim().is_empty() {
            return Err(CanonicalError::Schema("timestamp is required".to_string()));
        }
        if self.nonce.len() < MIN_NONCE_LEN {
            return Err(CanonicalError::Schema(format!(
                "nonce must be at least {} characters",
                MIN_NONCE_LEN
            )));
        }
        Ok(())
    }
}

/// All encodings of one statement that a detached signature may cover.
#[derive(Clone, Debug)]
pub struct SerializedMessage {
    /// Definite-length CBOR over the sorted structure.
    pub canonical_bytes: Vec<u8>,
    /// Compact JSON over the sorted structure.
    pub text: String,
    /// Base64 of `canonical_bytes`, the form embedded in metadata documents.
    pub base64: String,
}

/// Validate and serialize a statement into every canonical form.
pub fn serialize_statement(stmt: &ReserveStatement) -> Result<SerializedMessage, CanonicalError> {
    stmt.validate()?;
    let value = serde_json::to_value(stmt)?;
    let canonical_bytes = canonical_cbor(&value)?;
    let text = canonical_json(&value);
    let base64 = BASE64.encode(&canonical_bytes);
    Ok(SerializedMessage {
        canonical_bytes,
        text,
        base64,
    })
}

/// Compact JSON with all object keys sorted, recursively.
pub fn canonical_json(value: &Value) -> String {
    sort_json_keys(value).to_string()
}

fn sort_json_keys(v: &Value) -> Value {
    match v {
        Value::Object(m) => {
            let mut keys: Vec<_> = m.keys().collect();
            keys.sort();
            let out: BTreeMap<String, Value> = keys
                .into_iter()
                .filter_map(|k| m.get(k).map(|val| (k.clone(), sort_json_keys(val))))
                .collect();
            Value::Object(serde_json::Map::from_iter(out))
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_json_keys).collect()),
        other => other.clone(),
    }
}

/// Definite-length CBOR with all map keys sorted, recursively.
pub fn canonical_cbor(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    minicbor::to_vec(CanonicalValue(value)).map_err(|e| CanonicalError::Encode(e.to_string()))
}

/// Decode definite-length CBOR into a generic JSON value. Byte strings come
/// back base64 encoded, tags are unwrapped, indefinite lengths are rejected.
pub fn decode_cbor_value(bytes: &[u8]) -> Result<Value, CanonicalError> {
    let mut decoder = minicbor::Decoder::new(bytes);
    let value = decode_value(&mut decoder)?;
    if decoder.position() != bytes.len() {
        return Err(CanonicalError::Unsupported(
            "trailing bytes after cbor item".to_string(),
        ));
    }
    Ok(value)
}

fn decode_value(d: &mut minicbor::Decoder<'_>) -> Result<Value, CanonicalError> {
    use minicbor::data::Type;
    match d.datatype()? {
        Type::Null | Type::Undefined => {
            d.skip()?;
            Ok(Value::Null)
        }
        Type::Bool => Ok(Value::Bool(d.bool()?)),
        Type::U8 | Type::U16 | Type::U32 | Type::U64 => Ok(Value::from(d.u64()?)),
        Type::I8 | Type::I16 | Type::I32 | Type::I64 => Ok(Value::from(d.i64()?)),
        Type::F32 => number_from_f64(f64::from(d.f32()?)),
        Type::F64 => number_from_f64(d.f64()?),
        Type::String => Ok(Value::String(d.str()?.to_string())),
        Type::Bytes => Ok(Value::String(BASE64.encode(d.bytes()?))),
        Type::Array => {
            let len = d
                .array()?
                .ok_or_else(|| CanonicalError::Unsupported("indefinite array".to_string()))?;
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(decode_value(d)?);
            }
            Ok(Value::Array(items))
        }
        Type::Map => {
            let len = d
                .map()?
                .ok_or_else(|| CanonicalError::Unsupported("indefinite map".to_string()))?;
            let mut map = serde_json::Map::with_capacity(len as usize);
            for _ in 0..len {
                let key = d.str()?.to_string();
                map.insert(key, decode_value(d)?);
            }
            Ok(Value::Object(map))
        }
        Type::Tag => {
            d.tag()?;
            decode_value(d)
        }
        other => Err(CanonicalError::Unsupported(format!("{other}"))),
    }
}

fn number_from_f64(f: f64) -> Result<Value, CanonicalError> {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| CanonicalError::Unsupported("non-finite float".to_string()))
}

struct CanonicalValue<'a>(&'a Value);

impl<C> minicbor::Encode<C> for CanonicalValue<'_> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self.0 {
            Value::Null => {
                e.null()?;
            }
            Value::Bool(b) => {
                e.bool(*b)?;
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    e.i64(i)?;
                } else if let Some(u) = n.as_u64() {
                    e.u64(u)?;
                } else if let Some(f) = n.as_f64() {
                    e.f64(f)?;
                } else {
                    e.null()?;
                }
            }
            Value::String(s) => {
                e.str(s)?;
            }
            Value::Array(items) => {
                e.array(items.len() as u64)?;
                for item in items {
                    CanonicalValue(item).encode(e, ctx)?;
                }
            }
            Value::Object(m) => {
                let sorted: BTreeMap<&String, &Value> = m.iter().collect();
                e.map(sorted.len() as u64)?;
                for (k, v) in sorted {
                    e.str(k)?;
                    CanonicalValue(v).encode(e, ctx)?;
                }
            }
        }
        Ok(())
    }
}
