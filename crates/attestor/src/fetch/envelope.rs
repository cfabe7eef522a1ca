//! Evidence document schemas, validated field by field after the body has
//! been decoded into a generic value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Schema tag expected on reserve proof documents.
pub const RESERVE_SCHEMA: &str = "custody.reserve@1";

const MIN_NONCE_LEN: usize = 8;

#[derive(Error, Clone, Debug, PartialEq)]
pub enum SchemaError {
    #[error("metadata is not an object")]
    NotObject,
    #[error("{field}: {reason}")]
    Field { field: &'static str, reason: String },
}

fn field_err(field: &'static str, reason: impl Into<String>) -> SchemaError {
    SchemaError::Field {
        field,
        reason: reason.into(),
    }
}

/// Signature block nested inside an attestation envelope.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AttestationFields {
    pub nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "signedBy", skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(rename = "publicKey", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(rename = "requestCid", skip_serializing_if = "Option::is_none")]
    pub request_cid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnvelopeRequest {
    pub cid: String,
}

/// The parsed off-chain attestation document. Unrecognized top-level keys
/// are retained in `extras`; older documents placed signature fields there.
#[derive(Clone, Debug, Serialize)]
pub struct MetadataEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub week: u32,
    #[serde(rename = "reserveAmount")]
    pub reserve_amount: f64,
    #[serde(rename = "fileCid")]
    pub file_cid: String,
    #[serde(rename = "proofCid", skip_serializing_if = "Option::is_none")]
    pub proof_cid: Option<String>,
    pub issuer: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation: Option<AttestationFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<EnvelopeRequest>,
    #[serde(skip)]
    pub extras: serde_json::Map<String, Value>,
}

impl MetadataEnvelope {
    /// Non-empty string out of the unrecognized top-level keys.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extras
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// The parsed reserve proof document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReserveMetadata {
    pub schema: String,
    pub week: u32,
    #[serde(rename = "reserveUSD")]
    pub reserve_usd: f64,
    #[serde(rename = "spvBalanceXLM")]
    pub spv_balance_xlm: String,
    #[serde(rename = "spvBalanceUSDC")]
    pub spv_balance_usdc: String,
    #[serde(rename = "asOf")]
    pub as_of: String,
    #[serde(rename = "lastTx", skip_serializing_if = "Option::is_none")]
    pub last_tx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

const ENVELOPE_KEYS: &[&str] = &[
    "schema",
    "week",
    "reserveAmount",
    "fileCid",
    "proofCid",
    "issuer",
    "timestamp",
    "mime",
    "size",
    "attestation",
    "request",
];

pub fn parse_envelope(value: &Value) -> Result<MetadataEnvelope, SchemaError> {
    let obj = value.as_object().ok_or(SchemaError::NotObject)?;

    let week = coerce_week(required(obj, "week")?, "week")?;
    let reserve_amount = coerce_nonneg(required(obj, "reserveAmount")?, "reserveAmount")?;
    let file_cid = required_str(obj, "fileCid")?;
    let issuer = required_str(obj, "issuer")?;
    let timestamp = required_str(obj, "timestamp")?;

    let size = match obj.get("size") {
        None | Some(Value::Null) => None,
        Some(v) => Some(coerce_nonneg(v, "size")?),
    };
    let attestation = match obj.get("attestation") {
        None | Some(Value::Null) => None,
        Some(v) => Some(parse_attestation(v)?),
    };
    let request = match obj.get("request") {
        None | Some(Value::Null) => None,
        Some(v) => Some(parse_request(v)?),
    };

    let extras = obj
        .iter()
        .filter(|(k, _)| !ENVELOPE_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(MetadataEnvelope {
        schema: optional_str(obj, "schema")?,
        week,
        reserve_amount,
        file_cid,
        proof_cid: optional_nonempty(obj, "proofCid")?,
        issuer,
        timestamp,
        mime: optional_str(obj, "mime")?,
        size,
        attestation,
        request,
        extras,
    })
}

fn parse_attestation(value: &Value) -> Result<AttestationFields, SchemaError> {
    let obj = value
        .as_object()
        .ok_or_else(|| field_err("attestation", "expected object"))?;
    let nonce = required_str(obj, "nonce").map_err(|_| field_err("attestation.nonce", "required"))?;
    if nonce.len() < MIN_NONCE_LEN {
        return Err(field_err(
            "attestation.nonce",
            format!("must be at least {} characters", MIN_NONCE_LEN),
        ));
    }
    Ok(AttestationFields {
        nonce,
        message: optional_str(obj, "message")?,
        signed_by: optional_str(obj, "signedBy")?,
        signature: optional_str(obj, "signature")?,
        public_key: optional_str(obj, "publicKey")?,
        request_cid: optional_str(obj, "requestCid")?,
    })
}

fn parse_request(value: &Value) -> Result<EnvelopeRequest, SchemaError> {
    let obj = value
        .as_object()
        .ok_or_else(|| field_err("request", "expected object"))?;
    let cid = required_str(obj, "cid").map_err(|_| field_err("request.cid", "required"))?;
    Ok(EnvelopeRequest { cid })
}

pub fn parse_reserve_metadata(value: &Value) -> Result<ReserveMetadata, SchemaError> {
    let obj = value.as_object().ok_or(SchemaError::NotObject)?;

    let schema = required_str(obj, "schema")?;
    if schema != RESERVE_SCHEMA {
        return Err(field_err("schema", format!("expected {}", RESERVE_SCHEMA)));
    }
    Ok(ReserveMetadata {
        schema,
        week: coerce_week(required(obj, "week")?, "week")?,
        reserve_usd: coerce_number(required(obj, "reserveUSD")?, "reserveUSD")?,
        spv_balance_xlm: required_str(obj, "spvBalanceXLM")?,
        spv_balance_usdc: required_str(obj, "spvBalanceUSDC")?,
        as_of: required_str(obj, "asOf")?,
        last_tx: optional_str(obj, "lastTx")?,
        notes: optional_str(obj, "notes")?,
    })
}

fn required<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, SchemaError> {
    obj.get(field).ok_or_else(|| field_err(field, "required"))
}

fn required_str(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<String, SchemaError> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(field_err(field, "must not be empty")),
        Some(_) => Err(field_err(field, "expected string")),
        None => Err(field_err(field, "required")),
    }
}

fn optional_str(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(field_err(field, "expected string")),
    }
}

fn optional_nonempty(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, SchemaError> {
    match optional_str(obj, field)? {
        Some(s) if s.is_empty() => Err(field_err(field, "must not be empty")),
        other => Ok(other),
    }
}

/// Accept a JSON number or a numeric string. Strings are stripped of
/// grouping characters ("$1,250,000.50" parses) before conversion.
fn coerce_number(value: &Value, field: &'static str) -> Result<f64, SchemaError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .ok_or_else(|| field_err(field, "invalid number")),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(field_err(field, "invalid number"));
            }
            let cleaned: String = trimmed
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .ok_or_else(|| field_err(field, "invalid number"))
        }
        _ => Err(field_err(field, "expected number")),
    }
}

fn coerce_nonneg(value: &Value, field: &'static str) -> Result<f64, SchemaError> {
    let parsed = coerce_number(value, field)?;
    if parsed < 0.0 {
        return Err(field_err(field, "must be non-negative"));
    }
    Ok(parsed)
}

fn coerce_week(value: &Value, field: &'static str) -> Result<u32, SchemaError> {
    let parsed = coerce_nonneg(value, field)?;
    if parsed.fract() != 0.0 || parsed > f64::from(u32::MAX) {
        return Err(field_err(field, "expected non-negative integer"));
    }
    Ok(parsed as u32)
}
