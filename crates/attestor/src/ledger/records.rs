//! Ledger record shapes as supplied by the host's ledger client.
//!
//! Operations arrive joined with their transaction envelope attributes
//! (older exports nest them under `transaction` instead of
//! `transaction_attr`; both spellings are accepted).

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const OP_PAYMENT: &str = "payment";
pub const OP_MANAGE_DATA: &str = "manage_data";

const STROOPS_PER_XLM: f64 = 10_000_000.0;

/// Transaction envelope attributes joined onto an operation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TxAttributes {
    #[serde(default)]
    pub memo_type: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub memo_hash: Option<String>,
    /// Served as a string by current ledger APIs, as a number by older ones.
    #[serde(default)]
    pub fee_charged: Option<serde_json::Value>,
    #[serde(default)]
    pub signatures: Option<Vec<String>>,
    #[serde(default)]
    pub source_account: Option<String>,
}

impl TxAttributes {
    /// Network fee in whole asset units, if parseable.
    pub fn fee_xlm(&self) -> Option<f64> {
        let raw = match self.fee_charged.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64()?,
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        raw.is_finite().then_some(raw / STROOPS_PER_XLM)
    }

    pub fn signature_count(&self) -> Option<u32> {
        self.signatures.as_ref().map(|s| s.len() as u32)
    }
}

/// A raw ledger operation: payments and manage-data entries share one shape,
/// unknown operation types are carried through and ignored downstream.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OperationRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub source_account: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub asset_code: Option<String>,
    #[serde(default)]
    pub asset_issuer: Option<String>,
    /// manage_data entry name.
    #[serde(default)]
    pub name: Option<String>,
    /// manage_data entry value, base64.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, alias = "transaction")]
    pub transaction_attr: Option<TxAttributes>,
}

/// A payment operation normalized with its merged memo attributes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PaymentRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub created_at: String,
    pub transaction_hash: String,
    #[serde(default)]
    pub source_account: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub asset_code: Option<String>,
    #[serde(default)]
    pub asset_issuer: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub transaction_attr: Option<TxAttributes>,
}

/// An account data entry ("effect"): `data_created` / `data_updated`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DataEntryRecord {
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// RFC3339 creation timestamp to Unix seconds; None when unparseable.
pub fn parse_created_at(s: &str) -> Option<i64> {
    OffsetDateTime::parse(s.trim(), &Rfc3339)
        .ok()
        .map(|dt| dt.unix_timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_accepts_transaction_alias() {
        let json = r#"{
            "id": "op1",
            "type": "payment",
            "created_at": "2026-01-05T10:00:00Z",
            "transaction_hash": "deadbeef",
            "amount": "1.0000000",
            "transaction": {"memo_type": "text", "memo": "hello"}
        }"#;
        let op: OperationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(op.op_type, "payment");
        let attr = op.transaction_attr.unwrap();
        assert_eq!(attr.memo.as_deref(), Some("hello"));
    }

    #[test]
    fn fee_parses_string_and_number() {
        let s: TxAttributes =
            serde_json::from_str(r#"{"fee_charged": "100"}"#).unwrap();
        assert_eq!(s.fee_xlm(), Some(0.00001));
        let n: TxAttributes = serde_json::from_str(r#"{"fee_charged": 100}"#).unwrap();
        assert_eq!(n.fee_xlm(), Some(0.00001));
        let bad: TxAttributes = serde_json::from_str(r#"{"fee_charged": "x"}"#).unwrap();
        assert_eq!(bad.fee_xlm(), None);
    }

    #[test]
    fn created_at_parse() {
        assert_eq!(parse_created_at("1970-01-01T00:00:10Z"), Some(10));
        assert_eq!(parse_created_at("yesterday"), None);
    }
}
