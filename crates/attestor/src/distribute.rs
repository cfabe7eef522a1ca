//! Pro-rata income distribution across SPV holders, rounded to stroops.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Smallest ledger unit: one stroop is 1e-7 of the asset.
pub const STROOPS_PER_UNIT: f64 = 10_000_000.0;

/// Settlement asset for payouts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Xlm,
    Usdc,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Asset::Xlm => "XLM",
            Asset::Usdc => "USDC",
        })
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("unknown asset code {0:?}, expected XLM or USDC")]
pub struct AssetParseError(String);

impl FromStr for Asset {
    type Err = AssetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "XLM" => Ok(Asset::Xlm),
            "USDC" => Ok(Asset::Usdc),
            _ => Err(AssetParseError(s.to_string())),
        }
    }
}

/// One SPV token holder. Ledger exports serve balances as strings, so both
/// forms deserialize.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpvHolder {
    pub account: String,
    #[serde(deserialize_with = "number_or_string")]
    pub balance: f64,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("balance is not a number: {s:?}"))),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payout {
    pub account: String,
    pub asset: Asset,
    /// Rounded to a whole number of stroops.
    pub amount: f64,
    /// Fraction of the positive balance total, before rounding.
    pub share: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Distribution {
    pub payouts: Vec<Payout>,
    pub total_paid: f64,
    /// Holders whose rounded payout came to less than one stroop.
    pub under_stroop_dropped: u32,
}

#[derive(Error, Debug, PartialEq)]
pub enum DistributeError {
    #[error("no positive holder balances to distribute against")]
    NoHolderBalance,
    #[error("income must be positive, got {0}")]
    NoIncome(f64),
    #[error("every payout fell below one stroop")]
    AllBelowMinimum,
}

/// Split `income` across holders in proportion to their positive balances.
///
/// Negative balances count as zero. Each payout rounds half-up to a whole
/// stroop; payouts below one stroop are dropped and counted rather than
/// paid. Pure: callers re-invoke with a smaller income figure when the
/// funding account cannot cover the full amount.
pub fn calculate_distribution(
    holders: &[SpvHolder],
    income: f64,
    asset: Asset,
) -> Result<Distribution, DistributeError> {
    if !(income > 0.0) {
        return Err(DistributeError::NoIncome(income));
    }
    let total: f64 = holders.iter().map(|h| h.balance.max(0.0)).sum();
    if !(total > 0.0) {
        return Err(DistributeError::NoHolderBalance);
    }

    let mut payouts = Vec::with_capacity(holders.len());
    let mut under_stroop_dropped = 0u32;
    for holder in holders {
        let share = holder.balance.max(0.0) / total;
        let stroops = (income * share * STROOPS_PER_UNIT).round();
        if stroops < 1.0 {
            under_stroop_dropped += 1;
            debug!(account = %holder.account, share, "payout under one stroop, dropped");
            continue;
        }
        payouts.push(Payout {
            account: holder.account.clone(),
            asset,
            amount: stroops / STROOPS_PER_UNIT,
            share,
        });
    }

    if payouts.is_empty() {
        return Err(DistributeError::AllBelowMinimum);
    }
    let total_paid = payouts.iter().map(|p| p.amount).sum();
    Ok(Distribution {
        payouts,
        total_paid,
        under_stroop_dropped,
    })
}

/// Ledger-style fixed seven decimal places.
pub fn format_amount(amount: f64) -> String {
    format!("{amount:.7}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder(account: &str, balance: f64) -> SpvHolder {
        SpvHolder {
            account: account.to_string(),
            balance,
        }
    }

    #[test]
    fn proportional_split_conserves_income() {
        let holders = vec![holder("GA", 60.0), holder("GB", 40.0)];
        let dist = calculate_distribution(&holders, 100.0, Asset::Usdc).unwrap();
        assert_eq!(dist.payouts.len(), 2);
        assert_eq!(dist.payouts[0].amount, 60.0);
        assert_eq!(dist.payouts[0].share, 0.6);
        assert_eq!(dist.payouts[1].amount, 40.0);
        assert_eq!(dist.total_paid, 100.0);
        assert_eq!(dist.under_stroop_dropped, 0);
    }

    #[test]
    fn rounding_is_half_up_at_the_stroop() {
        // Each share is 1.5 stroops; half-up makes it 2.
        let holders = vec![holder("GA", 1.0), holder("GB", 1.0)];
        let dist = calculate_distribution(&holders, 0.0000003, Asset::Xlm).unwrap();
        for payout in &dist.payouts {
            assert_eq!(payout.amount, 0.0000002);
        }
    }

    #[test]
    fn negative_balance_counts_as_zero() {
        let holders = vec![holder("GA", -50.0), holder("GB", 100.0)];
        let dist = calculate_distribution(&holders, 10.0, Asset::Usdc).unwrap();
        assert_eq!(dist.payouts.len(), 1);
        assert_eq!(dist.payouts[0].account, "GB");
        assert_eq!(dist.payouts[0].amount, 10.0);
        assert_eq!(dist.under_stroop_dropped, 1);
    }

    #[test]
    fn dust_holder_dropped_but_counted() {
        let holders = vec![holder("GA", 1_000_000.0), holder("GB", 0.000001)];
        let dist = calculate_distribution(&holders, 100.0, Asset::Usdc).unwrap();
        assert_eq!(dist.payouts.len(), 1);
        assert_eq!(dist.payouts[0].account, "GA");
        assert_eq!(dist.under_stroop_dropped, 1);
    }

    #[test]
    fn zero_or_negative_income_rejected() {
        let holders = vec![holder("GA", 1.0)];
        assert_eq!(
            calculate_distribution(&holders, 0.0, Asset::Xlm).unwrap_err(),
            DistributeError::NoIncome(0.0)
        );
        assert_eq!(
            calculate_distribution(&holders, -5.0, Asset::Xlm).unwrap_err(),
            DistributeError::NoIncome(-5.0)
        );
    }

    #[test]
    fn no_positive_balances_rejected() {
        let holders = vec![holder("GA", 0.0), holder("GB", -2.0)];
        assert_eq!(
            calculate_distribution(&holders, 10.0, Asset::Usdc).unwrap_err(),
            DistributeError::NoHolderBalance
        );
    }

    #[test]
    fn everything_below_one_stroop_is_an_error() {
        let holders = vec![holder("GA", 1.0), holder("GB", 1.0)];
        assert_eq!(
            calculate_distribution(&holders, 0.00000001, Asset::Xlm).unwrap_err(),
            DistributeError::AllBelowMinimum
        );
    }

    #[test]
    fn asset_parses_case_insensitively() {
        assert_eq!("XLM".parse::<Asset>().unwrap(), Asset::Xlm);
        assert_eq!("usdc".parse::<Asset>().unwrap(), Asset::Usdc);
        assert!("DOGE".parse::<Asset>().is_err());
        assert_eq!(Asset::Usdc.to_string(), "USDC");
    }

    #[test]
    fn holder_balance_accepts_ledger_strings() {
        let parsed: SpvHolder =
            serde_json::from_str(r#"{"account":"GA","balance":"123.4567890"}"#).unwrap();
        assert_eq!(parsed.balance, 123.456789);
        let parsed: SpvHolder = serde_json::from_str(r#"{"account":"GA","balance":7.5}"#).unwrap();
        assert_eq!(parsed.balance, 7.5);
    }

    #[test]
    fn amounts_format_to_seven_places() {
        assert_eq!(format_amount(60.0), "60.0000000");
        assert_eq!(format_amount(0.0000002), "0.0000002");
    }
}
