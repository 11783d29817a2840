use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::WaterfallError;
use crate::WaterfallResult;

/// Amounts of the underlying asset, in whole base units. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Vault shares, in whole base units.
pub type Shares = Decimal;

/// Per-annum rates in basis points (10_000 = 100%).
pub type BasisPoints = u32;

/// Points in time. All engine clocks are UTC.
pub type Timestamp = DateTime<Utc>;

/// Denominator for basis-point rates.
pub const BASIS_PRECISION: u32 = 10_000;

/// Fee accrual year: 365 days of 86 400 seconds.
pub const SECONDS_PER_YEAR: u64 = 365 * 86_400;

/// Opaque identifier of an account, vault or asset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Address(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Address(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address(value.to_string())
    }
}

/// Lifecycle of a portfolio. Transitions only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortfolioStatus {
    #[default]
    CapitalFormation,
    Live,
    Closed,
}

impl fmt::Display for PortfolioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortfolioStatus::CapitalFormation => write!(f, "CapitalFormation"),
            PortfolioStatus::Live => write!(f, "Live"),
            PortfolioStatus::Closed => write!(f, "Closed"),
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

pub(crate) fn checked_add(a: Money, b: Money, context: &str) -> WaterfallResult<Money> {
    a.checked_add(b)
        .ok_or_else(|| WaterfallError::overflow(context))
}

pub(crate) fn checked_sub(a: Money, b: Money, context: &str) -> WaterfallResult<Money> {
    a.checked_sub(b)
        .ok_or_else(|| WaterfallError::overflow(context))
}

/// Sum a sequence of amounts, failing instead of wrapping.
pub(crate) fn checked_sum<I>(values: I, context: &str) -> WaterfallResult<Money>
where
    I: IntoIterator<Item = Money>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| checked_add(acc, v, context))
}

/// Whole-unit amounts must be non-negative.
pub(crate) fn ensure_non_negative(value: Money, field: &str) -> WaterfallResult<()> {
    if value < Decimal::ZERO {
        return Err(WaterfallError::InvalidInput {
            field: field.into(),
            reason: "Amount cannot be negative".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_checked_sum_adds_values() {
        let total = checked_sum(vec![dec!(1), dec!(2), dec!(3)], "test").unwrap();
        assert_eq!(total, dec!(6));
    }

    #[test]
    fn test_checked_sum_reports_overflow() {
        let err = checked_sum(vec![Decimal::MAX, dec!(1)], "sum").unwrap_err();
        assert_eq!(err, WaterfallError::ArithmeticOverflow("sum".into()));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(PortfolioStatus::CapitalFormation.to_string(), "CapitalFormation");
        assert_eq!(PortfolioStatus::Closed.to_string(), "Closed");
    }

    #[test]
    fn test_address_serializes_as_plain_string() {
        let json = serde_json::to_string(&Address::new("vault-1")).unwrap();
        assert_eq!(json, "\"vault-1\"");
    }
}
