//! Time-proportional fee accrual for a single tranche.
//!
//! `fee = trunc(V * (r_tranche + r_protocol) * dt / (SECONDS_PER_YEAR * 10_000))`
//!
//! The product is formed before the single division so the result is the
//! exact truncation of the rational fee. A fee larger than the tranche value
//! is clamped: the tranche drops to zero and the excess is reported as
//! uncollectible. It is never carried forward or charged to another tranche.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::WaterfallError;
use crate::types::*;
use crate::WaterfallResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// Input for a stand-alone fee accrual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeAccrualInput {
    /// Pre-fee tranche value
    pub value: Money,
    /// Seconds elapsed since the last checkpoint
    pub elapsed_seconds: u64,
    /// Tranche beneficiary fee (bps per annum)
    pub tranche_fee_rate: BasisPoints,
    /// Protocol fee (bps per annum)
    pub protocol_fee_rate: BasisPoints,
}

/// Result of charging one interval of fees against one tranche.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAccrual {
    pub value_before: Money,
    pub value_after: Money,
    /// Fee owed before clamping to the tranche value
    pub total_fee: Money,
    /// Collected for the protocol
    pub protocol_fee: Money,
    /// Collected for the tranche's fee beneficiary
    pub tranche_fee: Money,
    /// Part of `total_fee` that exceeded the tranche value
    pub uncollectible: Money,
}

impl FeeAccrual {
    /// Pass-through accrual used when no time has elapsed.
    pub fn unchanged(value: Money) -> Self {
        FeeAccrual {
            value_before: value,
            value_after: value,
            ..FeeAccrual::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Fee owed on `value` at `rate` for `elapsed_seconds`, truncated toward zero.
pub fn annual_fee(value: Money, rate: BasisPoints, elapsed_seconds: u64) -> WaterfallResult<Money> {
    if value.is_zero() || rate == 0 || elapsed_seconds == 0 {
        return Ok(Decimal::ZERO);
    }
    let denominator = Decimal::from(SECONDS_PER_YEAR) * Decimal::from(BASIS_PRECISION);
    let numerator = value
        .checked_mul(Decimal::from(rate))
        .and_then(|v| v.checked_mul(Decimal::from(elapsed_seconds)))
        .ok_or_else(|| WaterfallError::overflow("fee accrual"))?;
    // Divide an exact multiple so the quotient is never rounded up
    let remainder = numerator
        .checked_rem(denominator)
        .ok_or_else(|| WaterfallError::overflow("fee accrual"))?;
    let fee = checked_sub(numerator, remainder, "fee accrual")?
        .checked_div(denominator)
        .ok_or_else(|| WaterfallError::overflow("fee accrual"))?;
    Ok(fee.trunc())
}

/// Charge one interval of tranche and protocol fees against `value`.
///
/// The protocol share is collected first when the tranche cannot cover the
/// whole fee.
pub fn accrue(
    value: Money,
    elapsed_seconds: u64,
    tranche_fee_rate: BasisPoints,
    protocol_fee_rate: BasisPoints,
) -> WaterfallResult<FeeAccrual> {
    ensure_non_negative(value, "value")?;
    if elapsed_seconds == 0 {
        return Ok(FeeAccrual::unchanged(value));
    }

    let combined_rate = tranche_fee_rate
        .checked_add(protocol_fee_rate)
        .ok_or_else(|| WaterfallError::overflow("combined fee rate"))?;
    let total_fee = annual_fee(value, combined_rate, elapsed_seconds)?;
    let protocol_owed = annual_fee(value, protocol_fee_rate, elapsed_seconds)?.min(total_fee);

    let collectible = total_fee.min(value);
    let protocol_fee = protocol_owed.min(collectible);
    let tranche_fee = collectible - protocol_fee;

    Ok(FeeAccrual {
        value_before: value,
        value_after: value - collectible,
        total_fee,
        protocol_fee,
        tranche_fee,
        uncollectible: total_fee - collectible,
    })
}

/// Stand-alone fee calculator with the usual output envelope.
pub fn accrue_fee(input: &FeeAccrualInput) -> WaterfallResult<ComputationOutput<FeeAccrual>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.tranche_fee_rate > BASIS_PRECISION || input.protocol_fee_rate > BASIS_PRECISION {
        warnings.push("Fee rate above 100% per annum".into());
    }

    let result = accrue(
        input.value,
        input.elapsed_seconds,
        input.tranche_fee_rate,
        input.protocol_fee_rate,
    )?;

    if result.uncollectible > Decimal::ZERO {
        warnings.push(format!(
            "Fee exceeds tranche value; {} is uncollectible",
            result.uncollectible
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Linear per-second accrual on an actual/365 year, truncated toward zero",
        input,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
