//! Seniority waterfall.
//!
//! Reallocates the total portfolio value across tranches in two steps:
//! - Seniority cascade: from the most senior tranche down, each claims up to
//!   its prior nominal value; equity (index 0) takes whatever is left, which
//!   absorbs both losses and surplus
//! - Fee application: every allocation passes independently through
//!   [`crate::fees::accrue`] with the same elapsed time
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::WaterfallError;
use crate::fees::{self, FeeAccrual};
use crate::tranche::Tranche;
use crate::types::*;
use crate::WaterfallResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// One tranche as seen by the stand-alone waterfall calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallTrancheInput {
    pub name: String,
    /// Nominal value at the previous checkpoint
    pub nominal_value: Money,
    /// Beneficiary fee (bps per annum)
    #[serde(default)]
    pub fee_rate: BasisPoints,
}

/// Input for the stand-alone waterfall calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallInput {
    /// Current total portfolio value
    pub total_value: Money,
    /// Seconds since the previous checkpoint
    pub elapsed_seconds: u64,
    /// Protocol fee (bps per annum)
    #[serde(default)]
    pub protocol_fee_rate: BasisPoints,
    /// Ordered from equity (first) to most senior (last)
    pub tranches: Vec<WaterfallTrancheInput>,
}

/// Waterfall result for one tranche.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheWaterfall {
    pub name: String,
    pub prior_nominal_value: Money,
    /// Step-1 cascade allocation
    pub pre_fee_value: Money,
    /// New nominal value
    pub post_fee_value: Money,
    pub protocol_fee: Money,
    pub tranche_fee: Money,
    pub uncollectible_fee: Money,
}

/// Full waterfall result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waterfall {
    pub total_value: Money,
    pub elapsed_seconds: u64,
    /// Ordered from equity (first) to most senior (last)
    pub tranches: Vec<TrancheWaterfall>,
}

impl Waterfall {
    /// Post-fee values, the next nominal baseline.
    pub fn values(&self) -> Vec<Money> {
        self.tranches.iter().map(|t| t.post_fee_value).collect()
    }

    pub fn pre_fee_values(&self) -> Vec<Money> {
        self.tranches.iter().map(|t| t.pre_fee_value).collect()
    }

    pub fn protocol_fees(&self) -> WaterfallResult<Money> {
        checked_sum(self.tranches.iter().map(|t| t.protocol_fee), "protocol fees")
    }

    pub fn tranche_fees(&self) -> Vec<Money> {
        self.tranches.iter().map(|t| t.tranche_fee).collect()
    }

    pub fn total_fees(&self) -> WaterfallResult<Money> {
        self.tranches.iter().try_fold(Decimal::ZERO, |acc, t| {
            checked_add(acc, t.protocol_fee, "total fees")
                .and_then(|acc| checked_add(acc, t.tranche_fee, "total fees"))
        })
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Split `amount` across tranches by seniority.
///
/// `claims` is ordered from equity (index 0) to most senior. Every tranche
/// above equity receives `min(remaining, claim)` starting from the top;
/// equity receives the residual, uncapped. The result always sums to
/// `amount`.
pub fn cascade(amount: Money, claims: &[Money]) -> WaterfallResult<Vec<Money>> {
    if claims.is_empty() {
        return Err(WaterfallError::InsufficientData(
            "At least one tranche is required.".into(),
        ));
    }
    ensure_non_negative(amount, "amount")?;

    let mut allocations = vec![Decimal::ZERO; claims.len()];
    let mut remaining = amount;

    for i in (1..claims.len()).rev() {
        let allocated = remaining.min(claims[i].max(Decimal::ZERO));
        remaining = checked_sub(remaining, allocated, "seniority cascade")?;
        allocations[i] = allocated;
    }
    allocations[0] = remaining;

    Ok(allocations)
}

/// Run both waterfall steps over the tranches' current nominal values.
pub fn compute(
    total_value: Money,
    elapsed_seconds: u64,
    tranches: &[Tranche],
    protocol_fee_rate: BasisPoints,
) -> WaterfallResult<Waterfall> {
    let claims: Vec<Money> = tranches.iter().map(|t| t.nominal_value).collect();
    let allocations = cascade(total_value, &claims)?;

    let results = tranches
        .iter()
        .zip(allocations)
        .map(|(tranche, allocated)| {
            let accrual = fees::accrue(
                allocated,
                elapsed_seconds,
                tranche.fee_rate,
                protocol_fee_rate,
            )?;
            Ok(tranche_result(tranche, &accrual))
        })
        .collect::<WaterfallResult<Vec<_>>>()?;

    Ok(Waterfall {
        total_value,
        elapsed_seconds,
        tranches: results,
    })
}

/// Nominal values passed through untouched (no elapsed time or not yet live).
pub fn unchanged(total_value: Money, tranches: &[Tranche]) -> Waterfall {
    Waterfall {
        total_value,
        elapsed_seconds: 0,
        tranches: tranches
            .iter()
            .map(|t| tranche_result(t, &FeeAccrual::unchanged(t.nominal_value)))
            .collect(),
    }
}

fn tranche_result(tranche: &Tranche, accrual: &FeeAccrual) -> TrancheWaterfall {
    TrancheWaterfall {
        name: tranche.name.clone(),
        prior_nominal_value: tranche.nominal_value,
        pre_fee_value: accrual.value_before,
        post_fee_value: accrual.value_after,
        protocol_fee: accrual.protocol_fee,
        tranche_fee: accrual.tranche_fee,
        uncollectible_fee: accrual.uncollectible,
    }
}

/// Stand-alone waterfall calculator.
pub fn calculate_waterfall(input: &WaterfallInput) -> WaterfallResult<ComputationOutput<Waterfall>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_waterfall_input(input)?;

    let tranches: Vec<Tranche> = input
        .tranches
        .iter()
        .map(|t| Tranche {
            name: t.name.clone(),
            fee_rate: t.fee_rate,
            nominal_value: t.nominal_value,
            distributed_assets: Decimal::ZERO,
        })
        .collect();

    let result = compute(
        input.total_value,
        input.elapsed_seconds,
        &tranches,
        input.protocol_fee_rate,
    )?;

    let senior_claims = checked_sum(
        tranches.iter().skip(1).map(|t| t.nominal_value),
        "senior claims",
    )?;
    if input.total_value < senior_claims {
        warnings.push(format!(
            "Total value {} does not cover senior claims of {}; equity is wiped out",
            input.total_value, senior_claims
        ));
    }
    for t in result.tranches.iter().filter(|t| t.uncollectible_fee > Decimal::ZERO) {
        warnings.push(format!(
            "Tranche {}: fee of {} exceeds its value and is uncollectible",
            t.name, t.uncollectible_fee
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Senior-first cascade of total value capped at prior nominal values, equity residual, then per-tranche fee accrual",
        input,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_waterfall_input(input: &WaterfallInput) -> WaterfallResult<()> {
    if input.tranches.is_empty() {
        return Err(WaterfallError::InsufficientData(
            "At least one tranche is required.".into(),
        ));
    }
    if input.total_value < Decimal::ZERO {
        return Err(WaterfallError::InvalidInput {
            field: "total_value".into(),
            reason: "Total value cannot be negative.".into(),
        });
    }
    for t in &input.tranches {
        if t.nominal_value < Decimal::ZERO {
            return Err(WaterfallError::InvalidInput {
                field: format!("tranche.{}.nominal_value", t.name),
                reason: "Tranche nominal value cannot be negative.".into(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
