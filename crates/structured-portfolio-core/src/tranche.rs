use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::WaterfallError;
use crate::types::*;
use crate::WaterfallResult;

/// Static description of a tranche, supplied at portfolio creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheSpec {
    /// Tranche name (e.g. "Equity", "Junior", "Senior")
    pub name: String,
    /// Beneficiary fee (bps per annum)
    #[serde(default)]
    pub fee_rate: BasisPoints,
}

/// A seniority class and its running accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tranche {
    pub name: String,
    pub fee_rate: BasisPoints,
    /// Allocated value as of the last checkpoint
    pub nominal_value: Money,
    /// Cumulative assets paid out of this tranche by redemptions
    pub distributed_assets: Money,
}

impl Tranche {
    fn from_spec(spec: &TrancheSpec) -> Self {
        Tranche {
            name: spec.name.clone(),
            fee_rate: spec.fee_rate,
            nominal_value: Decimal::ZERO,
            distributed_assets: Decimal::ZERO,
        }
    }

    /// Value still owed to the tranche after prior distributions.
    pub fn undistributed_value(&self) -> Money {
        (self.nominal_value - self.distributed_assets).max(Decimal::ZERO)
    }
}

/// Ordered tranches: index 0 is equity (most junior), the last index is the
/// most senior. The count and order are fixed for the ledger's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheLedger {
    tranches: Vec<Tranche>,
}

impl TrancheLedger {
    pub fn new(specs: &[TrancheSpec]) -> WaterfallResult<Self> {
        if specs.is_empty() {
            return Err(WaterfallError::InvalidInput {
                field: "tranches".into(),
                reason: "At least one tranche is required".into(),
            });
        }
        Ok(TrancheLedger {
            tranches: specs.iter().map(Tranche::from_spec).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.tranches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tranches.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tranche> {
        self.tranches.get(index)
    }

    pub fn as_slice(&self) -> &[Tranche] {
        &self.tranches
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tranche> {
        self.tranches.iter()
    }

    pub fn fee_rates(&self) -> Vec<BasisPoints> {
        self.tranches.iter().map(|t| t.fee_rate).collect()
    }

    pub fn nominal_values(&self) -> Vec<Money> {
        self.tranches.iter().map(|t| t.nominal_value).collect()
    }

    pub fn distributed_assets(&self) -> Vec<Money> {
        self.tranches.iter().map(|t| t.distributed_assets).collect()
    }

    pub fn total_nominal_value(&self) -> WaterfallResult<Money> {
        checked_sum(
            self.tranches.iter().map(|t| t.nominal_value),
            "total nominal value",
        )
    }

    /// Per-tranche capacity for redemption payouts.
    pub fn distribution_capacities(&self) -> Vec<Money> {
        self.tranches
            .iter()
            .map(Tranche::undistributed_value)
            .collect()
    }

    /// Replace every nominal value with a new checkpoint baseline.
    pub fn set_nominal_values(&mut self, values: &[Money]) -> WaterfallResult<()> {
        self.ensure_len(values.len(), "nominal_values")?;
        for (tranche, value) in self.tranches.iter_mut().zip(values) {
            tranche.nominal_value = *value;
        }
        Ok(())
    }

    /// Add newly arrived capital to one tranche's nominal value.
    pub fn record_deposit(&mut self, index: usize, amount: Money) -> WaterfallResult<()> {
        let tranche = self
            .tranches
            .get_mut(index)
            .ok_or_else(|| WaterfallError::InvalidInput {
                field: "tranche_index".into(),
                reason: format!("No tranche at index {}", index),
            })?;
        tranche.nominal_value = checked_add(tranche.nominal_value, amount, "tranche deposit")?;
        Ok(())
    }

    /// Add one redemption's cascade shares to the cumulative counters.
    pub fn record_distribution(&mut self, shares: &[Money]) -> WaterfallResult<()> {
        self.ensure_len(shares.len(), "distribution")?;
        let updated = self
            .tranches
            .iter()
            .zip(shares)
            .map(|(t, s)| checked_add(t.distributed_assets, *s, "distributed assets"))
            .collect::<WaterfallResult<Vec<_>>>()?;
        for (tranche, value) in self.tranches.iter_mut().zip(updated) {
            tranche.distributed_assets = value;
        }
        Ok(())
    }

    fn ensure_len(&self, len: usize, field: &str) -> WaterfallResult<()> {
        if len != self.tranches.len() {
            return Err(WaterfallError::InvalidInput {
                field: field.into(),
                reason: format!("Expected {} values, got {}", self.tranches.len(), len),
            });
        }
        Ok(())
    }
}
