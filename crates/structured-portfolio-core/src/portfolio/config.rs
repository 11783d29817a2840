use serde::{Deserialize, Serialize};

use crate::error::WaterfallError;
use crate::tranche::TrancheSpec;
use crate::types::*;
use crate::WaterfallResult;

/// Longest portfolio duration accepted (100 years).
pub const MAX_DURATION_SECONDS: u64 = 100 * SECONDS_PER_YEAR;

/// How fee time is measured around the portfolio's end date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccrualPolicy {
    /// Live checkpoints never charge past the end date, so neither does the
    /// closing checkpoint. After close, fees accrue from the last checkpoint.
    #[default]
    CapAtEndDate,
    /// As `CapAtEndDate` while live; no fees once closed.
    StopAtClose,
    /// Fee time is always the full interval since the last checkpoint.
    Uncapped,
}

/// Static configuration of a portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    pub name: String,
    /// The portfolio's own account, receiver and owner of vault shares
    #[serde(default = "default_portfolio_address")]
    pub address: Address,
    /// Underlying asset
    pub asset: Address,
    /// The only caller allowed to run privileged operations
    pub manager: Address,
    /// Fixed lifetime from `start()` to the end date
    pub duration_seconds: u64,
    /// Protocol fee (bps per annum)
    #[serde(default)]
    pub protocol_fee_rate: BasisPoints,
    /// Ordered from equity (first) to most senior (last)
    pub tranches: Vec<TrancheSpec>,
    #[serde(default)]
    pub accrual_policy: AccrualPolicy,
}

fn default_portfolio_address() -> Address {
    Address::new("portfolio")
}

impl PortfolioConfig {
    pub fn validate(&self) -> WaterfallResult<()> {
        if self.tranches.is_empty() {
            return Err(WaterfallError::InvalidInput {
                field: "tranches".into(),
                reason: "At least one tranche is required".into(),
            });
        }
        for (i, t) in self.tranches.iter().enumerate() {
            if t.name.trim().is_empty() {
                return Err(WaterfallError::InvalidInput {
                    field: format!("tranches[{}].name", i),
                    reason: "Tranche name cannot be empty".into(),
                });
            }
            if t.fee_rate > BASIS_PRECISION {
                return Err(WaterfallError::InvalidInput {
                    field: format!("tranches[{}].fee_rate", i),
                    reason: "Fee rate cannot exceed 10000 bps".into(),
                });
            }
        }
        if self.protocol_fee_rate > BASIS_PRECISION {
            return Err(WaterfallError::InvalidInput {
                field: "protocol_fee_rate".into(),
                reason: "Fee rate cannot exceed 10000 bps".into(),
            });
        }
        if self.duration_seconds == 0 || self.duration_seconds > MAX_DURATION_SECONDS {
            return Err(WaterfallError::InvalidInput {
                field: "duration_seconds".into(),
                reason: "Duration must be between 1 second and 100 years".into(),
            });
        }
        Ok(())
    }
}
