use serde::{Deserialize, Serialize};

use crate::types::*;

/// Externally observable facts, one per committed state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PortfolioEvent {
    Started {
        start_date: Timestamp,
        end_date: Timestamp,
    },
    Closed {
        at: Timestamp,
    },
    TrancheDeposited {
        tranche: usize,
        amount: Money,
    },
    CheckpointUpdated {
        at: Timestamp,
        elapsed_seconds: u64,
        nominal_values: Vec<Money>,
    },
    FeesAccrued {
        protocol_fee: Money,
        tranche_fees: Vec<Money>,
        /// Paid out of the virtual token balance at this checkpoint
        paid: Money,
        /// Still owed after this checkpoint
        pending: Money,
    },
    InvestmentRegistered {
        vault: Address,
    },
    InvestmentUnregistered {
        vault: Address,
    },
    ExecutedDeposit {
        vault: Address,
        assets: Money,
        shares: Shares,
    },
    ExecutedRedeem {
        vault: Address,
        shares: Shares,
        assets: Money,
    },
}

impl PortfolioEvent {
    /// Checkpoint bookkeeping, as opposed to a caller-visible action.
    pub fn is_checkpoint(&self) -> bool {
        matches!(
            self,
            PortfolioEvent::CheckpointUpdated { .. } | PortfolioEvent::FeesAccrued { .. }
        )
    }
}
