use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{Address, PortfolioStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaterfallError {
    #[error("Invalid lifecycle state: {operation} is not allowed while the portfolio is {status}")]
    InvalidLifecycleState {
        operation: String,
        status: PortfolioStatus,
    },

    #[error("Unauthorized: {caller} is not the portfolio manager")]
    Unauthorized { caller: Address },

    #[error("Portfolio is paused")]
    PortfolioPaused,

    #[error("Vault {0} is not whitelisted")]
    NotWhitelisted(Address),

    #[error("Asset mismatch: vault {vault} accepts {actual}, portfolio holds {expected}")]
    AssetMismatch {
        vault: Address,
        expected: Address,
        actual: Address,
    },

    #[error("Investment in vault {0} is already registered")]
    AlreadyRegistered(Address),

    #[error("Investment in vault {0} is not registered")]
    InvestmentNotFound(Address),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: Decimal, held: Decimal },

    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(String),

    #[error("Vault {vault} call failed: {reason}")]
    VaultCallFailed { vault: Address, reason: String },

    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl WaterfallError {
    pub(crate) fn overflow(context: &str) -> Self {
        WaterfallError::ArithmeticOverflow(context.to_string())
    }

    pub(crate) fn lifecycle(operation: &str, status: PortfolioStatus) -> Self {
        WaterfallError::InvalidLifecycleState {
            operation: operation.to_string(),
            status,
        }
    }
}

impl From<serde_json::Error> for WaterfallError {
    fn from(e: serde_json::Error) -> Self {
        WaterfallError::SerializationError(e.to_string())
    }
}
