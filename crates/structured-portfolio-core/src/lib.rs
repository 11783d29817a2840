pub mod access;
pub mod error;
pub mod fees;
pub mod investments;
pub mod portfolio;
pub mod time;
pub mod tranche;
pub mod types;
pub mod vault;
pub mod waterfall;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use error::WaterfallError;
pub use types::*;

/// Standard result type for all waterfall operations
pub type WaterfallResult<T> = Result<T, WaterfallError>;
