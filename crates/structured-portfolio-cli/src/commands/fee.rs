use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use structured_portfolio_core::fees::{self, FeeAccrualInput};

use crate::input;

/// Arguments for single-tranche fee accrual
#[derive(Args)]
pub struct FeeArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Pre-fee tranche value
    #[arg(long)]
    pub value: Option<Decimal>,

    /// Seconds of accrual
    #[arg(long)]
    pub elapsed_seconds: Option<u64>,

    /// Tranche fee in bps per annum
    #[arg(long, default_value_t = 0)]
    pub tranche_fee_rate: u32,

    /// Protocol fee in bps per annum
    #[arg(long, default_value_t = 0)]
    pub protocol_fee_rate: u32,
}

pub fn run_fee(args: FeeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let fee_input: FeeAccrualInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let value = args.value.ok_or("--value is required (or provide --input)")?;
        let elapsed_seconds = args
            .elapsed_seconds
            .ok_or("--elapsed-seconds is required (or provide --input)")?;
        FeeAccrualInput {
            value,
            elapsed_seconds,
            tranche_fee_rate: args.tranche_fee_rate,
            protocol_fee_rate: args.protocol_fee_rate,
        }
    };

    let result = fees::accrue_fee(&fee_input)?;
    Ok(serde_json::to_value(result)?)
}
