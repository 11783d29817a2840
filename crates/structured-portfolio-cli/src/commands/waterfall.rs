use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use structured_portfolio_core::waterfall::{self, WaterfallInput, WaterfallTrancheInput};

use crate::input;

/// Arguments for the seniority waterfall
#[derive(Args)]
pub struct WaterfallArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Current total portfolio value
    #[arg(long)]
    pub total_value: Option<Decimal>,

    /// Seconds since the previous checkpoint
    #[arg(long, default_value_t = 0)]
    pub elapsed_seconds: u64,

    /// Protocol fee in bps per annum
    #[arg(long, default_value_t = 0)]
    pub protocol_fee_rate: u32,

    /// Prior nominal values, equity first (comma-separated, e.g. "1000,2000,3000")
    #[arg(long, value_delimiter = ',')]
    pub nominal_values: Option<Vec<Decimal>>,

    /// Tranche fee rates in bps, equity first (defaults to 0 for every tranche)
    #[arg(long, value_delimiter = ',')]
    pub fee_rates: Option<Vec<u32>>,
}

pub fn run_waterfall(args: WaterfallArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let waterfall_input: WaterfallInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        from_flags(args)?
    };

    let result = waterfall::calculate_waterfall(&waterfall_input)?;
    Ok(serde_json::to_value(result)?)
}

fn from_flags(args: WaterfallArgs) -> Result<WaterfallInput, Box<dyn std::error::Error>> {
    let total_value = args
        .total_value
        .ok_or("--total-value is required (or provide --input)")?;
    let nominal_values = args
        .nominal_values
        .ok_or("--nominal-values is required (or provide --input)")?;
    let fee_rates = args
        .fee_rates
        .unwrap_or_else(|| vec![0; nominal_values.len()]);
    if fee_rates.len() != nominal_values.len() {
        return Err(format!(
            "--fee-rates has {} entries but --nominal-values has {}",
            fee_rates.len(),
            nominal_values.len()
        )
        .into());
    }

    let tranches = nominal_values
        .into_iter()
        .zip(fee_rates)
        .enumerate()
        .map(|(i, (nominal_value, fee_rate))| WaterfallTrancheInput {
            name: tranche_name(i),
            nominal_value,
            fee_rate,
        })
        .collect();

    Ok(WaterfallInput {
        total_value,
        elapsed_seconds: args.elapsed_seconds,
        protocol_fee_rate: args.protocol_fee_rate,
        tranches,
    })
}

fn tranche_name(index: usize) -> String {
    if index == 0 {
        "Equity".to_string()
    } else {
        format!("Tranche {}", index)
    }
}
