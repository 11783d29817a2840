use clap::Args;
use serde_json::Value;

use structured_portfolio_core::simulation::{self, SimulationInput};

use crate::input;

/// Arguments for scenario replay
#[derive(Args)]
pub struct SimulateArgs {
    /// Path to JSON/YAML scenario file
    #[arg(long)]
    pub input: Option<String>,

    /// Print only the final state instead of the full replay
    #[arg(long)]
    pub final_only: bool,
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario: SimulationInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <scenario.yaml> or stdin required for simulate".into());
    };

    log::info!(
        "replaying {} steps for portfolio {}",
        scenario.steps.len(),
        scenario.portfolio.name
    );
    let output = simulation::run_simulation(&scenario)?;

    if args.final_only {
        return Ok(serde_json::json!({
            "result": output.result.final_state,
            "warnings": output.warnings,
            "methodology": output.methodology,
        }));
    }
    Ok(serde_json::to_value(output)?)
}
