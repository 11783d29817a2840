use napi::Result as NapiResult;
use napi_derive::napi;

use structured_portfolio_core::fees::{self, FeeAccrualInput};
use structured_portfolio_core::simulation::{self, SimulationInput};
use structured_portfolio_core::waterfall::{self, WaterfallInput};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Calculators
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_waterfall(input_json: String) -> NapiResult<String> {
    let input: WaterfallInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = waterfall::calculate_waterfall(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn accrue_fee(input_json: String) -> NapiResult<String> {
    let input: FeeAccrualInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fees::accrue_fee(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenario replay
// ---------------------------------------------------------------------------

#[napi]
pub fn run_simulation(input_json: String) -> NapiResult<String> {
    let input: SimulationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = simulation::run_simulation(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
