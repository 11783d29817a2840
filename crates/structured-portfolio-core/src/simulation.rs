//! Deterministic scenario replay.
//!
//! Builds a portfolio on a [`ManualClock`] with in-memory vaults, then runs a
//! list of timed steps against it. A failing step is recorded and the replay
//! moves on, so a scenario can show that failed operations leave no trace.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::access::{PauseSwitch, Whitelist};
use crate::error::WaterfallError;
use crate::portfolio::{Collaborators, Portfolio, PortfolioConfig, PortfolioEvent, PortfolioSnapshot};
use crate::time::ManualClock;
use crate::types::*;
use crate::vault::InMemoryVault;
use crate::WaterfallResult;

/// Replays start at 2024-01-01T00:00:00Z unless told otherwise.
const DEFAULT_START_UNIX: i64 = 1_704_067_200;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// Outside holdings that set a vault's opening share price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultHoldings {
    pub assets: Money,
    pub shares: Shares,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSetup {
    pub id: Address,
    /// Defaults to the portfolio's asset
    #[serde(default)]
    pub asset: Option<Address>,
    #[serde(default = "default_whitelisted")]
    pub whitelisted: bool,
    /// Empty vaults mint shares one-for-one
    #[serde(default)]
    pub holdings: Option<VaultHoldings>,
}

fn default_whitelisted() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SimulationAction {
    TrancheDeposit { tranche: usize, amount: Money },
    Start,
    Close,
    Register { vault: Address },
    Deposit { vault: Address, amount: Money },
    RegisterAndDeposit { vault: Address, amount: Money },
    Redeem { vault: Address, amount: Money },
    VaultGain { vault: Address, amount: Money },
    VaultLoss { vault: Address, amount: Money },
    Pause,
    Unpause,
    Snapshot {
        #[serde(default)]
        label: Option<String>,
    },
}

impl SimulationAction {
    pub fn name(&self) -> &'static str {
        match self {
            SimulationAction::TrancheDeposit { .. } => "tranche_deposit",
            SimulationAction::Start => "start",
            SimulationAction::Close => "close",
            SimulationAction::Register { .. } => "register",
            SimulationAction::Deposit { .. } => "deposit",
            SimulationAction::RegisterAndDeposit { .. } => "register_and_deposit",
            SimulationAction::Redeem { .. } => "redeem",
            SimulationAction::VaultGain { .. } => "vault_gain",
            SimulationAction::VaultLoss { .. } => "vault_loss",
            SimulationAction::Pause => "pause",
            SimulationAction::Unpause => "unpause",
            SimulationAction::Snapshot { .. } => "snapshot",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationStep {
    /// Clock movement before the action runs
    #[serde(default)]
    pub advance_seconds: u64,
    /// Defaults to the portfolio manager
    #[serde(default)]
    pub caller: Option<Address>,
    #[serde(flatten)]
    pub action: SimulationAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationInput {
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vaults: Vec<VaultSetup>,
    pub steps: Vec<SimulationStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledSnapshot {
    pub step: usize,
    pub label: Option<String>,
    pub snapshot: PortfolioSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub step: usize,
    #[serde(flatten)]
    pub event: PortfolioEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepError {
    pub step: usize,
    pub action: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub snapshots: Vec<LabeledSnapshot>,
    pub events: Vec<StepEvent>,
    pub errors: Vec<StepError>,
    pub final_state: PortfolioSnapshot,
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

struct Harness {
    portfolio: Portfolio,
    clock: Arc<ManualClock>,
    pause: Arc<PauseSwitch>,
    vaults: BTreeMap<Address, Arc<InMemoryVault>>,
}

impl Harness {
    fn new(input: &SimulationInput) -> WaterfallResult<Self> {
        let clock = Arc::new(match input.start_time {
            Some(start) => ManualClock::new(start),
            None => ManualClock::at_unix(DEFAULT_START_UNIX),
        });
        let pause = Arc::new(PauseSwitch::new());
        let whitelist = Arc::new(Whitelist::default());

        let mut vaults = BTreeMap::new();
        for setup in &input.vaults {
            if vaults.contains_key(&setup.id) {
                return Err(WaterfallError::InvalidInput {
                    field: "vaults".into(),
                    reason: format!("Vault {} is declared twice", setup.id),
                });
            }
            let asset = setup
                .asset
                .clone()
                .unwrap_or_else(|| input.portfolio.asset.clone());
            let mut vault = InMemoryVault::new(setup.id.clone(), asset);
            if let Some(h) = &setup.holdings {
                if h.assets < Decimal::ZERO || h.shares < Decimal::ZERO {
                    return Err(WaterfallError::InvalidInput {
                        field: format!("vaults.{}.holdings", setup.id),
                        reason: "Holdings cannot be negative".into(),
                    });
                }
                vault = vault.with_holdings(h.assets, h.shares);
            }
            if setup.whitelisted {
                whitelist.allow(setup.id.clone());
            }
            vaults.insert(setup.id.clone(), Arc::new(vault));
        }

        let collaborators = Collaborators {
            clock: clock.clone(),
            eligibility: whitelist,
            pause_gate: pause.clone(),
        };
        let portfolio = Portfolio::new(input.portfolio.clone(), collaborators)?;

        Ok(Harness {
            portfolio,
            clock,
            pause,
            vaults,
        })
    }

    fn vault(&self, id: &Address) -> WaterfallResult<Arc<InMemoryVault>> {
        self.vaults
            .get(id)
            .cloned()
            .ok_or_else(|| WaterfallError::InvalidInput {
                field: "vault".into(),
                reason: format!("Vault {} is not declared in the scenario", id),
            })
    }

    /// Run one action. Returns a snapshot when the action asks for one.
    fn apply(
        &mut self,
        caller: &Address,
        action: &SimulationAction,
    ) -> WaterfallResult<Option<PortfolioSnapshot>> {
        match action {
            SimulationAction::TrancheDeposit { tranche, amount } => {
                self.portfolio.record_tranche_deposit(*tranche, *amount)?;
            }
            SimulationAction::Start => self.portfolio.start(caller)?,
            SimulationAction::Close => self.portfolio.close(caller)?,
            SimulationAction::Register { vault } => {
                let vault = self.vault(vault)?;
                self.portfolio.register_investment(caller, vault)?;
            }
            SimulationAction::Deposit { vault, amount } => {
                self.portfolio.execute_deposit(caller, vault, *amount)?;
            }
            SimulationAction::RegisterAndDeposit { vault, amount } => {
                let vault = self.vault(vault)?;
                self.portfolio
                    .register_and_execute_deposit(caller, vault, *amount)?;
            }
            SimulationAction::Redeem { vault, amount } => {
                self.portfolio
                    .execute_redeem_and_unregister(caller, vault, *amount)?;
            }
            SimulationAction::VaultGain { vault, amount } => {
                self.vault(vault)?.report_gain(*amount)?;
            }
            SimulationAction::VaultLoss { vault, amount } => {
                self.vault(vault)?.report_loss(*amount)?;
            }
            SimulationAction::Pause => self.pause.pause(),
            SimulationAction::Unpause => self.pause.unpause(),
            SimulationAction::Snapshot { .. } => return self.portfolio.snapshot().map(Some),
        }
        Ok(None)
    }
}

/// Replay a scenario step by step.
pub fn run_simulation(
    input: &SimulationInput,
) -> WaterfallResult<ComputationOutput<SimulationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.steps.is_empty() {
        return Err(WaterfallError::InsufficientData(
            "At least one simulation step is required.".into(),
        ));
    }

    let mut harness = Harness::new(input)?;
    let manager = input.portfolio.manager.clone();

    let mut snapshots = Vec::new();
    let mut events = Vec::new();
    let mut errors = Vec::new();

    for (step, entry) in input.steps.iter().enumerate() {
        harness.clock.advance(entry.advance_seconds);
        let caller = entry.caller.as_ref().unwrap_or(&manager);
        log::debug!("step {}: {} by {}", step, entry.action.name(), caller);

        match harness.apply(caller, &entry.action) {
            Ok(Some(snapshot)) => {
                let label = match &entry.action {
                    SimulationAction::Snapshot { label } => label.clone(),
                    _ => None,
                };
                snapshots.push(LabeledSnapshot {
                    step,
                    label,
                    snapshot,
                });
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!("step {} ({}) failed: {}", step, entry.action.name(), e);
                warnings.push(format!("Step {} ({}) failed: {}", step, entry.action.name(), e));
                errors.push(StepError {
                    step,
                    action: entry.action.name().to_string(),
                    error: e.to_string(),
                });
            }
        }

        events.extend(
            harness
                .portfolio
                .drain_events()
                .into_iter()
                .map(|event| StepEvent { step, event }),
        );
    }

    let output = SimulationOutput {
        snapshots,
        events,
        errors,
        final_state: harness.portfolio.snapshot()?,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Checkpointed seniority waterfall replay with in-memory vaults",
        &serde_json::json!({
            "portfolio": input.portfolio.name,
            "steps": input.steps.len(),
            "vaults": input.vaults.len(),
            "accrual_policy": input.portfolio.accrual_policy,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
