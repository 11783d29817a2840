//! Portfolio aggregate: lifecycle, checkpoints and the capital ledger.
//!
//! Every state-changing operation follows the same shape:
//! 1. gate checks (pause, caller, lifecycle)
//! 2. stage a checkpoint: run the waterfall up to now and settle fees
//!    against a copy of the ledger
//! 3. apply the operation's effect to the staged copy (vault calls happen here)
//! 4. commit the staged copy and emit its events
//!
//! Nothing is written before step 4, so a failure in steps 1-3 leaves the
//! portfolio untouched.

mod capital;
pub mod config;
pub mod events;

pub use config::{AccrualPolicy, PortfolioConfig, MAX_DURATION_SECONDS};
pub use events::PortfolioEvent;

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::access::{EligibilityRegistry, PauseGate};
use crate::error::WaterfallError;
use crate::investments::{Investment, InvestmentRegistry, InvestmentValuation};
use crate::time::Clock;
use crate::tranche::{Tranche, TrancheLedger};
use crate::types::*;
use crate::waterfall::{self, Waterfall};
use crate::WaterfallResult;

/// External collaborators a portfolio consults.
#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub eligibility: Arc<dyn EligibilityRegistry>,
    pub pause_gate: Arc<dyn PauseGate>,
}

/// Fees charged against tranches and how much of them has left the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLedger {
    pub protocol_accrued: Money,
    /// Per tranche beneficiary, equity first
    pub tranche_accrued: Vec<Money>,
    /// Protocol plus tranche fees, kept in step by `record`
    pub accrued: Money,
    /// Paid out of the virtual token balance
    pub paid: Money,
}

impl FeeLedger {
    fn new(tranche_count: usize) -> Self {
        FeeLedger {
            protocol_accrued: Decimal::ZERO,
            tranche_accrued: vec![Decimal::ZERO; tranche_count],
            accrued: Decimal::ZERO,
            paid: Decimal::ZERO,
        }
    }

    pub fn total_accrued(&self) -> Money {
        self.accrued
    }

    /// Accrued but not yet paid for lack of uninvested capital.
    pub fn pending(&self) -> Money {
        (self.total_accrued() - self.paid).max(Decimal::ZERO)
    }

    fn record(&mut self, waterfall: &Waterfall) -> WaterfallResult<()> {
        self.accrued = checked_add(self.accrued, waterfall.total_fees()?, "accrued fees")?;
        self.protocol_accrued =
            checked_add(self.protocol_accrued, waterfall.protocol_fees()?, "protocol fees")?;
        for (accrued, fee) in self.tranche_accrued.iter_mut().zip(waterfall.tranche_fees()) {
            *accrued = checked_add(*accrued, fee, "tranche fees")?;
        }
        Ok(())
    }
}

/// Point-in-time view of a portfolio, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub name: String,
    pub status: PortfolioStatus,
    pub as_of: Timestamp,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub last_checkpoint: Option<Timestamp>,
    pub virtual_token_balance: Money,
    pub pending_fees: Money,
    pub total_assets: Money,
    pub tranches: Vec<Tranche>,
    pub investments: Vec<InvestmentValuation>,
    pub fee_ledger: FeeLedger,
    /// Waterfall projected to `as_of`
    pub waterfall: Waterfall,
}

/// Checkpoint computed against the current state but not yet applied.
struct Staged {
    last_checkpoint: Option<Timestamp>,
    tranches: TrancheLedger,
    virtual_token_balance: Money,
    fee_ledger: FeeLedger,
    uncollectible_fees: Money,
    events: Vec<PortfolioEvent>,
}

pub struct Portfolio {
    config: PortfolioConfig,
    status: PortfolioStatus,
    start_date: Option<Timestamp>,
    end_date: Option<Timestamp>,
    last_checkpoint: Option<Timestamp>,
    virtual_token_balance: Money,
    tranches: TrancheLedger,
    investments: InvestmentRegistry,
    fee_ledger: FeeLedger,
    events: Vec<PortfolioEvent>,
    clock: Arc<dyn Clock>,
    eligibility: Arc<dyn EligibilityRegistry>,
    pause_gate: Arc<dyn PauseGate>,
}

impl fmt::Debug for Portfolio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Portfolio")
            .field("name", &self.config.name)
            .field("status", &self.status)
            .field("virtual_token_balance", &self.virtual_token_balance)
            .field("tranches", &self.tranches)
            .field("investments", &self.investments)
            .field("last_checkpoint", &self.last_checkpoint)
            .finish_non_exhaustive()
    }
}

impl Portfolio {
    pub fn new(config: PortfolioConfig, collaborators: Collaborators) -> WaterfallResult<Self> {
        config.validate()?;
        let tranches = TrancheLedger::new(&config.tranches)?;
        let fee_ledger = FeeLedger::new(tranches.len());
        Ok(Portfolio {
            config,
            status: PortfolioStatus::CapitalFormation,
            start_date: None,
            end_date: None,
            last_checkpoint: None,
            virtual_token_balance: Decimal::ZERO,
            tranches,
            investments: InvestmentRegistry::new(),
            fee_ledger,
            events: Vec::new(),
            clock: collaborators.clock,
            eligibility: collaborators.eligibility,
            pause_gate: collaborators.pause_gate,
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &PortfolioConfig {
        &self.config
    }

    pub fn status(&self) -> PortfolioStatus {
        self.status
    }

    pub fn start_date(&self) -> Option<Timestamp> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<Timestamp> {
        self.end_date
    }

    pub fn last_checkpoint(&self) -> Option<Timestamp> {
        self.last_checkpoint
    }

    pub fn virtual_token_balance(&self) -> Money {
        self.virtual_token_balance
    }

    pub fn tranches(&self) -> &[Tranche] {
        self.tranches.as_slice()
    }

    pub fn investments(&self) -> impl Iterator<Item = &Investment> {
        self.investments.iter()
    }

    pub fn investment(&self, vault: &Address) -> Option<&Investment> {
        self.investments.get(vault)
    }

    pub fn fee_ledger(&self) -> &FeeLedger {
        &self.fee_ledger
    }

    pub fn pending_fees(&self) -> Money {
        self.fee_ledger.pending()
    }

    /// Total value now: uninvested capital plus investment values, net of
    /// unpaid fees.
    pub fn total_assets(&self) -> WaterfallResult<Money> {
        let invested = self.investments.total_value()?;
        let gross = checked_add(self.virtual_token_balance, invested, "total portfolio value")?;
        Ok((gross - self.fee_ledger.pending()).max(Decimal::ZERO))
    }

    /// Waterfall projected to the clock's current time. Does not touch stored
    /// state.
    pub fn calculate_waterfall(&self) -> WaterfallResult<Waterfall> {
        self.project(self.clock.now()).map(|(waterfall, _)| waterfall)
    }

    /// Post-fee tranche values, equity first.
    pub fn tranche_values(&self) -> WaterfallResult<Vec<Money>> {
        Ok(self.calculate_waterfall()?.values())
    }

    pub fn snapshot(&self) -> WaterfallResult<PortfolioSnapshot> {
        let now = self.clock.now();
        let (waterfall, _) = self.project(now)?;
        Ok(PortfolioSnapshot {
            name: self.config.name.clone(),
            status: self.status,
            as_of: now,
            start_date: self.start_date,
            end_date: self.end_date,
            last_checkpoint: self.last_checkpoint,
            virtual_token_balance: self.virtual_token_balance,
            pending_fees: self.fee_ledger.pending(),
            total_assets: self.total_assets()?,
            tranches: self.tranches.as_slice().to_vec(),
            investments: self.investments.valuations()?,
            fee_ledger: self.fee_ledger.clone(),
            waterfall,
        })
    }

    /// Events committed since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<PortfolioEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[PortfolioEvent] {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Move from capital formation to live; fixes the end date.
    pub fn start(&mut self, caller: &Address) -> WaterfallResult<()> {
        self.authorize(caller, "start", &[PortfolioStatus::CapitalFormation])?;

        let now = self.clock.now();
        let duration = i64::try_from(self.config.duration_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| WaterfallError::overflow("portfolio duration"))?;
        let end = now
            .checked_add_signed(duration)
            .ok_or_else(|| WaterfallError::overflow("portfolio end date"))?;

        self.status = PortfolioStatus::Live;
        self.start_date = Some(now);
        self.end_date = Some(end);
        self.last_checkpoint = Some(now);
        self.emit(PortfolioEvent::Started {
            start_date: now,
            end_date: end,
        });
        Ok(())
    }

    /// Settle a final checkpoint and close. Before the end date only the
    /// manager may close, and the end date moves back to the close;
    /// afterwards anyone may.
    pub fn close(&mut self, caller: &Address) -> WaterfallResult<()> {
        self.ensure_not_paused()?;
        self.ensure_status("close", &[PortfolioStatus::Live])?;
        let now = self.clock.now();
        if self.end_date.map_or(true, |end| now < end) {
            self.ensure_manager(caller)?;
        }

        let mut staged = self.stage_checkpoint(now)?;
        staged.events.push(PortfolioEvent::Closed { at: now });
        self.commit(staged);
        self.status = PortfolioStatus::Closed;
        if self.end_date.map_or(true, |end| now < end) {
            self.end_date = Some(now);
        }
        Ok(())
    }

    /// Capital arriving through a tranche's token front end.
    pub fn record_tranche_deposit(&mut self, tranche: usize, amount: Money) -> WaterfallResult<()> {
        self.ensure_not_paused()?;
        self.ensure_status(
            "record_tranche_deposit",
            &[PortfolioStatus::CapitalFormation, PortfolioStatus::Live],
        )?;
        ensure_positive(amount, "amount")?;

        let mut staged = self.stage_checkpoint(self.clock.now())?;
        staged.tranches.record_deposit(tranche, amount)?;
        staged.virtual_token_balance =
            checked_add(staged.virtual_token_balance, amount, "virtual token balance")?;
        staged
            .events
            .push(PortfolioEvent::TrancheDeposited { tranche, amount });
        self.commit(staged);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Gates
    // -----------------------------------------------------------------------

    fn authorize(
        &self,
        caller: &Address,
        operation: &str,
        allowed: &[PortfolioStatus],
    ) -> WaterfallResult<()> {
        self.ensure_not_paused()?;
        self.ensure_manager(caller)?;
        self.ensure_status(operation, allowed)
    }

    fn ensure_not_paused(&self) -> WaterfallResult<()> {
        if self.pause_gate.is_paused() {
            return Err(WaterfallError::PortfolioPaused);
        }
        Ok(())
    }

    fn ensure_manager(&self, caller: &Address) -> WaterfallResult<()> {
        if caller != &self.config.manager {
            return Err(WaterfallError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    fn ensure_status(&self, operation: &str, allowed: &[PortfolioStatus]) -> WaterfallResult<()> {
        if !allowed.contains(&self.status) {
            return Err(WaterfallError::lifecycle(operation, self.status));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Checkpoints
    // -----------------------------------------------------------------------

    /// End of the fee interval for a checkpoint taken at `now`.
    fn accrual_end(&self, now: Timestamp, last: Timestamp) -> Timestamp {
        let capped = self.end_date.map_or(now, |end| now.min(end));
        match (self.config.accrual_policy, self.status) {
            (AccrualPolicy::Uncapped, _) => now,
            (AccrualPolicy::StopAtClose, PortfolioStatus::Closed) => last,
            (AccrualPolicy::CapAtEndDate, PortfolioStatus::Closed) => now,
            _ => capped,
        }
    }

    /// Waterfall at `now` and the checkpoint time it would establish.
    fn project(&self, now: Timestamp) -> WaterfallResult<(Waterfall, Option<Timestamp>)> {
        let total = self.total_assets()?;
        let last = match (self.status, self.last_checkpoint) {
            (PortfolioStatus::CapitalFormation, _) | (_, None) => {
                return Ok((
                    waterfall::unchanged(total, self.tranches.as_slice()),
                    self.last_checkpoint,
                ));
            }
            (_, Some(last)) => last,
        };

        let end = self.accrual_end(now, last).max(last);
        let whole_seconds = (end - last).num_seconds().max(0);
        let elapsed_seconds = u64::try_from(whole_seconds).unwrap_or(0);
        // Only whole seconds are charged; the remainder stays ahead of the checkpoint
        let checkpoint = Duration::try_seconds(whole_seconds)
            .and_then(|charged| last.checked_add_signed(charged))
            .ok_or_else(|| WaterfallError::overflow("checkpoint time"))?;
        let result = waterfall::compute(
            total,
            elapsed_seconds,
            self.tranches.as_slice(),
            self.config.protocol_fee_rate,
        )?;
        Ok((result, Some(checkpoint)))
    }

    /// Settle fees and re-baseline nominal values against a copy of the
    /// ledger.
    fn stage_checkpoint(&self, now: Timestamp) -> WaterfallResult<Staged> {
        let (result, checkpoint) = self.project(now)?;
        let values = result.values();

        let mut tranches = self.tranches.clone();
        tranches.set_nominal_values(&values)?;

        let mut events = Vec::new();
        if self.status != PortfolioStatus::CapitalFormation {
            if let Some(at) = checkpoint {
                events.push(PortfolioEvent::CheckpointUpdated {
                    at,
                    elapsed_seconds: result.elapsed_seconds,
                    nominal_values: values,
                });
            }
        }

        let mut fee_ledger = self.fee_ledger.clone();
        fee_ledger.record(&result)?;
        let owed = fee_ledger.pending();
        let paid = owed.min(self.virtual_token_balance);
        fee_ledger.paid = checked_add(fee_ledger.paid, paid, "fees paid")?;

        let new_fees = result.total_fees()?;
        if new_fees > Decimal::ZERO || paid > Decimal::ZERO {
            events.push(PortfolioEvent::FeesAccrued {
                protocol_fee: result.protocol_fees()?,
                tranche_fees: result.tranche_fees(),
                paid,
                pending: fee_ledger.pending(),
            });
        }

        Ok(Staged {
            last_checkpoint: checkpoint,
            tranches,
            virtual_token_balance: self.virtual_token_balance - paid,
            fee_ledger,
            uncollectible_fees: checked_sum(
                result.tranches.iter().map(|t| t.uncollectible_fee),
                "uncollectible fees",
            )?,
            events,
        })
    }

    fn commit(&mut self, staged: Staged) {
        if staged.uncollectible_fees > Decimal::ZERO {
            log::warn!(
                "{}: {} of fees exceeded tranche values and were not collected",
                self.config.name,
                staged.uncollectible_fees
            );
        }
        if staged.fee_ledger.pending() > Decimal::ZERO {
            log::warn!(
                "{}: {} of fees pending until uninvested capital is available",
                self.config.name,
                staged.fee_ledger.pending()
            );
        }

        self.last_checkpoint = staged.last_checkpoint;
        self.tranches = staged.tranches;
        self.virtual_token_balance = staged.virtual_token_balance;
        self.fee_ledger = staged.fee_ledger;
        for event in staged.events {
            self.emit(event);
        }
    }

    fn emit(&mut self, event: PortfolioEvent) {
        if event.is_checkpoint() {
            log::debug!("{}: {:?}", self.config.name, event);
        } else {
            log::info!("{}: {:?}", self.config.name, event);
        }
        self.events.push(event);
    }
}

fn ensure_positive(value: Money, field: &str) -> WaterfallResult<()> {
    if value <= Decimal::ZERO {
        return Err(WaterfallError::InvalidInput {
            field: field.into(),
            reason: "Amount must be positive".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
