use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use structured_portfolio_core::access::{PauseSwitch, Whitelist};
use structured_portfolio_core::fees;
use structured_portfolio_core::portfolio::{
    AccrualPolicy, Collaborators, Portfolio, PortfolioConfig, PortfolioEvent,
};
use structured_portfolio_core::time::ManualClock;
use structured_portfolio_core::tranche::TrancheSpec;
use structured_portfolio_core::vault::{InMemoryVault, Vault, VaultCall};
use structured_portfolio_core::{Address, Money, PortfolioStatus, WaterfallError, SECONDS_PER_YEAR};

const DURATION: u64 = 2 * SECONDS_PER_YEAR;

struct Setup {
    portfolio: Portfolio,
    clock: Arc<ManualClock>,
    pause: Arc<PauseSwitch>,
    vault_a: Arc<InMemoryVault>,
    vault_b: Arc<InMemoryVault>,
}

fn manager() -> Address {
    Address::new("manager")
}

fn setup(protocol_fee_rate: u32, fee_rates: [u32; 3], policy: AccrualPolicy) -> Setup {
    let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
    let pause = Arc::new(PauseSwitch::new());
    let vault_a = Arc::new(InMemoryVault::new("vault-a", "usdc"));
    let vault_b = Arc::new(InMemoryVault::new("vault-b", "usdc"));
    let whitelist = Arc::new(Whitelist::new([
        vault_a.id().clone(),
        vault_b.id().clone(),
    ]));

    let config = PortfolioConfig {
        name: "Structured Fund".into(),
        address: Address::new("portfolio"),
        asset: Address::new("usdc"),
        manager: manager(),
        duration_seconds: DURATION,
        protocol_fee_rate,
        tranches: ["Equity", "Junior", "Senior"]
            .iter()
            .zip(fee_rates)
            .map(|(name, fee_rate)| TrancheSpec {
                name: name.to_string(),
                fee_rate,
            })
            .collect(),
        accrual_policy: policy,
    };
    let collaborators = Collaborators {
        clock: clock.clone(),
        eligibility: whitelist,
        pause_gate: pause.clone(),
    };
    let mut portfolio = Portfolio::new(config, collaborators).unwrap();
    for (i, amount) in [dec!(1_000_000), dec!(2_000_000), dec!(3_000_000)]
        .into_iter()
        .enumerate()
    {
        portfolio.record_tranche_deposit(i, amount).unwrap();
    }

    Setup {
        portfolio,
        clock,
        pause,
        vault_a,
        vault_b,
    }
}

fn distributed(portfolio: &Portfolio) -> Vec<Money> {
    portfolio
        .tranches()
        .iter()
        .map(|t| t.distributed_assets)
        .collect()
}

fn nominal(portfolio: &Portfolio) -> Vec<Money> {
    portfolio.tranches().iter().map(|t| t.nominal_value).collect()
}

// ===========================================================================
// End-to-end scenarios
// ===========================================================================

#[test]
fn test_unchanged_value_returns_deposits() {
    let s = setup(0, [0, 0, 0], AccrualPolicy::CapAtEndDate);
    assert_eq!(
        s.portfolio.calculate_waterfall().unwrap().values(),
        vec![dec!(1_000_000), dec!(2_000_000), dec!(3_000_000)]
    );
}

#[test]
fn test_loss_leaves_only_fee_adjusted_senior() {
    let mut s = setup(100, [50, 300, 200], AccrualPolicy::CapAtEndDate);
    s.portfolio.start(&manager()).unwrap();
    s.portfolio
        .register_and_execute_deposit(&manager(), s.vault_a.clone(), dec!(3_010_000))
        .unwrap();
    s.vault_a.report_loss(dec!(3_010_000)).unwrap();
    assert_eq!(s.portfolio.virtual_token_balance(), dec!(2_990_000));

    s.clock.advance(DURATION / 2);

    let senior = fees::accrue(dec!(2_990_000), DURATION / 2, 200, 100)
        .unwrap()
        .value_after;
    assert_eq!(
        s.portfolio.tranche_values().unwrap(),
        vec![Decimal::ZERO, Decimal::ZERO, senior]
    );
}

#[test]
fn test_deposit_into_fresh_vault() {
    let mut s = setup(0, [0, 0, 0], AccrualPolicy::CapAtEndDate);
    let priced = Arc::new(
        InMemoryVault::new("vault-a", "usdc").with_holdings(dec!(3_000_000), dec!(2_000_000)),
    );
    s.portfolio.start(&manager()).unwrap();

    let expected = priced.convert_to_shares(dec!(1_000_000)).unwrap();
    let before = s.portfolio.virtual_token_balance();
    let shares = s
        .portfolio
        .register_and_execute_deposit(&manager(), priced.clone(), dec!(1_000_000))
        .unwrap();

    assert_eq!(shares, expected);
    assert_eq!(before - s.portfolio.virtual_token_balance(), dec!(1_000_000));
    assert_eq!(
        priced.calls(),
        vec![VaultCall::Deposit {
            assets: dec!(1_000_000),
            receiver: Address::new("portfolio"),
        }]
    );
}

#[test]
fn test_redeem_after_close_pays_senior_first() {
    let mut s = setup(100, [0, 300, 200], AccrualPolicy::CapAtEndDate);
    s.portfolio.start(&manager()).unwrap();
    s.portfolio
        .register_and_execute_deposit(&manager(), s.vault_a.clone(), dec!(5_000_000))
        .unwrap();

    s.clock.advance(DURATION);
    s.portfolio.close(&manager()).unwrap();
    let at_close = nominal(&s.portfolio);
    let senior = at_close[2];
    assert_eq!(senior, dec!(3_000_000) - dec!(180_000));

    let received = s
        .portfolio
        .execute_redeem_and_unregister(&manager(), s.vault_a.id(), senior)
        .unwrap();
    assert_eq!(received, senior);
    assert_eq!(distributed(&s.portfolio), vec![Decimal::ZERO, Decimal::ZERO, senior]);

    let rest = s
        .portfolio
        .execute_redeem_and_unregister(&manager(), s.vault_a.id(), dec!(10_000_000))
        .unwrap();
    let paid = distributed(&s.portfolio);
    assert_eq!(paid[2], senior);
    assert_eq!(paid[1], at_close[1]);
    assert_eq!(paid[0], rest - at_close[1]);
    assert_eq!(paid.iter().copied().sum::<Money>(), senior + rest);
    assert!(s.portfolio.investment(s.vault_a.id()).is_none());
}

// ===========================================================================
// Ledger invariants
// ===========================================================================

#[test]
fn test_nominal_values_track_total_assets() {
    let mut s = setup(100, [50, 300, 200], AccrualPolicy::CapAtEndDate);
    s.portfolio.start(&manager()).unwrap();
    s.portfolio
        .register_and_execute_deposit(&manager(), s.vault_a.clone(), dec!(4_000_000))
        .unwrap();
    s.clock.advance(90 * 86_400);
    s.vault_a.report_gain(dec!(250_000)).unwrap();
    s.portfolio.register_investment(&manager(), s.vault_b.clone()).unwrap();

    let sum: Money = nominal(&s.portfolio).iter().sum();
    assert_eq!(sum, s.portfolio.total_assets().unwrap());
}

#[test]
fn test_unpaid_fees_wait_for_liquidity() {
    let mut s = setup(100, [0, 0, 0], AccrualPolicy::CapAtEndDate);
    s.portfolio.start(&manager()).unwrap();
    s.portfolio
        .register_and_execute_deposit(&manager(), s.vault_a.clone(), dec!(6_000_000))
        .unwrap();
    s.clock.advance(SECONDS_PER_YEAR);

    s.portfolio.register_investment(&manager(), s.vault_b.clone()).unwrap();
    assert_eq!(s.portfolio.pending_fees(), dec!(60_000));
    assert_eq!(s.portfolio.virtual_token_balance(), Decimal::ZERO);
    assert_eq!(s.portfolio.total_assets().unwrap(), dec!(5_940_000));

    s.portfolio
        .execute_redeem_and_unregister(&manager(), s.vault_a.id(), dec!(100_000))
        .unwrap();
    assert_eq!(s.portfolio.virtual_token_balance(), dec!(100_000));

    s.portfolio
        .execute_deposit(&manager(), s.vault_b.id(), dec!(1))
        .unwrap();
    assert_eq!(s.portfolio.pending_fees(), Decimal::ZERO);
    assert_eq!(s.portfolio.virtual_token_balance(), dec!(39_999));
    assert_eq!(s.portfolio.fee_ledger().paid, dec!(60_000));
}

#[test]
fn test_projection_is_read_only() {
    let mut s = setup(100, [50, 300, 200], AccrualPolicy::CapAtEndDate);
    s.portfolio.start(&manager()).unwrap();
    s.clock.advance(SECONDS_PER_YEAR);

    let checkpoint = s.portfolio.last_checkpoint();
    let first = s.portfolio.calculate_waterfall().unwrap();
    let second = s.portfolio.calculate_waterfall().unwrap();
    assert_eq!(first, second);
    assert_eq!(s.portfolio.last_checkpoint(), checkpoint);
    assert_eq!(
        nominal(&s.portfolio),
        vec![dec!(1_000_000), dec!(2_000_000), dec!(3_000_000)]
    );
}

// ===========================================================================
// End-date accrual policies
// ===========================================================================

/// Close a year after the end date, then let another year pass.
fn closed_late(policy: AccrualPolicy) -> Setup {
    let mut s = setup(100, [0, 0, 0], policy);
    s.portfolio.start(&manager()).unwrap();
    s.clock.advance(DURATION + SECONDS_PER_YEAR);
    s.portfolio.close(&manager()).unwrap();
    s.clock.advance(SECONDS_PER_YEAR);
    s
}

#[test]
fn test_cap_at_end_date_policy() {
    let s = closed_late(AccrualPolicy::CapAtEndDate);
    // Two years of 1% on 6M at close, not three
    assert_eq!(s.portfolio.fee_ledger().protocol_accrued, dec!(120_000));
    assert_eq!(s.portfolio.last_checkpoint(), s.portfolio.end_date());
    // Afterwards fees run again from the end date: two years on 5.88M
    assert_eq!(
        s.portfolio.calculate_waterfall().unwrap().protocol_fees().unwrap(),
        dec!(117_600)
    );
}

#[test]
fn test_stop_at_close_policy() {
    let s = closed_late(AccrualPolicy::StopAtClose);
    assert_eq!(s.portfolio.fee_ledger().protocol_accrued, dec!(120_000));
    assert_eq!(
        s.portfolio.calculate_waterfall().unwrap().protocol_fees().unwrap(),
        Decimal::ZERO
    );
}

#[test]
fn test_uncapped_policy() {
    let s = closed_late(AccrualPolicy::Uncapped);
    assert_eq!(s.portfolio.fee_ledger().protocol_accrued, dec!(180_000));
    assert_eq!(
        s.portfolio.calculate_waterfall().unwrap().protocol_fees().unwrap(),
        dec!(58_200)
    );
}

// ===========================================================================
// Gates and error taxonomy
// ===========================================================================

#[test]
fn test_operations_require_live() {
    let mut s = setup(0, [0, 0, 0], AccrualPolicy::CapAtEndDate);
    let err = s
        .portfolio
        .register_investment(&manager(), s.vault_a.clone())
        .unwrap_err();
    assert_eq!(
        err,
        WaterfallError::InvalidLifecycleState {
            operation: "register_investment".into(),
            status: PortfolioStatus::CapitalFormation,
        }
    );
}

#[test]
fn test_pause_blocks_everything() {
    let mut s = setup(0, [0, 0, 0], AccrualPolicy::CapAtEndDate);
    s.portfolio.start(&manager()).unwrap();
    s.portfolio
        .register_and_execute_deposit(&manager(), s.vault_a.clone(), dec!(10))
        .unwrap();
    s.pause.pause();

    assert_eq!(
        s.portfolio
            .execute_redeem_and_unregister(&Address::new("intruder"), s.vault_a.id(), dec!(1)),
        Err(WaterfallError::PortfolioPaused)
    );
    assert_eq!(
        s.portfolio.record_tranche_deposit(0, dec!(1)),
        Err(WaterfallError::PortfolioPaused)
    );
    assert_eq!(s.portfolio.close(&manager()), Err(WaterfallError::PortfolioPaused));

    s.pause.unpause();
    s.portfolio.close(&manager()).unwrap();
}

#[test]
fn test_non_manager_rejected() {
    let mut s = setup(0, [0, 0, 0], AccrualPolicy::CapAtEndDate);
    s.portfolio.start(&manager()).unwrap();
    assert_eq!(
        s.portfolio
            .register_and_execute_deposit(&Address::new("intruder"), s.vault_a.clone(), dec!(1)),
        Err(WaterfallError::Unauthorized {
            caller: Address::new("intruder")
        })
    );
}

#[test]
fn test_anyone_may_close_after_end_date() {
    let mut s = setup(0, [0, 0, 0], AccrualPolicy::CapAtEndDate);
    s.portfolio.start(&manager()).unwrap();
    s.clock.advance(DURATION);
    s.portfolio.close(&Address::new("keeper")).unwrap();
    assert_eq!(s.portfolio.status(), PortfolioStatus::Closed);
}

#[test]
fn test_event_log_for_full_lifecycle() {
    let mut s = setup(0, [0, 0, 0], AccrualPolicy::CapAtEndDate);
    s.portfolio.drain_events();
    s.portfolio.start(&manager()).unwrap();
    s.portfolio
        .register_and_execute_deposit(&manager(), s.vault_a.clone(), dec!(1_000))
        .unwrap();
    s.portfolio
        .execute_redeem_and_unregister(&manager(), s.vault_a.id(), dec!(1_000))
        .unwrap();
    s.portfolio.close(&manager()).unwrap();

    let names: Vec<&str> = s
        .portfolio
        .events()
        .iter()
        .filter(|e| !e.is_checkpoint())
        .map(|e| match e {
            PortfolioEvent::Started { .. } => "started",
            PortfolioEvent::InvestmentRegistered { .. } => "registered",
            PortfolioEvent::ExecutedDeposit { .. } => "deposit",
            PortfolioEvent::ExecutedRedeem { .. } => "redeem",
            PortfolioEvent::InvestmentUnregistered { .. } => "unregistered",
            PortfolioEvent::Closed { .. } => "closed",
            _ => "other",
        })
        .collect();
    assert_eq!(
        names,
        vec!["started", "registered", "deposit", "redeem", "unregistered", "closed"]
    );
}
