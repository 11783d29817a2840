//! Moving capital between the virtual token balance and registered vaults.

use rust_decimal::Decimal;
use std::sync::Arc;

use super::{ensure_positive, Portfolio, PortfolioEvent, Staged};
use crate::error::WaterfallError;
use crate::types::*;
use crate::vault::Vault;
use crate::waterfall;
use crate::WaterfallResult;

impl Portfolio {
    /// Add an empty position in `vault`.
    pub fn register_investment(
        &mut self,
        caller: &Address,
        vault: Arc<dyn Vault>,
    ) -> WaterfallResult<()> {
        self.authorize(caller, "register_investment", &[PortfolioStatus::Live])?;
        self.investments.ensure_registrable(
            vault.as_ref(),
            &self.config.asset,
            self.eligibility.as_ref(),
        )?;

        let mut staged = self.stage_checkpoint(self.clock.now())?;
        staged.events.push(PortfolioEvent::InvestmentRegistered {
            vault: vault.id().clone(),
        });
        self.investments.register(vault)?;
        self.commit(staged);
        Ok(())
    }

    /// Deposit `amount` of uninvested capital into an already registered
    /// vault. Returns the shares minted.
    pub fn execute_deposit(
        &mut self,
        caller: &Address,
        vault: &Address,
        amount: Money,
    ) -> WaterfallResult<Shares> {
        self.authorize(caller, "execute_deposit", &[PortfolioStatus::Live])?;
        let handle = self.investments.vault(vault)?;
        let held = self
            .investments
            .get(vault)
            .map(|i| i.shares_held)
            .unwrap_or_default();

        let mut staged = self.stage_checkpoint(self.clock.now())?;
        let (shares, held) = self.stage_deposit(&mut staged, handle.as_ref(), held, amount)?;
        self.investments.set_shares(vault, held)?;
        self.commit(staged);
        Ok(shares)
    }

    /// Register `vault` and deposit into it under a single checkpoint. Fails
    /// if the vault is already registered; use [`Portfolio::execute_deposit`]
    /// to add to an existing position.
    pub fn register_and_execute_deposit(
        &mut self,
        caller: &Address,
        vault: Arc<dyn Vault>,
        amount: Money,
    ) -> WaterfallResult<Shares> {
        self.authorize(caller, "register_and_execute_deposit", &[PortfolioStatus::Live])?;
        self.investments.ensure_registrable(
            vault.as_ref(),
            &self.config.asset,
            self.eligibility.as_ref(),
        )?;

        let id = vault.id().clone();
        let mut staged = self.stage_checkpoint(self.clock.now())?;
        staged
            .events
            .push(PortfolioEvent::InvestmentRegistered { vault: id.clone() });
        let (shares, held) =
            self.stage_deposit(&mut staged, vault.as_ref(), Decimal::ZERO, amount)?;

        self.investments.register(vault)?;
        self.investments.set_shares(&id, held)?;
        self.commit(staged);
        Ok(shares)
    }

    /// Redeem up to `asset_amount` from `vault`, distribute the proceeds down
    /// the seniority cascade and unregister the investment once no shares
    /// remain. An amount at or above the position's value redeems every
    /// share. Returns the assets received.
    pub fn execute_redeem_and_unregister(
        &mut self,
        caller: &Address,
        vault: &Address,
        asset_amount: Money,
    ) -> WaterfallResult<Money> {
        self.authorize(
            caller,
            "execute_redeem_and_unregister",
            &[PortfolioStatus::Live, PortfolioStatus::Closed],
        )?;
        ensure_non_negative(asset_amount, "asset_amount")?;
        let handle = self.investments.vault(vault)?;
        let held = self
            .investments
            .get(vault)
            .map(|i| i.shares_held)
            .unwrap_or_default();

        let mut staged = self.stage_checkpoint(self.clock.now())?;

        let position_value = handle.convert_to_assets(held)?;
        let shares = if asset_amount >= position_value {
            held
        } else {
            handle.convert_to_shares(asset_amount)?
        };
        if shares > held {
            return Err(WaterfallError::InsufficientShares {
                requested: shares,
                held,
            });
        }
        let remaining = checked_sub(held, shares, "shares held")?;

        let owner = self.config.address.clone();
        let assets = handle.redeem(shares, &owner, &owner)?;

        staged.virtual_token_balance =
            checked_add(staged.virtual_token_balance, assets, "virtual token balance")?;
        let split = waterfall::cascade(assets, &staged.tranches.distribution_capacities())?;
        staged.tranches.record_distribution(&split)?;
        staged.events.push(PortfolioEvent::ExecutedRedeem {
            vault: vault.clone(),
            shares,
            assets,
        });

        if remaining.is_zero() {
            staged.events.push(PortfolioEvent::InvestmentUnregistered {
                vault: vault.clone(),
            });
            self.investments.unregister(vault)?;
        } else {
            self.investments.set_shares(vault, remaining)?;
        }
        self.commit(staged);
        Ok(assets)
    }

    /// Validate and perform a vault deposit against staged state. Returns the
    /// shares minted and the new position size.
    fn stage_deposit(
        &self,
        staged: &mut Staged,
        vault: &dyn Vault,
        held: Shares,
        amount: Money,
    ) -> WaterfallResult<(Shares, Shares)> {
        ensure_positive(amount, "amount")?;
        if amount > staged.virtual_token_balance {
            return Err(WaterfallError::InsufficientBalance {
                requested: amount,
                available: staged.virtual_token_balance,
            });
        }
        let balance = staged.virtual_token_balance - amount;

        let shares = vault.deposit(amount, &self.config.address)?;
        let held = checked_add(held, shares, "shares held")?;

        staged.virtual_token_balance = balance;
        staged.events.push(PortfolioEvent::ExecutedDeposit {
            vault: vault.id().clone(),
            assets: amount,
            shares,
        });
        Ok((shares, held))
    }
}
