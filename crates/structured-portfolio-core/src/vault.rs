//! External yield vaults.
//!
//! The engine only talks to vaults through [`Vault`], an ERC-4626-style
//! shares/assets contract. [`InMemoryVault`] is a deterministic
//! implementation used by scenario replay and tests; it records every
//! state-changing call with its arguments.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::WaterfallError;
use crate::types::*;
use crate::WaterfallResult;

/// Shares/assets contract of an external vault.
///
/// Calls are atomic: a failed call leaves the vault unchanged.
pub trait Vault: Send + Sync {
    fn id(&self) -> &Address;

    /// Underlying asset accepted by the vault.
    fn asset(&self) -> &Address;

    fn convert_to_assets(&self, shares: Shares) -> WaterfallResult<Money>;

    fn convert_to_shares(&self, assets: Money) -> WaterfallResult<Shares>;

    /// Pull `assets` from the caller and mint shares to `receiver`.
    fn deposit(&self, assets: Money, receiver: &Address) -> WaterfallResult<Shares>;

    /// Burn `shares` of `owner` and send the assets to `receiver`.
    fn redeem(&self, shares: Shares, receiver: &Address, owner: &Address)
        -> WaterfallResult<Money>;
}

/// A state-changing call received by an [`InMemoryVault`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultCall {
    Deposit {
        assets: Money,
        receiver: Address,
    },
    Redeem {
        shares: Shares,
        receiver: Address,
        owner: Address,
    },
}

#[derive(Debug, Default)]
struct VaultState {
    total_assets: Money,
    total_shares: Shares,
    balances: BTreeMap<Address, Shares>,
    calls: Vec<VaultCall>,
    frozen: bool,
}

impl VaultState {
    fn to_shares(&self, id: &Address, assets: Money) -> WaterfallResult<Shares> {
        if self.total_shares.is_zero() {
            return Ok(assets);
        }
        if self.total_assets.is_zero() {
            return Err(WaterfallError::VaultCallFailed {
                vault: id.clone(),
                reason: "no assets back the outstanding shares".into(),
            });
        }
        let scaled = assets
            .checked_mul(self.total_shares)
            .ok_or_else(|| WaterfallError::overflow("vault share conversion"))?;
        scaled
            .checked_div(self.total_assets)
            .map(|v| v.trunc())
            .ok_or_else(|| WaterfallError::overflow("vault share conversion"))
    }

    fn to_assets(&self, shares: Shares) -> WaterfallResult<Money> {
        if self.total_shares.is_zero() {
            return Ok(shares);
        }
        let scaled = shares
            .checked_mul(self.total_assets)
            .ok_or_else(|| WaterfallError::overflow("vault asset conversion"))?;
        scaled
            .checked_div(self.total_shares)
            .map(|v| v.trunc())
            .ok_or_else(|| WaterfallError::overflow("vault asset conversion"))
    }
}

/// Deterministic in-process vault with a linear share price.
#[derive(Debug)]
pub struct InMemoryVault {
    id: Address,
    asset: Address,
    state: Mutex<VaultState>,
}

impl InMemoryVault {
    pub fn new(id: impl Into<Address>, asset: impl Into<Address>) -> Self {
        InMemoryVault {
            id: id.into(),
            asset: asset.into(),
            state: Mutex::new(VaultState::default()),
        }
    }

    /// Seed the vault with outside holders so the share price starts at
    /// `total_assets / total_shares`.
    pub fn with_holdings(self, total_assets: Money, total_shares: Shares) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.total_assets = total_assets;
            state.total_shares = total_shares;
            state
                .balances
                .insert(Address::new("outside-holders"), total_shares);
        }
        self
    }

    /// Yield earned by the vault's strategy.
    pub fn report_gain(&self, amount: Money) -> WaterfallResult<()> {
        let mut state = self.state()?;
        state.total_assets = checked_add(state.total_assets, amount, "vault gain")?;
        Ok(())
    }

    /// Loss suffered by the vault's strategy, floored at zero assets.
    pub fn report_loss(&self, amount: Money) -> WaterfallResult<()> {
        let mut state = self.state()?;
        state.total_assets = (state.total_assets - amount).max(Decimal::ZERO);
        Ok(())
    }

    /// A frozen vault rejects deposits and redemptions.
    pub fn set_frozen(&self, frozen: bool) -> WaterfallResult<()> {
        self.state()?.frozen = frozen;
        Ok(())
    }

    pub fn calls(&self) -> Vec<VaultCall> {
        self.state().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn total_assets(&self) -> Money {
        self.state().map(|s| s.total_assets).unwrap_or_default()
    }

    pub fn total_shares(&self) -> Shares {
        self.state().map(|s| s.total_shares).unwrap_or_default()
    }

    pub fn balance_of(&self, holder: &Address) -> Shares {
        self.state()
            .ok()
            .and_then(|s| s.balances.get(holder).copied())
            .unwrap_or_default()
    }

    fn state(&self) -> WaterfallResult<MutexGuard<'_, VaultState>> {
        self.state.lock().map_err(|_| WaterfallError::VaultCallFailed {
            vault: self.id.clone(),
            reason: "vault state lock poisoned".into(),
        })
    }

    fn ensure_open(&self, state: &VaultState) -> WaterfallResult<()> {
        if state.frozen {
            return Err(WaterfallError::VaultCallFailed {
                vault: self.id.clone(),
                reason: "vault is frozen".into(),
            });
        }
        Ok(())
    }
}

impl Vault for InMemoryVault {
    fn id(&self) -> &Address {
        &self.id
    }

    fn asset(&self) -> &Address {
        &self.asset
    }

    fn convert_to_assets(&self, shares: Shares) -> WaterfallResult<Money> {
        self.state()?.to_assets(shares)
    }

    fn convert_to_shares(&self, assets: Money) -> WaterfallResult<Shares> {
        let state = self.state()?;
        state.to_shares(&self.id, assets)
    }

    fn deposit(&self, assets: Money, receiver: &Address) -> WaterfallResult<Shares> {
        let mut state = self.state()?;
        self.ensure_open(&state)?;
        ensure_non_negative(assets, "assets")?;

        let shares = state.to_shares(&self.id, assets)?;
        let total_assets = checked_add(state.total_assets, assets, "vault deposit")?;
        let total_shares = checked_add(state.total_shares, shares, "vault deposit")?;
        let balance = state.balances.get(receiver).copied().unwrap_or_default();
        let balance = checked_add(balance, shares, "vault deposit")?;

        state.total_assets = total_assets;
        state.total_shares = total_shares;
        state.balances.insert(receiver.clone(), balance);
        state.calls.push(VaultCall::Deposit {
            assets,
            receiver: receiver.clone(),
        });
        Ok(shares)
    }

    fn redeem(
        &self,
        shares: Shares,
        receiver: &Address,
        owner: &Address,
    ) -> WaterfallResult<Money> {
        let mut state = self.state()?;
        self.ensure_open(&state)?;
        ensure_non_negative(shares, "shares")?;

        let balance = state.balances.get(owner).copied().unwrap_or_default();
        if shares > balance {
            return Err(WaterfallError::VaultCallFailed {
                vault: self.id.clone(),
                reason: format!("{} holds {} shares, {} requested", owner, balance, shares),
            });
        }
        let assets = state.to_assets(shares)?;

        state.total_assets = (state.total_assets - assets).max(Decimal::ZERO);
        state.total_shares -= shares;
        state.balances.insert(owner.clone(), balance - shares);
        state.calls.push(VaultCall::Redeem {
            shares,
            receiver: receiver.clone(),
            owner: owner.clone(),
        });
        Ok(assets)
    }
}
