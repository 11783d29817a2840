use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::access::EligibilityRegistry;
use crate::error::WaterfallError;
use crate::types::*;
use crate::vault::Vault;
use crate::WaterfallResult;

/// A registered position in an external vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investment {
    pub vault: Address,
    pub asset: Address,
    pub shares_held: Shares,
}

/// Investment together with its current valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestmentValuation {
    pub vault: Address,
    pub shares_held: Shares,
    pub value: Money,
}

struct Entry {
    investment: Investment,
    vault: Arc<dyn Vault>,
}

/// Registered investments keyed by vault address. At most one per vault.
#[derive(Default)]
pub struct InvestmentRegistry {
    entries: BTreeMap<Address, Entry>,
}

impl fmt::Debug for InvestmentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.values().map(|e| &e.investment))
            .finish()
    }
}

impl InvestmentRegistry {
    pub fn new() -> Self {
        InvestmentRegistry::default()
    }

    /// Registration preconditions, checked in order: eligibility, asset,
    /// uniqueness.
    pub fn ensure_registrable(
        &self,
        vault: &dyn Vault,
        portfolio_asset: &Address,
        eligibility: &dyn EligibilityRegistry,
    ) -> WaterfallResult<()> {
        if !eligibility.contains(vault.id()) {
            return Err(WaterfallError::NotWhitelisted(vault.id().clone()));
        }
        if vault.asset() != portfolio_asset {
            return Err(WaterfallError::AssetMismatch {
                vault: vault.id().clone(),
                expected: portfolio_asset.clone(),
                actual: vault.asset().clone(),
            });
        }
        if self.contains(vault.id()) {
            return Err(WaterfallError::AlreadyRegistered(vault.id().clone()));
        }
        Ok(())
    }

    /// Add a fresh investment with zero shares.
    pub fn register(&mut self, vault: Arc<dyn Vault>) -> WaterfallResult<&Investment> {
        let id = vault.id().clone();
        if self.contains(&id) {
            return Err(WaterfallError::AlreadyRegistered(id));
        }
        let investment = Investment {
            vault: id.clone(),
            asset: vault.asset().clone(),
            shares_held: Decimal::ZERO,
        };
        let entry = self.entries.entry(id).or_insert(Entry { investment, vault });
        Ok(&entry.investment)
    }

    pub fn unregister(&mut self, vault: &Address) -> WaterfallResult<Investment> {
        self.entries
            .remove(vault)
            .map(|e| e.investment)
            .ok_or_else(|| WaterfallError::InvestmentNotFound(vault.clone()))
    }

    pub fn contains(&self, vault: &Address) -> bool {
        self.entries.contains_key(vault)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, vault: &Address) -> Option<&Investment> {
        self.entries.get(vault).map(|e| &e.investment)
    }

    pub fn vault(&self, vault: &Address) -> WaterfallResult<Arc<dyn Vault>> {
        self.entries
            .get(vault)
            .map(|e| Arc::clone(&e.vault))
            .ok_or_else(|| WaterfallError::InvestmentNotFound(vault.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Investment> {
        self.entries.values().map(|e| &e.investment)
    }

    pub fn set_shares(&mut self, vault: &Address, shares: Shares) -> WaterfallResult<()> {
        let entry = self
            .entries
            .get_mut(vault)
            .ok_or_else(|| WaterfallError::InvestmentNotFound(vault.clone()))?;
        entry.investment.shares_held = shares;
        Ok(())
    }

    /// Current value of one position, as reported by its vault.
    pub fn value_of(&self, vault: &Address) -> WaterfallResult<Money> {
        let entry = self
            .entries
            .get(vault)
            .ok_or_else(|| WaterfallError::InvestmentNotFound(vault.clone()))?;
        entry.vault.convert_to_assets(entry.investment.shares_held)
    }

    pub fn valuations(&self) -> WaterfallResult<Vec<InvestmentValuation>> {
        self.entries
            .values()
            .map(|e| {
                Ok(InvestmentValuation {
                    vault: e.investment.vault.clone(),
                    shares_held: e.investment.shares_held,
                    value: e.vault.convert_to_assets(e.investment.shares_held)?,
                })
            })
            .collect()
    }

    /// Σ current value of every position.
    pub fn total_value(&self) -> WaterfallResult<Money> {
        let values = self
            .entries
            .values()
            .map(|e| e.vault.convert_to_assets(e.investment.shares_held))
            .collect::<WaterfallResult<Vec<_>>>()?;
        checked_sum(values, "investment value")
    }
}
