//! Gatekeeping collaborators: vault eligibility and the pause switch.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::types::Address;

/// Registry of vaults the portfolio may invest in.
pub trait EligibilityRegistry: Send + Sync {
    fn contains(&self, vault: &Address) -> bool;
}

/// Externally imposed pause flag.
pub trait PauseGate: Send + Sync {
    fn is_paused(&self) -> bool;
}

/// Mutable set of eligible vault addresses.
#[derive(Debug, Default)]
pub struct Whitelist {
    vaults: RwLock<BTreeSet<Address>>,
}

impl Whitelist {
    pub fn new<I>(vaults: I) -> Self
    where
        I: IntoIterator<Item = Address>,
    {
        Whitelist {
            vaults: RwLock::new(vaults.into_iter().collect()),
        }
    }

    pub fn allow(&self, vault: Address) {
        if let Ok(mut vaults) = self.vaults.write() {
            vaults.insert(vault);
        }
    }

    pub fn revoke(&self, vault: &Address) {
        if let Ok(mut vaults) = self.vaults.write() {
            vaults.remove(vault);
        }
    }
}

impl EligibilityRegistry for Whitelist {
    fn contains(&self, vault: &Address) -> bool {
        self.vaults
            .read()
            .map(|vaults| vaults.contains(vault))
            .unwrap_or(false)
    }
}

/// Pause flag flipped by an operator outside the engine.
#[derive(Debug, Default)]
pub struct PauseSwitch {
    paused: AtomicBool,
}

impl PauseSwitch {
    pub fn new() -> Self {
        PauseSwitch::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn unpause(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}

impl PauseGate for PauseSwitch {
    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelist_membership() {
        let list = Whitelist::new([Address::new("a")]);
        assert!(list.contains(&Address::new("a")));
        assert!(!list.contains(&Address::new("b")));
        list.allow(Address::new("b"));
        list.revoke(&Address::new("a"));
        assert!(!list.contains(&Address::new("a")));
        assert!(list.contains(&Address::new("b")));
    }

    #[test]
    fn test_pause_switch() {
        let switch = PauseSwitch::new();
        assert!(!switch.is_paused());
        switch.pause();
        assert!(switch.is_paused());
        switch.unpause();
        assert!(!switch.is_paused());
    }
}
