use minority_core::{Address, PendingTransaction, Selector};

/// Decides which pending transactions are worth racing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFilter {
    pub contract: Address,
    pub selector: Selector,
    /// Our own identity; our transactions never trigger a race.
    pub own: Address,
}

impl TargetFilter {
    pub fn new(contract: Address, selector: Selector, own: Address) -> Self {
        Self {
            contract,
            selector,
            own,
        }
    }

    /// Filter for calls to `signature` (e.g. `mint()`) on `contract`.
    pub fn for_signature(contract: Address, signature: &str, own: Address) -> Self {
        Self::new(contract, Selector::from_signature(signature), own)
    }

    pub fn matches(&self, tx: &PendingTransaction) -> bool {
        tx.to == Some(self.contract) && self.selector.matches(&tx.input) && tx.from != self.own
    }
}
