use async_trait::async_trait;
use loyalty_core::{Ledger, LedgerError, Principal};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// In-memory token ledger implementing `Ledger`.
///
/// Every call takes the lock once, so each transfer is atomic: a debit
/// that would overdraw is refused whole. Useful for tests and for running
/// the service without an external ledger.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<Principal, u64>,
    next_block: u64,
}

fn lock_state(mutex: &Mutex<LedgerState>) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
    mutex
        .lock()
        .map_err(|e| LedgerError::Unavailable(format!("lock poisoned: {}", e)))
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Credit `amount` to `account` out of thin air.
    pub fn mint(&self, account: &Principal, amount: u64) -> Result<u64, LedgerError> {
        let mut state = lock_state(&self.state)?;
        let balance = state.balances.entry(account.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
        let block = state.next_block;
        state.next_block += 1;
        Ok(block)
    }

    /// Current balance (0 for unknown accounts).
    pub fn balance(&self, account: &Principal) -> u64 {
        lock_state(&self.state)
            .map(|s| s.balances.get(account).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn apply_transfer(&self, from: &Principal, to: &Principal, amount: u64) -> Result<u64, LedgerError> {
        let mut state = lock_state(&self.state)?;
        let available = state.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::InsufficientFunds { balance: available });
        }
        state.balances.insert(from.clone(), available - amount);
        let credited = state.balances.entry(to.clone()).or_insert(0);
        *credited = credited.saturating_add(amount);
        let block = state.next_block;
        state.next_block += 1;
        debug!(from = %from, to = %to, amount, block, "ledger transfer applied");
        Ok(block)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn balance_of(&self, account: &Principal) -> Result<u64, LedgerError> {
        let state = lock_state(&self.state)?;
        Ok(state.balances.get(account).copied().unwrap_or(0))
    }

    async fn transfer(
        &self,
        from: &Principal,
        to: &Principal,
        amount: u64,
    ) -> Result<u64, LedgerError> {
        if from == to {
            return Err(LedgerError::Rejected("self transfer".into()));
        }
        self.apply_transfer(from, to, amount)
    }
}
