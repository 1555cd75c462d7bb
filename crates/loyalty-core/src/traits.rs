use async_trait::async_trait;

use crate::error::{LedgerError, SigningError};
use crate::types::{Principal, Timestamp};

// ---------------------------------------------------------------------------
// Signer: the system's own Ed25519 attestation capability
// ---------------------------------------------------------------------------

pub trait Signer: Send + Sync {
    fn sign_ed25519(&self, message: &[u8]) -> Result<[u8; 64], SigningError>;
    fn public_key_ed25519(&self) -> [u8; 32];
}

// ---------------------------------------------------------------------------
// Ledger: external token ledger holding store balances
//
// Each call is atomic on the ledger side. Between two calls other callers
// may move the same balance, so a balance read is only a hint for the
// transfer that follows it.
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance_of(&self, account: &Principal) -> Result<u64, LedgerError>;

    /// Move `amount` from `from` to `to`. Returns the ledger's block index.
    async fn transfer(
        &self,
        from: &Principal,
        to: &Principal,
        amount: u64,
    ) -> Result<u64, LedgerError>;
}

// ---------------------------------------------------------------------------
// Clock: source of "now" for receipts and awards
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the trait objects are object-safe
    fn _assert_signer_object_safe(_: &dyn Signer) {}
    fn _assert_ledger_object_safe(_: &dyn Ledger) {}
    fn _assert_clock_object_safe(_: &dyn Clock) {}

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let t1 = clock.now();
        let t2 = clock.now();
        assert!(t2 >= t1);
    }
}
