use loyalty_core::{LedgerError, LoyaltyError};
use thiserror::Error;

/// Error type for the loyalty service and binary.
///
/// `Domain` carries the caller-facing taxonomy. `External` is the generic
/// failure raised when the ledger never answered; it is kept apart from
/// the domain set so callers can tell "rejected" from "unknown outcome".
#[derive(Debug, Error)]
pub enum RootError {
    #[error(transparent)]
    Domain(#[from] LoyaltyError),

    #[error("external call failed: {0}")]
    External(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RootError {
    /// The domain error, if this is one.
    pub fn domain(&self) -> Option<&LoyaltyError> {
        match self {
            RootError::Domain(e) => Some(e),
            _ => None,
        }
    }

    /// Map a ledger failure observed while debiting `required` tokens.
    pub fn from_ledger(err: LedgerError, required: u64) -> Self {
        match err {
            LedgerError::InsufficientFunds { balance } => {
                RootError::Domain(LoyaltyError::InsufficientBalance {
                    required,
                    available: balance,
                })
            }
            LedgerError::Rejected(reason) => RootError::Domain(LoyaltyError::Ledger(reason)),
            LedgerError::Unavailable(reason) => RootError::External(reason),
        }
    }
}

impl From<loyalty_policy::PolicyError> for RootError {
    fn from(e: loyalty_policy::PolicyError) -> Self {
        RootError::Domain(e.into())
    }
}

impl From<loyalty_vault::VaultError> for RootError {
    fn from(e: loyalty_vault::VaultError) -> Self {
        RootError::Config(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
