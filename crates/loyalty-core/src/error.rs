use thiserror::Error;

/// Domain error taxonomy shared by every loyalty operation.
///
/// Display strings carry identifiers only. Signatures, key material and
/// encrypted receipt payloads never appear in an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoyaltyError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type LoyaltyResult<T> = Result<T, LoyaltyError>;

/// Errors reported by a ledger service implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The ledger refused a debit because the account cannot cover it.
    #[error("insufficient funds: balance {balance}")]
    InsufficientFunds { balance: u64 },

    /// The ledger processed the call and rejected it.
    #[error("transfer rejected: {0}")]
    Rejected(String),

    /// The call never produced an answer.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("signing failed: {0}")]
pub struct SigningError(pub String);
