use loyalty_core::LoyaltyError;
use thiserror::Error;

/// Errors raised while accepting a condition tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("invalid condition: {}", .0.join("; "))]
    InvalidCondition(Vec<String>),
}

impl From<PolicyError> for LoyaltyError {
    fn from(err: PolicyError) -> Self {
        LoyaltyError::InvalidInput(err.to_string())
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;
