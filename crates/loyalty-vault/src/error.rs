use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

pub type VaultResult<T> = Result<T, VaultError>;
