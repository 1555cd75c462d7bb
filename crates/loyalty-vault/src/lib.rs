pub mod error;
pub mod ledger;
pub mod signer;

pub use error::*;
pub use ledger::InMemoryLedger;
pub use signer::{verify_attestation, verify_attestation_hex, AttestationSigner};
