//! Loyalty Credential Registry
//!
//! Stores register a secp256k1 public key, publish credential schemes, and
//! sign claims for holders off-chain. The registry records a claim as an
//! issued credential only when its signature verifies against the
//! registered key, and keeps per-holder and per-issuer histories for the
//! condition engine.

pub mod issuance;
pub mod store;

pub use issuance::CredentialRegistry;
pub use store::StoreRegistry;
