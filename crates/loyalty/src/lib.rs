//! Loyalty Root Library
//!
//! Orchestration layer of the loyalty ledger. Stores register under a
//! controller, publish credential schemes and sign claims for holders,
//! record receipts that pay cashback out of their ledger balance, and
//! define schemes that enhance that cashback. Holders earn tags and store
//! schemes once condition trees over their history hold, and every award
//! carries an Ed25519 attestation from the service's own key.
//!
//! # Architecture
//!
//! `LoyaltyService` owns all recorded state behind one mutex. The token
//! ledger is an external collaborator behind `loyalty_core::Ledger`; the
//! only suspending operation is the cashback debit in `store_receipt`,
//! and no state lock is held across it.

pub mod attestation;
pub mod cashback;
pub mod config;
pub mod error;
pub mod service;

pub use cashback::{compute_cashback, select_scheme, CashbackQuote};
pub use config::{AttestationConfig, CashbackConfig, PolicyConfig, RootConfig};
pub use error::{RootError, RootResult};
pub use service::{LoyaltyService, NewStoreScheme};
