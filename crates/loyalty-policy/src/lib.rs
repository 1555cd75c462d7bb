//! Loyalty Policy Engine
//!
//! Reward eligibility as a recursive condition tree:
//! - `Simple` leaves count a holder's receipts (optionally per store and
//!   per time window) or require a recorded credential
//! - `And` / `Or` combine children with left-to-right short-circuiting
//!
//! Evaluation is pure. It reads a `HistorySource` borrow and never mutates,
//! so repeated evaluation over unchanged history yields the same answer.
//! Trees are validated against structural limits before they are stored.

pub mod engine;
pub mod error;
pub mod types;
pub mod validate;

pub use engine::{ConditionEngine, HistorySource};
pub use error::{PolicyError, PolicyResult};
pub use types::{Condition, Predicate, StoreScheme, TagScheme, TimeWindow};
pub use validate::{validate_condition, ConditionLimits};
