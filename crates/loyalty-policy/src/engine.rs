use loyalty_core::{IssuedCredential, Principal, Receipt};

use crate::types::{Condition, Predicate};

// ---------------------------------------------------------------------------
// HistorySource: read-only view of recorded receipts and credentials
// ---------------------------------------------------------------------------

/// Snapshot of holder history the engine evaluates against.
///
/// Implementations hand out borrows of their own state, so one evaluation
/// sees a single consistent snapshot for as long as the borrow lives.
pub trait HistorySource {
    fn receipts_for(&self, holder: &Principal) -> Vec<&Receipt>;
    fn credentials_for(&self, holder: &Principal) -> &[IssuedCredential];
    fn store_name(&self, store: &Principal) -> Option<&str>;
}

// ---------------------------------------------------------------------------
// ConditionEngine: recursive evaluation
// ---------------------------------------------------------------------------

pub struct ConditionEngine<'a> {
    history: &'a dyn HistorySource,
}

impl<'a> ConditionEngine<'a> {
    pub fn new(history: &'a dyn HistorySource) -> Self {
        Self { history }
    }

    /// Evaluate `condition` for `holder`.
    ///
    /// `And` and `Or` short-circuit left to right. `And([])` holds and
    /// `Or([])` does not. Recursion depth is bounded by `validate_condition`,
    /// which every stored tree has passed.
    pub fn evaluate(&self, condition: &Condition, holder: &Principal) -> bool {
        match condition {
            Condition::Simple(predicate) => self.evaluate_predicate(predicate, holder),
            Condition::And(children) => children.iter().all(|c| self.evaluate(c, holder)),
            Condition::Or(children) => children.iter().any(|c| self.evaluate(c, holder)),
        }
    }

    fn evaluate_predicate(&self, predicate: &Predicate, holder: &Principal) -> bool {
        match predicate {
            Predicate::ReceiptCount {
                store_names,
                min_count,
                time_window,
            } => {
                let count = self
                    .history
                    .receipts_for(holder)
                    .into_iter()
                    .filter(|r| self.name_matches(store_names, &r.store))
                    .filter(|r| time_window.map_or(true, |w| w.contains(r.timestamp)))
                    .count() as u64;
                count >= *min_count
            }
            Predicate::CredentialRequired {
                scheme_id,
                issuer_names,
            } => self
                .history
                .credentials_for(holder)
                .iter()
                .any(|c| &c.scheme_id == scheme_id && self.name_matches(issuer_names, &c.issuer)),
        }
    }

    /// Empty filters match any store; otherwise the store's display name
    /// must be listed. Unknown stores never match a non-empty filter.
    fn name_matches(&self, names: &[String], store: &Principal) -> bool {
        if names.is_empty() {
            return true;
        }
        match self.history.store_name(store) {
            Some(name) => names.iter().any(|n| n == name),
            None => false,
        }
    }
}
