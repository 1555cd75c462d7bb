use loyalty_core::{Principal, SchemeId, TagId, Timestamp};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TimeWindow: inclusive bounds on receipt timestamps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

impl TimeWindow {
    pub fn between(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: Timestamp) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn contains(&self, t: Timestamp) -> bool {
        self.start.map_or(true, |s| t >= s) && self.end.map_or(true, |e| t <= e)
    }
}

// ---------------------------------------------------------------------------
// Predicate: leaf checks against a holder's history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// At least `min_count` receipts from the named stores (any store when
    /// the list is empty) inside the optional window.
    ReceiptCount {
        store_names: Vec<String>,
        min_count: u64,
        time_window: Option<TimeWindow>,
    },
    /// At least one recorded credential for `scheme_id` from one of the
    /// named issuers (any issuer when the list is empty).
    CredentialRequired {
        scheme_id: SchemeId,
        issuer_names: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Condition: recursive eligibility tree
// ---------------------------------------------------------------------------

/// Eligibility tree. Scheme ids only ever appear in leaves, so a tree can
/// never reference itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Simple(Predicate),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn receipt_count(store_names: &[&str], min_count: u64) -> Self {
        Condition::Simple(Predicate::ReceiptCount {
            store_names: store_names.iter().map(|s| s.to_string()).collect(),
            min_count,
            time_window: None,
        })
    }

    pub fn receipt_count_within(store_names: &[&str], min_count: u64, window: TimeWindow) -> Self {
        Condition::Simple(Predicate::ReceiptCount {
            store_names: store_names.iter().map(|s| s.to_string()).collect(),
            min_count,
            time_window: Some(window),
        })
    }

    pub fn credential(scheme_id: SchemeId, issuer_names: &[&str]) -> Self {
        Condition::Simple(Predicate::CredentialRequired {
            scheme_id,
            issuer_names: issuer_names.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Depth of the tree; a lone leaf has depth 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1usize)];
        while let Some((node, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            if let Condition::And(children) | Condition::Or(children) = node {
                pending.extend(children.iter().map(|child| (child, depth + 1)));
            }
        }
        deepest
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            if let Condition::And(children) | Condition::Or(children) = node {
                pending.extend(children.iter());
            }
        }
        count
    }
}

// Trees arrive from callers before they are validated, so tearing one down
// must not recurse once per level.
impl Drop for Condition {
    fn drop(&mut self) {
        let mut pending = match self {
            Condition::Simple(_) => return,
            Condition::And(children) | Condition::Or(children) => std::mem::take(children),
        };
        while let Some(mut node) = pending.pop() {
            if let Condition::And(children) | Condition::Or(children) = &mut node {
                pending.append(children);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reward definitions
// ---------------------------------------------------------------------------

/// Controller-owned tag definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagScheme {
    pub id: TagId,
    pub name: String,
    pub description: String,
    pub condition: Condition,
    pub metadata: Option<String>,
    pub active: bool,
}

/// Store-owned scheme that enhances cashback for holders who earned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreScheme {
    pub id: SchemeId,
    pub store: Principal,
    pub name: String,
    pub description: String,
    pub condition: Condition,
    pub metadata: Option<String>,
    pub active: bool,
    /// Percentage applied to base cashback; 100 is the baseline.
    pub cashback_multiplier: u64,
    pub max_cashback_amount: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_inclusive_bounds() {
        let w = TimeWindow::between(Timestamp::from_nanos(10), Timestamp::from_nanos(20));
        assert!(w.contains(Timestamp::from_nanos(10)));
        assert!(w.contains(Timestamp::from_nanos(20)));
        assert!(!w.contains(Timestamp::from_nanos(9)));
        assert!(!w.contains(Timestamp::from_nanos(21)));
    }

    #[test]
    fn test_open_time_window() {
        assert!(TimeWindow::default().contains(Timestamp::from_nanos(0)));
        let since = TimeWindow::since(Timestamp::from_nanos(5));
        assert!(since.contains(Timestamp::from_nanos(u64::MAX)));
        assert!(!since.contains(Timestamp::from_nanos(4)));
    }

    #[test]
    fn test_depth_and_node_count() {
        let leaf = Condition::receipt_count(&[], 1);
        assert_eq!(leaf.depth(), 1);
        assert_eq!(leaf.node_count(), 1);

        let tree = Condition::And(vec![
            leaf.clone(),
            Condition::Or(vec![leaf.clone(), leaf.clone()]),
        ]);
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.node_count(), 5);

        assert_eq!(Condition::Or(vec![]).depth(), 1);
    }

    #[test]
    fn test_deep_chain_measured_and_dropped() {
        let mut cond = Condition::receipt_count(&[], 1);
        for _ in 1..200_000 {
            cond = Condition::And(vec![cond]);
        }
        assert_eq!(cond.depth(), 200_000);
        assert_eq!(cond.node_count(), 200_000);
        drop(cond);
    }

    #[test]
    fn test_condition_serde_shape() {
        let cond = Condition::Or(vec![
            Condition::receipt_count(&["Corner Shop"], 3),
            Condition::credential(SchemeId::new("abc"), &[]),
        ]);
        let json = serde_json::to_string(&cond).unwrap();
        assert!(json.contains("\"or\""));
        assert!(json.contains("\"receipt_count\""));
        assert!(json.contains("\"credential_required\""));
        let back: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cond);
    }
}
