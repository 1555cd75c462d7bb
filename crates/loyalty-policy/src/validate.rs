use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyResult};
use crate::types::{Condition, Predicate};

/// Structural limits applied to every condition tree before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionLimits {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for ConditionLimits {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_nodes: 256,
        }
    }
}

/// Validate a condition tree, collecting every problem found.
///
/// The walk uses an explicit stack and never descends past `max_depth` or
/// visits more than `max_nodes + 1` nodes, so arbitrarily large input is
/// rejected in bounded time and stack.
pub fn validate_condition(condition: &Condition, limits: &ConditionLimits) -> PolicyResult<()> {
    let mut errors = Vec::new();
    let mut too_deep = false;
    let mut visited = 0usize;
    let mut pending = vec![(condition, 1usize)];

    while let Some((node, depth)) = pending.pop() {
        visited += 1;

        if depth > limits.max_depth && !too_deep {
            too_deep = true;
            errors.push(format!("depth exceeds limit {}", limits.max_depth));
        }

        match node {
            Condition::Simple(predicate) => check_predicate(predicate, &mut errors),
            Condition::And(children) | Condition::Or(children) => {
                if depth <= limits.max_depth {
                    pending.extend(children.iter().rev().map(|child| (child, depth + 1)));
                }
            }
        }

        if visited > limits.max_nodes {
            errors.push(format!("tree has more than {} nodes", limits.max_nodes));
            break;
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(PolicyError::InvalidCondition(errors))
    }
}

fn check_predicate(predicate: &Predicate, errors: &mut Vec<String>) {
    match predicate {
        Predicate::ReceiptCount { time_window, .. } => {
            if let Some(window) = time_window {
                if let (Some(start), Some(end)) = (window.start, window.end) {
                    if start > end {
                        errors.push(format!(
                            "time window starts at {} after it ends at {}",
                            start, end
                        ));
                    }
                }
            }
        }
        Predicate::CredentialRequired { scheme_id, .. } => {
            if scheme_id.as_str().is_empty() {
                errors.push("credential predicate has an empty scheme id".to_string());
            }
        }
    }
}
