//! Cashback arithmetic and store-scheme multiplier selection.

use loyalty_core::SchemeId;
use loyalty_policy::StoreScheme;
use std::cmp::Reverse;

use crate::config::CashbackConfig;

/// Cashback owed for one purchase and the scheme that shaped it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashbackQuote {
    pub amount: u64,
    pub applied_scheme: Option<SchemeId>,
}

/// Pick the scheme whose multiplier applies.
///
/// Highest multiplier wins. Among equal multipliers the smallest cap wins,
/// with no cap counting as unbounded. Remaining ties go to the lowest id.
pub fn select_scheme<'a, I>(candidates: I) -> Option<&'a StoreScheme>
where
    I: IntoIterator<Item = &'a StoreScheme>,
{
    fn cap(s: &StoreScheme) -> u64 {
        s.max_cashback_amount.unwrap_or(u64::MAX)
    }

    candidates.into_iter().min_by(|a, b| {
        Reverse(a.cashback_multiplier)
            .cmp(&Reverse(b.cashback_multiplier))
            .then_with(|| cap(a).cmp(&cap(b)))
            .then_with(|| a.id.cmp(&b.id))
    })
}

/// `amount * base_percent / 100`, scaled by the multiplier and clamped to
/// the scheme's cap. Integer division truncates at each step.
pub fn compute_cashback(
    amount: u64,
    config: &CashbackConfig,
    scheme: Option<&StoreScheme>,
) -> CashbackQuote {
    let base = u128::from(amount) * u128::from(config.base_percent) / 100;
    let multiplier = scheme.map_or(config.baseline_multiplier, |s| s.cashback_multiplier);
    let enhanced = base * u128::from(multiplier) / 100;
    let capped = match scheme.and_then(|s| s.max_cashback_amount) {
        Some(cap) => enhanced.min(u128::from(cap)),
        None => enhanced,
    };

    CashbackQuote {
        amount: u64::try_from(capped).unwrap_or(u64::MAX),
        applied_scheme: scheme.map(|s| s.id.clone()),
    }
}
