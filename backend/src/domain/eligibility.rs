//! # Eligibility
//!
//! Decides whether a delegator may take part in a lottery.
//!
//! Two independent predicates, both must hold:
//!
//! | Predicate | Rule |
//! |-----------|------|
//! | Loyalty | no delegation to another pool in `[current - lookback, current]` |
//! | Live stake | `live_stake > min_live_stake` (strict) |
//!
//! A delegator with no delegation inside the window is still loyal, and a
//! delegation without an epoch is outside every window.

use std::collections::HashSet;

use super::models::Delegator;

/// Loyalty check over the closed window `[current_epoch - lookback, current_epoch]`.
pub fn is_eligible(
    delegator: &Delegator,
    target_pool_id: &str,
    current_epoch: i64,
    min_count_active_epochs: i64,
) -> bool {
    let min_epoch = current_epoch.saturating_sub(min_count_active_epochs);

    !delegator
        .delegation_history
        .iter()
        .filter(|delegation| delegation.is_within(min_epoch, current_epoch))
        .any(|delegation| delegation.pool_id != target_pool_id)
}

pub fn is_live_stake_enough(delegator: &Delegator, min_live_stake: i64) -> bool {
    delegator.live_stake > min_live_stake
}

/// Both predicates bound to one lottery's parameters.
#[derive(Debug, Clone)]
pub struct EligibilityRules<'a> {
    pub target_pool_id: &'a str,
    pub current_epoch: i64,
    pub lookback_epochs: i64,
    pub min_live_stake: i64,
}

impl EligibilityRules<'_> {
    pub fn admits(&self, delegator: &Delegator) -> bool {
        is_eligible(
            delegator,
            self.target_pool_id,
            self.current_epoch,
            self.lookback_epochs,
        ) && is_live_stake_enough(delegator, self.min_live_stake)
    }

    /// Keep the admitted delegators, preserving input order.
    ///
    /// An address listed more than once is judged on its first entry only.
    pub fn filter<'d>(&self, delegators: impl IntoIterator<Item = &'d Delegator>) -> Vec<Delegator> {
        let mut seen = HashSet::new();

        delegators
            .into_iter()
            .filter(|delegator| seen.insert(delegator.address_id.clone()))
            .filter(|delegator| self.admits(delegator))
            .cloned()
            .collect()
    }
}
