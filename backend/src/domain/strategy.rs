//! # Weighting Strategies
//!
//! Turns the eligible delegators of a pool into lottery tickets.
//!
//! ## Variants
//!
//! | Strategy | Weight of delegator `d` |
//! |----------|-------------------------|
//! | `Fixed`  | `1 / N` |
//! | `Stake`  | `mean(d) / Σ mean` |
//!
//! `N` and `Σ mean` always cover every eligible delegator. When owners are
//! not allowed, owner tickets are dropped after weighting: their share is
//! forfeited, never redistributed to the others. A Stake delegator whose
//! mean rounds to 0.00 gets no ticket, since it could never be drawn.
//!
//! ## Stake Mean
//!
//! ```text
//! count_epochs == 1  →  live_stake
//! count_epochs >= 2  →  round(|first_stake + live_stake| / count_epochs, 2)
//!
//! first_stake = amount of the count_epochs-th most recent delegation to
//!               the pool, or 0 when the history is shorter
//! ```
//!
//! ## Call Protocol
//!
//! ```text
//! strategy.prepare(input)?   validates and resets all accumulators
//! strategy.compute_tickets() emits tickets from the prepared state
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::eligibility::EligibilityRules;
use super::models::{Delegator, Lottery, LotteryTicket, Pool};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("Out of delegator for lottery {0}")]
    OutOfDelegator(Uuid),

    #[error("Count epochs should be >= 1 for lottery {lottery_id}, got {count_epochs}")]
    OutOfEpoch { lottery_id: Uuid, count_epochs: i64 },

    #[error("Unknown lottery strategy: {0}")]
    UnknownStrategy(String),

    #[error("Total mean stake is zero for lottery {0}")]
    ZeroTotalStake(Uuid),
}

/// Strategy selector, stored and exchanged by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    Fixed,
    Stake,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Fixed => "Fixed",
            StrategyKind::Stake => "Stake",
        }
    }

    /// Whether tickets depend on delegation history.
    pub fn needs_history(&self) -> bool {
        matches!(self, StrategyKind::Stake)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "Fixed" => Ok(StrategyKind::Fixed),
            "Stake" => Ok(StrategyKind::Stake),
            other => Err(StrategyError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Everything a strategy needs for one lottery.
#[derive(Debug, Clone, Copy)]
pub struct TicketParams<'a> {
    pub strategy_type: StrategyKind,
    pub owners_allowed: bool,
    pub lottery_id: Uuid,
    pub pool: &'a Pool,
    pub count_epochs: i64,
}

/// Input handed to [`WeightingStrategy::prepare`].
#[derive(Debug, Clone, Copy)]
pub struct StrategyInput<'a> {
    pub eligible: &'a [Delegator],
    pub owners_allowed: bool,
    pub lottery_id: Uuid,
    pub pool: &'a Pool,
    pub count_epochs: i64,
}

impl<'a> StrategyInput<'a> {
    pub fn new(eligible: &'a [Delegator], params: &TicketParams<'a>) -> Self {
        Self {
            eligible,
            owners_allowed: params.owners_allowed,
            lottery_id: params.lottery_id,
            pool: params.pool,
            count_epochs: params.count_epochs,
        }
    }

    fn validate(&self) -> Result<(), StrategyError> {
        if self.eligible.is_empty() {
            return Err(StrategyError::OutOfDelegator(self.lottery_id));
        }
        if self.count_epochs < 1 {
            return Err(StrategyError::OutOfEpoch {
                lottery_id: self.lottery_id,
                count_epochs: self.count_epochs,
            });
        }
        Ok(())
    }
}

pub trait WeightingStrategy {
    /// Validate the input and compute the per-delegator weights.
    fn prepare(&mut self, input: StrategyInput<'_>) -> Result<(), StrategyError>;

    /// Emit tickets from the last successful `prepare`.
    fn compute_tickets(&mut self) -> Vec<LotteryTicket>;
}

/// A delegator's weight, computed before owner exclusion.
#[derive(Debug, Clone)]
struct WeightedEntry {
    address_id: String,
    pool_owner: bool,
    weight: f64,
    lottery_stake: Option<f64>,
}

/// Weights shared by both strategies once computed.
#[derive(Debug, Default)]
struct PreparedTickets {
    lottery_id: Option<Uuid>,
    owners_allowed: bool,
    entries: Vec<WeightedEntry>,
}

impl PreparedTickets {
    fn reset(&mut self, input: &StrategyInput<'_>) {
        self.lottery_id = Some(input.lottery_id);
        self.owners_allowed = input.owners_allowed;
        self.entries.clear();
    }

    fn emit(&mut self) -> Vec<LotteryTicket> {
        let Some(lottery_id) = self.lottery_id else {
            return Vec::new();
        };
        let owners_allowed = self.owners_allowed;

        self.entries
            .drain(..)
            .filter(|entry| owners_allowed || !entry.pool_owner)
            .map(|entry| LotteryTicket {
                delegator_id: entry.address_id,
                winning_likelyhood: entry.weight,
                pool_owner: entry.pool_owner,
                lottery_id,
                delegator_lottery_stake: entry.lottery_stake,
            })
            .collect()
    }
}

/// Every eligible delegator gets the same share.
#[derive(Debug, Default)]
pub struct FixedStrategy {
    prepared: PreparedTickets,
}

impl WeightingStrategy for FixedStrategy {
    fn prepare(&mut self, input: StrategyInput<'_>) -> Result<(), StrategyError> {
        self.prepared.reset(&input);
        input.validate()?;

        let share = 1.0 / input.eligible.len() as f64;
        self.prepared.entries = input
            .eligible
            .iter()
            .map(|delegator| WeightedEntry {
                address_id: delegator.address_id.clone(),
                pool_owner: input.pool.is_owner(&delegator.address_id),
                weight: share,
                lottery_stake: None,
            })
            .collect();

        Ok(())
    }

    fn compute_tickets(&mut self) -> Vec<LotteryTicket> {
        self.prepared.emit()
    }
}

/// Shares proportional to each delegator's mean stake over the window.
#[derive(Debug, Default)]
pub struct StakeStrategy {
    prepared: PreparedTickets,
}

impl WeightingStrategy for StakeStrategy {
    fn prepare(&mut self, input: StrategyInput<'_>) -> Result<(), StrategyError> {
        self.prepared.reset(&input);
        input.validate()?;

        let means: Vec<(&Delegator, f64)> = input
            .eligible
            .iter()
            .map(|delegator| {
                let mean = mean_delegation(delegator, &input.pool.pool_id, input.count_epochs);
                (delegator, mean)
            })
            .collect();

        let total: f64 = means.iter().map(|(_, mean)| mean).sum();
        if total <= 0.0 {
            return Err(StrategyError::ZeroTotalStake(input.lottery_id));
        }

        debug!(
            "Total mean stake {} over {} delegators for lottery {}",
            total,
            means.len(),
            input.lottery_id
        );

        self.prepared.entries = means
            .into_iter()
            .filter(|(delegator, mean)| {
                if *mean > 0.0 {
                    return true;
                }
                debug!("No stake to weight for {}", delegator.address_id);
                false
            })
            .map(|(delegator, mean)| WeightedEntry {
                address_id: delegator.address_id.clone(),
                pool_owner: input.pool.is_owner(&delegator.address_id),
                weight: mean / total,
                lottery_stake: Some(mean),
            })
            .collect();

        Ok(())
    }

    fn compute_tickets(&mut self) -> Vec<LotteryTicket> {
        self.prepared.emit()
    }
}

/// Closed set of strategies, built from a [`StrategyKind`].
#[derive(Debug)]
pub enum Strategy {
    Fixed(FixedStrategy),
    Stake(StakeStrategy),
}

impl Strategy {
    pub fn for_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Fixed => Strategy::Fixed(FixedStrategy::default()),
            StrategyKind::Stake => Strategy::Stake(StakeStrategy::default()),
        }
    }
}

impl WeightingStrategy for Strategy {
    fn prepare(&mut self, input: StrategyInput<'_>) -> Result<(), StrategyError> {
        match self {
            Strategy::Fixed(strategy) => strategy.prepare(input),
            Strategy::Stake(strategy) => strategy.prepare(input),
        }
    }

    fn compute_tickets(&mut self) -> Vec<LotteryTicket> {
        match self {
            Strategy::Fixed(strategy) => strategy.compute_tickets(),
            Strategy::Stake(strategy) => strategy.compute_tickets(),
        }
    }
}

/// Amount of the `count_epochs`-th most recent delegation to `pool_id`.
pub fn first_delegation_amount(delegator: &Delegator, pool_id: &str, count_epochs: i64) -> i64 {
    usize::try_from(count_epochs.saturating_sub(1))
        .ok()
        .and_then(|skip| delegator.delegations_to(pool_id).nth(skip))
        .map(|delegation| delegation.amount)
        .unwrap_or(0)
}

pub fn mean_delegation(delegator: &Delegator, pool_id: &str, count_epochs: i64) -> f64 {
    if count_epochs == 1 {
        return delegator.live_stake as f64;
    }

    let first_stake = first_delegation_amount(delegator, pool_id, count_epochs);
    let mean = (first_stake as f64 + delegator.live_stake as f64).abs() / count_epochs as f64;
    round_cents(mean)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Weight already-filtered delegators into tickets.
///
/// Fails with `OutOfDelegator` when nothing is left after owner exclusion.
pub fn compute_tickets(
    eligible: &[Delegator],
    params: &TicketParams<'_>,
) -> Result<Vec<LotteryTicket>, StrategyError> {
    let mut strategy = Strategy::for_kind(params.strategy_type);
    strategy.prepare(StrategyInput::new(eligible, params))?;

    let tickets = strategy.compute_tickets();
    if tickets.is_empty() {
        return Err(StrategyError::OutOfDelegator(params.lottery_id));
    }

    Ok(tickets)
}

/// Filter `delegators` with the lottery's eligibility rules, then weight them.
pub fn prepare_lottery_tickets(
    delegators: &[Delegator],
    lottery: &Lottery,
    pool: &Pool,
) -> Result<Vec<LotteryTicket>, StrategyError> {
    let rules = EligibilityRules {
        target_pool_id: &pool.pool_id,
        current_epoch: lottery.start_epoch,
        lookback_epochs: lottery.count_epochs,
        min_live_stake: lottery.min_live_stake,
    };
    let eligible = rules.filter(delegators);

    debug!(
        "{} of {} delegators eligible for lottery {}",
        eligible.len(),
        delegators.len(),
        lottery.uuid
    );

    let params = TicketParams {
        strategy_type: lottery.strategy_type,
        owners_allowed: lottery.owners_allowed,
        lottery_id: lottery.uuid,
        pool,
        count_epochs: lottery.count_epochs,
    };
    compute_tickets(&eligible, &params)
}
