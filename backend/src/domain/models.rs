//! # Domain Models
//!
//! The entities a lottery is built from. Pools and delegators come from
//! the chain indexer; tickets and winners are computed by the engine and
//! owned by their [`Lottery`].
//!
//! ## Relationship Diagram
//!
//! ```text
//! ┌─────────────┐  owners   ┌─────────────┐
//! │    Pool     │──────────<│  PoolOwner  │
//! │ pool_id(PK) │           └─────────────┘
//! └─────────────┘
//!        ▲ referenced by id
//! ┌──────┴──────┐  tickets  ┌───────────────┐
//! │   Lottery   │──────────<│ LotteryTicket │
//! │  uuid (PK)  │  winners  ├───────────────┤
//! │             │──────────<│ LotteryWinner │
//! └─────────────┘           └───────────────┘
//!
//! ┌──────────────┐  history  ┌─────────────┐
//! │  Delegator   │──────────<│ Delegation  │
//! │address_id(PK)│           └─────────────┘
//! └──────────────┘
//! ```
//!
//! ## Amounts
//!
//! Every stake amount is in lovelace (1 ADA = 1,000,000 lovelace) and
//! stored as `i64` because PostgreSQL has no unsigned integers.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::draw::DrawError;
use super::strategy::StrategyKind;

/// One epoch of a stake address's delegation.
///
/// Ordered by epoch. A delegation without an epoch sorts after every
/// other one: absence of an epoch is treated as the largest epoch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Delegation {
    /// Bech32 pool id the stake was delegated to.
    pub pool_id: String,

    /// Active stake in lovelace for that epoch.
    pub amount: i64,

    /// Epoch in which the delegation was active.
    pub epoch_no: Option<i64>,
}

impl Delegation {
    pub fn new(pool_id: impl Into<String>, amount: i64, epoch_no: Option<i64>) -> Self {
        Self {
            pool_id: pool_id.into(),
            amount,
            epoch_no,
        }
    }

    /// Whether the delegation was active inside `[min_epoch, max_epoch]`.
    pub fn is_within(&self, min_epoch: i64, max_epoch: i64) -> bool {
        matches!(self.epoch_no, Some(epoch) if (min_epoch..=max_epoch).contains(&epoch))
    }
}

impl Ord for Delegation {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_epoch = match (self.epoch_no, other.epoch_no) {
            (Some(a), Some(b)) => a.cmp(&b),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
        };

        by_epoch
            .then_with(|| self.pool_id.cmp(&other.pool_id))
            .then_with(|| self.amount.cmp(&other.amount))
    }
}

impl PartialOrd for Delegation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A stake address delegating to one or more pools.
///
/// Identity is the address alone: two `Delegator` values with the same
/// `address_id` are equal whatever their stake or history.
///
/// The history is a set, so identical `(pool_id, amount, epoch_no)`
/// entries returned twice by the indexer collapse into one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delegator {
    /// Bech32 stake address (`stake1...`).
    pub address_id: String,

    /// Currently active stake in lovelace.
    pub live_stake: i64,

    /// Delegations ordered from oldest to most recent epoch.
    pub delegation_history: BTreeSet<Delegation>,
}

impl Delegator {
    pub fn new(address_id: impl Into<String>, live_stake: i64) -> Self {
        Self {
            address_id: address_id.into(),
            live_stake,
            delegation_history: BTreeSet::new(),
        }
    }

    pub fn with_history(mut self, history: impl IntoIterator<Item = Delegation>) -> Self {
        self.delegation_history.extend(history);
        self
    }

    /// Delegations to `pool_id`, most recent first.
    pub fn delegations_to<'a>(&'a self, pool_id: &'a str) -> impl Iterator<Item = &'a Delegation> {
        self.delegation_history
            .iter()
            .rev()
            .filter(move |delegation| delegation.pool_id == pool_id)
    }
}

impl PartialEq for Delegator {
    fn eq(&self, other: &Self) -> bool {
        self.address_id == other.address_id
    }
}

impl Eq for Delegator {}

impl Hash for Delegator {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address_id.hash(state);
    }
}

/// A reward-account owner declared in a pool's registration certificate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PoolOwner {
    pub pool_id: String,
    pub address_id: String,
}

/// A registered stake pool with its off-chain metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    /// Bech32 pool id (`pool1...`).
    pub pool_id: String,

    /// Hex encoded pool id.
    pub hex: String,

    /// Metadata URL.
    pub url: Option<String>,

    pub ticker: Option<String>,

    pub name: Option<String>,

    pub description: Option<String>,

    /// When this record was fetched from the indexer.
    pub updated_at: DateTime<Utc>,

    pub owners: BTreeSet<PoolOwner>,
}

impl Pool {
    pub fn new(pool_id: impl Into<String>, hex: impl Into<String>) -> Self {
        Self {
            pool_id: pool_id.into(),
            hex: hex.into(),
            url: None,
            ticker: None,
            name: None,
            description: None,
            updated_at: Utc::now(),
            owners: BTreeSet::new(),
        }
    }

    pub fn add_owner(&mut self, address_id: impl Into<String>) {
        self.owners.insert(PoolOwner {
            pool_id: self.pool_id.clone(),
            address_id: address_id.into(),
        });
    }

    /// Whether `address_id` is one of the pool's declared owners.
    pub fn is_owner(&self, address_id: &str) -> bool {
        self.owners.iter().any(|owner| owner.address_id == address_id)
    }

    /// Match a search filter against the pool.
    ///
    /// A filter matches on the exact pool id, or as a case-insensitive
    /// substring of the ticker or the name.
    pub fn matches(&self, filter: &str) -> bool {
        if filter == self.pool_id {
            return true;
        }

        let needle = filter.to_lowercase();
        [&self.ticker, &self.name]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

impl PartialEq for Pool {
    fn eq(&self, other: &Self) -> bool {
        self.pool_id == other.pool_id
    }
}

impl Eq for Pool {}

impl Hash for Pool {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pool_id.hash(state);
    }
}

/// A delegator's entry in one lottery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotteryTicket {
    /// Stake address holding the ticket.
    pub delegator_id: String,

    /// Probability of being drawn first, in `(0, 1]`.
    pub winning_likelyhood: f64,

    /// Whether the holder is an owner of the lottery's pool.
    pub pool_owner: bool,

    pub lottery_id: Uuid,

    /// Mean stake used for weighting (stake-weighted lotteries only).
    pub delegator_lottery_stake: Option<f64>,
}

/// A ranked draw result. Rank 0 is the first delegator drawn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LotteryWinner {
    pub delegator_address_id: String,
    pub rank: u32,
}

/// Parameters a lottery is created with.
#[derive(Debug, Clone)]
pub struct LotteryParams {
    pub pool_id: String,
    pub name: String,
    pub start_epoch: i64,
    pub end_epoch: i64,
    pub count_epochs: i64,
    pub draw_date: DateTime<Utc>,
    pub strategy_type: StrategyKind,
    pub owners_allowed: bool,
    pub min_live_stake: i64,
}

/// A promotional lottery over one pool's delegators.
///
/// ## Lifecycle
///
/// ```text
/// Lottery::new()          tickets = [], winners = {}
///        ↓
/// strategy tickets        tickets populated
///        ↓
/// record_winners()        winners populated exactly once
///        ↓
/// draw_date passes        result becomes publishable
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lottery {
    pub uuid: Uuid,
    pub pool_id: String,
    pub name: String,
    pub start_epoch: i64,
    pub end_epoch: i64,

    /// Loyalty lookback and stake averaging window, in epochs.
    pub count_epochs: i64,

    /// When the result becomes public.
    pub draw_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub strategy_type: StrategyKind,
    pub owners_allowed: bool,

    /// Live stake must be strictly above this to take part.
    pub min_live_stake: i64,

    pub tickets: Vec<LotteryTicket>,

    /// Winners keyed by rank.
    pub winners: BTreeMap<u32, LotteryWinner>,
}

impl Lottery {
    pub fn new(uuid: Uuid, params: LotteryParams, created_at: DateTime<Utc>) -> Self {
        Self {
            uuid,
            pool_id: params.pool_id,
            name: params.name,
            start_epoch: params.start_epoch,
            end_epoch: params.end_epoch,
            count_epochs: params.count_epochs,
            draw_date: params.draw_date,
            created_at,
            strategy_type: params.strategy_type,
            owners_allowed: params.owners_allowed,
            min_live_stake: params.min_live_stake,
            tickets: Vec::new(),
            winners: BTreeMap::new(),
        }
    }

    /// Whether the draw result may be published at `now`.
    ///
    /// Only wall-clock time matters: winners computed at creation stay
    /// hidden until `draw_date`.
    pub fn is_result_available_at(&self, now: DateTime<Utc>) -> bool {
        self.draw_date <= now
    }

    /// Store the draw result. A lottery is drawn at most once.
    pub fn record_winners(&mut self, winners: Vec<LotteryWinner>) -> Result<(), DrawError> {
        if !self.winners.is_empty() {
            return Err(DrawError::AlreadyDrawn(self.uuid));
        }

        for winner in winners {
            let rank = winner.rank;
            if self.winners.insert(rank, winner).is_some() {
                self.winners.clear();
                return Err(DrawError::DuplicateRank(rank));
            }
        }

        Ok(())
    }

    /// Winners in rank order.
    pub fn ranked_winners(&self) -> impl Iterator<Item = &LotteryWinner> {
        self.winners.values()
    }
}

impl PartialEq for Lottery {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for Lottery {}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_delegation_without_epoch_sorts_last() {
        let set: BTreeSet<Delegation> = [
            Delegation::new(HIPPO_POOL_ID, 10, None),
            Delegation::new(HIPPO_POOL_ID, 10, Some(400)),
            Delegation::new(HIPPO_POOL_ID, 10, Some(12)),
        ]
        .into_iter()
        .collect();

        let epochs: Vec<_> = set.iter().map(|d| d.epoch_no).collect();
        assert_eq!(epochs, vec![Some(12), Some(400), None]);
    }

    #[test]
    fn test_duplicate_delegations_collapse() {
        let delegator = Delegator::new(OWNER_A, 0).with_history([
            Delegation::new(HIPPO_POOL_ID, 5, Some(300)),
            Delegation::new(HIPPO_POOL_ID, 5, Some(300)),
            Delegation::new(HIPPO_POOL_ID, 6, Some(300)),
        ]);

        assert_eq!(delegator.delegation_history.len(), 2);
    }

    #[test]
    fn test_delegator_identity_is_address() {
        let a = Delegator::new(OWNER_A, 1);
        let b = delegator_with_history(OWNER_A, 500);
        assert_eq!(a, b);
        assert_ne!(a, Delegator::new(OWNER_B, 1));
    }

    #[test]
    fn test_delegations_to_pool_most_recent_first() {
        let delegator = delegator_with_history(OWNER_A, 0);
        let epochs: Vec<_> = delegator
            .delegations_to(HIPPO_POOL_ID)
            .map(|d| d.epoch_no)
            .collect();
        assert_eq!(epochs, vec![Some(308), Some(305), Some(300)]);
    }

    #[test]
    fn test_pool_matches_filter() {
        let pool = hippo_pool();

        assert!(pool.matches("Hippo"));
        assert!(!pool.matches("Hippo1"));
        assert!(pool.matches("HIPPO"));
        assert!(pool.matches(HIPPO_POOL_ID));
        assert!(!pool.matches("pool1wx83tmlwtxw5nzn4stz02655pnltllq5apgx2mdc6557zw0r781"));
    }

    #[test]
    fn test_pool_owner_lookup_is_exact() {
        let pool = hippo_pool();
        assert!(pool.is_owner(OWNER_A));
        assert!(!pool.is_owner(&OWNER_A[..20]));
        assert!(!pool.is_owner(PLAIN_DELEGATOR));
    }

    #[test]
    fn test_result_not_available_before_draw_date() {
        let mut lottery = lottery_with_tickets();
        lottery.draw_date = Utc::now() + Duration::days(7);
        assert!(!lottery.is_result_available_at(Utc::now()));
    }

    #[test]
    fn test_result_available_after_draw_date() {
        let mut lottery = lottery_with_tickets();
        lottery.draw_date = Utc::now() - Duration::minutes(1);
        assert!(lottery.is_result_available_at(Utc::now()));
    }

    #[test]
    fn test_winners_recorded_once() {
        let mut lottery = lottery_with_tickets();
        let winners = vec![
            LotteryWinner { delegator_address_id: OWNER_A.to_string(), rank: 0 },
            LotteryWinner { delegator_address_id: OWNER_B.to_string(), rank: 1 },
        ];

        lottery.record_winners(winners.clone()).unwrap();
        assert!(matches!(
            lottery.record_winners(winners),
            Err(DrawError::AlreadyDrawn(_))
        ));
        assert_eq!(lottery.winners.len(), 2);
    }

    #[test]
    fn test_duplicate_rank_rejected() {
        let mut lottery = lottery_with_tickets();
        let winners = vec![
            LotteryWinner { delegator_address_id: OWNER_A.to_string(), rank: 0 },
            LotteryWinner { delegator_address_id: OWNER_B.to_string(), rank: 0 },
        ];

        assert!(matches!(
            lottery.record_winners(winners),
            Err(DrawError::DuplicateRank(0))
        ));
        assert!(lottery.winners.is_empty());
    }
}
