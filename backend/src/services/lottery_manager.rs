//! # Lottery Manager Service
//!
//! Runs the lottery creation workflow and serves stored lotteries.
//!
//! ## Flow: Create Lottery
//!
//! ```text
//! 1. Validate draw date, strategy name, epoch count   (no I/O yet)
//!                ↓
//! 2. Load the pool and its owners from the database
//!                ↓
//! 3. Fetch the pool's delegators from the indexer
//!                ↓
//! 4. Stake strategy only: hydrate delegation histories
//!                ↓
//! 5. Filter, weight and draw                          (synchronous)
//!                ↓
//! 6. Store delegator snapshots, then the lottery in one transaction
//! ```
//!
//! Any error before step 6 leaves nothing stored for the lottery.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cardano::{ChainDataProvider, ChainError};
use crate::db::{DatabaseError, DelegatorRepository, LotteryRepository, PoolRepository};
use crate::domain::{
    prepare_lottery_tickets, raffle_draw, Delegator, Lottery, LotteryParams, Pool, StrategyError,
    StrategyKind,
};
use crate::utils::{parse_draw_date, truncate_string};

/// Errors surfaced by lottery operations.
#[derive(Debug, thiserror::Error)]
pub enum LotteryError {
    /// No delegator left to hold a ticket.
    #[error("Out of delegator for lottery {0}")]
    OutOfDelegator(Uuid),

    /// Epoch count below one.
    #[error("Count epochs should be >= 1, got {0}")]
    OutOfEpoch(i64),

    /// Pool population above the configured ceiling.
    #[error("Pool {pool_id} has {count} delegators, the maximum allowed is {max}")]
    MaxPoolDelegators {
        pool_id: String,
        count: usize,
        max: usize,
    },

    #[error("The draw date format is not correct: {0}")]
    InvalidDrawDate(String),

    #[error("Unknown lottery strategy: {0}")]
    UnknownStrategy(String),

    /// Parameters that are well-formed but inconsistent.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unexpected failure while computing or drawing; the cause is logged.
    #[error("The lottery couldn't be created")]
    InvalidLottery,

    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("Lottery not found: {0}")]
    LotteryNotFound(String),

    #[error("Delegator not found: {0}")]
    DelegatorNotFound(String),

    #[error("Chain data error: {0}")]
    Chain(ChainError),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<ChainError> for LotteryError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::MaxPoolDelegators {
                pool_id,
                count,
                max,
            } => LotteryError::MaxPoolDelegators {
                pool_id,
                count,
                max,
            },
            other => LotteryError::Chain(other),
        }
    }
}

impl From<DatabaseError> for LotteryError {
    fn from(e: DatabaseError) -> Self {
        LotteryError::Database(e)
    }
}

/// Parameters of a lottery creation, as received from a client.
#[derive(Debug, Clone)]
pub struct CreateLotteryCommand {
    pub pool_id: String,
    pub name: String,
    pub start_epoch: i64,
    pub end_epoch: i64,
    pub count_epochs: i64,
    pub draw_date: String,
    pub strategy_name: String,
    pub owners_allowed: bool,
    pub min_live_stake: i64,
}

/// Lottery workflow over the chain indexer and the repositories.
///
/// ## Usage
///
/// ```rust,ignore
/// let manager = LotteryManager::new(pools, delegators, lotteries, chain);
/// let lottery = manager.create_lottery(command).await?;
/// println!("{} winners", lottery.winners.len());
/// ```
#[derive(Clone)]
pub struct LotteryManager {
    pools: Arc<dyn PoolRepository>,
    delegators: Arc<dyn DelegatorRepository>,
    lotteries: Arc<dyn LotteryRepository>,
    chain: Arc<dyn ChainDataProvider>,
}

impl LotteryManager {
    pub fn new(
        pools: Arc<dyn PoolRepository>,
        delegators: Arc<dyn DelegatorRepository>,
        lotteries: Arc<dyn LotteryRepository>,
        chain: Arc<dyn ChainDataProvider>,
    ) -> Self {
        Self {
            pools,
            delegators,
            lotteries,
            chain,
        }
    }

    /// Create, draw and store a lottery.
    pub async fn create_lottery(&self, command: CreateLotteryCommand) -> Result<Lottery, LotteryError> {
        self.create_lottery_with_id(Uuid::new_v4(), command).await
    }

    /// Same as [`create_lottery`](Self::create_lottery) with a caller-chosen id.
    pub async fn create_lottery_with_id(
        &self,
        uuid: Uuid,
        command: CreateLotteryCommand,
    ) -> Result<Lottery, LotteryError> {
        info!(
            "Start new lottery: {} - {} - {}",
            command.name, command.pool_id, command.strategy_name
        );

        let params = validate(command)?;
        let strategy_type = params.strategy_type;
        let pool_id = params.pool_id.clone();

        let pool = self.pools.get(&pool_id).await.map_err(|e| match e {
            DatabaseError::NotFound(_) => LotteryError::PoolNotFound(pool_id.clone()),
            other => LotteryError::Database(other),
        })?;
        info!(
            "Get pool {} - {} - for lottery: {}",
            truncate_string(&pool_id, 24),
            pool.name.as_deref().unwrap_or("unnamed"),
            uuid
        );

        let mut delegators = self.chain.get_pool_delegators(&pool_id).await?;
        info!("{} delegators for lottery: {}", delegators.len(), uuid);

        if strategy_type.needs_history() {
            info!("Get delegators history for lottery: {}", uuid);
            delegators = self.chain.get_delegators_history(delegators).await?;
        }

        let mut lottery = Lottery::new(uuid, params, Utc::now());
        draw(&mut lottery, &delegators, &pool)?;
        info!("{} winners for lottery: {}", lottery.winners.len(), uuid);

        self.store_snapshot(&delegators).await;
        self.lotteries.add(&lottery).await?;

        Ok(lottery)
    }

    /// Keep the delegators a lottery was computed from.
    ///
    /// The lottery itself does not depend on this write.
    async fn store_snapshot(&self, delegators: &[Delegator]) {
        if let Err(e) = self.delegators.add_multiple(delegators).await {
            warn!("Could not store {} delegators: {}", delegators.len(), e);
        }
    }

    /// Load a stored lottery by its id.
    pub async fn get_lottery(&self, lottery_id: &str) -> Result<Lottery, LotteryError> {
        let uuid = Uuid::parse_str(lottery_id.trim())
            .map_err(|_| LotteryError::LotteryNotFound(lottery_id.to_string()))?;

        self.lotteries.get(uuid).await.map_err(|e| match e {
            DatabaseError::NotFound(_) => LotteryError::LotteryNotFound(lottery_id.to_string()),
            other => LotteryError::Database(other),
        })
    }

    pub async fn list_lotteries(&self) -> Result<Vec<Lottery>, LotteryError> {
        Ok(self.lotteries.list().await?)
    }

    /// Load a stored delegator snapshot.
    pub async fn get_delegator(&self, address_id: &str) -> Result<Delegator, LotteryError> {
        self.delegators.get(address_id).await.map_err(|e| match e {
            DatabaseError::NotFound(_) => LotteryError::DelegatorNotFound(address_id.to_string()),
            other => LotteryError::Database(other),
        })
    }
}

/// Checks that need no I/O, in the order errors are reported.
fn validate(command: CreateLotteryCommand) -> Result<LotteryParams, LotteryError> {
    let draw_date = parse_draw_date(&command.draw_date).map_err(|e| {
        debug!("{}", e);
        LotteryError::InvalidDrawDate(command.draw_date.clone())
    })?;

    let strategy_type: StrategyKind = command
        .strategy_name
        .parse()
        .map_err(|_| LotteryError::UnknownStrategy(command.strategy_name.clone()))?;

    if command.count_epochs < 1 {
        return Err(LotteryError::OutOfEpoch(command.count_epochs));
    }
    if command.start_epoch < 0 {
        return Err(LotteryError::InvalidInput(format!(
            "start epoch cannot be negative, got {}",
            command.start_epoch
        )));
    }
    if command.end_epoch < command.start_epoch {
        return Err(LotteryError::InvalidInput(format!(
            "end epoch {} is before start epoch {}",
            command.end_epoch, command.start_epoch
        )));
    }
    if command.min_live_stake < 0 {
        return Err(LotteryError::InvalidInput(
            "minimum live stake cannot be negative".to_string(),
        ));
    }

    Ok(LotteryParams {
        pool_id: command.pool_id,
        name: command.name,
        start_epoch: command.start_epoch,
        end_epoch: command.end_epoch,
        count_epochs: command.count_epochs,
        draw_date,
        strategy_type,
        owners_allowed: command.owners_allowed,
        min_live_stake: command.min_live_stake,
    })
}

/// Compute tickets and winners for `lottery`.
fn draw(lottery: &mut Lottery, delegators: &[Delegator], pool: &Pool) -> Result<(), LotteryError> {
    let uuid = lottery.uuid;

    info!("Prepare lottery tickets - for lottery: {}", uuid);
    let tickets = prepare_lottery_tickets(delegators, lottery, pool).map_err(|e| match e {
        StrategyError::OutOfDelegator(uuid) => LotteryError::OutOfDelegator(uuid),
        StrategyError::OutOfEpoch { count_epochs, .. } => LotteryError::OutOfEpoch(count_epochs),
        StrategyError::UnknownStrategy(name) => LotteryError::UnknownStrategy(name),
        other => {
            error!("Ticket computation failed for lottery {}: {}", uuid, other);
            LotteryError::InvalidLottery
        }
    })?;
    lottery.tickets = tickets;

    info!("Winners draw - for lottery: {}", uuid);
    raffle_draw(lottery)
        .and_then(|winners| lottery.record_winners(winners))
        .map_err(|e| {
            error!("Draw failed for lottery {}: {}", uuid, e);
            LotteryError::InvalidLottery
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardano::fake_chain::FakeChain;
    use crate::db::memory::MemoryStore;
    use crate::domain::models::fixtures::*;

    fn manager(chain: Arc<FakeChain>, store: Arc<MemoryStore>) -> LotteryManager {
        LotteryManager::new(store.clone(), store.clone(), store, chain)
    }

    fn command(strategy_name: &str, count_epochs: i64) -> CreateLotteryCommand {
        CreateLotteryCommand {
            pool_id: HIPPO_POOL_ID.to_string(),
            name: "Test lottery 1".to_string(),
            start_epoch: 306,
            end_epoch: 308,
            count_epochs,
            draw_date: "2022-02-02T10:00:00".to_string(),
            strategy_name: strategy_name.to_string(),
            owners_allowed: true,
            min_live_stake: 0,
        }
    }

    fn hippo_delegators() -> Vec<Delegator> {
        vec![
            Delegator::new(OWNER_A, 1000),
            Delegator::new(OWNER_B, 1000),
            Delegator::new(PLAIN_DELEGATOR, 1000),
        ]
    }

    fn lottery_id() -> Uuid {
        Uuid::parse_str(LOTTERY_ID).unwrap()
    }

    #[tokio::test]
    async fn test_create_fixed_lottery() {
        let chain = Arc::new(FakeChain::with_delegators(hippo_delegators()));
        let store = Arc::new(MemoryStore::with_pools([hippo_pool()]));
        let manager = manager(chain.clone(), store.clone());

        let lottery = manager
            .create_lottery_with_id(lottery_id(), command("Fixed", 1))
            .await
            .unwrap();

        assert_eq!(lottery.tickets.len(), 3);
        let total: f64 = lottery.tickets.iter().map(|t| t.winning_likelyhood).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(lottery.winners.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(chain.calls(), (1, 0));

        let stored = manager.get_lottery(LOTTERY_ID).await.unwrap();
        assert_eq!(stored.winners, lottery.winners);
        assert!(manager.get_delegator(PLAIN_DELEGATOR).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_stake_lottery() {
        let histories = [(OWNER_A, 100_000), (OWNER_B, 500_000)]
            .into_iter()
            .map(|(address, amount)| {
                let delegator = delegator_with_history(address, amount);
                (address.to_string(), delegator.delegation_history.into_iter().collect())
            })
            .collect();
        let chain = Arc::new(
            FakeChain::with_delegators(vec![Delegator::new(OWNER_A, 1000), Delegator::new(OWNER_B, 1000)])
                .with_histories(histories),
        );
        let store = Arc::new(MemoryStore::with_pools([hippo_pool()]));

        let lottery = manager(chain.clone(), store)
            .create_lottery_with_id(lottery_id(), command("Stake", 2))
            .await
            .unwrap();

        assert_eq!(chain.calls(), (1, 1));
        assert!((lottery.tickets[0].winning_likelyhood - 0.3003992015968064).abs() < 1e-12);
        assert!((lottery.tickets[1].winning_likelyhood - 0.6996007984031936).abs() < 1e-12);
        assert_eq!(lottery.winners.len(), 2);
    }

    #[tokio::test]
    async fn test_same_id_same_ranking() {
        let chain = Arc::new(FakeChain::with_delegators(hippo_delegators()));

        let first = manager(chain.clone(), Arc::new(MemoryStore::with_pools([hippo_pool()])))
            .create_lottery_with_id(lottery_id(), command("Fixed", 1))
            .await
            .unwrap();
        let second = manager(chain, Arc::new(MemoryStore::with_pools([hippo_pool()])))
            .create_lottery_with_id(lottery_id(), command("Fixed", 1))
            .await
            .unwrap();

        assert_eq!(first.winners, second.winners);
    }

    #[tokio::test]
    async fn test_validation_fails_before_any_fetch() {
        let chain = Arc::new(FakeChain::with_delegators(hippo_delegators()));
        let store = Arc::new(MemoryStore::with_pools([hippo_pool()]));
        let manager = manager(chain.clone(), store.clone());

        let mut bad_date = command("Fixed", 1);
        bad_date.draw_date = "next friday".to_string();
        assert!(matches!(
            manager.create_lottery(bad_date).await,
            Err(LotteryError::InvalidDrawDate(_))
        ));

        assert!(matches!(
            manager.create_lottery(command("Lucky", 1)).await,
            Err(LotteryError::UnknownStrategy(name)) if name == "Lucky"
        ));

        assert!(matches!(
            manager.create_lottery(command("Stake", 0)).await,
            Err(LotteryError::OutOfEpoch(0))
        ));

        assert_eq!(chain.calls(), (0, 0));
        assert_eq!(store.lottery_count().await, 0);
    }

    #[tokio::test]
    async fn test_negative_start_epoch_is_rejected() {
        let chain = Arc::new(FakeChain::with_delegators(vec![Delegator::new(PLAIN_DELEGATOR, 1000)]));
        let store = Arc::new(MemoryStore::with_pools([hippo_pool()]));
        let manager = manager(chain.clone(), store.clone());

        for start_epoch in [i64::MIN, -1] {
            let mut command = command("Fixed", 1);
            command.start_epoch = start_epoch;

            assert!(matches!(
                manager.create_lottery(command).await,
                Err(LotteryError::InvalidInput(_))
            ));
        }
        assert_eq!(chain.calls(), (0, 0));

        let mut wide_window = command("Fixed", i64::MAX);
        wide_window.start_epoch = 0;
        wide_window.end_epoch = 0;
        let lottery = manager.create_lottery(wide_window).await.unwrap();
        assert_eq!(lottery.tickets.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicated_listing_entry_gets_one_ticket() {
        let chain = Arc::new(FakeChain::with_delegators(vec![
            Delegator::new(PLAIN_DELEGATOR, 1000),
            Delegator::new(PLAIN_DELEGATOR, 1000),
            Delegator::new(OWNER_A, 1000),
        ]));
        let store = Arc::new(MemoryStore::with_pools([hippo_pool()]));

        let lottery = manager(chain, store)
            .create_lottery_with_id(lottery_id(), command("Fixed", 1))
            .await
            .unwrap();

        assert_eq!(lottery.tickets.len(), 2);
        assert_eq!(lottery.winners.len(), 2);
        assert!(lottery.tickets.iter().all(|t| (t.winning_likelyhood - 0.5).abs() < 1e-12));
        let winners: std::collections::HashSet<_> = lottery
            .ranked_winners()
            .map(|w| w.delegator_address_id.as_str())
            .collect();
        assert_eq!(winners.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_pool() {
        let chain = Arc::new(FakeChain::default());
        let manager = manager(chain.clone(), Arc::new(MemoryStore::default()));

        let result = manager.create_lottery(command("Fixed", 1)).await;
        assert!(matches!(result, Err(LotteryError::PoolNotFound(_))));
        assert_eq!(chain.calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_too_many_delegators_stores_nothing() {
        let chain = Arc::new(FakeChain::with_delegators(hippo_delegators()).with_max_delegators(2));
        let store = Arc::new(MemoryStore::with_pools([hippo_pool()]));

        let result = manager(chain, store.clone()).create_lottery(command("Fixed", 1)).await;

        assert!(matches!(result, Err(LotteryError::MaxPoolDelegators { count: 3, max: 2, .. })));
        assert_eq!(store.lottery_count().await, 0);
    }

    #[tokio::test]
    async fn test_only_owners_when_owners_disallowed() {
        let chain = Arc::new(FakeChain::with_delegators(vec![
            Delegator::new(OWNER_A, 1000),
            Delegator::new(OWNER_B, 1000),
        ]));
        let store = Arc::new(MemoryStore::with_pools([hippo_pool()]));
        let mut command = command("Fixed", 1);
        command.owners_allowed = false;

        let result = manager(chain, store.clone()).create_lottery(command).await;

        assert!(matches!(result, Err(LotteryError::OutOfDelegator(_))));
        assert_eq!(store.lottery_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let chain = Arc::new(FakeChain::default());
        let store = Arc::new(MemoryStore::with_pools([hippo_pool()]));

        let result = manager(chain, store).create_lottery(command("Stake", 2)).await;
        assert!(matches!(result, Err(LotteryError::OutOfDelegator(_))));
    }

    #[tokio::test]
    async fn test_duplicate_lottery_id_is_rejected() {
        let chain = Arc::new(FakeChain::with_delegators(hippo_delegators()));
        let manager = manager(chain, Arc::new(MemoryStore::with_pools([hippo_pool()])));

        manager.create_lottery_with_id(lottery_id(), command("Fixed", 1)).await.unwrap();
        let again = manager.create_lottery_with_id(lottery_id(), command("Fixed", 1)).await;

        assert!(matches!(again, Err(LotteryError::Database(DatabaseError::AlreadyExists(_)))));
    }

    #[tokio::test]
    async fn test_get_unknown_lottery() {
        let manager = manager(Arc::new(FakeChain::default()), Arc::new(MemoryStore::default()));

        assert!(matches!(
            manager.get_lottery("not-a-uuid").await,
            Err(LotteryError::LotteryNotFound(_))
        ));
        assert!(matches!(
            manager.get_lottery(LOTTERY_ID).await,
            Err(LotteryError::LotteryNotFound(_))
        ));
        assert!(matches!(
            manager.get_delegator(OWNER_A).await,
            Err(LotteryError::DelegatorNotFound(_))
        ));
    }
}
