//! In-memory repositories for service and API tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::{DelegatorRepository, LotteryRepository, PoolRepository, StoreHealth};
use super::DatabaseError;
use crate::domain::{Delegator, Lottery, Pool};

#[derive(Default)]
pub struct MemoryStore {
    pools: RwLock<BTreeMap<String, Pool>>,
    delegators: RwLock<BTreeMap<String, Delegator>>,
    lotteries: RwLock<HashMap<Uuid, Lottery>>,
}

impl MemoryStore {
    pub fn with_pools(pools: impl IntoIterator<Item = Pool>) -> Self {
        let pools = pools
            .into_iter()
            .map(|pool| (pool.pool_id.clone(), pool))
            .collect();

        Self {
            pools: RwLock::new(pools),
            ..Default::default()
        }
    }

    pub async fn lottery_count(&self) -> usize {
        self.lotteries.read().await.len()
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn is_healthy(&self) -> bool {
        true
    }
}

#[async_trait]
impl PoolRepository for MemoryStore {
    async fn add_multiple(&self, pools: &[Pool]) -> Result<usize, DatabaseError> {
        let mut stored = self.pools.write().await;
        for pool in pools {
            stored.insert(pool.pool_id.clone(), pool.clone());
        }
        Ok(pools.len())
    }

    async fn get(&self, pool_id: &str) -> Result<Pool, DatabaseError> {
        self.pools
            .read()
            .await
            .get(pool_id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("pool {}", pool_id)))
    }

    async fn list(&self) -> Result<Vec<Pool>, DatabaseError> {
        Ok(self.pools.read().await.values().cloned().collect())
    }
}

#[async_trait]
impl DelegatorRepository for MemoryStore {
    async fn add_multiple(&self, delegators: &[Delegator]) -> Result<(), DatabaseError> {
        let mut stored = self.delegators.write().await;
        for delegator in delegators {
            stored
                .entry(delegator.address_id.clone())
                .and_modify(|known| {
                    known.live_stake = delegator.live_stake;
                    known
                        .delegation_history
                        .extend(delegator.delegation_history.iter().cloned());
                })
                .or_insert_with(|| delegator.clone());
        }
        Ok(())
    }

    async fn get(&self, address_id: &str) -> Result<Delegator, DatabaseError> {
        self.delegators
            .read()
            .await
            .get(address_id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("delegator {}", address_id)))
    }
}

#[async_trait]
impl LotteryRepository for MemoryStore {
    async fn add(&self, lottery: &Lottery) -> Result<(), DatabaseError> {
        let mut stored = self.lotteries.write().await;
        if stored.contains_key(&lottery.uuid) {
            return Err(DatabaseError::AlreadyExists(format!("lottery {}", lottery.uuid)));
        }
        stored.insert(lottery.uuid, lottery.clone());
        Ok(())
    }

    async fn get(&self, uuid: Uuid) -> Result<Lottery, DatabaseError> {
        self.lotteries
            .read()
            .await
            .get(&uuid)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("lottery {}", uuid)))
    }

    async fn list(&self) -> Result<Vec<Lottery>, DatabaseError> {
        let mut lotteries: Vec<Lottery> = self.lotteries.read().await.values().cloned().collect();
        lotteries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(lotteries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::fixtures::*;
    use crate::domain::{Delegation, StrategyKind};

    #[tokio::test]
    async fn test_missing_records_are_not_found() {
        let store = MemoryStore::default();

        assert!(matches!(PoolRepository::get(&store, "pool1x").await, Err(DatabaseError::NotFound(_))));
        assert!(matches!(DelegatorRepository::get(&store, OWNER_A).await, Err(DatabaseError::NotFound(_))));
        assert!(matches!(
            LotteryRepository::get(&store, Uuid::nil()).await,
            Err(DatabaseError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lottery_uuid_is_unique() {
        let store = MemoryStore::default();
        let lottery = lottery(StrategyKind::Fixed);

        LotteryRepository::add(&store, &lottery).await.unwrap();
        assert!(matches!(
            LotteryRepository::add(&store, &lottery).await,
            Err(DatabaseError::AlreadyExists(_))
        ));
        assert_eq!(store.lottery_count().await, 1);
    }

    #[tokio::test]
    async fn test_delegator_history_is_merged() {
        let store = MemoryStore::default();
        let first = Delegator::new(OWNER_A, 10).with_history([Delegation::new(HIPPO_POOL_ID, 10, Some(300))]);
        let second = Delegator::new(OWNER_A, 20).with_history([Delegation::new(HIPPO_POOL_ID, 20, Some(301))]);

        DelegatorRepository::add_multiple(&store, &[first]).await.unwrap();
        DelegatorRepository::add_multiple(&store, &[second]).await.unwrap();

        let stored = DelegatorRepository::get(&store, OWNER_A).await.unwrap();
        assert_eq!(stored.live_stake, 20);
        assert_eq!(stored.delegation_history.len(), 2);
    }
}
