//! # Repositories
//!
//! Async storage traits the services depend on, implemented on
//! [`Database`] for PostgreSQL. Tests use the in-memory store instead.
//!
//! | Repository | Key | Not found |
//! |------------|-----|-----------|
//! | `PoolRepository` | `pool_id` | `DatabaseError::NotFound` |
//! | `DelegatorRepository` | `address_id` | `DatabaseError::NotFound` |
//! | `LotteryRepository` | `uuid` | `DatabaseError::NotFound` |

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use super::models::{DelegatorRecord, LotteryRows, PoolOwnerRecord, PoolRecord};
use super::{queries, Database, DatabaseError};
use crate::domain::{Delegator, Lottery, Pool};

/// Most lotteries returned by a listing.
const LOTTERY_LIST_LIMIT: i64 = 100;

#[async_trait]
pub trait PoolRepository: Send + Sync {
    /// Insert or refresh pools; returns how many were written.
    async fn add_multiple(&self, pools: &[Pool]) -> Result<usize, DatabaseError>;

    async fn get(&self, pool_id: &str) -> Result<Pool, DatabaseError>;

    async fn list(&self) -> Result<Vec<Pool>, DatabaseError>;
}

#[async_trait]
pub trait DelegatorRepository: Send + Sync {
    /// Store live stakes and merge histories into what is already known.
    async fn add_multiple(&self, delegators: &[Delegator]) -> Result<(), DatabaseError>;

    async fn get(&self, address_id: &str) -> Result<Delegator, DatabaseError>;
}

#[async_trait]
pub trait LotteryRepository: Send + Sync {
    /// Store a lottery with its tickets and winners atomically.
    ///
    /// Fails with `AlreadyExists` if the uuid is taken.
    async fn add(&self, lottery: &Lottery) -> Result<(), DatabaseError>;

    async fn get(&self, uuid: Uuid) -> Result<Lottery, DatabaseError>;

    async fn list(&self) -> Result<Vec<Lottery>, DatabaseError>;
}

/// Liveness of the storage backend.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn is_healthy(&self) -> bool;
}

#[async_trait]
impl StoreHealth for Database {
    async fn is_healthy(&self) -> bool {
        self.ping().await
    }
}

fn group_by<K, T>(items: Vec<T>, key: impl Fn(&T) -> K) -> HashMap<K, Vec<T>>
where
    K: std::hash::Hash + Eq,
{
    let mut grouped: HashMap<K, Vec<T>> = HashMap::new();
    for item in items {
        grouped.entry(key(&item)).or_default().push(item);
    }
    grouped
}

#[async_trait]
impl PoolRepository for Database {
    async fn add_multiple(&self, pools: &[Pool]) -> Result<usize, DatabaseError> {
        let records: Vec<PoolRecord> = pools.iter().map(PoolRecord::from).collect();
        let owners: Vec<PoolOwnerRecord> = pools
            .iter()
            .flat_map(|pool| &pool.owners)
            .map(|owner| PoolOwnerRecord {
                pool_id: owner.pool_id.clone(),
                address_id: owner.address_id.clone(),
            })
            .collect();

        queries::upsert_pools(self.pool(), &records, &owners).await
    }

    async fn get(&self, pool_id: &str) -> Result<Pool, DatabaseError> {
        let record = queries::get_pool(self.pool(), pool_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("pool {}", pool_id)))?;
        let owners = queries::get_pool_owners(self.pool(), pool_id).await?;

        Ok(record.into_pool(owners))
    }

    async fn list(&self) -> Result<Vec<Pool>, DatabaseError> {
        let records = queries::list_pools(self.pool()).await?;
        let mut owners = group_by(queries::list_pool_owners(self.pool()).await?, |owner| {
            owner.pool_id.clone()
        });

        Ok(records
            .into_iter()
            .map(|record| {
                let pool_owners = owners.remove(&record.pool_id).unwrap_or_default();
                record.into_pool(pool_owners)
            })
            .collect())
    }
}

#[async_trait]
impl DelegatorRepository for Database {
    async fn add_multiple(&self, delegators: &[Delegator]) -> Result<(), DatabaseError> {
        let (records, histories): (Vec<_>, Vec<_>) = delegators
            .iter()
            .map(DelegatorRecord::from_delegator)
            .unzip();
        let delegations: Vec<_> = histories.into_iter().flatten().collect();

        queries::upsert_delegators(self.pool(), &records, &delegations).await
    }

    async fn get(&self, address_id: &str) -> Result<Delegator, DatabaseError> {
        let record = queries::get_delegator(self.pool(), address_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("delegator {}", address_id)))?;
        let history = queries::get_delegations(self.pool(), address_id).await?;

        Ok(record.into_delegator(history))
    }
}

#[async_trait]
impl LotteryRepository for Database {
    async fn add(&self, lottery: &Lottery) -> Result<(), DatabaseError> {
        let rows = LotteryRows::try_from(lottery)?;
        queries::insert_lottery(self.pool(), &rows).await
    }

    async fn get(&self, uuid: Uuid) -> Result<Lottery, DatabaseError> {
        let rows = queries::get_lottery(self.pool(), uuid)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("lottery {}", uuid)))?;

        Lottery::try_from(rows)
    }

    async fn list(&self) -> Result<Vec<Lottery>, DatabaseError> {
        let ids = queries::list_lottery_ids(self.pool(), LOTTERY_LIST_LIMIT).await?;

        let mut lotteries = Vec::with_capacity(ids.len());
        for uuid in ids {
            lotteries.push(LotteryRepository::get(self, uuid).await?);
        }
        Ok(lotteries)
    }
}
