//! # Pool Catalog Service
//!
//! Keeps the stored pool catalogue in sync with the indexer and answers
//! pool searches from the database only.

use std::sync::Arc;

use tracing::info;

use crate::cardano::{ChainDataProvider, ChainError};
use crate::db::{DatabaseError, PoolRepository};
use crate::domain::Pool;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Chain data error: {0}")]
    Chain(#[from] ChainError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Clone)]
pub struct PoolCatalog {
    pools: Arc<dyn PoolRepository>,
    chain: Arc<dyn ChainDataProvider>,
}

impl PoolCatalog {
    pub fn new(pools: Arc<dyn PoolRepository>, chain: Arc<dyn ChainDataProvider>) -> Self {
        Self { pools, chain }
    }

    /// Fetch the pools the catalogue does not know yet and store them.
    ///
    /// Returns how many pools were added.
    pub async fn add_pools(&self) -> Result<usize, CatalogError> {
        let known = self.pools.list().await?;
        info!("{} pools already stored, fetching new ones", known.len());

        let fetched = self.chain.get_all_pools(&known).await?;
        if fetched.is_empty() {
            info!("No new pool to store");
            return Ok(0);
        }

        let added = self.pools.add_multiple(&fetched).await?;
        info!("{} new pools stored", added);
        Ok(added)
    }

    /// Stored pools matching `filter` by exact id, ticker or name.
    pub async fn search_pool(&self, filter: &str) -> Result<Vec<Pool>, CatalogError> {
        let pools = self.pools.list().await?;
        Ok(pools.into_iter().filter(|pool| pool.matches(filter)).collect())
    }

    pub async fn count(&self) -> Result<usize, CatalogError> {
        Ok(self.pools.list().await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardano::fake_chain::FakeChain;
    use crate::db::memory::MemoryStore;
    use crate::domain::models::fixtures::*;

    fn other_pool() -> Pool {
        let mut pool = Pool::new(OTHER_POOL_ID, "ea90b56d");
        pool.ticker = Some("OTHR".to_string());
        pool.name = Some("Other Stake Pool".to_string());
        pool
    }

    #[tokio::test]
    async fn test_add_pools_only_stores_unknown() {
        let store = Arc::new(MemoryStore::with_pools([hippo_pool()]));
        let chain = Arc::new(FakeChain::default().with_pools(vec![hippo_pool(), other_pool()]));
        let catalog = PoolCatalog::new(store, chain);

        assert_eq!(catalog.add_pools().await.unwrap(), 1);
        assert_eq!(catalog.count().await.unwrap(), 2);
        assert_eq!(catalog.add_pools().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_pool() {
        let store = Arc::new(MemoryStore::with_pools([hippo_pool(), other_pool()]));
        let catalog = PoolCatalog::new(store, Arc::new(FakeChain::default()));

        let by_ticker = catalog.search_pool("hippo").await.unwrap();
        assert_eq!(by_ticker.len(), 1);
        assert_eq!(by_ticker[0].pool_id, HIPPO_POOL_ID);

        let by_name = catalog.search_pool("stake pool").await.unwrap();
        assert_eq!(by_name[0].pool_id, OTHER_POOL_ID);

        assert_eq!(catalog.search_pool(OTHER_POOL_ID).await.unwrap().len(), 1);
        assert!(catalog.search_pool("nothing").await.unwrap().is_empty());
    }
}
