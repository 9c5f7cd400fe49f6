//! Scripted chain data for service and API tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::blockfrost::{ChainDataProvider, ChainError};
use crate::domain::{Delegation, Delegator, Pool};

#[derive(Default)]
pub struct FakeChain {
    /// Pools the indexer knows about.
    pub pools: Vec<Pool>,
    /// Delegators returned for any pool.
    pub delegators: Vec<Delegator>,
    /// Histories by stake address; delegators without one are dropped.
    pub histories: HashMap<String, Vec<Delegation>>,
    pub max_delegators: Option<usize>,
    pub healthy: bool,
    delegator_calls: AtomicUsize,
    history_calls: AtomicUsize,
}

impl FakeChain {
    pub fn with_delegators(delegators: Vec<Delegator>) -> Self {
        Self {
            delegators,
            healthy: true,
            ..Default::default()
        }
    }

    pub fn with_pools(mut self, pools: Vec<Pool>) -> Self {
        self.pools = pools;
        self
    }

    pub fn with_histories(mut self, histories: HashMap<String, Vec<Delegation>>) -> Self {
        self.histories = histories;
        self
    }

    pub fn with_max_delegators(mut self, max: usize) -> Self {
        self.max_delegators = Some(max);
        self
    }

    /// Calls made to `(get_pool_delegators, get_delegators_history)`.
    pub fn calls(&self) -> (usize, usize) {
        (
            self.delegator_calls.load(Ordering::SeqCst),
            self.history_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl ChainDataProvider for FakeChain {
    async fn get_all_pools(&self, known_pools: &[Pool]) -> Result<Vec<Pool>, ChainError> {
        Ok(self
            .pools
            .iter()
            .filter(|pool| !known_pools.contains(pool))
            .cloned()
            .collect())
    }

    async fn get_pool_delegators(&self, pool_id: &str) -> Result<Vec<Delegator>, ChainError> {
        self.delegator_calls.fetch_add(1, Ordering::SeqCst);
        match self.max_delegators {
            Some(max) if self.delegators.len() > max => Err(ChainError::MaxPoolDelegators {
                pool_id: pool_id.to_string(),
                count: self.delegators.len(),
                max,
            }),
            _ => Ok(self.delegators.clone()),
        }
    }

    async fn get_delegators_history(
        &self,
        delegators: Vec<Delegator>,
    ) -> Result<Vec<Delegator>, ChainError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        Ok(delegators
            .into_iter()
            .filter_map(|delegator| {
                let history = self.histories.get(&delegator.address_id)?.clone();
                Some(delegator.with_history(history))
            })
            .collect())
    }

    async fn is_healthy(&self) -> bool {
        self.healthy
    }
}
