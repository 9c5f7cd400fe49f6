//! # Blockfrost Chain Data Provider
//!
//! Reads pools, delegators and delegation histories from the Blockfrost
//! Cardano indexer.
//!
//! ## Endpoints
//!
//! | Endpoint | Used for | Batched |
//! |----------|----------|---------|
//! | `GET /pools` | pool catalogue (paged) | no |
//! | `GET /pools/{id}/metadata` | ticker, name, url | yes, metadata ceiling |
//! | `GET /pools/{id}` | declared owners | yes, metadata ceiling |
//! | `GET /pools/{id}/delegators` | live stake per address (paged) | no |
//! | `GET /accounts/{addr}/history` | delegation per epoch | yes, history ceiling |
//! | `GET /health` | liveness | no |
//!
//! Lovelace amounts arrive as decimal strings and are parsed to `i64`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::batch::{split_outcomes, BatchFetcher};
use super::transport::{FetchError, IndexerTransport};
use crate::config::AppConfig;
use crate::domain::{Delegation, Delegator, Pool};

/// Page size used when walking paged endpoints.
const PAGE_SIZE: usize = 100;

/// Most recent history entries fetched per account.
const HISTORY_DEPTH: usize = 50;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("The maximum numbers of delegators has been reached: {count} > {max} - {pool_id}")]
    MaxPoolDelegators {
        pool_id: String,
        count: usize,
        max: usize,
    },

    #[error("Indexer request failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Chain data the lottery workflow depends on.
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    /// Pools not in `known_pools`, with metadata and owners.
    async fn get_all_pools(&self, known_pools: &[Pool]) -> Result<Vec<Pool>, ChainError>;

    /// Current delegators of a pool with their live stake.
    async fn get_pool_delegators(&self, pool_id: &str) -> Result<Vec<Delegator>, ChainError>;

    /// The same delegators with their delegation history attached.
    ///
    /// Delegators whose history could not be fetched are left out.
    async fn get_delegators_history(
        &self,
        delegators: Vec<Delegator>,
    ) -> Result<Vec<Delegator>, ChainError>;

    async fn is_healthy(&self) -> bool;
}

/// Limits applied by the Blockfrost client.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub max_delegators_allowed: usize,
    pub history_concurrency: usize,
    pub metadata_concurrency: usize,
}

impl From<&AppConfig> for FetchLimits {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_delegators_allowed: config.max_delegators_allowed,
            history_concurrency: config.history_concurrency,
            metadata_concurrency: config.metadata_concurrency,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PoolMetadataDto {
    pool_id: Option<String>,
    hex: Option<String>,
    url: Option<String>,
    ticker: Option<String>,
    name: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PoolDetailsDto {
    #[serde(default)]
    owners: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PoolDelegatorDto {
    address: String,
    live_stake: String,
}

#[derive(Debug, Deserialize)]
struct AccountHistoryDto {
    active_epoch: Option<i64>,
    amount: String,
    pool_id: String,
}

#[derive(Debug, Deserialize)]
struct HealthDto {
    is_healthy: bool,
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, FetchError> {
    serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))
}

fn lovelace(amount: &str) -> Result<i64, FetchError> {
    amount
        .parse()
        .map_err(|_| FetchError::Decode(format!("invalid lovelace amount: {}", amount)))
}

/// Blockfrost-backed [`ChainDataProvider`].
#[derive(Clone)]
pub struct BlockfrostClient {
    fetcher: BatchFetcher,
    limits: FetchLimits,
}

impl BlockfrostClient {
    pub fn new(fetcher: BatchFetcher, limits: FetchLimits) -> Self {
        Self { fetcher, limits }
    }

    fn transport(&self) -> &Arc<dyn IndexerTransport> {
        self.fetcher.transport()
    }

    /// Walk a paged list endpoint until a short page.
    ///
    /// Stops early with the items gathered so far once more than `limit`
    /// have been collected.
    async fn gather_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        limit: Option<usize>,
    ) -> Result<Vec<T>, FetchError> {
        let mut items = Vec::new();

        for page in 1.. {
            let query = [("page", page.to_string()), ("count", PAGE_SIZE.to_string())];
            let body = self.transport().get_json(path, &query).await?;
            let batch: Vec<T> = decode(body)?;
            let len = batch.len();
            items.extend(batch);

            debug!("{}: page {} returned {} items", path, page, len);

            if len < PAGE_SIZE || limit.is_some_and(|max| items.len() > max) {
                break;
            }
        }

        Ok(items)
    }

    /// Metadata for each pool id; pools without registered metadata are skipped.
    async fn fetch_metadata(&self, pool_ids: &[String]) -> Vec<Pool> {
        let outcomes = self
            .fetcher
            .fetch_all(
                pool_ids,
                self.limits.metadata_concurrency,
                |id| format!("pools/{}/metadata", id),
                &[],
            )
            .await
            .into_iter()
            .map(|tagged| tagged.map(decode::<PoolMetadataDto>))
            .collect();

        let mut found = split_outcomes(outcomes, "pool metadata");
        info!("{} pools metadata found", found.len());

        pool_ids
            .iter()
            .filter_map(|id| {
                let metadata = found.remove(id)?;
                let Some(pool_id) = metadata.pool_id else {
                    info!("No metadata for this pool: {}", id);
                    return None;
                };

                let mut pool = Pool::new(pool_id, metadata.hex.unwrap_or_default());
                pool.url = metadata.url;
                pool.ticker = metadata.ticker;
                pool.name = metadata.name;
                pool.description = metadata.description;
                pool.updated_at = Utc::now();
                Some(pool)
            })
            .collect()
    }

    /// Attach owners; a pool whose owners could not be read is dropped.
    async fn attach_owners(&self, pools: Vec<Pool>) -> Vec<Pool> {
        let ids: Vec<String> = pools.iter().map(|pool| pool.pool_id.clone()).collect();
        let outcomes = self
            .fetcher
            .fetch_all(
                &ids,
                self.limits.metadata_concurrency,
                |id| format!("pools/{}", id),
                &[],
            )
            .await
            .into_iter()
            .map(|tagged| tagged.map(decode::<PoolDetailsDto>))
            .collect();

        let mut owners = split_outcomes(outcomes, "pool owners");

        pools
            .into_iter()
            .filter_map(|mut pool| {
                let details = owners.remove(&pool.pool_id)?;
                for owner in details.owners {
                    pool.add_owner(owner);
                }
                Some(pool)
            })
            .collect()
    }
}

#[async_trait]
impl ChainDataProvider for BlockfrostClient {
    async fn get_all_pools(&self, known_pools: &[Pool]) -> Result<Vec<Pool>, ChainError> {
        let listed: Vec<String> = self.gather_pages("pools", None).await?;
        let known: HashSet<&str> = known_pools.iter().map(|pool| pool.pool_id.as_str()).collect();

        let fresh: Vec<String> = listed
            .iter()
            .filter(|id| !known.contains(id.as_str()))
            .cloned()
            .collect();
        info!("{} pools already encoded", listed.len() - fresh.len());

        let pools = self.fetch_metadata(&fresh).await;
        let pools = self.attach_owners(pools).await;

        info!("{} new pools fetched", pools.len());
        Ok(pools)
    }

    async fn get_pool_delegators(&self, pool_id: &str) -> Result<Vec<Delegator>, ChainError> {
        let max = self.limits.max_delegators_allowed;
        let listed: Vec<PoolDelegatorDto> = self
            .gather_pages(&format!("pools/{}/delegators", pool_id), Some(max))
            .await?;

        if listed.len() > max {
            return Err(ChainError::MaxPoolDelegators {
                pool_id: pool_id.to_string(),
                count: listed.len(),
                max,
            });
        }

        let mut seen = HashSet::with_capacity(listed.len());
        let mut delegators = Vec::with_capacity(listed.len());
        for dto in listed {
            if !seen.insert(dto.address.clone()) {
                debug!("{} listed twice for pool {}", dto.address, pool_id);
                continue;
            }
            delegators.push(Delegator::new(dto.address, lovelace(&dto.live_stake)?));
        }

        Ok(delegators)
    }

    async fn get_delegators_history(
        &self,
        delegators: Vec<Delegator>,
    ) -> Result<Vec<Delegator>, ChainError> {
        let addresses: Vec<String> = delegators.iter().map(|d| d.address_id.clone()).collect();
        let query = [("count", HISTORY_DEPTH.to_string()), ("order", "desc".to_string())];

        let outcomes = self
            .fetcher
            .fetch_all(
                &addresses,
                self.limits.history_concurrency,
                |address| format!("accounts/{}/history", address),
                &query,
            )
            .await
            .into_iter()
            .map(|tagged| {
                tagged.map(|body| {
                    decode::<Vec<AccountHistoryDto>>(body)?
                        .into_iter()
                        .map(|entry| -> Result<Delegation, FetchError> {
                            let amount = lovelace(&entry.amount)?;
                            Ok(Delegation::new(entry.pool_id, amount, entry.active_epoch))
                        })
                        .collect::<Result<Vec<_>, _>>()
                })
            })
            .collect();

        let mut histories = split_outcomes(outcomes, "delegation history");

        let hydrated: Vec<Delegator> = delegators
            .into_iter()
            .filter_map(|delegator| {
                let history = histories.remove(&delegator.address_id)?;
                Some(delegator.with_history(history))
            })
            .collect();

        info!("{} of {} delegation histories hydrated", hydrated.len(), addresses.len());
        Ok(hydrated)
    }

    async fn is_healthy(&self) -> bool {
        match self.transport().get_json("health", &[]).await.and_then(decode::<HealthDto>) {
            Ok(health) => health.is_healthy,
            Err(e) => {
                warn!("Indexer health check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardano::transport::fake::FakeTransport;
    use crate::domain::models::fixtures::*;
    use serde_json::json;
    use std::time::Duration;

    fn client(transport: FakeTransport, max_delegators_allowed: usize) -> BlockfrostClient {
        let fetcher = BatchFetcher::new(Arc::new(transport), Duration::from_millis(1));
        BlockfrostClient::new(
            fetcher,
            FetchLimits {
                max_delegators_allowed,
                history_concurrency: 25,
                metadata_concurrency: 10,
            },
        )
    }

    fn hippo_metadata() -> Value {
        json!({
            "pool_id": HIPPO_POOL_ID,
            "hex": "718f15efee599d498a7582c4f56a940cfebffc14e850656db8d529e1",
            "url": "https://hippo-pool.com/",
            "hash": "47c0c68cb57f4a5b4a87bad896fc274678e7aea98e200fa14a1cb40c0cab1d8c",
            "ticker": "HIPPO",
            "name": "Hippo Pool",
            "description": "Come in, Relax and Earn a max",
            "homepage": "https://hippo-pool.com/"
        })
    }

    #[tokio::test]
    async fn test_get_all_pools_skips_known_and_metadata_less() {
        let known = "pool1known";
        let bare = "pool1bare";
        let transport = FakeTransport::default()
            .with("pools", json!([known, HIPPO_POOL_ID, bare]))
            .with(format!("pools/{}/metadata", HIPPO_POOL_ID), hippo_metadata())
            .with(format!("pools/{}/metadata", bare), json!({}))
            .with(
                format!("pools/{}", HIPPO_POOL_ID),
                json!({ "pool_id": HIPPO_POOL_ID, "owners": [OWNER_A, OWNER_B] }),
            );
        let client = client(transport, 3000);

        let pools = client.get_all_pools(&[Pool::new(known, "00")]).await.unwrap();

        assert_eq!(pools.len(), 1);
        let pool = &pools[0];
        assert_eq!(pool.pool_id, HIPPO_POOL_ID);
        assert_eq!(pool.ticker.as_deref(), Some("HIPPO"));
        assert!(pool.is_owner(OWNER_A));
        assert!(pool.is_owner(OWNER_B));
    }

    #[tokio::test]
    async fn test_pool_without_owner_details_is_dropped() {
        let transport = FakeTransport::default()
            .with("pools", json!([HIPPO_POOL_ID]))
            .with(format!("pools/{}/metadata", HIPPO_POOL_ID), hippo_metadata());
        let client = client(transport, 3000);

        assert!(client.get_all_pools(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_pool_delegators() {
        let transport = FakeTransport::default().with(
            format!("pools/{}/delegators", HIPPO_POOL_ID),
            json!([
                { "address": OWNER_A, "live_stake": "1137959159981411" },
                { "address": PLAIN_DELEGATOR, "live_stake": "16958865648" }
            ]),
        );
        let client = client(transport, 3000);

        let delegators = client.get_pool_delegators(HIPPO_POOL_ID).await.unwrap();

        assert_eq!(delegators.len(), 2);
        assert_eq!(delegators[0].live_stake, 1_137_959_159_981_411);
        assert_eq!(delegators[1].address_id, PLAIN_DELEGATOR);
    }

    #[tokio::test]
    async fn test_address_listed_twice_is_kept_once() {
        let transport = FakeTransport::default().with(
            format!("pools/{}/delegators", HIPPO_POOL_ID),
            json!([
                { "address": PLAIN_DELEGATOR, "live_stake": "500" },
                { "address": OWNER_A, "live_stake": "42" },
                { "address": PLAIN_DELEGATOR, "live_stake": "700" }
            ]),
        );
        let client = client(transport, 3000);

        let delegators = client.get_pool_delegators(HIPPO_POOL_ID).await.unwrap();

        let addresses: Vec<&str> = delegators.iter().map(|d| d.address_id.as_str()).collect();
        assert_eq!(addresses, vec![PLAIN_DELEGATOR, OWNER_A]);
        assert_eq!(delegators[0].live_stake, 500);
    }

    #[tokio::test]
    async fn test_too_many_delegators() {
        let transport = FakeTransport::default().with(
            format!("pools/{}/delegators", HIPPO_POOL_ID),
            json!([
                { "address": OWNER_A, "live_stake": "1" },
                { "address": OWNER_B, "live_stake": "1" },
                { "address": PLAIN_DELEGATOR, "live_stake": "1" }
            ]),
        );
        let client = client(transport, 2);

        let err = client.get_pool_delegators(HIPPO_POOL_ID).await.unwrap_err();
        assert_eq!(
            err,
            ChainError::MaxPoolDelegators {
                pool_id: HIPPO_POOL_ID.to_string(),
                count: 3,
                max: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_pool_delegators_is_fetch_error() {
        let client = client(FakeTransport::default(), 3000);
        let err = client.get_pool_delegators("pool1missing").await.unwrap_err();
        assert!(matches!(err, ChainError::Fetch(e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_history_hydration_drops_failed_accounts() {
        let transport = FakeTransport::default()
            .with(
                format!("accounts/{}/history", OWNER_A),
                json!([
                    { "active_epoch": 308, "amount": "1000", "pool_id": HIPPO_POOL_ID },
                    { "active_epoch": 307, "amount": "400000", "pool_id": OTHER_POOL_ID },
                    { "active_epoch": 305, "amount": "300000", "pool_id": HIPPO_POOL_ID }
                ]),
            )
            .failing(
                format!("accounts/{}/history", OWNER_B),
                FetchError::Status { status: 500, path: "accounts".to_string() },
            );
        let client = client(transport, 3000);

        let delegators = vec![Delegator::new(OWNER_A, 1000), Delegator::new(OWNER_B, 5000)];
        let hydrated = client.get_delegators_history(delegators).await.unwrap();

        assert_eq!(hydrated.len(), 1);
        assert_eq!(hydrated[0].address_id, OWNER_A);
        assert_eq!(hydrated[0].delegation_history.len(), 3);
        let latest = hydrated[0].delegation_history.iter().next_back().unwrap();
        assert_eq!(latest.epoch_no, Some(308));
    }

    #[tokio::test]
    async fn test_health() {
        let healthy = client(FakeTransport::default().with("health", json!({ "is_healthy": true })), 1);
        assert!(healthy.is_healthy().await);

        let unreachable = client(FakeTransport::default(), 1);
        assert!(!unreachable.is_healthy().await);
    }

    #[test]
    fn test_lovelace_parse() {
        assert_eq!(lovelace("16958865648"), Ok(16_958_865_648));
        assert!(lovelace("12.5").is_err());
    }
}
