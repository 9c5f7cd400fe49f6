//! # Batch Fetcher
//!
//! Issues one indexer request per target with a ceiling on how many are
//! in flight, and hands every outcome back tagged with its target id.
//!
//! ## Flow
//!
//! ```text
//! targets ─► acquire permit ─► GET ─► saturated? ─► sleep ─► release
//!    │          (FIFO)                   │
//!    │                                   └─ no ──────────────► release
//!    ▼
//! join_all ─► Vec<Tagged<Value>>  (input order, each with its id)
//! ```
//!
//! Requests are futures polled on the caller's task; nothing is spawned.
//! The permit is a guard held for the lifetime of one request, so it is
//! released on success, failure and timeout alike.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::transport::{FetchError, IndexerTransport};

/// Outcome of one request, correlated to the target it was made for.
#[derive(Debug, Clone)]
pub struct Tagged<T> {
    pub id: String,
    pub result: Result<T, FetchError>,
}

impl<T> Tagged<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> Result<U, FetchError>) -> Tagged<U> {
        Tagged {
            id: self.id,
            result: self.result.and_then(f),
        }
    }
}

#[derive(Clone)]
pub struct BatchFetcher {
    transport: Arc<dyn IndexerTransport>,
    saturation_backoff: Duration,
}

impl BatchFetcher {
    pub fn new(transport: Arc<dyn IndexerTransport>, saturation_backoff: Duration) -> Self {
        Self {
            transport,
            saturation_backoff,
        }
    }

    pub fn transport(&self) -> &Arc<dyn IndexerTransport> {
        &self.transport
    }

    /// Fetch `path_for(target)` for every target, at most `ceiling` at once.
    ///
    /// Never fails as a whole: each target carries its own result.
    pub async fn fetch_all<F>(
        &self,
        targets: &[String],
        ceiling: usize,
        path_for: F,
        query: &[(&str, String)],
    ) -> Vec<Tagged<Value>>
    where
        F: Fn(&str) -> String,
    {
        let permits = Semaphore::new(ceiling.max(1));
        let permits = &permits;

        let requests = targets.iter().enumerate().map(|(n, id)| {
            let path = path_for(id.as_str());
            async move {
                let result = match permits.acquire().await {
                    Ok(_permit) => {
                        debug!("Making request {} ({})", n + 1, path);
                        let result = self.transport.get_json(&path, query).await;

                        if permits.available_permits() == 0 {
                            info!("Concurrency limit reached, waiting ...");
                            tokio::time::sleep(self.saturation_backoff).await;
                        }
                        result
                    }
                    Err(e) => Err(FetchError::Transport(e.to_string())),
                };

                Tagged {
                    id: id.clone(),
                    result,
                }
            }
        });

        join_all(requests).await
    }
}

/// Keep the successes keyed by target id; log a skip for every failure.
pub fn split_outcomes<T>(outcomes: Vec<Tagged<T>>, what: &str) -> HashMap<String, T> {
    let total = outcomes.len();
    let mut found = HashMap::with_capacity(total);

    for outcome in outcomes {
        match outcome.result {
            Ok(value) => {
                found.insert(outcome.id, value);
            }
            Err(e) if e.is_not_found() => debug!("No {} for {}", what, outcome.id),
            Err(e) => warn!("Skipping {} for {}: {}", what, outcome.id, e),
        }
    }

    if found.len() < total {
        info!("{} of {} {} fetched", found.len(), total, what);
    }

    found
}
