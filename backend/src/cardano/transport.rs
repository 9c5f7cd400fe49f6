//! # Indexer Transport
//!
//! One JSON GET against the chain indexer, with retries.
//!
//! ## Retry Policy
//!
//! | Outcome | Action |
//! |---------|--------|
//! | 2xx | decode JSON and return |
//! | 429, 5xx, connection error, timeout | retry with backoff |
//! | any other status | fail this request only |
//!
//! Backoff doubles from 200ms: 200ms, 400ms, 800ms...
//!
//! The [`IndexerTransport`] trait is the seam the batch fetcher and the
//! Blockfrost client are written against, so tests can swap the network
//! for an in-process fake.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::AppConfig;

const INITIAL_DELAY_MS: u64 = 200;

/// Failure of a single indexer request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("Unexpected status {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) | FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            FetchError::Decode(_) => false,
        }
    }

    /// The indexer answers 404 for unknown pools and addresses.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status { status: 404, .. })
    }
}

#[async_trait]
pub trait IndexerTransport: Send + Sync {
    /// GET `path` (relative to the indexer base URL) and decode the body.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, FetchError>;
}

/// Blockfrost over HTTPS.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    max_retries: u32,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("spo-lottery-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        info!("Indexer transport initialized:");
        info!("  URL: {}", config.blockfrost_api_url);
        info!("  Retries: {}", config.fetch_retries);

        Ok(Self {
            client,
            base_url: config.blockfrost_api_url.clone(),
            project_id: config.blockfrost_project_id.clone(),
            max_retries: config.fetch_retries,
            request_timeout: config.request_timeout,
        })
    }

    async fn get_once(&self, path: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("project_id", &self.project_id)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl IndexerTransport for HttpTransport {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        for attempt in 0..=self.max_retries {
            let failure = match timeout(self.request_timeout, self.get_once(path, query)).await {
                Ok(Ok(body)) => {
                    if attempt > 0 {
                        info!("Request {} succeeded after {} retries", path, attempt);
                    }
                    return Ok(body);
                }
                Ok(Err(e)) if !e.is_transient() => return Err(e),
                Ok(Err(e)) => e,
                Err(_) => FetchError::Timeout { attempts: attempt + 1 },
            };

            if attempt == self.max_retries {
                warn!(
                    "Request {} failed after {} attempts: {}",
                    path,
                    attempt + 1,
                    failure
                );
                return Err(failure);
            }

            let delay_ms = INITIAL_DELAY_MS << attempt.min(10);
            debug!(
                "Request {} failed (attempt {}): {}. Retrying in {}ms...",
                path,
                attempt + 1,
                failure,
                delay_ms
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        Err(FetchError::Timeout {
            attempts: self.max_retries + 1,
        })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-process indexer used by the fetcher and service tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Serves canned JSON bodies keyed by path.
    ///
    /// Unknown paths answer 404. Responses to paths listed in `delays`
    /// are held back, so later requests can finish first.
    #[derive(Default)]
    pub struct FakeTransport {
        pub responses: HashMap<String, Result<Value, FetchError>>,
        pub delays: HashMap<String, Duration>,
        pub calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl FakeTransport {
        pub fn with(mut self, path: impl Into<String>, body: Value) -> Self {
            self.responses.insert(path.into(), Ok(body));
            self
        }

        pub fn failing(mut self, path: impl Into<String>, error: FetchError) -> Self {
            self.responses.insert(path.into(), Err(error));
            self
        }

        pub fn delayed(mut self, path: impl Into<String>, delay: Duration) -> Self {
            self.delays.insert(path.into(), delay);
            self
        }

        pub fn peak_in_flight(&self) -> usize {
            self.peak_in_flight.load(Ordering::SeqCst)
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl IndexerTransport for FakeTransport {
        async fn get_json(&self, path: &str, _query: &[(&str, String)]) -> Result<Value, FetchError> {
            self.calls.lock().unwrap().push(path.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays.get(path).copied().unwrap_or(Duration::from_millis(1));
            tokio::time::sleep(delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.responses.get(path).cloned().unwrap_or_else(|| {
                Err(FetchError::Status {
                    status: 404,
                    path: path.to_string(),
                })
            })
        }
    }
}
