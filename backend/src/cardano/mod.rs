//! # Cardano Chain Data
//!
//! Everything that talks to the chain indexer.
//!
//! ## Layers
//!
//! ```text
//! ┌──────────────────────┐
//! │  BlockfrostClient    │  pools, delegators, histories (ChainDataProvider)
//! ├──────────────────────┤
//! │  BatchFetcher        │  bounded concurrency, id-tagged outcomes
//! ├──────────────────────┤
//! │  IndexerTransport    │  one GET, timeout, retries
//! └──────────────────────┘
//! ```

pub mod batch;
pub mod blockfrost;
pub mod transport;

#[cfg(test)]
pub mod fake_chain;

pub use batch::BatchFetcher;
pub use blockfrost::{BlockfrostClient, ChainDataProvider, ChainError, FetchLimits};
pub use transport::HttpTransport;
