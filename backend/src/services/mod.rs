//! # Services Module
//!
//! This module contains the business logic services of the lottery
//! backend. Each service handles a specific domain.
//!
//! ## Services Overview
//!
//! | Service | Responsibility |
//! |---------|---------------|
//! | `LotteryManager` | Lottery creation, draw, lookups |
//! | `PoolCatalog` | Pool catalogue sync and search |
//!
//! ## Service Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SERVICES LAYER                            │
//! │                                                                  │
//! │  ┌──────────────────────────────┐  ┌─────────────────────────┐  │
//! │  │        LotteryManager         │  │       PoolCatalog        │  │
//! │  │  • create_lottery()           │  │  • add_pools()           │  │
//! │  │  • get_lottery()              │  │  • search_pool()         │  │
//! │  │  • get_delegator()            │  │                          │  │
//! │  └──────────────────────────────┘  └─────────────────────────┘  │
//! │         │                │                     │                 │
//! │         ▼                ▼                     ▼                 │
//! │  ┌────────────┐   ┌─────────────┐      ┌─────────────┐          │
//! │  │   domain   │   │ Repositories│      │ ChainData   │          │
//! │  │ filter,    │   │ (Postgres)  │      │ Provider    │          │
//! │  │ weight,    │   │             │      │ (Blockfrost)│          │
//! │  │ draw       │   │             │      │             │          │
//! │  └────────────┘   └─────────────┘      └─────────────┘          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod lottery_manager;
pub mod pool_catalog;

pub use lottery_manager::{CreateLotteryCommand, LotteryError, LotteryManager};
pub use pool_catalog::{CatalogError, PoolCatalog};
