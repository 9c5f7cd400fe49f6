//! # Lottery Domain
//!
//! Pure, synchronous lottery logic. Nothing here touches the network or
//! the database.
//!
//! ```text
//! delegators ──► eligibility ──► strategy ──► draw ──► ranked winners
//! ```
//!
//! - `models`: pools, delegators, lotteries, tickets and winners
//! - `eligibility`: loyalty and live-stake predicates
//! - `strategy`: Fixed and Stake weighting
//! - `draw`: seeded weighted sampling without replacement

pub mod draw;
pub mod eligibility;
pub mod models;
pub mod strategy;

pub use draw::raffle_draw;
pub use models::*;
pub use strategy::{prepare_lottery_tickets, StrategyError, StrategyKind};
