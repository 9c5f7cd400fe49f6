//! # Database Models
//!
//! Row structs for each table, and their conversion to and from the
//! domain types.
//!
//! ## Table Overview
//!
//! | Table | Description |
//! |-------|-------------|
//! | `pools` | Pool catalogue with metadata |
//! | `pool_owners` | Declared owners per pool |
//! | `delegators` | Last known live stake per address |
//! | `delegations` | Delegation history per address |
//! | `lotteries` | Lottery parameters |
//! | `lottery_tickets` | Tickets, in emission order |
//! | `lottery_winners` | Draw result, one row per rank |
//!
//! ## Relationship Diagram
//!
//! ```text
//! ┌─────────────┐       ┌──────────────────┐
//! │   pools     │──────<│   pool_owners    │
//! │ pool_id(PK) │       └──────────────────┘
//! └─────────────┘
//!        │
//!        ▼
//! ┌─────────────┐       ┌──────────────────┐
//! │  lotteries  │──────<│ lottery_tickets  │
//! │  uuid (PK)  │       └──────────────────┘
//! │             │       ┌──────────────────┐
//! │             │──────<│ lottery_winners  │
//! └─────────────┘       └──────────────────┘
//!
//! ┌──────────────┐      ┌──────────────────┐
//! │  delegators  │─────<│   delegations    │
//! └──────────────┘      └──────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DatabaseError;
use crate::domain::{
    Delegation, Delegator, Lottery, LotteryTicket, LotteryWinner, Pool, StrategyKind,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRecord {
    pub pool_id: String,
    pub hex: String,
    pub url: Option<String>,
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolOwnerRecord {
    pub pool_id: String,
    pub address_id: String,
}

impl PoolRecord {
    pub fn into_pool(self, owners: impl IntoIterator<Item = PoolOwnerRecord>) -> Pool {
        let mut pool = Pool::new(self.pool_id, self.hex);
        pool.url = self.url;
        pool.ticker = self.ticker;
        pool.name = self.name;
        pool.description = self.description;
        pool.updated_at = self.updated_at;
        for owner in owners {
            pool.add_owner(owner.address_id);
        }
        pool
    }
}

impl From<&Pool> for PoolRecord {
    fn from(pool: &Pool) -> Self {
        Self {
            pool_id: pool.pool_id.clone(),
            hex: pool.hex.clone(),
            url: pool.url.clone(),
            ticker: pool.ticker.clone(),
            name: pool.name.clone(),
            description: pool.description.clone(),
            updated_at: pool.updated_at,
        }
    }
}

/// Live stake snapshot of a stake address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegatorRecord {
    pub address_id: String,
    pub live_stake: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRecord {
    pub address_id: String,
    pub pool_id: String,
    pub amount: i64,
    pub epoch_no: Option<i64>,
}

impl DelegatorRecord {
    pub fn into_delegator(self, history: impl IntoIterator<Item = DelegationRecord>) -> Delegator {
        Delegator::new(self.address_id, self.live_stake).with_history(
            history
                .into_iter()
                .map(|record| Delegation::new(record.pool_id, record.amount, record.epoch_no)),
        )
    }

    /// Split a delegator into its row and its history rows.
    pub fn from_delegator(delegator: &Delegator) -> (Self, Vec<DelegationRecord>) {
        let record = Self {
            address_id: delegator.address_id.clone(),
            live_stake: delegator.live_stake,
            updated_at: Utc::now(),
        };
        let history = delegator
            .delegation_history
            .iter()
            .map(|delegation| DelegationRecord {
                address_id: delegator.address_id.clone(),
                pool_id: delegation.pool_id.clone(),
                amount: delegation.amount,
                epoch_no: delegation.epoch_no,
            })
            .collect();
        (record, history)
    }
}

/// A lottery row; tickets and winners live in their own tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryRecord {
    pub uuid: Uuid,
    pub pool_id: String,
    pub name: String,
    pub start_epoch: i64,
    pub end_epoch: i64,
    pub count_epochs: i64,
    pub draw_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub strategy_type: String,
    pub owners_allowed: bool,
    pub min_live_stake: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryTicketRecord {
    pub lottery_id: Uuid,

    /// Emission order of the ticket within its lottery.
    pub position: i32,
    pub delegator_id: String,
    pub winning_likelyhood: f64,
    pub pool_owner: bool,
    pub delegator_lottery_stake: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryWinnerRecord {
    pub lottery_id: Uuid,
    pub delegator_address_id: String,
    pub rank: i32,
}

/// A lottery flattened into the rows of its three tables.
#[derive(Debug, Clone)]
pub struct LotteryRows {
    pub lottery: LotteryRecord,
    pub tickets: Vec<LotteryTicketRecord>,
    pub winners: Vec<LotteryWinnerRecord>,
}

impl TryFrom<&Lottery> for LotteryRows {
    type Error = DatabaseError;

    fn try_from(lottery: &Lottery) -> Result<Self, Self::Error> {
        let record = LotteryRecord {
            uuid: lottery.uuid,
            pool_id: lottery.pool_id.clone(),
            name: lottery.name.clone(),
            start_epoch: lottery.start_epoch,
            end_epoch: lottery.end_epoch,
            count_epochs: lottery.count_epochs,
            draw_date: lottery.draw_date,
            created_at: lottery.created_at,
            strategy_type: lottery.strategy_type.to_string(),
            owners_allowed: lottery.owners_allowed,
            min_live_stake: lottery.min_live_stake,
        };

        let tickets = lottery
            .tickets
            .iter()
            .enumerate()
            .map(|(position, ticket)| -> Result<LotteryTicketRecord, DatabaseError> {
                Ok(LotteryTicketRecord {
                    lottery_id: lottery.uuid,
                    position: to_i32("position", position)?,
                    delegator_id: ticket.delegator_id.clone(),
                    winning_likelyhood: ticket.winning_likelyhood,
                    pool_owner: ticket.pool_owner,
                    delegator_lottery_stake: ticket.delegator_lottery_stake,
                })
            })
            .collect::<Result<Vec<_>, DatabaseError>>()?;

        let winners = lottery
            .ranked_winners()
            .map(|winner| -> Result<LotteryWinnerRecord, DatabaseError> {
                Ok(LotteryWinnerRecord {
                    lottery_id: lottery.uuid,
                    delegator_address_id: winner.delegator_address_id.clone(),
                    rank: to_i32("rank", winner.rank)?,
                })
            })
            .collect::<Result<Vec<_>, DatabaseError>>()?;

        Ok(Self {
            lottery: record,
            tickets,
            winners,
        })
    }
}

impl TryFrom<LotteryRows> for Lottery {
    type Error = DatabaseError;

    fn try_from(rows: LotteryRows) -> Result<Self, Self::Error> {
        let record = rows.lottery;
        let strategy_type: StrategyKind = record.strategy_type.parse().map_err(|_| {
            DatabaseError::ConfigError(format!(
                "Unknown strategy '{}' stored for lottery {}",
                record.strategy_type, record.uuid
            ))
        })?;

        let mut tickets = rows.tickets;
        tickets.sort_by_key(|ticket| ticket.position);

        let winners = rows
            .winners
            .into_iter()
            .map(|winner| -> Result<(u32, LotteryWinner), DatabaseError> {
                let rank = u32::try_from(winner.rank).map_err(|_| {
                    DatabaseError::ConfigError(format!("Negative rank for lottery {}", record.uuid))
                })?;
                Ok((
                    rank,
                    LotteryWinner {
                        delegator_address_id: winner.delegator_address_id,
                        rank,
                    },
                ))
            })
            .collect::<Result<BTreeMap<_, _>, DatabaseError>>()?;

        Ok(Lottery {
            uuid: record.uuid,
            pool_id: record.pool_id,
            name: record.name,
            start_epoch: record.start_epoch,
            end_epoch: record.end_epoch,
            count_epochs: record.count_epochs,
            draw_date: record.draw_date,
            created_at: record.created_at,
            strategy_type,
            owners_allowed: record.owners_allowed,
            min_live_stake: record.min_live_stake,
            tickets: tickets
                .into_iter()
                .map(|ticket| LotteryTicket {
                    delegator_id: ticket.delegator_id,
                    winning_likelyhood: ticket.winning_likelyhood,
                    pool_owner: ticket.pool_owner,
                    lottery_id: ticket.lottery_id,
                    delegator_lottery_stake: ticket.delegator_lottery_stake,
                })
                .collect(),
            winners,
        })
    }
}

fn to_i32<T: TryInto<i32>>(field: &str, value: T) -> Result<i32, DatabaseError> {
    value
        .try_into()
        .map_err(|_| DatabaseError::ConfigError(format!("{} does not fit in INTEGER", field)))
}
