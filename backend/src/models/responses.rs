//! # API Response Models
//!
//! Structures for outgoing API response bodies.
//! All responses are wrapped in a standard format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Delegator, Lottery, LotteryTicket, LotteryWinner, Pool, StrategyKind};
use crate::utils::format_ada;

/// Standard API response wrapper.
///
/// All API responses follow this format:
///
/// ## Success Response
///
/// ```json
/// {
///     "success": true,
///     "data": { ... },
///     "error": null
/// }
/// ```
///
/// ## Error Response
///
/// ```json
/// {
///     "success": false,
///     "data": null,
///     "error": {
///         "code": "OUT_OF_DELEGATOR",
///         "message": "Out of delegator for lottery ..."
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the request was successful.
    pub success: bool,

    /// Response data (null on error).
    pub data: Option<T>,

    /// Error information (null on success).
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response with data.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// API error information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error code (e.g., "POOL_NOT_FOUND").
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    pub delegator_id: String,
    pub winning_likelyhood: f64,
    pub pool_owner: bool,
    pub delegator_lottery_stake: Option<f64>,
}

impl From<&LotteryTicket> for TicketResponse {
    fn from(ticket: &LotteryTicket) -> Self {
        Self {
            delegator_id: ticket.delegator_id.clone(),
            winning_likelyhood: ticket.winning_likelyhood,
            pool_owner: ticket.pool_owner,
            delegator_lottery_stake: ticket.delegator_lottery_stake,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerResponse {
    pub delegator_address_id: String,
    pub rank: u32,
}

impl From<&LotteryWinner> for WinnerResponse {
    fn from(winner: &LotteryWinner) -> Self {
        Self {
            delegator_address_id: winner.delegator_address_id.clone(),
            rank: winner.rank,
        }
    }
}

/// A lottery as shown to clients.
///
/// Returned by `POST /lottery` and `GET /lottery/{id}`.
///
/// ## Example Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "uuid": "abd1acef-c472-4444-bb17-e356a41a560b",
///         "poolId": "pool1wx83...",
///         "name": "February lottery",
///         "startEpoch": 320,
///         "endEpoch": 322,
///         "countEpochs": 2,
///         "drawDate": "2022-02-02T10:00:00Z",
///         "createdAt": "2022-01-30T08:12:45Z",
///         "strategyType": "Stake",
///         "ownersAllowed": false,
///         "minLiveStake": 1000000,
///         "resultAvailable": true,
///         "tickets": [ ... ],
///         "winners": [ { "delegatorAddressId": "stake1...", "rank": 0 } ]
///     }
/// }
/// ```
///
/// `tickets` and `winners` are empty when the lottery is not requested in
/// detail. `winners` also stays empty until `drawDate` has passed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryResponse {
    pub uuid: Uuid,
    pub pool_id: String,
    pub name: String,
    pub start_epoch: i64,
    pub end_epoch: i64,
    pub count_epochs: i64,
    pub draw_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub strategy_type: StrategyKind,
    pub owners_allowed: bool,
    pub min_live_stake: i64,
    pub result_available: bool,
    pub tickets: Vec<TicketResponse>,
    pub winners: Vec<WinnerResponse>,
}

impl LotteryResponse {
    pub fn from_lottery(lottery: &Lottery, detailed: bool) -> Self {
        Self::from_lottery_at(lottery, detailed, Utc::now())
    }

    /// Build the response as seen at `now`.
    pub fn from_lottery_at(lottery: &Lottery, detailed: bool, now: DateTime<Utc>) -> Self {
        let result_available = lottery.is_result_available_at(now);

        let (tickets, winners) = if detailed {
            let tickets = lottery.tickets.iter().map(TicketResponse::from).collect();
            let winners = if result_available {
                lottery.ranked_winners().map(WinnerResponse::from).collect()
            } else {
                Vec::new()
            };
            (tickets, winners)
        } else {
            (Vec::new(), Vec::new())
        };

        Self {
            uuid: lottery.uuid,
            pool_id: lottery.pool_id.clone(),
            name: lottery.name.clone(),
            start_epoch: lottery.start_epoch,
            end_epoch: lottery.end_epoch,
            count_epochs: lottery.count_epochs,
            draw_date: lottery.draw_date,
            created_at: lottery.created_at,
            strategy_type: lottery.strategy_type,
            owners_allowed: lottery.owners_allowed,
            min_live_stake: lottery.min_live_stake,
            result_available,
            tickets,
            winners,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryListResponse {
    pub lotteries: Vec<LotteryResponse>,
    pub total: usize,
}

/// Pool search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolResponse {
    pub pool_id: String,
    pub hex: String,
    pub url: Option<String>,
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,

    /// Stake addresses of the declared owners.
    pub owners: Vec<String>,
}

impl From<&Pool> for PoolResponse {
    fn from(pool: &Pool) -> Self {
        Self {
            pool_id: pool.pool_id.clone(),
            hex: pool.hex.clone(),
            url: pool.url.clone(),
            ticker: pool.ticker.clone(),
            name: pool.name.clone(),
            description: pool.description.clone(),
            updated_at: pool.updated_at,
            owners: pool.owners.iter().map(|owner| owner.address_id.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolListResponse {
    pub pools: Vec<PoolResponse>,
}

/// Result of `POST /pools/sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSyncResponse {
    /// Pools stored by this sync.
    pub added: usize,

    /// Pools in the catalogue afterwards.
    pub total: usize,

    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationResponse {
    pub pool_id: String,
    pub amount: i64,
    pub formatted_amount: String,
    pub epoch_no: Option<i64>,
}

/// Stored delegator snapshot.
///
/// Returned by `GET /delegator/{address}`
///
/// ## Example Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "addressId": "stake1u9yrn7z2...",
///         "liveStake": 1500000000,
///         "formattedLiveStake": "1,500.00 ADA",
///         "delegationHistory": [ ... ]
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatorResponse {
    pub address_id: String,
    pub live_stake: i64,
    pub formatted_live_stake: String,

    /// Most recent epoch first.
    pub delegation_history: Vec<DelegationResponse>,
}

impl From<&Delegator> for DelegatorResponse {
    fn from(delegator: &Delegator) -> Self {
        let mut history: Vec<DelegationResponse> = delegator
            .delegation_history
            .iter()
            .map(|delegation| DelegationResponse {
                pool_id: delegation.pool_id.clone(),
                amount: delegation.amount,
                formatted_amount: format_ada(delegation.amount),
                epoch_no: delegation.epoch_no,
            })
            .collect();
        history.sort_by(|a, b| b.epoch_no.cmp(&a.epoch_no));

        Self {
            address_id: delegator.address_id.clone(),
            live_stake: delegator.live_stake,
            formatted_live_stake: format_ada(delegator.live_stake),
            delegation_history: history,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status: "healthy" or "unhealthy".
    pub status: String,

    /// Database connection status.
    pub database: bool,

    /// Chain indexer reachability.
    pub indexer: bool,

    /// Service version.
    pub version: String,

    /// Current timestamp.
    pub timestamp: DateTime<Utc>,
}
