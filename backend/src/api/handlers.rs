//! # API Request Handlers
//!
//! This module contains the handler functions for each API endpoint.
//! Each handler:
//! 1. Extracts request data
//! 2. Validates input
//! 3. Calls the appropriate service
//! 4. Returns a formatted response
//!
//! ## Error Handling
//!
//! All errors are caught and returned as JSON:
//!
//! ```json
//! {
//!     "success": false,
//!     "error": {
//!         "code": "OUT_OF_DELEGATOR",
//!         "message": "Out of delegator for lottery ..."
//!     }
//! }
//! ```

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use crate::db::DatabaseError;
use crate::models::{
    ApiResponse, CreateLotteryRequest, DelegatorResponse, HealthResponse, LotteryListResponse,
    LotteryQuery, LotteryResponse, PoolFilterRequest, PoolListResponse, PoolResponse,
    PoolSyncResponse,
};
use crate::services::{CatalogError, LotteryError};
use crate::utils::sanitize_input;
use crate::AppState;

/// Error code and HTTP status for a lottery failure.
pub fn lottery_error_status(e: &LotteryError) -> (&'static str, StatusCode) {
    match e {
        LotteryError::OutOfDelegator(_) => ("OUT_OF_DELEGATOR", StatusCode::BAD_REQUEST),
        LotteryError::OutOfEpoch(_) => ("OUT_OF_EPOCH", StatusCode::BAD_REQUEST),
        LotteryError::MaxPoolDelegators { .. } => ("MAX_POOL_DELEGATORS", StatusCode::BAD_REQUEST),
        LotteryError::InvalidDrawDate(_) => ("INVALID_DRAW_DATE", StatusCode::BAD_REQUEST),
        LotteryError::UnknownStrategy(_) => ("UNKNOWN_STRATEGY", StatusCode::BAD_REQUEST),
        LotteryError::InvalidInput(_) => ("INVALID_INPUT", StatusCode::BAD_REQUEST),
        LotteryError::InvalidLottery => ("INVALID_LOTTERY", StatusCode::INTERNAL_SERVER_ERROR),
        LotteryError::PoolNotFound(_) => ("POOL_NOT_FOUND", StatusCode::NOT_FOUND),
        LotteryError::LotteryNotFound(_) => ("LOTTERY_NOT_FOUND", StatusCode::NOT_FOUND),
        LotteryError::DelegatorNotFound(_) => ("DELEGATOR_NOT_FOUND", StatusCode::NOT_FOUND),
        LotteryError::Chain(_) => ("INDEXER_UNAVAILABLE", StatusCode::BAD_GATEWAY),
        LotteryError::Database(DatabaseError::AlreadyExists(_)) => {
            ("LOTTERY_EXISTS", StatusCode::CONFLICT)
        }
        LotteryError::Database(_) => ("DATABASE_ERROR", StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn lottery_error_response(e: &LotteryError) -> HttpResponse {
    let (code, status) = lottery_error_status(e);
    if status.is_server_error() {
        error!("Lottery request failed: {}", e);
    } else {
        warn!("Lottery request rejected: {}", e);
    }

    HttpResponse::build(status).json(ApiResponse::<()>::error(code, &e.to_string()))
}

fn catalog_error_response(e: &CatalogError) -> HttpResponse {
    error!("Pool catalog request failed: {}", e);

    let (code, status) = match e {
        CatalogError::Chain(_) => ("INDEXER_UNAVAILABLE", StatusCode::BAD_GATEWAY),
        CatalogError::Database(_) => ("DATABASE_ERROR", StatusCode::INTERNAL_SERVER_ERROR),
    };
    HttpResponse::build(status).json(ApiResponse::<()>::error(code, &e.to_string()))
}

fn invalid_input(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiResponse::<()>::error("INVALID_INPUT", message))
}

/// API information endpoint (root).
///
/// ## Endpoint
///
/// `GET /`
pub async fn api_info() -> HttpResponse {
    let info = json!({
        "name": "SPO Lottery API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Lotteries among the delegators of a Cardano stake pool",
        "endpoints": {
            "health": { "method": "GET", "path": "/health" },
            "syncPools": { "method": "POST", "path": "/pools/sync" },
            "filterPools": { "method": "POST", "path": "/pool/filter" },
            "createLottery": { "method": "POST", "path": "/lottery" },
            "listLotteries": { "method": "GET", "path": "/lotteries" },
            "getLottery": { "method": "GET", "path": "/lottery/{id}?detailed=true" },
            "getDelegator": { "method": "GET", "path": "/delegator/{address}" }
        }
    });

    HttpResponse::Ok().json(ApiResponse::success(info))
}

/// Health check endpoint.
///
/// ## Endpoint
///
/// `GET /health`
///
/// ## Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "status": "healthy",
///         "database": true,
///         "indexer": true,
///         "version": "0.1.0",
///         "timestamp": "2022-02-02T12:00:00Z"
///     }
/// }
/// ```
pub async fn health_check(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let database = state.store.is_healthy().await;
    let indexer = state.chain.is_healthy().await;
    let healthy = database && indexer;

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        database,
        indexer,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    HttpResponse::build(status).json(ApiResponse::success(response))
}

/// Fetch pools unknown to the catalogue and store them.
///
/// ## Endpoint
///
/// `POST /pools/sync`
///
/// Listing every registered pool takes a while on mainnet; the call returns
/// once all new pools are stored.
pub async fn sync_pools(state: web::Data<Arc<AppState>>) -> HttpResponse {
    info!("Pool sync requested");

    let added = match state.pool_catalog.add_pools().await {
        Ok(added) => added,
        Err(e) => return catalog_error_response(&e),
    };

    match state.pool_catalog.count().await {
        Ok(total) => HttpResponse::Ok().json(ApiResponse::success(PoolSyncResponse {
            added,
            total,
            timestamp: Utc::now(),
        })),
        Err(e) => catalog_error_response(&e),
    }
}

/// Search the stored pools.
///
/// ## Endpoint
///
/// `POST /pool/filter`
///
/// ## Example
///
/// ```bash
/// curl -X POST http://127.0.0.1:5005/pool/filter \
///   -H "Content-Type: application/json" \
///   -d '{ "poolFilter": "hippo" }'
/// ```
pub async fn filter_pools(
    state: web::Data<Arc<AppState>>,
    request: web::Json<PoolFilterRequest>,
) -> HttpResponse {
    let filter = match sanitize_input("poolFilter", &request.pool_filter) {
        Ok(filter) => filter,
        Err(message) => return invalid_input(&message),
    };

    match state.pool_catalog.search_pool(&filter).await {
        Ok(pools) => {
            info!("{} pools match '{}'", pools.len(), filter);
            let pools = pools.iter().map(PoolResponse::from).collect();
            HttpResponse::Ok().json(ApiResponse::success(PoolListResponse { pools }))
        }
        Err(e) => catalog_error_response(&e),
    }
}

/// Create a lottery and draw its winners.
///
/// ## Endpoint
///
/// `POST /lottery`
///
/// ## Example
///
/// ```bash
/// curl -X POST http://127.0.0.1:5005/lottery \
///   -H "Content-Type: application/json" \
///   -d '{
///     "poolId": "pool1wx83tmlwtxw5nzn4stz02655pnltllq5apgx2mdc6557zw0r78g",
///     "name": "February lottery",
///     "startEpoch": 320,
///     "endEpoch": 322,
///     "countEpochs": 2,
///     "drawDate": "2022-02-02T10:00:00",
///     "strategyName": "Stake",
///     "ownersAllowed": false,
///     "minLiveStake": 0
///   }'
/// ```
///
/// Responds `201 Created` with the lottery. Winners stay hidden until the
/// draw date.
pub async fn create_lottery(
    state: web::Data<Arc<AppState>>,
    request: web::Json<CreateLotteryRequest>,
) -> HttpResponse {
    let command = match request.into_inner().into_command() {
        Ok(command) => command,
        Err(message) => return invalid_input(&message),
    };

    info!("Create lottery request for pool {}", command.pool_id);

    match state.lottery_manager.create_lottery(command).await {
        Ok(lottery) => HttpResponse::Created()
            .json(ApiResponse::success(LotteryResponse::from_lottery(&lottery, true))),
        Err(e) => lottery_error_response(&e),
    }
}

/// Get a lottery.
///
/// ## Endpoint
///
/// `GET /lottery/{id}?detailed=true`
///
/// `detailed=false` leaves out tickets and winners.
pub async fn get_lottery(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<LotteryQuery>,
) -> HttpResponse {
    let lottery_id = path.into_inner();
    info!("Get lottery: {}", lottery_id);

    match state.lottery_manager.get_lottery(&lottery_id).await {
        Ok(lottery) => HttpResponse::Ok()
            .json(ApiResponse::success(LotteryResponse::from_lottery(&lottery, query.detailed))),
        Err(e) => lottery_error_response(&e),
    }
}

/// Most recent lotteries, without tickets or winners.
///
/// `GET /lotteries`
pub async fn list_lotteries(state: web::Data<Arc<AppState>>) -> HttpResponse {
    match state.lottery_manager.list_lotteries().await {
        Ok(lotteries) => {
            let lotteries: Vec<LotteryResponse> = lotteries
                .iter()
                .map(|lottery| LotteryResponse::from_lottery(lottery, false))
                .collect();
            let total = lotteries.len();
            HttpResponse::Ok().json(ApiResponse::success(LotteryListResponse { lotteries, total }))
        }
        Err(e) => lottery_error_response(&e),
    }
}

/// Stored snapshot of a delegator, taken when it entered a lottery.
///
/// ## Endpoint
///
/// `GET /delegator/{address}`
pub async fn get_delegator(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> HttpResponse {
    let address = path.into_inner();

    match state.lottery_manager.get_delegator(address.trim()).await {
        Ok(delegator) => HttpResponse::Ok().json(ApiResponse::success(DelegatorResponse::from(&delegator))),
        Err(e) => lottery_error_response(&e),
    }
}
