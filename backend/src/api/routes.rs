//! # API Route Configuration
//!
//! This module sets up all the HTTP routes for the API.

use actix_web::web;

use super::handlers;

/// Configure all API routes.
///
/// ## Route Structure
///
/// ```text
/// /
/// ├── /health              GET  - Database and indexer health
/// ├── /pools/sync          POST - Store pools unknown to the catalogue
/// ├── /pool/filter         POST - Search stored pools
/// ├── /lottery             POST - Create and draw a lottery
/// ├── /lottery/{id}        GET  - Lottery, winners once drawn
/// ├── /lotteries           GET  - Recent lotteries
/// └── /delegator/{address} GET  - Stored delegator snapshot
/// ```
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Root endpoint - API information
        .route("/", web::get().to(handlers::api_info))

        // Health check endpoint
        .route("/health", web::get().to(handlers::health_check))

        // Pool catalogue
        .route("/pools/sync", web::post().to(handlers::sync_pools))
        .route("/pool/filter", web::post().to(handlers::filter_pools))

        // Lotteries
        .route("/lottery", web::post().to(handlers::create_lottery))
        .route("/lottery/{id}", web::get().to(handlers::get_lottery))
        .route("/lotteries", web::get().to(handlers::list_lotteries))

        .route("/delegator/{address}", web::get().to(handlers::get_delegator));
}
