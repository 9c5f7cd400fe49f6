//! # SPO Lottery Backend Service
//!
//! Entry point of the backend that runs lotteries among the delegators of
//! a Cardano stake pool. It provides:
//!
//! - REST API to search pools, create lotteries and read results
//! - A pool catalogue synced from the Blockfrost indexer
//! - Database storage for pools, delegator snapshots and lotteries
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        BACKEND SERVICE                           │
//! │                                                                  │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                  REST API (Actix)                          │  │
//! │  │   /pool/filter   /pools/sync   /lottery   /delegator       │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                          │                                       │
//! │  ┌───────────────────────┴───────────────────────────────────┐  │
//! │  │                    SERVICE LAYER                           │  │
//! │  │  ┌──────────────────┐        ┌──────────────────┐         │  │
//! │  │  │ LotteryManager   │        │ PoolCatalog      │         │  │
//! │  │  └──────────────────┘        └──────────────────┘         │  │
//! │  │        domain: eligibility → strategy → draw               │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                          │                                       │
//! │         ┌────────────────┴────────────────┐                     │
//! │         │                                 │                      │
//! │  ┌──────┴──────┐                   ┌──────┴──────┐              │
//! │  │  PostgreSQL │                   │ Blockfrost  │              │
//! │  │  Database   │                   │ indexer     │              │
//! │  └─────────────┘                   └─────────────┘              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! 1. Set up PostgreSQL and create the database
//! 2. Create a `.env` with `DATABASE_URL` and `BLOCKFROST_PROJECT_ID`
//! 3. Start the server: `cargo run` (the schema is applied on start)
//! 4. Fill the pool catalogue: `curl -X POST http://127.0.0.1:5005/pools/sync`

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod cardano;
mod config;
mod db;
mod domain;
mod models;
mod services;
mod utils;

use cardano::{BatchFetcher, BlockfrostClient, ChainDataProvider, FetchLimits, HttpTransport};
use config::AppConfig;
use db::{Database, StoreHealth};
use services::{LotteryManager, PoolCatalog};

/// Application state shared across all handlers.
pub struct AppState {
    /// Lottery workflow and lookups
    pub lottery_manager: LotteryManager,

    /// Pool catalogue sync and search
    pub pool_catalog: PoolCatalog,

    /// Storage liveness for `/health`
    pub store: Arc<dyn StoreHealth>,

    /// Chain indexer, also probed by `/health`
    pub chain: Arc<dyn ChainDataProvider>,
}

/// Main entry point for the backend service.
///
/// This function:
/// 1. Loads configuration from environment
/// 2. Initializes database connection
/// 3. Sets up the Blockfrost client
/// 4. Launches the HTTP server
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // =========================================
    // STEP 1: Load .env and Initialize Logging
    // =========================================
    dotenvy::dotenv().ok(); // It's okay if .env doesn't exist

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("🚀 Starting SPO Lottery Backend Service");

    // =========================================
    // STEP 2: Load Configuration
    // =========================================
    let config = AppConfig::from_env().expect("Failed to load configuration");

    info!("📋 Configuration loaded");
    info!("   Indexer: {}", config.blockfrost_api_url);
    info!("   Max delegators: {}", config.max_delegators_allowed);

    // =========================================
    // STEP 3: Initialize Database
    // =========================================
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    info!("🗄️  Database connected");

    db.run_migrations().await.expect("Failed to run migrations");

    info!("📦 Database migrations complete");

    // =========================================
    // STEP 4: Initialize Indexer Client
    // =========================================
    let transport = HttpTransport::new(&config).expect("Failed to create indexer transport");
    let fetcher = BatchFetcher::new(Arc::new(transport), config.saturation_backoff);
    let chain: Arc<dyn ChainDataProvider> =
        Arc::new(BlockfrostClient::new(fetcher, FetchLimits::from(&config)));

    info!("⛓️  Blockfrost client initialized");

    // =========================================
    // STEP 5: Initialize Services
    // =========================================
    let db = Arc::new(db);
    let lottery_manager = LotteryManager::new(db.clone(), db.clone(), db.clone(), chain.clone());
    let pool_catalog = PoolCatalog::new(db.clone(), chain.clone());

    info!("🔧 Services initialized");

    let app_state = Arc::new(AppState {
        lottery_manager,
        pool_catalog,
        store: db,
        chain,
    });

    // =========================================
    // STEP 6: Start HTTP Server
    // =========================================
    let server_host = config.server_host.clone();
    let server_port = config.server_port;

    info!("🌐 Starting HTTP server on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        App::new()
            // Attach shared application state
            .app_data(web::Data::new(app_state.clone()))
            // Add logging middleware
            .wrap(middleware::Logger::default())
            .wrap(Cors::permissive())
            // Configure API routes
            .configure(api::configure_routes)
    })
    .bind((server_host, server_port))?
    .run()
    .await
}
