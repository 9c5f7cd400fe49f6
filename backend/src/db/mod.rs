//! # Database Module
//!
//! PostgreSQL persistence for pools, delegators and lotteries.
//!
//! ## What Is Stored
//!
//! - The pool catalogue, so pool search never hits the indexer
//! - Delegator snapshots taken when a lottery is created
//! - Lotteries with their tickets and draw results
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       DATABASE LAYER                       │
//! │                                                            │
//! │  PoolRepository   DelegatorRepository   LotteryRepository  │
//! │         └────────────────┬────────────────────┘            │
//! │                          ▼                                 │
//! │                   queries (SQL)                            │
//! │                          ▼                                 │
//! │              Connection Pool (deadpool-postgres)           │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod models;
pub mod queries;
pub mod repository;

#[cfg(test)]
pub mod memory;

use deadpool_postgres::{Config, Pool, Runtime};
use thiserror::Error;
use tokio_postgres::{Config as TokioConfig, NoTls};
use tracing::{debug, error, info, warn};

pub use repository::{DelegatorRepository, LotteryRepository, PoolRepository, StoreHealth};

/// Candidate locations of the schema, relative to the working directory.
const MIGRATION_PATHS: [&str; 3] = [
    "migrations/001_initial_schema.sql",
    "backend/migrations/001_initial_schema.sql",
    "../migrations/001_initial_schema.sql",
];

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to connect to the database
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryError(#[from] tokio_postgres::Error),

    /// Migration failed
    #[error("Migration failed: {0}")]
    MigrationError(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique key is already taken
    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    /// Invalid configuration or stored value
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Database connection wrapper.
///
/// ## Usage
///
/// ```rust,ignore
/// let db = Database::connect("postgres://...").await?;
/// db.run_migrations().await?;
/// let pool = PoolRepository::get(&db, "pool1...").await?;
/// ```
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    /// Connect to PostgreSQL with a pool of at most 10 connections.
    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        info!("Connecting to database...");

        let tokio_config = database_url
            .parse::<TokioConfig>()
            .map_err(|e| DatabaseError::ConfigError(format!("Invalid database URL: {}", e)))?;

        let mut config = Config::new();
        config.dbname = tokio_config.get_dbname().map(str::to_string);
        config.user = tokio_config.get_user().map(str::to_string);
        config.password = tokio_config
            .get_password()
            .map(|password| String::from_utf8_lossy(password).to_string());
        if let Some(tokio_postgres::config::Host::Tcp(host)) = tokio_config.get_hosts().first() {
            config.host = Some(host.clone());
        }
        config.port = tokio_config.get_ports().first().copied();
        config.pool = Some(deadpool_postgres::PoolConfig {
            max_size: 10,
            ..Default::default()
        });

        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        let db = Self { pool };
        if !db.ping().await {
            return Err(DatabaseError::ConnectionError(
                "database did not answer SELECT 1".to_string(),
            ));
        }

        info!("Database connection established");
        Ok(db)
    }

    /// Whether a pooled connection answers `SELECT 1`.
    pub async fn ping(&self) -> bool {
        match self.pool.get().await {
            Ok(client) => client.query_one("SELECT 1", &[]).await.is_ok(),
            Err(e) => {
                warn!("Database ping failed: {}", e);
                false
            }
        }
    }

    /// Apply `migrations/001_initial_schema.sql`.
    ///
    /// The schema only uses `IF NOT EXISTS` statements, so running it on
    /// every start is safe.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        info!("Running database migrations...");

        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        let (path, sql) = MIGRATION_PATHS
            .iter()
            .find_map(|path| match std::fs::read_to_string(path) {
                Ok(sql) => Some((*path, sql)),
                Err(e) => {
                    debug!("Tried path '{}': {}", path, e);
                    None
                }
            })
            .ok_or_else(|| {
                let current_dir = std::env::current_dir()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                error!(
                    "Could not find migration file. Current dir: {}. Tried paths: {:?}",
                    current_dir, MIGRATION_PATHS
                );
                DatabaseError::MigrationError(format!(
                    "Could not find migration file in {} (tried {:?})",
                    current_dir, MIGRATION_PATHS
                ))
            })?;

        info!("Found migration file at: {}, executing SQL...", path);

        client.batch_execute(&sql).await.map_err(|e| {
            let detail = e
                .as_db_error()
                .and_then(|db_err| db_err.detail())
                .unwrap_or("No detail available");
            error!("Migration execution error: {} ({})", e, detail);
            DatabaseError::MigrationError(format!("{}: {}", e, detail))
        })?;

        info!("Migrations completed successfully");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}
