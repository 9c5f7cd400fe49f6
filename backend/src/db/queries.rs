//! # Database Queries
//!
//! SQL for every table. Each function takes the connection pool, checks
//! out one client and performs one logical operation.
//!
//! ## Query Organization
//!
//! - `pool_*` - pools and their owners
//! - `delegator_*` - delegators and their delegation history
//! - `lottery_*` - lotteries with tickets and winners
//!
//! Writes spanning several tables run in one transaction.
//!
//! ## Error Handling
//!
//! All queries return `Result<T, DatabaseError>`. Common errors:
//! - `AlreadyExists` - unique constraint violated
//! - `QueryError` - SQL execution failed

use deadpool_postgres::{Object, Pool};
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::*;
use super::DatabaseError;

// ============================================
// HELPER FUNCTIONS
// ============================================

async fn client(pool: &Pool) -> Result<Object, DatabaseError> {
    pool.get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))
}

/// Turn a unique violation into `AlreadyExists`, keep anything else.
fn map_conflict(e: tokio_postgres::Error, what: impl FnOnce() -> String) -> DatabaseError {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        DatabaseError::AlreadyExists(what())
    } else {
        DatabaseError::QueryError(e)
    }
}

fn row_to_pool(row: &Row) -> PoolRecord {
    PoolRecord {
        pool_id: row.get("pool_id"),
        hex: row.get("hex"),
        url: row.get("url"),
        ticker: row.get("ticker"),
        name: row.get("name"),
        description: row.get("description"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_pool_owner(row: &Row) -> PoolOwnerRecord {
    PoolOwnerRecord {
        pool_id: row.get("pool_id"),
        address_id: row.get("address_id"),
    }
}

fn row_to_delegator(row: &Row) -> DelegatorRecord {
    DelegatorRecord {
        address_id: row.get("address_id"),
        live_stake: row.get("live_stake"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_delegation(row: &Row) -> DelegationRecord {
    DelegationRecord {
        address_id: row.get("address_id"),
        pool_id: row.get("pool_id"),
        amount: row.get("amount"),
        epoch_no: row.get("epoch_no"),
    }
}

fn row_to_lottery(row: &Row) -> LotteryRecord {
    LotteryRecord {
        uuid: row.get("uuid"),
        pool_id: row.get("pool_id"),
        name: row.get("name"),
        start_epoch: row.get("start_epoch"),
        end_epoch: row.get("end_epoch"),
        count_epochs: row.get("count_epochs"),
        draw_date: row.get("draw_date"),
        created_at: row.get("created_at"),
        strategy_type: row.get("strategy_type"),
        owners_allowed: row.get("owners_allowed"),
        min_live_stake: row.get("min_live_stake"),
    }
}

fn row_to_ticket(row: &Row) -> LotteryTicketRecord {
    LotteryTicketRecord {
        lottery_id: row.get("lottery_id"),
        position: row.get("position"),
        delegator_id: row.get("delegator_id"),
        winning_likelyhood: row.get("winning_likelyhood"),
        pool_owner: row.get("pool_owner"),
        delegator_lottery_stake: row.get("delegator_lottery_stake"),
    }
}

fn row_to_winner(row: &Row) -> LotteryWinnerRecord {
    LotteryWinnerRecord {
        lottery_id: row.get("lottery_id"),
        delegator_address_id: row.get("delegator_address_id"),
        rank: row.get("rank"),
    }
}

// ============================================
// POOL QUERIES
// ============================================

/// Get a pool by its bech32 id.
pub async fn get_pool(pool: &Pool, pool_id: &str) -> Result<Option<PoolRecord>, DatabaseError> {
    debug!("Fetching pool: {}", pool_id);

    let client = client(pool).await?;
    let row = client
        .query_opt(
            r#"
            SELECT pool_id, hex, url, ticker, name, description, updated_at
            FROM pools
            WHERE pool_id = $1
            "#,
            &[&pool_id],
        )
        .await?;

    Ok(row.as_ref().map(row_to_pool))
}

pub async fn get_pool_owners(
    pool: &Pool,
    pool_id: &str,
) -> Result<Vec<PoolOwnerRecord>, DatabaseError> {
    let client = client(pool).await?;
    let rows = client
        .query(
            "SELECT pool_id, address_id FROM pool_owners WHERE pool_id = $1 ORDER BY address_id",
            &[&pool_id],
        )
        .await?;

    Ok(rows.iter().map(row_to_pool_owner).collect())
}

pub async fn list_pools(pool: &Pool) -> Result<Vec<PoolRecord>, DatabaseError> {
    let client = client(pool).await?;
    let rows = client
        .query(
            r#"
            SELECT pool_id, hex, url, ticker, name, description, updated_at
            FROM pools
            ORDER BY pool_id
            "#,
            &[],
        )
        .await?;

    Ok(rows.iter().map(row_to_pool).collect())
}

pub async fn list_pool_owners(pool: &Pool) -> Result<Vec<PoolOwnerRecord>, DatabaseError> {
    let client = client(pool).await?;
    let rows = client
        .query("SELECT pool_id, address_id FROM pool_owners", &[])
        .await?;

    Ok(rows.iter().map(row_to_pool_owner).collect())
}

/// Insert or refresh pools with their owners, in one transaction.
///
/// Owners of a refreshed pool are replaced by the given ones.
pub async fn upsert_pools(
    pool: &Pool,
    pools: &[PoolRecord],
    owners: &[PoolOwnerRecord],
) -> Result<usize, DatabaseError> {
    let mut client = client(pool).await?;
    let tx = client.transaction().await?;

    let upsert_pool = tx
        .prepare_cached(
            r#"
            INSERT INTO pools (pool_id, hex, url, ticker, name, description, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (pool_id) DO UPDATE SET
                hex = EXCLUDED.hex,
                url = EXCLUDED.url,
                ticker = EXCLUDED.ticker,
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .await?;
    let clear_owners = tx
        .prepare_cached("DELETE FROM pool_owners WHERE pool_id = $1")
        .await?;
    let insert_owner = tx
        .prepare_cached(
            "INSERT INTO pool_owners (pool_id, address_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .await?;

    for record in pools {
        tx.execute(
            &upsert_pool,
            &[
                &record.pool_id,
                &record.hex,
                &record.url,
                &record.ticker,
                &record.name,
                &record.description,
                &record.updated_at,
            ],
        )
        .await?;
        tx.execute(&clear_owners, &[&record.pool_id]).await?;
    }

    for owner in owners {
        tx.execute(&insert_owner, &[&owner.pool_id, &owner.address_id])
            .await?;
    }

    tx.commit().await?;
    info!("{} pools stored", pools.len());

    Ok(pools.len())
}

// ============================================
// DELEGATOR QUERIES
// ============================================

pub async fn get_delegator(
    pool: &Pool,
    address_id: &str,
) -> Result<Option<DelegatorRecord>, DatabaseError> {
    debug!("Fetching delegator: {}", address_id);

    let client = client(pool).await?;
    let row = client
        .query_opt(
            "SELECT address_id, live_stake, updated_at FROM delegators WHERE address_id = $1",
            &[&address_id],
        )
        .await?;

    Ok(row.as_ref().map(row_to_delegator))
}

pub async fn get_delegations(
    pool: &Pool,
    address_id: &str,
) -> Result<Vec<DelegationRecord>, DatabaseError> {
    let client = client(pool).await?;
    let rows = client
        .query(
            r#"
            SELECT address_id, pool_id, amount, epoch_no
            FROM delegations
            WHERE address_id = $1
            ORDER BY epoch_no NULLS LAST
            "#,
            &[&address_id],
        )
        .await?;

    Ok(rows.iter().map(row_to_delegation).collect())
}

/// Store live stakes and merge delegation histories, in one transaction.
pub async fn upsert_delegators(
    pool: &Pool,
    delegators: &[DelegatorRecord],
    delegations: &[DelegationRecord],
) -> Result<(), DatabaseError> {
    let mut client = client(pool).await?;
    let tx = client.transaction().await?;

    let upsert_delegator = tx
        .prepare_cached(
            r#"
            INSERT INTO delegators (address_id, live_stake, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (address_id) DO UPDATE SET
                live_stake = EXCLUDED.live_stake,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .await?;
    let insert_delegation = tx
        .prepare_cached(
            r#"
            INSERT INTO delegations (address_id, pool_id, amount, epoch_no)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            "#,
        )
        .await?;

    for delegator in delegators {
        tx.execute(
            &upsert_delegator,
            &[&delegator.address_id, &delegator.live_stake, &delegator.updated_at],
        )
        .await?;
    }

    for delegation in delegations {
        tx.execute(
            &insert_delegation,
            &[
                &delegation.address_id,
                &delegation.pool_id,
                &delegation.amount,
                &delegation.epoch_no,
            ],
        )
        .await?;
    }

    tx.commit().await?;
    debug!(
        "{} delegators and {} delegations stored",
        delegators.len(),
        delegations.len()
    );

    Ok(())
}

// ============================================
// LOTTERY QUERIES
// ============================================

/// Insert a lottery with its tickets and winners, all or nothing.
pub async fn insert_lottery(pool: &Pool, rows: &LotteryRows) -> Result<(), DatabaseError> {
    let lottery = &rows.lottery;
    debug!("Inserting lottery {}", lottery.uuid);

    let mut client = client(pool).await?;
    let tx = client.transaction().await?;

    tx.execute(
        r#"
        INSERT INTO lotteries (
            uuid, pool_id, name, start_epoch, end_epoch, count_epochs,
            draw_date, created_at, strategy_type, owners_allowed, min_live_stake
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
        &[
            &lottery.uuid,
            &lottery.pool_id,
            &lottery.name,
            &lottery.start_epoch,
            &lottery.end_epoch,
            &lottery.count_epochs,
            &lottery.draw_date,
            &lottery.created_at,
            &lottery.strategy_type,
            &lottery.owners_allowed,
            &lottery.min_live_stake,
        ],
    )
    .await
    .map_err(|e| map_conflict(e, || format!("lottery {}", lottery.uuid)))?;

    let insert_ticket = tx
        .prepare_cached(
            r#"
            INSERT INTO lottery_tickets (
                lottery_id, position, delegator_id, winning_likelyhood,
                pool_owner, delegator_lottery_stake
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .await?;
    for ticket in &rows.tickets {
        tx.execute(
            &insert_ticket,
            &[
                &ticket.lottery_id,
                &ticket.position,
                &ticket.delegator_id,
                &ticket.winning_likelyhood,
                &ticket.pool_owner,
                &ticket.delegator_lottery_stake,
            ],
        )
        .await
        .map_err(|e| map_conflict(e, || format!("ticket {}", ticket.delegator_id)))?;
    }

    let insert_winner = tx
        .prepare_cached(
            r#"
            INSERT INTO lottery_winners (lottery_id, delegator_address_id, rank)
            VALUES ($1, $2, $3)
            "#,
        )
        .await?;
    for winner in &rows.winners {
        tx.execute(
            &insert_winner,
            &[&winner.lottery_id, &winner.delegator_address_id, &winner.rank],
        )
        .await
        .map_err(|e| map_conflict(e, || format!("winner rank {}", winner.rank)))?;
    }

    tx.commit().await?;
    info!(
        "Lottery {} stored with {} tickets and {} winners",
        lottery.uuid,
        rows.tickets.len(),
        rows.winners.len()
    );

    Ok(())
}

/// Load a lottery with its tickets and winners.
pub async fn get_lottery(pool: &Pool, uuid: Uuid) -> Result<Option<LotteryRows>, DatabaseError> {
    debug!("Fetching lottery: {}", uuid);

    let client = client(pool).await?;
    let Some(row) = client
        .query_opt(
            r#"
            SELECT uuid, pool_id, name, start_epoch, end_epoch, count_epochs,
                   draw_date, created_at, strategy_type, owners_allowed, min_live_stake
            FROM lotteries
            WHERE uuid = $1
            "#,
            &[&uuid],
        )
        .await?
    else {
        return Ok(None);
    };

    let tickets = client
        .query(
            r#"
            SELECT lottery_id, position, delegator_id, winning_likelyhood,
                   pool_owner, delegator_lottery_stake
            FROM lottery_tickets
            WHERE lottery_id = $1
            ORDER BY position
            "#,
            &[&uuid],
        )
        .await?;

    let winners = client
        .query(
            r#"
            SELECT lottery_id, delegator_address_id, rank
            FROM lottery_winners
            WHERE lottery_id = $1
            ORDER BY rank
            "#,
            &[&uuid],
        )
        .await?;

    Ok(Some(LotteryRows {
        lottery: row_to_lottery(&row),
        tickets: tickets.iter().map(row_to_ticket).collect(),
        winners: winners.iter().map(row_to_winner).collect(),
    }))
}

/// Lottery ids, newest first.
pub async fn list_lottery_ids(pool: &Pool, limit: i64) -> Result<Vec<Uuid>, DatabaseError> {
    let client = client(pool).await?;
    let rows = client
        .query(
            "SELECT uuid FROM lotteries ORDER BY created_at DESC LIMIT $1",
            &[&limit],
        )
        .await?;

    Ok(rows.iter().map(|row| row.get("uuid")).collect())
}
