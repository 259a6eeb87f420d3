//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by table:
//! - `transactions.rs` - Append-only transaction log
//! - `positions.rs` - Current-state position snapshots
//! - `markets.rs` - Per-block market parameter observations
//!
//! Address registry operations live here.

mod markets;
mod positions;
mod transactions;

use crate::domain::Address;
use alloy_primitives::U256;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// One `(user, token)` pair the indexer has seen interact with the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredAddress {
    pub user_address: Address,
    pub token_symbol: String,
    pub token_address: Address,
}

/// Repository for database operations.
#[derive(Debug)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Record that `user` interacted with a token.
    ///
    /// Returns `true` if the pair was new; a repeated `(user, symbol)` is a no-op.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn register_address(
        &self,
        user: &Address,
        token_symbol: &str,
        token_address: &Address,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_addresses (user_address, token_symbol, token_address, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_address, token_symbol) DO NOTHING
            "#,
        )
        .bind(user.as_str())
        .bind(token_symbol)
        .bind(token_address.as_str())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Registry entries for a user, ordered by symbol.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_registered_addresses(
        &self,
        user: &Address,
    ) -> Result<Vec<RegisteredAddress>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_address, token_symbol, token_address
            FROM user_addresses
            WHERE user_address = ?
            ORDER BY token_symbol ASC
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| RegisteredAddress {
                user_address: Address::new(row.get::<String, _>("user_address")),
                token_symbol: row.get::<String, _>("token_symbol"),
                token_address: Address::new(row.get::<String, _>("token_address")),
            })
            .collect())
    }

    /// Every distinct user in the registry, in first-seen order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_registered_users(&self) -> Result<Vec<Address>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_address, MIN(created_at) AS first_seen
            FROM user_addresses
            GROUP BY user_address
            ORDER BY first_seen ASC, user_address ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Address::new(row.get::<String, _>("user_address")))
            .collect())
    }
}

/// SQLite integers are signed; block numbers and timestamps fit comfortably.
fn to_db_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Parse a stored decimal amount, warning and defaulting to zero on corruption.
fn parse_amount(column: &str, raw: &str) -> U256 {
    U256::from_str(raw).unwrap_or_else(|e| {
        warn!("Invalid {} value {:?} in database: {}", column, raw, e);
        U256::ZERO
    })
}
