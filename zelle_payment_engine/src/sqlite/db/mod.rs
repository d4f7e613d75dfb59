//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open an atomic transaction as the need arises and pass
//! `&mut *tx` through to the functions without any other changes.
//!
//! ## Write locks
//! SQLite allows a single writer at a time. A transaction that reads first and writes later can fail with
//! `SQLITE_BUSY` if another writer committed in between, and the busy timeout does not help in that case. Every
//! transaction that changes balances therefore begins with a write, which makes it take the write lock up front and
//! queue behind any other writer instead.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod audit_log;
pub mod payees;
pub mod payments;
pub mod scan_log;

const SQLITE_DB_URL: &str = "sqlite://data/zelle_payments.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub fn db_url() -> String {
    let result = env::var("ZPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ ZPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
