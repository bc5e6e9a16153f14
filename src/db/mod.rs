//! Database module for track, artist, and album persistence.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage.
//!
//! - [`query`]: declarative filters compiled to bound SQL
//! - [`repo`]: table-generic paging, counting and batch writes
//! - [`tracks`]: track rows, owned by the scanner
//! - [`entities`]: artist and album rows, owned by the entity index
//!
//! This layer knows nothing about business rules; the scanner and entity
//! index decide what to write and when.
//!
//! # Example
//!
//! ```ignore
//! use tune_ledger::db::{init_db, db_url};
//!
//! let pool = init_db(&db_url(None)).await?;
//! ```

pub mod entities;
pub mod query;
pub mod repo;
pub mod tracks;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use query::{Condition, Filter, Sort, SortDirection, Table, Value};
pub use repo::{Conflict, Page, PageRequest, Pagination, Record};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "tune_ledger.db";

/// Default database location: the OS data directory, or the current
/// directory if that cannot be determined.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("tune-ledger").join(DEFAULT_DB_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_NAME))
}

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
///
/// # Errors
///
/// Returns an error if:
/// - Database creation fails
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::debug!(target: "db", url = db_url, "Database ready");
    Ok(pool)
}

/// Current time as stored in the database (RFC 3339).
pub(crate) fn now_text() -> String {
    Utc::now().to_rfc3339()
}

/// Parse a stored timestamp. Unparseable values read as "now" rather than
/// failing the whole row.
pub(crate) fn parse_timestamp(text: &str) -> DateTime<Utc> {
    text.parse().unwrap_or_else(|_| Utc::now())
}

/// Decode a JSON list column, treating malformed content as empty.
pub(crate) fn parse_json_list<T: serde::de::DeserializeOwned + Default>(text: &str) -> T {
    serde_json::from_str(text).unwrap_or_default()
}

/// Encode a list for a JSON column.
pub(crate) fn to_json_list<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}
