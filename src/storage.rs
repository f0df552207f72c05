use crate::models::{AppStateEntry, AppStateMap, UsageLog};
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("SQLite error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to create database directory: {0}")]
    CreateDir(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Inline schema migrations, applied in order and tracked in `_migrations`.
const MIGRATIONS: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS usage_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL UNIQUE,
    count INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS app_state (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
];

/// Handle to the tracker's SQLite database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file at `path` and run migrations.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        info!("database opened at {}", path.display());
        Ok(db)
    }

    /// In-memory database for tests. A single connection that is never
    /// recycled, since the data lives only as long as that connection.
    pub async fn new_in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)")
            .execute(&self.pool)
            .await?;

        let (current,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM _migrations")
                .fetch_one(&self.pool)
                .await?;

        for (index, migration) in MIGRATIONS.iter().enumerate() {
            let version = index as i64 + 1;
            if version <= current {
                continue;
            }
            let mut tx = self.pool.begin().await?;
            sqlx::query(migration).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO _migrations (version) VALUES (?1)")
                .bind(version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            debug!(version, "applied migration");
        }
        Ok(())
    }

    /// Every app-state pair as a flat mapping.
    pub async fn app_state(&self) -> StoreResult<AppStateMap> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM app_state")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn app_state_value(&self, key: &str) -> StoreResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM app_state WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    /// Insert or overwrite the value stored under `key`.
    ///
    /// Runs as one `INSERT .. ON CONFLICT` statement, so concurrent writers
    /// to the same key never produce a second row; the last write wins.
    pub async fn upsert_app_state(&self, key: &str, value: &Value) -> StoreResult<AppStateEntry> {
        if key.is_empty() {
            return Err(StoreError::InvalidInput("key must not be empty".into()));
        }
        if value.is_null() {
            return Err(StoreError::InvalidInput("value must be defined".into()));
        }

        let stored = to_stored_value(value);
        let entry = sqlx::query_as::<_, AppStateEntry>(
            "INSERT INTO app_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = CURRENT_TIMESTAMP
             RETURNING id, key, value, updated_at",
        )
        .bind(key)
        .bind(&stored)
        .fetch_one(&self.pool)
        .await?;

        debug!(key, value = %stored, "app state written");
        Ok(entry)
    }

    /// All usage rows, newest date first.
    pub async fn usage_logs(&self) -> StoreResult<Vec<UsageLog>> {
        let logs = sqlx::query_as::<_, UsageLog>(
            "SELECT id, date, count, created_at, updated_at
             FROM usage_logs
             ORDER BY date DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    /// Add `delta` to the count for `date`, creating the row on first use.
    ///
    /// The increment happens inside the statement, so parallel calls for the
    /// same date accumulate. Negative deltas are applied as-is; the count has
    /// no floor. A sum outside the `i64` range would be stored by SQLite as a
    /// REAL, so the update is skipped and reported as invalid input instead.
    pub async fn record_usage(&self, date: &str, delta: i64) -> StoreResult<UsageLog> {
        if date.trim().is_empty() {
            return Err(StoreError::InvalidInput("date must not be empty".into()));
        }

        let log = sqlx::query_as::<_, UsageLog>(
            "INSERT INTO usage_logs (date, count) VALUES (?1, ?2)
             ON CONFLICT(date) DO UPDATE SET
                 count = usage_logs.count + excluded.count,
                 updated_at = CURRENT_TIMESTAMP
             WHERE typeof(usage_logs.count + excluded.count) = 'integer'
             RETURNING id, date, count, created_at, updated_at",
        )
        .bind(date)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            StoreError::InvalidInput(format!("count for {date} would overflow by {delta}"))
        })?;

        debug!(date, delta, count = log.count, "usage recorded");
        Ok(log)
    }

    /// Close the pool; later queries fail with `PoolClosed`.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Delete every row of both tables in one transaction.
    pub async fn clear_all(&self) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let logs = sqlx::query("DELETE FROM usage_logs").execute(&mut *tx).await?;
        let states = sqlx::query("DELETE FROM app_state").execute(&mut *tx).await?;
        tx.commit().await?;

        info!(
            usage_logs = logs.rows_affected(),
            app_state = states.rows_affected(),
            "cleared all data"
        );
        Ok(())
    }
}

/// Text form of a JSON value as stored in `app_state.value`.
///
/// Strings are kept verbatim. Numbers and booleans use their JSON text, so
/// `5` becomes `"5"` and `1.0` becomes `"1.0"`. Arrays and objects are stored
/// as compact JSON. The original type is not recoverable.
pub fn to_stored_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
