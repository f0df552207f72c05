use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeMap;

/// App-state key holding the number of uses since the last lens change.
pub const USAGE_COUNT_KEY: &str = "usageCount";
/// App-state key holding the date of the most recent logged use.
pub const LAST_USED_KEY: &str = "lastUsed";

/// Flat `key -> value` view of the `app_state` table.
pub type AppStateMap = BTreeMap<String, String>;

/// Stored counter value, treating a missing or unparseable value as zero.
pub fn parse_counter(value: Option<&String>) -> i64 {
    value
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

/// One row of `usage_logs`: the number of uses recorded for a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLog {
    pub id: i64,
    pub date: String,
    pub count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for UsageLog {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            date: row.try_get("date")?,
            count: row.try_get("count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// One row of `app_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStateEntry {
    pub id: i64,
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for AppStateEntry {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            key: row.try_get("key")?,
            value: row.try_get("value")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Body of `POST /app-state`. Fields stay loose so validation can report
/// a uniform 400 instead of a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct AppStateRequest {
    pub key: Option<String>,
    pub value: Option<Value>,
}

/// Body of `POST /usage-logs`.
#[derive(Debug, Default, Deserialize)]
pub struct UsageLogRequest {
    pub date: Option<String>,
    pub count: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearDataResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub month: Option<String>,
}
