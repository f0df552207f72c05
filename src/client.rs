//! HTTP client for the tracker API and the client-side cache built on it.

use crate::models::{
    AppStateEntry, AppStateMap, ClearDataResponse, LAST_USED_KEY, USAGE_COUNT_KEY, UsageLog,
    parse_counter,
};
use crate::stats::{self, UsageSummary, date_key};
use chrono::{Local, NaiveDate};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} ({status})")]
    Status { status: StatusCode, message: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Typed wrapper over the five JSON endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn fetch_usage_logs(&self) -> ClientResult<Vec<UsageLog>> {
        let response = self.http.get(self.url("/usage-logs")).send().await?;
        decode(response, "Failed to fetch usage logs").await
    }

    /// Add `count` uses to `date`; the server answers with the accumulated row.
    pub async fn log_usage(&self, date: &str, count: i64) -> ClientResult<UsageLog> {
        let response = self
            .http
            .post(self.url("/usage-logs"))
            .json(&json!({ "date": date, "count": count }))
            .send()
            .await?;
        decode(response, "Failed to log usage").await
    }

    pub async fn fetch_app_state(&self) -> ClientResult<AppStateMap> {
        let response = self.http.get(self.url("/app-state")).send().await?;
        decode(response, "Failed to fetch app state").await
    }

    pub async fn update_app_state(
        &self,
        key: &str,
        value: impl Into<Value>,
    ) -> ClientResult<AppStateEntry> {
        let response = self
            .http
            .post(self.url("/app-state"))
            .json(&json!({ "key": key, "value": value.into() }))
            .send()
            .await?;
        decode(response, "Failed to update app state").await
    }

    pub async fn clear_all_data(&self) -> ClientResult<()> {
        let response = self.http.delete(self.url("/clear-data")).send().await?;
        let body: ClearDataResponse = decode(response, "Failed to clear data").await?;
        debug!(message = %body.message, "cleared remote data");
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response, context: &str) -> ClientResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status {
            status,
            message: context.to_string(),
        });
    }
    Ok(response.json::<T>().await?)
}

/// Client-side view of the tracker: a cache of server state that is only
/// updated from successful responses.
#[derive(Debug, Clone)]
pub struct Tracker {
    api: ApiClient,
    usage_count: i64,
    last_used: Option<String>,
    logs: Vec<UsageLog>,
}

impl Tracker {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            usage_count: 0,
            last_used: None,
            logs: Vec::new(),
        }
    }

    pub async fn load(api: ApiClient) -> ClientResult<Self> {
        let mut tracker = Self::new(api);
        tracker.refresh().await?;
        Ok(tracker)
    }

    /// Replace the cache with a fresh copy of logs and app state.
    pub async fn refresh(&mut self) -> ClientResult<()> {
        let (logs, state) =
            tokio::try_join!(self.api.fetch_usage_logs(), self.api.fetch_app_state())?;
        self.logs = logs;
        self.usage_count = parse_counter(state.get(USAGE_COUNT_KEY));
        self.last_used = state.get(LAST_USED_KEY).cloned();
        Ok(())
    }

    pub async fn log_usage(&mut self) -> ClientResult<UsageLog> {
        self.log_usage_on(Local::now().date_naive()).await
    }

    /// Record one use on `date`, then persist the counter and last-used date.
    pub async fn log_usage_on(&mut self, date: NaiveDate) -> ClientResult<UsageLog> {
        let date = date_key(date);
        let updated = self.api.log_usage(&date, 1).await?;
        self.store_log(updated.clone());

        let next_count = self.usage_count + 1;
        tokio::try_join!(
            self.api.update_app_state(USAGE_COUNT_KEY, next_count),
            self.api.update_app_state(LAST_USED_KEY, date.as_str()),
        )?;
        self.usage_count = next_count;
        self.last_used = Some(date);
        Ok(updated)
    }

    /// Start counting again for a new pair of lenses. History is kept.
    pub async fn reset_counter(&mut self) -> ClientResult<()> {
        self.api.update_app_state(USAGE_COUNT_KEY, 0).await?;
        self.usage_count = 0;
        Ok(())
    }

    pub async fn clear_history(&mut self) -> ClientResult<()> {
        self.api.clear_all_data().await?;
        self.logs.clear();
        self.last_used = None;
        self.usage_count = 0;
        Ok(())
    }

    // Keeps `logs` newest-first, matching the server ordering.
    fn store_log(&mut self, log: UsageLog) {
        if let Some(slot) = self.logs.iter_mut().find(|cached| cached.date == log.date) {
            *slot = log;
            return;
        }
        let position = self
            .logs
            .iter()
            .position(|cached| cached.date < log.date)
            .unwrap_or(self.logs.len());
        self.logs.insert(position, log);
    }

    pub fn usage_count(&self) -> i64 {
        self.usage_count
    }

    pub fn last_used(&self) -> Option<&str> {
        self.last_used.as_deref()
    }

    pub fn logs(&self) -> &[UsageLog] {
        &self.logs
    }

    pub fn summary(&self) -> UsageSummary {
        stats::summarize(&self.logs)
    }

    pub fn usage_for_date(&self, date: NaiveDate) -> i64 {
        stats::usage_for_date(&self.logs, date)
    }
}
