use crate::errors::{AppError, INVALID_REQUEST};
use crate::models::{
    AppStateEntry, AppStateMap, AppStateRequest, ClearDataResponse, LAST_USED_KEY, PageQuery,
    USAGE_COUNT_KEY, UsageLog, UsageLogRequest, parse_counter,
};
use crate::state::AppState;
use crate::stats::{self, date_key};
use crate::ui::{IndexPage, render_index};
use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    response::{Html, Redirect},
};
use chrono::Local;
use serde_json::Value;
use tracing::info;

pub async fn get_app_state(State(state): State<AppState>) -> Result<Json<AppStateMap>, AppError> {
    let map = state
        .db
        .app_state()
        .await
        .map_err(|err| AppError::store("Failed to fetch app state", err))?;
    Ok(Json(map))
}

pub async fn upsert_app_state(
    State(state): State<AppState>,
    payload: Result<Json<AppStateRequest>, JsonRejection>,
) -> Result<Json<AppStateEntry>, AppError> {
    let Json(payload) = payload?;
    let key = payload
        .key
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AppError::bad_request(INVALID_REQUEST))?;
    let value = payload
        .value
        .ok_or_else(|| AppError::bad_request(INVALID_REQUEST))?;

    let entry = state
        .db
        .upsert_app_state(&key, &value)
        .await
        .map_err(|err| AppError::store("Failed to create/update app state", err))?;

    info!(key = %entry.key, value = %entry.value, "app state updated");
    Ok(Json(entry))
}

pub async fn get_usage_logs(State(state): State<AppState>) -> Result<Json<Vec<UsageLog>>, AppError> {
    let logs = state
        .db
        .usage_logs()
        .await
        .map_err(|err| AppError::store("Failed to fetch usage logs", err))?;
    Ok(Json(logs))
}

pub async fn record_usage(
    State(state): State<AppState>,
    payload: Result<Json<UsageLogRequest>, JsonRejection>,
) -> Result<Json<UsageLog>, AppError> {
    let Json(payload) = payload?;
    let date = payload
        .date
        .filter(|date| !date.trim().is_empty())
        .ok_or_else(|| AppError::bad_request(INVALID_REQUEST))?;
    let delta = payload
        .count
        .as_ref()
        .and_then(Value::as_i64)
        .ok_or_else(|| AppError::bad_request(INVALID_REQUEST))?;

    let log = state
        .db
        .record_usage(&date, delta)
        .await
        .map_err(|err| AppError::store("Failed to create/update usage log", err))?;

    info!(date = %log.date, delta, count = log.count, "usage logged");
    Ok(Json(log))
}

pub async fn clear_data(State(state): State<AppState>) -> Result<Json<ClearDataResponse>, AppError> {
    state
        .db
        .clear_all()
        .await
        .map_err(|err| AppError::store("Failed to clear data", err))?;

    Ok(Json(ClearDataResponse {
        message: "All data cleared successfully".to_string(),
    }))
}

pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let today = Local::now().date_naive();
    let month = query
        .month
        .as_deref()
        .and_then(stats::parse_month)
        .unwrap_or_else(|| stats::first_of_month(today));

    let (logs, app_state) = tokio::try_join!(state.db.usage_logs(), state.db.app_state())
        .map_err(|err| AppError::store("Failed to load tracker data", err))?;

    let page = IndexPage {
        today,
        month,
        usage_count: parse_counter(app_state.get(USAGE_COUNT_KEY)),
        last_used: app_state.get(LAST_USED_KEY).map(String::as_str),
        summary: stats::summarize(&logs),
        logs: &logs,
    };
    Ok(Html(render_index(&page)))
}

/// Log one use for today and advance the counter since the last lens change.
pub async fn log_action(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let today = date_key(Local::now().date_naive());
    let fail = |err| AppError::store("Failed to log usage", err);

    let log = state.db.record_usage(&today, 1).await.map_err(fail)?;
    let current = state
        .db
        .app_state_value(USAGE_COUNT_KEY)
        .await
        .map_err(fail)?;
    let next = parse_counter(current.as_ref()) + 1;
    state
        .db
        .upsert_app_state(USAGE_COUNT_KEY, &Value::from(next))
        .await
        .map_err(fail)?;
    state
        .db
        .upsert_app_state(LAST_USED_KEY, &Value::from(today.as_str()))
        .await
        .map_err(fail)?;

    info!(date = %log.date, count = log.count, usage_count = next, "usage logged from page");
    Ok(Redirect::to("/"))
}

/// Reset the counter for a new pair of lenses; history is kept.
pub async fn reset_action(State(state): State<AppState>) -> Result<Redirect, AppError> {
    state
        .db
        .upsert_app_state(USAGE_COUNT_KEY, &Value::from(0))
        .await
        .map_err(|err| AppError::store("Failed to reset counter", err))?;
    info!("usage counter reset");
    Ok(Redirect::to("/"))
}

pub async fn clear_action(State(state): State<AppState>) -> Result<Redirect, AppError> {
    state
        .db
        .clear_all()
        .await
        .map_err(|err| AppError::store("Failed to clear data", err))?;
    Ok(Redirect::to("/"))
}
