use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Full application: the overview page, its form actions, and the JSON API
/// served both at the root and under `/api`.
pub fn router(state: AppState) -> Router {
    let api = api_router();
    Router::new()
        .route("/", get(handlers::index))
        .route("/actions/log", post(handlers::log_action))
        .route("/actions/reset", post(handlers::reset_action))
        .route("/actions/clear", post(handlers::clear_action))
        .merge(api.clone())
        .nest("/api", api)
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route(
            "/app-state",
            get(handlers::get_app_state).post(handlers::upsert_app_state),
        )
        .route(
            "/usage-logs",
            get(handlers::get_usage_logs).post(handlers::record_usage),
        )
        .route("/clear-data", delete(handlers::clear_data))
}
