use crate::storage::StoreError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

pub const INVALID_REQUEST: &str = "Invalid request data";

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// A 500 carrying `message`; the underlying error is logged, not returned.
    pub fn internal(message: impl Into<String>, err: impl std::error::Error) -> Self {
        let message = message.into();
        error!(error = %err, "{message}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }

    /// Map a store failure, using `context` as the message for server errors.
    pub fn store(context: &str, err: StoreError) -> Self {
        match err {
            StoreError::InvalidInput(reason) => {
                warn!(%reason, "rejected request");
                Self::bad_request(INVALID_REQUEST)
            }
            other => Self::internal(context, other),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(reason = %rejection.body_text(), "rejected request body");
        Self::bad_request(INVALID_REQUEST)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
