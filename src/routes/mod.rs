use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::ledger::{error::LedgerError, notify::BroadcastSink, Ledger};

pub mod admin;
pub mod auth;
pub mod tx;
pub mod user;
pub mod utils;

use auth::AuthService;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub auth: Arc<AuthService>,
    pub events: BroadcastSink,
}

/// Error half of every handler: a status code and a human-readable reason,
/// rendered as `{"error": reason}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<StatusCode> for ApiError {
    fn from(status: StatusCode) -> Self {
        let message = match status {
            StatusCode::UNAUTHORIZED => "Invalid token",
            _ => status.canonical_reason().unwrap_or("Request failed"),
        };
        Self::new(status, message)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            LedgerError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
            LedgerError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
            LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {err}");
            return Self::new(status, "Failed to persist ledger");
        }
        tracing::warn!("Request rejected: {err}");
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
