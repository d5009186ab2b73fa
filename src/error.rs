use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::booking::BookingStatus;

/// Why a route fetch produced no usable route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteFailure {
    NoRoute,
    Transport(String),
}

impl std::fmt::Display for RouteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteFailure::NoRoute => write!(f, "no route found"),
            RouteFailure::Transport(msg) => write!(f, "routing transport error: {msg}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Accept race lost or the booking left `pending` before the claim landed.
    #[error("claim conflict: {0}")]
    ClaimConflict(String),

    #[error("invalid transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// Retried on the next poll tick.
    #[error("transient fetch error: {0}")]
    TransientFetch(String),

    #[error("route unavailable: {0}")]
    RouteUnavailable(RouteFailure),

    #[error("location permission denied")]
    PermissionDenied,

    #[error("auth error: {0}")]
    Auth(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ClaimConflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::InvalidTransition { .. } => (StatusCode::CONFLICT, self.to_string()),
            AppError::TransientFetch(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::RouteUnavailable(failure) => {
                (StatusCode::SERVICE_UNAVAILABLE, failure.to_string())
            }
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                "location permission denied".to_string(),
            ),
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
