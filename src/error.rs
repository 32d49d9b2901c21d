// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Markers the auth provider uses to reject a stale or missing credential.
///
/// Matched as substrings against raw provider error messages, since the
/// provider reports these conditions in free-form text.
const SESSION_ERROR_MARKERS: &[&str] = &[
    "Auth session missing",
    "Invalid JWT",
    "JWT expired",
    "session_not_found",
    "401",
    "403",
];

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Auth API error: {0}")]
    AuthApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether this error indicates a stale/expired/missing credential
    /// that should trigger a session purge.
    pub fn is_session_error(&self) -> bool {
        match self {
            AppError::AuthApi(msg) | AppError::Database(msg) => {
                SESSION_ERROR_MARKERS.iter().any(|m| msg.contains(m))
            }
            _ => false,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::AuthApi(msg) => {
                if self.is_session_error() {
                    (StatusCode::UNAUTHORIZED, "session_expired", None)
                } else {
                    (StatusCode::BAD_GATEWAY, "auth_error", Some(msg.clone()))
                }
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
