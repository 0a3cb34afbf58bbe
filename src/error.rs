// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type shared by the sync engine and the route layer.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The token endpoint rejected a code or refresh token (HTTP 400/429).
    /// Fatal to the enclosing operation; never retried.
    #[error("Token exchange rejected ({status}): {body}")]
    AuthExchange { status: u16, body: String },

    /// No credential is stored; the user has to log in first.
    #[error("No user connected")]
    NoCredential,

    /// A single catalog fetch failed for good (non-2xx or retries exhausted).
    /// Recorded against the entity being processed; the sync carries on.
    #[error("Catalog fetch failed ({}): {message}", status_label(.status))]
    ItemFetch {
        status: Option<u16>,
        message: String,
    },

    #[error("Catalog API error: {0}")]
    CatalogApi(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "no response".to_string(), |s| s.to_string())
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
            AppError::AuthExchange { status, body } => (
                StatusCode::UNAUTHORIZED,
                "auth_exchange_rejected",
                Some(format!("{}: {}", status, body)),
            ),
            AppError::NoCredential => (StatusCode::UNAUTHORIZED, "no_user", None),
            AppError::ItemFetch { message, .. } => {
                (StatusCode::BAD_GATEWAY, "catalog_error", Some(message.clone()))
            }
            AppError::CatalogApi(msg) => {
                (StatusCode::BAD_GATEWAY, "catalog_error", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
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

/// Result type alias for the engine and handlers
pub type Result<T> = std::result::Result<T, AppError>;
