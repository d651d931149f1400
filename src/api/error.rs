//! API error type mapping [`TokenServiceError`] variants to HTTP responses.
//!
//! Full error detail goes to the log; response bodies carry a generic
//! `{error}` message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::TokenServiceError;

/// Wrapper around [`TokenServiceError`] that implements [`IntoResponse`].
pub struct ApiError(pub TokenServiceError);

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            TokenServiceError::NoTokenForUser { .. } => {
                (StatusCode::NOT_FOUND, "no token stored for this user")
            }
            TokenServiceError::Exchange { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "authorization exchange failed",
            ),
            TokenServiceError::ProviderRefresh { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "token refresh was rejected by the provider",
            ),
            TokenServiceError::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence failure")
            }
            TokenServiceError::Network { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "provider unreachable")
            }
            TokenServiceError::InvalidResponse { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "provider returned an unexpected response",
            ),
            TokenServiceError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "service misconfigured")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.classify();
        tracing::error!(code = self.0.error_code(), error = %self.0, "request failed");
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<TokenServiceError> for ApiError {
    fn from(e: TokenServiceError) -> Self {
        Self(e)
    }
}
