//! Error Types
//!
//! Typed errors per component boundary so call sites can distinguish a
//! missing record from a provider rejection from a datastore failure.

use thiserror::Error;

/// Startup configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Missing required environment variable: {field}")]
    MissingRequired { field: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Token store gateway error.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No token record for user: {user_id}")]
    NotFound { user_id: String },

    #[error("Connection pool error: {message}")]
    Pool { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },
}

/// Root error type for the token lifecycle service.
///
/// Nothing here is retried automatically; a failed refresh requires the
/// caller to re-invoke the lookup.
#[derive(Error, Debug)]
pub enum TokenServiceError {
    #[error("No stored token for user: {user_id}")]
    NoTokenForUser { user_id: String },

    #[error("Authorization code exchange failed: {message}")]
    Exchange { message: String },

    #[error("Provider refused token refresh (HTTP {status}): {body}")]
    ProviderRefresh { status: u16, body: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Invalid provider response: {message}")]
    InvalidResponse { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl TokenServiceError {
    /// Error code for log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoTokenForUser { .. } => "NO_TOKEN_FOR_USER",
            Self::Exchange { .. } => "EXCHANGE",
            Self::ProviderRefresh { .. } => "PROVIDER_REFRESH",
            Self::Persistence(_) => "PERSISTENCE",
            Self::Network { .. } => "NETWORK",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::Configuration(_) => "CONFIGURATION",
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, TokenServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_maps_into_persistence() {
        let err: TokenServiceError = StoreError::Query {
            message: "connection reset".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), "PERSISTENCE");
    }

    #[test]
    fn test_error_codes_cover_provider_failures() {
        let err = TokenServiceError::ProviderRefresh {
            status: 400,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        };
        assert_eq!(err.error_code(), "PROVIDER_REFRESH");

        let err = TokenServiceError::NoTokenForUser {
            user_id: "u1".to_string(),
        };
        assert_eq!(err.error_code(), "NO_TOKEN_FOR_USER");
    }
}
