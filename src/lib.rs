//! OAuth2 Token Lifecycle Service
//!
//! Manages access/refresh token lifecycle for third-party-authenticated
//! users: obtains tokens via an authorization-code exchange, persists them,
//! and serves a "current valid token" lookup that transparently refreshes
//! expired tokens on demand.
//!
//! # Architecture
//!
//! - `types`: data model (token records, provider wire types) and startup
//!   configuration
//! - `error`: typed error taxonomy per component boundary
//! - `core`: HTTP transport seam toward the provider's token endpoint
//! - `store`: token store gateway (Postgres, in-memory, mock)
//! - `flows`: authorization-code exchange against the identity provider
//! - `lifecycle`: expiry evaluation, refresh-on-demand, write-back
//! - `api`: axum routes (`/login`, `/callback`, `/get-token`)

pub mod api;
pub mod core;
pub mod error;
pub mod flows;
pub mod lifecycle;
pub mod store;
pub mod types;

// Re-export the surface most callers need.
pub use api::{make_router, ApiError, AppState};
pub use error::{ConfigurationError, ServiceResult, StoreError, TokenServiceError};
pub use flows::{authorization_url, HttpSessionExchange, SessionExchange};
pub use lifecycle::TokenLifecycleManager;
pub use store::{InMemoryTokenStore, PostgresTokenStore, TokenStore};
pub use types::{
    AuthorizedSession, ClientCredentials, DatabaseConfig, ProviderConfig, ServiceConfig,
    TokenRecord, ValidToken,
};
