//! HTTP surface — axum router, route handlers, and error mapping.
//!
//! Routes:
//! - GET /login        redirect to the provider consent URL
//! - GET /callback     complete the authorization-code exchange
//! - GET /get-token    current valid token for a user, refreshed on demand

mod error;
mod routes;

pub use error::ApiError;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::core::HttpTransport;
use crate::flows::SessionExchange;
use crate::lifecycle::TokenLifecycleManager;
use crate::store::TokenStore;
use crate::types::ServiceConfig;

/// Shared application state passed to all route handlers.
pub struct AppState<T: HttpTransport, S: TokenStore, E: SessionExchange> {
    /// Startup configuration, read-only for the process lifetime.
    pub config: ServiceConfig,
    /// Token lifecycle manager (lookup + refresh-on-demand).
    pub manager: TokenLifecycleManager<T, S>,
    /// Store gateway, used directly by the callback path.
    pub store: Arc<S>,
    /// Identity provider session exchange.
    pub exchange: Arc<E>,
}

impl<T: HttpTransport, S: TokenStore, E: SessionExchange> AppState<T, S, E> {
    /// Wire the lifecycle manager and wrap the state in an `Arc`.
    pub fn new(
        config: ServiceConfig,
        transport: Arc<T>,
        store: Arc<S>,
        exchange: Arc<E>,
    ) -> Arc<Self> {
        let manager = TokenLifecycleManager::new(
            config.provider.clone(),
            config.credentials.clone(),
            transport,
            store.clone(),
        );
        Arc::new(Self {
            config,
            manager,
            store,
            exchange,
        })
    }
}

/// Build the full axum router.
pub fn make_router<T, S, E>(state: Arc<AppState<T, S, E>>) -> Router
where
    T: HttpTransport + 'static,
    S: TokenStore + 'static,
    E: SessionExchange + 'static,
{
    Router::new()
        .route("/login", get(routes::login::<T, S, E>))
        .route("/callback", get(routes::callback::<T, S, E>))
        .route("/get-token", get(routes::get_token::<T, S, E>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MockHttpTransport;
    use crate::error::TokenServiceError;
    use crate::flows::MockSessionExchange;
    use crate::store::{InMemoryTokenStore, TokenStore as _};
    use crate::types::{
        epoch_now, AuthorizedSession, ClientCredentials, DatabaseConfig, ProviderConfig,
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use secrecy::SecretString;
    use serde_json::Value;

    struct Harness {
        server: TestServer,
        transport: Arc<MockHttpTransport>,
        store: Arc<InMemoryTokenStore>,
        exchange: Arc<MockSessionExchange>,
    }

    fn harness() -> Harness {
        let config = ServiceConfig {
            provider: ProviderConfig {
                authorization_endpoint: "https://provider.test/authorize".to_string(),
                token_endpoint: "https://provider.test/token".to_string(),
            },
            credentials: ClientCredentials {
                client_id: "client-1".to_string(),
                client_secret: SecretString::new("secret-1".to_string()),
                redirect_url: "https://service.test/callback".to_string(),
            },
            database: DatabaseConfig::from_url("postgres://svc@localhost/tokens").unwrap(),
            port: 8080,
        };

        let transport = Arc::new(MockHttpTransport::new());
        let store = Arc::new(InMemoryTokenStore::new());
        let exchange = Arc::new(MockSessionExchange::new());

        let state = AppState::new(
            config,
            transport.clone(),
            store.clone(),
            exchange.clone(),
        );
        let server = TestServer::new(make_router(state)).unwrap();

        Harness {
            server,
            transport,
            store,
            exchange,
        }
    }

    #[tokio::test]
    async fn test_login_redirects_to_consent_url() {
        let h = harness();
        let response = h.server.get("/login").await;

        assert_eq!(response.status_code(), StatusCode::TEMPORARY_REDIRECT);
        let location = response.header("location");
        let location = location.to_str().unwrap();
        assert!(location.starts_with("https://provider.test/authorize?"));
        assert!(location.contains("client_id=client-1"));
    }

    #[tokio::test]
    async fn test_callback_persists_session_and_redirects_home() {
        let h = harness();
        h.exchange.set_next_session(AuthorizedSession {
            user_id: "u1".to_string(),
            access_token: "A1".to_string(),
            refresh_token: "R1".to_string(),
            expires_at: epoch_now() + 3600,
        });

        let response = h
            .server
            .get("/callback")
            .add_query_param("code", "one-time-code")
            .await;

        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(response.header("location").to_str().unwrap(), "/");
        assert_eq!(h.exchange.code_history(), vec!["one-time-code".to_string()]);

        let stored = h.store.fetch_latest("u1").await.unwrap();
        assert_eq!(stored.access_token, "A1");
    }

    #[tokio::test]
    async fn test_callback_exchange_failure_is_500() {
        let h = harness();
        h.exchange.set_next_error(TokenServiceError::Exchange {
            message: "invalid_grant".to_string(),
        });

        let response = h
            .server
            .get("/callback")
            .add_query_param("code", "stale")
            .await;

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_get_token_fresh_returns_expiry() {
        let h = harness();
        let expires_at = epoch_now() + 600;
        h.store.upsert("u1", "A1", "R1", expires_at).await.unwrap();

        let response = h
            .server
            .get("/get-token")
            .add_query_param("user_id", "u1")
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["access_token"], "A1");
        assert_eq!(body["expires_at"], expires_at);
        assert!(body.get("message").is_none());
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_get_token_expired_returns_refresh_message() {
        let h = harness();
        h.store.upsert("u1", "A1", "R1", 1000).await.unwrap();
        h.transport.queue_response(
            200,
            r#"{"access_token":"A2","refresh_token":"R2","expires_in":3600}"#,
        );

        let response = h
            .server
            .get("/get-token")
            .add_query_param("user_id", "u1")
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["access_token"], "A2");
        assert!(body["message"].as_str().unwrap().contains("refreshed"));
    }

    #[tokio::test]
    async fn test_get_token_unknown_user_is_404() {
        let h = harness();
        let response = h
            .server
            .get("/get-token")
            .add_query_param("user_id", "ghost")
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert!(body["error"].is_string());
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_get_token_provider_rejection_is_500() {
        let h = harness();
        h.store.upsert("u1", "A1", "R1", 1000).await.unwrap();
        h.transport.queue_response(400, r#"{"error":"invalid_grant"}"#);

        let response = h
            .server
            .get("/get-token")
            .add_query_param("user_id", "u1")
            .await;

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        // Record untouched after the failed refresh.
        let stored = h.store.fetch_latest("u1").await.unwrap();
        assert_eq!(stored.access_token, "A1");
        assert_eq!(stored.refresh_token, "R1");
        assert_eq!(stored.expires_at, 1000);
    }
}
