//! Token Lifecycle Manager
//!
//! Serves the current valid access token for a user, refreshing expired
//! tokens on demand and writing the refreshed values back through the store
//! gateway.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::{basic_authorization, encode_form, FormRequest, HttpTransport};
use crate::error::{ServiceResult, StoreError, TokenServiceError};
use crate::store::TokenStore;
use crate::types::{
    epoch_now, ClientCredentials, ProviderConfig, ProviderTokenResponse, TokenRecord, ValidToken,
};

/// Lifecycle manager over a single user's stored token.
pub struct TokenLifecycleManager<T: HttpTransport, S: TokenStore> {
    provider: ProviderConfig,
    credentials: ClientCredentials,
    transport: Arc<T>,
    store: Arc<S>,
    /// Per-user refresh guards. Concurrent lookups of the same expired record
    /// collapse into one provider call; entries live for the process
    /// lifetime, bounded by the user population.
    refresh_guards: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<T: HttpTransport, S: TokenStore> TokenLifecycleManager<T, S> {
    pub fn new(
        provider: ProviderConfig,
        credentials: ClientCredentials,
        transport: Arc<T>,
        store: Arc<S>,
    ) -> Self {
        Self {
            provider,
            credentials,
            transport,
            store,
            refresh_guards: Mutex::new(HashMap::new()),
        }
    }

    /// Return a currently-valid access token for the user.
    ///
    /// A fresh stored token is returned unchanged with no network call and no
    /// write. An expired one (strictly positive remaining lifetime required;
    /// equal-to-now counts as expired) is refreshed via the provider and
    /// written back, exactly once.
    pub async fn get_valid_token(&self, user_id: &str) -> ServiceResult<ValidToken> {
        let record = self.fetch_record(user_id).await?;
        if record.is_fresh(epoch_now()) {
            return Ok(ValidToken {
                access_token: record.access_token,
                expires_at: record.expires_at,
                refreshed: false,
            });
        }

        let guard = self.guard_for(user_id);
        let _held = guard.lock().await;

        // Re-read under the guard: another caller may have refreshed while we
        // waited, in which case its result is ours too.
        let record = self.fetch_record(user_id).await?;
        if record.is_fresh(epoch_now()) {
            return Ok(ValidToken {
                access_token: record.access_token,
                expires_at: record.expires_at,
                refreshed: true,
            });
        }

        let updated = self.refresh_record(record).await?;
        Ok(ValidToken {
            access_token: updated.access_token,
            expires_at: updated.expires_at,
            refreshed: true,
        })
    }

    /// Force a refresh of the user's latest token, independent of expiry.
    pub async fn refresh(&self, user_id: &str) -> ServiceResult<TokenRecord> {
        let guard = self.guard_for(user_id);
        let _held = guard.lock().await;

        let record = self.fetch_record(user_id).await?;
        self.refresh_record(record).await
    }

    /// Refresh-grant request against the provider's token endpoint, then
    /// write-back. The update is attempted only after the provider responds
    /// successfully, so a failed refresh leaves no partial write.
    async fn refresh_record(&self, record: TokenRecord) -> ServiceResult<TokenRecord> {
        let body = encode_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", record.refresh_token.as_str()),
            ("client_id", self.credentials.client_id.as_str()),
        ]);

        let request = FormRequest {
            url: self.provider.token_endpoint.clone(),
            headers: [
                (
                    "content-type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ),
                ("accept".to_string(), "application/json".to_string()),
                (
                    "authorization".to_string(),
                    basic_authorization(&self.credentials),
                ),
            ]
            .into_iter()
            .collect(),
            body,
        };

        let response = self.transport.post_form(request).await?;

        if !response.is_success() {
            // Revocation and transient failure look the same from here; both
            // are terminal for this call, never retried.
            tracing::warn!(
                user_id = %record.user_id,
                status = response.status,
                "provider refused token refresh"
            );
            return Err(TokenServiceError::ProviderRefresh {
                status: response.status,
                body: response.body,
            });
        }

        let parsed: ProviderTokenResponse =
            serde_json::from_str(&response.body).map_err(|e| TokenServiceError::InvalidResponse {
                message: e.to_string(),
            })?;

        let expires_at = parsed.absolute_expiry(epoch_now()).ok_or_else(|| {
            TokenServiceError::InvalidResponse {
                message: "refresh response carries no expiry".to_string(),
            }
        })?;

        // The provider does not guarantee refresh-token rotation; retain the
        // stored one when the response omits it.
        let refresh_token = parsed.refresh_token.unwrap_or(record.refresh_token);

        self.store
            .update_latest(&record.user_id, &parsed.access_token, &refresh_token, expires_at)
            .await
            .map_err(|e| {
                // Provider-side token is now valid but the local store is
                // stale; the caller must retry the read path.
                tracing::error!(user_id = %record.user_id, error = %e, "refresh write-back failed");
                TokenServiceError::Persistence(e)
            })?;

        tracing::info!(user_id = %record.user_id, expires_at, "access token refreshed");

        Ok(TokenRecord {
            user_id: record.user_id,
            access_token: parsed.access_token,
            refresh_token,
            expires_at,
            created_at: record.created_at,
        })
    }

    async fn fetch_record(&self, user_id: &str) -> ServiceResult<TokenRecord> {
        self.store.fetch_latest(user_id).await.map_err(|e| match e {
            StoreError::NotFound { user_id } => TokenServiceError::NoTokenForUser { user_id },
            other => TokenServiceError::Persistence(other),
        })
    }

    fn guard_for(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut guards = self.refresh_guards.lock().unwrap();
        guards
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MockHttpTransport;
    use crate::store::{InMemoryTokenStore, MockTokenStore};
    use chrono::Utc;
    use secrecy::SecretString;
    use serde_json::json;

    fn test_provider() -> ProviderConfig {
        ProviderConfig {
            authorization_endpoint: "https://provider.test/authorize".to_string(),
            token_endpoint: "https://provider.test/token".to_string(),
        }
    }

    fn test_credentials() -> ClientCredentials {
        ClientCredentials {
            client_id: "client-1".to_string(),
            client_secret: SecretString::new("secret-1".to_string()),
            redirect_url: "https://service.test/callback".to_string(),
        }
    }

    fn manager<S: TokenStore>(
        transport: Arc<MockHttpTransport>,
        store: Arc<S>,
    ) -> TokenLifecycleManager<MockHttpTransport, S> {
        TokenLifecycleManager::new(test_provider(), test_credentials(), transport, store)
    }

    fn record(user_id: &str, access: &str, refresh: &str, expires_at: i64) -> TokenRecord {
        TokenRecord {
            user_id: user_id.to_string(),
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fresh_token_returned_unchanged_with_zero_writes() {
        let transport = Arc::new(MockHttpTransport::new());
        let store = Arc::new(MockTokenStore::new());
        store.add_record(record("u1", "A1", "R1", epoch_now() + 600));

        let manager = manager(transport.clone(), store.clone());
        let token = manager.get_valid_token("u1").await.unwrap();

        assert_eq!(token.access_token, "A1");
        assert!(!token.refreshed);
        // No network call, no write.
        assert!(transport.requests().is_empty());
        assert!(store.update_history().is_empty());
        assert!(store.upsert_history().is_empty());
    }

    #[tokio::test]
    async fn test_expired_token_refreshed_with_exactly_one_write() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(&json!({
            "access_token": "A2",
            "refresh_token": "R2",
            "expires_in": 3600,
        }));
        let store = Arc::new(MockTokenStore::new());
        store.add_record(record("u1", "A1", "R1", epoch_now() - 10));

        let manager = manager(transport.clone(), store.clone());
        let token = manager.get_valid_token("u1").await.unwrap();

        assert_eq!(token.access_token, "A2");
        assert!(token.refreshed);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(store.update_history().len(), 1);

        let request = transport.last_request().unwrap();
        assert!(request.body.contains("grant_type=refresh_token"));
        assert!(request.body.contains("refresh_token=R1"));
        assert!(request.body.contains("client_id=client-1"));
        assert!(request.headers["authorization"].starts_with("Basic "));
    }

    #[tokio::test]
    async fn test_expiry_equal_to_now_takes_refresh_path() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(&json!({ "access_token": "A2", "expires_in": 3600 }));
        let store = Arc::new(MockTokenStore::new());
        // Zero remaining lifetime counts as expired.
        store.add_record(record("u1", "A1", "R1", epoch_now()));

        let manager = manager(transport.clone(), store);
        let token = manager.get_valid_token("u1").await.unwrap();

        assert!(token.refreshed);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_omitted_refresh_token_is_retained() {
        let transport = Arc::new(MockHttpTransport::new());
        // Provider sends a new access token and absolute expiry, no rotation.
        transport.queue_json_response(&json!({ "access_token": "A2", "expires_at": 2000 }));
        let store = Arc::new(InMemoryTokenStore::new());
        store.upsert("u1", "A1", "R1", 1000).await.unwrap();

        let manager = manager(transport, store.clone());
        let updated = manager.refresh("u1").await.unwrap();

        assert_eq!(updated.access_token, "A2");
        assert_eq!(updated.refresh_token, "R1");
        assert_eq!(updated.expires_at, 2000);

        let stored = store.fetch_latest("u1").await.unwrap();
        assert_eq!(stored.access_token, "A2");
        assert_eq!(stored.refresh_token, "R1");
        assert_eq!(stored.expires_at, 2000);
    }

    #[tokio::test]
    async fn test_unknown_user_fails_without_provider_call() {
        let transport = Arc::new(MockHttpTransport::new());
        let store = Arc::new(MockTokenStore::new());

        let manager = manager(transport.clone(), store);
        let result = manager.get_valid_token("ghost").await;

        assert!(matches!(
            result,
            Err(TokenServiceError::NoTokenForUser { .. })
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_record_unchanged() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(400, r#"{"error":"invalid_grant"}"#);
        let store = Arc::new(InMemoryTokenStore::new());
        store.upsert("u1", "A1", "R1", 1000).await.unwrap();
        let before = store.fetch_latest("u1").await.unwrap();

        let manager = manager(transport, store.clone());
        let result = manager.get_valid_token("u1").await;

        match result {
            Err(TokenServiceError::ProviderRefresh { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("expected ProviderRefresh, got {:?}", other.map(|_| ())),
        }
        // No spurious update.
        assert_eq!(store.fetch_latest("u1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_refresh_response_without_expiry_is_rejected_without_write() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(&json!({ "access_token": "A2" }));
        let store = Arc::new(InMemoryTokenStore::new());
        store.upsert("u1", "A1", "R1", 1000).await.unwrap();
        let before = store.fetch_latest("u1").await.unwrap();

        let manager = manager(transport, store.clone());
        let result = manager.refresh("u1").await;

        assert!(matches!(
            result,
            Err(TokenServiceError::InvalidResponse { .. })
        ));
        assert_eq!(store.fetch_latest("u1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_collapse_into_one_refresh() {
        let transport = Arc::new(MockHttpTransport::new());
        // Exactly one response available; a second provider call would fail.
        transport.queue_json_response(&json!({
            "access_token": "A2",
            "refresh_token": "R2",
            "expires_in": 3600,
        }));
        let store = Arc::new(InMemoryTokenStore::new());
        store.upsert("u1", "A1", "R1", 1000).await.unwrap();

        let manager = Arc::new(manager(transport.clone(), store));
        let (a, b) = tokio::join!(
            {
                let m = manager.clone();
                async move { m.get_valid_token("u1").await }
            },
            {
                let m = manager.clone();
                async move { m.get_valid_token("u1").await }
            }
        );

        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a.access_token, "A2");
        assert_eq!(b.access_token, "A2");
        assert!(a.refreshed && b.refreshed);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_persistence() {
        let transport = Arc::new(MockHttpTransport::new());
        let store = Arc::new(MockTokenStore::new());
        store.set_should_fail(true);

        let manager = manager(transport, store);
        let result = manager.get_valid_token("u1").await;
        assert!(matches!(result, Err(TokenServiceError::Persistence(_))));
    }
}
