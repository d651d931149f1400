//! Authorization-Code Exchange
//!
//! Thin entry point of the lifecycle: trades a one-time code for an initial
//! session. The provider's consent/redirect flow itself is an external
//! collaborator; this module only builds the consent URL and performs the
//! code exchange.

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::{basic_authorization, encode_form, FormRequest, HttpTransport};
use crate::error::TokenServiceError;
use crate::types::{
    epoch_now, AuthorizedSession, ClientCredentials, ProviderConfig, SessionResponse,
};

/// Consent URL the user is redirected to from `/login`.
pub fn authorization_url(provider: &ProviderConfig, credentials: &ClientCredentials) -> String {
    let query = encode_form(&[
        ("response_type", "code"),
        ("client_id", credentials.client_id.as_str()),
        ("redirect_uri", credentials.redirect_url.as_str()),
    ]);
    format!("{}?{}", provider.authorization_endpoint, query)
}

/// Session-exchange capability of the identity provider.
#[async_trait]
pub trait SessionExchange: Send + Sync {
    /// Exchange an authorization code for an initial session.
    async fn complete_authorization(
        &self,
        code: &str,
    ) -> Result<AuthorizedSession, TokenServiceError>;
}

/// Exchange over the provider's token endpoint.
pub struct HttpSessionExchange<T: HttpTransport> {
    provider: ProviderConfig,
    credentials: ClientCredentials,
    transport: Arc<T>,
}

impl<T: HttpTransport> HttpSessionExchange<T> {
    pub fn new(
        provider: ProviderConfig,
        credentials: ClientCredentials,
        transport: Arc<T>,
    ) -> Self {
        Self {
            provider,
            credentials,
            transport,
        }
    }
}

#[async_trait]
impl<T: HttpTransport> SessionExchange for HttpSessionExchange<T> {
    async fn complete_authorization(
        &self,
        code: &str,
    ) -> Result<AuthorizedSession, TokenServiceError> {
        let body = encode_form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.credentials.redirect_url.as_str()),
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
            tracing::warn!(status = response.status, "code exchange rejected by provider");
            return Err(TokenServiceError::Exchange {
                message: format!("HTTP {}: {}", response.status, response.body),
            });
        }

        let session: SessionResponse =
            serde_json::from_str(&response.body).map_err(|e| TokenServiceError::InvalidResponse {
                message: e.to_string(),
            })?;

        let expires_at = session.absolute_expiry(epoch_now()).ok_or_else(|| {
            TokenServiceError::InvalidResponse {
                message: "session response carries no expiry".to_string(),
            }
        })?;

        tracing::info!(user_id = %session.user_id, "authorization code exchanged");

        Ok(AuthorizedSession {
            user_id: session.user_id,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at,
        })
    }
}

/// Mock exchange for route tests.
#[derive(Default)]
pub struct MockSessionExchange {
    next_session: std::sync::Mutex<Option<AuthorizedSession>>,
    next_error: std::sync::Mutex<Option<TokenServiceError>>,
    code_history: std::sync::Mutex<Vec<String>>,
}

impl MockSessionExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_next_session(&self, session: AuthorizedSession) -> &Self {
        *self.next_session.lock().unwrap() = Some(session);
        self
    }

    pub fn set_next_error(&self, error: TokenServiceError) -> &Self {
        *self.next_error.lock().unwrap() = Some(error);
        self
    }

    pub fn code_history(&self) -> Vec<String> {
        self.code_history.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionExchange for MockSessionExchange {
    async fn complete_authorization(
        &self,
        code: &str,
    ) -> Result<AuthorizedSession, TokenServiceError> {
        self.code_history.lock().unwrap().push(code.to_string());

        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Err(error);
        }
        if let Some(session) = self.next_session.lock().unwrap().take() {
            return Ok(session);
        }

        Ok(AuthorizedSession {
            user_id: "mock-user".to_string(),
            access_token: "mock-access-token".to_string(),
            refresh_token: "mock-refresh-token".to_string(),
            expires_at: epoch_now() + 3600,
        })
    }
}
