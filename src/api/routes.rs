//! Route handlers.

use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::{ApiError, AppState};
use crate::core::HttpTransport;
use crate::error::TokenServiceError;
use crate::flows::{authorization_url, SessionExchange};
use crate::store::TokenStore;

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

#[derive(Deserialize)]
pub struct GetTokenQuery {
    pub user_id: String,
}

/// `GET /login` — redirect the user to the provider's consent URL.
pub async fn login<T, S, E>(State(state): State<Arc<AppState<T, S, E>>>) -> Redirect
where
    T: HttpTransport + 'static,
    S: TokenStore + 'static,
    E: SessionExchange + 'static,
{
    let url = authorization_url(&state.config.provider, &state.config.credentials);
    Redirect::temporary(&url)
}

/// `GET /callback?code=` — complete the authorization-code exchange and
/// persist the session, then send the user home.
pub async fn callback<T, S, E>(
    State(state): State<Arc<AppState<T, S, E>>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, ApiError>
where
    T: HttpTransport + 'static,
    S: TokenStore + 'static,
    E: SessionExchange + 'static,
{
    let code = query.code.ok_or_else(|| {
        ApiError(TokenServiceError::Exchange {
            message: "missing code parameter in callback".to_string(),
        })
    })?;

    let session = state.exchange.complete_authorization(&code).await?;

    // The session is not usable until persisted; a write failure aborts the
    // exchange even though upstream authorization succeeded.
    state
        .store
        .upsert(
            &session.user_id,
            &session.access_token,
            &session.refresh_token,
            session.expires_at,
        )
        .await
        .map_err(TokenServiceError::Persistence)?;

    Ok(Redirect::to("/"))
}

/// `GET /get-token?user_id=` — current valid token, refreshed on demand.
pub async fn get_token<T, S, E>(
    State(state): State<Arc<AppState<T, S, E>>>,
    Query(query): Query<GetTokenQuery>,
) -> Result<Json<Value>, ApiError>
where
    T: HttpTransport + 'static,
    S: TokenStore + 'static,
    E: SessionExchange + 'static,
{
    let token = state.manager.get_valid_token(&query.user_id).await?;

    let body = if token.refreshed {
        json!({
            "access_token": token.access_token,
            "message": "token was expired and has been refreshed",
        })
    } else {
        json!({
            "access_token": token.access_token,
            "expires_at": token.expires_at,
        })
    };

    Ok(Json(body))
}
