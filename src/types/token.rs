//! Token Types
//!
//! Persisted token records and provider wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current time as whole seconds since the Unix epoch.
pub fn epoch_now() -> i64 {
    Utc::now().timestamp()
}

/// One persisted token issuance for a user.
///
/// The authoritative record for a user is the one with the highest
/// `created_at`; earlier rows are history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Opaque external user identity, stable key.
    pub user_id: String,
    /// Short-lived bearer credential.
    pub access_token: String,
    /// Long-lived credential, possibly rotated by the provider on refresh.
    pub refresh_token: String,
    /// Absolute expiry instant, seconds since epoch.
    pub expires_at: i64,
    /// Write timestamp, used only to select the most recent record.
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    /// A token is fresh only with strictly positive remaining lifetime;
    /// `expires_at == now` counts as expired.
    pub fn is_fresh(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

/// Token endpoint response for a refresh grant.
///
/// Providers report expiry either as an absolute `expires_at` or a relative
/// `expires_in`; `refresh_token` is omitted when the provider does not
/// rotate it.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl ProviderTokenResponse {
    /// Absolute expiry, preferring the provider's own `expires_at`.
    pub fn absolute_expiry(&self, now: i64) -> Option<i64> {
        self.expires_at.or(self.expires_in.map(|secs| now + secs))
    }
}

/// Session-exchange response from the identity provider.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl SessionResponse {
    pub fn absolute_expiry(&self, now: i64) -> Option<i64> {
        self.expires_at.or(self.expires_in.map(|secs| now + secs))
    }
}

/// Result of a completed authorization-code exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthorizedSession {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Result of a valid-token lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidToken {
    pub access_token: String,
    pub expires_at: i64,
    /// Whether the stored token was expired and refreshed on demand, as
    /// opposed to returned unchanged.
    pub refreshed: bool,
}
