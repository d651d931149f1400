//! Token Store Gateway
//!
//! Typed interface to the persistent token records, keyed by user identity.
//! `upsert` + `fetch_latest` + `update_latest` are independent calls with no
//! transactional guarantee across them.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::TokenRecord;

/// Capability set required by the lifecycle manager.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Record a new issuance for the user. The exchange path always inserts;
    /// prior records stay as history.
    async fn upsert(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError>;

    /// The single most-recently-created record for the user, tie-break
    /// highest `created_at`.
    async fn fetch_latest(&self, user_id: &str) -> Result<TokenRecord, StoreError>;

    /// Overwrite the latest record's token fields in place (refresh path).
    async fn update_latest(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError>;
}

pub use memory::{InMemoryTokenStore, MockTokenStore};
pub use postgres::PostgresTokenStore;
