//! In-memory token stores for tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::store::TokenStore;
use crate::types::TokenRecord;

/// In-memory store keeping the full per-user issuance history, with the same
/// latest-by-`created_at` selection as the Postgres store.
#[derive(Default)]
pub struct InMemoryTokenStore {
    rows: Mutex<HashMap<String, Vec<TokenRecord>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records for a user, history included.
    pub fn record_count(&self, user_id: &str) -> usize {
        self.rows
            .lock()
            .unwrap()
            .get(user_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Index of the latest record: highest `created_at`, later insertion wins
/// ties.
fn latest_index(records: &[TokenRecord]) -> Option<usize> {
    let mut latest: Option<usize> = None;
    for (i, record) in records.iter().enumerate() {
        match latest {
            Some(j) if records[j].created_at > record.created_at => {}
            _ => latest = Some(i),
        }
    }
    latest
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn upsert(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        let record = TokenRecord {
            user_id: user_id.to_string(),
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        self.rows
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn fetch_latest(&self, user_id: &str) -> Result<TokenRecord, StoreError> {
        let rows = self.rows.lock().unwrap();
        rows.get(user_id)
            .and_then(|records| latest_index(records).map(|i| records[i].clone()))
            .ok_or_else(|| StoreError::NotFound {
                user_id: user_id.to_string(),
            })
    }

    async fn update_latest(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let records = rows.get_mut(user_id).ok_or_else(|| StoreError::NotFound {
            user_id: user_id.to_string(),
        })?;
        let i = latest_index(records).ok_or_else(|| StoreError::NotFound {
            user_id: user_id.to_string(),
        })?;

        records[i].access_token = access_token.to_string();
        records[i].refresh_token = refresh_token.to_string();
        records[i].expires_at = expires_at;
        Ok(())
    }
}

/// Mock store with call histories and failure injection.
#[derive(Default)]
pub struct MockTokenStore {
    records: Mutex<HashMap<String, TokenRecord>>,
    upsert_history: Mutex<Vec<TokenRecord>>,
    fetch_history: Mutex<Vec<String>>,
    update_history: Mutex<Vec<TokenRecord>>,
    should_fail: Mutex<bool>,
}

impl MockTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the latest record for a user.
    pub fn add_record(&self, record: TokenRecord) -> &Self {
        self.records
            .lock()
            .unwrap()
            .insert(record.user_id.clone(), record);
        self
    }

    /// Make every operation fail with a query error.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn upsert_history(&self) -> Vec<TokenRecord> {
        self.upsert_history.lock().unwrap().clone()
    }

    pub fn fetch_history(&self) -> Vec<String> {
        self.fetch_history.lock().unwrap().clone()
    }

    pub fn update_history(&self) -> Vec<TokenRecord> {
        self.update_history.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        if *self.should_fail.lock().unwrap() {
            return Err(StoreError::Query {
                message: "Mock store failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MockTokenStore {
    async fn upsert(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        self.check_failure()?;
        let record = TokenRecord {
            user_id: user_id.to_string(),
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        self.upsert_history.lock().unwrap().push(record.clone());
        self.records
            .lock()
            .unwrap()
            .insert(user_id.to_string(), record);
        Ok(())
    }

    async fn fetch_latest(&self, user_id: &str) -> Result<TokenRecord, StoreError> {
        self.check_failure()?;
        self.fetch_history.lock().unwrap().push(user_id.to_string());
        self.records
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                user_id: user_id.to_string(),
            })
    }

    async fn update_latest(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        self.check_failure()?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound {
                user_id: user_id.to_string(),
            })?;
        record.access_token = access_token.to_string();
        record.refresh_token = refresh_token.to_string();
        record.expires_at = expires_at;
        self.update_history.lock().unwrap().push(record.clone());
        Ok(())
    }
}
