//! Postgres-backed token store.
//!
//! One row per issuance; the authoritative record is the head of the
//! `created_at`-descending order for the user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

use crate::error::StoreError;
use crate::store::TokenStore;
use crate::types::{DatabaseConfig, TokenRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS oauth_tokens (
    id            BIGSERIAL PRIMARY KEY,
    user_id       TEXT NOT NULL,
    access_token  TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    expires_at    BIGINT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS oauth_tokens_user_created
    ON oauth_tokens (user_id, created_at DESC);
";

const FETCH_LATEST: &str = "
SELECT user_id, access_token, refresh_token, expires_at, created_at
FROM oauth_tokens
WHERE user_id = $1
ORDER BY created_at DESC, id DESC
LIMIT 1
";

const INSERT: &str = "
INSERT INTO oauth_tokens (user_id, access_token, refresh_token, expires_at)
VALUES ($1, $2, $3, $4)
";

const UPDATE_LATEST: &str = "
UPDATE oauth_tokens
SET access_token = $2, refresh_token = $3, expires_at = $4
WHERE id = (
    SELECT id FROM oauth_tokens
    WHERE user_id = $1
    ORDER BY created_at DESC, id DESC
    LIMIT 1
)
";

/// Postgres connection pool wrapper implementing [`TokenStore`].
pub struct PostgresTokenStore {
    pool: Pool,
}

impl PostgresTokenStore {
    /// Create a connection pool from the datastore configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.user = Some(config.user.clone());
        cfg.password = Some(config.password.clone());
        cfg.dbname = Some(config.database.clone());

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Pool {
                message: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    /// Create the token table and index when absent.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let client = self.client().await?;
        client.batch_execute(SCHEMA).await.map_err(|e| StoreError::Query {
            message: e.to_string(),
        })
    }

    async fn client(&self) -> Result<deadpool_postgres::Client, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Pool {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl TokenStore for PostgresTokenStore {
    async fn upsert(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        let client = self.client().await?;
        client
            .execute(INSERT, &[&user_id, &access_token, &refresh_token, &expires_at])
            .await
            .map_err(|e| StoreError::Query {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn fetch_latest(&self, user_id: &str) -> Result<TokenRecord, StoreError> {
        let client = self.client().await?;
        let row = client
            .query_opt(FETCH_LATEST, &[&user_id])
            .await
            .map_err(|e| StoreError::Query {
                message: e.to_string(),
            })?
            .ok_or_else(|| StoreError::NotFound {
                user_id: user_id.to_string(),
            })?;

        Ok(TokenRecord {
            user_id: row.get::<_, String>(0),
            access_token: row.get::<_, String>(1),
            refresh_token: row.get::<_, String>(2),
            expires_at: row.get::<_, i64>(3),
            created_at: row.get::<_, DateTime<Utc>>(4),
        })
    }

    async fn update_latest(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        let client = self.client().await?;
        let updated = client
            .execute(
                UPDATE_LATEST,
                &[&user_id, &access_token, &refresh_token, &expires_at],
            )
            .await
            .map_err(|e| StoreError::Query {
                message: e.to_string(),
            })?;

        if updated == 0 {
            return Err(StoreError::NotFound {
                user_id: user_id.to_string(),
            });
        }
        Ok(())
    }
}
