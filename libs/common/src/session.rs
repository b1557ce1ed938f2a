//! Session tokens: one opaque bearer token per user
//!
//! Tokens are random 40-character hex keys persisted in `auth_tokens`.
//! The table's unique constraint on `user_id` is what guarantees a user
//! never holds two live tokens; [`SessionIssuer::issue`] is get-or-create
//! on top of it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::{DatabaseError, DatabaseResult};

/// A live session token
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionToken {
    pub key: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Errors returned by the session issuer
#[derive(Error, Debug)]
pub enum SessionError {
    /// Revoking a user that holds no token
    #[error("User is not logged in or token does not exist.")]
    NoActiveSession,

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Storage for session tokens
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert `candidate_key` for the user unless a token already exists,
    /// then return whichever token is stored
    async fn get_or_create(&self, user_id: Uuid, candidate_key: &str) -> DatabaseResult<SessionToken>;

    /// Look up a token by its key
    async fn find_by_key(&self, key: &str) -> DatabaseResult<Option<SessionToken>>;

    /// Delete the user's token, returning whether one existed
    async fn delete_for_user(&self, user_id: Uuid) -> DatabaseResult<bool>;
}

/// Generate a fresh random token key
pub fn generate_key() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Issues, resolves and revokes session tokens
#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn TokenStore>,
}

impl SessionIssuer {
    /// Create a new session issuer over a token store
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Return the user's live token, creating one if needed
    pub async fn issue(&self, user_id: Uuid) -> Result<SessionToken, SessionError> {
        let token = self.store.get_or_create(user_id, &generate_key()).await?;
        info!("Issued session token for user: {}", user_id);
        Ok(token)
    }

    /// Delete the user's token
    pub async fn revoke(&self, user_id: Uuid) -> Result<(), SessionError> {
        if self.store.delete_for_user(user_id).await? {
            info!("Revoked session token for user: {}", user_id);
            Ok(())
        } else {
            Err(SessionError::NoActiveSession)
        }
    }

    /// Resolve a presented key to its token
    pub async fn authenticate(&self, key: &str) -> Result<Option<SessionToken>, SessionError> {
        Ok(self.store.find_by_key(key).await?)
    }
}

/// PostgreSQL-backed token store
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    /// Create a new token store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn get_or_create(&self, user_id: Uuid, candidate_key: &str) -> DatabaseResult<SessionToken> {
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (key, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(candidate_key)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT key, user_id, created_at
            FROM auth_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(SessionToken {
            key: row.get("key"),
            user_id: row.get("user_id"),
            created_at: row.get("created_at"),
        })
    }

    async fn find_by_key(&self, key: &str) -> DatabaseResult<Option<SessionToken>> {
        let row = sqlx::query(
            r#"
            SELECT key, user_id, created_at
            FROM auth_tokens
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| SessionToken {
            key: row.get("key"),
            user_id: row.get("user_id"),
            created_at: row.get("created_at"),
        }))
    }

    async fn delete_for_user(&self, user_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-memory token store
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<Mutex<HashMap<Uuid, SessionToken>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get_or_create(&self, user_id: Uuid, candidate_key: &str) -> DatabaseResult<SessionToken> {
        let mut tokens = self.tokens.lock().await;
        let token = tokens.entry(user_id).or_insert_with(|| SessionToken {
            key: candidate_key.to_string(),
            user_id,
            created_at: Utc::now(),
        });
        Ok(token.clone())
    }

    async fn find_by_key(&self, key: &str) -> DatabaseResult<Option<SessionToken>> {
        let tokens = self.tokens.lock().await;
        Ok(tokens.values().find(|token| token.key == key).cloned())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> DatabaseResult<bool> {
        let mut tokens = self.tokens.lock().await;
        Ok(tokens.remove(&user_id).is_some())
    }
}
