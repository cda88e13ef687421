//! Where the bearer credential of the signed-in user comes from.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Raw token of the current session, `None` when signed out.
    async fn token(&self) -> Result<Option<String>>;
}

/// Session held in process memory.
#[derive(Default)]
pub struct MemoryTokens {
    token: RwLock<Option<String>>,
}

impl MemoryTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(token: impl Into<String>) -> Self {
        let s = Self::new();
        s.save_token(token);
        s
    }

    pub fn save_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear_session(&self) {
        *self.token.write() = None;
    }
}

#[async_trait]
impl TokenProvider for MemoryTokens {
    async fn token(&self) -> Result<Option<String>> {
        Ok(self.token.read().clone())
    }
}

/// Session persisted in the local `users` table, as written by the login
/// flow. Whichever row exists is the signed-in user.
pub struct SqlxSessionStore {
    pool: SqlitePool,
}

impl SqlxSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replaces any previous session with `email`/`token`.
    #[instrument(skip(self, token), target = "session")]
    pub async fn save_user(&self, email: &str, token: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM users;").execute(&mut *tx).await?;
        sqlx::query("INSERT INTO users (email, token) VALUES (?, ?);")
            .bind(email)
            .bind(token)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("session saved");
        Ok(())
    }

    #[instrument(skip(self), target = "session")]
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM users;").execute(&self.pool).await?;
        debug!("session cleared");
        Ok(())
    }
}

#[async_trait]
impl TokenProvider for SqlxSessionStore {
    async fn token(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT token FROM users LIMIT 1;")
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(r.try_get::<Option<String>, _>("token")?),
            None => Ok(None),
        }
    }
}
