//! PostgreSQL session repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use uuid::Uuid;

use super::{SessionRepository, bounded};
use crate::error::AuthResult;
use crate::models::{NewSession, SessionMetadata, SessionRecord};

#[derive(Debug, FromRow)]
struct SessionRow {
    token: String,
    user_id: Uuid,
    username: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    metadata: Json<serde_json::Value>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        // Metadata is informational; an unreadable blob degrades to empty.
        let metadata: SessionMetadata = serde_json::from_value(row.metadata.0).unwrap_or_default();
        Self {
            token: row.token,
            user_id: row.user_id,
            username: row.username,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            metadata,
        }
    }
}

/// Session repository backed by the `sessions` table
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgSessionRepository {
    /// Create a new session repository; every statement is bounded by `timeout`
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn insert_if_absent(&self, session: &NewSession) -> AuthResult<bool> {
        let result = bounded(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO sessions (token, user_id, issued_at, expires_at, metadata)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (token) DO NOTHING
                "#,
            )
            .bind(&session.token)
            .bind(session.user_id)
            .bind(session.issued_at)
            .bind(session.expires_at)
            .bind(Json(&session.metadata))
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_valid(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<SessionRecord>> {
        let row = bounded(
            self.timeout,
            sqlx::query_as::<_, SessionRow>(
                r#"
                SELECT s.token, s.user_id, u.username, s.issued_at, s.expires_at, s.metadata
                FROM sessions s
                JOIN users u ON u.id = s.user_id
                WHERE s.token = $1
                  AND s.expires_at > $2
                "#,
            )
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(SessionRecord::from))
    }

    async fn delete(&self, token: &str) -> AuthResult<()> {
        bounded(
            self.timeout,
            sqlx::query("DELETE FROM sessions WHERE token = $1")
                .bind(token)
                .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> AuthResult<u64> {
        let result = bounded(
            self.timeout,
            sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
                .bind(cutoff)
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected())
    }
}
