//! PostgreSQL user repository

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use super::{UserRepository, bounded};
use crate::error::AuthResult;
use crate::models::{NewUser, User};

/// User repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserRepository {
    /// Create a new user repository; every statement is bounded by `timeout`
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, new_user: &NewUser) -> AuthResult<User> {
        info!("Creating new user: {}", new_user.username);

        // Uniqueness is left to the UNIQUE constraint; a violation maps to AlreadyExists.
        let user = bounded(
            self.timeout,
            sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (username, password_hash)
                VALUES ($1, $2)
                RETURNING id, username, password_hash, created_at
                "#,
            )
            .bind(&new_user.username)
            .bind(&new_user.password_hash)
            .fetch_one(&self.pool),
        )
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        bounded(
            self.timeout,
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, username, password_hash, created_at
                FROM users
                WHERE username = $1
                "#,
            )
            .bind(username)
            .fetch_optional(&self.pool),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_decodes<T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>>() {}

    #[test]
    fn test_user_decodes_from_postgres_rows() {
        assert_decodes::<User>();
    }
}
