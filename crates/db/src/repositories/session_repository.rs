// Session database repository
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::user::Session;

pub struct SessionRepository;

impl SessionRepository {
    /// Create a new session. Only the hash of the client token is stored.
    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        token_hash: &str,
        ttl: Duration,
    ) -> Result<Session, sqlx::Error> {
        let now = Utc::now();
        let expires_at = now + ttl;

        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, token_hash, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_hash)
        .bind(now)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// Find a live session by token hash
    pub async fn find_active(
        pool: &SqlitePool,
        token_hash: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        let session =
            sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token_hash = ?1")
                .bind(token_hash)
                .fetch_optional(pool)
                .await?;
        Ok(session.filter(|s| !s.is_expired()))
    }

    /// Delete session (logout)
    pub async fn delete_by_token_hash(pool: &SqlitePool, token_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?1")
            .bind(token_hash)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Clean up expired sessions
    pub async fn cleanup_expired(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
