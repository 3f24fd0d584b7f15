// User database repository
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::user::{CreateUser, UpdateAssistant, User, UserError, UserProfile};

pub struct UserRepository;

impl UserRepository {
    /// Find user by email (emails are stored lower-cased)
    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, UserError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<User>, UserError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    /// Create a new user. A duplicate email maps to `UserError::EmailTaken`.
    pub async fn create(pool: &SqlitePool, data: CreateUser) -> Result<User, UserError> {
        let now = Utc::now();
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(UserError::EmailTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the assistant name, and the image when one is supplied.
    pub async fn update_assistant(
        pool: &SqlitePool,
        user_id: Uuid,
        update: UpdateAssistant,
    ) -> Result<User, UserError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET assistant_name = ?1,
                assistant_image = COALESCE(?2, assistant_image),
                updated_at = ?3
            WHERE id = ?4
            RETURNING *
            "#,
        )
        .bind(&update.assistant_name)
        .bind(&update.assistant_image)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(UserError::NotFound)
    }

    /// Append one command to the user's history
    pub async fn append_history(
        pool: &SqlitePool,
        user_id: Uuid,
        query: &str,
    ) -> Result<(), UserError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_history (user_id, query, created_at)
            SELECT id, ?2, ?3 FROM users WHERE id = ?1
            "#,
        )
        .bind(user_id)
        .bind(query)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        Ok(())
    }

    /// History in the order it was recorded
    pub async fn history(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<String>, UserError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT query FROM user_history WHERE user_id = ?1 ORDER BY id ASC")
                .bind(user_id)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(query,)| query).collect())
    }

    /// Get user with their history
    pub async fn get_profile(pool: &SqlitePool, user_id: Uuid) -> Result<UserProfile, UserError> {
        let user = Self::find_by_id(pool, user_id)
            .await?
            .ok_or(UserError::NotFound)?;
        let history = Self::history(pool, user_id).await?;
        Ok(user.into_profile(history))
    }
}
