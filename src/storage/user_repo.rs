use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::storage::records::user::UserRecord;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct UserRepository {}

impl UserRepository {
    pub fn new() -> Self {
        Self {}
    }

    /// Inserts a new user. A username collision surfaces as `Conflict` even
    /// when the pre-insert existence check raced with another registration.
    pub async fn create<'e, E>(
        &self,
        executor: E,
        first_name: &str,
        last_name: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<User>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record: UserRecord = sqlx::query_as(
            r#"
            INSERT INTO users (first_name, last_name, username, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, first_name, last_name, password_hash, created_at
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(username)
        .bind(password_hash)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
                AppError::Conflict("User with this username already exists".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(record.into())
    }

    pub async fn find_by_username<'e, E>(&self, executor: E, username: &str) -> Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record: Option<UserRecord> = sqlx::query_as(
            r#"
            SELECT id, username, first_name, last_name, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(record.map(Into::into))
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record: Option<UserRecord> = sqlx::query_as(
            r#"
            SELECT id, username, first_name, last_name, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(record.map(Into::into))
    }
}
