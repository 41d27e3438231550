use crate::error::{AppError, Result};
use crate::storage::records::auth::{NewRefreshToken, RefreshTokenRecord};
use sqlx::{Executor, PgConnection, Postgres};
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, user_id, hashed_token, hashed_csrf_token, expires_at, \
     revoked_at, rotated_at, user_agent, ip_address, created_at, updated_at";

#[derive(Clone, Debug, Default)]
pub struct RefreshTokenRepository {}

impl RefreshTokenRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub async fn create<'e, E>(&self, executor: E, token: &NewRefreshToken) -> Result<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO auth_refresh_tokens
                (id, user_id, hashed_token, hashed_csrf_token, expires_at, user_agent, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.hashed_token)
        .bind(&token.hashed_csrf_token)
        .bind(token.expires_at)
        .bind(&token.user_agent)
        .bind(&token.ip_address)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<RefreshTokenRecord>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM auth_refresh_tokens WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(record)
    }

    /// Fetches a record with a row lock so a concurrent refresh on the same
    /// lineage serializes behind this transaction. The loser then observes
    /// `revoked_at` already set and takes the replay branch.
    pub async fn find_by_id_for_update(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<RefreshTokenRecord>> {
        let record = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM auth_refresh_tokens WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(record)
    }

    /// Sets `revoked_at` on a still-active record. Returns false when the
    /// record was already revoked; `revoked_at` is monotonic and never cleared.
    pub async fn mark_revoked<'e, E>(&self, executor: E, id: Uuid) -> Result<bool>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE auth_refresh_tokens
            SET revoked_at = now(), updated_at = now()
            WHERE id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Revokes the old record and inserts its replacement. Must run inside
    /// the caller's transaction; the conditional predicate makes a racing
    /// duplicate rotation lose cleanly instead of producing two active
    /// records for one lineage.
    pub async fn rotate(
        &self,
        conn: &mut PgConnection,
        old_id: Uuid,
        replacement: &NewRefreshToken,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE auth_refresh_tokens
            SET revoked_at = now(), rotated_at = now(), updated_at = now()
            WHERE id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(old_id)
        .execute(&mut *conn)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() != 1 {
            return Ok(false);
        }

        self.create(&mut *conn, replacement).await?;
        Ok(true)
    }

    /// Revokes every non-revoked record belonging to a user. Returns the
    /// number of records swept.
    pub async fn revoke_all_for_user<'e, E>(&self, executor: E, user_id: Uuid) -> Result<u64>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE auth_refresh_tokens
            SET revoked_at = now(), updated_at = now()
            WHERE user_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}
