use crate::storage::DbPool;
use std::time::Duration;
use tokio::time::timeout;

const DB_PING_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct HealthService {
    pool: DbPool,
}

impl HealthService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Checks database connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the database is unreachable.
    pub async fn check_db(&self) -> Result<(), String> {
        match timeout(DB_PING_TIMEOUT, sqlx::query("SELECT 1").execute(&self.pool)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(format!("Database connection failed: {e:?}")),
            Err(_) => Err("Database connection timed out".to_string()),
        }
    }
}
