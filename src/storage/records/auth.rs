use time::OffsetDateTime;
use uuid::Uuid;

/// Persisted refresh token record. Holds only argon2 digests of the refresh
/// secret and the CSRF token; the raw values never reach storage. Records are
/// revoked or rotated, never deleted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hashed_token: String,
    pub hashed_csrf_token: String,
    pub expires_at: OffsetDateTime,
    pub revoked_at: Option<OffsetDateTime>,
    pub rotated_at: Option<OffsetDateTime>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl RefreshTokenRecord {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }
}

/// Insert shape for a new refresh token record.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hashed_token: String,
    pub hashed_csrf_token: String,
    pub expires_at: OffsetDateTime,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn record(expires_in: Duration, revoked: bool) -> RefreshTokenRecord {
        let now = OffsetDateTime::now_utc();
        RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            hashed_token: "digest".to_string(),
            hashed_csrf_token: "digest".to_string(),
            expires_at: now + expires_in,
            revoked_at: revoked.then_some(now),
            rotated_at: None,
            user_agent: None,
            ip_address: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_expiry_and_revocation_checks() {
        assert!(record(Duration::seconds(-1), false).is_expired());
        assert!(!record(Duration::hours(1), false).is_expired());
        assert!(record(Duration::hours(1), true).is_revoked());
        assert!(!record(Duration::hours(1), false).is_revoked());
    }
}
