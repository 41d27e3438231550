use crate::domain::user::User;
use time::OffsetDateTime;
use uuid::Uuid;

/// The tuple handed back after register, login and refresh. The raw secret
/// values exist only here and in the client's cookies; they are never stored.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserProfile,
    pub access_token: IssuedAccessToken,
    pub refresh_token: IssuedRefreshToken,
    pub csrf_token: String,
}

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub value: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub id: Uuid,
    pub value: String,
    pub expires_at: OffsetDateTime,
}

/// Best-effort request context recorded on each refresh token record.
#[derive(Debug, Clone, Default)]
pub struct SessionMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}
