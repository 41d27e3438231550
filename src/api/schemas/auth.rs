use crate::domain::session::Session;
use crate::domain::user::User;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

/// Session payload returned by register, login and refresh. The raw token
/// values travel only in cookies; the body carries expiries and the CSRF
/// token, which is deliberately not a secret (only the pairing matters).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserView,
    #[serde(with = "time::serde::rfc3339")]
    pub access_token_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_token_expires_at: OffsetDateTime,
    pub csrf_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            user: UserView {
                id: session.user.id,
                username: session.user.username.clone(),
                first_name: session.user.first_name.clone(),
                last_name: session.user.last_name.clone(),
            },
            access_token_expires_at: session.access_token.expires_at,
            refresh_token_expires_at: session.refresh_token.expires_at,
            csrf_token: session.csrf_token.clone(),
        }
    }
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::{IssuedAccessToken, IssuedRefreshToken, UserProfile};

    #[test]
    fn test_session_response_exposes_no_raw_secrets() {
        let now = OffsetDateTime::now_utc();
        let session = Session {
            user: UserProfile {
                id: Uuid::new_v4(),
                username: "analima".to_string(),
                first_name: "Ana".to_string(),
                last_name: "Lima".to_string(),
            },
            access_token: IssuedAccessToken { value: "raw-jwt".to_string(), expires_at: now },
            refresh_token: IssuedRefreshToken {
                id: Uuid::new_v4(),
                value: "raw-refresh-secret".to_string(),
                expires_at: now,
            },
            csrf_token: "csrf-public".to_string(),
        };

        let body = serde_json::to_string(&SessionResponse::from(&session)).unwrap();

        assert!(!body.contains("raw-jwt"));
        assert!(!body.contains("raw-refresh-secret"));
        assert!(body.contains("csrf-public"));
        assert!(body.contains("\"username\":\"analima\""));
        assert!(body.contains("accessTokenExpiresAt"));
        assert!(body.contains("refreshTokenExpiresAt"));
    }

    #[test]
    fn test_registration_deserializes_camel_case() {
        let payload: Registration = serde_json::from_str(
            r#"{"firstName":"Ana","lastName":"Lima","password":"secret123"}"#,
        )
        .unwrap();

        assert_eq!(payload.first_name, "Ana");
        assert_eq!(payload.last_name, "Lima");
    }
}
