use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Claims carried by the signed access token. Not persisted server-side;
/// signature and expiry are the only validation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

impl Claims {
    pub fn new(user_id: Uuid, username: String, ttl_secs: i64) -> Self {
        let expiration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(std::time::Duration::from_secs(0))
            .as_secs() as usize
            + ttl_secs.max(0) as usize;

        Self { sub: user_id, username, exp: expiration }
    }

    pub fn encode(&self, secret: &str) -> Result<String> {
        encode(&Header::default(), self, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|_| AppError::Internal)
    }

    /// Decodes and validates an access token, keeping the three failure
    /// classes distinguishable for the caller: expired, malformed/forged,
    /// and everything else.
    pub fn decode(token: &str, secret: &str) -> Result<Self> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => AppError::TokenInvalid,
            _ => AppError::AuthError,
        })?;

        Ok(token_data.claims)
    }
}

/// Slow, salted one-way hashing for the password and both session secrets.
/// Cost parameters are fixed in code on purpose.
pub struct CredentialHasher;

impl CredentialHasher {
    pub fn hash(secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|_| AppError::Internal)?
            .to_string();
        Ok(digest)
    }

    pub fn verify(secret: &str, digest: &str) -> Result<bool> {
        let parsed = PasswordHash::new(digest).map_err(|_| AppError::Internal)?;
        Ok(Argon2::default().verify_password(secret.as_bytes(), &parsed).is_ok())
    }
}

/// Opaque random session secrets. The refresh secret and the CSRF token are
/// generated independently; only their argon2 digests ever reach storage.
pub struct SessionSecrets;

impl SessionSecrets {
    const REFRESH_SECRET_BYTES: usize = 64;
    const CSRF_TOKEN_BYTES: usize = 32;

    pub fn refresh_secret() -> String {
        Self::random_hex(Self::REFRESH_SECRET_BYTES)
    }

    pub fn csrf_token() -> String {
        Self::random_hex(Self::CSRF_TOKEN_BYTES)
    }

    fn random_hex(len: usize) -> String {
        let mut bytes = vec![0u8; len];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

/// Parsed form of the refresh cookie value `"<id>.<secret>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCookie {
    pub id: Uuid,
    pub secret: String,
}

impl RefreshCookie {
    pub fn parse(raw: &str) -> Option<Self> {
        let (id, secret) = raw.split_once('.')?;
        if secret.is_empty() {
            return None;
        }
        let id = Uuid::parse_str(id).ok()?;
        Some(Self { id, secret: secret.to_string() })
    }
}

impl fmt::Display for RefreshCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_roundtrip() {
        let user_id = Uuid::new_v4();
        let secret = "test_secret";
        let claims = Claims::new(user_id, "analima".to_string(), 3600);

        let token = claims.encode(secret).unwrap();
        let decoded = Claims::decode(&token, secret).unwrap();

        assert_eq!(claims, decoded);
        assert_eq!(decoded.username, "analima");
    }

    #[test]
    fn test_claims_wrong_secret_is_invalid_token() {
        let claims = Claims::new(Uuid::new_v4(), "analima".to_string(), 3600);
        let token = claims.encode("secret1").unwrap();

        let result = Claims::decode(&token, "secret2");
        assert!(matches!(result, Err(AppError::TokenInvalid)));
    }

    #[test]
    fn test_claims_expired_is_reported_as_expired() {
        let expired = Claims {
            sub: Uuid::new_v4(),
            username: "analima".to_string(),
            exp: 1_000_000, // 1970, far past any validation leeway
        };
        let token = expired.encode("test_secret").unwrap();

        let result = Claims::decode(&token, "test_secret");
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let result = Claims::decode("not-a-jwt", "test_secret");
        assert!(matches!(result, Err(AppError::TokenInvalid)));
    }

    #[test]
    fn test_credential_hashing() {
        let password = "secret123";
        let digest = CredentialHasher::hash(password).unwrap();

        assert_ne!(password, digest);
        assert!(CredentialHasher::verify(password, &digest).unwrap());
        assert!(!CredentialHasher::verify("wrong_password", &digest).unwrap());
    }

    #[test]
    fn test_session_secret_sizes_and_entropy() {
        let refresh = SessionSecrets::refresh_secret();
        let csrf = SessionSecrets::csrf_token();

        assert_eq!(refresh.len(), 128); // 64 bytes hex
        assert_eq!(csrf.len(), 64); // 32 bytes hex
        assert_ne!(SessionSecrets::refresh_secret(), refresh);
        assert_ne!(SessionSecrets::csrf_token(), csrf);
    }

    #[test]
    fn test_refresh_cookie_roundtrip() {
        let id = Uuid::new_v4();
        let cookie = RefreshCookie { id, secret: "deadbeef".to_string() };
        let parsed = RefreshCookie::parse(&cookie.to_string()).unwrap();

        assert_eq!(parsed, cookie);
    }

    #[test]
    fn test_refresh_cookie_rejects_malformed_values() {
        assert!(RefreshCookie::parse("").is_none());
        assert!(RefreshCookie::parse("no-separator").is_none());
        assert!(RefreshCookie::parse("not-a-uuid.secret").is_none());
        assert!(RefreshCookie::parse(&format!("{}.", Uuid::new_v4())).is_none());
    }
}
