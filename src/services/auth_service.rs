use crate::config::AuthConfig;
use crate::domain::auth::{Claims, CredentialHasher, RefreshCookie, SessionSecrets};
use crate::domain::session::{
    IssuedAccessToken, IssuedRefreshToken, Session, SessionMetadata,
};
use crate::domain::user::{User, derive_username};
use crate::error::{AppError, Result};
use crate::storage::DbPool;
use crate::storage::records::auth::NewRefreshToken;
use crate::storage::refresh_token_repo::RefreshTokenRepository;
use crate::storage::user_repo::UserRepository;
use opentelemetry::{global, metrics::Counter};
use sqlx::PgConnection;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone, Debug)]
struct Metrics {
    registered_total: Counter<u64>,
    login_total: Counter<u64>,
    refresh_total: Counter<u64>,
    logout_total: Counter<u64>,
    replay_detected_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("tally-server");
        Self {
            registered_total: meter
                .u64_counter("auth_registered_total")
                .with_description("Total number of successful registrations")
                .build(),
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Total number of successful login attempts")
                .build(),
            refresh_total: meter
                .u64_counter("auth_refresh_total")
                .with_description("Total number of successful session rotations")
                .build(),
            logout_total: meter
                .u64_counter("auth_logout_total")
                .with_description("Total number of logout sweeps")
                .build(),
            replay_detected_total: meter
                .u64_counter("auth_replay_detected_total")
                .with_description("Refresh attempts against revoked or mismatched records")
                .build(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

struct RefreshTokenBundle {
    record: NewRefreshToken,
    issued: IssuedRefreshToken,
    csrf_token: String,
}

/// Orchestrates register, login, refresh and logout. The refresh-token state
/// machine lives here: a record is Active until it is either Rotated by a
/// successful refresh or Revoked by logout, expiry detection or replay
/// detection. Both end states are terminal.
#[derive(Clone, Debug)]
pub struct AuthService {
    config: AuthConfig,
    pool: DbPool,
    user_repo: UserRepository,
    refresh_repo: RefreshTokenRepository,
    metrics: Metrics,
}

impl AuthService {
    pub fn new(
        config: AuthConfig,
        pool: DbPool,
        user_repo: UserRepository,
        refresh_repo: RefreshTokenRepository,
    ) -> Self {
        Self { config, pool, user_repo, refresh_repo, metrics: Metrics::new() }
    }

    #[tracing::instrument(
        skip(self, input, metadata),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn register(&self, input: RegisterInput, metadata: SessionMetadata) -> Result<Session> {
        if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
            return Err(AppError::BadRequest("First and last name are required".to_string()));
        }
        if input.password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let username = derive_username(&input.first_name, &input.last_name);

        if self.user_repo.find_by_username(&self.pool, &username).await?.is_some() {
            tracing::warn!(%username, "Registration failed: username already exists");
            return Err(AppError::Conflict("User with this username already exists".to_string()));
        }

        let password_hash = self.hash_secret(input.password).await?;

        let mut tx = self.pool.begin().await?;
        let user = self
            .user_repo
            .create(&mut *tx, &input.first_name, &input.last_name, &username, &password_hash)
            .await?;

        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        let session = self.create_session(&mut tx, &user, &metadata).await?;
        tx.commit().await?;

        self.metrics.registered_total.add(1, &[]);
        Ok(session)
    }

    #[tracing::instrument(
        skip(self, username, password, metadata),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        metadata: SessionMetadata,
    ) -> Result<Session> {
        // Unknown username and bad password produce the same error so the
        // endpoint cannot be used for username enumeration.
        let user = match self.user_repo.find_by_username(&self.pool, username).await? {
            Some(u) => u,
            None => {
                tracing::warn!("Login failed: user not found");
                return Err(AppError::AuthError);
            }
        };

        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        if !self.verify_secret(password.to_string(), user.password_hash.clone()).await? {
            tracing::warn!("Login failed: invalid password");
            return Err(AppError::AuthError);
        }

        let mut conn = self.pool.acquire().await?;
        let session = self.create_session(&mut conn, &user, &metadata).await?;
        self.metrics.login_total.add(1, &[]);
        Ok(session)
    }

    #[tracing::instrument(
        skip(self, refresh_cookie, csrf_token, metadata),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn refresh_session(
        &self,
        refresh_cookie: Option<&str>,
        csrf_token: Option<&str>,
        metadata: SessionMetadata,
    ) -> Result<Session> {
        let parsed = refresh_cookie.and_then(RefreshCookie::parse).ok_or(AppError::AuthError)?;
        let csrf = csrf_token.filter(|v| !v.is_empty()).ok_or(AppError::AuthError)?;

        let mut tx = self.pool.begin().await?;

        let Some(current) = self.refresh_repo.find_by_id_for_update(&mut tx, parsed.id).await?
        else {
            return Err(AppError::AuthError);
        };

        tracing::Span::current().record("user_id", tracing::field::display(current.user_id));

        if current.is_revoked() {
            tracing::warn!(token_id = %current.id, "Refresh attempt with a revoked token");
            self.metrics.replay_detected_total.add(1, &[]);
            return Err(AppError::AuthError);
        }

        if current.is_expired() {
            self.refresh_repo.mark_revoked(&mut *tx, current.id).await?;
            tx.commit().await?;
            return Err(AppError::AuthError);
        }

        // A hash mismatch on an otherwise valid record means the presented
        // secret did not originate from the legitimate issuance. The record
        // is neutralized before the error is returned; the revoke is part of
        // the failure's contract, not optional cleanup.
        if !self.verify_secret(parsed.secret, current.hashed_token.clone()).await? {
            tracing::warn!(token_id = %current.id, "Refresh token hash mismatch, revoking record");
            self.metrics.replay_detected_total.add(1, &[]);
            self.refresh_repo.mark_revoked(&mut *tx, current.id).await?;
            tx.commit().await?;
            return Err(AppError::AuthError);
        }

        if !self.verify_secret(csrf.to_string(), current.hashed_csrf_token.clone()).await? {
            tracing::warn!(token_id = %current.id, "CSRF hash mismatch during refresh, revoking record");
            self.refresh_repo.mark_revoked(&mut *tx, current.id).await?;
            tx.commit().await?;
            return Err(AppError::AuthError);
        }

        let Some(user) = self.user_repo.find_by_id(&mut *tx, current.user_id).await? else {
            self.refresh_repo.mark_revoked(&mut *tx, current.id).await?;
            tx.commit().await?;
            return Err(AppError::AuthError);
        };

        let bundle = self.build_refresh_token(user.id, &metadata).await?;

        // Revoke-old plus insert-new commits atomically; the conditional
        // predicate inside rotate() is the last-step revocation re-check.
        if !self.refresh_repo.rotate(&mut tx, current.id, &bundle.record).await? {
            self.metrics.replay_detected_total.add(1, &[]);
            return Err(AppError::AuthError);
        }
        tx.commit().await?;

        let access_token = self.issue_access_token(&user)?;

        tracing::info!(old_token_id = %current.id, new_token_id = %bundle.issued.id, "Session rotated");
        self.metrics.refresh_total.add(1, &[]);

        Ok(Session {
            user: (&user).into(),
            access_token,
            refresh_token: bundle.issued,
            csrf_token: bundle.csrf_token,
        })
    }

    /// Best-effort targeted revoke followed by an unconditional
    /// "log out everywhere" sweep. A stale or malformed cookie never fails
    /// the call; only storage faults do.
    #[tracing::instrument(skip(self, refresh_cookie, csrf_token), err(level = "warn"))]
    pub async fn logout(
        &self,
        refresh_cookie: Option<&str>,
        csrf_token: Option<&str>,
        user_id: Uuid,
    ) -> Result<()> {
        let parsed = refresh_cookie.and_then(RefreshCookie::parse);
        let csrf = csrf_token.filter(|v| !v.is_empty());

        if let (Some(parsed), Some(csrf)) = (parsed, csrf) {
            if let Some(record) = self.refresh_repo.find_by_id(&self.pool, parsed.id).await? {
                let owned = record.user_id == user_id && !record.is_revoked();
                if owned
                    && self.verify_secret(parsed.secret, record.hashed_token.clone()).await?
                    && self.verify_secret(csrf.to_string(), record.hashed_csrf_token.clone()).await?
                {
                    self.refresh_repo.mark_revoked(&self.pool, record.id).await?;
                }
            }
        }

        let swept = self.refresh_repo.revoke_all_for_user(&self.pool, user_id).await?;
        tracing::info!(revoked = swept, "Logout sweep completed");
        self.metrics.logout_total.add(1, &[]);
        Ok(())
    }

    /// Confirms the authenticated user still exists. A vanished user
    /// surfaces to the caller as a plain authentication failure.
    #[tracing::instrument(skip(self), err(level = "debug"))]
    pub async fn validate_user(&self, user_id: Uuid) -> Result<User> {
        self.user_repo.find_by_id(&self.pool, user_id).await?.ok_or(AppError::AuthError)
    }

    async fn create_session(
        &self,
        conn: &mut PgConnection,
        user: &User,
        metadata: &SessionMetadata,
    ) -> Result<Session> {
        let access_token = self.issue_access_token(user)?;
        let bundle = self.build_refresh_token(user.id, metadata).await?;

        self.refresh_repo.create(&mut *conn, &bundle.record).await?;

        Ok(Session {
            user: user.into(),
            access_token,
            refresh_token: bundle.issued,
            csrf_token: bundle.csrf_token,
        })
    }

    async fn build_refresh_token(
        &self,
        user_id: Uuid,
        metadata: &SessionMetadata,
    ) -> Result<RefreshTokenBundle> {
        let id = Uuid::new_v4();
        let secret = SessionSecrets::refresh_secret();
        let csrf_token = SessionSecrets::csrf_token();

        let hashed_token = self.hash_secret(secret.clone()).await?;
        let hashed_csrf_token = self.hash_secret(csrf_token.clone()).await?;

        let expires_at =
            OffsetDateTime::now_utc() + Duration::seconds(self.config.refresh_token_ttl_secs);

        let record = NewRefreshToken {
            id,
            user_id,
            hashed_token,
            hashed_csrf_token,
            expires_at,
            user_agent: metadata.user_agent.clone(),
            ip_address: metadata.ip_address.clone(),
        };

        Ok(RefreshTokenBundle {
            record,
            issued: IssuedRefreshToken { id, value: secret, expires_at },
            csrf_token,
        })
    }

    fn issue_access_token(&self, user: &User) -> Result<IssuedAccessToken> {
        let ttl = self.config.access_token_ttl_secs;
        let claims = Claims::new(user.id, user.username.clone(), ttl);
        let value = claims.encode(&self.config.jwt_secret)?;
        let expires_at = OffsetDateTime::now_utc() + Duration::seconds(ttl);
        Ok(IssuedAccessToken { value, expires_at })
    }

    // Argon2 is CPU-bound; both helpers run off the async dispatch path.

    async fn hash_secret(&self, secret: String) -> Result<String> {
        tokio::task::spawn_blocking(move || CredentialHasher::hash(&secret))
            .await
            .map_err(|_| AppError::Internal)?
    }

    async fn verify_secret(&self, secret: String, digest: String) -> Result<bool> {
        tokio::task::spawn_blocking(move || CredentialHasher::verify(&secret, &digest))
            .await
            .map_err(|_| AppError::Internal)?
    }
}
