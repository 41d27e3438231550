use crate::api::AppState;
use crate::domain::auth::Claims;
use crate::domain::session::SessionMetadata;
use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderValue, Request, header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use std::convert::Infallible;
use std::net::SocketAddr;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Authenticated request identity, established on every protected endpoint.
/// The access token is taken from the access cookie first, then from the
/// `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(&state.config.cookies.access_token_name)
            .map(|c| c.value().to_string())
            .or_else(|| bearer_token(parts));

        let token = token.ok_or(AppError::AuthError)?;
        let claims = Claims::decode(&token, &state.config.auth.jwt_secret)?;

        Ok(Self { user_id: claims.sub, username: claims.username })
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Double-submit CSRF check: the value echoed in the configured header must
/// match the CSRF cookie byte-exactly. The cookie is not http-only, so only
/// same-origin script can read it to produce the echo. Fails closed with
/// `Forbidden` before any token verification runs.
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    pub token: String,
}

impl FromRequestParts<AppState> for CsrfGuard {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(state.config.cookies.csrf_header_name.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());

        let jar = CookieJar::from_headers(&parts.headers);
        let cookie_value = jar
            .get(&state.config.cookies.csrf_token_name)
            .map(|c| c.value())
            .filter(|v| !v.is_empty());

        match (header_value, cookie_value) {
            (Some(header), Some(cookie)) if header == cookie => {
                Ok(Self { token: header.to_string() })
            }
            _ => Err(AppError::CsrfRejected),
        }
    }
}

/// Best-effort request context for refresh token records. Never rejects.
#[derive(Debug, Clone)]
pub struct SessionMeta(pub SessionMetadata);

impl FromRequestParts<AppState> for SessionMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let ip_address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| {
                state.ip_extractor.identify_client_ip(&parts.headers, addr.ip()).to_string()
            });

        Ok(Self(SessionMetadata { user_agent, ip_address }))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string()).ok().map(RequestId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_state;
    use axum::http::Request;

    fn parts_with_headers(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/v1/auth/refresh");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn test_csrf_guard_accepts_exact_match() {
        let state = test_state();
        let mut parts = parts_with_headers(&[
            ("x-csrf-token", "abc123"),
            ("cookie", "csrf_token=abc123"),
        ]);

        let guard = CsrfGuard::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(guard.token, "abc123");
    }

    #[tokio::test]
    async fn test_csrf_guard_rejects_mismatch_and_absence() {
        let state = test_state();

        let cases: &[&[(&str, &str)]] = &[
            &[("x-csrf-token", "abc123"), ("cookie", "csrf_token=other")],
            &[("x-csrf-token", "abc123")],
            &[("cookie", "csrf_token=abc123")],
            &[("x-csrf-token", "ABC123"), ("cookie", "csrf_token=abc123")],
            &[],
        ];

        for headers in cases {
            let mut parts = parts_with_headers(headers);
            let result = CsrfGuard::from_request_parts(&mut parts, &state).await;
            assert!(matches!(result, Err(AppError::CsrfRejected)), "headers: {headers:?}");
        }
    }

    #[tokio::test]
    async fn test_auth_user_from_bearer_header() {
        let state = test_state();
        let claims = Claims::new(Uuid::new_v4(), "analima".to_string(), 3600);
        let token = claims.encode(&state.config.auth.jwt_secret).unwrap();

        let mut parts =
            parts_with_headers(&[("authorization", &format!("Bearer {token}"))]);
        let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();

        assert_eq!(user.user_id, claims.sub);
        assert_eq!(user.username, "analima");
    }

    #[tokio::test]
    async fn test_auth_user_prefers_cookie_over_header() {
        let state = test_state();
        let cookie_claims = Claims::new(Uuid::new_v4(), "from-cookie".to_string(), 3600);
        let cookie_token = cookie_claims.encode(&state.config.auth.jwt_secret).unwrap();

        let mut parts = parts_with_headers(&[
            ("cookie", &format!("access_token={cookie_token}")),
            ("authorization", "Bearer something-else"),
        ]);
        let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();

        assert_eq!(user.username, "from-cookie");
    }

    #[tokio::test]
    async fn test_auth_user_missing_token_fails_generically() {
        let state = test_state();
        let mut parts = parts_with_headers(&[]);

        let result = AuthUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AppError::AuthError)));
    }

    #[tokio::test]
    async fn test_auth_user_garbage_token_is_invalid() {
        let state = test_state();
        let mut parts = parts_with_headers(&[("authorization", "Bearer not-a-jwt")]);

        let result = AuthUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AppError::TokenInvalid)));
    }

    #[tokio::test]
    async fn test_session_meta_captures_user_agent() {
        let state = test_state();
        let mut parts = parts_with_headers(&[("user-agent", "tally-test/1.0")]);

        let SessionMeta(meta) =
            SessionMeta::from_request_parts(&mut parts, &state).await.unwrap();

        assert_eq!(meta.user_agent.as_deref(), Some("tally-test/1.0"));
        assert!(meta.ip_address.is_none()); // no ConnectInfo in a synthetic request
    }
}
