use crate::api::AppState;
use crate::api::middleware::{AuthUser, CsrfGuard, SessionMeta};
use crate::api::schemas::auth::{Login, Registration, SessionResponse, UserView};
use crate::error::Result;
use crate::services::auth_service::RegisterInput;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;

pub async fn register(
    State(state): State<AppState>,
    meta: SessionMeta,
    jar: CookieJar,
    Json(payload): Json<Registration>,
) -> Result<impl IntoResponse> {
    let input = RegisterInput {
        first_name: payload.first_name,
        last_name: payload.last_name,
        password: payload.password,
    };
    let session = state.auth_service.register(input, meta.0).await?;

    let body = SessionResponse::from(&session);
    let jar = state.cookie_policy.issue(jar, &session);
    Ok((StatusCode::CREATED, jar, Json(body)))
}

pub async fn login(
    State(state): State<AppState>,
    meta: SessionMeta,
    jar: CookieJar,
    Json(payload): Json<Login>,
) -> Result<impl IntoResponse> {
    let session =
        state.auth_service.login(&payload.username, &payload.password, meta.0).await?;

    let body = SessionResponse::from(&session);
    let jar = state.cookie_policy.issue(jar, &session);
    Ok((jar, Json(body)))
}

/// Rotates the refresh token. The CSRF guard runs before the cookie is even
/// parsed, so a double-submit mismatch never reaches token verification.
pub async fn refresh(
    State(state): State<AppState>,
    csrf: CsrfGuard,
    meta: SessionMeta,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let refresh_cookie =
        jar.get(state.cookie_policy.refresh_cookie_name()).map(|c| c.value().to_string());

    let session = state
        .auth_service
        .refresh_session(refresh_cookie.as_deref(), Some(&csrf.token), meta.0)
        .await?;

    let body = SessionResponse::from(&session);
    let jar = state.cookie_policy.issue(jar, &session);
    Ok((jar, Json(body)))
}

pub async fn logout(
    State(state): State<AppState>,
    csrf: CsrfGuard,
    auth_user: AuthUser,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let refresh_cookie =
        jar.get(state.cookie_policy.refresh_cookie_name()).map(|c| c.value().to_string());

    state
        .auth_service
        .logout(refresh_cookie.as_deref(), Some(&csrf.token), auth_user.user_id)
        .await?;

    let jar = state.cookie_policy.clear(jar);
    Ok((StatusCode::NO_CONTENT, jar))
}

pub async fn current_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse> {
    let user = state.auth_service.validate_user(auth_user.user_id).await?;
    Ok(Json(UserView::from(&user)))
}
