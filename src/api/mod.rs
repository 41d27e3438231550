use crate::api::cookies::CookiePolicy;
use crate::api::rate_limit::IpKeyExtractor;
use crate::config::Config;
use crate::services::auth_service::AuthService;
use crate::services::health_service::HealthService;
use axum::body::Body;
use axum::http::Request;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod cookies;
pub mod health;
pub mod middleware;
pub mod rate_limit;
pub mod schemas;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub auth_service: AuthService,
    pub cookie_policy: CookiePolicy,
    pub ip_extractor: IpKeyExtractor,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

/// Configures and returns the primary application router.
///
/// # Panics
/// Panics if the rate limiter configuration cannot be constructed.
pub fn app_router(config: Config, auth_service: AuthService) -> Router {
    // Register, login, refresh and logout all gate on either a slow hash or
    // a stored secret, so they get a strict per-IP limiter.
    let auth_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit.auth_per_second)
            .burst_size(config.rate_limit.auth_burst)
            .key_extractor(IpKeyExtractor::new(config.server.trusted_proxies.clone()))
            .finish()
            .expect("Failed to build auth rate limiter config"),
    );

    let cookie_policy = CookiePolicy::new(config.cookies.clone(), &config.auth);
    let ip_extractor = IpKeyExtractor::new(config.server.trusted_proxies.clone());
    let state = AppState { config, auth_service, cookie_policy, ip_extractor };

    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .layer(GovernorLayer::new(auth_conf));

    let session_routes = Router::new().route("/auth/me", get(auth::current_user));

    Router::new()
        .nest("/v1", auth_routes.merge(session_routes))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current()
                            .record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new()
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .with_state(state)
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use crate::storage::refresh_token_repo::RefreshTokenRepository;
    use crate::storage::user_repo::UserRepository;
    use clap::Parser;

    let config = Config::try_parse_from([
        "tally-server",
        "--database-url",
        "postgres://localhost/test",
        "--jwt-secret",
        "test_secret",
    ])
    .expect("test config should parse");

    let pool = sqlx::PgPool::connect_lazy("postgres://localhost/test")
        .expect("lazy pool should construct");
    let auth_service = AuthService::new(
        config.auth.clone(),
        pool,
        UserRepository::new(),
        RefreshTokenRepository::new(),
    );
    let cookie_policy = CookiePolicy::new(config.cookies.clone(), &config.auth);
    let ip_extractor = IpKeyExtractor::new(config.server.trusted_proxies.clone());

    AppState { config, auth_service, cookie_policy, ip_extractor }
}
