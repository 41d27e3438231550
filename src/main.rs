#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use std::net::SocketAddr;
use tally_server::api::MgmtState;
use tally_server::config::Config;
use tally_server::services::auth_service::AuthService;
use tally_server::services::health_service::HealthService;
use tally_server::storage::refresh_token_repo::RefreshTokenRepository;
use tally_server::storage::user_repo::UserRepository;
use tally_server::{api, storage, telemetry};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    telemetry::init_telemetry(&config.telemetry)?;

    let pool = storage::init_pool(&config.database_url).await?;
    storage::run_migrations(&pool).await?;

    let auth_service = AuthService::new(
        config.auth.clone(),
        pool.clone(),
        UserRepository::new(),
        RefreshTokenRepository::new(),
    );
    let health_service = HealthService::new(pool);

    let app_router = api::app_router(config.clone(), auth_service);
    let mgmt_router = api::mgmt_router(MgmtState { health_service });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx);

    let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let mgmt_addr: SocketAddr =
        format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

    let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
    let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

    tracing::info!(address = %api_addr, "listening");
    tracing::info!(address = %mgmt_addr, "management server listening");

    let mut api_rx = shutdown_rx.clone();
    let api_server = axum::serve(
        api_listener,
        app_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = api_rx.wait_for(|&s| s).await;
    });

    let mut mgmt_rx = shutdown_rx;
    let mgmt_server = axum::serve(
        mgmt_listener,
        mgmt_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = mgmt_rx.wait_for(|&s| s).await;
    });

    if let Err(e) = tokio::try_join!(api_server, mgmt_server) {
        tracing::error!(error = %e, "Server error");
    }

    Ok(())
}

fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}
