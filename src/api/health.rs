use crate::api::MgmtState;
use axum::{extract::State, http::StatusCode};

pub async fn livez() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz(State(state): State<MgmtState>) -> Result<StatusCode, (StatusCode, String)> {
    match state.health_service.check_db().await {
        Ok(()) => Ok(StatusCode::OK),
        Err(reason) => Err((StatusCode::SERVICE_UNAVAILABLE, reason)),
    }
}
