pub mod accounts;
pub mod dashboard;
pub mod export;
pub mod transfers;

use crate::health::{check_health, LedgerStoreChecker};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let checker = LedgerStoreChecker::new(state.store.clone());
    let response = check_health(&checker, state.start_time).await;

    let status_code = if response.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
