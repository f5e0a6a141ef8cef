use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{Credits, TransferKind, UserId};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTransferRequest {
    pub kind: TransferKind,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount: Credits,
    pub description: Option<String>,
    /// Subscription tier, post, message or conversation the payment is for.
    pub related_id: Option<Uuid>,
}

pub async fn create_transfer(
    State(state): State<AppState>,
    Json(body): Json<CreateTransferRequest>,
) -> Result<impl IntoResponse, AppError> {
    let description = body
        .description
        .unwrap_or_else(|| body.kind.default_description().to_string());

    let receipt = state
        .engine
        .execute(
            body.kind,
            body.from_user_id,
            body.to_user_id,
            body.amount,
            description,
            body.related_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}
