use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{Credits, PageRequest};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAccountRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueCreditsRequest {
    pub amount: Credits,
    pub description: Option<String>,
    /// Payment or order reference of the purchase.
    pub related_id: Option<Uuid>,
}

pub async fn open_account(
    State(state): State<AppState>,
    Json(body): Json<OpenAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state.accounts.open_account(body.user_id).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.accounts.get_account(user_id).await?))
}

pub async fn close_account(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.accounts.close_account(user_id).await?))
}

pub async fn issue_credits(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<IssueCreditsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let entry = state
        .accounts
        .credit_issue(
            user_id,
            body.amount,
            body.description.as_deref(),
            body.related_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(mut page): Query<PageRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.accounts.get_account(user_id).await?;
    page.limit = page.limit.or(Some(state.history_page_limit));

    let page = state.store.list_for_user(user_id, &page).await?;
    Ok(Json(page))
}
