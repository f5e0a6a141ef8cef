use axum::{
    body::StreamBody,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::history::{export_lines, history, ExportFormat, BATCH_SIZE};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// "csv" (default) or "json" for JSON lines.
    pub format: Option<String>,
}

pub async fn export_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let format: ExportFormat = query.format.as_deref().unwrap_or("csv").parse()?;
    state.accounts.get_account(user_id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    let disposition = format!(
        "attachment; filename=\"transactions_{}.{}\"",
        user_id,
        format.extension()
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|e| AppError::Internal(e.to_string()))?,
    );

    tracing::info!(user_id = %user_id, format = ?format, "exporting transaction history");

    let entries = history(state.store.clone(), user_id, BATCH_SIZE);
    Ok((headers, StreamBody::new(export_lines(entries, format))))
}
