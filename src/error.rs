use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::LedgerError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Ledger(err) => match err {
                LedgerError::InvalidAmount(_)
                | LedgerError::InvalidEntry(_)
                | LedgerError::SelfTransfer(_)
                | LedgerError::InvalidCursor(_) => StatusCode::BAD_REQUEST,
                LedgerError::AccountNotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::InsufficientFunds { .. } | LedgerError::AccountClosed(_) => {
                    StatusCode::CONFLICT
                }
                LedgerError::TransferFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
                LedgerError::CriticalInconsistency { .. } | LedgerError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the caller gets to see. Server-side failures stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Ledger(LedgerError::InsufficientFunds { .. }) => {
                "Insufficient credits".to_string()
            }
            AppError::Ledger(LedgerError::TransferFailed { .. }) => {
                "Payment failed, please try again".to_string()
            }
            AppError::Ledger(LedgerError::CriticalInconsistency { .. })
            | AppError::Ledger(LedgerError::Storage(_))
            | AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        }

        let body = Json(json!({
            "error": self.public_message(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_rejection_status_codes() {
        let user = Uuid::new_v4();
        let cases = [
            (LedgerError::InvalidAmount("zero".into()), StatusCode::BAD_REQUEST),
            (LedgerError::SelfTransfer(user), StatusCode::BAD_REQUEST),
            (LedgerError::InvalidCursor("bad".into()), StatusCode::BAD_REQUEST),
            (LedgerError::AccountNotFound(user), StatusCode::NOT_FOUND),
            (LedgerError::AccountClosed(user), StatusCode::CONFLICT),
            (
                LedgerError::InsufficientFunds {
                    user_id: user,
                    balance: 1,
                    requested: 2,
                },
                StatusCode::CONFLICT,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_transfer_failed_is_retryable() {
        let error = AppError::from(LedgerError::TransferFailed {
            transfer_id: Uuid::new_v4(),
            reason: "payee row locked".into(),
        });
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.public_message(), "Payment failed, please try again");
    }

    #[test]
    fn test_critical_details_are_not_exposed() {
        let error = AppError::from(LedgerError::CriticalInconsistency {
            transfer_id: Uuid::new_v4(),
            payer: Uuid::new_v4(),
            amount: 10,
            reason: "compensation failed".into(),
        });
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.public_message(), "Internal server error");
    }

    #[test]
    fn test_insufficient_funds_message() {
        let error = AppError::from(LedgerError::InsufficientFunds {
            user_id: Uuid::new_v4(),
            balance: 5,
            requested: 50,
        });
        assert_eq!(error.public_message(), "Insufficient credits");
    }

    #[tokio::test]
    async fn test_bad_request_response() {
        let response = AppError::BadRequest("months must be a number".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
