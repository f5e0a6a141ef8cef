use thiserror::Error;
use uuid::Uuid;

use super::{Credits, UserId};

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Account not found: {0}")]
    AccountNotFound(UserId),

    #[error("Account closed: {0}")]
    AccountClosed(UserId),

    #[error("Insufficient funds in account {user_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        user_id: UserId,
        balance: Credits,
        requested: Credits,
    },

    #[error("Cannot transfer credits from account {0} to itself")]
    SelfTransfer(UserId),

    #[error("Transfer {transfer_id} failed: {reason}")]
    TransferFailed { transfer_id: Uuid, reason: String },

    #[error(
        "Critical inconsistency in transfer {transfer_id}: {amount} credits left debited from {payer}: {reason}"
    )]
    CriticalInconsistency {
        transfer_id: Uuid,
        payer: UserId,
        amount: Credits,
        reason: String,
    },

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Errors that leave balances and the log out of agreement and need an operator.
    pub fn is_critical(&self) -> bool {
        matches!(self, LedgerError::CriticalInconsistency { .. })
    }

    /// Errors the caller caused; retrying the same request cannot succeed.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidAmount(_)
                | LedgerError::AccountNotFound(_)
                | LedgerError::AccountClosed(_)
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::SelfTransfer(_)
                | LedgerError::InvalidEntry(_)
                | LedgerError::InvalidCursor(_)
        )
    }
}
