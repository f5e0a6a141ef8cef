//! Transaction log entries.
//! An entry is immutable once the log has assigned its id and timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Category, Credits, LedgerError, LedgerResult, UserId};
use crate::validation::{validate_max_len, DESCRIPTION_MAX_LEN};

/// Log-assigned entry id, strictly increasing in append order.
pub type EntryId = i64;

/// A committed, balance-changing event for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub category: Category,
    /// Negative for debits, positive for credits.
    pub amount: Credits,
    /// The account balance immediately after this entry was applied.
    pub balance_after: Credits,
    pub description: String,
    pub related_id: Option<Uuid>,
    /// Shared by the debit and credit entries of one transfer.
    pub transfer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TransactionEntry {
    pub fn from_new(entry: NewEntry, id: EntryId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: entry.user_id,
            category: entry.category,
            amount: entry.amount,
            balance_after: entry.balance_after,
            description: entry.description,
            related_id: entry.related_id,
            transfer_id: entry.transfer_id,
            created_at,
        }
    }

    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }
}

/// An entry waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub user_id: UserId,
    pub category: Category,
    pub amount: Credits,
    pub balance_after: Credits,
    pub description: String,
    pub related_id: Option<Uuid>,
    pub transfer_id: Option<Uuid>,
}

impl NewEntry {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.amount == 0 {
            return Err(LedgerError::InvalidEntry(
                "amount must not be zero".to_string(),
            ));
        }

        if self.category.is_debit() != (self.amount < 0) {
            return Err(LedgerError::InvalidEntry(format!(
                "amount {} has the wrong sign for category {}",
                self.amount, self.category
            )));
        }

        if self.balance_after < 0 {
            return Err(LedgerError::InvalidEntry(format!(
                "balance_after {} is negative",
                self.balance_after
            )));
        }

        validate_max_len("description", &self.description, DESCRIPTION_MAX_LEN)?;

        Ok(())
    }
}
