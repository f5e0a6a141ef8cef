//! Transfer requests and their committed results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Category, Credits, LedgerError, LedgerResult, NewEntry, TransactionEntry, UserId};
use crate::validation::{clean_description, validate_positive_amount};

/// The caller flows that move credits between two users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Subscription,
    Tip,
    ChatTip,
    PostUnlock,
    MessageUnlock,
}

impl TransferKind {
    /// `(payer category, payee category)`
    pub fn categories(&self) -> (Category, Category) {
        match self {
            TransferKind::Subscription => {
                (Category::SubscriptionPayment, Category::SubscriptionEarning)
            }
            TransferKind::Tip => (Category::TipSent, Category::TipReceived),
            TransferKind::ChatTip => (Category::ChatTipSent, Category::ChatTipReceived),
            TransferKind::PostUnlock => (Category::PpvPayment, Category::PpvEarning),
            TransferKind::MessageUnlock => {
                (Category::MessagePpvPayment, Category::MessagePpvEarning)
            }
        }
    }

    pub fn default_description(&self) -> &'static str {
        match self {
            TransferKind::Subscription => "Subscription payment",
            TransferKind::Tip => "Tip",
            TransferKind::ChatTip => "Chat tip",
            TransferKind::PostUnlock => "Post unlock",
            TransferKind::MessageUnlock => "Message unlock",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount: Credits,
    pub from_category: Category,
    pub to_category: Category,
    pub description: String,
    pub related_id: Option<Uuid>,
}

impl TransferRequest {
    pub fn for_kind(
        kind: TransferKind,
        from_user_id: UserId,
        to_user_id: UserId,
        amount: Credits,
        description: impl Into<String>,
        related_id: Option<Uuid>,
    ) -> Self {
        let (from_category, to_category) = kind.categories();
        Self {
            from_user_id,
            to_user_id,
            amount,
            from_category,
            to_category,
            description: description.into(),
            related_id,
        }
    }

    /// Checks that need no I/O. Amount is checked first.
    pub fn validate(&self) -> LedgerResult<()> {
        validate_positive_amount(self.amount)?;

        if self.from_user_id == self.to_user_id {
            return Err(LedgerError::SelfTransfer(self.from_user_id));
        }

        if !self.from_category.is_debit() {
            return Err(LedgerError::InvalidEntry(format!(
                "{} cannot be used for the paying side of a transfer",
                self.from_category
            )));
        }

        if !self.to_category.is_earning() {
            return Err(LedgerError::InvalidEntry(format!(
                "{} cannot be used for the receiving side of a transfer",
                self.to_category
            )));
        }

        Ok(())
    }
}

/// A validated transfer with its id assigned, ready for a store to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub transfer_id: Uuid,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount: Credits,
    pub from_category: Category,
    pub to_category: Category,
    pub description: String,
    pub related_id: Option<Uuid>,
}

impl TransferPlan {
    pub fn new(request: TransferRequest) -> LedgerResult<Self> {
        request.validate()?;
        Ok(Self {
            transfer_id: Uuid::new_v4(),
            from_user_id: request.from_user_id,
            to_user_id: request.to_user_id,
            amount: request.amount,
            from_category: request.from_category,
            to_category: request.to_category,
            description: clean_description(&request.description)?,
            related_id: request.related_id,
        })
    }

    /// Re-checks the invariants `new` enforces. Stores call this before locking
    /// anything, since the fields are public and a plan can be built by hand.
    pub fn ensure_well_formed(&self) -> LedgerResult<()> {
        validate_positive_amount(self.amount)?;
        if self.from_user_id == self.to_user_id {
            return Err(LedgerError::SelfTransfer(self.from_user_id));
        }
        Ok(())
    }

    pub fn debit_entry(&self, balance_after: Credits) -> NewEntry {
        NewEntry {
            user_id: self.from_user_id,
            category: self.from_category,
            amount: -self.amount,
            balance_after,
            description: self.description.clone(),
            related_id: self.related_id,
            transfer_id: Some(self.transfer_id),
        }
    }

    pub fn credit_entry(&self, balance_after: Credits) -> NewEntry {
        NewEntry {
            user_id: self.to_user_id,
            category: self.to_category,
            amount: self.amount,
            balance_after,
            description: self.description.clone(),
            related_id: self.related_id,
            transfer_id: Some(self.transfer_id),
        }
    }
}

/// Both entries written by a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub transfer_id: Uuid,
    pub debit: TransactionEntry,
    pub credit: TransactionEntry,
}

impl TransferReceipt {
    pub fn payer_balance(&self) -> Credits {
        self.debit.balance_after
    }

    pub fn payee_balance(&self) -> Credits {
        self.credit.balance_after
    }
}
