use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Credits, LedgerError, LedgerResult, UserId};
use crate::validation::validate_positive_amount;

/// A user's credit balance. Closed accounts are kept for the log's sake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub balance: Credits,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance: 0,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    pub fn ensure_open(&self) -> LedgerResult<()> {
        if self.is_closed() {
            return Err(LedgerError::AccountClosed(self.user_id));
        }
        Ok(())
    }

    /// Balance after taking `amount` out, if the account can cover it.
    pub fn balance_after_debit(&self, amount: Credits) -> LedgerResult<Credits> {
        validate_positive_amount(amount)?;
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                user_id: self.user_id,
                balance: self.balance,
                requested: amount,
            });
        }
        Ok(self.balance - amount)
    }

    pub fn balance_after_credit(&self, amount: Credits) -> LedgerResult<Credits> {
        validate_positive_amount(amount)?;
        self.balance.checked_add(amount).ok_or_else(|| {
            LedgerError::InvalidAmount(format!(
                "crediting {} would overflow the balance of {}",
                amount, self.user_id
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn account_with(balance: Credits) -> Account {
        let mut account = Account::new(Uuid::new_v4(), Utc::now());
        account.balance = balance;
        account
    }

    #[test]
    fn test_new_account_starts_empty_and_open() {
        let account = Account::new(Uuid::new_v4(), Utc::now());
        assert_eq!(account.balance, 0);
        assert!(!account.is_closed());
        assert!(account.ensure_open().is_ok());
    }

    #[test]
    fn test_debit_requires_cover() {
        let account = account_with(10);
        assert_eq!(account.balance_after_debit(10), Ok(0));
        assert!(matches!(
            account.balance_after_debit(11),
            Err(LedgerError::InsufficientFunds { balance: 10, requested: 11, .. })
        ));
    }

    #[test]
    fn test_credit_overflow_is_rejected() {
        let account = account_with(i64::MAX - 1);
        assert_eq!(account.balance_after_credit(1), Ok(i64::MAX));
        assert!(matches!(
            account.balance_after_credit(2),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_non_positive_amounts_never_move_the_balance() {
        let account = account_with(10);
        for amount in [0, -1, -500] {
            assert!(matches!(
                account.balance_after_debit(amount),
                Err(LedgerError::InvalidAmount(_))
            ));
            assert!(matches!(
                account.balance_after_credit(amount),
                Err(LedgerError::InvalidAmount(_))
            ));
        }
    }

    #[test]
    fn test_closed_account_rejects_use() {
        let mut account = account_with(5);
        account.closed_at = Some(Utc::now());
        assert_eq!(
            account.ensure_open(),
            Err(LedgerError::AccountClosed(account.user_id))
        );
    }
}
