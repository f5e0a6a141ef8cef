use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::domain::{
    Account, Category, Credits, LedgerResult, NewEntry, TransactionEntry, UserId,
};
use crate::ports::LedgerStore;
use crate::validation::{clean_description, validate_positive_amount};

const DEFAULT_PURCHASE_DESCRIPTION: &str = "Credit purchase";

/// Account lifecycle and credit issuance for confirmed external payments.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn LedgerStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn open_account(&self, user_id: UserId) -> LedgerResult<Account> {
        let account = self.store.open_account(user_id).await?;
        tracing::debug!(created_at = %account.created_at, "account ready");
        Ok(account)
    }

    pub async fn get_account(&self, user_id: UserId) -> LedgerResult<Account> {
        self.store.get_account(user_id).await
    }

    pub async fn get_balance(&self, user_id: UserId) -> LedgerResult<Credits> {
        self.store.get_balance(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn close_account(&self, user_id: UserId) -> LedgerResult<Account> {
        let account = self.store.close_account(user_id).await?;
        tracing::info!(balance = account.balance, "account closed");
        Ok(account)
    }

    /// Adds purchased credits. Single-sided: there is no paying account.
    #[instrument(skip(self, description))]
    pub async fn credit_issue(
        &self,
        user_id: UserId,
        amount: Credits,
        description: Option<&str>,
        related_id: Option<Uuid>,
    ) -> LedgerResult<TransactionEntry> {
        validate_positive_amount(amount)?;
        let description = match description {
            Some(text) if !text.trim().is_empty() => clean_description(text)?,
            _ => DEFAULT_PURCHASE_DESCRIPTION.to_string(),
        };

        let entry = self
            .store
            .commit_issue(NewEntry {
                user_id,
                category: Category::Purchase,
                amount,
                balance_after: 0,
                description,
                related_id,
                transfer_id: None,
            })
            .await?;

        tracing::info!(entry_id = entry.id, balance = entry.balance_after, "credits issued");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryLedgerStore;
    use crate::domain::{EntryFilter, LedgerError};
    use crate::ports::{AccountStore, TransactionLog};

    fn service() -> (Arc<MemoryLedgerStore>, AccountService) {
        let store = Arc::new(MemoryLedgerStore::new());
        (store.clone(), AccountService::new(store))
    }

    #[tokio::test]
    async fn test_credit_issue_is_single_sided() {
        let (store, accounts) = service();
        let user = Uuid::new_v4();
        accounts.open_account(user).await.unwrap();

        let entry = accounts.credit_issue(user, 250, None, None).await.unwrap();

        assert_eq!(entry.category, Category::Purchase);
        assert_eq!(entry.amount, 250);
        assert_eq!(entry.balance_after, 250);
        assert_eq!(entry.description, DEFAULT_PURCHASE_DESCRIPTION);
        assert!(entry.transfer_id.is_none());
        assert_eq!(store.get_balance(user).await.unwrap(), 250);

        let all = store.entries_for_user(user, &EntryFilter::all()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.iter().all(|e| e.amount > 0));
    }

    #[tokio::test]
    async fn test_credit_issue_requires_positive_amount() {
        let (store, accounts) = service();
        let user = Uuid::new_v4();
        accounts.open_account(user).await.unwrap();

        assert!(matches!(
            accounts.credit_issue(user, 0, None, None).await,
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            accounts.credit_issue(user, -10, None, None).await,
            Err(LedgerError::InvalidAmount(_))
        ));
        assert_eq!(store.get_balance(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_credit_issue_unknown_account() {
        let (_, accounts) = service();
        let ghost = Uuid::new_v4();
        assert_eq!(
            accounts.credit_issue(ghost, 10, None, None).await.unwrap_err(),
            LedgerError::AccountNotFound(ghost)
        );
    }

    #[tokio::test]
    async fn test_closed_account_cannot_buy() {
        let (_, accounts) = service();
        let user = Uuid::new_v4();
        accounts.open_account(user).await.unwrap();
        accounts.close_account(user).await.unwrap();

        assert_eq!(
            accounts.credit_issue(user, 10, Some("pack"), None).await.unwrap_err(),
            LedgerError::AccountClosed(user)
        );
    }
}
