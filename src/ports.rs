//! Storage ports.
//! The transfer engine and the views talk to storage only through these traits.

use async_trait::async_trait;

use crate::domain::{
    Account, Category, Credits, EntryFilter, LedgerError, LedgerResult, NewEntry, Page,
    PageRequest, TransactionEntry, TransferPlan, TransferReceipt, UserId,
};

/// Durable mapping from user to current balance.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Creates the account with a zero balance, or returns the existing one.
    async fn open_account(&self, user_id: UserId) -> LedgerResult<Account>;

    async fn get_account(&self, user_id: UserId) -> LedgerResult<Account>;

    /// Soft delete. The row and its log entries stay.
    async fn close_account(&self, user_id: UserId) -> LedgerResult<Account>;

    async fn get_balance(&self, user_id: UserId) -> LedgerResult<Credits> {
        Ok(self.get_account(user_id).await?.balance)
    }

    /// Atomically subtracts `amount` if the balance covers it and returns the new balance.
    /// Nothing is written when it fails.
    async fn debit(&self, user_id: UserId, amount: Credits) -> LedgerResult<Credits>;

    /// Atomically adds `amount` and returns the new balance.
    async fn credit(&self, user_id: UserId, amount: Credits) -> LedgerResult<Credits>;
}

/// Append-only history per account.
#[async_trait]
pub trait TransactionLog: Send + Sync {
    async fn append(&self, entry: NewEntry) -> LedgerResult<TransactionEntry>;

    /// Newest first, keyset paged.
    async fn list_for_user(
        &self,
        user_id: UserId,
        page: &PageRequest,
    ) -> LedgerResult<Page<TransactionEntry>>;

    /// Matching entries, oldest first.
    async fn entries_for_user(
        &self,
        user_id: UserId,
        filter: &EntryFilter,
    ) -> LedgerResult<Vec<TransactionEntry>>;

    async fn aggregate_for_user(&self, user_id: UserId, filter: &EntryFilter) -> LedgerResult<i64> {
        let entries = self.entries_for_user(user_id, filter).await?;
        Ok(entries.iter().map(|e| e.amount).sum())
    }
}

/// A store that can commit whole ledger operations.
///
/// The provided `commit_*` methods only have per-call atomicity: they run the
/// balance writes and the appends as separate steps and compensate on failure.
/// Stores with multi-row transactions override them so the whole operation
/// commits or aborts as one unit.
#[async_trait]
pub trait LedgerStore: AccountStore + TransactionLog {
    async fn ping(&self) -> LedgerResult<()> {
        Ok(())
    }

    /// Credits a purchase and appends its single `purchase` entry.
    async fn commit_issue(&self, entry: NewEntry) -> LedgerResult<TransactionEntry> {
        if entry.category != Category::Purchase || entry.amount <= 0 {
            return Err(LedgerError::InvalidEntry(
                "issued credits must be a positive purchase entry".to_string(),
            ));
        }

        let balance_after = self.credit(entry.user_id, entry.amount).await?;
        let amount = entry.amount;
        let user_id = entry.user_id;

        match self.append(NewEntry { balance_after, ..entry }).await {
            Ok(committed) => Ok(committed),
            Err(append_err) => {
                if let Err(undo_err) = self.debit(user_id, amount).await {
                    tracing::error!(
                        target: "ledger::reconciliation",
                        user_id = %user_id,
                        amount,
                        append_error = %append_err,
                        undo_error = %undo_err,
                        "purchase credited without a log entry and could not be reverted"
                    );
                }
                Err(append_err)
            }
        }
    }

    /// Steps 6 to 9 of a transfer: debit payer, credit payee, append both entries.
    async fn commit_transfer(&self, plan: &TransferPlan) -> LedgerResult<TransferReceipt> {
        plan.ensure_well_formed()?;
        let new_from_balance = self.debit(plan.from_user_id, plan.amount).await?;

        let new_to_balance = match self.credit(plan.to_user_id, plan.amount).await {
            Ok(balance) => balance,
            Err(credit_err) => return Err(compensate(self, plan, credit_err).await),
        };

        let debit = self
            .append(plan.debit_entry(new_from_balance))
            .await
            .map_err(|e| log_gap(plan, e))?;
        let credit = self
            .append(plan.credit_entry(new_to_balance))
            .await
            .map_err(|e| log_gap(plan, e))?;

        Ok(TransferReceipt {
            transfer_id: plan.transfer_id,
            debit,
            credit,
        })
    }
}

/// Gives the payer back what the failed transfer took.
async fn compensate<S>(store: &S, plan: &TransferPlan, cause: LedgerError) -> LedgerError
where
    S: LedgerStore + ?Sized,
{
    tracing::warn!(
        transfer_id = %plan.transfer_id,
        payee = %plan.to_user_id,
        error = %cause,
        "payee credit failed, restoring payer balance"
    );

    match store.credit(plan.from_user_id, plan.amount).await {
        Ok(_) => LedgerError::TransferFailed {
            transfer_id: plan.transfer_id,
            reason: cause.to_string(),
        },
        Err(undo_err) => {
            tracing::error!(
                target: "ledger::reconciliation",
                transfer_id = %plan.transfer_id,
                payer = %plan.from_user_id,
                payee = %plan.to_user_id,
                amount = plan.amount,
                credit_error = %cause,
                compensation_error = %undo_err,
                "transfer compensation failed, manual reconciliation required"
            );
            LedgerError::CriticalInconsistency {
                transfer_id: plan.transfer_id,
                payer: plan.from_user_id,
                amount: plan.amount,
                reason: format!("credit failed ({}), compensation failed ({})", cause, undo_err),
            }
        }
    }
}

/// Balances moved but the log is missing an entry.
fn log_gap(plan: &TransferPlan, cause: LedgerError) -> LedgerError {
    tracing::error!(
        target: "ledger::reconciliation",
        transfer_id = %plan.transfer_id,
        payer = %plan.from_user_id,
        payee = %plan.to_user_id,
        amount = plan.amount,
        error = %cause,
        "balances updated but ledger entries were not appended"
    );
    LedgerError::CriticalInconsistency {
        transfer_id: plan.transfer_id,
        payer: plan.from_user_id,
        amount: plan.amount,
        reason: format!("entry append failed: {}", cause),
    }
}
