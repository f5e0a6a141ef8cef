//! In-process implementation of the ledger store.
//!
//! Each account sits behind its own mutex. Operations touching two accounts lock
//! them in `UserId` order, so transfers over disjoint pairs run in parallel and
//! transfers sharing an account serialize without deadlocking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::domain::{
    Account, Credits, EntryFilter, EntryId, LedgerError, LedgerResult, NewEntry, Page,
    PageRequest, TransactionEntry, TransferPlan, TransferReceipt, UserId,
};
use crate::ports::{AccountStore, LedgerStore, TransactionLog};
use crate::utils::cursor;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct MemoryLedgerStore {
    accounts: RwLock<HashMap<UserId, Arc<Mutex<Account>>>>,
    entries: RwLock<HashMap<UserId, Vec<TransactionEntry>>>,
    next_entry_id: AtomicI64,
    clock: Clock,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::with_clock(Utc::now)
    }
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose timestamps come from `clock`, for back-dated fixtures.
    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self {
            accounts: RwLock::new(HashMap::new()),
            entries: RwLock::new(HashMap::new()),
            next_entry_id: AtomicI64::new(1),
            clock: Arc::new(clock),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    async fn slot(&self, user_id: UserId) -> LedgerResult<Arc<Mutex<Account>>> {
        self.accounts
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(user_id))
    }

    /// Assigns ids and timestamps and appends. Callers hold the owning account locks.
    async fn push_entries(&self, batch: Vec<NewEntry>) -> Vec<TransactionEntry> {
        let mut log = self.entries.write().await;
        let created_at = self.now();
        batch
            .into_iter()
            .map(|entry| {
                let id: EntryId = self.next_entry_id.fetch_add(1, Ordering::SeqCst);
                let committed = TransactionEntry::from_new(entry, id, created_at);
                log.entry(committed.user_id)
                    .or_default()
                    .push(committed.clone());
                committed
            })
            .collect()
    }
}

/// Locks both accounts in a fixed order and returns `(payer, payee)` guards.
async fn lock_pair<'a>(
    from: (&UserId, &'a Mutex<Account>),
    to: (&UserId, &'a Mutex<Account>),
) -> (MutexGuard<'a, Account>, MutexGuard<'a, Account>) {
    if from.0 < to.0 {
        let payer = from.1.lock().await;
        let payee = to.1.lock().await;
        (payer, payee)
    } else {
        let payee = to.1.lock().await;
        let payer = from.1.lock().await;
        (payer, payee)
    }
}

fn newest_first(a: &TransactionEntry, b: &TransactionEntry) -> std::cmp::Ordering {
    (b.created_at, b.id).cmp(&(a.created_at, a.id))
}

#[async_trait]
impl AccountStore for MemoryLedgerStore {
    async fn open_account(&self, user_id: UserId) -> LedgerResult<Account> {
        let slot = {
            let mut accounts = self.accounts.write().await;
            accounts
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(Account::new(user_id, self.now()))))
                .clone()
        };
        let account = slot.lock().await.clone();
        Ok(account)
    }

    async fn get_account(&self, user_id: UserId) -> LedgerResult<Account> {
        let slot = self.slot(user_id).await?;
        let account = slot.lock().await.clone();
        Ok(account)
    }

    async fn close_account(&self, user_id: UserId) -> LedgerResult<Account> {
        let slot = self.slot(user_id).await?;
        let mut account = slot.lock().await;
        if account.closed_at.is_none() {
            let now = self.now();
            account.closed_at = Some(now);
            account.updated_at = now;
        }
        Ok(account.clone())
    }

    async fn debit(&self, user_id: UserId, amount: Credits) -> LedgerResult<Credits> {
        let slot = self.slot(user_id).await?;
        let mut account = slot.lock().await;
        account.ensure_open()?;
        account.balance = account.balance_after_debit(amount)?;
        account.updated_at = self.now();
        Ok(account.balance)
    }

    async fn credit(&self, user_id: UserId, amount: Credits) -> LedgerResult<Credits> {
        let slot = self.slot(user_id).await?;
        let mut account = slot.lock().await;
        account.ensure_open()?;
        account.balance = account.balance_after_credit(amount)?;
        account.updated_at = self.now();
        Ok(account.balance)
    }
}

#[async_trait]
impl TransactionLog for MemoryLedgerStore {
    async fn append(&self, entry: NewEntry) -> LedgerResult<TransactionEntry> {
        entry.validate()?;
        self.slot(entry.user_id).await?;
        let mut committed = self.push_entries(vec![entry]).await;
        committed
            .pop()
            .ok_or_else(|| LedgerError::Storage("append produced no entry".to_string()))
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        page: &PageRequest,
    ) -> LedgerResult<Page<TransactionEntry>> {
        let after = page
            .cursor
            .as_deref()
            .map(cursor::decode)
            .transpose()
            .map_err(LedgerError::InvalidCursor)?;
        let limit = page.effective_limit();

        let log = self.entries.read().await;
        let mut items: Vec<TransactionEntry> = log
            .get(&user_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| match after {
                        Some(key) => (e.created_at, e.id) < key,
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(log);

        items.sort_by(newest_first);
        let has_more = items.len() > limit;
        items.truncate(limit);

        let next_cursor = if has_more {
            items.last().map(|e| cursor::encode(e.created_at, e.id))
        } else {
            None
        };

        Ok(Page { items, next_cursor })
    }

    async fn entries_for_user(
        &self,
        user_id: UserId,
        filter: &EntryFilter,
    ) -> LedgerResult<Vec<TransactionEntry>> {
        let log = self.entries.read().await;
        let mut items: Vec<TransactionEntry> = log
            .get(&user_id)
            .map(|entries| entries.iter().filter(|e| filter.matches(e)).cloned().collect())
            .unwrap_or_default();
        items.sort_by(|a, b| newest_first(b, a));
        Ok(items)
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn commit_issue(&self, entry: NewEntry) -> LedgerResult<TransactionEntry> {
        let slot = self.slot(entry.user_id).await?;
        let mut account = slot.lock().await;
        account.ensure_open()?;

        let balance_after = account.balance_after_credit(entry.amount)?;
        let entry = NewEntry {
            balance_after,
            ..entry
        };
        entry.validate()?;

        account.balance = balance_after;
        account.updated_at = self.now();

        let mut committed = self.push_entries(vec![entry]).await;
        committed
            .pop()
            .ok_or_else(|| LedgerError::Storage("append produced no entry".to_string()))
    }

    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(transfer_id = %plan.transfer_id, amount = plan.amount)
    )]
    async fn commit_transfer(&self, plan: &TransferPlan) -> LedgerResult<TransferReceipt> {
        plan.ensure_well_formed()?;
        let from_slot = self.slot(plan.from_user_id).await?;
        let to_slot = self.slot(plan.to_user_id).await?;

        let (mut payer, mut payee) = lock_pair(
            (&plan.from_user_id, &*from_slot),
            (&plan.to_user_id, &*to_slot),
        )
        .await;

        payer.ensure_open()?;
        payee.ensure_open()?;

        let new_from_balance = payer.balance_after_debit(plan.amount)?;
        let new_to_balance = payee.balance_after_credit(plan.amount)?;

        let debit = plan.debit_entry(new_from_balance);
        let credit = plan.credit_entry(new_to_balance);
        debit.validate()?;
        credit.validate()?;

        let now = self.now();
        payer.balance = new_from_balance;
        payer.updated_at = now;
        payee.balance = new_to_balance;
        payee.updated_at = now;

        let mut committed = self.push_entries(vec![debit, credit]).await.into_iter();
        match (committed.next(), committed.next()) {
            (Some(debit), Some(credit)) => Ok(TransferReceipt {
                transfer_id: plan.transfer_id,
                debit,
                credit,
            }),
            _ => Err(LedgerError::Storage(
                "transfer produced an incomplete entry pair".to_string(),
            )),
        }
    }
}
