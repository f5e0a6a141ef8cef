//! Postgres implementation of the ledger store.
//!
//! A transfer runs in one database transaction: both account rows are locked
//! with `FOR UPDATE` in key order, balances are rewritten and both entries are
//! inserted before the commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::domain::{
    Account, Category, Credits, EntryFilter, LedgerError, LedgerResult, NewEntry, Page,
    PageRequest, TransactionEntry, TransferPlan, TransferReceipt, UserId,
};
use crate::ports::{AccountStore, LedgerStore, TransactionLog};
use crate::utils::cursor;
use crate::validation::validate_positive_amount;

const ACCOUNT_COLUMNS: &str = "user_id, balance, created_at, updated_at, closed_at";
const ENTRY_COLUMNS: &str =
    "id, user_id, category, amount, balance_after, description, related_id, transfer_id, created_at";

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

/// Postgres-backed ledger store.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn fetch_account(conn: &mut PgConnection, user_id: UserId) -> LedgerResult<Account> {
    let row = sqlx::query_as::<_, AccountRow>(&format!(
        "SELECT {} FROM ledger_accounts WHERE user_id = $1",
        ACCOUNT_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(AccountRow::into_domain)
        .ok_or(LedgerError::AccountNotFound(user_id))
}

/// Works out why a guarded UPDATE matched no row.
async fn explain_rejection(
    conn: &mut PgConnection,
    user_id: UserId,
    amount: Credits,
    debit: bool,
) -> LedgerError {
    let account = match fetch_account(conn, user_id).await {
        Ok(account) => account,
        Err(err) => return err,
    };
    if let Err(err) = account.ensure_open() {
        return err;
    }
    let outcome = if debit {
        account.balance_after_debit(amount)
    } else {
        account.balance_after_credit(amount)
    };
    match outcome {
        Err(err) => err,
        Ok(_) => LedgerError::Storage(format!(
            "balance update for {} matched no row",
            user_id
        )),
    }
}

async fn debit_in(conn: &mut PgConnection, user_id: UserId, amount: Credits) -> LedgerResult<Credits> {
    validate_positive_amount(amount)?;

    let balance = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE ledger_accounts
        SET balance = balance - $2, updated_at = NOW()
        WHERE user_id = $1 AND closed_at IS NULL AND balance >= $2
        RETURNING balance
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&mut *conn)
    .await?;

    match balance {
        Some(balance) => Ok(balance),
        None => Err(explain_rejection(conn, user_id, amount, true).await),
    }
}

async fn credit_in(conn: &mut PgConnection, user_id: UserId, amount: Credits) -> LedgerResult<Credits> {
    validate_positive_amount(amount)?;

    let balance = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE ledger_accounts
        SET balance = balance + $2, updated_at = NOW()
        WHERE user_id = $1 AND closed_at IS NULL AND balance <= $3
        RETURNING balance
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(i64::MAX - amount)
    .fetch_optional(&mut *conn)
    .await?;

    match balance {
        Some(balance) => Ok(balance),
        None => Err(explain_rejection(conn, user_id, amount, false).await),
    }
}

async fn set_balance_in(conn: &mut PgConnection, user_id: UserId, balance: Credits) -> LedgerResult<()> {
    sqlx::query("UPDATE ledger_accounts SET balance = $2, updated_at = NOW() WHERE user_id = $1")
        .bind(user_id)
        .bind(balance)
        .execute(conn)
        .await?;
    Ok(())
}

async fn append_in(conn: &mut PgConnection, entry: &NewEntry) -> LedgerResult<TransactionEntry> {
    entry.validate()?;

    let row = sqlx::query_as::<_, EntryRow>(&format!(
        r#"
        INSERT INTO ledger_entries (
            user_id, category, amount, balance_after, description, related_id, transfer_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        ENTRY_COLUMNS
    ))
    .bind(entry.user_id)
    .bind(entry.category.as_str())
    .bind(entry.amount)
    .bind(entry.balance_after)
    .bind(&entry.description)
    .bind(entry.related_id)
    .bind(entry.transfer_id)
    .fetch_one(conn)
    .await?;

    row.try_into_domain()
}

fn transfer_failed(plan: &TransferPlan, err: impl std::fmt::Display) -> LedgerError {
    LedgerError::TransferFailed {
        transfer_id: plan.transfer_id,
        reason: err.to_string(),
    }
}

fn category_names(filter: &EntryFilter) -> Option<Vec<String>> {
    filter
        .categories
        .as_ref()
        .map(|cats| cats.iter().map(|c| c.as_str().to_string()).collect())
}

#[async_trait]
impl AccountStore for PostgresLedgerStore {
    #[instrument(skip(self))]
    async fn open_account(&self, user_id: UserId) -> LedgerResult<Account> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("INSERT INTO ledger_accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        fetch_account(&mut conn, user_id).await
    }

    async fn get_account(&self, user_id: UserId) -> LedgerResult<Account> {
        let mut conn = self.pool.acquire().await?;
        fetch_account(&mut conn, user_id).await
    }

    #[instrument(skip(self))]
    async fn close_account(&self, user_id: UserId) -> LedgerResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE ledger_accounts
            SET closed_at = COALESCE(closed_at, NOW()), updated_at = NOW()
            WHERE user_id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AccountRow::into_domain)
            .ok_or(LedgerError::AccountNotFound(user_id))
    }

    async fn debit(&self, user_id: UserId, amount: Credits) -> LedgerResult<Credits> {
        let mut conn = self.pool.acquire().await?;
        debit_in(&mut conn, user_id, amount).await
    }

    async fn credit(&self, user_id: UserId, amount: Credits) -> LedgerResult<Credits> {
        let mut conn = self.pool.acquire().await?;
        credit_in(&mut conn, user_id, amount).await
    }
}

#[async_trait]
impl TransactionLog for PostgresLedgerStore {
    async fn append(&self, entry: NewEntry) -> LedgerResult<TransactionEntry> {
        let mut conn = self.pool.acquire().await?;
        append_in(&mut conn, &entry).await
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

        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {}
            FROM ledger_entries
            WHERE user_id = $1
              AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
            ENTRY_COLUMNS
        ))
        .bind(user_id)
        .bind(after.map(|(ts, _)| ts))
        .bind(after.map(|(_, id)| id))
        .bind(limit as i64 + 1)
        .fetch_all(&self.pool)
        .await?;

        let mut items = rows
            .into_iter()
            .map(EntryRow::try_into_domain)
            .collect::<LedgerResult<Vec<_>>>()?;

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
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {}
            FROM ledger_entries
            WHERE user_id = $1
              AND ($2::text[] IS NULL OR category = ANY($2))
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at < $4)
            ORDER BY created_at ASC, id ASC
            "#,
            ENTRY_COLUMNS
        ))
        .bind(user_id)
        .bind(category_names(filter))
        .bind(filter.from)
        .bind(filter.until)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EntryRow::try_into_domain).collect()
    }

    async fn aggregate_for_user(&self, user_id: UserId, filter: &EntryFilter) -> LedgerResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM ledger_entries
            WHERE user_id = $1
              AND ($2::text[] IS NULL OR category = ANY($2))
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at < $4)
            "#,
        )
        .bind(user_id)
        .bind(category_names(filter))
        .bind(filter.from)
        .bind(filter.until)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn ping(&self) -> LedgerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %entry.user_id, amount = entry.amount))]
    async fn commit_issue(&self, entry: NewEntry) -> LedgerResult<TransactionEntry> {
        if entry.category != Category::Purchase || entry.amount <= 0 {
            return Err(LedgerError::InvalidEntry(
                "issued credits must be a positive purchase entry".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let balance_after = credit_in(&mut tx, entry.user_id, entry.amount).await?;
        let committed = append_in(
            &mut tx,
            &NewEntry {
                balance_after,
                ..entry
            },
        )
        .await?;
        tx.commit().await?;

        Ok(committed)
    }

    #[instrument(
        skip_all,
        level = "debug",
        fields(transfer_id = %plan.transfer_id, amount = plan.amount)
    )]
    async fn commit_transfer(&self, plan: &TransferPlan) -> LedgerResult<TransferReceipt> {
        plan.ensure_well_formed()?;
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM ledger_accounts WHERE user_id = ANY($1) ORDER BY user_id FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(vec![plan.from_user_id, plan.to_user_id])
        .fetch_all(&mut *tx)
        .await?;

        let find = |user_id: Uuid| {
            locked
                .iter()
                .find(|row| row.user_id == user_id)
                .cloned()
                .map(AccountRow::into_domain)
                .ok_or(LedgerError::AccountNotFound(user_id))
        };
        let payer = find(plan.from_user_id)?;
        let payee = find(plan.to_user_id)?;

        payer.ensure_open()?;
        payee.ensure_open()?;

        let new_from_balance = payer.balance_after_debit(plan.amount)?;
        let new_to_balance = payee.balance_after_credit(plan.amount)?;

        set_balance_in(&mut tx, plan.from_user_id, new_from_balance).await?;
        set_balance_in(&mut tx, plan.to_user_id, new_to_balance)
            .await
            .map_err(|e| transfer_failed(plan, e))?;

        let debit = append_in(&mut tx, &plan.debit_entry(new_from_balance)).await?;
        let credit = append_in(&mut tx, &plan.credit_entry(new_to_balance)).await?;

        tx.commit().await.map_err(|e| transfer_failed(plan, e))?;

        Ok(TransferReceipt {
            transfer_id: plan.transfer_id,
            debit,
            credit,
        })
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, Clone, sqlx::FromRow)]
struct AccountRow {
    user_id: Uuid,
    balance: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl AccountRow {
    fn into_domain(self) -> Account {
        Account {
            user_id: self.user_id,
            balance: self.balance,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: i64,
    user_id: Uuid,
    category: String,
    amount: i64,
    balance_after: i64,
    description: String,
    related_id: Option<Uuid>,
    transfer_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl EntryRow {
    fn try_into_domain(self) -> LedgerResult<TransactionEntry> {
        Ok(TransactionEntry {
            id: self.id,
            user_id: self.user_id,
            category: self.category.parse()?,
            amount: self.amount,
            balance_after: self.balance_after,
            description: self.description,
            related_id: self.related_id,
            transfer_id: self.transfer_id,
            created_at: self.created_at,
        })
    }
}
