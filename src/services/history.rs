//! Streaming reads of a user's full history, and the export encodings built on them.

use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use csv::WriterBuilder;
use futures::stream::{Stream, StreamExt};
use serde::Serialize;

use crate::domain::{LedgerError, LedgerResult, Page, PageRequest, TransactionEntry, UserId};
use crate::ports::LedgerStore;

/// Page size used when walking a full history.
pub const BATCH_SIZE: usize = 100;

pub type EntryStream = Pin<Box<dyn Stream<Item = LedgerResult<TransactionEntry>> + Send>>;
pub type LineStream = Pin<Box<dyn Stream<Item = LedgerResult<String>> + Send>>;

const CSV_HEADER: &str =
    "id,category,amount,balance_after,description,related_id,transfer_id,created_at\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    /// One JSON object per line.
    Json,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/x-ndjson",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "jsonl",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" | "jsonl" => Ok(ExportFormat::Json),
            other => Err(LedgerError::InvalidEntry(format!(
                "unsupported export format '{}'",
                other
            ))),
        }
    }
}

#[derive(Serialize)]
struct EntryCsvRow {
    id: i64,
    category: &'static str,
    amount: i64,
    balance_after: i64,
    description: String,
    related_id: String,
    transfer_id: String,
    created_at: String,
}

impl From<&TransactionEntry> for EntryCsvRow {
    fn from(entry: &TransactionEntry) -> Self {
        EntryCsvRow {
            id: entry.id,
            category: entry.category.as_str(),
            amount: entry.amount,
            balance_after: entry.balance_after,
            description: entry.description.clone(),
            related_id: entry.related_id.map(|id| id.to_string()).unwrap_or_default(),
            transfer_id: entry.transfer_id.map(|id| id.to_string()).unwrap_or_default(),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Every entry of `user_id`, newest first, fetched `batch` at a time.
pub fn history(store: Arc<dyn LedgerStore>, user_id: UserId, batch: usize) -> EntryStream {
    Box::pin(paged(store, user_id, batch))
}

fn paged(
    store: Arc<dyn LedgerStore>,
    user_id: UserId,
    batch: usize,
) -> impl Stream<Item = LedgerResult<TransactionEntry>> + Send {
    async_stream::try_stream! {
        let mut request = PageRequest::first(batch);
        loop {
            let Page { items, next_cursor } = store.list_for_user(user_id, &request).await?;
            for entry in items {
                yield entry;
            }
            match next_cursor {
                Some(cursor) => request = PageRequest::after(batch, cursor),
                None => break,
            }
        }
    }
}

pub fn export_lines(entries: EntryStream, format: ExportFormat) -> LineStream {
    match format {
        ExportFormat::Csv => {
            let header = futures::stream::once(async { Ok(CSV_HEADER.to_string()) });
            Box::pin(header.chain(entries.map(|entry| entry.and_then(|e| csv_line(&e)))))
        }
        ExportFormat::Json => Box::pin(entries.map(|entry| entry.and_then(|e| json_line(&e)))),
    }
}

fn csv_line(entry: &TransactionEntry) -> LedgerResult<String> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(vec![]);
    writer
        .serialize(EntryCsvRow::from(entry))
        .map_err(|e| LedgerError::Storage(format!("csv encoding failed: {}", e)))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| LedgerError::Storage(format!("csv encoding failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| LedgerError::Storage(e.to_string()))
}

fn json_line(entry: &TransactionEntry) -> LedgerResult<String> {
    let mut line =
        serde_json::to_string(entry).map_err(|e| LedgerError::Storage(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryLedgerStore;
    use crate::domain::{Category, NewEntry};
    use crate::ports::AccountStore;
    use futures::TryStreamExt;
    use uuid::Uuid;

    async fn seeded(purchases: usize) -> (Arc<MemoryLedgerStore>, UserId) {
        let store = Arc::new(MemoryLedgerStore::new());
        let user = Uuid::new_v4();
        store.open_account(user).await.unwrap();
        for i in 0..purchases {
            store
                .commit_issue(NewEntry {
                    user_id: user,
                    category: Category::Purchase,
                    amount: 10,
                    balance_after: 0,
                    description: format!("Pack, {}", i),
                    related_id: None,
                    transfer_id: None,
                })
                .await
                .unwrap();
        }
        (store, user)
    }

    #[tokio::test]
    async fn test_history_walks_every_page() {
        let (store, user) = seeded(7).await;

        let entries: Vec<_> = history(store, user, 3).try_collect().await.unwrap();

        assert_eq!(entries.len(), 7);
        assert!(entries.windows(2).all(|w| w[0].id > w[1].id));
        assert_eq!(entries[0].balance_after, 70);
    }

    #[tokio::test]
    async fn test_history_without_entries_is_empty() {
        let store = Arc::new(MemoryLedgerStore::new());
        let user = Uuid::new_v4();
        store.open_account(user).await.unwrap();

        let entries: Vec<_> = history(store, user, 10).try_collect().await.unwrap();

        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_csv_export_quotes_descriptions() {
        let (store, user) = seeded(2).await;

        let lines: Vec<String> = export_lines(history(store, user, 10), ExportFormat::Csv)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].contains(",purchase,10,20,\"Pack, 1\","));
    }

    #[tokio::test]
    async fn test_json_export_emits_one_object_per_line() {
        let (store, user) = seeded(2).await;

        let lines: Vec<String> = export_lines(history(store, user, 10), ExportFormat::Json)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(lines.len(), 2);
        let parsed: TransactionEntry = serde_json::from_str(lines[1].trim_end()).unwrap();
        assert_eq!(parsed.category, Category::Purchase);
        assert_eq!(parsed.balance_after, 10);
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
