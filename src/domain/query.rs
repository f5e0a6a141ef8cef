use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, TransactionEntry};

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Keyset page request over a user's log, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct PageRequest {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            cursor: None,
        }
    }

    pub fn after(limit: usize, cursor: impl Into<String>) -> Self {
        Self {
            limit: Some(limit),
            cursor: Some(cursor.into()),
        }
    }

    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Present when more items may follow.
    pub next_cursor: Option<String>,
}

/// Selects entries of one user. `from` is inclusive, `until` exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryFilter {
    pub categories: Option<Vec<Category>>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl EntryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn categories(categories: &[Category]) -> Self {
        Self {
            categories: Some(categories.to_vec()),
            ..Self::default()
        }
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.until = until;
        self
    }

    pub fn matches(&self, entry: &TransactionEntry) -> bool {
        if let Some(categories) = &self.categories {
            if !categories.contains(&entry.category) {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.created_at < from {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.created_at >= until {
                return false;
            }
        }
        true
    }
}
