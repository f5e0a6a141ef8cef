//! Domain layer.
//! Framework-agnostic types shared by the stores, the transfer engine and the views.

pub mod account;
pub mod category;
pub mod error;
pub mod query;
pub mod transaction;
pub mod transfer;

pub use account::Account;
pub use category::Category;
pub use error::{LedgerError, LedgerResult};
pub use query::{EntryFilter, Page, PageRequest, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use transaction::{EntryId, NewEntry, TransactionEntry};
pub use transfer::{TransferKind, TransferPlan, TransferReceipt, TransferRequest};

/// Opaque user identifier, issued by the authentication provider.
pub type UserId = uuid::Uuid;

/// Platform credits. Always integral; balances never go below zero.
pub type Credits = i64;
