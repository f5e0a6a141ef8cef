pub mod accounts;
pub mod dashboard;
pub mod history;
pub mod transfer;
pub mod views;

pub use accounts::AccountService;
pub use dashboard::DashboardService;
pub use history::{export_lines, history, ExportFormat};
pub use transfer::TransferEngine;
pub use views::{EarningsBreakdown, MonthlyBucket, Period, SpendSummary};
