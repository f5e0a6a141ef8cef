pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod ports;
pub mod services;
pub mod utils;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::adapters::{MemoryLedgerStore, PostgresLedgerStore};
use crate::config::Config;
use crate::ports::LedgerStore;
use crate::services::{AccountService, DashboardService, TransferEngine};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub accounts: AccountService,
    pub engine: TransferEngine,
    pub dashboard: DashboardService,
    pub history_page_limit: usize,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, history_page_limit: usize) -> Self {
        Self {
            accounts: AccountService::new(store.clone()),
            engine: TransferEngine::new(store.clone()),
            dashboard: DashboardService::new(store.clone()),
            store,
            history_page_limit,
            start_time: Instant::now(),
        }
    }
}

/// Postgres when a database is configured, otherwise the in-memory store.
pub async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url, config.database_max_connections).await?;
            db::run_migrations(&pool).await?;
            tracing::info!("Using Postgres ledger store");
            Ok(Arc::new(PostgresLedgerStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, balances will not survive a restart");
            Ok(Arc::new(MemoryLedgerStore::new()))
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/accounts", post(handlers::accounts::open_account))
        .route(
            "/accounts/:id",
            get(handlers::accounts::get_account).delete(handlers::accounts::close_account),
        )
        .route("/accounts/:id/credits", post(handlers::accounts::issue_credits))
        .route(
            "/accounts/:id/transactions",
            get(handlers::accounts::list_transactions),
        )
        .route(
            "/accounts/:id/transactions/export",
            get(handlers::export::export_transactions),
        )
        .route("/accounts/:id/earnings", get(handlers::dashboard::earnings))
        .route(
            "/accounts/:id/earnings/monthly",
            get(handlers::dashboard::monthly_earnings),
        )
        .route("/accounts/:id/spend", get(handlers::dashboard::spend_summary))
        .route("/transfers", post(handlers::transfers::create_transfer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
