use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::ports::LedgerStore;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, DependencyStatus::Healthy { .. })
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct LedgerStoreChecker {
    store: Arc<dyn LedgerStore>,
}

impl LedgerStoreChecker {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DependencyChecker for LedgerStoreChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.store.ping().await {
            Ok(()) => DependencyStatus::Healthy {
                status: "healthy".to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => DependencyStatus::Unhealthy {
                status: "unhealthy".to_string(),
                error: e.to_string(),
            },
        }
    }
}

pub async fn check_health(ledger: &dyn DependencyChecker, start_time: Instant) -> HealthResponse {
    let ledger_status = timeout(Duration::from_secs(5), ledger.check())
        .await
        .unwrap_or_else(|_| DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: "timeout".to_string(),
        });

    let status = if ledger_status.is_healthy() {
        "healthy"
    } else {
        "unhealthy"
    };

    let mut dependencies = HashMap::new();
    dependencies.insert("ledger".to_string(), ledger_status);

    HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        dependencies,
    }
}
