use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{Category, EntryFilter, LedgerResult, UserId};
use crate::ports::LedgerStore;
use crate::services::views::{
    self, EarningsBreakdown, MonthlyBucket, Period, SpendSummary, MAX_MONTHS_BACK,
};

/// Dashboard numbers for a user, computed from the transaction log.
#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn LedgerStore>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn earnings_breakdown(
        &self,
        user_id: UserId,
        period: Period,
    ) -> LedgerResult<EarningsBreakdown> {
        self.earnings_breakdown_at(user_id, period, Utc::now()).await
    }

    pub async fn earnings_breakdown_at(
        &self,
        user_id: UserId,
        period: Period,
        now: DateTime<Utc>,
    ) -> LedgerResult<EarningsBreakdown> {
        self.store.get_account(user_id).await?;
        let (from, until) = period.bounds(now);
        let filter = EntryFilter::categories(&Category::EARNINGS).between(from, until);
        let entries = self.store.entries_for_user(user_id, &filter).await?;
        Ok(views::earnings_breakdown(&entries, &period, now))
    }

    pub async fn monthly_series(
        &self,
        user_id: UserId,
        months_back: u32,
    ) -> LedgerResult<Vec<MonthlyBucket>> {
        self.monthly_series_at(user_id, months_back, Utc::now()).await
    }

    pub async fn monthly_series_at(
        &self,
        user_id: UserId,
        months_back: u32,
        now: DateTime<Utc>,
    ) -> LedgerResult<Vec<MonthlyBucket>> {
        self.store.get_account(user_id).await?;
        let months_back = months_back.min(MAX_MONTHS_BACK);
        if months_back == 0 {
            return Ok(Vec::new());
        }

        let current = views::month_start(now);
        let from = views::shift_months(current, 1 - months_back as i32);
        let until = views::shift_months(current, 1);
        let filter = EntryFilter::categories(&Category::EARNINGS).between(Some(from), Some(until));
        let entries = self.store.entries_for_user(user_id, &filter).await?;

        Ok(views::monthly_series(&entries, months_back, now))
    }

    pub async fn spend_summary(&self, user_id: UserId) -> LedgerResult<SpendSummary> {
        self.store.get_account(user_id).await?;
        let entries = self.store.entries_for_user(user_id, &EntryFilter::all()).await?;
        Ok(views::spend_summary(&entries))
    }

    /// Lifetime earnings, summed by the store.
    pub async fn total_earned(&self, user_id: UserId) -> LedgerResult<i64> {
        self.store
            .aggregate_for_user(user_id, &EntryFilter::categories(&Category::EARNINGS))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryLedgerStore;
    use crate::domain::{LedgerError, TransferKind};
    use crate::ports::AccountStore;
    use crate::services::TransferEngine;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_monthly_series_over_backdated_transfers() {
        let clock = Arc::new(Mutex::new(Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).unwrap()));
        let reading = clock.clone();
        let store = Arc::new(MemoryLedgerStore::with_clock(move || *reading.lock().unwrap()));
        let engine = TransferEngine::new(store.clone());
        let dashboard = DashboardService::new(store.clone());

        let fan = Uuid::new_v4();
        let creator = Uuid::new_v4();
        store.open_account(fan).await.unwrap();
        store.open_account(creator).await.unwrap();
        store.credit(fan, 500).await.unwrap();

        engine
            .execute(TransferKind::Tip, fan, creator, 30, "Tip", None)
            .await
            .unwrap();
        *clock.lock().unwrap() = Utc.with_ymd_and_hms(2026, 5, 2, 9, 0, 0).unwrap();
        engine
            .pay_subscription(fan, creator, 45, Uuid::new_v4())
            .await
            .unwrap();

        let now = Utc.with_ymd_and_hms(2026, 6, 15, 0, 0, 0).unwrap();
        let series = dashboard.monthly_series_at(creator, 6, now).await.unwrap();
        let values: Vec<_> = series.iter().map(|b| b.value).collect();
        assert_eq!(values, vec![0, 30, 0, 0, 45, 0]);

        let spent = dashboard.spend_summary(fan).await.unwrap();
        assert_eq!(spent.spent, 75);
        assert_eq!(spent.received, 0);

        assert_eq!(dashboard.total_earned(creator).await.unwrap(), 75);

        let may = dashboard
            .earnings_breakdown_at(creator, Period::LastMonth, now)
            .await
            .unwrap();
        assert_eq!(may.subscriptions, 45);
        assert_eq!(may.tips, 0);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let dashboard = DashboardService::new(Arc::new(MemoryLedgerStore::new()));
        let ghost = Uuid::new_v4();
        assert_eq!(
            dashboard.spend_summary(ghost).await.unwrap_err(),
            LedgerError::AccountNotFound(ghost)
        );
    }
}
