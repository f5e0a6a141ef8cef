//! Read-side aggregation over a user's log.
//! Pure functions; the dashboard service feeds them entries from the store.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::{Category, Credits, LedgerError, TransactionEntry};

/// Reporting window, resolved in UTC calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    ThisMonth,
    LastMonth,
    AllTime,
    /// `[start, end)`
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl Period {
    pub fn bounds(&self, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let this_month = month_start(now);
        match self {
            Period::ThisMonth => (Some(this_month), Some(shift_months(this_month, 1))),
            Period::LastMonth => (Some(shift_months(this_month, -1)), Some(this_month)),
            Period::AllTime => (None, None),
            Period::Range { start, end } => (Some(*start), Some(*end)),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let (from, until) = self.bounds(now);
        from.map_or(true, |from| ts >= from) && until.map_or(true, |until| ts < until)
    }
}

impl FromStr for Period {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "this_month" => Ok(Period::ThisMonth),
            "last_month" => Ok(Period::LastMonth),
            "all_time" => Ok(Period::AllTime),
            other => Err(LedgerError::InvalidEntry(format!(
                "unknown period '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EarningsBreakdown {
    pub subscriptions: Credits,
    pub tips: Credits,
    pub ppv: Credits,
    pub total: Credits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyBucket {
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: Credits,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpendSummary {
    /// Magnitude of every debit entry.
    pub spent: Credits,
    /// Sum of every credit entry, purchases included.
    pub received: Credits,
}

pub fn earnings_breakdown(
    entries: &[TransactionEntry],
    period: &Period,
    now: DateTime<Utc>,
) -> EarningsBreakdown {
    let mut breakdown = EarningsBreakdown::default();

    for entry in entries.iter().filter(|e| period.contains(e.created_at, now)) {
        match entry.category {
            Category::SubscriptionEarning => breakdown.subscriptions += entry.amount,
            Category::TipReceived | Category::ChatTipReceived => breakdown.tips += entry.amount,
            Category::PpvEarning | Category::MessagePpvEarning => breakdown.ppv += entry.amount,
            _ => continue,
        }
        breakdown.total += entry.amount;
    }

    breakdown
}

/// Longest monthly series the views will build.
pub const MAX_MONTHS_BACK: u32 = 60;

/// Earnings per calendar month for the trailing `months_back` months, oldest first.
/// The current month is the last bucket. `months_back` is capped at `MAX_MONTHS_BACK`.
pub fn monthly_series(
    entries: &[TransactionEntry],
    months_back: u32,
    now: DateTime<Utc>,
) -> Vec<MonthlyBucket> {
    let months_back = months_back.min(MAX_MONTHS_BACK) as i32;
    let current = month_start(now);
    let mut buckets: Vec<MonthlyBucket> = (0..months_back)
        .rev()
        .map(|back| {
            let start = shift_months(current, -back);
            MonthlyBucket {
                label: start.format("%b %Y").to_string(),
                start,
                end: shift_months(start, 1),
                value: 0,
            }
        })
        .collect();

    for entry in entries.iter().filter(|e| e.category.is_earning()) {
        if let Some(bucket) = buckets
            .iter_mut()
            .find(|b| entry.created_at >= b.start && entry.created_at < b.end)
        {
            bucket.value += entry.amount;
        }
    }

    buckets
}

pub fn spend_summary(entries: &[TransactionEntry]) -> SpendSummary {
    entries
        .iter()
        .fold(SpendSummary::default(), |mut summary, entry| {
            if entry.category.is_debit() {
                summary.spent += entry.amount.abs();
            } else {
                summary.received += entry.amount;
            }
            summary
        })
}

fn first_of_month(year: i32, month: u32) -> DateTime<Utc> {
    let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

pub fn month_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    first_of_month(ts.year(), ts.month())
}

/// Moves a first-of-month timestamp by whole months.
pub fn shift_months(start: DateTime<Utc>, delta: i32) -> DateTime<Utc> {
    let index = start.year() * 12 + start.month0() as i32 + delta;
    first_of_month(index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn entry(category: Category, amount: Credits, created_at: DateTime<Utc>) -> TransactionEntry {
        TransactionEntry {
            id: 0,
            user_id: Uuid::nil(),
            category,
            amount,
            balance_after: 0,
            description: String::new(),
            related_id: None,
            transfer_id: None,
            created_at,
        }
    }

    #[test]
    fn test_month_arithmetic_crosses_years() {
        let jan = month_start(at(2026, 1, 20));
        assert_eq!(jan, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(shift_months(jan, -1), Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(shift_months(jan, 12), Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(shift_months(jan, -13), Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_period_bounds() {
        let now = at(2026, 3, 10);
        let (from, until) = Period::LastMonth.bounds(now);
        assert_eq!(from, Some(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()));
        assert_eq!(until, Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()));
        assert_eq!(Period::AllTime.bounds(now), (None, None));
        assert_eq!("this_month".parse::<Period>().unwrap(), Period::ThisMonth);
        assert!("fortnight".parse::<Period>().is_err());
    }

    #[test]
    fn test_earnings_breakdown_groups_categories() {
        let now = at(2026, 3, 10);
        let entries = vec![
            entry(Category::SubscriptionEarning, 50, at(2026, 3, 1)),
            entry(Category::TipReceived, 10, at(2026, 3, 2)),
            entry(Category::ChatTipReceived, 5, at(2026, 3, 3)),
            entry(Category::PpvEarning, 20, at(2026, 3, 4)),
            entry(Category::MessagePpvEarning, 7, at(2026, 3, 5)),
            entry(Category::Purchase, 500, at(2026, 3, 5)),
            entry(Category::TipSent, -3, at(2026, 3, 6)),
            entry(Category::TipReceived, 99, at(2026, 2, 28)),
        ];

        let this_month = earnings_breakdown(&entries, &Period::ThisMonth, now);
        assert_eq!(
            this_month,
            EarningsBreakdown {
                subscriptions: 50,
                tips: 15,
                ppv: 27,
                total: 92,
            }
        );

        let last_month = earnings_breakdown(&entries, &Period::LastMonth, now);
        assert_eq!(last_month.tips, 99);
        assert_eq!(last_month.total, 99);

        let all = earnings_breakdown(&entries, &Period::AllTime, now);
        assert_eq!(all.total, 191);
        assert_eq!(all, earnings_breakdown(&entries, &Period::AllTime, now));
    }

    #[test]
    fn test_monthly_series_fills_gaps_with_zero() {
        let now = at(2026, 6, 15);
        let entries = vec![
            entry(Category::TipReceived, 10, at(2026, 2, 3)),
            entry(Category::PpvEarning, 15, at(2026, 2, 27)),
            entry(Category::SubscriptionEarning, 40, at(2026, 5, 1)),
            entry(Category::TipSent, -8, at(2026, 4, 1)),
            entry(Category::TipReceived, 1000, at(2025, 12, 31)),
        ];

        let series = monthly_series(&entries, 6, now);

        let labels: Vec<_> = series.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Jan 2026", "Feb 2026", "Mar 2026", "Apr 2026", "May 2026", "Jun 2026"]
        );
        let values: Vec<_> = series.iter().map(|b| b.value).collect();
        assert_eq!(values, vec![0, 25, 0, 0, 40, 0]);
    }

    #[test]
    fn test_monthly_series_length_is_capped() {
        let now = at(2026, 6, 15);
        let series = monthly_series(&[], u32::MAX, now);

        assert_eq!(series.len(), MAX_MONTHS_BACK as usize);
        assert_eq!(series[0].label, "Jul 2021");
        assert_eq!(series[series.len() - 1].label, "Jun 2026");
        assert!(monthly_series(&[], 0, now).is_empty());
    }

    #[test]
    fn test_monthly_bucket_bounds_are_half_open() {
        let now = at(2026, 6, 15);
        let boundary = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let entries = vec![entry(Category::TipReceived, 4, boundary)];

        let series = monthly_series(&entries, 2, now);
        assert_eq!(series[0].value, 0);
        assert_eq!(series[1].value, 4);
        assert!(monthly_series(&entries, 0, now).is_empty());
    }

    #[test]
    fn test_spend_summary_splits_by_direction() {
        let now = at(2026, 6, 15);
        let entries = vec![
            entry(Category::Purchase, 200, now),
            entry(Category::TipSent, -30, now),
            entry(Category::SubscriptionPayment, -20, now),
            entry(Category::PpvEarning, 12, now),
        ];

        assert_eq!(
            spend_summary(&entries),
            SpendSummary {
                spent: 50,
                received: 212,
            }
        );
    }
}
