use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::Period;
use crate::AppState;

const DEFAULT_MONTHS: u32 = 6;

/// `period=this_month|last_month|all_time`, or an explicit `from`/`until` range.
#[derive(Debug, Default, Deserialize)]
pub struct EarningsQuery {
    pub period: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl EarningsQuery {
    fn period(&self) -> Result<Period, AppError> {
        match (self.from, self.until) {
            (Some(start), Some(end)) => {
                if start >= end {
                    return Err(AppError::BadRequest(
                        "from must be earlier than until".to_string(),
                    ));
                }
                Ok(Period::Range { start, end })
            }
            (None, None) => Ok(self
                .period
                .as_deref()
                .unwrap_or("this_month")
                .parse::<Period>()?),
            _ => Err(AppError::BadRequest(
                "from and until must be given together".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub months: Option<u32>,
}

pub async fn earnings(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<EarningsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let period = query.period()?;
    let breakdown = state.dashboard.earnings_breakdown(user_id, period).await?;
    Ok(Json(breakdown))
}

pub async fn monthly_earnings(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<MonthlyQuery>,
) -> Result<impl IntoResponse, AppError> {
    let months = query.months.unwrap_or(DEFAULT_MONTHS);
    let series = state.dashboard.monthly_series(user_id, months).await?;
    Ok(Json(series))
}

pub async fn spend_summary(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.dashboard.spend_summary(user_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_defaults_to_this_month() {
        assert_eq!(EarningsQuery::default().period().unwrap(), Period::ThisMonth);
    }

    #[test]
    fn test_explicit_range() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        let query = EarningsQuery {
            period: None,
            from: Some(start),
            until: Some(end),
        };
        assert_eq!(query.period().unwrap(), Period::Range { start, end });

        let half = EarningsQuery {
            period: None,
            from: Some(start),
            until: None,
        };
        assert!(half.period().is_err());

        let inverted = EarningsQuery {
            period: None,
            from: Some(end),
            until: Some(start),
        };
        assert!(inverted.period().is_err());
    }

    #[test]
    fn test_unknown_period_is_rejected() {
        let query = EarningsQuery {
            period: Some("forever".to_string()),
            ..Default::default()
        };
        assert!(query.period().is_err());
    }
}
