//! Resolves named timeframes into concrete UTC time periods.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::errors::CostError;

/// A concrete query window, start-of-day to end-of-day in UTC.
/// Invariant: `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimePeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimePeriod {
    fn days(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: day_start(from),
            to: day_end(to),
        }
    }

    /// Calendar date of the window start, YYYY-MM-DD.
    pub fn from_date(&self) -> String {
        self.from.date_naive().to_string()
    }

    /// Calendar date of the window end, YYYY-MM-DD.
    pub fn to_date(&self) -> String {
        self.to.date_naive().to_string()
    }
}

fn day_start(d: NaiveDate) -> DateTime<Utc> {
    d.and_time(NaiveTime::MIN).and_utc()
}

fn day_end(d: NaiveDate) -> DateTime<Utc> {
    let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    d.and_time(end).and_utc()
}

fn first_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

fn last_of_month(d: NaiveDate) -> NaiveDate {
    let first = first_of_month(d);
    if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year(), 12, 31).unwrap_or(d)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
            .map(|next| next - Duration::days(1))
            .unwrap_or(d)
    }
}

/// Resolve a timeframe name anchored on today (UTC).
pub fn resolve(
    timeframe: &str,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
) -> Result<TimePeriod, CostError> {
    resolve_at(Utc::now().date_naive(), timeframe, from_date, to_date)
}

/// Resolve a timeframe name anchored on an explicit date.
///
/// Timeframe names are matched case-insensitively. Unknown names fall back
/// to month-to-date with a warning; callers that want a hard failure must
/// validate the name upfront.
pub fn resolve_at(
    today: NaiveDate,
    timeframe: &str,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
) -> Result<TimePeriod, CostError> {
    let period = match timeframe.to_lowercase().as_str() {
        "custom" => {
            let (from, to) = match (from_date, to_date) {
                (Some(f), Some(t)) => (f, t),
                _ => {
                    return Err(CostError::InvalidInput(
                        "from_date and to_date are required for Custom timeframe.".into(),
                    ))
                }
            };
            if from > to {
                return Err(CostError::InvalidInput(
                    "from_date cannot be after to_date for Custom timeframe.".into(),
                ));
            }
            TimePeriod::days(from, to)
        }
        "monthtodate" | "billingmonthtodate" => TimePeriod::days(first_of_month(today), today),
        "yeartodate" => {
            let jan1 = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
            TimePeriod::days(jan1, today)
        }
        "quartertodate" => {
            let quarter_first_month = (today.month0() / 3) * 3 + 1;
            let quarter_start =
                NaiveDate::from_ymd_opt(today.year(), quarter_first_month, 1).unwrap_or(today);
            TimePeriod::days(quarter_start, today)
        }
        "thelast7days" => TimePeriod::days(today - Duration::days(6), today),
        "thelastmonth" => {
            let last_day_prev = first_of_month(today) - Duration::days(1);
            TimePeriod::days(first_of_month(last_day_prev), last_day_prev)
        }
        "thelast30days" => TimePeriod::days(today - Duration::days(29), today),
        other => {
            tracing::warn!("Unsupported timeframe '{other}', defaulting to MonthToDate");
            TimePeriod::days(first_of_month(today), today)
        }
    };
    Ok(period)
}

/// The remaining-days window of the current month, [tomorrow, last day of
/// month], used for forward-looking forecast queries. `None` when today is
/// the last day of the month and there is nothing left to forecast.
pub fn current_month_forecast_window(today: NaiveDate) -> Option<TimePeriod> {
    let tomorrow = today + Duration::days(1);
    let last_day = last_of_month(today);
    if tomorrow > last_day {
        return None;
    }
    Some(TimePeriod::days(tomorrow, last_day))
}

/// The full calendar year containing today, Jan 1 through Dec 31.
pub fn current_year_window(today: NaiveDate) -> TimePeriod {
    let jan1 = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
    let dec31 = NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today);
    TimePeriod::days(jan1, dec31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    const TODAY: fn() -> NaiveDate = || d(2025, 5, 15);

    #[test]
    fn test_month_to_date() {
        let p = resolve_at(TODAY(), "MonthToDate", None, None).unwrap();
        assert_eq!(p.from_date(), "2025-05-01");
        assert_eq!(p.to_date(), "2025-05-15");
    }

    #[test]
    fn test_billing_month_to_date_matches_month_to_date() {
        let a = resolve_at(TODAY(), "MonthToDate", None, None).unwrap();
        let b = resolve_at(TODAY(), "BillingMonthToDate", None, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_year_to_date() {
        let p = resolve_at(TODAY(), "YearToDate", None, None).unwrap();
        assert_eq!(p.from_date(), "2025-01-01");
        assert_eq!(p.to_date(), "2025-05-15");
    }

    #[test]
    fn test_quarter_to_date() {
        let p = resolve_at(TODAY(), "QuarterToDate", None, None).unwrap();
        assert_eq!(p.from_date(), "2025-04-01");
        let q1 = resolve_at(d(2025, 2, 10), "quartertodate", None, None).unwrap();
        assert_eq!(q1.from_date(), "2025-01-01");
        let q4 = resolve_at(d(2025, 11, 2), "quartertodate", None, None).unwrap();
        assert_eq!(q4.from_date(), "2025-10-01");
    }

    #[test]
    fn test_last_7_days_is_inclusive() {
        let p = resolve_at(TODAY(), "TheLast7Days", None, None).unwrap();
        assert_eq!(p.from_date(), "2025-05-09");
        assert_eq!(p.to_date(), "2025-05-15");
    }

    #[test]
    fn test_last_30_days_is_inclusive() {
        let p = resolve_at(TODAY(), "TheLast30Days", None, None).unwrap();
        assert_eq!(p.from_date(), "2025-04-16");
        assert_eq!(p.to_date(), "2025-05-15");
    }

    #[test]
    fn test_last_month_full_calendar_month() {
        let p = resolve_at(TODAY(), "TheLastMonth", None, None).unwrap();
        assert_eq!(p.from_date(), "2025-04-01");
        assert_eq!(p.to_date(), "2025-04-30");
    }

    #[test]
    fn test_last_month_across_year_boundary() {
        let p = resolve_at(d(2025, 1, 10), "TheLastMonth", None, None).unwrap();
        assert_eq!(p.from_date(), "2024-12-01");
        assert_eq!(p.to_date(), "2024-12-31");
    }

    #[test]
    fn test_custom_requires_both_bounds() {
        let err = resolve_at(TODAY(), "Custom", Some(d(2025, 1, 1)), None).unwrap_err();
        assert!(matches!(err, CostError::InvalidInput(_)));
        let err = resolve_at(TODAY(), "Custom", None, Some(d(2025, 1, 1))).unwrap_err();
        assert!(matches!(err, CostError::InvalidInput(_)));
    }

    #[test]
    fn test_custom_rejects_inverted_bounds() {
        let err =
            resolve_at(TODAY(), "custom", Some(d(2025, 2, 2)), Some(d(2025, 2, 1))).unwrap_err();
        assert!(matches!(err, CostError::InvalidInput(_)));
    }

    #[test]
    fn test_custom_covers_whole_days() {
        let p = resolve_at(TODAY(), "Custom", Some(d(2025, 3, 1)), Some(d(2025, 3, 10))).unwrap();
        assert_eq!(p.from, day_start(d(2025, 3, 1)));
        assert_eq!(p.to, day_end(d(2025, 3, 10)));
    }

    #[test]
    fn test_unknown_timeframe_falls_back_to_month_to_date() {
        let p = resolve_at(TODAY(), "SomethingElse", None, None).unwrap();
        let mtd = resolve_at(TODAY(), "MonthToDate", None, None).unwrap();
        assert_eq!(p, mtd);
    }

    #[test]
    fn test_presets_never_end_in_the_future() {
        for tf in [
            "MonthToDate",
            "BillingMonthToDate",
            "YearToDate",
            "QuarterToDate",
            "TheLast7Days",
            "TheLastMonth",
            "TheLast30Days",
        ] {
            let p = resolve_at(TODAY(), tf, None, None).unwrap();
            assert!(p.from <= p.to, "{tf}: from > to");
            assert!(p.to <= day_end(TODAY()), "{tf}: ends after today");
        }
    }

    #[test]
    fn test_forecast_window_mid_month() {
        let w = current_month_forecast_window(TODAY()).unwrap();
        assert_eq!(w.from_date(), "2025-05-16");
        assert_eq!(w.to_date(), "2025-05-31");
    }

    #[test]
    fn test_forecast_window_empty_on_last_day() {
        assert!(current_month_forecast_window(d(2025, 5, 31)).is_none());
        assert!(current_month_forecast_window(d(2025, 12, 31)).is_none());
    }

    #[test]
    fn test_current_year_window() {
        let w = current_year_window(TODAY());
        assert_eq!(w.from_date(), "2025-01-01");
        assert_eq!(w.to_date(), "2025-12-31");
    }
}
