//! Derives the twelve-month actual/forecast breakdown from a year of daily
//! entries.

use chrono::{Datelike, NaiveDate};

use crate::cost::round2;
use crate::models::{CostEntry, EntryKind, MonthlyBreakdownItem};

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Sums below this are rendered as absent rather than as a meaningless
/// near-zero value.
const PRESENCE_THRESHOLD: f64 = 0.005;

/// Bucket a year of daily actual+forecast entries into twelve months and
/// compute the month-end projection for the current month.
///
/// Months before the current one carry only `actual`; the current month
/// carries `actual` so far plus a `forecast` equal to the month-end
/// projection (actual + remaining forecast); later months carry only
/// `forecast`. Returns the breakdown and the current month's projection,
/// or an empty breakdown and `None` when no daily data was available.
pub fn derive_monthly_breakdown(
    entries: &[CostEntry],
    today: NaiveDate,
) -> (Vec<MonthlyBreakdownItem>, Option<f64>) {
    if entries.is_empty() {
        return (Vec::new(), None);
    }

    let mut actual_by_month = [0.0f64; 12];
    let mut forecast_by_month = [0.0f64; 12];

    for entry in entries {
        let Some(date) = entry
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };
        let idx = (date.month() - 1) as usize;
        match entry.entry_type {
            EntryKind::Actual => actual_by_month[idx] += entry.amount,
            EntryKind::Forecast => forecast_by_month[idx] += entry.amount,
        }
    }

    let current_month = today.month() as usize;
    let current_year = today.year();

    let items: Vec<MonthlyBreakdownItem> = (1..=12)
        .map(|month| {
            let actual_sum = actual_by_month[month - 1];
            let forecast_sum = forecast_by_month[month - 1];

            let (actual, forecast) = if month < current_month {
                (present(actual_sum), None)
            } else if month == current_month {
                // The projection is always reported, even when zero.
                (
                    present(actual_sum),
                    Some(round2(actual_sum + forecast_sum)),
                )
            } else {
                (None, present(forecast_sum))
            };

            MonthlyBreakdownItem {
                month: MONTH_LABELS[month - 1].into(),
                year: current_year,
                actual,
                forecast,
            }
        })
        .collect();

    let projected = items[current_month - 1].forecast;
    (items, projected)
}

fn present(sum: f64) -> Option<f64> {
    (sum > PRESENCE_THRESHOLD).then(|| round2(sum))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(date: &str, amount: f64, kind: EntryKind) -> CostEntry {
        CostEntry {
            date: Some(date.into()),
            amount,
            currency: "USD".into(),
            resource_group_name: None,
            resource_id: None,
            entry_type: kind,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn test_empty_input_yields_no_breakdown() {
        let (items, projected) = derive_monthly_breakdown(&[], today());
        assert!(items.is_empty());
        assert_eq!(projected, None);
    }

    #[test]
    fn test_past_month_has_only_actual() {
        let entries = vec![
            entry("2025-03-01", 3.0, EntryKind::Actual),
            entry("2025-03-02", 2.0, EntryKind::Actual),
        ];
        let (items, _) = derive_monthly_breakdown(&entries, today());
        assert_eq!(items.len(), 12);
        assert_eq!(items[2].month, "Mar");
        assert_eq!(items[2].actual, Some(5.0));
        assert_eq!(items[2].forecast, None);
    }

    #[test]
    fn test_near_zero_sum_is_absent_not_zero() {
        let entries = vec![entry("2025-03-01", 0.003, EntryKind::Actual)];
        let (items, _) = derive_monthly_breakdown(&entries, today());
        assert_eq!(items[2].actual, None);
    }

    #[test]
    fn test_current_month_projection_adds_remaining_forecast() {
        let entries = vec![
            entry("2025-06-01", 100.0, EntryKind::Actual),
            entry("2025-06-20", 50.0, EntryKind::Forecast),
        ];
        let (items, projected) = derive_monthly_breakdown(&entries, today());
        assert_eq!(items[5].actual, Some(100.0));
        assert_eq!(items[5].forecast, Some(150.0));
        assert_eq!(projected, Some(150.0));
    }

    #[test]
    fn test_current_month_projection_present_even_when_zero() {
        let entries = vec![entry("2025-01-05", 10.0, EntryKind::Actual)];
        let (items, projected) = derive_monthly_breakdown(&entries, today());
        assert_eq!(items[5].actual, None);
        assert_eq!(items[5].forecast, Some(0.0));
        assert_eq!(projected, Some(0.0));
    }

    #[test]
    fn test_future_month_has_only_forecast() {
        let entries = vec![
            entry("2025-09-10", 40.0, EntryKind::Forecast),
            entry("2025-09-11", 2.5, EntryKind::Forecast),
        ];
        let (items, _) = derive_monthly_breakdown(&entries, today());
        assert_eq!(items[8].month, "Sep");
        assert_eq!(items[8].actual, None);
        assert_eq!(items[8].forecast, Some(42.5));
    }

    #[test]
    fn test_entries_without_dates_are_ignored() {
        let mut entries = vec![entry("2025-02-01", 7.0, EntryKind::Actual)];
        entries.push(CostEntry {
            date: None,
            amount: 99.0,
            currency: "USD".into(),
            resource_group_name: None,
            resource_id: None,
            entry_type: EntryKind::Actual,
        });
        let (items, _) = derive_monthly_breakdown(&entries, today());
        assert_eq!(items[1].actual, Some(7.0));
        let total: f64 = items.iter().filter_map(|i| i.actual).sum();
        assert_eq!(total, 7.0);
    }

    #[test]
    fn test_labels_run_january_through_december() {
        let entries = vec![entry("2025-01-01", 1.0, EntryKind::Actual)];
        let (items, _) = derive_monthly_breakdown(&entries, today());
        let labels: Vec<&str> = items.iter().map(|i| i.month.as_str()).collect();
        assert_eq!(labels, MONTH_LABELS.to_vec());
        assert!(items.iter().all(|i| i.year == 2025));
    }
}
