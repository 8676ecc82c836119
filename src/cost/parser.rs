//! Interpretation of columnar Cost Management query results.
//!
//! Two entry points share one row walker: [`parse_detail`] produces the
//! typed entry list plus totals, [`parse_monthly_aggregate`] produces
//! month-keyed totals. The walker is a pure fold over rows; malformed rows
//! become skip outcomes and never abort the parse.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::azure::query::QueryResult;
use crate::cost::round2;
use crate::errors::CostError;
use crate::models::{CostEntry, EntryKind};

/// Only resource groups under this domain prefix participate in per-group
/// aggregation and the grouped detail list.
pub const RG_PREFIX_FILTER: &str = "caz-";

/// Time bucketing requested from the remote query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    None,
    Daily,
    Monthly,
}

impl Granularity {
    /// Case-insensitive; anything unrecognized is treated as no bucketing.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "daily" => Self::Daily,
            "monthly" => Self::Monthly,
            _ => Self::None,
        }
    }

    /// Value for the query dataset; the API expects the field to be absent
    /// for a single total.
    pub fn as_query_value(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Daily => Some("Daily".into()),
            Self::Monthly => Some("Monthly".into()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Aggregate by resource group and keep only prefix-matching rows.
    pub group_by_resource_group: bool,
    pub granularity: Granularity,
    /// Used when neither the `IsActualCost` column nor the daily date check
    /// can classify a row.
    pub default_kind: EntryKind,
}

/// Detail-mode parse output.
#[derive(Debug, Clone)]
pub struct CostTable {
    pub total: f64,
    pub currency: String,
    pub by_resource_group: HashMap<String, f64>,
    pub entries: Vec<CostEntry>,
}

/// Month-keyed parse output, `(year, month) -> cost`.
#[derive(Debug, Clone)]
pub struct MonthlyCosts {
    pub total: f64,
    pub currency: String,
    pub by_month: BTreeMap<(i32, u32), f64>,
}

/// Positions of the recognized columns, resolved case-insensitively.
#[derive(Debug)]
struct ColumnIndex {
    cost: usize,
    currency: usize,
    resource_group: Option<usize>,
    resource_id: Option<usize>,
    date: Option<usize>,
    is_actual: Option<usize>,
}

const DATE_COLUMN_PRIORITY: [&str; 2] = ["usagedate", "billingmonth"];

fn resolve_columns(result: &QueryResult) -> Result<ColumnIndex, CostError> {
    let map: HashMap<String, usize> = result
        .columns
        .iter()
        .enumerate()
        .map(|(idx, col)| (col.name.to_lowercase(), idx))
        .collect();

    let (cost, currency) = match (map.get("cost"), map.get("currency")) {
        (Some(&cost), Some(&currency)) => (cost, currency),
        _ => {
            return Err(CostError::MissingColumns {
                found: result.columns.iter().map(|c| c.name.clone()).collect(),
            })
        }
    };

    let date = DATE_COLUMN_PRIORITY
        .iter()
        .find_map(|name| map.get(*name).copied());

    Ok(ColumnIndex {
        cost,
        currency,
        resource_group: map.get("resourcegroupname").copied(),
        resource_id: map.get("resourceid").copied(),
        date,
        is_actual: map.get("isactualcost").copied(),
    })
}

/// One successfully converted row.
#[derive(Debug)]
struct ParsedRow {
    cost: f64,
    currency: String,
    resource_group: Option<String>,
    resource_id: Option<String>,
    date: Option<NaiveDate>,
    kind: EntryKind,
}

/// Fold outcome for a single row: either a converted row or the reason it
/// was skipped.
#[derive(Debug)]
enum RowOutcome {
    Row(ParsedRow),
    Skipped(String),
}

fn cell<'a>(row: &'a [Value], idx: usize) -> Result<&'a Value, String> {
    row.get(idx).ok_or_else(|| format!("missing cell {idx}"))
}

fn value_as_f64(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| "non-finite number".into()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{s}' is not a number")),
        other => Err(format!("unexpected cost value {other}")),
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Dates arrive as integer YYYYMMDD, 8-digit numeric strings, plain
/// YYYY-MM-DD, or ISO date-times. Anything else is tolerated as no date.
fn parse_date_value(value: &Value) -> Option<NaiveDate> {
    let text = match value {
        Value::Number(n) => n.as_i64()?.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    let date_part = text.split('T').next().unwrap_or(&text).trim_end_matches('Z');

    let parsed = if date_part.len() == 8 && date_part.chars().all(|c| c.is_ascii_digit()) {
        NaiveDate::parse_from_str(date_part, "%Y%m%d")
    } else {
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
    };

    match parsed {
        Ok(d) => Some(d),
        Err(_) => {
            tracing::debug!("Could not parse date value '{text}'");
            None
        }
    }
}

fn parse_row(
    cols: &ColumnIndex,
    row: &[Value],
    opts: &ParseOptions,
    today: NaiveDate,
) -> Result<ParsedRow, String> {
    let cost = value_as_f64(cell(row, cols.cost)?)?;
    let currency = value_as_string(cell(row, cols.currency)?);

    let resource_group = cols
        .resource_group
        .and_then(|idx| row.get(idx))
        .filter(|v| !v.is_null())
        .map(value_as_string);
    let resource_id = cols
        .resource_id
        .and_then(|idx| row.get(idx))
        .filter(|v| !v.is_null())
        .map(value_as_string);
    let date = cols
        .date
        .and_then(|idx| row.get(idx))
        .and_then(parse_date_value);

    // IsActualCost is authoritative when present; otherwise daily rows dated
    // after today are forecasts; otherwise the caller's default stands.
    let is_actual_flag = cols
        .is_actual
        .and_then(|idx| row.get(idx))
        .and_then(value_as_bool);
    let kind = match is_actual_flag {
        Some(true) => EntryKind::Actual,
        Some(false) => EntryKind::Forecast,
        None => match date {
            Some(d) if opts.granularity == Granularity::Daily && d > today => EntryKind::Forecast,
            _ => opts.default_kind,
        },
    };

    Ok(ParsedRow {
        cost,
        currency,
        resource_group,
        resource_id,
        date,
        kind,
    })
}

fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn walk_rows(
    result: &QueryResult,
    opts: &ParseOptions,
    today: NaiveDate,
) -> Result<Vec<RowOutcome>, CostError> {
    let cols = resolve_columns(result)?;
    Ok(result
        .rows
        .iter()
        .map(|row| match parse_row(&cols, row, opts, today) {
            Ok(parsed) => RowOutcome::Row(parsed),
            Err(reason) => RowOutcome::Skipped(format!("{reason} in row {row:?}")),
        })
        .collect())
}

/// Parse a query result into totals, the per-resource-group map, and the
/// typed entry list. Anchored on today (UTC) for actual/forecast
/// classification.
pub fn parse_detail(result: &QueryResult, opts: ParseOptions) -> Result<CostTable, CostError> {
    parse_detail_at(result, opts, Utc::now().date_naive())
}

pub fn parse_detail_at(
    result: &QueryResult,
    opts: ParseOptions,
    today: NaiveDate,
) -> Result<CostTable, CostError> {
    let outcomes = walk_rows(result, &opts, today)?;

    let mut total = 0.0;
    let mut currency = String::from("USD");
    let mut currency_seen = false;
    let mut by_resource_group: HashMap<String, f64> = HashMap::new();
    let mut entries = Vec::new();

    for outcome in outcomes {
        let row = match outcome {
            RowOutcome::Row(row) => row,
            RowOutcome::Skipped(reason) => {
                tracing::warn!("Skipping malformed row: {reason}");
                continue;
            }
        };

        total += row.cost;
        if !currency_seen && !row.currency.is_empty() {
            currency = row.currency.clone();
            currency_seen = true;
        }

        let matches_prefix = row
            .resource_group
            .as_deref()
            .is_some_and(|rg| rg.starts_with(RG_PREFIX_FILTER));

        if opts.group_by_resource_group {
            if !matches_prefix {
                continue;
            }
            if let Some(rg) = &row.resource_group {
                *by_resource_group.entry(rg.clone()).or_insert(0.0) += row.cost;
            }
        }

        entries.push(CostEntry {
            date: row.date.map(|d| d.to_string()),
            amount: round2(row.cost),
            currency: row.currency,
            resource_group_name: row.resource_group,
            resource_id: row.resource_id,
            entry_type: row.kind,
        });
    }

    // Rounding happens once, at the aggregation boundary.
    for value in by_resource_group.values_mut() {
        *value = round2(*value);
    }

    Ok(CostTable {
        total: round2(total),
        currency,
        by_resource_group,
        entries,
    })
}

/// Parse a query result into `(year, month) -> cost` totals. Rows without a
/// parseable date contribute to the grand total but to no month bucket.
pub fn parse_monthly_aggregate(result: &QueryResult) -> Result<MonthlyCosts, CostError> {
    let opts = ParseOptions {
        group_by_resource_group: false,
        granularity: Granularity::Monthly,
        default_kind: EntryKind::Actual,
    };
    let outcomes = walk_rows(result, &opts, Utc::now().date_naive())?;

    let mut total = 0.0;
    let mut currency = String::from("USD");
    let mut currency_seen = false;
    let mut by_month: BTreeMap<(i32, u32), f64> = BTreeMap::new();

    for outcome in outcomes {
        let row = match outcome {
            RowOutcome::Row(row) => row,
            RowOutcome::Skipped(reason) => {
                tracing::warn!("Skipping malformed row: {reason}");
                continue;
            }
        };

        total += row.cost;
        if !currency_seen && !row.currency.is_empty() {
            currency = row.currency.clone();
            currency_seen = true;
        }
        if let Some(date) = row.date {
            use chrono::Datelike;
            *by_month.entry((date.year(), date.month())).or_insert(0.0) += row.cost;
        }
    }

    for value in by_month.values_mut() {
        *value = round2(*value);
    }

    Ok(MonthlyCosts {
        total: round2(total),
        currency,
        by_month,
    })
}
