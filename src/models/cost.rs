use serde::{Deserialize, Serialize};

/// Whether a cost entry represents realized spend or a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Actual,
    Forecast,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Actual => write!(f, "actual"),
            Self::Forecast => write!(f, "forecast"),
        }
    }
}

/// One parsed row of a cost query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    /// Normalized to YYYY-MM-DD; absent when the source row carried no
    /// parseable date.
    pub date: Option<String>,
    pub amount: f64,
    pub currency: String,
    #[serde(rename = "resourceGroupName")]
    pub resource_group_name: Option<String>,
    #[serde(rename = "resourceId")]
    pub resource_id: Option<String>,
    pub entry_type: EntryKind,
}

/// One month of the derived yearly actual/forecast breakdown.
///
/// Past months carry only `actual`, future months only `forecast`; the
/// current month carries both, with `forecast` being the month-end
/// projection (actual so far + remaining forecast).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBreakdownItem {
    pub month: String,
    pub year: i32,
    pub actual: Option<f64>,
    pub forecast: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionCostDetails {
    pub subscription_id: String,
    pub subscription_name: Option<String>,
    pub total_cost: f64,
    pub currency: String,
    pub costs_by_resource_group: std::collections::HashMap<String, f64>,
    pub timeframe_used: String,
    pub from_date_used: Option<String>,
    pub to_date_used: Option<String>,
    pub granularity_used: String,
    pub projected_cost_current_month: Option<f64>,
    pub yearly_monthly_breakdown: Vec<MonthlyBreakdownItem>,
    pub yearly_daily_breakdown: Vec<CostEntry>,
    pub detailed_entries: Vec<CostEntry>,
}

impl SubscriptionCostDetails {
    /// Zero-valued placeholder used when a subscription in a batch could not
    /// be queried; sibling subscriptions still return real data.
    pub fn empty(subscription_id: &str, timeframe: &str, granularity: &str) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            subscription_name: Some(subscription_id.into()),
            total_cost: 0.0,
            currency: "USD".into(),
            costs_by_resource_group: Default::default(),
            timeframe_used: timeframe.into(),
            from_date_used: None,
            to_date_used: None,
            granularity_used: granularity.into(),
            projected_cost_current_month: Some(0.0),
            yearly_monthly_breakdown: Vec::new(),
            yearly_daily_breakdown: Vec::new(),
            detailed_entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceGroupCostDetails {
    pub subscription_id: String,
    pub resource_group_name: String,
    pub total_cost: f64,
    pub currency: String,
    pub timeframe_used: String,
    pub from_date_used: Option<String>,
    pub to_date_used: Option<String>,
    pub granularity_used: String,
    /// Month-keyed totals ("YYYY-MM"), present only for Monthly granularity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub costs_by_month: Option<std::collections::BTreeMap<String, f64>>,
    pub detailed_entries: Vec<CostEntry>,
}

/// Shared query parameters of the cost endpoints.
#[derive(Debug, Deserialize)]
pub struct CostQueryParams {
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    #[serde(default = "default_granularity")]
    pub granularity: String,
}

pub fn default_timeframe() -> String {
    "MonthToDate".into()
}

pub fn default_granularity() -> String {
    "None".into()
}

#[derive(Debug, Deserialize)]
pub struct BatchCostRequest {
    pub subscription_ids: Vec<String>,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    #[serde(default = "default_granularity")]
    pub granularity: String,
}

#[derive(Debug, Serialize)]
pub struct ReportCreationResponse {
    pub message: String,
    pub file_name: Option<String>,
    pub download_url: Option<String>,
}
