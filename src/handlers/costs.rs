use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use rand::Rng;

use crate::auth::BearerToken;
use crate::cost::service::{self, CostQuery};
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{
    BatchCostRequest, CostQueryParams, ResourceGroupCostDetails, SubscriptionCostDetails,
    TagFilter, TagOperator,
};

/// Parse an optional YYYY-MM-DD query value; the frontend sends the literal
/// string "null" for an unset picker.
pub fn parse_date_param(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    let Some(raw) = value else { return Ok(None) };
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| {
            AppError::bad_request(format!("Invalid {name} format: {raw}. Expected YYYY-MM-DD."))
        })
}

/// Collect tag filters from query parameters: `tag_<Name>=v` means In,
/// `tag_<Name>_ne=v` means NotIn. Several filters combine as a conjunction
/// downstream.
pub fn tag_filters_from_params(params: &HashMap<String, String>) -> Vec<TagFilter> {
    let mut filters = Vec::new();
    for (key, value) in params {
        let Some(tag_key) = key.strip_prefix("tag_") else {
            continue;
        };
        if tag_key.is_empty() {
            continue;
        }
        let (name, operator) = match tag_key.strip_suffix("_ne") {
            Some(name) if !name.is_empty() => (name, TagOperator::NotIn),
            _ => (tag_key, TagOperator::In),
        };
        filters.push(TagFilter {
            name: name.to_string(),
            operator,
            values: vec![value.clone()],
        });
    }
    // HashMap iteration order is arbitrary; keep the conjunction stable.
    filters.sort_by(|a, b| a.name.cmp(&b.name));
    filters
}

fn build_query(
    params: &CostQueryParams,
    raw_params: &HashMap<String, String>,
) -> Result<CostQuery, AppError> {
    Ok(CostQuery {
        timeframe: params.timeframe.clone(),
        granularity: params.granularity.clone(),
        from_date: parse_date_param("from_date", params.from_date.as_deref())?,
        to_date: parse_date_param("to_date", params.to_date.as_deref())?,
        tag_filters: tag_filters_from_params(raw_params),
    })
}

fn subscription_details(
    subscription_id: &str,
    query: &CostQuery,
    costs: service::SubscriptionCosts,
) -> SubscriptionCostDetails {
    SubscriptionCostDetails {
        subscription_id: subscription_id.into(),
        subscription_name: Some(subscription_id.into()),
        total_cost: costs.total,
        currency: costs.currency,
        costs_by_resource_group: costs.by_resource_group,
        timeframe_used: query.timeframe.clone(),
        from_date_used: Some(costs.time_period.from_date()),
        to_date_used: Some(costs.time_period.to_date()),
        granularity_used: query.granularity.clone(),
        projected_cost_current_month: costs.projected_cost_current_month,
        yearly_monthly_breakdown: costs.monthly_breakdown,
        yearly_daily_breakdown: costs.yearly_daily_entries,
        detailed_entries: costs.entries,
    }
}

/// GET /subscriptions/:id/costs: overall spending for one subscription,
/// including the resource-group breakdown, yearly series, and projection.
pub async fn get_subscription_costs(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Query(params): Query<CostQueryParams>,
    Query(raw_params): Query<HashMap<String, String>>,
    BearerToken(token): BearerToken,
) -> Result<Json<SubscriptionCostDetails>, AppError> {
    let query = build_query(&params, &raw_params)?;
    let client = state.azure_client(token);
    let costs = service::query_subscription_costs(&client, &subscription_id, &query).await?;
    Ok(Json(subscription_details(&subscription_id, &query, costs)))
}

/// GET /subscriptions/:id/resourcegroups/:rg/costs: spending for a single
/// resource group.
pub async fn get_resource_group_costs(
    State(state): State<AppState>,
    Path((subscription_id, resource_group_name)): Path<(String, String)>,
    Query(params): Query<CostQueryParams>,
    Query(raw_params): Query<HashMap<String, String>>,
    BearerToken(token): BearerToken,
) -> Result<Json<ResourceGroupCostDetails>, AppError> {
    let query = build_query(&params, &raw_params)?;
    tracing::info!(
        subscription_id,
        resource_group_name,
        timeframe = %query.timeframe,
        "Fetching resource group costs"
    );
    let client = state.azure_client(token);
    let costs =
        service::query_resource_group_costs(&client, &subscription_id, &resource_group_name, &query)
            .await?;

    let costs_by_month = costs.by_month.map(|by_month| {
        by_month
            .into_iter()
            .map(|((year, month), cost)| (format!("{year:04}-{month:02}"), cost))
            .collect::<BTreeMap<String, f64>>()
    });

    Ok(Json(ResourceGroupCostDetails {
        subscription_id,
        resource_group_name,
        total_cost: costs.total,
        currency: costs.currency,
        timeframe_used: query.timeframe,
        from_date_used: Some(costs.time_period.from_date()),
        to_date_used: Some(costs.time_period.to_date()),
        granularity_used: query.granularity,
        costs_by_month,
        detailed_entries: costs.entries,
    }))
}

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_SECS: f64 = 1.0;

/// Exponential backoff with jitter for rate-limited batch items.
fn backoff_delay(attempt: u32) -> f64 {
    let jitter = rand::thread_rng().gen_range(0.0..0.1 * BASE_DELAY_SECS);
    BASE_DELAY_SECS * f64::from(2u32.pow(attempt.saturating_sub(1))) + jitter
}

/// POST /subscriptions/batch-costs: costs for several subscriptions in one
/// call. Rate-limited items retry with backoff; any item that ultimately
/// fails degrades to a zero-valued summary so its siblings still return
/// real data, in the original input order.
pub async fn get_batch_subscription_costs(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Json(request): Json<BatchCostRequest>,
) -> Result<Json<Vec<SubscriptionCostDetails>>, AppError> {
    let query = CostQuery {
        timeframe: request.timeframe.clone(),
        granularity: request.granularity.clone(),
        from_date: parse_date_param("from_date", request.from_date.as_deref())?,
        to_date: parse_date_param("to_date", request.to_date.as_deref())?,
        tag_filters: Vec::new(),
    };
    let client = state.azure_client(token);

    let mut results = Vec::with_capacity(request.subscription_ids.len());
    for subscription_id in &request.subscription_ids {
        let mut attempt = 0;
        let details = loop {
            attempt += 1;
            match service::query_subscription_costs(&client, subscription_id, &query).await {
                Ok(costs) => break subscription_details(subscription_id, &query, costs),
                Err(e) if e.is_rate_limited() && attempt < MAX_ATTEMPTS => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        subscription_id,
                        attempt,
                        retry_after = ?e.retry_after(),
                        "Rate limited, retrying after {delay:.2}s"
                    );
                    tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
                }
                Err(e) => {
                    tracing::warn!(subscription_id, "Failed to fetch cost data: {e}");
                    break SubscriptionCostDetails::empty(
                        subscription_id,
                        &request.timeframe,
                        &request.granularity,
                    );
                }
            }
        };
        results.push(details);
    }

    Ok(Json(results))
}
