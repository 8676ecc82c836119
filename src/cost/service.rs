//! Orchestrates the remote queries and the parsing/derivation pipeline
//! into unified cost summaries.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Utc};

use crate::azure::query::{
    ForecastDefinition, QueryDataset, QueryDefinition, QueryFilter, QueryGrouping,
};
use crate::azure::AzureClient;
use crate::cost::breakdown::derive_monthly_breakdown;
use crate::cost::parser::{self, Granularity, ParseOptions};
use crate::cost::period::{self, TimePeriod};
use crate::errors::CostError;
use crate::models::{CostEntry, EntryKind, MonthlyBreakdownItem, TagFilter};

/// Validated query parameters handed down by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct CostQuery {
    pub timeframe: String,
    pub granularity: String,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub tag_filters: Vec<TagFilter>,
}

/// Full cost picture for one subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionCosts {
    pub total: f64,
    pub currency: String,
    pub by_resource_group: HashMap<String, f64>,
    pub entries: Vec<CostEntry>,
    pub time_period: TimePeriod,
    pub projected_cost_current_month: Option<f64>,
    pub monthly_breakdown: Vec<MonthlyBreakdownItem>,
    pub yearly_daily_entries: Vec<CostEntry>,
}

/// Cost picture for a single resource group; no yearly/forecast context at
/// this scope.
#[derive(Debug, Clone)]
pub struct ResourceGroupCosts {
    pub total: f64,
    pub currency: String,
    pub entries: Vec<CostEntry>,
    pub time_period: TimePeriod,
    /// Month-keyed totals, only for Monthly granularity with dated rows.
    pub by_month: Option<BTreeMap<(i32, u32), f64>>,
}

/// Resolve the period, run the grouped actual-cost query plus the
/// full-year daily actual+forecast query, and assemble the summary.
///
/// The yearly query failing is a soft degradation: the summary is still
/// returned, with no projection and an empty monthly breakdown.
pub async fn query_subscription_costs(
    client: &AzureClient,
    subscription_id: &str,
    query: &CostQuery,
) -> Result<SubscriptionCosts, CostError> {
    let scope = format!("/subscriptions/{subscription_id}");
    let time_period = period::resolve(&query.timeframe, query.from_date, query.to_date)?;
    let granularity = Granularity::parse(&query.granularity);
    let filter = QueryFilter::from_tag_filters(&query.tag_filters);
    let today = Utc::now().date_naive();

    let grouping = vec![
        QueryGrouping::dimension("ResourceGroupName"),
        QueryGrouping::dimension("ResourceId"),
    ];
    let definition = QueryDefinition::actual_cost(
        time_period,
        QueryDataset::total_cost_sum(
            granularity.as_query_value(),
            Some(grouping),
            filter.clone(),
        ),
    );

    tracing::info!(
        scope,
        timeframe = %query.timeframe,
        granularity = %query.granularity,
        from = %time_period.from_date(),
        to = %time_period.to_date(),
        "Querying subscription costs"
    );
    let result = client.query_usage(&scope, &definition).await?;
    let table = parser::parse_detail(
        &result,
        ParseOptions {
            group_by_resource_group: true,
            granularity,
            default_kind: EntryKind::Actual,
        },
    )?;

    // Always the calendar year containing today, independent of the user's
    // chosen timeframe; the monthly breakdown and the current-month
    // projection are derived from it.
    let yearly_daily_entries = fetch_yearly_daily_series(client, &scope, filter, today).await;
    let (monthly_breakdown, projected_cost_current_month) =
        derive_monthly_breakdown(&yearly_daily_entries, today);

    Ok(SubscriptionCosts {
        total: table.total,
        currency: table.currency,
        by_resource_group: table.by_resource_group,
        entries: table.entries,
        time_period,
        projected_cost_current_month,
        monthly_breakdown,
        yearly_daily_entries,
    })
}

/// Run the combined actual+forecast daily query over the current year.
/// Failures degrade to an empty series rather than failing the summary.
async fn fetch_yearly_daily_series(
    client: &AzureClient,
    scope: &str,
    filter: Option<QueryFilter>,
    today: NaiveDate,
) -> Vec<CostEntry> {
    let definition = ForecastDefinition::actual_and_forecast(
        period::current_year_window(today),
        QueryDataset::total_cost_sum(Some("Daily".into()), None, filter),
    );

    let result = match client.query_forecast(scope, &definition).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(scope, "Could not fetch yearly daily actual/forecast data: {e}");
            return Vec::new();
        }
    };

    match parser::parse_detail(
        &result,
        ParseOptions {
            group_by_resource_group: false,
            granularity: Granularity::Daily,
            default_kind: EntryKind::Actual,
        },
    ) {
        Ok(table) => table.entries,
        Err(e) => {
            tracing::warn!(scope, "Could not parse yearly daily data: {e}");
            Vec::new()
        }
    }
}

/// Query costs for a single resource group. Skips the yearly/forecast
/// queries entirely; at this scope only the period's own rows matter.
pub async fn query_resource_group_costs(
    client: &AzureClient,
    subscription_id: &str,
    resource_group_name: &str,
    query: &CostQuery,
) -> Result<ResourceGroupCosts, CostError> {
    let scope = format!("/subscriptions/{subscription_id}/resourceGroups/{resource_group_name}");
    let time_period = period::resolve(&query.timeframe, query.from_date, query.to_date)?;
    let granularity = Granularity::parse(&query.granularity);
    let filter = QueryFilter::from_tag_filters(&query.tag_filters);

    let definition = QueryDefinition::actual_cost(
        time_period,
        QueryDataset::total_cost_sum(
            granularity.as_query_value(),
            Some(vec![QueryGrouping::dimension("ResourceId")]),
            filter,
        ),
    );

    tracing::info!(
        scope,
        timeframe = %query.timeframe,
        granularity = %query.granularity,
        "Querying resource group costs"
    );
    let result = client.query_usage(&scope, &definition).await?;
    let table = parser::parse_detail(
        &result,
        ParseOptions {
            group_by_resource_group: false,
            granularity,
            default_kind: EntryKind::Actual,
        },
    )?;

    let by_month = if granularity == Granularity::Monthly {
        let monthly = parser::parse_monthly_aggregate(&result)?;
        (!monthly.by_month.is_empty()).then_some(monthly.by_month)
    } else {
        None
    };

    Ok(ResourceGroupCosts {
        total: table.total,
        currency: table.currency,
        entries: table.entries,
        time_period,
        by_month,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::BearerTokenCredential;
    use crate::models::TagOperator;
    use chrono::Datelike;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AzureClient {
        AzureClient::new(
            reqwest::Client::new(),
            &server.uri(),
            BearerTokenCredential::new("test-token", None),
        )
    }

    fn query(timeframe: &str, granularity: &str) -> CostQuery {
        CostQuery {
            timeframe: timeframe.into(),
            granularity: granularity.into(),
            ..Default::default()
        }
    }

    fn columnar(columns: &[&str], rows: serde_json::Value) -> serde_json::Value {
        json!({
            "properties": {
                "columns": columns.iter().map(|n| json!({"name": n, "type": "String"})).collect::<Vec<_>>(),
                "rows": rows,
            }
        })
    }

    #[tokio::test]
    async fn test_subscription_costs_full_flow() {
        let server = MockServer::start().await;
        let year = Utc::now().year();

        Mock::given(method("POST"))
            .and(path(
                "/subscriptions/sub-1/providers/Microsoft.CostManagement/query",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(columnar(
                &["Cost", "Currency", "ResourceGroupName", "ResourceId"],
                json!([
                    [10.0, "EUR", "caz-prod", "/subscriptions/sub-1/vm1"],
                    [4.0, "EUR", "other-rg", "/subscriptions/sub-1/vm2"],
                ]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(
                "/subscriptions/sub-1/providers/Microsoft.CostManagement/forecast",
            ))
            .and(body_partial_json(json!({"includeActualCost": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(columnar(
                &["Cost", "Currency", "UsageDate", "IsActualCost"],
                json!([
                    [3.0, "EUR", format!("{year}-01-15"), true],
                    [7.0, "EUR", format!("{year}-12-20"), false],
                ]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let costs = query_subscription_costs(&client_for(&server), "sub-1", &query("MonthToDate", "None"))
            .await
            .unwrap();

        assert_eq!(costs.total, 14.0);
        assert_eq!(costs.currency, "EUR");
        assert_eq!(costs.by_resource_group.len(), 1);
        assert_eq!(costs.by_resource_group["caz-prod"], 10.0);
        assert_eq!(costs.entries.len(), 1);
        assert_eq!(costs.yearly_daily_entries.len(), 2);
        assert_eq!(costs.monthly_breakdown.len(), 12);
        // The current-month projection is always present when daily data
        // came back.
        assert!(costs.projected_cost_current_month.is_some());
    }

    #[tokio::test]
    async fn test_yearly_query_failure_degrades_softly() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(
                "/subscriptions/sub-1/providers/Microsoft.CostManagement/query",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(columnar(
                &["Cost", "Currency", "ResourceGroupName"],
                json!([[5.0, "USD", "caz-app"]]),
            )))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(
                "/subscriptions/sub-1/providers/Microsoft.CostManagement/forecast",
            ))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let costs = query_subscription_costs(&client_for(&server), "sub-1", &query("MonthToDate", "None"))
            .await
            .unwrap();

        assert_eq!(costs.total, 5.0);
        assert!(costs.yearly_daily_entries.is_empty());
        assert!(costs.monthly_breakdown.is_empty());
        assert_eq!(costs.projected_cost_current_month, None);
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_status_and_hint() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(
                "/subscriptions/sub-1/providers/Microsoft.CostManagement/query",
            ))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header(
                        "x-ms-ratelimit-microsoft.costmanagement-entity-retry-after",
                        "30",
                    )
                    .set_body_json(json!({"error": {"code": "429", "message": "Too many requests"}})),
            )
            .mount(&server)
            .await;

        let err = query_subscription_costs(&client_for(&server), "sub-1", &query("MonthToDate", "None"))
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(30));
    }

    #[tokio::test]
    async fn test_invalid_custom_timeframe_fails_before_any_call() {
        let server = MockServer::start().await;
        let err = query_subscription_costs(&client_for(&server), "sub-1", &query("Custom", "None"))
            .await
            .unwrap_err();
        assert!(matches!(err, CostError::InvalidInput(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tag_filters_form_a_conjunction_on_the_wire() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(
                "/subscriptions/sub-1/providers/Microsoft.CostManagement/query",
            ))
            .and(body_partial_json(json!({
                "dataset": {
                    "filter": {
                        "and": [
                            {"tags": {"name": "Environment", "operator": "In", "values": ["Production"]}},
                            {"tags": {"name": "CostCenter", "operator": "NotIn", "values": ["123"]}},
                        ]
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(columnar(
                &["Cost", "Currency"],
                json!([]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(
                "/subscriptions/sub-1/providers/Microsoft.CostManagement/forecast",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(columnar(
                &["Cost", "Currency"],
                json!([]),
            )))
            .mount(&server)
            .await;

        let mut q = query("MonthToDate", "None");
        q.tag_filters = vec![
            TagFilter {
                name: "Environment".into(),
                operator: TagOperator::In,
                values: vec!["Production".into()],
            },
            TagFilter {
                name: "CostCenter".into(),
                operator: TagOperator::NotIn,
                values: vec!["123".into()],
            },
        ];
        let costs = query_subscription_costs(&client_for(&server), "sub-1", &q)
            .await
            .unwrap();
        assert_eq!(costs.total, 0.0);
        assert_eq!(costs.currency, "USD");
    }

    #[tokio::test]
    async fn test_resource_group_costs_monthly_exposes_month_buckets() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(
                "/subscriptions/sub-1/resourceGroups/caz-app/providers/Microsoft.CostManagement/query",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(columnar(
                &["Cost", "Currency", "BillingMonth"],
                json!([
                    [12.0, "USD", "2025-01-01T00:00:00"],
                    [8.0, "USD", "2025-02-01T00:00:00"],
                ]),
            )))
            .mount(&server)
            .await;

        let costs = query_resource_group_costs(
            &client_for(&server),
            "sub-1",
            "caz-app",
            &query("Custom", "Monthly"),
        )
        .await;
        // Custom without dates fails; use a preset instead.
        assert!(costs.is_err());

        let costs = query_resource_group_costs(
            &client_for(&server),
            "sub-1",
            "caz-app",
            &query("YearToDate", "Monthly"),
        )
        .await
        .unwrap();

        assert_eq!(costs.total, 20.0);
        assert_eq!(costs.entries.len(), 2);
        let by_month = costs.by_month.unwrap();
        assert_eq!(by_month[&(2025, 1)], 12.0);
        assert_eq!(by_month[&(2025, 2)], 8.0);
    }
}
