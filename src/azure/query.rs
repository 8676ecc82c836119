//! Wire format of the Cost Management query and forecast APIs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cost::period::TimePeriod;
use crate::models::{TagFilter, TagOperator};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDefinition {
    #[serde(rename = "type")]
    pub export_type: String,
    pub timeframe: String,
    pub time_period: TimePeriod,
    pub dataset: QueryDataset,
}

impl QueryDefinition {
    /// An ActualCost query over an explicit period; we always pass explicit
    /// dates, so the timeframe is Custom.
    pub fn actual_cost(time_period: TimePeriod, dataset: QueryDataset) -> Self {
        Self {
            export_type: "ActualCost".into(),
            timeframe: "Custom".into(),
            time_period,
            dataset,
        }
    }
}

/// Same shape as [`QueryDefinition`] plus the flag that makes the forecast
/// API return realized rows alongside predicted ones, distinguished by the
/// per-row `IsActualCost` column.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastDefinition {
    #[serde(rename = "type")]
    pub export_type: String,
    pub timeframe: String,
    pub time_period: TimePeriod,
    pub include_actual_cost: bool,
    pub dataset: QueryDataset,
}

impl ForecastDefinition {
    pub fn actual_and_forecast(time_period: TimePeriod, dataset: QueryDataset) -> Self {
        Self {
            export_type: "ActualCost".into(),
            timeframe: "Custom".into(),
            time_period,
            include_actual_cost: true,
            dataset,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDataset {
    /// None means a single total; the API rejects the literal string "None".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
    pub aggregation: HashMap<String, QueryAggregation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouping: Option<Vec<QueryGrouping>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<QueryFilter>,
}

impl QueryDataset {
    pub fn total_cost_sum(
        granularity: Option<String>,
        grouping: Option<Vec<QueryGrouping>>,
        filter: Option<QueryFilter>,
    ) -> Self {
        let mut aggregation = HashMap::new();
        aggregation.insert(
            "totalCost".into(),
            QueryAggregation {
                name: "Cost".into(),
                function: "Sum".into(),
            },
        );
        Self {
            granularity,
            aggregation,
            grouping,
            filter,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryAggregation {
    pub name: String,
    pub function: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryGrouping {
    #[serde(rename = "type")]
    pub dimension_type: String,
    pub name: String,
}

impl QueryGrouping {
    pub fn dimension(name: &str) -> Self {
        Self {
            dimension_type: "Dimension".into(),
            name: name.into(),
        }
    }
}

/// Node of the query filter tree. Only tag comparisons and the `and`
/// combinator are used here.
#[derive(Debug, Clone, Serialize)]
pub struct QueryFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<QueryFilter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<QueryComparisonExpression>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryComparisonExpression {
    pub name: String,
    pub operator: String,
    pub values: Vec<String>,
}

impl QueryFilter {
    pub fn tag(filter: &TagFilter) -> Self {
        let operator = match filter.operator {
            TagOperator::In => "In",
            TagOperator::NotIn => "NotIn",
        };
        Self {
            and: None,
            tags: Some(QueryComparisonExpression {
                name: filter.name.clone(),
                operator: operator.into(),
                values: filter.values.clone(),
            }),
        }
    }

    /// Conjunction of per-tag predicates: a single filter is passed
    /// unwrapped, several are wrapped in an `and` node.
    pub fn from_tag_filters(filters: &[TagFilter]) -> Option<Self> {
        match filters {
            [] => None,
            [single] => Some(Self::tag(single)),
            many => Some(Self {
                and: Some(many.iter().map(Self::tag).collect()),
                tags: None,
            }),
        }
    }
}

/// Columnar result of a query or forecast call: named columns, positional
/// row values.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<QueryColumn>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryColumn {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: Option<String>,
}
