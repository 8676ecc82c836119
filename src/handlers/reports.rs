use std::collections::HashMap;
use std::path::Path as FsPath;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::Response,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::BearerToken;
use crate::cost::service::{self, CostQuery};
use crate::errors::AppError;
use crate::handlers::costs::{parse_date_param, tag_filters_from_params};
use crate::handlers::AppState;
use crate::models::cost::{default_granularity, default_timeframe};
use crate::models::{CostEntry, ReportCreationResponse};

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    #[serde(default = "default_granularity")]
    pub granularity: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportFormatParams {
    pub file_format: Option<String>,
}

/// POST /subscriptions/:id/costs/generate-report: fetch the cost entries
/// for the requested window and write them to a CSV file, returning a
/// download link. Tag filters arrive as query parameters like on the GET
/// endpoints.
pub async fn generate_report(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Query(format_params): Query<ReportFormatParams>,
    Query(raw_params): Query<HashMap<String, String>>,
    BearerToken(token): BearerToken,
    Json(request): Json<ReportRequest>,
) -> Result<Json<ReportCreationResponse>, AppError> {
    let file_format = format_params.file_format.as_deref().unwrap_or("csv");
    if !file_format.eq_ignore_ascii_case("csv") {
        return Err(AppError::bad_request(format!(
            "Unsupported file format '{file_format}'. Only 'csv' is available."
        )));
    }

    let query = CostQuery {
        timeframe: request.timeframe.clone(),
        granularity: request.granularity.clone(),
        from_date: parse_date_param("from_date", request.from_date.as_deref())?,
        to_date: parse_date_param("to_date", request.to_date.as_deref())?,
        tag_filters: tag_filters_from_params(&raw_params),
    };

    tracing::info!(
        subscription_id,
        timeframe = %request.timeframe,
        granularity = %request.granularity,
        "Generating cost report"
    );
    let client = state.azure_client(token);
    let costs = service::query_subscription_costs(&client, &subscription_id, &query).await?;
    if costs.entries.is_empty() {
        return Err(AppError::not_found(
            "No cost data found for the selected criteria to generate a report.",
        ));
    }

    let file_name = report_file_name(
        &subscription_id,
        &request.timeframe,
        &request.granularity,
        &Utc::now().format("%Y%m%d%H%M%S").to_string(),
    );
    let dir = &state.config.reports.dir;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::internal(format!("Failed to create reports directory: {e}")))?;
    let path = FsPath::new(dir).join(&file_name);
    tokio::fs::write(&path, entries_to_csv(&costs.entries))
        .await
        .map_err(|e| AppError::internal(format!("Failed to generate report file: {e}")))?;

    tracing::info!(file = %path.display(), "Created cost report");
    Ok(Json(ReportCreationResponse {
        message: "CSV report generated successfully.".into(),
        download_url: Some(format!("/api/v1/cost/download-report/{file_name}")),
        file_name: Some(file_name),
    }))
}

/// GET /download-report/:file_name serves a previously generated report.
pub async fn download_report(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response, AppError> {
    if !is_safe_file_name(&file_name) {
        return Err(AppError::bad_request("Invalid file name."));
    }

    let path = FsPath::new(&state.config.reports.dir).join(&file_name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| AppError::not_found("Report file not found or has been cleaned up."))?;

    let media_type = if file_name.to_lowercase().ends_with(".csv") {
        "text/csv"
    } else {
        "application/octet-stream"
    };

    Response::builder()
        .header(header::CONTENT_TYPE, media_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={file_name}"),
        )
        .body(Body::from(bytes))
        .map_err(|e| AppError::internal(format!("Failed to build response: {e}")))
}

/// Reject anything that could escape the reports directory.
fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains("..") && !name.contains('/') && !name.contains('\\')
}

fn report_file_name(
    subscription_id: &str,
    timeframe: &str,
    granularity: &str,
    timestamp: &str,
) -> String {
    let safe_sub = subscription_id.replace('-', "");
    let safe_timeframe = timeframe.replace(' ', "_").to_lowercase();
    let safe_granularity = granularity.replace(' ', "_").to_lowercase();
    format!("cost_report_{safe_sub}_{safe_timeframe}_{safe_granularity}_{timestamp}.csv")
}

fn entries_to_csv(entries: &[CostEntry]) -> String {
    let mut csv = String::from("date,amount,currency,resourceGroupName,resourceId,entry_type\n");
    for e in entries {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            e.date.as_deref().unwrap_or(""),
            e.amount,
            e.currency,
            e.resource_group_name.as_deref().unwrap_or(""),
            e.resource_id.as_deref().unwrap_or(""),
            e.entry_type,
        ));
    }
    csv
}
