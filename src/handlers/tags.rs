use axum::{
    extract::{Path, State},
    Json,
};

use crate::auth::BearerToken;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::TagDetails;

/// GET /subscriptions/:id/available-tags: tag names and their distinct
/// values within the subscription, for building filter dropdowns.
pub async fn get_available_tags(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    BearerToken(token): BearerToken,
) -> Result<Json<Vec<TagDetails>>, AppError> {
    tracing::info!(subscription_id, "Fetching available tags");
    let client = state.azure_client(token);
    let tags = client.list_tag_names(&subscription_id).await?;
    tracing::info!(subscription_id, count = tags.len(), "Fetched tag details");
    Ok(Json(tags))
}
