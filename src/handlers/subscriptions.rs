use axum::{extract::State, Json};

use crate::auth::BearerToken;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::AzureSubscription;

/// GET /subscriptions: subscriptions visible to the caller's token.
/// An empty list is a valid answer, not an error.
pub async fn list_subscriptions(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<Vec<AzureSubscription>>, AppError> {
    let client = state.azure_client(token);
    let subscriptions = client.list_subscriptions().await?;
    if subscriptions.is_empty() {
        tracing::info!("No subscriptions found or accessible for this token");
    }
    Ok(Json(subscriptions))
}
