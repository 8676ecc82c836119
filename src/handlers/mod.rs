pub mod costs;
pub mod health;
pub mod reports;
pub mod subscriptions;
pub mod tags;

use std::sync::Arc;

use crate::azure::{AzureClient, BearerTokenCredential};
use crate::config::AppConfig;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub http: reqwest::Client,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// A request-scoped Azure client wrapping the caller's token.
    pub fn azure_client(&self, token: String) -> AzureClient {
        AzureClient::new(
            self.http.clone(),
            &self.config.azure.resource_manager_endpoint,
            BearerTokenCredential::new(token, None),
        )
    }
}
