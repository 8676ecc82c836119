use serde::{Deserialize, Serialize};

/// One subscription visible to the caller's credentials, as returned by the
/// ARM subscriptions listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureSubscription {
    pub id: String,
    pub subscription_id: String,
    pub display_name: String,
    pub state: Option<String>,
}
