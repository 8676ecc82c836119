use serde::Deserialize;

use crate::azure::credential::BearerTokenCredential;
use crate::azure::query::{ForecastDefinition, QueryDefinition, QueryResult};
use crate::errors::CostError;
use crate::models::{AzureSubscription, TagDetails};

const COST_MANAGEMENT_API_VERSION: &str = "2022-10-01";
const SUBSCRIPTIONS_API_VERSION: &str = "2021-01-01";
const TAGS_API_VERSION: &str = "2021-04-01";

/// Header carrying the retry hint on Cost Management rate-limit responses.
const RATE_LIMIT_RETRY_AFTER: &str = "x-ms-ratelimit-microsoft.costmanagement-entity-retry-after";

/// Thin client over the Azure Resource Manager REST surface used by the
/// cost endpoints. Request-scoped: holds the caller's credential and a
/// shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct AzureClient {
    http: reqwest::Client,
    endpoint: String,
    credential: BearerTokenCredential,
}

#[derive(Debug, Deserialize)]
struct QueryEnvelope {
    properties: QueryResult,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionWire {
    id: String,
    subscription_id: String,
    display_name: String,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagNameWire {
    tag_name: String,
    #[serde(default)]
    values: Vec<TagValueWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagValueWire {
    tag_value: Option<String>,
}

impl AzureClient {
    pub fn new(http: reqwest::Client, endpoint: &str, credential: BearerTokenCredential) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credential,
        }
    }

    /// Run an ActualCost usage query for the given scope.
    pub async fn query_usage(
        &self,
        scope: &str,
        definition: &QueryDefinition,
    ) -> Result<QueryResult, CostError> {
        let url = format!(
            "{}{}/providers/Microsoft.CostManagement/query?api-version={}",
            self.endpoint, scope, COST_MANAGEMENT_API_VERSION
        );
        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.credential.token())
            .json(definition)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let envelope: QueryEnvelope = resp.json().await?;
        Ok(envelope.properties)
    }

    /// Run a forecast query (actuals + predictions when
    /// `includeActualCost` is set) for the given scope.
    pub async fn query_forecast(
        &self,
        scope: &str,
        definition: &ForecastDefinition,
    ) -> Result<QueryResult, CostError> {
        let url = format!(
            "{}{}/providers/Microsoft.CostManagement/forecast?api-version={}",
            self.endpoint, scope, COST_MANAGEMENT_API_VERSION
        );
        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.credential.token())
            .json(definition)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let envelope: QueryEnvelope = resp.json().await?;
        Ok(envelope.properties)
    }

    /// List subscriptions visible to the caller's token.
    pub async fn list_subscriptions(&self) -> Result<Vec<AzureSubscription>, CostError> {
        let url = format!(
            "{}/subscriptions?api-version={}",
            self.endpoint, SUBSCRIPTIONS_API_VERSION
        );
        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.credential.token())
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let envelope: ListEnvelope<SubscriptionWire> = resp.json().await?;
        Ok(envelope
            .value
            .into_iter()
            .map(|s| AzureSubscription {
                id: s.id,
                subscription_id: s.subscription_id,
                display_name: s.display_name,
                state: s.state,
            })
            .collect())
    }

    /// List tag names and their distinct values for a subscription.
    pub async fn list_tag_names(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<TagDetails>, CostError> {
        let url = format!(
            "{}/subscriptions/{}/tagNames?api-version={}",
            self.endpoint, subscription_id, TAGS_API_VERSION
        );
        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.credential.token())
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let envelope: ListEnvelope<TagNameWire> = resp.json().await?;
        Ok(envelope
            .value
            .into_iter()
            .map(|t| TagDetails {
                tag_name: t.tag_name,
                values: t.values.into_iter().map(|v| v.tag_value).collect(),
            })
            .collect())
    }
}

/// Map non-success responses to `CostError::Remote`, extracting the Azure
/// error message and, on 429, the rate-limit retry hint.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, CostError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let retry_after = if status.as_u16() == 429 {
        resp.headers()
            .get(RATE_LIMIT_RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
    } else {
        None
    };

    let body = resp.text().await.unwrap_or_default();
    let message = extract_error_message(&body).unwrap_or(body);

    Err(CostError::Remote {
        status: status.as_u16(),
        message,
        retry_after,
    })
}

/// Azure error bodies look like `{"error": {"code": ..., "message": ...}}`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(String::from)
}
