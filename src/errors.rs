use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Typed failures of the cost engine and its Azure collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CostError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("essential cost/currency columns missing in query result; found: {found:?}")]
    MissingColumns { found: Vec<String> },

    #[error("Azure API error (status {status}): {message}")]
    Remote {
        status: u16,
        message: String,
        /// Seconds to wait before retrying, from the rate-limit header on 429.
        retry_after: Option<u64>,
    },

    #[error("request to Azure failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl CostError {
    /// True when the remote signalled a rate limit (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CostError::Remote { status: 429, .. })
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            CostError::Remote { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: ApiError,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ApiError {
                code: "BAD_REQUEST".into(),
                message: msg.into(),
                details: None,
            },
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ApiError {
                code: "UNAUTHORIZED".into(),
                message: msg.into(),
                details: None,
            },
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ApiError {
                code: "NOT_FOUND".into(),
                message: msg.into(),
                details: None,
            },
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ApiError {
                code: "INTERNAL_ERROR".into(),
                message: msg.into(),
                details: None,
            },
        }
    }

    pub fn upstream(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiError {
                code: "AZURE_API_ERROR".into(),
                message: msg.into(),
                details: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<CostError> for AppError {
    fn from(err: CostError) -> Self {
        match err {
            CostError::InvalidInput(msg) => Self::bad_request(msg),
            CostError::MissingColumns { ref found } => {
                tracing::error!("Unparseable query result, columns: {found:?}");
                Self::upstream(StatusCode::BAD_GATEWAY, err.to_string())
            }
            CostError::Remote {
                status,
                message,
                retry_after,
            } => {
                let status =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let message = match retry_after {
                    Some(secs) => format!("Azure API Error: {message}. Retry-After: {secs}"),
                    None => format!("Azure API Error: {message}"),
                };
                Self::upstream(status, message)
            }
            CostError::Transport(e) => {
                tracing::error!("Azure transport error: {e}");
                Self::upstream(StatusCode::BAD_GATEWAY, "Azure API unreachable")
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", err);
        Self::internal(err.to_string())
    }
}
