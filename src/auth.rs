use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;

/// The caller's Azure AD bearer token, extracted from the Authorization
/// header. Token acquisition lives in the frontend (MSAL); this service
/// only passes the token through to the management plane.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        match header.strip_prefix("Bearer ") {
            Some(token) if !token.is_empty() => Ok(BearerToken(token.to_string())),
            _ => Err(AppError::unauthorized("Missing bearer token")),
        }
    }
}
