use chrono::{DateTime, Duration, Utc};

/// Wraps a caller-supplied bearer token for the Azure management plane.
///
/// The token is acquired by the frontend (MSAL) and passed through as-is;
/// this type only carries it together with expiry bookkeeping. It never
/// refreshes or validates the token beyond an expiry check.
#[derive(Debug, Clone)]
pub struct BearerTokenCredential {
    token: String,
    expires_on: DateTime<Utc>,
}

impl BearerTokenCredential {
    /// `expires_on` defaults to one hour from now when the caller does not
    /// know the real expiry.
    pub fn new(token: impl Into<String>, expires_on: Option<DateTime<Utc>>) -> Self {
        let expires_on = expires_on.unwrap_or_else(|| {
            tracing::debug!("Token expiry not provided, defaulting to 1 hour");
            Utc::now() + Duration::hours(1)
        });
        Self {
            token: token.into(),
            expires_on,
        }
    }

    pub fn token(&self) -> &str {
        // The service ultimately validates the token; an expired one only
        // gets a warning here.
        if self.is_expired() {
            tracing::warn!("Bearer token appears expired based on its expires_on timestamp");
        }
        &self.token
    }

    pub fn is_expired(&self) -> bool {
        self.expires_on <= Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_expiry_is_in_the_future() {
        let cred = BearerTokenCredential::new("abc", None);
        assert!(!cred.is_expired());
        assert_eq!(cred.token(), "abc");
    }

    #[test]
    fn test_explicit_past_expiry() {
        let cred = BearerTokenCredential::new("abc", Some(Utc::now() - Duration::hours(2)));
        assert!(cred.is_expired());
        // Token is still handed out; the remote makes the final call.
        assert_eq!(cred.token(), "abc");
    }
}
