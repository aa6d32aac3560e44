//! Credential and token refresh error types.

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Invalid client configuration.
    #[error("Invalid auth configuration: {0}")]
    InvalidConfig(String),

    /// Token refresh was rejected by the token endpoint.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// No refresh token available.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The access token is not a decodable JWT.
    #[error("Malformed access token: {0}")]
    MalformedToken(String),

    /// The access token carries no expiry claim.
    #[error("Failed to get an expiry time from the current access token")]
    MissingExpiry,

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("URL parsing failed: {0}")]
    UrlError(#[from] url::ParseError),
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_display() {
        let e = AuthError::InvalidConfig("missing uaa_url".into());
        assert_eq!(e.to_string(), "Invalid auth configuration: missing uaa_url");
    }

    #[test]
    fn refresh_failed_display() {
        let e = AuthError::RefreshFailed("401 invalid_token".into());
        assert_eq!(e.to_string(), "Token refresh failed: 401 invalid_token");
    }

    #[test]
    fn missing_expiry_display() {
        assert_eq!(
            AuthError::MissingExpiry.to_string(),
            "Failed to get an expiry time from the current access token"
        );
    }

    #[test]
    fn malformed_token_display() {
        let e = AuthError::MalformedToken("expected three segments".into());
        assert_eq!(
            e.to_string(),
            "Malformed access token: expected three segments"
        );
    }

    #[test]
    fn json_error_from() {
        let json_err: Result<serde_json::Value, _> = serde_json::from_str("bad");
        let e: AuthError = json_err.unwrap_err().into();
        assert!(matches!(e, AuthError::JsonError(_)));
    }

    #[test]
    fn url_error_from() {
        let url_err = url::Url::parse("://bad").unwrap_err();
        let e: AuthError = url_err.into();
        assert!(matches!(e, AuthError::UrlError(_)));
    }
}
