//! Token refresh against an OAuth token endpoint.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use crate::{AuthError, AuthResult, TokenResponse};

/// Default OAuth client used by platform CLIs.
pub const DEFAULT_CLIENT_ID: &str = "cf";

/// Something that can exchange a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange `refresh_token` for a fresh token response.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse>;
}

/// Refresher talking to a UAA-style `/oauth/token` endpoint.
#[derive(Debug, Clone)]
pub struct UaaRefresher {
    token_url: Url,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl UaaRefresher {
    /// Create a refresher for the authorization server at `uaa_url`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(uaa_url: &str) -> AuthResult<Self> {
        let mut base = Url::parse(uaa_url)?;
        if base.cannot_be_a_base() {
            return Err(AuthError::InvalidConfig(format!(
                "uaa_url '{uaa_url}' cannot be used as a base URL"
            )));
        }
        // `Url::join` replaces the last path segment unless the base ends in `/`.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let token_url = base.join("oauth/token")?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            token_url,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: String::new(),
            http,
        })
    }

    /// Override the OAuth client credentials.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self.client_secret = secret.into();
        self
    }

    /// The resolved token endpoint.
    #[must_use]
    pub const fn token_url(&self) -> &Url {
        &self.token_url
    }
}

#[async_trait]
impl TokenRefresher for UaaRefresher {
    #[instrument(skip_all, fields(token_url = %self.token_url))]
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        let response = self
            .http
            .post(self.token_url.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("token_format", "jwt"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed(format!(
                "{} {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let body = response.text().await?;
        let token: TokenResponse = serde_json::from_str(&body)?;
        debug!(expires_in = ?token.expires_in, "access token refreshed");
        Ok(token)
    }
}
