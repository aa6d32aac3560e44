//! Access credentials and their shared, atomically replaced store.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::claims::{expiry_of, strip_bearer};
use crate::{AuthError, AuthResult};

/// Token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// Token type (usually "bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,

    /// Refresh token (if rotated).
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Granted scopes (space-separated).
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// An access token plus what is needed to renew it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    token_type: String,
    refresh_token: Option<String>,
}

impl Credential {
    /// Create a credential from a raw access token.
    ///
    /// A `bearer ` prefix on the token (as stored by some CLIs) is removed.
    #[must_use]
    pub fn new(access_token: impl AsRef<str>) -> Self {
        Self {
            access_token: strip_bearer(access_token.as_ref()).to_string(),
            token_type: default_token_type(),
            refresh_token: None,
        }
    }

    /// Attach a refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Build the credential that replaces `self` after a refresh.
    ///
    /// The previous refresh token is kept when the endpoint does not rotate it.
    #[must_use]
    pub fn renewed(&self, response: TokenResponse) -> Self {
        Self {
            access_token: strip_bearer(&response.access_token).to_string(),
            token_type: response.token_type,
            refresh_token: response
                .refresh_token
                .or_else(|| self.refresh_token.clone()),
        }
    }

    /// Get the access token (without scheme).
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Get the token type.
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Get the refresh token if available.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Get the authorization header value.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Decode the expiry claim of the access token.
    ///
    /// # Errors
    /// Returns [`AuthError::MissingExpiry`] or [`AuthError::MalformedToken`].
    pub fn expires_at(&self) -> AuthResult<DateTime<Utc>> {
        expiry_of(&self.access_token)
    }

    /// Time left until expiry, `None` once expired.
    ///
    /// # Errors
    /// Propagates expiry decoding errors.
    pub fn time_until_expiry(&self) -> AuthResult<Option<Duration>> {
        let expiry = self.expires_at()?;
        let now = Utc::now();
        Ok(if expiry > now {
            (expiry - now).to_std().ok()
        } else {
            None
        })
    }
}

/// Shared credential slot: one writer, any number of readers.
///
/// Readers always observe the most recently published credential; a publish is
/// a single pointer swap.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    current: Arc<ArcSwap<Credential>>,
}

impl CredentialStore {
    /// Create a store holding an initial credential.
    #[must_use]
    pub fn new(initial: Credential) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Snapshot the current credential.
    #[must_use]
    pub fn load(&self) -> Arc<Credential> {
        self.current.load_full()
    }

    /// Authorization header value for the current credential.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        self.current.load().authorization_header()
    }

    /// Replace the current credential.
    pub fn publish(&self, credential: Credential) {
        self.current.store(Arc::new(credential));
    }

    /// Refresh token of the current credential.
    ///
    /// # Errors
    /// Returns [`AuthError::NoRefreshToken`] if none is held.
    pub fn refresh_token(&self) -> AuthResult<String> {
        self.current
            .load()
            .refresh_token()
            .map(str::to_string)
            .ok_or(AuthError::NoRefreshToken)
    }
}
