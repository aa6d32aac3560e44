//! Client configuration: a TOML file overlaid with environment variables.

use std::path::Path;

use anyhow::{Context, Result, bail};
use lc_auth::DEFAULT_CLIENT_ID;
use lc_tail::TailConfig;
use serde::Deserialize;

/// Everything `lc` needs to talk to log cache.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Base URL of the log cache API.
    pub log_cache_url: Option<String>,

    /// Base URL of the authorization server; needed to refresh tokens.
    pub uaa_url: Option<String>,

    /// OAuth client id, `cf` when unset.
    pub client_id: Option<String>,

    /// OAuth client secret, empty when unset.
    pub client_secret: Option<String>,

    /// Access token, with or without a `bearer ` prefix.
    pub access_token: Option<String>,

    /// Refresh token; enables background renewal of the access token.
    pub refresh_token: Option<String>,

    /// Session timing.
    #[serde(default)]
    pub tail: TailConfig,
}

impl CliConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    /// Returns an error if the document is not valid configuration.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Read `path` if given, then apply environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Self::from_toml(&text).with_context(|| format!("in {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from `lookup`, which maps a variable name to its value.
    ///
    /// Unset and empty variables leave the field alone.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str, slot: &mut Option<String>| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        };
        set("LC_ACCESS_TOKEN", &mut self.access_token);
        set("LC_REFRESH_TOKEN", &mut self.refresh_token);
        set("LC_LOG_CACHE_URL", &mut self.log_cache_url);
        set("LC_UAA_URL", &mut self.uaa_url);
    }

    /// Check that a session can be started.
    ///
    /// # Errors
    /// Returns an error naming the first missing or inconsistent setting.
    pub fn validate(&self) -> Result<()> {
        if self.log_cache_url.is_none() {
            bail!("log_cache_url is not set (config file or LC_LOG_CACHE_URL)");
        }
        if self.access_token.is_none() && self.refresh_token.is_none() {
            bail!("no credential: set access_token or refresh_token");
        }
        if self.refresh_token.is_some() && self.uaa_url.is_none() {
            bail!("refresh_token needs uaa_url (config file or LC_UAA_URL)");
        }
        self.tail.validate()?;
        Ok(())
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or(DEFAULT_CLIENT_ID)
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        self.client_secret.as_deref().unwrap_or_default()
    }
}
