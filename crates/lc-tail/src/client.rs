//! Cursor fetcher: one read against the log cache API.

use std::time::Duration;

use async_trait::async_trait;
use lc_auth::CredentialStore;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tracing::{debug, instrument};
use url::Url;

use crate::{Batch, ReadQuery, TailError, TailResult, parse_batch};

/// A store of envelopes that can be queried by source.
///
/// The tail engine only talks to the store through this trait.
#[async_trait]
pub trait EnvelopeSource: Send + Sync {
    /// Fetch the envelopes of `source_id` matching `query`.
    async fn read(&self, source_id: &str, query: &ReadQuery) -> TailResult<Batch>;
}

/// HTTP client for `GET /api/v1/read/{source_id}`.
#[derive(Debug, Clone)]
pub struct LogCacheClient {
    base: Url,
    credentials: CredentialStore,
    http: reqwest::Client,
}

impl LogCacheClient {
    /// Create a client for the log cache at `log_cache_url`.
    ///
    /// Every request carries the credential current in `credentials` when it
    /// is built.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(
        log_cache_url: &str,
        credentials: CredentialStore,
        timeout: Duration,
    ) -> TailResult<Self> {
        let base = Url::parse(log_cache_url)?;
        if base.cannot_be_a_base() {
            return Err(TailError::InvalidConfig(format!(
                "log_cache_url '{log_cache_url}' cannot be used as a base URL"
            )));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base,
            credentials,
            http,
        })
    }

    /// URL of the read endpoint for `source_id`.
    ///
    /// # Errors
    /// Returns an error if the base URL cannot take path segments.
    pub fn read_url(&self, source_id: &str) -> TailResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TailError::InvalidConfig(format!("cannot extend URL {}", self.base)))?
            .pop_if_empty()
            .extend(["api", "v1", "read", source_id]);
        Ok(url)
    }
}

#[async_trait]
impl EnvelopeSource for LogCacheClient {
    #[instrument(skip(self, query), fields(start_time = query.start_time))]
    async fn read(&self, source_id: &str, query: &ReadQuery) -> TailResult<Batch> {
        let url = self.read_url(source_id)?;
        let response = self
            .http
            .get(url)
            .query(&query.to_pairs())
            .header(AUTHORIZATION, self.credentials.authorization_header())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            return Err(TailError::Transport {
                status,
                message: body.trim().to_string(),
            });
        }

        let body = response.text().await?;
        let batch = parse_batch(&body)?;
        debug!(count = batch.len(), "read envelopes");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use lc_auth::Credential;

    use super::*;

    fn client(url: &str) -> TailResult<LogCacheClient> {
        LogCacheClient::new(
            url,
            CredentialStore::new(Credential::new("token")),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn read_url_appends_under_base_path() {
        let c = client("https://log-cache.example.com").unwrap();
        assert_eq!(
            c.read_url("app-guid").unwrap().as_str(),
            "https://log-cache.example.com/api/v1/read/app-guid"
        );

        let c = client("https://example.com/log-cache/").unwrap();
        assert_eq!(
            c.read_url("app-guid").unwrap().as_str(),
            "https://example.com/log-cache/api/v1/read/app-guid"
        );
    }

    #[test]
    fn source_id_is_a_single_path_segment() {
        let c = client("https://log-cache.example.com").unwrap();
        assert_eq!(
            c.read_url("a/b c").unwrap().as_str(),
            "https://log-cache.example.com/api/v1/read/a%2Fb%20c"
        );
    }

    #[test]
    fn invalid_base_is_rejected() {
        assert!(matches!(client("nope"), Err(TailError::Url(_))));
        assert!(matches!(
            client("data:text/plain,hi"),
            Err(TailError::InvalidConfig(_))
        ));
    }
}
