//! `lc logs` command implementation.
//!
//! # Usage
//!
//! ```text
//! # Follow new log lines until Ctrl-C
//! lc logs <APP_GUID> --config lc.toml
//!
//! # Print the most recent lines and exit
//! lc logs <APP_GUID> --recent
//! ```

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use lc_auth::{
    AuthError, Credential, CredentialStore, RefreshHandle, RefreshScheduler, TickSource,
    UaaRefresher,
};
use lc_tail::{LogCacheClient, recent_logs, tail};
use tracing::{debug, info};

use crate::config::CliConfig;
use crate::format::format_envelope;

/// Arguments for the `lc logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Source id (application GUID) to read logs for.
    #[arg(value_name = "SOURCE_ID")]
    pub source_id: String,

    /// Dump recent logs instead of streaming.
    #[arg(long, default_value_t = false)]
    pub recent: bool,
}

/// How a successful command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Interrupted,
}

/// Run the `lc logs` command.
///
/// # Errors
/// Returns an error if setup fails, the log stream fails, or the access token
/// can no longer be renewed.
pub async fn run(args: LogsArgs, config: CliConfig) -> Result<Outcome> {
    config.validate()?;

    let store = CredentialStore::new(credential(&config));
    let mut refresh = start_refresh(&config, &store).await?;

    let log_cache_url = config.log_cache_url.as_deref().unwrap_or_default();
    let client = LogCacheClient::new(log_cache_url, store, config.tail.request_timeout())
        .context("invalid log cache settings")?;

    let outcome = if args.recent {
        print_recent(&client, &args.source_id, &config).await
    } else {
        stream(client, &args.source_id, &config, &mut refresh).await
    };

    if let Some(handle) = refresh {
        handle.shutdown().await;
    }
    outcome
}

fn credential(config: &CliConfig) -> Credential {
    let credential = Credential::new(config.access_token.as_deref().unwrap_or_default());
    match config.refresh_token.as_deref() {
        Some(refresh_token) => credential.with_refresh_token(refresh_token),
        None => credential,
    }
}

async fn start_refresh(
    config: &CliConfig,
    store: &CredentialStore,
) -> Result<Option<RefreshHandle>> {
    let (Some(_), Some(uaa_url)) = (config.refresh_token.as_ref(), config.uaa_url.as_deref())
    else {
        debug!("no refresh token configured, access token will not be renewed");
        return Ok(None);
    };

    let refresher = UaaRefresher::new(uaa_url)
        .context("invalid uaa_url")?
        .with_client(config.client_id(), config.client_secret());
    let handle = RefreshScheduler::new(Arc::new(refresher), store.clone())
        .start(TickSource::Timer)
        .await
        .context("failed to refresh access token")?;
    Ok(Some(handle))
}

async fn print_recent(
    client: &LogCacheClient,
    source_id: &str,
    config: &CliConfig,
) -> Result<Outcome> {
    let envelopes = recent_logs(client, source_id, config.tail.recent_limit)
        .await
        .context("failed to read recent logs")?;

    let mut out = std::io::stdout().lock();
    for envelope in &envelopes {
        writeln!(out, "{}", format_envelope(envelope))?;
    }
    Ok(Outcome::Finished)
}

async fn stream(
    client: LogCacheClient,
    source_id: &str,
    config: &CliConfig,
    refresh: &mut Option<RefreshHandle>,
) -> Result<Outcome> {
    let mut session = tail(Arc::new(client), source_id, &config.tail);
    info!(source_id, "streaming logs, press Ctrl-C to stop");

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let outcome = loop {
        tokio::select! {
            signal = &mut interrupt => {
                signal.context("failed to listen for Ctrl-C")?;
                break Ok(Outcome::Interrupted);
            }
            envelope = session.envelopes.recv() => match envelope {
                Some(envelope) => {
                    let mut out = std::io::stdout().lock();
                    writeln!(out, "{}", format_envelope(&envelope))?;
                }
                // The session only ends on its own after a failure.
                None => break match session.errors.try_recv() {
                    Ok(err) => Err(anyhow::Error::new(err).context("log stream failed")),
                    Err(_) => Ok(Outcome::Finished),
                },
            },
            Some(err) = next_fatal(refresh) => {
                break Err(
                    anyhow::Error::new(err).context("access token can no longer be renewed")
                );
            }
        }
    };

    session.handle.shutdown().await;
    outcome
}

async fn next_fatal(refresh: &mut Option<RefreshHandle>) -> Option<AuthError> {
    match refresh {
        Some(handle) => handle.fatal().await,
        None => std::future::pending().await,
    }
}
