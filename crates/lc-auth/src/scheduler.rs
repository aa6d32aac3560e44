//! Background access-token renewal.
//!
//! The scheduler refreshes once on start, then wakes up at 90% of the
//! remaining token lifetime, refreshes again and reschedules from the new
//! token's expiry. Each refresh publishes a new [`Credential`] into the shared
//! [`CredentialStore`], so every request built afterwards carries it.
//!
//! Failures inside the loop are fatal: the loop stops and the error is handed
//! to the owner through [`RefreshHandle::fatal`].
//!
//! [`Credential`]: crate::Credential

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{AuthError, AuthResult, CredentialStore, TokenRefresher};

/// Lower bound on the wait between refreshes, so a token that is already
/// expired on arrival cannot turn the loop into a busy loop.
pub const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// Delay until the next refresh: 90% of the time left before `expires_at`.
#[must_use]
pub fn refresh_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let remaining = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
    remaining * 9 / 10
}

/// What wakes the refresh loop.
#[derive(Debug, Default)]
pub enum TickSource {
    /// Sleep for the computed refresh delay.
    #[default]
    Timer,
    /// Refresh whenever a tick arrives; the loop ends when the sender is dropped.
    External(mpsc::Receiver<()>),
}

/// Keeps a [`CredentialStore`] fresh for as long as it runs.
pub struct RefreshScheduler {
    refresher: Arc<dyn TokenRefresher>,
    store: CredentialStore,
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl RefreshScheduler {
    /// Create a scheduler for `store` using `refresher`.
    #[must_use]
    pub fn new(refresher: Arc<dyn TokenRefresher>, store: CredentialStore) -> Self {
        Self { refresher, store }
    }

    /// Refresh immediately, then keep refreshing in a background task.
    ///
    /// # Errors
    /// Returns the error of the initial refresh; nothing is spawned in that case.
    pub async fn start(self, ticks: TickSource) -> AuthResult<RefreshHandle> {
        let delay = refresh_once(self.refresher.as_ref(), &self.store).await?;
        info!(next_refresh_secs = delay.as_secs(), "token refresh scheduled");

        let stop = CancellationToken::new();
        let (fatal_tx, fatal_rx) = mpsc::channel(1);
        let (schedule_tx, schedule_rx) = watch::channel(delay);

        let join = tokio::spawn(run_refresh_loop(
            self.refresher,
            self.store,
            ticks,
            delay,
            stop.clone(),
            fatal_tx,
            schedule_tx,
        ));

        Ok(RefreshHandle {
            stop,
            fatal: fatal_rx,
            schedule: schedule_rx,
            join,
        })
    }
}

/// Owner's side of a running refresh loop.
#[derive(Debug)]
pub struct RefreshHandle {
    stop: CancellationToken,
    fatal: mpsc::Receiver<AuthError>,
    schedule: watch::Receiver<Duration>,
    join: JoinHandle<()>,
}

impl RefreshHandle {
    /// Signal the loop to stop. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Delay that was computed after the most recent refresh.
    #[must_use]
    pub fn next_refresh_in(&self) -> Duration {
        *self.schedule.borrow()
    }

    /// Wait for the loop to fail.
    ///
    /// Resolves to `None` once the loop has ended without an error (stopped, or
    /// its tick source closed).
    pub async fn fatal(&mut self) -> Option<AuthError> {
        self.fatal.recv().await
    }

    /// Stop the loop and wait for the task to finish.
    pub async fn shutdown(self) {
        self.stop.cancel();
        if let Err(err) = self.join.await {
            error!(error = %err, "token refresh task panicked");
        }
    }
}

async fn refresh_once(
    refresher: &dyn TokenRefresher,
    store: &CredentialStore,
) -> AuthResult<Duration> {
    let refresh_token = store.refresh_token()?;
    let response = refresher.refresh(&refresh_token).await?;
    let renewed = store.load().renewed(response);
    let expiry = renewed.expires_at();
    // The new token is still better than the old one even if its expiry is
    // unreadable, so publish before reporting.
    store.publish(renewed);
    let delay = refresh_delay(expiry?, Utc::now());
    Ok(delay.max(MIN_REFRESH_DELAY))
}

async fn run_refresh_loop(
    refresher: Arc<dyn TokenRefresher>,
    store: CredentialStore,
    mut ticks: TickSource,
    mut delay: Duration,
    stop: CancellationToken,
    fatal_tx: mpsc::Sender<AuthError>,
    schedule_tx: watch::Sender<Duration>,
) {
    loop {
        let ticked = match &mut ticks {
            TickSource::Timer => tokio::select! {
                biased;
                () = stop.cancelled() => false,
                () = tokio::time::sleep(delay) => true,
            },
            TickSource::External(rx) => tokio::select! {
                biased;
                () = stop.cancelled() => false,
                tick = rx.recv() => tick.is_some(),
            },
        };
        if !ticked {
            debug!("token refresh loop stopping");
            return;
        }

        match refresh_once(refresher.as_ref(), &store).await {
            Ok(next) => {
                delay = next;
                schedule_tx.send_replace(next);
                info!(next_refresh_secs = next.as_secs(), "access token renewed");
            }
            Err(err) => {
                error!(error = %err, "token refresh failed, stopping refresh loop");
                // Capacity 1 and a single send: this cannot be full.
                let _ = fatal_tx.try_send(err);
                return;
            }
        }
    }
}
