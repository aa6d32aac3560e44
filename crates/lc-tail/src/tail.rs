//! Streaming sessions: seek, then poll, in one background task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    Cursor, Envelope, EnvelopeSource, PollExit, ReadQuery, TailConfig, TailError, TailResult,
    poll_envelopes, seek_latest,
};

/// A running tail of one source.
#[derive(Debug)]
pub struct TailSession {
    /// Envelopes in ascending timestamp order, each delivered once.
    pub envelopes: mpsc::Receiver<Envelope>,
    /// At most one error; the session has stopped when it arrives.
    pub errors: mpsc::Receiver<TailError>,
    /// Stops the session.
    pub handle: TailHandle,
}

/// Cancellation side of a [`TailSession`].
///
/// Dropping the handle does not stop the session; it ends when cancelled,
/// when it fails, or when the envelope receiver is dropped.
#[derive(Debug)]
pub struct TailHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl TailHandle {
    /// Ask the session to stop. Idempotent.
    ///
    /// Nothing is sent on either channel after the task observes this, and
    /// both channels close when it exits.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the background task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel and wait for the background task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.join.await {
            error!(error = %err, "tail task panicked");
        }
    }
}

/// Start tailing `source_id`.
///
/// The session first finds the newest stored record, then polls from
/// slightly before it and keeps polling until cancelled. Any fetch error is
/// reported once on [`TailSession::errors`] and ends the session.
///
/// # Panics
/// Panics if called outside a Tokio runtime.
pub fn tail(
    source: Arc<dyn EnvelopeSource>,
    source_id: impl Into<String>,
    config: &TailConfig,
) -> TailSession {
    let source_id = source_id.into();
    let cancel = CancellationToken::new();
    let (envelope_tx, envelope_rx) = mpsc::channel(config.channel_capacity.max(1));
    let (error_tx, error_rx) = mpsc::channel(1);

    let task_cancel = cancel.clone();
    let config = config.clone();
    let join = tokio::spawn(async move {
        info!(source_id = %source_id, "starting log tail");
        let result = run_session(
            source.as_ref(),
            &source_id,
            &config,
            &envelope_tx,
            &task_cancel,
        )
        .await;

        match result {
            Ok(exit) => debug!(source_id = %source_id, ?exit, "log tail stopped"),
            Err(err) if task_cancel.is_cancelled() => {
                debug!(source_id = %source_id, error = %err, "error after cancellation dropped");
            }
            Err(err) => {
                warn!(source_id = %source_id, error = %err, "log tail failed");
                // Capacity 1 and a single send: this cannot be full.
                let _ = error_tx.try_send(err);
            }
        }
    });

    TailSession {
        envelopes: envelope_rx,
        errors: error_rx,
        handle: TailHandle { cancel, join },
    }
}

async fn run_session(
    source: &dyn EnvelopeSource,
    source_id: &str,
    config: &TailConfig,
    out: &mpsc::Sender<Envelope>,
    cancel: &CancellationToken,
) -> TailResult<PollExit> {
    let Some(latest) = seek_latest(source, source_id, config.seek_retry(), cancel).await? else {
        return Ok(PollExit::Cancelled);
    };

    let cursor = Cursor::after_seek(latest, config.lookback());
    info!(source_id, latest, start_time = cursor.next_start(), "tailing from newest envelope");
    poll_envelopes(
        source,
        source_id,
        cursor,
        config.poll_interval(),
        out,
        cancel,
    )
    .await
}

/// Fetch the newest `limit` log envelopes of `source_id`, oldest first.
///
/// # Errors
/// Returns the fetch error.
pub async fn recent_logs(
    source: &dyn EnvelopeSource,
    source_id: &str,
    limit: u32,
) -> TailResult<Vec<Envelope>> {
    let mut envelopes = source
        .read(source_id, &ReadQuery::recent_logs(limit))
        .await?;
    envelopes.retain(Envelope::is_log);
    envelopes.sort_by_key(Envelope::timestamp);
    debug!(source_id, count = envelopes.len(), "fetched recent logs");
    Ok(envelopes)
}
