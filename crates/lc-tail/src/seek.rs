//! Discovery of the newest stored timestamp.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Envelope, EnvelopeSource, ReadQuery, TailResult};

/// Find the timestamp of the newest envelope stored for `source_id`.
///
/// While the store has nothing for the source the same query is repeated
/// every `retry`. Returns `Ok(None)` once `cancel` fires.
///
/// # Errors
/// Returns the first fetch error; fetch errors are not retried.
pub async fn seek_latest(
    source: &dyn EnvelopeSource,
    source_id: &str,
    retry: Duration,
    cancel: &CancellationToken,
) -> TailResult<Option<i64>> {
    let query = ReadQuery::latest();
    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let batch = source.read(source_id, &query).await?;
        if let Some(latest) = batch.iter().map(Envelope::timestamp).max() {
            debug!(source_id, latest, "seeked newest envelope");
            return Ok(Some(latest));
        }

        debug!(source_id, "no envelopes stored yet");
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(None),
            () = tokio::time::sleep(retry) => {}
        }
    }
}
