//! Cursor-driven polling for envelopes newer than the last one delivered.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{Batch, Envelope, EnvelopeSource, ReadQuery, TailResult};

/// Position of a poll loop in the envelope stream.
///
/// Until the first non-empty batch the loop serves a look-back window that
/// starts before the seeked timestamp. After that every query starts one
/// nanosecond past the newest delivered timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    last: i64,
    seeked: i64,
    window_start: i64,
    primed: bool,
}

impl Cursor {
    /// Cursor for a stream whose newest stored record is at `seeked`.
    #[must_use]
    pub fn after_seek(seeked: i64, lookback: Duration) -> Self {
        let lookback = i64::try_from(lookback.as_nanos()).unwrap_or(i64::MAX);
        let window_start = seeked.saturating_sub(lookback);
        Self {
            last: window_start.saturating_sub(1),
            seeked,
            window_start,
            primed: false,
        }
    }

    /// Inclusive start boundary of the next query.
    #[must_use]
    pub const fn next_start(&self) -> i64 {
        if self.primed {
            self.last.saturating_add(1)
        } else {
            self.window_start
        }
    }

    /// Newest timestamp known to be delivered.
    #[must_use]
    pub const fn last(&self) -> i64 {
        self.last
    }

    /// Whether the look-back window has been served.
    #[must_use]
    pub const fn is_primed(&self) -> bool {
        self.primed
    }

    /// Record `timestamp` as delivered if it is newer than everything so far.
    ///
    /// Returns `false` for envelopes that must be dropped.
    pub const fn admit(&mut self, timestamp: i64) -> bool {
        if timestamp <= self.last {
            return false;
        }
        self.last = timestamp;
        true
    }

    /// Mark the look-back window as served after a non-empty batch.
    pub fn settle(&mut self) {
        if !self.primed {
            self.primed = true;
            self.last = self.last.max(self.seeked);
        }
    }
}

/// Why a poll loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    /// The cancellation token fired.
    Cancelled,
    /// Nobody is receiving envelopes any more.
    Closed,
}

/// Put a batch in ascending timestamp order.
///
/// Returns `true` if the batch had to be reordered.
pub(crate) fn order_batch(batch: &mut Batch) -> bool {
    if batch.is_sorted_by_key(Envelope::timestamp) {
        return false;
    }
    batch.sort_by_key(Envelope::timestamp);
    true
}

/// Poll `source_id` from `cursor` and forward each new envelope to `out`.
///
/// An empty batch, or one holding only already-delivered envelopes, is
/// followed by a wait of `interval` and the same query again.
///
/// # Errors
/// Returns the first fetch error.
pub async fn poll_envelopes(
    source: &dyn EnvelopeSource,
    source_id: &str,
    mut cursor: Cursor,
    interval: Duration,
    out: &mpsc::Sender<Envelope>,
    cancel: &CancellationToken,
) -> TailResult<PollExit> {
    loop {
        if cancel.is_cancelled() {
            return Ok(PollExit::Cancelled);
        }

        let start_time = cursor.next_start();
        let mut batch = source
            .read(source_id, &ReadQuery::logs_from(start_time))
            .await?;

        // The in-flight read may finish after cancellation; drop its result.
        if cancel.is_cancelled() {
            return Ok(PollExit::Cancelled);
        }

        let received = batch.len();
        if order_batch(&mut batch) {
            warn!(source_id, start_time, received, "batch out of order, sorted by timestamp");
        }

        let mut delivered = 0usize;
        for envelope in batch {
            if !cursor.admit(envelope.timestamp()) {
                trace!(timestamp = envelope.timestamp(), "dropping duplicate envelope");
                continue;
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(PollExit::Cancelled),
                sent = out.send(envelope) => {
                    if sent.is_err() {
                        debug!(source_id, "envelope receiver dropped");
                        return Ok(PollExit::Closed);
                    }
                }
            }
            delivered += 1;
        }

        if received > 0 {
            cursor.settle();
        }
        debug!(
            source_id,
            start_time,
            received,
            delivered,
            cursor = cursor.last(),
            "poll complete"
        );

        if delivered == 0 {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(PollExit::Cancelled),
                () = tokio::time::sleep(interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OutputType;

    const T: i64 = 1_581_447_006_352_020_890;

    #[test]
    fn first_query_starts_one_second_before_seek() {
        let cursor = Cursor::after_seek(T, Duration::from_secs(1));
        assert_eq!(cursor.next_start(), 1_581_447_005_352_020_890);
        assert!(!cursor.is_primed());
    }

    #[test]
    fn settled_cursor_starts_past_newest_delivered() {
        let mut cursor = Cursor::after_seek(T, Duration::from_secs(1));
        assert!(cursor.admit(T + 3_000_000_000));
        cursor.settle();
        assert_eq!(cursor.next_start(), T + 3_000_000_001);
    }

    #[test]
    fn settle_never_moves_before_seeked_timestamp() {
        let mut cursor = Cursor::after_seek(T, Duration::from_secs(1));
        assert!(cursor.admit(T - 10));
        cursor.settle();
        assert_eq!(cursor.last(), T);
        assert_eq!(cursor.next_start(), T + 1);
    }

    #[test]
    fn window_records_and_seeked_record_are_admitted_once() {
        let mut cursor = Cursor::after_seek(T, Duration::from_secs(1));
        assert!(cursor.admit(T - 1_000_000_000));
        assert!(cursor.admit(T));
        assert!(!cursor.admit(T));
        assert!(!cursor.admit(T - 5));
    }

    #[test]
    fn records_before_window_are_dropped() {
        let mut cursor = Cursor::after_seek(T, Duration::from_secs(1));
        assert!(!cursor.admit(T - 2_000_000_000));
    }

    #[test]
    fn lookback_saturates_near_epoch() {
        let cursor = Cursor::after_seek(5, Duration::from_secs(1));
        assert_eq!(cursor.next_start(), 5 - 1_000_000_000);

        let cursor = Cursor::after_seek(i64::MIN + 1, Duration::from_secs(1));
        assert_eq!(cursor.next_start(), i64::MIN);
    }

    #[test]
    fn order_batch_sorts_stably() {
        let mut batch = vec![
            Envelope::log(3, "a", "c", OutputType::Out),
            Envelope::log(1, "a", "a", OutputType::Out),
            Envelope::log(3, "a", "d", OutputType::Out),
            Envelope::log(2, "a", "b", OutputType::Out),
        ];
        assert!(order_batch(&mut batch));
        let messages: Vec<_> = batch.iter().map(|e| e.message().into_owned()).collect();
        assert_eq!(messages, vec!["a", "b", "c", "d"]);
        assert!(!order_batch(&mut batch));
    }
}
