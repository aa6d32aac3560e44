//! Tail session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{TailError, TailResult};

/// Timing and sizing of a tail session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailConfig {
    /// Wait after an empty poll before asking again.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wait between seek attempts while the store has no records.
    #[serde(default = "default_seek_retry_ms")]
    pub seek_retry_ms: u64,

    /// How far before the newest stored record the first poll starts.
    #[serde(default = "default_lookback_ms")]
    pub lookback_ms: u64,

    /// Capacity of the envelope channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Number of lines fetched in recent-logs mode.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: u32,

    /// Timeout of a single read request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

const fn default_poll_interval_ms() -> u64 {
    250
}

const fn default_seek_retry_ms() -> u64 {
    250
}

const fn default_lookback_ms() -> u64 {
    1_000
}

const fn default_channel_capacity() -> usize {
    256
}

const fn default_recent_limit() -> u32 {
    1_000
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            seek_retry_ms: default_seek_retry_ms(),
            lookback_ms: default_lookback_ms(),
            channel_capacity: default_channel_capacity(),
            recent_limit: default_recent_limit(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl TailConfig {
    /// Set the empty-poll backoff.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    /// Set the seek retry delay.
    #[must_use]
    pub fn with_seek_retry(mut self, delay: Duration) -> Self {
        self.seek_retry_ms = duration_ms(delay);
        self
    }

    /// Set the look-back window of the first poll.
    #[must_use]
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback_ms = duration_ms(lookback);
        self
    }

    /// Set the envelope channel capacity.
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the recent-logs limit.
    #[must_use]
    pub const fn with_recent_limit(mut self, limit: u32) -> Self {
        self.recent_limit = limit;
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_ms(timeout);
        self
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn seek_retry(&self) -> Duration {
        Duration::from_millis(self.seek_retry_ms)
    }

    #[must_use]
    pub const fn lookback(&self) -> Duration {
        Duration::from_millis(self.lookback_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns `TailError::InvalidConfig` if a value is out of range.
    pub fn validate(&self) -> TailResult<()> {
        // A zero backoff turns an idle tail into a busy loop against the store
        if self.poll_interval_ms == 0 {
            return Err(TailError::InvalidConfig(
                "poll_interval_ms must be positive".into(),
            ));
        }

        if self.seek_retry_ms == 0 {
            return Err(TailError::InvalidConfig(
                "seek_retry_ms must be positive".into(),
            ));
        }

        if self.channel_capacity == 0 {
            return Err(TailError::InvalidConfig(
                "channel_capacity must be positive".into(),
            ));
        }

        if self.recent_limit == 0 || self.recent_limit > 1_000 {
            return Err(TailError::InvalidConfig(
                "recent_limit must be between 1 and 1000".into(),
            ));
        }

        if self.request_timeout_ms == 0 || self.request_timeout_ms > 600_000 {
            return Err(TailError::InvalidConfig(
                "request_timeout_ms must be between 1ms and 600000ms".into(),
            ));
        }

        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
