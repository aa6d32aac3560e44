//! Read query parameters.

use crate::EnvelopeKind;

/// Parameters of one `GET /api/v1/read/{source_id}` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadQuery {
    /// Inclusive lower bound, nanoseconds since the epoch.
    pub start_time: i64,
    /// Newest first when true.
    pub descending: bool,
    /// Maximum number of envelopes; the store's default when `None`.
    pub limit: Option<u32>,
    /// Envelope kinds to return; all kinds when empty.
    pub envelope_types: Vec<EnvelopeKind>,
}

impl ReadQuery {
    /// The newest envelope of any kind.
    #[must_use]
    pub const fn latest() -> Self {
        Self {
            start_time: 0,
            descending: true,
            limit: Some(1),
            envelope_types: Vec::new(),
        }
    }

    /// Log envelopes at or after `start_time`, oldest first.
    #[must_use]
    pub fn logs_from(start_time: i64) -> Self {
        Self {
            start_time,
            descending: false,
            limit: None,
            envelope_types: vec![EnvelopeKind::Log],
        }
    }

    /// The newest `limit` log envelopes, newest first.
    #[must_use]
    pub fn recent_logs(limit: u32) -> Self {
        Self {
            start_time: 0,
            descending: true,
            limit: Some(limit),
            envelope_types: vec![EnvelopeKind::Log],
        }
    }

    /// Query string pairs, sorted by key.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3 + self.envelope_types.len());
        if self.descending {
            pairs.push(("descending", "true".to_string()));
        }
        pairs.extend(
            self.envelope_types
                .iter()
                .map(|kind| ("envelope_types", kind.as_query_value().to_string())),
        );
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs.push(("start_time", self.start_time.to_string()));
        pairs
    }
}
