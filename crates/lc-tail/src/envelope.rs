//! Log cache envelopes and their JSON wire form.

use std::borrow::Cow;
use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer};

use crate::{TailError, TailResult};

/// Envelope discriminator, as named by the `envelope_types` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Log,
    Counter,
    Gauge,
    Timer,
    Event,
    /// An envelope with none of the known bodies.
    Unknown,
}

impl EnvelopeKind {
    /// Value of this kind in the `envelope_types` query parameter.
    #[must_use]
    pub const fn as_query_value(self) -> &'static str {
        match self {
            Self::Log => "LOG",
            Self::Counter => "COUNTER",
            Self::Gauge => "GAUGE",
            Self::Timer => "TIMER",
            Self::Event => "EVENT",
            Self::Unknown => "ANY",
        }
    }
}

/// Stream a log line was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputType {
    #[default]
    Out,
    Err,
}

impl OutputType {
    fn from_wire(value: Option<&str>) -> TailResult<Self> {
        match value {
            None | Some("OUT") => Ok(Self::Out),
            Some("ERR") => Ok(Self::Err),
            Some(other) => Err(TailError::Decode(format!("unknown log type '{other}'"))),
        }
    }
}

/// One record from the log store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    timestamp: i64,
    source_id: String,
    instance_id: String,
    kind: EnvelopeKind,
    payload: Vec<u8>,
    output_type: Option<OutputType>,
    tags: BTreeMap<String, String>,
}

impl Envelope {
    /// Build a log envelope.
    #[must_use]
    pub fn log(
        timestamp: i64,
        source_id: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        output_type: OutputType,
    ) -> Self {
        Self {
            timestamp,
            source_id: source_id.into(),
            instance_id: String::new(),
            kind: EnvelopeKind::Log,
            payload: payload.into(),
            output_type: Some(output_type),
            tags: BTreeMap::new(),
        }
    }

    /// Set the emitting instance.
    #[must_use]
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Nanoseconds since the Unix epoch.
    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }

    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    #[must_use]
    pub const fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    #[must_use]
    pub const fn is_log(&self) -> bool {
        matches!(self.kind, EnvelopeKind::Log)
    }

    /// Decoded log payload. Empty for non-log envelopes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn message(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// `Out` or `Err` for log envelopes, `None` otherwise.
    #[must_use]
    pub const fn output_type(&self) -> Option<OutputType> {
        self.output_type
    }

    /// Component that emitted the record, e.g. `APP/PROC/WEB`.
    #[must_use]
    pub fn source_type(&self) -> Option<&str> {
        self.tags.get("source_type").map(String::as_str)
    }

    /// Instance index of the emitter; empty when the store did not say.
    #[must_use]
    pub fn source_instance(&self) -> &str {
        &self.instance_id
    }

    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

/// Envelopes returned by one query, in the order the store sent them.
pub type Batch = Vec<Envelope>;

/// Parse a read response body.
///
/// `{}` and a body without a batch are an empty batch.
///
/// # Errors
/// Returns [`TailError::Json`] for malformed JSON and [`TailError::Decode`]
/// for envelopes with an unreadable timestamp, payload or log type.
pub fn parse_batch(body: &str) -> TailResult<Batch> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let response: ReadResponse = serde_json::from_str(body)?;
    response
        .envelopes
        .map(|envelopes| envelopes.batch)
        .unwrap_or_default()
        .into_iter()
        .map(WireEnvelope::into_envelope)
        .collect()
}

#[derive(Deserialize)]
struct ReadResponse {
    #[serde(default)]
    envelopes: Option<WireBatch>,
}

#[derive(Deserialize)]
struct WireBatch {
    #[serde(default)]
    batch: Vec<WireEnvelope>,
}

#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(deserialize_with = "timestamp_from_wire")]
    timestamp: i64,
    #[serde(default)]
    source_id: String,
    #[serde(default)]
    instance_id: String,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    log: Option<WireLog>,
    counter: Option<serde_json::Value>,
    gauge: Option<serde_json::Value>,
    timer: Option<serde_json::Value>,
    event: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct WireLog {
    #[serde(default)]
    payload: String,
    #[serde(rename = "type", default)]
    output_type: Option<String>,
}

impl WireEnvelope {
    fn into_envelope(self) -> TailResult<Envelope> {
        let (kind, payload, output_type) = if let Some(log) = self.log {
            let payload = STANDARD.decode(log.payload.as_bytes()).map_err(|err| {
                TailError::Decode(format!(
                    "invalid base64 payload at timestamp {}: {err}",
                    self.timestamp
                ))
            })?;
            let output_type = OutputType::from_wire(log.output_type.as_deref())?;
            (EnvelopeKind::Log, payload, Some(output_type))
        } else {
            let kind = if self.counter.is_some() {
                EnvelopeKind::Counter
            } else if self.gauge.is_some() {
                EnvelopeKind::Gauge
            } else if self.timer.is_some() {
                EnvelopeKind::Timer
            } else if self.event.is_some() {
                EnvelopeKind::Event
            } else {
                EnvelopeKind::Unknown
            };
            (kind, Vec::new(), None)
        };

        Ok(Envelope {
            timestamp: self.timestamp,
            source_id: self.source_id,
            instance_id: self.instance_id,
            kind,
            payload,
            output_type,
            tags: self.tags,
        })
    }
}

/// Timestamps are int64 in protobuf JSON, so they arrive as strings; accept
/// bare numbers as well.
fn timestamp_from_wire<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Number(i64),
        Text(String),
    }

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Number(ts) => Ok(ts),
        RawTimestamp::Text(text) => text
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid timestamp '{text}'"))),
    }
}
