//! One-line rendering of log envelopes.

use chrono::{DateTime, Utc};
use lc_tail::{Envelope, OutputType};

/// Render `envelope` as `<time> [<source_type>/<instance>] <OUT|ERR> <message>`.
#[must_use]
pub fn format_envelope(envelope: &Envelope) -> String {
    let time = DateTime::<Utc>::from_timestamp_nanos(envelope.timestamp())
        .format("%Y-%m-%dT%H:%M:%S%.3f%:z");

    let source = match (envelope.source_type(), envelope.source_instance()) {
        (Some(kind), "") => kind.to_string(),
        (Some(kind), instance) => format!("{kind}/{instance}"),
        (None, "") => envelope.source_id().to_string(),
        (None, instance) => format!("{}/{instance}", envelope.source_id()),
    };

    let stream = match envelope.output_type() {
        Some(OutputType::Err) => "ERR",
        _ => "OUT",
    };

    let message = envelope.message();
    format!(
        "   {time} [{source}] {stream} {}",
        message.trim_end_matches(['\r', '\n'])
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_app_log_line() {
        let envelope = Envelope::log(
            1_581_447_009_352_020_890,
            "app-guid",
            "hello from log-cache\n",
            OutputType::Out,
        )
        .with_instance_id("0")
        .with_tag("source_type", "APP/PROC/WEB");

        assert_eq!(
            format_envelope(&envelope),
            "   2020-02-11T18:50:09.352+00:00 [APP/PROC/WEB/0] OUT hello from log-cache"
        );
    }

    #[test]
    fn falls_back_to_source_id_and_err_stream() {
        let envelope = Envelope::log(0, "app-guid", "boom", OutputType::Err);
        assert_eq!(
            format_envelope(&envelope),
            "   1970-01-01T00:00:00.000+00:00 [app-guid] ERR boom"
        );
    }
}
