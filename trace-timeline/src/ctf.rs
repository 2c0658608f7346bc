//! Reader for Chrome Trace Event format records
//!
//! Based on the documentation available at
//! <https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU>
//!
//! Only duration (B/E), complete (X) and instant (i/I) events carry meaning
//! for timelines. Every other record still decodes, keeping its raw phase
//! code, so that it can be filtered out instead of failing the whole load.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json as json;
use strum::EnumString;
use thiserror::Error;

/// Clock timestamp in whole microseconds
pub type Timestamp = i64;

/// Durations are just a difference of timestamps
pub type Duration = Timestamp;

/// Free-form event arguments
pub type EventArgs = json::Map<String, json::Value>;

/// Event record, as found in a `traceEvents` array
//
// Profilers attach all sorts of extra keys to their events, so this must not
// get #[serde(deny_unknown_fields)]
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TraceEvent {
    /// Name of the event (for display and classification)
    #[serde(default)]
    pub name: Box<str>,

    /// Raw phase code, see [`TraceEvent::phase()`]
    #[serde(default)]
    pub ph: Box<str>,

    /// Tracing clock timestamp in microseconds
    ///
    /// Fractional timestamps are truncated toward zero. Metadata records may
    /// lack a timestamp, events with a recognized phase may not.
    #[serde(default, deserialize_with = "whole_micros")]
    pub ts: Option<Timestamp>,

    /// Duration of complete events
    #[serde(default, deserialize_with = "whole_micros")]
    pub dur: Option<Duration>,

    /// Process that output this event
    #[serde(default)]
    pub pid: TrackId,

    /// Thread that output this event
    #[serde(default)]
    pub tid: TrackId,

    /// Event category (for filtering)
    #[serde(default)]
    pub cat: Option<Box<str>>,

    /// Extra arguments
    ///
    /// In the case of B/E events, arguments should be merged during display
    /// with E event taking priority where a key conflict occurs.
    #[serde(default)]
    pub args: Option<EventArgs>,
}
//
impl TraceEvent {
    /// Decoded phase, if this is one of the phases timelines care about
    pub fn phase(&self) -> Option<Phase> {
        self.ph.parse().ok()
    }
}

/// Event phases which timelines are built from
#[derive(Clone, Copy, Debug, EnumString, Eq, Hash, PartialEq)]
pub enum Phase {
    /// Beginning of some work, must come before corresponding E event
    #[strum(serialize = "B")]
    Begin,

    /// End of some work, must come after corresponding B event
    #[strum(serialize = "E")]
    End,

    /// Something happened at a point in time
    #[strum(serialize = "i", serialize = "I")]
    Instant,

    /// Complete event = combines two consecutive B and E events
    #[strum(serialize = "X")]
    Complete,
}

/// Process or thread identifier
///
/// Most profilers use integers here, but some GPU profilers use names to
/// label synthetic tracks, so both are accepted and echoed back verbatim.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrackId {
    /// Numerical PID/TID
    Number(i64),

    /// Named track
    Name(Box<str>),
}
//
impl Default for TrackId {
    fn default() -> Self {
        Self::Number(0)
    }
}

/// Decode a JSON array of event records
pub fn parse_events(values: Vec<json::Value>) -> Result<Vec<TraceEvent>, BadEvent> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            TraceEvent::deserialize(value).map_err(|source| BadEvent { index, source })
        })
        .collect()
}

/// An event record could not be decoded
#[derive(Debug, Error)]
#[error("failed to decode event #{index} ({source})")]
pub struct BadEvent {
    /// Position of the faulty record in its array
    pub index: usize,

    /// What serde had to say about it
    pub source: json::Error,
}

/// Accept any JSON number as a timestamp, truncating it to microseconds
fn whole_micros<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Timestamp>, D::Error> {
    let number = Option::<json::Number>::deserialize(deserializer)?;
    Ok(number.map(|n| {
        n.as_i64()
            .unwrap_or_else(|| n.as_f64().unwrap_or_default() as Timestamp)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Decode a JSON array of events, which is expected to be valid
    fn events(json_str: &str) -> Vec<TraceEvent> {
        let values = json::from_str::<Vec<json::Value>>(json_str)
            .expect("Test input should be a JSON array");
        parse_events(values).expect("Test events should decode")
    }

    #[test]
    fn begin_end() {
        // Example from the CTF documentation
        let parsed = events(
            r#"[
{"name": "myFunction", "cat": "foo", "ph": "B", "ts": 123, "pid": 2343, "tid": 2347,
 "args": {
   "first": 1
 }
},
{"name": "myFunction", "ph": "E", "ts": 145, "pid": 2343, "tid": 2347,
 "args": {
   "first": 4,
   "second": 2
 }
}]"#,
        );
        assert_eq!(
            parsed,
            vec![
                TraceEvent {
                    name: "myFunction".into(),
                    ph: "B".into(),
                    ts: Some(123),
                    pid: TrackId::Number(2343),
                    tid: TrackId::Number(2347),
                    cat: Some("foo".into()),
                    args: json::json!({"first": 1}).as_object().cloned(),
                    ..TraceEvent::default()
                },
                TraceEvent {
                    name: "myFunction".into(),
                    ph: "E".into(),
                    ts: Some(145),
                    pid: TrackId::Number(2343),
                    tid: TrackId::Number(2347),
                    args: json::json!({"first": 4, "second": 2}).as_object().cloned(),
                    ..TraceEvent::default()
                },
            ]
        );
        assert_eq!(parsed[0].phase(), Some(Phase::Begin));
        assert_eq!(parsed[1].phase(), Some(Phase::End));
    }

    #[test]
    fn complete_event_with_fractional_times() {
        let parsed = events(
            r#"[{"name": "gemm", "cat": "kernel", "ph": "X", "ts": 123.9, "dur": 234.5,
                 "pid": 0, "tid": "stream 7"}]"#,
        );
        assert_eq!(parsed[0].phase(), Some(Phase::Complete));
        assert_eq!(parsed[0].ts, Some(123));
        assert_eq!(parsed[0].dur, Some(234));
        assert_eq!(parsed[0].tid, TrackId::Name("stream 7".into()));
    }

    #[test]
    fn instant_phases() {
        let parsed = events(
            r#"[{"name": "a", "ph": "i", "ts": 1}, {"name": "b", "ph": "I", "ts": 2}]"#,
        );
        assert!(parsed.iter().all(|e| e.phase() == Some(Phase::Instant)));
    }

    #[test]
    fn other_records_decode_without_phase() {
        let parsed = events(
            r#"[{"name": "process_name", "ph": "M", "pid": 1, "args": {"name": "jit"}},
                {"name": "ctr", "ph": "C", "ts": 5, "args": {"cats": 0}},
                {"name": "no phase at all", "ts": 7}]"#,
        );
        assert_eq!(parsed.len(), 3);
        assert!(parsed.iter().all(|e| e.phase().is_none()));
        assert_eq!(parsed[0].ts, None);
    }

    #[test]
    fn bad_event_reports_position() {
        let values = json::from_str::<Vec<json::Value>>(
            r#"[{"name": "ok", "ph": "B", "ts": 0}, {"name": "bad", "ph": "E", "ts": "soon"}]"#,
        )
        .unwrap();
        let error = parse_events(values).unwrap_err();
        assert_eq!(error.index, 1);
    }
}
