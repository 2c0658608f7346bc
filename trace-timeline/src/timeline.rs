//! Timeline construction
//!
//! A timeline is built once from a loaded trace, then only read. Events are
//! classified, split into one collection per display type, sorted by
//! timestamp, and Begin/End pairs are turned into intervals. Intervals which
//! carry a nested sub-trace get it expanded into sub-group events.

mod nested;

use crate::{
    classify::{classify, UnclassifiedEvent},
    ctf::{BadEvent, Duration, EventArgs, Phase, Timestamp, TraceEvent, TrackId},
    format::{self, LoadedTrace, TraceFormat},
    metadata::MetadataEntry,
    pairing::match_intervals,
    rules::{DisplayType, GroupIndex, NestedTrace, Rule, RuleRegistry},
    TraceLoadError, TraceParseError,
};
use log::{debug, info};
use serde::Serialize;
use serde_json as json;
use std::path::Path;
use thiserror::Error;

/// Event, as displayed on the timeline
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineEvent {
    /// Event name
    pub name: Box<str>,

    /// Group, as a position in the display ordering
    pub group: GroupIndex,

    /// CSS class of the event
    #[serde(rename = "className")]
    pub class_name: Box<str>,

    /// Start timestamp
    pub start: Timestamp,

    /// End timestamp, equal to `start` for point events
    pub end: Timestamp,

    /// `end - start`
    pub dur: Duration,

    /// Process that output the event
    pub pid: TrackId,

    /// Thread that output the event
    pub tid: TrackId,

    /// Display label
    pub content: Box<str>,

    /// How the event is drawn
    #[serde(rename = "type")]
    pub display_type: DisplayType,

    /// Event category, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat: Option<Box<str>>,

    /// Event arguments (merged from Begin and End for intervals)
    #[serde(skip)]
    pub args: Option<EventArgs>,
}

/// Timeline of a trace
#[derive(Clone, Debug)]
pub struct Timeline {
    /// Grouping rules of the trace format
    registry: RuleRegistry,

    /// Top-level events, one collection per display type
    events: [Box<[TimelineEvent]>; 4],

    /// Events from nested sub-traces
    sub_trace_events: Box<[TimelineEvent]>,

    /// Earliest top-level event timestamp
    start_ts: Timestamp,

    /// Latest top-level event timestamp
    end_ts: Timestamp,

    /// Number of top-level events the timeline was built from
    event_count: usize,

    /// Profile metadata
    profile: Box<[MetadataEntry]>,
}
//
impl Timeline {
    /// Load a trace file and build its timeline
    pub fn from_file(path: impl AsRef<Path>, format: TraceFormat) -> Result<Self, TraceLoadError> {
        let trace = format::load(path, format)?;
        Ok(Self::build(trace).map_err(TraceParseError::from)?)
    }

    /// Parse a trace document and build its timeline
    pub fn parse(s: &str, format: TraceFormat) -> Result<Self, TraceParseError> {
        Ok(Self::build(format::parse(s, format)?)?)
    }

    /// Build a timeline from a loaded trace
    ///
    /// Events with a phase that timelines do not use are ignored, and
    /// Begin/End events which cannot be paired are dropped. Everything else
    /// must make sense, otherwise the whole build fails.
    pub fn build(trace: LoadedTrace) -> Result<Self, TimelineError> {
        let LoadedTrace {
            registry,
            events,
            profile,
        } = trace;
        if events.iter().all(|event| event.phase().is_none()) {
            return Err(TimelineError::EmptyTrace);
        }

        let level = build_level(&events, &registry, true)?;

        // All remaining events have a timestamp, build_level made sure of it
        let (event_count, start_ts, end_ts) = events
            .iter()
            .filter(|event| event.phase().is_some())
            .filter_map(|event| event.ts)
            .fold((0, Timestamp::MAX, Timestamp::MIN), |(count, start, end), ts| {
                (count + 1, start.min(ts), end.max(ts))
            });
        if end_ts.checked_sub(start_ts).is_none() {
            return Err(TimelineError::TraceTooLong {
                start: start_ts,
                end: end_ts,
            });
        }

        let [points, ranges, backgrounds, x_ranges] = level.events;
        info!(
            "Built timeline from {event_count} events: {} points, {} ranges, {} backgrounds, \
             {} x-ranges and {} sub-trace events",
            points.len(),
            ranges.len(),
            backgrounds.len(),
            x_ranges.len(),
            level.sub_trace_events.len()
        );
        Ok(Self {
            registry,
            events: [points, ranges, backgrounds, x_ranges].map(Vec::into_boxed_slice),
            sub_trace_events: level.sub_trace_events.into_boxed_slice(),
            start_ts,
            end_ts,
            event_count,
            profile: profile.into_boxed_slice(),
        })
    }

    /// Grouping rules of the trace format
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Top-level events of a given display type
    pub fn events(&self, display_type: DisplayType) -> &[TimelineEvent] {
        &self.events[slot(display_type)]
    }

    /// All top-level events, one display type after another
    pub fn top_level_events(&self) -> impl Iterator<Item = &TimelineEvent> + Clone {
        self.events.iter().flat_map(|events| events.iter())
    }

    /// Events from nested sub-traces, including setup/teardown
    pub fn sub_trace_events(&self) -> &[TimelineEvent] {
        &self.sub_trace_events
    }

    /// Earliest top-level event timestamp
    pub fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    /// Latest top-level event timestamp
    pub fn end_ts(&self) -> Timestamp {
        self.end_ts
    }

    /// Time elapsed between the first and last top-level event
    ///
    /// Cannot overflow, the build rejects traces for which it would.
    pub fn runtime(&self) -> Duration {
        self.end_ts - self.start_ts
    }

    /// Number of top-level events the timeline was built from
    pub fn event_count(&self) -> usize {
        self.event_count
    }

    /// Profile metadata
    pub fn profile(&self) -> &[MetadataEntry] {
        &self.profile
    }
}

/// What can go wrong while building a timeline
#[derive(Debug, Error)]
pub enum TimelineError {
    /// An event name matches no grouping rule
    #[error("{0}")]
    Unclassified(#[from] UnclassifiedEvent),

    /// There is no event with a phase that timelines use
    #[error("trace holds no event that can be displayed")]
    EmptyTrace,

    /// An event with a phase that timelines use has no timestamp
    #[error("event {0:?} has no timestamp")]
    MissingTimestamp(Box<str>),

    /// A complete event has no duration
    #[error("complete event {0:?} has no duration")]
    MissingDuration(Box<str>),

    /// An event lasts longer than durations can express
    #[error("event {name:?} spans [{start}, {end}], which is too long")]
    DurationOverflow {
        /// Event name
        name: Box<str>,

        /// Start timestamp
        start: Timestamp,

        /// End timestamp, or the last representable timestamp if the event
        /// ends after it
        end: Timestamp,
    },

    /// The trace lasts longer than durations can express
    #[error("trace spans [{start}, {end}], which is too long")]
    TraceTooLong {
        /// Earliest event timestamp
        start: Timestamp,

        /// Latest event timestamp
        end: Timestamp,
    },

    /// A complete event has a negative duration
    #[error("complete event {name:?} has negative duration {dur}")]
    NegativeDuration {
        /// Event name
        name: Box<str>,

        /// Recorded duration
        dur: Duration,
    },

    /// Nested sub-trace data is not an array of events
    #[error("sub-trace of {parent:?} is not an array of events")]
    SubTraceNotAnArray {
        /// Name of the interval that carries the sub-trace
        parent: Box<str>,
    },

    /// An event of a nested sub-trace could not be decoded
    #[error("bad event in sub-trace of {parent:?} ({source})")]
    BadSubTrace {
        /// Name of the interval that carries the sub-trace
        parent: Box<str>,

        /// Decoding error
        source: BadEvent,
    },

    /// A nested sub-trace extends beyond the interval that carries it
    #[error("sub-trace of {parent:?} is out of bounds ({boundary} would last {dur}us)")]
    SubTraceOutOfBounds {
        /// Name of the interval that carries the sub-trace
        parent: Box<str>,

        /// Boundary event which would have a negative duration
        boundary: &'static str,

        /// Duration that this boundary event would have
        dur: Duration,
    },
}

/// Events of one trace level (top-level trace or nested sub-trace)
#[derive(Debug, Default)]
struct Level {
    /// Events, one collection per display type, see [`slot()`]
    events: [Vec<TimelineEvent>; 4],

    /// Events from nested sub-traces
    sub_trace_events: Vec<TimelineEvent>,
}

/// Event which was accepted by the classifier
struct Classified<'a> {
    event: &'a TraceEvent,
    phase: Phase,
    ts: Timestamp,
    rule: &'a Rule,
}

/// Position of a display type's collection in [`DisplayType::ALL`] order
fn slot(display_type: DisplayType) -> usize {
    match display_type {
        DisplayType::Point => 0,
        DisplayType::Range => 1,
        DisplayType::Background => 2,
        DisplayType::XRange => 3,
    }
}

/// Turn one level of raw events into timeline events
///
/// Nested sub-traces are only expanded if `expand_nested` is set.
fn build_level(
    events: &[TraceEvent],
    registry: &RuleRegistry,
    expand_nested: bool,
) -> Result<Level, TimelineError> {
    // Classify events and partition them by display type
    let mut partitions: [Vec<Classified>; 4] = Default::default();
    for event in events {
        let Some(classification) = classify(event, registry)? else {
            continue;
        };
        let Some(phase) = event.phase() else {
            continue;
        };
        let ts = event
            .ts
            .ok_or_else(|| TimelineError::MissingTimestamp(event.name.clone()))?;
        partitions[slot(classification.display_type)].push(Classified {
            event,
            phase,
            ts,
            rule: classification.rule,
        });
    }

    let mut level = Level::default();
    for (display_type, mut partition) in DisplayType::ALL.into_iter().zip(partitions) {
        partition.sort_by_key(|item| item.ts);
        let pairing = match_intervals(partition.iter().map(|item| (item.phase, &*item.event.name)));
        if !(pairing.orphan_ends.is_empty() && pairing.unclosed_begins.is_empty()) {
            debug!(
                "Dropped {} {display_type} End events without a matching Begin and {} Begin \
                 events that were never closed",
                pairing.orphan_ends.len(),
                pairing.unclosed_begins.len()
            );
        }

        // Pairs come out in End order, so they can be consumed as Ends are met
        let mut pairs = pairing.pairs.iter().peekable();
        for (idx, item) in partition.iter().enumerate() {
            let timeline_event = match item.phase {
                Phase::Begin => continue,
                Phase::End => {
                    let Some(pair) = pairs.next_if(|pair| pair.end == idx) else {
                        continue;
                    };
                    let (interval, sub_trace) = interval(
                        &partition[pair.begin],
                        item,
                        display_type,
                        registry,
                        expand_nested,
                    )?;
                    if let Some((nested, sub_trace)) = sub_trace {
                        let expanded = nested::expand(&interval, sub_trace, nested, registry)?;
                        level.sub_trace_events.extend(expanded);
                    }
                    interval
                }
                Phase::Instant | Phase::Complete => direct(item, display_type, registry)?,
            };
            level.events[slot(display_type)].push(timeline_event);
        }
    }
    Ok(level)
}

/// Build an interval from a Begin/End pair
///
/// Also extracts the nested sub-trace carried by the End event, if there is
/// one and `expand_nested` is set.
fn interval<'a>(
    begin: &Classified<'a>,
    end: &Classified<'a>,
    display_type: DisplayType,
    registry: &RuleRegistry,
    expand_nested: bool,
) -> Result<(TimelineEvent, Option<(&'a NestedTrace, json::Value)>), TimelineError> {
    let mut args = match (begin.event.args.clone(), &end.event.args) {
        (Some(mut args), Some(end_args)) => {
            args.extend(end_args.iter().map(|(k, v)| (k.clone(), v.clone())));
            Some(args)
        }
        (begin_args, end_args) => begin_args.or_else(|| end_args.clone()),
    };

    let mut sub_trace = None;
    if let (true, Some(nested), Some(end_args), Some(args)) =
        (expand_nested, end.rule.nested(), &end.event.args, &mut args)
    {
        if end_args.contains_key(nested.data_key()) {
            sub_trace = args.remove(nested.data_key()).map(|data| (nested, data));
        }
    }

    let mut event = materialize(begin, begin.ts, end.ts, display_type, args, registry)?;
    if event.cat.is_none() {
        event.cat = end.event.cat.clone();
    }
    Ok((event, sub_trace))
}

/// Build a point or complete event
fn direct(
    item: &Classified,
    display_type: DisplayType,
    registry: &RuleRegistry,
) -> Result<TimelineEvent, TimelineError> {
    let dur = match item.phase {
        Phase::Complete => item
            .event
            .dur
            .ok_or_else(|| TimelineError::MissingDuration(item.event.name.clone()))?,
        _ => 0,
    };
    if dur < 0 {
        return Err(TimelineError::NegativeDuration {
            name: item.event.name.clone(),
            dur,
        });
    }
    let end = item
        .ts
        .checked_add(dur)
        .ok_or_else(|| TimelineError::DurationOverflow {
            name: item.event.name.clone(),
            start: item.ts,
            end: Timestamp::MAX,
        })?;
    materialize(
        item,
        item.ts,
        end,
        display_type,
        item.event.args.clone(),
        registry,
    )
}

/// Assemble a timeline event
fn materialize(
    item: &Classified,
    start: Timestamp,
    end: Timestamp,
    display_type: DisplayType,
    args: Option<EventArgs>,
    registry: &RuleRegistry,
) -> Result<TimelineEvent, TimelineError> {
    let dur = end
        .checked_sub(start)
        .ok_or_else(|| TimelineError::DurationOverflow {
            name: item.event.name.clone(),
            start,
            end,
        })?;
    let group = item.rule.index();
    Ok(TimelineEvent {
        name: item.event.name.clone(),
        group,
        class_name: registry.class_name(group).into(),
        start,
        end,
        dur,
        pid: item.event.pid.clone(),
        tid: item.event.tid.clone(),
        content: item.rule.content().format(&item.event.name, args.as_ref()),
        display_type,
        cat: item.event.cat.clone(),
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use more_asserts::assert_le;
    use pretty_assertions::assert_eq;

    fn jit(events: &str) -> Result<Timeline, TraceParseError> {
        Timeline::parse(&format!(r#"{{"data": {{"traceEvents": {events}}}}}"#), TraceFormat::Jit)
    }

    fn names(events: &[TimelineEvent]) -> Vec<&str> {
        events.iter().map(|event| &*event.name).collect()
    }

    #[test]
    fn sequential_ranges() {
        let timeline = jit(r#"[
            {"name": "compile", "ph": "B", "ts": 0, "pid": 1, "tid": 2},
            {"name": "compile", "ph": "E", "ts": 5, "pid": 1, "tid": 2},
            {"name": "compile", "ph": "B", "ts": 5},
            {"name": "compile", "ph": "E", "ts": 10}
        ]"#)
        .unwrap();
        assert_eq!(timeline.start_ts(), 0);
        assert_eq!(timeline.end_ts(), 10);
        assert_eq!(timeline.runtime(), 10);
        assert_eq!(timeline.event_count(), 4);
        let ranges = timeline.events(DisplayType::Range);
        assert_eq!(
            ranges[0],
            TimelineEvent {
                name: "compile".into(),
                group: 1,
                class_name: "fg-2".into(),
                start: 0,
                end: 5,
                dur: 5,
                pid: TrackId::Number(1),
                tid: TrackId::Number(2),
                content: "".into(),
                display_type: DisplayType::Range,
                cat: None,
                args: None,
            }
        );
        assert_eq!((ranges[1].start, ranges[1].end), (5, 10));
        assert!(timeline.events(DisplayType::Point).is_empty());
        assert!(timeline.sub_trace_events().is_empty());
    }

    #[test]
    fn instant_is_a_point() {
        let timeline = jit(r#"[
            {"name": "tracing", "ph": "i", "ts": 3},
            {"name": "compile", "ph": "B", "ts": 0},
            {"name": "compile", "ph": "E", "ts": 8}
        ]"#)
        .unwrap();
        let points = timeline.events(DisplayType::Point);
        assert_eq!(names(points), ["tracing"]);
        assert_eq!((points[0].start, points[0].end, points[0].dur), (3, 3, 0));
        assert_eq!(names(timeline.events(DisplayType::Range)), ["compile"]);
    }

    #[test]
    fn unmatched_end_is_dropped() {
        let timeline = jit(r#"[
            {"name": "compile", "ph": "B", "ts": 0},
            {"name": "tracing", "ph": "E", "ts": 1},
            {"name": "compile", "ph": "E", "ts": 2},
            {"name": "runtime", "ph": "B", "ts": 3}
        ]"#)
        .unwrap();
        assert_eq!(names(timeline.events(DisplayType::Range)), ["compile"]);
        assert_eq!(timeline.event_count(), 4);
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let timeline = jit(r#"[
            {"name": "compile", "ph": "E", "ts": 10},
            {"name": "compile", "ph": "B", "ts": 2}
        ]"#)
        .unwrap();
        let ranges = timeline.events(DisplayType::Range);
        assert_eq!((ranges[0].start, ranges[0].end), (2, 10));
    }

    #[test]
    fn nested_ranges_close_inner_first() {
        let timeline = jit(r#"[
            {"name": "compile", "ph": "B", "ts": 0},
            {"name": "compile_graph", "ph": "B", "ts": 1},
            {"name": "compile_graph", "ph": "E", "ts": 4},
            {"name": "compile", "ph": "E", "ts": 9}
        ]"#)
        .unwrap();
        let ranges = timeline.events(DisplayType::Range);
        assert_eq!(names(ranges), ["compile_graph", "compile"]);
        assert_eq!(ranges[1].dur, 9);
    }

    #[test]
    fn epochs_go_to_the_background() {
        let timeline = jit(r#"[
            {"name": "Epoch", "ph": "B", "ts": 0, "args": {"epoch_id": 1}},
            {"name": "Epoch", "ph": "E", "ts": 100, "args": {"epoch_id": 7, "loss": 0.5}}
        ]"#)
        .unwrap();
        assert!(timeline.events(DisplayType::Range).is_empty());
        let backgrounds = timeline.events(DisplayType::Background);
        assert_eq!(backgrounds.len(), 1);
        assert_eq!(&*backgrounds[0].class_name, "bg-1");
        // End arguments win over Begin arguments
        assert_eq!(&*backgrounds[0].content, "epoch-7");
        assert_eq!(
            backgrounds[0].args,
            json::json!({"epoch_id": 7, "loss": 0.5}).as_object().cloned()
        );
    }

    #[test]
    fn complete_events() {
        let timeline = Timeline::parse(
            r#"{"traceEvents": [
                {"name": "MemcpyHtoD", "ph": "X", "ts": 10, "dur": 5, "cat": "memcpy",
                 "args": {"bytes": 64}},
                {"name": "fill_kernel", "ph": "X", "ts": 0, "dur": 3}
            ]}"#,
            TraceFormat::Kineto,
        )
        .unwrap();
        let x_ranges = timeline.events(DisplayType::XRange);
        assert_eq!(names(x_ranges), ["fill_kernel", "MemcpyHtoD"]);
        assert_eq!((x_ranges[1].start, x_ranges[1].end, x_ranges[1].dur), (10, 15, 5));
        assert_eq!(&*x_ranges[1].content, r#"{"bytes":64}"#);
        assert_eq!(x_ranges[1].cat.as_deref(), Some("memcpy"));
        assert_eq!(timeline.registry().group_name(x_ranges[1].group), "DATA MOV");
    }

    #[test]
    fn complete_event_errors() {
        assert_matches!(
            Timeline::parse(
                r#"{"traceEvents": [{"name": "cudaMalloc", "ph": "X", "ts": 1}]}"#,
                TraceFormat::Kineto
            ),
            Err(TraceParseError::Timeline(TimelineError::MissingDuration(name))) => {
                assert_eq!(&*name, "cudaMalloc")
            }
        );
        assert_matches!(
            Timeline::parse(
                r#"{"traceEvents": [{"name": "cudaMalloc", "ph": "X", "ts": 1, "dur": -4}]}"#,
                TraceFormat::Kineto
            ),
            Err(TraceParseError::Timeline(TimelineError::NegativeDuration { dur: -4, .. }))
        );
    }

    #[test]
    fn overlong_durations() {
        assert_matches!(
            jit(r#"[
                {"name": "compile", "ph": "B", "ts": -9000000000000000000},
                {"name": "compile", "ph": "E", "ts": 9000000000000000000}
            ]"#),
            Err(TraceParseError::Timeline(TimelineError::DurationOverflow { name, start, end })) => {
                assert_eq!(&*name, "compile");
                assert_eq!((start, end), (-9_000_000_000_000_000_000, 9_000_000_000_000_000_000));
            }
        );
        assert_matches!(
            Timeline::parse(
                r#"{"traceEvents": [{"name": "cudaMalloc", "ph": "X",
                                     "ts": 9000000000000000000, "dur": 9000000000000000000}]}"#,
                TraceFormat::Kineto
            ),
            Err(TraceParseError::Timeline(TimelineError::DurationOverflow {
                end: Timestamp::MAX,
                ..
            }))
        );
        assert_matches!(
            jit(r#"[
                {"name": "tracing", "ph": "i", "ts": -9000000000000000000},
                {"name": "tracing", "ph": "i", "ts": 9000000000000000000}
            ]"#),
            Err(TraceParseError::Timeline(TimelineError::TraceTooLong { .. }))
        );

        let far = jit(r#"[
            {"name": "compile", "ph": "B", "ts": 9000000000000000000},
            {"name": "compile", "ph": "E", "ts": 9000000000000000100}
        ]"#)
        .unwrap();
        assert_eq!(far.runtime(), 100);
    }

    #[test]
    fn build_errors() {
        assert_matches!(
            jit(r#"[{"name": "mystery", "ph": "B", "ts": 0}]"#),
            Err(TraceParseError::Timeline(TimelineError::Unclassified(_)))
        );
        assert_matches!(
            jit(r#"[{"name": "process_name", "ph": "M"}]"#),
            Err(TraceParseError::Timeline(TimelineError::EmptyTrace))
        );
        assert_matches!(
            jit("[]"),
            Err(TraceParseError::Timeline(TimelineError::EmptyTrace))
        );
        assert_matches!(
            jit(r#"[{"name": "compile", "ph": "B"}]"#),
            Err(TraceParseError::Timeline(TimelineError::MissingTimestamp(_)))
        );
    }

    #[test]
    fn ignored_phases_do_not_move_bounds() {
        let timeline = jit(r#"[
            {"name": "counter", "ph": "C", "ts": -50},
            {"name": "tracing", "ph": "i", "ts": 7},
            {"name": "tracing", "ph": "i", "ts": 9}
        ]"#)
        .unwrap();
        assert_eq!((timeline.start_ts(), timeline.end_ts()), (7, 9));
        assert_eq!(timeline.event_count(), 2);
    }

    #[test]
    fn runtime_with_sub_trace() {
        let timeline = jit(r#"[
            {"name": "runtime", "ph": "B", "ts": 100, "pid": 3, "tid": 4},
            {"name": "runtime", "ph": "E", "ts": 200, "args": {"traceEvents": [
                {"name": "RT_LOAD", "ph": "B", "ts": 110, "pid": 5, "tid": 6},
                {"name": "RT_LOAD", "ph": "E", "ts": 130, "pid": 5, "tid": 6},
                {"name": "RT_EXEC", "ph": "B", "ts": 130, "pid": 5, "tid": 6},
                {"name": "RT_EXEC", "ph": "E", "ts": 190, "pid": 5, "tid": 6}
            ]}}
        ]"#)
        .unwrap();

        let ranges = timeline.events(DisplayType::Range);
        assert_eq!(names(ranges), ["runtime"]);
        let parent = &ranges[0];
        assert_eq!((parent.start, parent.end), (100, 200));
        assert!(!parent.args.as_ref().unwrap().contains_key("traceEvents"));

        let sub = timeline.sub_trace_events();
        assert_eq!(names(sub), ["RT_SETUP", "RT_LOAD", "RT_EXEC", "RT_TEARDOWN"]);
        let snprof = timeline.registry().group_index("snprof").unwrap();
        for event in sub {
            assert_eq!(event.group, snprof);
            assert_eq!(&*event.class_name, "runtime");
            assert_eq!(event.content, event.name);
            assert_eq!(event.pid, TrackId::Number(5));
        }
        assert_eq!((sub[0].start, sub[0].end, sub[0].dur), (100, 110, 10));
        assert_eq!((sub[3].start, sub[3].end, sub[3].dur), (190, 200, 10));
        let total = sub.iter().map(|event| event.dur).sum::<Duration>();
        assert_le!(total, parent.dur);

        // Sub-trace events do not count as top-level events
        assert_eq!(timeline.event_count(), 2);
        assert_eq!((timeline.start_ts(), timeline.end_ts()), (100, 200));
    }

    #[test]
    fn sub_trace_without_intervals() {
        let timeline = jit(r#"[
            {"name": "runtime", "ph": "B", "ts": 0},
            {"name": "runtime", "ph": "E", "ts": 10, "args": {"traceEvents": [
                {"name": "RT_MARK", "ph": "i", "ts": 5}
            ]}}
        ]"#)
        .unwrap();
        let sub = timeline.sub_trace_events();
        assert_eq!(names(sub), ["RT_MARK"]);
        assert_eq!(sub[0].display_type, DisplayType::Point);
    }

    #[test]
    fn sub_trace_errors() {
        assert_matches!(
            jit(r#"[
                {"name": "runtime", "ph": "B", "ts": 100},
                {"name": "runtime", "ph": "E", "ts": 200, "args": {"traceEvents": [
                    {"name": "RT_LOAD", "ph": "B", "ts": 90},
                    {"name": "RT_LOAD", "ph": "E", "ts": 150}
                ]}}
            ]"#),
            Err(TraceParseError::Timeline(TimelineError::SubTraceOutOfBounds {
                boundary: "RT_SETUP",
                dur: -10,
                ..
            }))
        );
        assert_matches!(
            jit(r#"[
                {"name": "runtime", "ph": "B", "ts": 100},
                {"name": "runtime", "ph": "E", "ts": 200, "args": {"traceEvents": [
                    {"name": "RT_LOAD", "ph": "X", "ts": 150, "dur": 80}
                ]}}
            ]"#),
            Err(TraceParseError::Timeline(TimelineError::SubTraceOutOfBounds {
                boundary: "RT_TEARDOWN",
                dur: -30,
                ..
            }))
        );
        assert_matches!(
            jit(r#"[
                {"name": "runtime", "ph": "B", "ts": 0},
                {"name": "runtime", "ph": "E", "ts": 1, "args": {"traceEvents": 42}}
            ]"#),
            Err(TraceParseError::Timeline(TimelineError::SubTraceNotAnArray { .. }))
        );
        assert_matches!(
            jit(r#"[
                {"name": "runtime", "ph": "B", "ts": 0},
                {"name": "runtime", "ph": "E", "ts": 1, "args": {"traceEvents": [
                    {"name": "RT_LOAD", "ph": "B", "ts": "early"}
                ]}}
            ]"#),
            Err(TraceParseError::Timeline(TimelineError::BadSubTrace { .. }))
        );
    }

    #[test]
    fn sub_trace_only_comes_from_end_events() {
        let timeline = jit(r#"[
            {"name": "runtime", "ph": "B", "ts": 0, "args": {"traceEvents": [
                {"name": "RT_LOAD", "ph": "B", "ts": 1},
                {"name": "RT_LOAD", "ph": "E", "ts": 2}
            ]}},
            {"name": "runtime", "ph": "E", "ts": 10}
        ]"#)
        .unwrap();
        assert!(timeline.sub_trace_events().is_empty());
    }

    #[test]
    fn json_output() {
        let timeline = jit(r#"[{"name": "tracing", "ph": "I", "ts": 3, "cat": "trace",
                                "args": {"hidden": true}}]"#)
        .unwrap();
        assert_eq!(
            json::to_value(&timeline.events(DisplayType::Point)[0]).unwrap(),
            json::json!({
                "name": "tracing",
                "group": 0,
                "className": "fg-1",
                "start": 3,
                "end": 3,
                "dur": 0,
                "pid": 0,
                "tid": 0,
                "content": "",
                "type": "point",
                "cat": "trace"
            })
        );
    }
}
