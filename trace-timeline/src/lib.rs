//! Visualization-ready timelines from JIT compiler, runtime and GPU profiler
//! traces, with a mechanism to load and parse them.
//!
//! Traces are Chrome Trace Event format documents. Their events are sorted
//! into groups by per-format [rules](RuleRegistry), Begin/End events are
//! paired into intervals, nested runtime sub-traces are expanded, and the
//! resulting [`Timeline`] can then be summarized into time buckets or rolled
//! up into per-event and per-group durations.

#![deny(missing_docs)]

pub mod classify;
pub mod ctf;
pub mod datasets;
pub mod format;
pub mod metadata;
pub mod pairing;
pub mod rollup;
pub mod rules;
pub mod summary;
pub mod timeline;
pub mod view;

use serde_json as json;
use std::io;
use thiserror::Error;

// Reexport types which appear in most use cases
pub use self::{
    ctf::{Duration, Timestamp, TrackId},
    datasets::{DatasetError, Datasets},
    format::TraceFormat,
    metadata::{Metadata, MetadataEntry, MetricsError},
    rollup::{EventRollup, GroupRollup, RollupFilter},
    rules::{DisplayType, GroupIndex, RuleError, RuleRegistry},
    summary::{Summary, SummaryBucket, SummaryError},
    timeline::{Timeline, TimelineError, TimelineEvent},
    view::{TimelineView, VisGroup},
};

/// What can go wrong while loading a trace from a file
#[derive(Debug, Error)]
pub enum TraceLoadError {
    /// Failed to load data from the file
    #[error("failed to load trace from file ({0})")]
    Io(#[from] io::Error),

    /// Failed to parse data from the file
    #[error("failed to parse trace ({0})")]
    Parse(#[from] TraceParseError),

    /// Failed to load the device metrics recorded next to the trace
    #[error("failed to load device metrics ({0})")]
    Metrics(#[from] MetricsError),
}

/// What can go wrong while parsing a trace from a string
#[derive(Debug, Error)]
pub enum TraceParseError {
    /// Failed to parse data as JSON
    #[error("failed to parse data as JSON ({0})")]
    Json(#[from] json::Error),

    /// The grouping rules of the requested format are broken
    #[error("failed to compile grouping rules ({0})")]
    Rules(#[from] RuleError),

    /// The document is not a JSON object
    #[error("expected a JSON object at the top of the trace")]
    NotAnObject,

    /// A key required by the trace format is missing
    #[error("missing field `{key}`, is this really a {format} trace?")]
    MissingKey {
        /// Format that was requested
        format: TraceFormat,

        /// Path of the missing key
        key: &'static str,
    },

    /// The event list is not a JSON array
    #[error("field `{0}` should be an array of events")]
    NotAnArray(&'static str),

    /// An event record could not be decoded
    #[error("failed to decode events ({0})")]
    BadEvent(#[from] ctf::BadEvent),

    /// Events could not be assembled into a timeline
    #[error("failed to build timeline ({0})")]
    Timeline(#[from] TimelineError),
}
