//! Trace formats and the way their documents are laid out

use crate::{
    ctf::{self, TraceEvent},
    metadata::{self, DeviceUtilization, MetadataEntry},
    rules::RuleRegistry,
    TraceLoadError, TraceParseError,
};
use log::{debug, info};
use serde_json as json;
use std::{fs::File, io::Read, path::Path};

/// Name of the device metrics file which GPU profilers write next to traces
pub const DEVICE_METRICS_FILE: &str = "gpu_utilization.csv";

/// Supported trace formats
#[derive(
    Clone, Copy, Debug, Default, strum::Display, strum::EnumString, Eq, Hash, PartialEq,
)]
#[strum(ascii_case_insensitive)]
pub enum TraceFormat {
    /// JIT compiler and runtime trace, wrapped in a `data` object next to
    /// test metadata
    #[default]
    #[strum(serialize = "JIT")]
    Jit,

    /// Bare runtime profiler trace
    #[strum(serialize = "SNPROF")]
    Snprof,

    /// GPU profiler (kineto) trace, with device properties
    #[strum(serialize = "KINETO")]
    Kineto,
}

/// Trace that was loaded, but not yet assembled into a timeline
#[derive(Clone, Debug)]
pub struct LoadedTrace {
    /// Grouping rules of the trace format
    pub registry: RuleRegistry,

    /// Events with a phase that timelines care about, in input order
    pub events: Vec<TraceEvent>,

    /// Profile metadata
    pub profile: Vec<MetadataEntry>,
}

/// Load a trace from a file
///
/// GPU profiler traces additionally pick up the device utilization metrics
/// that may sit next to them.
pub fn load(path: impl AsRef<Path>, format: TraceFormat) -> Result<LoadedTrace, TraceLoadError> {
    let path = path.as_ref();
    let mut document = String::new();
    File::open(path)?.read_to_string(&mut document)?;
    let mut trace = parse(&document, format)?;
    if format == TraceFormat::Kineto {
        let utilization = DeviceUtilization::load(path.with_file_name(DEVICE_METRICS_FILE))?;
        trace.profile.extend(utilization.into_entries());
    }
    info!(
        "Loaded {} {format} events from {}",
        trace.events.len(),
        path.display()
    );
    Ok(trace)
}

/// Parse a trace document
pub fn parse(s: &str, format: TraceFormat) -> Result<LoadedTrace, TraceParseError> {
    let registry = RuleRegistry::for_format(format)?;
    let json::Value::Object(mut top) = json::from_str::<json::Value>(s)? else {
        return Err(TraceParseError::NotAnObject);
    };

    let (raw_events, profile) = match format {
        TraceFormat::Jit => {
            let Some(json::Value::Object(mut data)) = top.remove("data") else {
                return Err(TraceParseError::MissingKey { format, key: "data" });
            };
            let events = take_events(&mut data, format, "data.traceEvents")?;
            (events, metadata::jit_profile(&top))
        }
        TraceFormat::Snprof => (take_events(&mut top, format, "traceEvents")?, Vec::new()),
        TraceFormat::Kineto => {
            let events = take_events(&mut top, format, "traceEvents")?;
            (events, metadata::kineto_profile(&top))
        }
    };

    let total = raw_events.len();
    let events = ctf::parse_events(raw_events)?
        .into_iter()
        .filter(|event| event.phase().is_some())
        .collect::<Vec<_>>();
    if events.len() < total {
        debug!(
            "Dropped {} of {total} records with a phase timelines do not use",
            total - events.len()
        );
    }
    Ok(LoadedTrace {
        registry,
        events,
        profile,
    })
}

/// Extract the event array from a JSON object
///
/// `path` is the full path of the array, whose last component is the key
/// that is looked up in `object`.
fn take_events(
    object: &mut json::Map<String, json::Value>,
    format: TraceFormat,
    path: &'static str,
) -> Result<Vec<json::Value>, TraceParseError> {
    let key = path.rsplit('.').next().unwrap_or(path);
    match object.remove(key) {
        Some(json::Value::Array(events)) => Ok(events),
        Some(_) => Err(TraceParseError::NotAnArray(path)),
        None => Err(TraceParseError::MissingKey { format, key: path }),
    }
}
