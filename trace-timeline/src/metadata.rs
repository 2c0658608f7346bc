//! Profile metadata and device metrics

use crate::{
    rules::DisplayType,
    timeline::{Timeline, TimelineEvent},
    Timestamp,
};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json as json;
use std::{io, path::Path};
use thiserror::Error;

/// Top-level keys of JIT traces which are not metadata
const JIT_EXCLUDED_KEYS: &[&str] = &["data", "test", "data_list", "description_orig"];

/// Keys of the JIT `test` object which are metadata
const JIT_TEST_KEYS: &[&str] = &["owner", "test list", "arch", "timeout"];

/// Reference quantity which kernel resource usage is expressed against
const KERNEL_RESOURCE_BASE: f64 = 49152.0;

/// Named metadata value
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetadataEntry {
    /// Name of the value
    pub name: Box<str>,

    /// The value itself
    pub key: json::Value,
}
//
impl MetadataEntry {
    fn new(name: &str, key: json::Value) -> Self {
        Self {
            name: name.into(),
            key,
        }
    }
}

/// Extract the metadata of a JIT trace from its top-level object
///
/// The event data must have been removed beforehand.
pub fn jit_profile(top: &json::Map<String, json::Value>) -> Vec<MetadataEntry> {
    let test_entries = top
        .get("test")
        .and_then(json::Value::as_object)
        .into_iter()
        .flatten()
        .filter(|(name, _)| JIT_TEST_KEYS.contains(&name.as_str()));
    let top_entries = top
        .iter()
        .filter(|(name, _)| !JIT_EXCLUDED_KEYS.contains(&name.as_str()));
    let mut entries = test_entries
        .chain(top_entries)
        .map(|(name, key)| MetadataEntry::new(name, key.clone()))
        .collect::<Vec<_>>();
    entries.sort_by_cached_key(|entry| entry.name.to_lowercase());
    entries
}

/// Extract the metadata of a GPU profiler trace from its top-level object
pub fn kineto_profile(top: &json::Map<String, json::Value>) -> Vec<MetadataEntry> {
    let Some(properties) = top
        .get("deviceProperties")
        .and_then(|properties| properties.get(0))
        .and_then(json::Value::as_object)
    else {
        warn!("GPU profile has no device properties");
        return Vec::new();
    };
    properties
        .iter()
        .map(|(name, key)| MetadataEntry::new(name, key.clone()))
        .collect()
}

/// Device utilization over the course of a profile, in percent
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceUtilization {
    /// GPU compute utilization samples
    pub gpu: Vec<f64>,

    /// GPU memory utilization samples
    pub memory: Vec<f64>,
}
//
impl DeviceUtilization {
    /// Load utilization samples from a CSV file
    ///
    /// A missing file means that no metrics were recorded, which is not an
    /// error. Headers are trimmed, as metric tools like to pad them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MetricsError> {
        let mut reader = match csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path.as_ref())
        {
            Err(e) => match e.kind() {
                csv::ErrorKind::Io(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(Self::default())
                }
                _other => return Err(MetricsError::Csv(e)),
            },
            other => other?,
        };

        let mut result = Self::default();
        for record in reader.deserialize() {
            let record: UtilizationRecord = record?;
            result
                .gpu
                .push(parse_percentage("utilization_gpu", &record.gpu)?);
            result
                .memory
                .push(parse_percentage("utilization_memory", &record.memory)?);
        }
        Ok(result)
    }

    /// Express as profile metadata entries
    pub fn into_entries(self) -> [MetadataEntry; 2] {
        [
            MetadataEntry::new("gpuUtilization", self.gpu.into()),
            MetadataEntry::new("memUtilization", self.memory.into()),
        ]
    }
}

/// Row of the device utilization CSV file
#[derive(Debug, Deserialize)]
struct UtilizationRecord {
    #[serde(rename = "utilization_gpu")]
    gpu: Box<str>,
    #[serde(rename = "utilization_memory")]
    memory: Box<str>,
}

/// Parse a value like "35 %"
fn parse_percentage(column: &'static str, value: &str) -> Result<f64, MetricsError> {
    value
        .trim_end_matches('%')
        .trim()
        .parse()
        .map_err(|_| MetricsError::BadValue {
            column,
            value: value.into(),
        })
}

/// Failure to load device metrics
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The CSV data could not be read
    #[error("failed to read device metrics ({0})")]
    Csv(#[from] csv::Error),

    /// A value is not a percentage
    #[error("bad value {value:?} in device metrics column {column:?}")]
    BadValue {
        /// Column where the value was found
        column: &'static str,

        /// The faulty value
        value: Box<str>,
    },
}

/// Statistics aggregated over the GPU kernels of a profile
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KernelStats {
    /// Sum of the estimated achieved occupancy of kernels, in percent
    pub achieved_occupancy: f64,

    /// Sum of the blocks per SM of kernels, relative to the reference
    pub cpu_utilization: f64,

    /// Sum of the shared memory of kernels, relative to the reference
    pub shared_mem_utilization: f64,
}
//
impl KernelStats {
    /// Aggregate over the kernel events of a timeline, if there are any
    pub fn collect<'a>(events: impl IntoIterator<Item = &'a TimelineEvent>) -> Option<Self> {
        let mut kernels = events
            .into_iter()
            .filter(|event| event.cat.as_deref() == Some("kernel"))
            .peekable();
        kernels.peek()?;

        let mut occupancy = 0.0;
        let mut blocks = 0.0;
        let mut shared_memory = 0.0;
        for kernel in kernels {
            occupancy += kernel_arg(kernel, "est. achieved occupancy %");
            blocks += kernel_arg(kernel, "blocks per SM");
            shared_memory += kernel_arg(kernel, "shared memory");
        }
        let relative = |sum: f64| (sum / KERNEL_RESOURCE_BASE * 100.0 * 100.0).round() / 100.0;
        Some(Self {
            achieved_occupancy: occupancy,
            cpu_utilization: relative(blocks),
            shared_mem_utilization: relative(shared_memory),
        })
    }
}

/// Numerical argument of a kernel, or 0 if absent or not a number
fn kernel_arg(kernel: &TimelineEvent, key: &str) -> f64 {
    let Some(value) = kernel.args.as_ref().and_then(|args| args.get(key)) else {
        return 0.0;
    };
    let number = match value {
        json::Value::Number(n) => n.as_f64(),
        json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.unwrap_or_else(|| {
        warn!("Ignoring non-numerical {key:?} value {value} of kernel {:?}", kernel.name);
        0.0
    })
}

/// General information about a profile
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralMetadata {
    /// First timestamp of the profile
    pub timeline_start: Timestamp,

    /// Last timestamp of the profile
    pub timeline_end: Timestamp,

    /// Name of the experiment the profile comes from
    pub selected_experiment: Box<str>,

    /// Kernel occupancy, see [`KernelStats`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achieved_occupancy: Option<f64>,

    /// Kernel blocks per SM, see [`KernelStats`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_utilization: Option<f64>,

    /// Kernel shared memory, see [`KernelStats`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_mem_utilization: Option<f64>,
}

/// Metadata of a profile, as displayed by the frontend
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metadata<'timeline> {
    /// General information
    pub general: GeneralMetadata,

    /// Format-specific metadata
    pub profile: &'timeline [MetadataEntry],
}

impl Timeline {
    /// Metadata of this timeline, for a given experiment name
    pub fn metadata(&self, experiment: &str) -> Metadata<'_> {
        let stats = KernelStats::collect(self.events(DisplayType::XRange));
        Metadata {
            general: GeneralMetadata {
                timeline_start: self.start_ts(),
                timeline_end: self.end_ts(),
                selected_experiment: experiment.into(),
                achieved_occupancy: stats.map(|s| s.achieved_occupancy),
                cpu_utilization: stats.map(|s| s.cpu_utilization),
                shared_mem_utilization: stats.map(|s| s.shared_mem_utilization),
            },
            profile: self.profile(),
        }
    }
}
