//! Directory of experiment traces

use crate::{
    ctf::Duration,
    format::TraceFormat,
    metadata::Metadata,
    summary::{Summary, SummaryError},
    timeline::Timeline,
    TraceLoadError,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Set of experiments, one trace file each, with at most one of them active
#[derive(Clone, Debug)]
pub struct Datasets {
    /// Directory where traces were loaded from
    dir: PathBuf,

    /// Format of the traces
    format: TraceFormat,

    /// Timeline of each experiment, keyed by file name
    timelines: BTreeMap<Box<str>, Timeline>,

    /// Experiment that was last selected
    active: Option<Box<str>>,
}
//
impl Datasets {
    /// Load every JSON trace of a directory
    pub fn open(dir: impl AsRef<Path>, format: TraceFormat) -> Result<Self, DatasetError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(DatasetError::NotADirectory(dir.into()));
        }

        let mut traces = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() || path.extension() != Some(OsStr::new("json")) {
                debug!("Skipping {}", path.display());
                continue;
            }
            let Ok(experiment) = entry.file_name().into_string() else {
                warn!("Skipping {} which has a non-Unicode name", path.display());
                continue;
            };
            traces.push((experiment, path));
        }
        traces.sort_unstable();

        let mut timelines = BTreeMap::new();
        for (experiment, path) in traces {
            let timeline = Timeline::from_file(&path, format).map_err(|source| {
                DatasetError::Load {
                    experiment: experiment.clone().into(),
                    source,
                }
            })?;
            timelines.insert(experiment.into_boxed_str(), timeline);
        }

        info!("Loaded {} {format} profiles from {}", timelines.len(), dir.display());
        for (experiment, timeline) in &timelines {
            info!("- {experiment} ({} events)", timeline.event_count());
        }
        Ok(Self {
            dir: dir.into(),
            format,
            timelines,
            active: None,
        })
    }

    /// Directory where traces were loaded from
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Format of the traces
    pub fn format(&self) -> TraceFormat {
        self.format
    }

    /// Experiment names, in file name order
    pub fn experiments(&self) -> impl Iterator<Item = &str> + Clone {
        self.timelines.keys().map(|name| &**name)
    }

    /// Timeline of an experiment
    pub fn timeline(&self, experiment: &str) -> Option<&Timeline> {
        self.timelines.get(experiment)
    }

    /// Experiment names, largest event count first
    pub fn experiments_by_event_count(&self) -> Vec<&str> {
        self.sorted_experiments(|timeline| timeline.event_count() as i64)
    }

    /// Experiment names, latest start first
    pub fn experiments_by_start(&self) -> Vec<&str> {
        self.sorted_experiments(Timeline::start_ts)
    }

    /// Experiment names, in decreasing key order, ties in file name order
    fn sorted_experiments(&self, key: impl Fn(&Timeline) -> i64) -> Vec<&str> {
        let mut experiments = self
            .timelines
            .iter()
            .map(|(name, timeline)| (&**name, key(timeline)))
            .collect::<Vec<_>>();
        experiments.sort_by(|a, b| b.1.cmp(&a.1));
        experiments.into_iter().map(|(name, _)| name).collect()
    }

    /// Make an experiment active and get its metadata
    ///
    /// If the experiment does not exist, the active experiment is left
    /// unchanged.
    pub fn select(&mut self, experiment: &str) -> Result<Metadata<'_>, DatasetError> {
        let Some((name, timeline)) = self.timelines.get_key_value(experiment) else {
            return Err(DatasetError::UnknownExperiment(experiment.into()));
        };
        debug!("Selected experiment {name}");
        self.active = Some(name.clone());
        Ok(timeline.metadata(experiment))
    }

    /// Active experiment, if any
    pub fn active(&self) -> Option<(&str, &Timeline)> {
        let name = self.active.as_deref()?;
        Some((name, self.timelines.get(name)?))
    }

    /// Summaries of all experiments, along with their runtime range
    pub fn ensemble(&self, sample_count: usize) -> Result<Ensemble<'_>, SummaryError> {
        let summaries = self
            .timelines
            .iter()
            .map(|(name, timeline)| Ok((&**name, timeline.summary(sample_count, true)?)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        let runtimes = self.timelines.values().map(Timeline::runtime);
        Ok(Ensemble {
            summaries,
            min_runtime: runtimes.clone().min(),
            max_runtime: runtimes.max(),
        })
    }
}

/// Summaries of a set of experiments
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ensemble<'datasets> {
    /// Summary of each experiment
    pub summaries: BTreeMap<&'datasets str, Summary>,

    /// Shortest experiment runtime
    pub min_runtime: Option<Duration>,

    /// Longest experiment runtime
    pub max_runtime: Option<Duration>,
}

/// What can go wrong while handling experiments
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The path to the experiments is not a directory
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Failed to list the experiments
    #[error("failed to list experiments ({0})")]
    Io(#[from] io::Error),

    /// Failed to load an experiment
    #[error("failed to load experiment {experiment} ({source})")]
    Load {
        /// Name of the experiment
        experiment: Box<str>,

        /// Load error
        source: TraceLoadError,
    },

    /// Asked for an experiment that does not exist
    #[error("no experiment named {0:?}")]
    UnknownExperiment(Box<str>),
}
