//! Visualization-ready timelines from JIT, runtime and GPU profiler traces

#![deny(missing_docs)]

use clap::{Parser, Subcommand, ValueEnum};
use log::error;
use serde::Serialize;
use serde_json as json;
use std::{
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};
use thiserror::Error;
use trace_timeline::{
    DatasetError, Datasets, DisplayType, RollupFilter, SummaryError, Timeline, Timestamp,
    TraceFormat, TraceLoadError,
};

/// Turn profiler traces into the documents of a timeline visualization
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Format of the traces (JIT, SNPROF or KINETO)
    #[clap(short, long, default_value = "JIT")]
    format: TraceFormat,

    /// Log what happens during trace processing in more detail
    #[clap(short, long)]
    verbose: bool,

    /// Indent the JSON output
    #[clap(short, long)]
    pretty: bool,

    /// What should be done
    #[clap(subcommand)]
    command: Command,
}

/// Operations on traces
#[derive(Debug, Subcommand)]
enum Command {
    /// General and format-specific metadata of a trace
    Metadata {
        /// Trace file
        input: PathBuf,
    },

    /// Lanes and events of a trace, optionally restricted to a time window
    Timeline {
        /// Trace file
        input: PathBuf,

        /// Start of the time window (default: start of the trace)
        #[clap(long)]
        window_start: Option<Timestamp>,

        /// End of the time window (default: end of the trace)
        #[clap(long)]
        window_end: Option<Timestamp>,
    },

    /// Time spent in each group, over buckets of equal width
    Summary {
        /// Trace file
        input: PathBuf,

        /// Number of buckets
        #[clap(short, long, default_value = "100")]
        samples: usize,

        /// Account for background events (epochs and the like)
        #[clap(long)]
        include_background: bool,
    },

    /// Total duration of each group, longest first
    Groups {
        /// Trace file
        input: PathBuf,

        /// Event selection
        #[clap(flatten)]
        filter: FilterArgs,
    },

    /// Total duration of each event, longest first
    Events {
        /// Trace file
        input: PathBuf,

        /// Event selection
        #[clap(flatten)]
        filter: FilterArgs,
    },

    /// Experiments of a trace directory
    Experiments {
        /// Directory holding one trace per experiment
        dir: PathBuf,

        /// Order in which experiments are listed
        #[clap(long, value_enum, default_value_t = ExperimentOrder::Name)]
        sort: ExperimentOrder,
    },

    /// Summaries of all experiments of a trace directory
    Ensemble {
        /// Directory holding one trace per experiment
        dir: PathBuf,

        /// Number of buckets per summary
        #[clap(short, long, default_value = "100")]
        samples: usize,
    },
}

/// Selection of the events that rollups account for
#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Only account for events from this group (can be repeated)
    #[clap(short, long = "group")]
    groups: Vec<String>,

    /// Also account for events from nested sub-traces
    #[clap(long)]
    include_sub_traces: bool,

    /// Also account for background events
    #[clap(long)]
    include_background: bool,
}
//
impl From<FilterArgs> for RollupFilter {
    fn from(args: FilterArgs) -> Self {
        let mut filter = RollupFilter {
            groups: args.groups.into_iter().map(String::into_boxed_str).collect(),
            include_sub_traces: args.include_sub_traces,
            ..RollupFilter::default()
        };
        if args.include_background {
            filter.display_types.push(DisplayType::Background);
        }
        filter
    }
}

/// Experiment listing order
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum ExperimentOrder {
    /// By file name
    Name,

    /// Most events first
    EventCount,

    /// Latest start first
    Start,
}

/// Experiment listing entry
#[derive(Debug, Serialize)]
struct ExperimentInfo<'a> {
    name: &'a str,
    event_count: usize,
    start_ts: Timestamp,
    end_ts: Timestamp,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    match run(args, io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Execute a command, writing its JSON output to `output`
fn run(args: Args, output: impl Write) -> Result<(), CliError> {
    let format = args.format;
    let mut output = BufWriter::new(output);
    match args.command {
        Command::Metadata { input } => {
            let timeline = Timeline::from_file(&input, format)?;
            write_json(&mut output, &timeline.metadata(&experiment_name(&input)), args.pretty)?;
        }
        Command::Timeline {
            input,
            window_start,
            window_end,
        } => {
            let timeline = Timeline::from_file(&input, format)?;
            write_json(
                &mut output,
                &timeline.timeline_view(window_start, window_end),
                args.pretty,
            )?;
        }
        Command::Summary {
            input,
            samples,
            include_background,
        } => {
            let timeline = Timeline::from_file(&input, format)?;
            let summary = timeline.summary(samples, !include_background)?;
            write_json(&mut output, &summary, args.pretty)?;
        }
        Command::Groups { input, filter } => {
            let timeline = Timeline::from_file(&input, format)?;
            write_json(&mut output, &timeline.group_rollup(&filter.into()), args.pretty)?;
        }
        Command::Events { input, filter } => {
            let timeline = Timeline::from_file(&input, format)?;
            write_json(&mut output, &timeline.event_rollup(&filter.into()), args.pretty)?;
        }
        Command::Experiments { dir, sort } => {
            let datasets = Datasets::open(&dir, format)?;
            let names = match sort {
                ExperimentOrder::Name => datasets.experiments().collect(),
                ExperimentOrder::EventCount => datasets.experiments_by_event_count(),
                ExperimentOrder::Start => datasets.experiments_by_start(),
            };
            let experiments = names
                .into_iter()
                .filter_map(|name| {
                    let timeline = datasets.timeline(name)?;
                    Some(ExperimentInfo {
                        name,
                        event_count: timeline.event_count(),
                        start_ts: timeline.start_ts(),
                        end_ts: timeline.end_ts(),
                    })
                })
                .collect::<Vec<_>>();
            write_json(&mut output, &experiments, args.pretty)?;
        }
        Command::Ensemble { dir, samples } => {
            let datasets = Datasets::open(&dir, format)?;
            write_json(&mut output, &datasets.ensemble(samples)?, args.pretty)?;
        }
    }
    output.flush()?;
    Ok(())
}

/// Name under which a trace file is reported
fn experiment_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Write a JSON document, followed by a newline
fn write_json(mut output: impl Write, value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        json::to_writer_pretty(&mut output, value)?;
    } else {
        json::to_writer(&mut output, value)?;
    }
    writeln!(output)?;
    Ok(())
}

/// What can go wrong while running a command
#[derive(Debug, Error)]
enum CliError {
    /// Failed to load a trace
    #[error("{0}")]
    Load(#[from] TraceLoadError),

    /// Failed to load a trace directory
    #[error("{0}")]
    Dataset(#[from] DatasetError),

    /// Failed to summarize a trace
    #[error("{0}")]
    Summary(#[from] SummaryError),

    /// Failed to serialize the output
    #[error("failed to serialize output ({0})")]
    Json(#[from] json::Error),

    /// Failed to write the output
    #[error("failed to write output ({0})")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;

    const TRACE: &str = r#"{"traceEvents": [
        {"name": "RT_LOAD", "ph": "B", "ts": 0},
        {"name": "RT_LOAD", "ph": "E", "ts": 30},
        {"name": "SN_EXEC", "ph": "B", "ts": 30},
        {"name": "SN_EXEC", "ph": "E", "ts": 100}
    ]}"#;

    fn run_args(args: &[&str]) -> Result<json::Value, CliError> {
        let args = Args::try_parse_from(args).expect("Test arguments should be valid");
        let mut output = Vec::new();
        run(args, &mut output)?;
        Ok(json::from_slice(&output).expect("Output should be JSON"))
    }

    #[test]
    fn single_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exp.json");
        fs::write(&path, TRACE).unwrap();
        let path = path.to_str().unwrap();

        let metadata = run_args(&["novavis", "-f", "snprof", "metadata", path]).unwrap();
        assert_eq!(metadata["general"]["selectedExperiment"], json::json!("exp.json"));
        assert_eq!(metadata["general"]["timelineEnd"], json::json!(100));

        let summary =
            run_args(&["novavis", "--format", "SNPROF", "summary", "-s", "2", path]).unwrap();
        assert_eq!(summary["samples"], json::json!([0, 50]));
        assert_eq!(summary["data"][0]["RT"], json::json!(30.0));
        assert_eq!(summary["data"][0]["SN"], json::json!(20.0));

        let events = run_args(&["novavis", "-f", "snprof", "events", "-g", "SN", path]).unwrap();
        assert_eq!(
            events,
            json::json!([{"event": "SN_EXEC", "dur": 70, "group": 1, "class_name": "fg-2"}])
        );

        let timeline = run_args(&[
            "novavis",
            "-f",
            "snprof",
            "timeline",
            "--window-start",
            "10",
            path,
        ])
        .unwrap();
        assert_eq!(timeline["events"].as_array().map(Vec::len), Some(1));
        assert_eq!(timeline["start_ts"], json::json!(10));
    }

    #[test]
    fn trace_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), TRACE).unwrap();
        fs::write(
            dir.path().join("b.json"),
            r#"{"traceEvents": [{"name": "FE_PARSE", "ph": "i", "ts": 500}]}"#,
        )
        .unwrap();
        let dir = dir.path().to_str().unwrap();

        let experiments = run_args(&[
            "novavis",
            "-f",
            "snprof",
            "experiments",
            "--sort",
            "event-count",
            dir,
        ])
        .unwrap();
        assert_eq!(experiments[0]["name"], json::json!("a.json"));
        assert_eq!(experiments[1]["start_ts"], json::json!(500));

        let ensemble = run_args(&["novavis", "-f", "snprof", "ensemble", dir]).unwrap();
        assert_eq!(ensemble["min_runtime"], json::json!(0));
        assert_eq!(ensemble["max_runtime"], json::json!(100));
    }

    #[test]
    fn errors() {
        assert_matches!(
            run_args(&["novavis", "metadata", "/nonexistent/trace.json"]),
            Err(CliError::Load(TraceLoadError::Io(_)))
        );
        assert_matches!(
            run_args(&["novavis", "ensemble", "/nonexistent"]),
            Err(CliError::Dataset(DatasetError::NotADirectory(_)))
        );
        assert!(Args::try_parse_from(["novavis", "-f", "perfetto", "metadata", "x"]).is_err());
    }
}
