//! Time-bucketed summary of where time goes

use crate::{
    ctf::{Duration, Timestamp},
    rules::DisplayType,
    timeline::Timeline,
};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Width of the frontend's sliding window, in milliseconds
pub const SLIDING_WINDOW: f64 = 10_000.0;

/// Histogram of the time spent in each group
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    /// One bucket per sample
    pub data: Vec<SummaryBucket>,

    /// Groups that time is accounted to, in rule order
    pub groups: Vec<Box<str>>,

    /// Start timestamp of each bucket
    pub samples: Vec<Timestamp>,

    /// Start of the summarized timeline
    pub start_ts: Timestamp,

    /// End of the summarized timeline
    pub end_ts: Timestamp,

    /// Width of a bucket
    pub ts_width: Duration,

    /// Width of the frontend's sliding window
    pub window: f64,

    /// Largest total duration of a bucket
    #[serde(rename = "maxY")]
    pub max_y: f64,

    /// CSS class of each group
    #[serde(rename = "classNames")]
    pub class_names: BTreeMap<Box<str>, Box<str>>,
}

/// Time spent in each group during one bucket
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryBucket {
    /// Start of the bucket
    pub ts: Timestamp,

    /// Time spent in each group
    #[serde(flatten)]
    pub durations: BTreeMap<Box<str>, f64>,
}
//
impl SummaryBucket {
    /// Time spent in a group
    pub fn duration(&self, group: &str) -> f64 {
        self.durations.get(group).copied().unwrap_or(0.0)
    }

    /// Time spent in all groups
    pub fn total(&self) -> f64 {
        self.durations.values().sum()
    }
}

/// What can go wrong while summarizing a timeline
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum SummaryError {
    /// Asked for a summary with no bucket
    #[error("a summary needs at least one sample")]
    NoSamples,
}

impl Timeline {
    /// Summarize the time spent in each group into `sample_count` buckets
    ///
    /// Ranges and x-ranges are accounted for, as well as backgrounds unless
    /// `exclude_background` is set. Sub-trace events are not, since their
    /// parent interval already covers them.
    pub fn summary(
        &self,
        sample_count: usize,
        exclude_background: bool,
    ) -> Result<Summary, SummaryError> {
        if sample_count == 0 {
            return Err(SummaryError::NoSamples);
        }
        let (start_ts, end_ts) = (self.start_ts(), self.end_ts());
        let ts_width = ceil_div(end_ts - start_ts, sample_count as Duration).max(1);
        let samples = sample_points(start_ts, end_ts, ts_width);
        debug!(
            "Summarizing [{start_ts}, {end_ts}] into {} buckets of {ts_width}us",
            samples.len()
        );

        // Groups which own a rule are the summary columns
        let registry = self.registry();
        let mut column_of_group = vec![None; registry.group_names().len()];
        let groups = registry
            .rules()
            .iter()
            .enumerate()
            .map(|(column, rule)| {
                column_of_group[rule.index()] = Some(column);
                Box::<str>::from(rule.group())
            })
            .collect::<Vec<_>>();

        // Accumulate integer durations, convert at the end
        let mut credits = vec![vec![0 as Duration; groups.len()]; samples.len()];
        let mut display_types = vec![DisplayType::Range, DisplayType::XRange];
        if !exclude_background {
            display_types.push(DisplayType::Background);
        }
        for event in display_types
            .into_iter()
            .flat_map(|display_type| self.events(display_type))
        {
            let Some(column) = column_of_group[event.group] else {
                continue;
            };
            for (bucket, credit) in split_interval(event.start, event.end, &samples) {
                credits[bucket][column] += credit;
            }
        }

        let data = samples
            .iter()
            .zip(credits)
            .map(|(&ts, credits)| SummaryBucket {
                ts,
                durations: groups
                    .iter()
                    .cloned()
                    .zip(credits.into_iter().map(|credit| credit as f64))
                    .collect(),
            })
            .collect::<Vec<_>>();
        let max_y = data.iter().map(SummaryBucket::total).fold(0.0, f64::max);
        let class_names = registry
            .rules()
            .iter()
            .map(|rule| (rule.group().into(), registry.class_name(rule.index()).into()))
            .collect();
        Ok(Summary {
            data,
            groups,
            samples,
            start_ts,
            end_ts,
            ts_width,
            window: SLIDING_WINDOW,
            max_y,
            class_names,
        })
    }
}

/// Integer division rounding toward positive infinity, for positive divisors
fn ceil_div(numerator: Duration, denominator: Duration) -> Duration {
    let quotient = numerator / denominator;
    if numerator % denominator > 0 {
        quotient + 1
    } else {
        quotient
    }
}

/// Bucket start timestamps: `start, start + width, ...` while `< end`
///
/// There is always at least one bucket, even if `start == end`.
fn sample_points(start: Timestamp, end: Timestamp, width: Duration) -> Vec<Timestamp> {
    let mut samples = Vec::new();
    let mut ts = start;
    loop {
        samples.push(ts);
        match ts.checked_add(width) {
            Some(next) if next < end => ts = next,
            _ => break samples,
        }
    }
}

/// Split the interval `[start, end)` into per-bucket durations
///
/// Buckets are defined by their start timestamp in `samples`, which must be
/// sorted and non-empty. A timestamp belongs to the last bucket that starts
/// at or before it. Time before the first bucket is accounted to it, and time
/// past the last bucket start is accounted to the last bucket, so the
/// credited durations always add up to `end - start`.
pub fn split_interval(
    start: Timestamp,
    end: Timestamp,
    samples: &[Timestamp],
) -> Vec<(usize, Duration)> {
    let digitize = |ts: Timestamp| samples.partition_point(|&sample| sample <= ts).max(1);
    let (first, last) = (digitize(start), digitize(end));
    if first >= last {
        return vec![(first - 1, end - start)];
    }

    let mut credits = Vec::with_capacity(last - first + 1);
    let mut running = start;
    for (bucket, &boundary) in samples.iter().enumerate().take(last).skip(first) {
        credits.push((bucket - 1, boundary - running));
        running = boundary;
    }
    credits.push((last - 1, end - running));
    credits
}
