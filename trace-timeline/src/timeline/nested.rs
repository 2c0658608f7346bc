//! Expansion of the sub-traces that runtime intervals carry

use super::{build_level, TimelineError, TimelineEvent};
use crate::{
    ctf::{self, Timestamp},
    rules::{DisplayType, NestedTrace, RuleRegistry},
};
use log::debug;
use serde_json as json;

/// Synthetic event covering the time between parent start and first child
pub const SETUP: &str = "RT_SETUP";

/// Synthetic event covering the time between last child and parent end
pub const TEARDOWN: &str = "RT_TEARDOWN";

/// Turn the sub-trace carried by `parent` into sub-group events
///
/// Sub-trace events are classified and paired like top-level events, then
/// moved to the sub-group, labeled after the parent's group. If the sub-trace
/// contains intervals, setup and teardown events are added to account for the
/// parent time they do not cover. Sub-traces of sub-traces are not expanded.
pub(super) fn expand(
    parent: &TimelineEvent,
    sub_trace: json::Value,
    nested: &NestedTrace,
    registry: &RuleRegistry,
) -> Result<Vec<TimelineEvent>, TimelineError> {
    let json::Value::Array(values) = sub_trace else {
        return Err(TimelineError::SubTraceNotAnArray {
            parent: parent.name.clone(),
        });
    };
    let events = ctf::parse_events(values).map_err(|source| TimelineError::BadSubTrace {
        parent: parent.name.clone(),
        source,
    })?;
    let level = build_level(&events, registry, false)?;

    let class_name: Box<str> = registry.group_name(parent.group).into();
    let mut children = level.events.into_iter().flatten().collect::<Vec<_>>();
    for child in &mut children {
        child.group = nested.sub_group();
        child.class_name = class_name.clone();
        child.content = nested.content().format(&child.name, child.args.as_ref());
    }

    let mut intervals = children
        .iter()
        .filter(|child| child.display_type != DisplayType::Point);
    let Some(first) = intervals.next() else {
        debug!(
            "Sub-trace of {:?} at {} has no interval, not adding {SETUP}/{TEARDOWN}",
            parent.name, parent.start
        );
        return Ok(children);
    };
    let (first_start, last_end) = intervals.fold((first.start, first.end), |(start, end), child| {
        (start.min(child.start), end.max(child.end))
    });

    let setup = boundary(SETUP, parent.start, first_start, parent, first)?;
    let teardown = boundary(TEARDOWN, last_end, parent.end, parent, first)?;
    children.insert(0, setup);
    children.push(teardown);
    Ok(children)
}

/// Build a setup or teardown event
///
/// `template` provides the group and tracks of the new event.
fn boundary(
    name: &'static str,
    start: Timestamp,
    end: Timestamp,
    parent: &TimelineEvent,
    template: &TimelineEvent,
) -> Result<TimelineEvent, TimelineError> {
    let dur = end
        .checked_sub(start)
        .ok_or_else(|| TimelineError::DurationOverflow {
            name: name.into(),
            start,
            end,
        })?;
    if dur < 0 {
        return Err(TimelineError::SubTraceOutOfBounds {
            parent: parent.name.clone(),
            boundary: name,
            dur,
        });
    }
    Ok(TimelineEvent {
        name: name.into(),
        group: template.group,
        class_name: template.class_name.clone(),
        start,
        end,
        dur,
        pid: template.pid.clone(),
        tid: template.tid.clone(),
        content: name.into(),
        display_type: DisplayType::Range,
        cat: None,
        args: None,
    })
}
