//! Total durations per event name and per group

use crate::{
    ctf::Duration,
    rules::{DisplayType, GroupIndex},
    timeline::{Timeline, TimelineEvent},
};
use serde::Serialize;
use std::collections::{hash_map::Entry, HashMap};

/// Selection of the events that a rollup accounts for
#[derive(Clone, Debug, PartialEq)]
pub struct RollupFilter {
    /// Display types of top-level events to consider
    pub display_types: Vec<DisplayType>,

    /// Names of the groups to consider, all of them if empty
    pub groups: Vec<Box<str>>,

    /// Truth that events from nested sub-traces should be considered
    pub include_sub_traces: bool,
}
//
impl Default for RollupFilter {
    fn default() -> Self {
        Self {
            display_types: vec![DisplayType::Point, DisplayType::Range, DisplayType::XRange],
            groups: Vec::new(),
            include_sub_traces: false,
        }
    }
}

/// Total duration of all events with a given name
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventRollup {
    /// Event name
    pub event: Box<str>,

    /// Total duration
    pub dur: Duration,

    /// Group index, the sub-trace group if the name appears in sub-traces
    pub group: GroupIndex,

    /// CSS class of the group
    pub class_name: Box<str>,
}

/// Total duration of all events from a group
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupRollup {
    /// Upper-cased group name, for display
    pub event: Box<str>,

    /// Total duration
    pub dur: Duration,

    /// Group name
    pub group: Box<str>,

    /// CSS class of the group
    pub class_name: Box<str>,
}

impl Timeline {
    /// Total duration of each event name, longest first
    ///
    /// Events with the same name are accounted together wherever they come
    /// from. A name which appears in sub-traces is reported in the sub-trace
    /// group, even if top-level events with that name also contributed.
    ///
    /// Entries with equal durations stay in the order where they were first
    /// encountered.
    pub fn event_rollup(&self, filter: &RollupFilter) -> Vec<EventRollup> {
        let registry = self.registry();
        let mut rollup = Vec::<EventRollup>::new();
        let mut positions = HashMap::<&str, usize>::new();
        for event in self.rollup_events(filter) {
            match positions.entry(&*event.name) {
                Entry::Occupied(o) => {
                    let entry = &mut rollup[*o.get()];
                    entry.dur += event.dur;
                    // Top-level names always map to the same group, and
                    // sub-trace events come after them
                    if entry.group != event.group {
                        entry.group = event.group;
                        entry.class_name = registry.class_name(event.group).into();
                    }
                }
                Entry::Vacant(v) => {
                    v.insert(rollup.len());
                    rollup.push(EventRollup {
                        event: event.name.clone(),
                        dur: event.dur,
                        group: event.group,
                        class_name: registry.class_name(event.group).into(),
                    });
                }
            }
        }
        rollup.sort_by(|a, b| b.dur.cmp(&a.dur));
        rollup
    }

    /// Total duration of each group, longest first
    ///
    /// Entries with equal durations stay in the order where they were first
    /// encountered.
    pub fn group_rollup(&self, filter: &RollupFilter) -> Vec<GroupRollup> {
        let mut rollup = Vec::<GroupRollup>::new();
        let mut positions = HashMap::<GroupIndex, usize>::new();
        for event in self.rollup_events(filter) {
            match positions.entry(event.group) {
                Entry::Occupied(o) => rollup[*o.get()].dur += event.dur,
                Entry::Vacant(v) => {
                    v.insert(rollup.len());
                    let group = self.registry().group_name(event.group);
                    rollup.push(GroupRollup {
                        event: group.to_uppercase().into(),
                        dur: event.dur,
                        group: group.into(),
                        class_name: self.registry().class_name(event.group).into(),
                    });
                }
            }
        }
        rollup.sort_by(|a, b| b.dur.cmp(&a.dur));
        rollup
    }

    /// Events selected by a rollup filter, top-level events first
    fn rollup_events<'a>(
        &'a self,
        filter: &'a RollupFilter,
    ) -> impl Iterator<Item = &'a TimelineEvent> + 'a {
        let top_level = DisplayType::ALL
            .into_iter()
            .filter(move |display_type| filter.display_types.contains(display_type))
            .flat_map(move |display_type| self.events(display_type));
        let sub_traces = if filter.include_sub_traces {
            self.sub_trace_events()
        } else {
            &[]
        };
        top_level.chain(sub_traces).filter(move |event| {
            filter.groups.is_empty()
                || filter
                    .groups
                    .iter()
                    .any(|group| **group == *self.registry().group_name(event.group))
        })
    }
}
