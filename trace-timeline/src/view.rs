//! Timeline data as laid out for the visualization frontend

use crate::{
    ctf::Timestamp,
    rules::{DisplayType, GroupIndex, Rule},
    timeline::{Timeline, TimelineEvent},
};
use serde::Serialize;
use std::collections::BTreeSet;

/// Timeline lane
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisGroup {
    /// Group index
    pub id: GroupIndex,

    /// Group name
    pub content: Box<str>,

    /// Lane ordering key
    pub value: GroupIndex,

    /// Lanes nested under this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested_groups: Option<Vec<GroupIndex>>,

    /// Depth in the lane tree, for groups which take part in nesting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_level: Option<u8>,

    /// Truth that nested lanes are expanded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_nested: Option<bool>,
}

/// Full timeline, or a time window of it
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineView<'timeline> {
    /// Lanes
    pub groups: Vec<VisGroup>,

    /// Events starting within the window
    pub events: Vec<&'timeline TimelineEvent>,

    /// Start of the window
    pub start_ts: Timestamp,

    /// End of the window
    pub end_ts: Timestamp,
}

impl Timeline {
    /// Lanes for all groups which have events, in display order
    ///
    /// Groups whose intervals carry sub-traces get the sub-trace group
    /// nested under them, collapsed.
    pub fn groups(&self) -> Vec<VisGroup> {
        let present = self
            .top_level_events()
            .chain(self.sub_trace_events())
            .map(|event| event.group)
            .collect::<BTreeSet<_>>();
        let registry = self.registry();
        present
            .iter()
            .map(|&id| {
                let mut group = VisGroup {
                    id,
                    content: registry.group_name(id).into(),
                    value: id,
                    nested_groups: None,
                    tree_level: None,
                    show_nested: None,
                };
                if let Some(nested) = registry.rule_of_group(id).and_then(Rule::nested) {
                    if present.contains(&nested.sub_group()) {
                        group.nested_groups = Some(vec![nested.sub_group()]);
                        group.tree_level = Some(1);
                        group.show_nested = Some(false);
                    }
                } else if registry
                    .rules()
                    .iter()
                    .filter_map(Rule::nested)
                    .any(|nested| nested.sub_group() == id)
                {
                    group.tree_level = Some(2);
                }
                group
            })
            .collect()
    }

    /// Top-level events starting within `[start, end]`
    pub fn window(
        &self,
        start: Timestamp,
        end: Timestamp,
        exclude_background: bool,
    ) -> Vec<&TimelineEvent> {
        self.top_level_events()
            .filter(|event| !(exclude_background && event.display_type == DisplayType::Background))
            .filter(|event| (start..=end).contains(&event.start))
            .collect()
    }

    /// Lanes and events, optionally restricted to a time window
    ///
    /// Missing window bounds default to the bounds of the timeline.
    pub fn timeline_view(
        &self,
        window_start: Option<Timestamp>,
        window_end: Option<Timestamp>,
    ) -> TimelineView<'_> {
        let start_ts = window_start.unwrap_or(self.start_ts());
        let end_ts = window_end.unwrap_or(self.end_ts());
        TimelineView {
            groups: self.groups(),
            events: self
                .top_level_events()
                .chain(self.sub_trace_events())
                .filter(|event| (start_ts..=end_ts).contains(&event.start))
                .collect(),
            start_ts,
            end_ts,
        }
    }
}
