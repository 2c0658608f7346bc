//! Grouping rules for the supported trace formats
//!
//! A rule maps event names (through regexes) to a semantic group, tells how
//! events of that group are displayed and summarized, and optionally tells
//! where to find a nested sub-trace. Rules are plain static tables, compiled
//! once into an immutable [`RuleRegistry`] when a trace is loaded.

use crate::{ctf::EventArgs, format::TraceFormat};
use regex::Regex;
use serde::Serialize;
use serde_json as json;
use thiserror::Error;

/// Position of a group in the registry's display ordering
pub type GroupIndex = usize;

/// How an event is drawn by the frontend
#[derive(Clone, Copy, Debug, strum::Display, Eq, Hash, PartialEq, Serialize)]
pub enum DisplayType {
    /// Something that happened at one point in time
    #[serde(rename = "point")]
    #[strum(serialize = "point")]
    Point,

    /// Interval reconstructed from a Begin/End pair
    #[serde(rename = "range")]
    #[strum(serialize = "range")]
    Range,

    /// Interval drawn behind the other lanes (epochs and the like)
    #[serde(rename = "background")]
    #[strum(serialize = "background")]
    Background,

    /// Interval recorded as a single complete event
    #[serde(rename = "x-range")]
    #[strum(serialize = "x-range")]
    XRange,
}
//
impl DisplayType {
    /// All display types, in the order collections are laid out
    pub const ALL: [DisplayType; 4] = [Self::Point, Self::Range, Self::Background, Self::XRange];
}

/// Strategy used to compute the `content` label of an event
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentFormatter {
    /// No label
    Empty,

    /// The event's own name
    EventName,

    /// `epoch-<args.epoch_id>`, or nothing if there is no epoch ID
    EpochId,

    /// Compact JSON rendering of the event arguments
    Args,
}
//
impl ContentFormatter {
    /// Compute the label of an event
    pub fn format(self, name: &str, args: Option<&EventArgs>) -> Box<str> {
        match self {
            Self::Empty => "".into(),
            Self::EventName => name.into(),
            Self::EpochId => match args.and_then(|args| args.get("epoch_id")) {
                Some(json::Value::String(id)) => format!("epoch-{id}").into(),
                Some(id) => format!("epoch-{id}").into(),
                None => "".into(),
            },
            Self::Args => args
                .map(|args| json::to_string(args).unwrap_or_default())
                .unwrap_or_default()
                .into(),
        }
    }
}

/// Static description of a grouping rule
#[derive(Clone, Copy, Debug)]
pub struct RuleSpec {
    /// Name of the group
    pub group: &'static str,

    /// Event name patterns, tried in order, unanchored
    pub patterns: &'static [&'static str],

    /// Display type override, replaces the one derived from the event phase
    pub display_type: Option<DisplayType>,

    /// How the content label is computed
    pub content: ContentFormatter,

    /// Nested sub-trace carried by End events of this group, if any
    pub nested: Option<NestedSpec>,
}

/// Static description of a nested sub-trace
#[derive(Clone, Copy, Debug)]
pub struct NestedSpec {
    /// Key of the End event arguments under which the sub-trace is stored
    pub data_key: &'static str,

    /// Group that sub-trace events are reassigned to
    pub sub_group: &'static str,

    /// How the content label of sub-trace events is computed
    pub content: ContentFormatter,
}

/// JIT profiler rules
pub const JIT_RULES: &[RuleSpec] = &[
    RuleSpec {
        group: "runtime",
        patterns: &[
            "runtime",
            r"FE_(\w+)",
            r"RT_(\w+)",
            r"SN_(\w+)",
            r"SAL_(\w+)",
            r"BUF_(\w+)",
        ],
        display_type: None,
        content: ContentFormatter::Empty,
        nested: Some(NestedSpec {
            data_key: "traceEvents",
            sub_group: "snprof",
            content: ContentFormatter::EventName,
        }),
    },
    RuleSpec {
        group: "compile",
        patterns: &["compile"],
        display_type: None,
        content: ContentFormatter::Empty,
        nested: None,
    },
    RuleSpec {
        group: "tracing",
        patterns: &["tracing"],
        display_type: None,
        content: ContentFormatter::Empty,
        nested: None,
    },
    RuleSpec {
        group: "Epoch",
        patterns: &["Epoch"],
        display_type: Some(DisplayType::Background),
        content: ContentFormatter::EpochId,
        nested: None,
    },
];
//
/// JIT profiler display ordering
pub const JIT_ORDERING: &[&str] = &["tracing", "compile", "runtime", "snprof", "Epoch"];

/// Runtime profiler (snprof) rules
pub const SNPROF_RULES: &[RuleSpec] = &[
    RuleSpec {
        group: "FE",
        patterns: &[r"FE_(\w+)"],
        display_type: None,
        content: ContentFormatter::Empty,
        nested: None,
    },
    RuleSpec {
        group: "RT",
        patterns: &[r"RT_(\w+)"],
        display_type: None,
        content: ContentFormatter::Empty,
        nested: None,
    },
    RuleSpec {
        group: "SN",
        patterns: &[r"SN_(\w+)"],
        display_type: None,
        content: ContentFormatter::Empty,
        nested: None,
    },
    RuleSpec {
        group: "SAL",
        patterns: &[r"SAL_(\w+)"],
        display_type: None,
        content: ContentFormatter::Empty,
        nested: None,
    },
    RuleSpec {
        group: "BUF",
        patterns: &[r"BUF_(\w+)"],
        display_type: None,
        content: ContentFormatter::Empty,
        nested: None,
    },
];
//
/// Runtime profiler (snprof) display ordering
pub const SNPROF_ORDERING: &[&str] = &["FE", "SN", "SAL", "BUF", "RT"];

/// GPU profiler (kineto) rules
pub const KINETO_RULES: &[RuleSpec] = &[
    RuleSpec {
        group: "DATA MOV",
        patterns: &[r"Mem(\w+)"],
        display_type: Some(DisplayType::XRange),
        content: ContentFormatter::Args,
        nested: None,
    },
    RuleSpec {
        group: "CUDA",
        patterns: &[r"cuda(\w+)"],
        display_type: Some(DisplayType::XRange),
        content: ContentFormatter::Empty,
        nested: None,
    },
    RuleSpec {
        group: "GPU_COMPUTE",
        patterns: &[
            r"random_(\w+)",
            "gemm",
            "void at::native",
            "volta_dgemm",
            "void computeBlockCounts",
            "void compactK",
            "void mfem::CuKernel1D",
            r"(\w+)cuda_for_all(\w+)",
        ],
        display_type: Some(DisplayType::XRange),
        content: ContentFormatter::Empty,
        nested: None,
    },
    RuleSpec {
        group: "CPU_COMPUTE",
        patterns: &[r"fill_(\w+)"],
        display_type: Some(DisplayType::XRange),
        content: ContentFormatter::Empty,
        nested: None,
    },
];
//
/// GPU profiler (kineto) display ordering
pub const KINETO_ORDERING: &[&str] = &["CPU_COMPUTE", "GPU_COMPUTE", "CUDA", "DATA MOV"];

/// Compiled grouping rule
#[derive(Clone, Debug)]
pub struct Rule {
    /// Group name
    group: Box<str>,

    /// Position of the group in the registry ordering
    index: GroupIndex,

    /// Compiled name patterns
    patterns: Box<[Regex]>,

    /// Display type override
    display_type: Option<DisplayType>,

    /// Content label strategy
    content: ContentFormatter,

    /// Nested sub-trace configuration
    nested: Option<NestedTrace>,
}
//
impl Rule {
    /// Group name
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Position of the group in the registry ordering
    pub fn index(&self) -> GroupIndex {
        self.index
    }

    /// Display type override, if any
    pub fn display_type(&self) -> Option<DisplayType> {
        self.display_type
    }

    /// Content label strategy
    pub fn content(&self) -> ContentFormatter {
        self.content
    }

    /// Nested sub-trace configuration, if any
    pub fn nested(&self) -> Option<&NestedTrace> {
        self.nested.as_ref()
    }

    /// Truth that an event name belongs to this group
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(name))
    }
}

/// Compiled nested sub-trace configuration
#[derive(Clone, Debug)]
pub struct NestedTrace {
    /// Key of the End event arguments holding the sub-trace
    data_key: Box<str>,

    /// Group index that sub-trace events are reassigned to
    sub_group: GroupIndex,

    /// Content label strategy for sub-trace events
    content: ContentFormatter,
}
//
impl NestedTrace {
    /// Key of the End event arguments holding the sub-trace
    pub fn data_key(&self) -> &str {
        &self.data_key
    }

    /// Group index that sub-trace events are reassigned to
    pub fn sub_group(&self) -> GroupIndex {
        self.sub_group
    }

    /// Content label strategy for sub-trace events
    pub fn content(&self) -> ContentFormatter {
        self.content
    }
}

/// Complete set of grouping rules for one trace format
#[derive(Clone, Debug)]
pub struct RuleRegistry {
    /// Rules, in matching order
    rules: Box<[Rule]>,

    /// Group names, in display order
    ordering: Box<[Box<str>]>,

    /// CSS class of each group, indexed like `ordering`
    class_names: Box<[Box<str>]>,

    /// Position in `rules` of the rule owning each group, if any
    rule_of_group: Box<[Option<usize>]>,
}
//
impl RuleRegistry {
    /// Compile a set of rules
    ///
    /// Every group that rules assign events to, including nested sub-groups,
    /// must appear exactly once in `ordering`.
    pub fn new(specs: &[RuleSpec], ordering: &[&str]) -> Result<Self, RuleError> {
        // Check the ordering
        for (idx, group) in ordering.iter().enumerate() {
            if ordering[..idx].contains(group) {
                return Err(RuleError::DuplicateGroup((*group).into()));
            }
        }
        let index_of = |group: &str| {
            ordering
                .iter()
                .position(|ordered| *ordered == group)
                .ok_or_else(|| RuleError::UnorderedGroup(group.into()))
        };

        // Compile the rules
        let mut rules = Vec::with_capacity(specs.len());
        let mut rule_of_group = vec![None; ordering.len()];
        for spec in specs {
            let index = index_of(spec.group)?;
            if rule_of_group[index].replace(rules.len()).is_some() {
                return Err(RuleError::DuplicateGroup(spec.group.into()));
            }
            let patterns = spec
                .patterns
                .iter()
                .map(|pattern| {
                    Regex::new(pattern).map_err(|source| RuleError::BadPattern {
                        group: spec.group.into(),
                        source,
                    })
                })
                .collect::<Result<Box<[_]>, _>>()?;
            let nested = spec
                .nested
                .map(|nested| -> Result<_, RuleError> {
                    Ok(NestedTrace {
                        data_key: nested.data_key.into(),
                        sub_group: index_of(nested.sub_group)?,
                        content: nested.content,
                    })
                })
                .transpose()?;
            rules.push(Rule {
                group: spec.group.into(),
                index,
                patterns,
                display_type: spec.display_type,
                content: spec.content,
                nested,
            });
        }

        // Background groups and the others get separate color palettes
        let class_names = rule_of_group
            .iter()
            .enumerate()
            .map(|(idx, rule)| {
                let background = rule.map_or(false, |rule| {
                    rules[rule].display_type == Some(DisplayType::Background)
                });
                let prefix = if background { "bg" } else { "fg" };
                format!("{prefix}-{}", idx % 4 + 1).into_boxed_str()
            })
            .collect();

        Ok(Self {
            rules: rules.into_boxed_slice(),
            ordering: ordering.iter().map(|group| (*group).into()).collect(),
            class_names,
            rule_of_group: rule_of_group.into_boxed_slice(),
        })
    }

    /// Rules for a given trace format
    pub fn for_format(format: TraceFormat) -> Result<Self, RuleError> {
        match format {
            TraceFormat::Jit => Self::new(JIT_RULES, JIT_ORDERING),
            TraceFormat::Snprof => Self::new(SNPROF_RULES, SNPROF_ORDERING),
            TraceFormat::Kineto => Self::new(KINETO_RULES, KINETO_ORDERING),
        }
    }

    /// Rules, in matching order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Group names, in display order
    pub fn group_names(&self) -> &[Box<str>] {
        &self.ordering
    }

    /// Position of a group in the display order
    pub fn group_index(&self, group: &str) -> Option<GroupIndex> {
        self.ordering.iter().position(|name| &**name == group)
    }

    /// Name of a group
    pub fn group_name(&self, index: GroupIndex) -> &str {
        &self.ordering[index]
    }

    /// CSS class name of a group
    pub fn class_name(&self, index: GroupIndex) -> &str {
        &self.class_names[index]
    }

    /// Rule owning a group, if any (nested sub-groups have none)
    pub fn rule_of_group(&self, index: GroupIndex) -> Option<&Rule> {
        self.rule_of_group[index].map(|rule| &self.rules[rule])
    }

    /// First rule whose patterns match an event name
    pub fn find(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(name))
    }
}

/// What can go wrong while compiling grouping rules
#[derive(Debug, Error)]
pub enum RuleError {
    /// A group appears twice in the ordering or owns two rules
    #[error("group \"{0}\" is defined twice")]
    DuplicateGroup(Box<str>),

    /// A group is used by a rule but missing from the ordering
    #[error("group \"{0}\" is missing from the group ordering")]
    UnorderedGroup(Box<str>),

    /// A name pattern is not a valid regex
    #[error("invalid event name pattern for group \"{group}\" ({source})")]
    BadPattern {
        /// Group owning the pattern
        group: Box<str>,

        /// Regex compilation error
        source: regex::Error,
    },
}
