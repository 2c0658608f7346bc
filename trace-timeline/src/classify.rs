//! Mapping of raw events to groups and display types

use crate::{
    ctf::{Phase, TraceEvent},
    rules::{DisplayType, GroupIndex, Rule, RuleRegistry},
};
use log::{debug, trace};
use thiserror::Error;

/// Outcome of classifying one event
#[derive(Clone, Copy, Debug)]
pub struct Classification<'registry> {
    /// Rule which the event name matched
    pub rule: &'registry Rule,

    /// How the event is displayed
    pub display_type: DisplayType,
}
//
impl Classification<'_> {
    /// Group which the event belongs to
    pub fn group(&self) -> GroupIndex {
        self.rule.index()
    }
}

/// Classify an event according to a rule registry
///
/// Events whose phase timelines do not care about yield `Ok(None)`. Events
/// with a known phase must match some rule, as registries are expected to
/// cover the whole event vocabulary of their trace format.
pub fn classify<'registry>(
    event: &TraceEvent,
    registry: &'registry RuleRegistry,
) -> Result<Option<Classification<'registry>>, UnclassifiedEvent> {
    let phase_type = match event.phase() {
        Some(Phase::Begin | Phase::End) => DisplayType::Range,
        Some(Phase::Instant) => DisplayType::Point,
        Some(Phase::Complete) => DisplayType::XRange,
        None => {
            debug!("Ignoring {:?} event with unsupported phase {:?}", event.name, event.ph);
            return Ok(None);
        }
    };
    let rule = registry
        .find(&event.name)
        .ok_or_else(|| UnclassifiedEvent(event.name.clone()))?;
    trace!("Event {:?} belongs to group {:?}", event.name, rule.group());
    Ok(Some(Classification {
        rule,
        display_type: rule.display_type().unwrap_or(phase_type),
    }))
}

/// No grouping rule matched an event name
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("no grouping rule matches event {0:?}")]
pub struct UnclassifiedEvent(pub Box<str>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TraceFormat;
    use assert_matches::assert_matches;

    fn event(name: &str, ph: &str) -> TraceEvent {
        TraceEvent {
            name: name.into(),
            ph: ph.into(),
            ts: Some(0),
            ..TraceEvent::default()
        }
    }

    fn jit() -> RuleRegistry {
        RuleRegistry::for_format(TraceFormat::Jit).unwrap()
    }

    #[test]
    fn display_type_from_phase() {
        let registry = jit();
        let check = |ph, expected| {
            let classification = classify(&event("compile", ph), &registry)
                .unwrap()
                .unwrap();
            assert_eq!(classification.rule.group(), "compile");
            assert_eq!(classification.group(), 1);
            assert_eq!(classification.display_type, expected);
        };
        check("B", DisplayType::Range);
        check("E", DisplayType::Range);
        check("i", DisplayType::Point);
        check("I", DisplayType::Point);
        check("X", DisplayType::XRange);
    }

    #[test]
    fn rule_override() {
        let registry = jit();
        assert_matches!(
            classify(&event("Epoch", "B"), &registry),
            Ok(Some(Classification { display_type: DisplayType::Background, .. }))
        );
        let kineto = RuleRegistry::for_format(TraceFormat::Kineto).unwrap();
        assert_matches!(
            classify(&event("MemcpyHtoD", "B"), &kineto),
            Ok(Some(Classification { display_type: DisplayType::XRange, .. }))
        );
    }

    #[test]
    fn unsupported_phase() {
        let registry = jit();
        assert_matches!(classify(&event("compile", "M"), &registry), Ok(None));
        // Phase filtering comes first, so unknown names do not matter here
        assert_matches!(classify(&event("mystery", "C"), &registry), Ok(None));
    }

    #[test]
    fn unclassified() {
        assert_eq!(
            classify(&event("mystery", "B"), &jit()).unwrap_err(),
            UnclassifiedEvent("mystery".into())
        );
    }
}
