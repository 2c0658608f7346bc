//! Reconstruction of intervals from Begin/End event streams

use crate::ctf::Phase;

/// Begin/End pair that was matched
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IntervalPair<'a> {
    /// Name shared by both events
    pub name: &'a str,

    /// Position of the Begin event in the input
    pub begin: usize,

    /// Position of the End event in the input
    pub end: usize,
}

/// Result of matching an event stream
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Pairing<'a> {
    /// Matched intervals, in order of End event encounter
    pub pairs: Vec<IntervalPair<'a>>,

    /// Positions of End events which did not close the innermost open Begin
    pub orphan_ends: Vec<usize>,

    /// Positions of Begin events which were still open at the end of input
    pub unclosed_begins: Vec<usize>,
}

/// Pair Begin and End events
///
/// This is a single left-to-right scan over a stack of open Begin events. An
/// End event only closes the innermost open Begin, and only if their names
/// are equal, so intervals that are open at the same time must nest. Any
/// other End event is ignored and reported as an orphan. Events with other
/// phases are skipped, but still count towards input positions.
pub fn match_intervals<'a>(events: impl IntoIterator<Item = (Phase, &'a str)>) -> Pairing<'a> {
    let mut pairing = Pairing::default();
    let mut open = Vec::<(usize, &'a str)>::new();
    for (idx, (phase, name)) in events.into_iter().enumerate() {
        match phase {
            Phase::Begin => open.push((idx, name)),
            Phase::End => match open.last() {
                Some(&(begin, open_name)) if open_name == name => {
                    open.pop();
                    pairing.pairs.push(IntervalPair {
                        name,
                        begin,
                        end: idx,
                    });
                }
                _ => pairing.orphan_ends.push(idx),
            },
            Phase::Instant | Phase::Complete => {}
        }
    }
    pairing.unclosed_begins = open.into_iter().map(|(idx, _name)| idx).collect();
    pairing
}
