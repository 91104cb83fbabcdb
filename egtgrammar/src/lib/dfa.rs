//! The lexical DFA, and the lookup tables derived from it when a grammar is loaded.

use std::iter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vob::Vob;

use crate::{CharSetIdx, DfaStIdx, SymIdx, grammar::CharacterSet};

/// The number of code points which are dispatched through a state's direct lookup table.
pub const ASCII_LEN: usize = 0x80;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DfaEdge {
    pub charset: CharSetIdx,
    pub target: DfaStIdx,
}

/// Where the DFA goes after consuming a character.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Transition {
    /// Move to another state.
    Goto(DfaStIdx),
    /// No edge matches: the scan stops.
    Dead,
    /// A self loop on an accepting state: stay put and extend the current match.
    AcceptContinue,
    /// A self loop on a non-accepting state: stay put without accepting.
    Continue,
}

/// A transition taken by every code point in `from..=to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransitionRange {
    pub from: u16,
    pub to: u16,
    pub target: Transition,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DfaState {
    idx: DfaStIdx,
    accept: Option<SymIdx>,
    edges: Vec<DfaEdge>,
    /// Always `ASCII_LEN` entries once linked.
    ascii: Vec<Transition>,
    /// Sorted by `from`; only covers code points of at least `ASCII_LEN`.
    ranges: Vec<TransitionRange>,
}

impl DfaState {
    pub(crate) fn new(idx: DfaStIdx, accept: Option<SymIdx>, edges: Vec<DfaEdge>) -> Self {
        DfaState {
            idx,
            accept,
            edges,
            ascii: Vec::new(),
            ranges: Vec::new(),
        }
    }

    pub fn idx(&self) -> DfaStIdx {
        self.idx
    }

    /// The symbol this state accepts, if any.
    pub fn accept(&self) -> Option<SymIdx> {
        self.accept
    }

    pub fn edges(&self) -> &[DfaEdge] {
        &self.edges
    }

    pub fn ascii_table(&self) -> &[Transition] {
        &self.ascii
    }

    pub fn ranges(&self) -> &[TransitionRange] {
        &self.ranges
    }

    /// The transition for code point `c`.
    pub fn transition(&self, c: u32) -> Transition {
        if let Some(t) = usize::try_from(c).ok().and_then(|c| self.ascii.get(c)) {
            return *t;
        }
        let c = match u16::try_from(c) {
            Ok(c) => c,
            Err(_) => return Transition::Dead,
        };
        let i = self.ranges.partition_point(|r| r.from <= c);
        match i.checked_sub(1).map(|i| &self.ranges[i]) {
            Some(r) if c <= r.to => r.target,
            _ => Transition::Dead,
        }
    }

    /// Fill in the direct lookup table and the sorted range list from this state's edges.
    /// Later edges win where character sets overlap in the ASCII range.
    pub(crate) fn build_lookup(&mut self, charsets: &[CharacterSet]) {
        let mut ascii = vec![Transition::Dead; ASCII_LEN];
        let mut ranges = Vec::new();
        for e in &self.edges {
            let target = if e.target == self.idx {
                if self.accept.is_some() {
                    Transition::AcceptContinue
                } else {
                    Transition::Continue
                }
            } else {
                Transition::Goto(e.target)
            };
            for &(from, to) in &charsets[usize::from(e.charset)].ranges {
                let (from_u, to_u) = (usize::from(from), usize::from(to));
                if from_u > to_u {
                    continue;
                }
                if from_u < ASCII_LEN {
                    for t in &mut ascii[from_u..=to_u.min(ASCII_LEN - 1)] {
                        *t = target;
                    }
                }
                if to_u >= ASCII_LEN {
                    ranges.push(TransitionRange {
                        from: from.max(ASCII_LEN as u16),
                        to,
                        target,
                    });
                }
            }
        }
        ranges.sort_by_key(|r| r.from);
        self.ascii = ascii;
        self.ranges = ranges;
    }
}

/// For each symbol, count the accepting DFA states which are reachable from `init` by exactly
/// one path. A state reachable along two different paths (including via a cycle) makes every
/// state reachable from it multi-path too.
pub(crate) fn single_path_accepts(
    states: &[DfaState],
    init: DfaStIdx,
    syms_len: usize,
) -> Vec<usize> {
    let mut reached = iter::repeat(false).take(states.len()).collect::<Vob>();
    let mut multi = iter::repeat(false).take(states.len()).collect::<Vob>();
    reached.set(usize::from(init), true);
    let mut todo = vec![usize::from(init)];
    while let Some(i) = todo.pop() {
        for e in &states[i].edges {
            let t = usize::from(e.target);
            if multi[t] {
                continue;
            }
            if reached[t] {
                let mut mtodo = vec![t];
                while let Some(m) = mtodo.pop() {
                    multi.set(m, true);
                    for me in &states[m].edges {
                        if !multi[usize::from(me.target)] {
                            mtodo.push(usize::from(me.target));
                        }
                    }
                }
            } else {
                reached.set(t, true);
                todo.push(t);
            }
        }
    }

    let mut counts = vec![0; syms_len];
    for (i, s) in states.iter().enumerate() {
        if let Some(a) = s.accept {
            if reached[i] && !multi[i] {
                counts[usize::from(a)] += 1;
            }
        }
    }
    counts
}
