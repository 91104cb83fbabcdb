#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The bytes `start..end` of an [`InputBuffer`](crate::InputBuffer) that a token was scanned from.
/// For a group's container token this runs from the group's start marker to wherever the group
/// ended, so it may cover many inner lexemes. Only end-of-input tokens have empty spans.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// # Panics
    ///
    /// If `end` is less than `start`: the lexer never moves backwards through its buffer.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "token ends at {end} before its start {start}");
        Span { start, end }
    }

    /// A zero-width span at byte `offset`, as carried by end-of-input tokens.
    pub fn at(offset: usize) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}
