use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{PIdx, StIdx, SymIdx};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Action {
    /// Shift to a new state.
    Shift(StIdx),
    /// Reduce by the given production.
    Reduce(PIdx),
    /// After a reduction exposes this state, move to the given state.
    Goto(StIdx),
    Accept,
}

impl Action {
    pub fn from_code(code: i16, target: u16) -> Option<Self> {
        match code {
            1 => Some(Action::Shift(StIdx(target))),
            2 => Some(Action::Reduce(PIdx(target))),
            3 => Some(Action::Goto(StIdx(target))),
            4 => Some(Action::Accept),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LalrState {
    idx: StIdx,
    actions: BTreeMap<SymIdx, Action>,
    /// `actions` indexed directly by symbol.
    dense: Vec<Option<Action>>,
}

impl LalrState {
    pub(crate) fn new(idx: StIdx, actions: BTreeMap<SymIdx, Action>) -> Self {
        LalrState {
            idx,
            actions,
            dense: Vec::new(),
        }
    }

    pub fn idx(&self) -> StIdx {
        self.idx
    }

    /// This state's actions, ordered by symbol.
    pub fn actions(&self) -> &BTreeMap<SymIdx, Action> {
        &self.actions
    }

    pub fn action(&self, sidx: SymIdx) -> Option<Action> {
        self.dense.get(usize::from(sidx)).copied().flatten()
    }

    pub(crate) fn build_lookup(&mut self, syms_len: usize) {
        let mut dense = vec![None; syms_len];
        for (sidx, act) in &self.actions {
            dense[usize::from(*sidx)] = Some(*act);
        }
        self.dense = dense;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Grammar;
    use grammar_testing::fixtures::list_table;

    #[test]
    fn dense_matches_sparse() {
        let grm = Grammar::from_bytes(&list_table()).unwrap();
        for st in grm.lalr_states() {
            for i in 0..grm.symbols_len() {
                let sidx = SymIdx(i as u16);
                assert_eq!(st.action(sidx), st.actions().get(&sidx).copied());
            }
        }
        // State 3 reduces by `<List2> ::=` on `}` and `Id`.
        let st = grm.lalr_state(StIdx(3));
        assert_eq!(st.action(SymIdx(8)), Some(Action::Reduce(PIdx(5))));
        assert_eq!(st.action(SymIdx(12)), Some(Action::Goto(StIdx(6))));
        assert_eq!(st.action(SymIdx(0)), None);
        assert_eq!(grm.action(StIdx(1), SymIdx(0)), Some(Action::Accept));
    }
}
