// Grammar tables address everything with 16-bit indices, so every newtype generated here stores a
// `u16` and widens losslessly to `usize`.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! IdxNewtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature="serde", derive(Serialize, Deserialize))]
        pub struct $n(pub u16);

        impl From<$n> for usize {
            fn from(x: $n) -> Self {
                usize::from(x.0)
            }
        }

        impl fmt::Display for $n {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    }
}

IdxNewtype!(
    /// A symbol index.
    SymIdx);
IdxNewtype!(
    /// A character set index.
    CharSetIdx);
IdxNewtype!(
    /// A lexical group index.
    GroupIdx);
IdxNewtype!(
    /// A production index.
    PIdx);
IdxNewtype!(
    /// A state index in the lexical DFA.
    DfaStIdx);
IdxNewtype!(
    /// A state index in the LALR state machine.
    StIdx);
