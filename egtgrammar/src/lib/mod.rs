#![allow(clippy::new_without_default)]
#![allow(clippy::upper_case_acronyms)]

//! A loader for compiled LALR(1) grammar tables in the GOLD Parser Tables v5.0 format.
//!
//! A table contains everything needed to tokenise and parse input: symbols, character sets, a
//! lexical DFA, lexical groups (e.g. nestable comments), productions, and an LALR state machine.
//! Loading a table happens in two stages:
//!
//!   1. [`decoder::decode`] turns the binary format into raw rows.
//!   2. [`Grammar::from_raw`] checks that every row refers only to rows that exist, and derives
//!      the tables lexers and parsers use at run-time: a direct lookup table for ASCII input on
//!      each DFA state, a dense action table on each LALR state, which terminals only ever match
//!      a single lexeme, and the rules which control how each production appears in a simplified
//!      tree.
//!
//! [`Grammar::from_bytes`] and [`Grammar::from_file`] perform both stages.
//!
//! Symbols and productions have canonical textual IDs, which are used for look-ups and in
//! diagnostics: a non-terminal `E` is `<E>`, a terminal `Num` is `Num`, any other symbol `EOF`
//! is `(EOF)`, and a production is rendered as e.g. `<E> ::= <E> + <M>`.

pub mod decoder;
pub mod dfa;
pub mod grammar;
mod idxnewtype;
pub mod lalr;

pub use crate::{
    decoder::{TableError, TableErrorKind},
    dfa::{DfaState, Transition},
    grammar::{
        AdvanceMode, CharacterSet, EndingMode, Grammar, LoadError, Production, Property, Symbol,
        SymbolGroup, SymbolKind,
    },
    idxnewtype::{CharSetIdx, DfaStIdx, GroupIdx, PIdx, StIdx, SymIdx},
    lalr::{Action, LalrState},
};
