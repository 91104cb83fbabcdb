#![allow(clippy::new_without_default)]
#![allow(clippy::type_complexity)]
#![forbid(unsafe_code)]

//! A step-wise LALR(1) parser driven by the tables of a grammar loaded by [`egtgrammar`], along
//! with handlers which build parse trees from the parser's events.
//!
//! [`Parser::parse_step`] performs a single shift, reduction, or accept and reports it as a
//! [`ParseEvent`]. Each item on the parse stack has a `payload` slot, so a caller can build any
//! structure it likes as it goes: on a [`ParseEvent::Shift`] attach a value to
//! [`Parser::top_mut`]; on a [`ParseEvent::Reduce`] combine the payloads of the popped
//! [`handles`](ReductionMut::handles) into the [`head`](ReductionMut::head). Anything which
//! implements [`ParseHandler`] can be driven by [`Parser::parse_all_with`]. Three handlers are
//! provided:
//!
//!   * [`TreeBuilder`] builds a tree which mirrors the grammar exactly.
//!   * [`SimplifiedTreeBuilder`] builds a smaller tree, leaving out punctuation, unit productions,
//!     and recursion (see the [`simplified`] module).
//!   * [`ProductionHandler`] runs a user action per production, e.g. to evaluate the input
//!     directly.
//!
//! For the common case, [`parse_str_to_tree`] and friends do all of this in one call:
//!
//! ```text
//! let grm = Grammar::from_file("calc.egt")?;
//! let tree = parse_str_to_simplified_tree(&grm, "2 * (3 + 4)")?;
//! print!("{}", tree.pp(&grm));
//! ```

mod handler;
mod parse_tree;
mod parser;
pub mod simplified;
mod tree;

pub use crate::{
    handler::ProductionHandler,
    parse_tree::{
        ParseTreeError, ParsedTree, parse_bytes_to_simplified_tree, parse_bytes_to_tree,
        parse_file_to_simplified_tree, parse_file_to_tree, parse_str_to_simplified_tree,
        parse_str_to_tree,
    },
    parser::{
        ParseError, ParseErrorKind, ParseEvent, ParseHandler, ParseItem, Parser, ParserBuilder,
        Reduction, ReductionMut,
    },
    simplified::SimplifiedTreeBuilder,
    tree::{Arena, Node, NodeId, TreeBuilder},
};
