#![allow(clippy::new_without_default)]

//! A DFA-driven lexer for grammars loaded by [`egtgrammar`].
//!
//! The lexer always takes the longest match the grammar's DFA allows. On top of that it
//! understands *lexical groups*: regions such as block comments or line comments, delimited by
//! a start symbol and an end symbol, which are returned to the caller as a single token of the
//! group's *container* symbol. Groups may nest inside one another when the grammar allows it.
//!
//! ```text
//! let grm = Grammar::from_file("calc.egt")?;
//! let mut lexer = Lexer::new(&grm);
//! lexer.load_str("1 + /* two */ 2");
//! loop {
//!     let t = lexer.read_token();
//!     ...
//! }
//! ```
//!
//! Tokens store a [`Span`] rather than text: use [`Token::lexeme`] or
//! [`InputBuffer::span_str`] with the lexer's [`buffer`](Lexer::buffer) to get at the text.

mod input;
mod lexer;
mod span;

pub use crate::{
    input::{InputBuffer, InputError},
    lexer::{DEFAULT_LINE_TERMINATOR, Lexer, LexerBuilder, Token},
    span::Span,
};
