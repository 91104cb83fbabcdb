use std::{error::Error, fmt, path::Path};

use egtgrammar::Grammar;
use egtlex::{InputBuffer, InputError, Token, Span};

use crate::{
    Arena, NodeId, ParseError, ParseErrorKind, ParseEvent, ParseHandler, Parser,
    SimplifiedTreeBuilder, TreeBuilder,
};

/// A tree together with the input its tokens refer to.
#[derive(Debug)]
pub struct ParsedTree<'input> {
    pub arena: Arena,
    pub root: NodeId,
    pub input: InputBuffer<'input>,
}

impl ParsedTree<'_> {
    pub fn pp(&self, grm: &Grammar) -> String {
        self.arena.pp(self.root, grm, &self.input)
    }

    pub fn terminals(&self) -> Vec<Token> {
        self.arena.terminals(self.root)
    }
}

#[derive(Debug)]
pub enum ParseTreeError {
    Input(InputError),
    Parse(ParseError),
}

impl Error for ParseTreeError {}

impl fmt::Display for ParseTreeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseTreeError::Input(e) => write!(f, "{}", e),
            ParseTreeError::Parse(e) => write!(f, "{}", e),
        }
    }
}

impl From<InputError> for ParseTreeError {
    fn from(err: InputError) -> Self {
        ParseTreeError::Input(err)
    }
}

impl From<ParseError> for ParseTreeError {
    fn from(err: ParseError) -> Self {
        ParseTreeError::Parse(err)
    }
}

fn build<'input, H>(
    grm: &Grammar,
    input: InputBuffer<'input>,
    mut builder: H,
    finish: fn(H) -> (Arena, Option<NodeId>),
) -> Result<ParsedTree<'input>, ParseTreeError>
where
    H: ParseHandler<NodeId>,
{
    let mut psr: Parser<'_, 'input, NodeId> = Parser::new(grm);
    psr.load(input);
    if psr.parse_all_with(&mut builder) == ParseEvent::Error {
        if let Some(e) = psr.error() {
            return Err(ParseTreeError::Parse(e.clone()));
        }
    }
    match finish(builder) {
        (arena, Some(root)) => Ok(ParsedTree {
            arena,
            root,
            input: psr.release_buffer(),
        }),
        (_, None) => {
            // The accepted item had no node attached.
            let tok = psr
                .token()
                .unwrap_or_else(|| Token::new(grm.eof_symbol(), Span::at(0), (1, 1)));
            Err(ParseTreeError::Parse(ParseError::new(
                ParseErrorKind::Internal,
                psr.state(),
                tok,
            )))
        }
    }
}

/// Parse `s` into a tree with one node per shifted token and per reduction.
pub fn parse_str_to_tree<'input>(
    grm: &Grammar,
    s: &'input str,
) -> Result<ParsedTree<'input>, ParseTreeError> {
    build(grm, InputBuffer::shared(s), TreeBuilder::new(), TreeBuilder::into_tree)
}

/// Parse `s` into a tree simplified by the rules attached to `grm`'s productions.
pub fn parse_str_to_simplified_tree<'input>(
    grm: &Grammar,
    s: &'input str,
) -> Result<ParsedTree<'input>, ParseTreeError> {
    build(
        grm,
        InputBuffer::shared(s),
        SimplifiedTreeBuilder::new(),
        SimplifiedTreeBuilder::into_tree,
    )
}

pub fn parse_bytes_to_tree<'input>(
    grm: &Grammar,
    b: &'input [u8],
) -> Result<ParsedTree<'input>, ParseTreeError> {
    build(grm, InputBuffer::shared_bytes(b)?, TreeBuilder::new(), TreeBuilder::into_tree)
}

pub fn parse_bytes_to_simplified_tree<'input>(
    grm: &Grammar,
    b: &'input [u8],
) -> Result<ParsedTree<'input>, ParseTreeError> {
    build(
        grm,
        InputBuffer::shared_bytes(b)?,
        SimplifiedTreeBuilder::new(),
        SimplifiedTreeBuilder::into_tree,
    )
}

pub fn parse_file_to_tree<P: AsRef<Path>>(
    grm: &Grammar,
    path: P,
) -> Result<ParsedTree<'static>, ParseTreeError> {
    build(grm, InputBuffer::from_file(path)?, TreeBuilder::new(), TreeBuilder::into_tree)
}

pub fn parse_file_to_simplified_tree<P: AsRef<Path>>(
    grm: &Grammar,
    path: P,
) -> Result<ParsedTree<'static>, ParseTreeError> {
    build(
        grm,
        InputBuffer::from_file(path)?,
        SimplifiedTreeBuilder::new(),
        SimplifiedTreeBuilder::into_tree,
    )
}
