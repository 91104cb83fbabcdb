use std::{mem, path::Path};

use egtgrammar::{
    AdvanceMode, EndingMode, Grammar, GroupIdx, SymIdx, SymbolKind, Transition,
};
use log::trace;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{InputBuffer, InputError, Span};

/// The byte which, by the convention of the table format, starts a new line.
pub const DEFAULT_LINE_TERMINATOR: u8 = 0x13;

/// Code points above the Basic Multilingual Plane are all mapped to this value before they are
/// looked up in the DFA, since character sets only address 16-bit code points.
const ASTRAL_CODE_POINT: u32 = 0xFFFF;

/// A token: a symbol, the span of input it matched, and the (1-based) line and column at which
/// it starts. Columns count bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Token {
    symbol: SymIdx,
    span: Span,
    line: usize,
    column: usize,
}

impl Token {
    pub fn new(symbol: SymIdx, span: Span, (line, column): (usize, usize)) -> Self {
        Token {
            symbol,
            span,
            line,
            column,
        }
    }

    pub fn symbol(&self) -> SymIdx {
        self.symbol
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// The `(line, column)` at which this token starts.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn lexeme<'a>(&self, input: &'a InputBuffer<'_>) -> &'a str {
        input.span_str(self.span)
    }

    /// Render this token as `ID 'lexeme'`.
    pub fn pp(&self, grm: &Grammar, input: &InputBuffer<'_>) -> String {
        format!("{} '{}'", grm.symbol(self.symbol).id(), self.lexeme(input))
    }
}

/// A group the lexer is currently inside.
#[derive(Clone, Copy, Debug)]
struct OpenGroup {
    gidx: GroupIdx,
    start: usize,
    position: (usize, usize),
}

/// Configure and build a [`Lexer`].
pub struct LexerBuilder<'grm> {
    grm: &'grm Grammar,
    line_terminator: u8,
}

impl<'grm> LexerBuilder<'grm> {
    pub fn new(grm: &'grm Grammar) -> Self {
        LexerBuilder {
            grm,
            line_terminator: DEFAULT_LINE_TERMINATOR,
        }
    }

    /// Set the byte which increments the line count (defaults to
    /// [`DEFAULT_LINE_TERMINATOR`]).
    pub fn line_terminator(mut self, b: u8) -> Self {
        self.line_terminator = b;
        self
    }

    pub fn build<'input>(self) -> Lexer<'grm, 'input> {
        Lexer {
            grm: self.grm,
            input: InputBuffer::default(),
            cur: 0,
            line: 1,
            column: 1,
            line_terminator: self.line_terminator,
            groups: Vec::new(),
        }
    }
}

/// A lexer which walks a grammar's DFA over an input buffer, folding lexical groups (e.g.
/// comments) into single tokens.
pub struct Lexer<'grm, 'input> {
    grm: &'grm Grammar,
    input: InputBuffer<'input>,
    cur: usize,
    line: usize,
    column: usize,
    line_terminator: u8,
    groups: Vec<OpenGroup>,
}

impl<'grm, 'input> Lexer<'grm, 'input> {
    /// Create a lexer with the default configuration.
    pub fn new(grm: &'grm Grammar) -> Self {
        LexerBuilder::new(grm).build()
    }

    pub fn grammar(&self) -> &'grm Grammar {
        self.grm
    }

    /// Scan `input` from its start, replacing any previous input.
    pub fn load(&mut self, input: InputBuffer<'input>) {
        self.input = input;
        self.reset_cursor();
        trace!("Loaded {} bytes of input", self.input.len());
    }

    pub fn load_str(&mut self, s: &'input str) {
        self.load(InputBuffer::shared(s));
    }

    pub fn load_string(&mut self, s: String) {
        self.load(InputBuffer::owned(s));
    }

    /// Share `b`, which must be valid UTF-8. On error the previous input is kept.
    pub fn load_bytes(&mut self, b: &'input [u8]) -> Result<(), InputError> {
        self.load(InputBuffer::shared_bytes(b)?);
        Ok(())
    }

    /// Read the file at `path`, which must be valid UTF-8. On error the previous input is kept.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), InputError> {
        self.load(InputBuffer::from_file(path)?);
        Ok(())
    }

    /// Drop the current input.
    pub fn unload(&mut self) {
        self.load(InputBuffer::default());
    }

    /// Restart scanning from the beginning of the current input.
    pub fn reset_cursor(&mut self) {
        self.cur = 0;
        self.line = 1;
        self.column = 1;
        self.groups.clear();
    }

    /// Hand the current input to the caller, leaving the lexer with no input.
    pub fn release_buffer(&mut self) -> InputBuffer<'input> {
        let buf = mem::take(&mut self.input);
        self.reset_cursor();
        buf
    }

    pub fn buffer(&self) -> &InputBuffer<'input> {
        &self.input
    }

    /// The byte offset of the next unscanned character.
    pub fn offset(&self) -> usize {
        self.cur
    }

    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// How many lexical groups are currently open? This is non-zero after an EOF token only if
    /// the input ended inside a group.
    pub fn open_groups(&self) -> usize {
        self.groups.len()
    }

    /// Find the longest match at the cursor without consuming it, returning the token and the
    /// offset just after it.
    fn peek_token(&self) -> (Token, usize) {
        let grm = self.grm;
        let mut state = grm.dfa_state(grm.dfa_init());
        let mut hit = None;
        let mut end = self.cur;
        for ch in self.input.as_str()[self.cur..].chars() {
            end += ch.len_utf8();
            match state.transition(u32::from(ch).min(ASTRAL_CODE_POINT)) {
                Transition::Continue => (),
                Transition::AcceptContinue => hit = state.accept().map(|a| (a, end)),
                Transition::Dead => break,
                Transition::Goto(t) => {
                    state = grm.dfa_state(t);
                    if let Some(a) = state.accept() {
                        hit = Some((a, end));
                    }
                }
            }
        }

        let pos = self.position();
        match hit {
            Some((sym, hit_end)) => (Token::new(sym, Span::new(self.cur, hit_end), pos), hit_end),
            None if end == self.cur => (
                Token::new(grm.eof_symbol(), Span::at(self.cur), pos),
                end,
            ),
            None => (
                Token::new(grm.error_symbol(), Span::new(self.cur, end), pos),
                end,
            ),
        }
    }

    /// Move the cursor to `end`, keeping the line and column up to date.
    fn advance_to(&mut self, end: usize) {
        for &b in &self.input.as_str().as_bytes()[self.cur..end] {
            if b == self.line_terminator {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.cur = end;
    }

    /// Return the next token, including Noise tokens. A lexical group is returned as a single
    /// token of the group's container symbol, spanning the whole group. If the input ends
    /// inside a group, the EOF token is returned and [`open_groups`](Self::open_groups) is
    /// non-zero.
    pub fn scan_token(&mut self) -> Token {
        let grm = self.grm;
        loop {
            let (tok, end) = self.peek_token();
            let sym = grm.symbol(tok.symbol());

            let nest = if sym.kind() == SymbolKind::GroupStart {
                grm.group_started_by(tok.symbol()).filter(|g| {
                    self.groups
                        .last()
                        .is_none_or(|top| grm.group(top.gidx).nests(*g))
                })
            } else {
                None
            };
            if let Some(gidx) = nest {
                trace!("Entering group {} at {:?}", grm.group(gidx).name, tok.position());
                self.groups.push(OpenGroup {
                    gidx,
                    start: tok.span().start(),
                    position: tok.position(),
                });
                self.advance_to(end);
                continue;
            }

            let top = match self.groups.last() {
                Some(top) => *top,
                None => {
                    self.advance_to(end);
                    trace!("Token {} at {:?}", sym.id(), tok.position());
                    return tok;
                }
            };
            let group = grm.group(top.gidx);
            if group.end == tok.symbol() {
                self.groups.pop();
                let group_end = match group.ending {
                    EndingMode::Closed => {
                        self.advance_to(end);
                        end
                    }
                    EndingMode::Open => tok.span().start(),
                };
                trace!("Leaving group {} at {:?}", group.name, tok.position());
                if self.groups.is_empty() {
                    return Token::new(
                        group.container,
                        Span::new(top.start, group_end),
                        top.position,
                    );
                }
            } else if sym.kind() == SymbolKind::EndOfFile {
                return tok;
            } else {
                match group.advance {
                    AdvanceMode::Token => self.advance_to(end),
                    AdvanceMode::Character => {
                        let w = self.input.as_str()[self.cur..]
                            .chars()
                            .next()
                            .map_or(1, char::len_utf8);
                        self.advance_to(self.cur + w);
                    }
                }
            }
        }
    }

    /// Return the next token which is not Noise.
    pub fn read_token(&mut self) -> Token {
        loop {
            let tok = self.scan_token();
            if self.grm.symbol(tok.symbol()).kind() != SymbolKind::Noise {
                return tok;
            }
        }
    }
}
