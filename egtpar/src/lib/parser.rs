use std::{error::Error, fmt, path::Path};

use egtgrammar::{Action, Grammar, PIdx, StIdx, SymIdx, SymbolKind};
use egtlex::{
    DEFAULT_LINE_TERMINATOR, InputBuffer, InputError, Lexer, LexerBuilder, Token,
};
use log::{debug, trace};

/// What a single call to [`Parser::parse_step`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParseEvent {
    /// The input has been accepted. Stepping further is meaningless.
    Accept,
    /// A token was shifted onto the stack.
    Shift,
    /// A production was reduced: see [`Parser::reduction`].
    Reduce,
    /// A unit production was reduced by rewriting the state of the top of the stack, without
    /// popping or pushing anything.
    ReduceEliminated,
    /// Parsing failed: see [`Parser::error`].
    Error,
}

/// An element of the parse stack. `payload` is a slot for whatever a [`ParseHandler`] wants to
/// attach to the item: the parser itself never looks at it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseItem<T> {
    state: StIdx,
    production: Option<PIdx>,
    token: Option<Token>,
    pub payload: Option<T>,
}

impl<T> ParseItem<T> {
    pub fn state(&self) -> StIdx {
        self.state
    }

    /// The production that created this item, if it was created by a reduction.
    pub fn production(&self) -> Option<PIdx> {
        self.production
    }

    /// The token this item holds, if it was created by a shift.
    pub fn token(&self) -> Option<Token> {
        self.token
    }

    pub fn lexeme<'a>(&self, input: &'a InputBuffer<'_>) -> Option<&'a str> {
        self.token.map(|t| t.lexeme(input))
    }

    pub fn pp(&self, grm: &Grammar) -> String {
        match (self.production, self.token) {
            (Some(p), _) => format!("S={}, P={}", self.state, grm.prod(p).id()),
            (None, Some(t)) => format!("S={}, T={}", self.state, grm.symbol(t.symbol()).id()),
            (None, None) => format!("S={}", self.state),
        }
    }
}

/// The most recent reduction: the production, the item pushed for the production's head, and
/// the items popped for its handles.
pub struct Reduction<'a, T> {
    pub production: PIdx,
    pub head: &'a ParseItem<T>,
    pub handles: &'a [ParseItem<T>],
}

impl<T> Reduction<'_, T> {
    pub fn pp(&self, grm: &Grammar) -> String {
        let hs = self
            .handles
            .iter()
            .map(|h| h.pp(grm))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "P={}, H=({}), Hs=[{}]",
            self.production,
            self.head.pp(grm),
            hs
        )
    }
}

/// As [`Reduction`], but allowing payloads to be moved out of the handles and into the head.
pub struct ReductionMut<'a, 'input, T> {
    pub production: PIdx,
    pub head: &'a mut ParseItem<T>,
    pub handles: &'a mut [ParseItem<T>],
    pub input: &'a InputBuffer<'input>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// The lexer could not match the input.
    Lexical,
    /// The current state has no action for the lookahead token.
    Syntax,
    /// The table is inconsistent: a reduction exposed a state with no goto for the production's
    /// head, or an action had the wrong kind.
    Internal,
}

/// Records a parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    state: StIdx,
    token: Token,
    expected: Vec<SymIdx>,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, state: StIdx, token: Token) -> Self {
        ParseError {
            kind,
            state,
            token,
            expected: Vec::new(),
        }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// The `(line, column)` of the offending token.
    pub fn position(&self) -> (usize, usize) {
        self.token.position()
    }

    /// The state the parser was in when the error occurred.
    pub fn state(&self) -> StIdx {
        self.state
    }

    /// The lookahead token at the point of the error.
    pub fn token(&self) -> Token {
        self.token
    }

    /// For syntax errors, the terminal, EOF, and group delimiter symbols which would have been
    /// accepted, ordered by symbol index.
    pub fn expected(&self) -> &[SymIdx] {
        &self.expected
    }

    /// Render this error in the canonical diagnostic format, e.g.
    /// `SyntaxError(1:3) Token=* '*' ExpectedTokens=[-, (, Num]`.
    pub fn pp(&self, grm: &Grammar, input: &InputBuffer<'_>) -> String {
        let (line, col) = self.position();
        match self.kind {
            ParseErrorKind::Lexical => format!(
                "LexicalError({}:{}) Token='{}'",
                line,
                col,
                self.token.lexeme(input)
            ),
            ParseErrorKind::Syntax => {
                let exp = self
                    .expected
                    .iter()
                    .map(|s| grm.symbol(*s).id())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "SyntaxError({}:{}) Token={} ExpectedTokens=[{}]",
                    line,
                    col,
                    self.token.pp(grm, input),
                    exp
                )
            }
            ParseErrorKind::Internal => {
                format!("InternalError({}:{}) State={}", line, col, self.state)
            }
        }
    }
}

impl Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (line, col) = self.position();
        match self.kind {
            ParseErrorKind::Lexical => write!(f, "Lexical error at line {} column {}", line, col),
            ParseErrorKind::Syntax => write!(f, "Syntax error at line {} column {}", line, col),
            ParseErrorKind::Internal => write!(
                f,
                "Internal error in state {} at line {} column {}",
                self.state, line, col
            ),
        }
    }
}

/// Something which reacts to each step a parser takes, typically by attaching payloads to parse
/// items. Tree builders and evaluators implement this.
pub trait ParseHandler<T> {
    fn on_event(&mut self, event: ParseEvent, psr: &mut Parser<'_, '_, T>);
}

/// Configure and build a [`Parser`].
pub struct ParserBuilder<'grm> {
    grm: &'grm Grammar,
    trim_reductions: bool,
    line_terminator: u8,
}

impl<'grm> ParserBuilder<'grm> {
    pub fn new(grm: &'grm Grammar) -> Self {
        ParserBuilder {
            grm,
            trim_reductions: false,
            line_terminator: DEFAULT_LINE_TERMINATOR,
        }
    }

    /// If set to true, reductions by productions consisting of a single non-terminal are
    /// reported as [`ParseEvent::ReduceEliminated`] and leave the stack untouched apart from its
    /// top state. Defaults to false.
    pub fn trim_reductions(mut self, trim: bool) -> Self {
        self.trim_reductions = trim;
        self
    }

    /// Set the byte which increments the line count of the underlying lexer.
    pub fn line_terminator(mut self, b: u8) -> Self {
        self.line_terminator = b;
        self
    }

    pub fn build<'input, T>(self) -> Parser<'grm, 'input, T> {
        let mut psr = Parser {
            grm: self.grm,
            lexer: LexerBuilder::new(self.grm)
                .line_terminator(self.line_terminator)
                .build(),
            trim_reductions: self.trim_reductions,
            state: self.grm.lalr_init(),
            stack: Vec::new(),
            handles: Vec::new(),
            reduced: None,
            token: None,
            token_used: true,
            error: None,
        };
        psr.reset_state();
        psr
    }
}

/// A step-wise LALR(1) parser. Each call to [`parse_step`](Parser::parse_step) performs exactly
/// one transition and reports it as a [`ParseEvent`].
pub struct Parser<'grm, 'input, T = ()> {
    grm: &'grm Grammar,
    lexer: Lexer<'grm, 'input>,
    trim_reductions: bool,
    state: StIdx,
    stack: Vec<ParseItem<T>>,
    /// The items popped by the most recent reduction.
    handles: Vec<ParseItem<T>>,
    reduced: Option<PIdx>,
    token: Option<Token>,
    token_used: bool,
    error: Option<ParseError>,
}

impl<'grm, 'input, T> Parser<'grm, 'input, T> {
    /// Create a parser with the default configuration.
    pub fn new(grm: &'grm Grammar) -> Self {
        ParserBuilder::new(grm).build()
    }

    pub fn grammar(&self) -> &'grm Grammar {
        self.grm
    }

    pub fn lexer(&self) -> &Lexer<'grm, 'input> {
        &self.lexer
    }

    pub fn load(&mut self, input: InputBuffer<'input>) {
        self.lexer.load(input);
        self.reset_state();
    }

    pub fn load_str(&mut self, s: &'input str) {
        self.load(InputBuffer::shared(s));
    }

    pub fn load_string(&mut self, s: String) {
        self.load(InputBuffer::owned(s));
    }

    /// Share `b`, which must be valid UTF-8. On error the previous input is kept.
    pub fn load_bytes(&mut self, b: &'input [u8]) -> Result<(), InputError> {
        self.lexer.load_bytes(b)?;
        self.reset_state();
        Ok(())
    }

    /// Read the file at `path`, which must be valid UTF-8. On error the previous input is kept.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), InputError> {
        self.lexer.load_file(path)?;
        self.reset_state();
        Ok(())
    }

    /// Restart parsing the current input from its beginning.
    pub fn reset_cursor(&mut self) {
        self.lexer.reset_cursor();
        self.reset_state();
    }

    /// Hand the current input to the caller, leaving the parser with no input.
    pub fn release_buffer(&mut self) -> InputBuffer<'input> {
        let buf = self.lexer.release_buffer();
        self.reset_state();
        buf
    }

    pub fn buffer(&self) -> &InputBuffer<'input> {
        self.lexer.buffer()
    }

    fn reset_state(&mut self) {
        self.state = self.grm.lalr_init();
        self.stack.clear();
        self.stack.push(ParseItem {
            state: self.state,
            production: None,
            token: None,
            payload: None,
        });
        self.handles.clear();
        self.reduced = None;
        self.token = None;
        self.token_used = true;
        self.error = None;
    }

    /// Perform one shift, reduce, or accept.
    pub fn parse_step(&mut self) -> ParseEvent {
        self.reduced = None;
        let tok = match self.token {
            Some(t) if !self.token_used => t,
            _ => {
                let t = self.lexer.read_token();
                self.token = Some(t);
                self.token_used = false;
                t
            }
        };

        let grm = self.grm;
        if grm.symbol(tok.symbol()).kind() == SymbolKind::Error {
            return self.fail(ParseError::new(ParseErrorKind::Lexical, self.state, tok));
        }

        match grm.action(self.state, tok.symbol()) {
            None => {
                let mut err = ParseError::new(ParseErrorKind::Syntax, self.state, tok);
                err.expected = grm
                    .lalr_state(self.state)
                    .actions()
                    .keys()
                    .filter(|s| {
                        matches!(
                            grm.symbol(**s).kind(),
                            SymbolKind::Terminal
                                | SymbolKind::EndOfFile
                                | SymbolKind::GroupStart
                                | SymbolKind::GroupEnd
                        )
                    })
                    .copied()
                    .collect();
                self.fail(err)
            }
            Some(Action::Shift(st)) => {
                trace!("Shift {} -> state {}", grm.symbol(tok.symbol()).id(), st);
                self.state = st;
                self.stack.push(ParseItem {
                    state: st,
                    production: None,
                    token: Some(tok),
                    payload: None,
                });
                self.token_used = true;
                ParseEvent::Shift
            }
            Some(Action::Reduce(pidx)) => self.reduce(pidx, tok),
            Some(Action::Accept) => {
                debug!("Accepted input");
                ParseEvent::Accept
            }
            Some(Action::Goto(_)) => {
                self.fail(ParseError::new(ParseErrorKind::Internal, self.state, tok))
            }
        }
    }

    fn reduce(&mut self, pidx: PIdx, tok: Token) -> ParseEvent {
        let grm = self.grm;
        let prod = grm.prod(pidx);
        let trimmed = self.trim_reductions
            && prod.handles().len() == 1
            && grm.symbol(prod.handles()[0]).kind() == SymbolKind::NonTerminal;

        let exposed = if trimmed {
            match self.stack.len().checked_sub(2) {
                Some(i) => self.stack[i].state,
                None => {
                    return self.fail(ParseError::new(ParseErrorKind::Internal, self.state, tok));
                }
            }
        } else {
            let n = prod.handles().len();
            // The bottom item is never popped.
            if n >= self.stack.len() {
                return self.fail(ParseError::new(ParseErrorKind::Internal, self.state, tok));
            }
            self.handles.clear();
            let split = self.stack.len() - n;
            self.handles.extend(self.stack.drain(split..));
            self.stack[split - 1].state
        };

        let st = match grm.action(exposed, prod.head()) {
            Some(Action::Goto(st)) => st,
            _ => return self.fail(ParseError::new(ParseErrorKind::Internal, self.state, tok)),
        };
        self.state = st;
        if trimmed {
            trace!("Eliminated reduction {} -> state {}", prod.id(), st);
            if let Some(top) = self.stack.last_mut() {
                top.state = st;
            }
            ParseEvent::ReduceEliminated
        } else {
            trace!("Reduce {} -> state {}", prod.id(), st);
            self.stack.push(ParseItem {
                state: st,
                production: Some(pidx),
                token: None,
                payload: None,
            });
            self.reduced = Some(pidx);
            ParseEvent::Reduce
        }
    }

    fn fail(&mut self, err: ParseError) -> ParseEvent {
        debug!("{}", err);
        self.error = Some(err);
        ParseEvent::Error
    }

    /// Step until the input is accepted, a reduction occurs, or an error occurs.
    pub fn parse_reduce(&mut self) -> ParseEvent {
        loop {
            match self.parse_step() {
                e @ (ParseEvent::Accept | ParseEvent::Reduce | ParseEvent::Error) => return e,
                _ => (),
            }
        }
    }

    /// Step until the input is accepted or an error occurs.
    pub fn parse_all(&mut self) -> ParseEvent {
        loop {
            match self.parse_step() {
                e @ (ParseEvent::Accept | ParseEvent::Error) => return e,
                _ => (),
            }
        }
    }

    /// Step until the input is accepted or an error occurs, passing every event to `handler`.
    pub fn parse_all_with<H>(&mut self, handler: &mut H) -> ParseEvent
    where
        H: ParseHandler<T> + ?Sized,
    {
        loop {
            let e = self.parse_step();
            handler.on_event(e, self);
            if matches!(e, ParseEvent::Accept | ParseEvent::Error) {
                return e;
            }
        }
    }

    /// The current LALR state.
    pub fn state(&self) -> StIdx {
        self.state
    }

    pub fn stack(&self) -> &[ParseItem<T>] {
        &self.stack
    }

    pub fn top(&self) -> Option<&ParseItem<T>> {
        self.stack.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut ParseItem<T>> {
        self.stack.last_mut()
    }

    /// The most recently read token: after a shift, the token that was shifted.
    pub fn token(&self) -> Option<Token> {
        self.token
    }

    /// The reduction performed by the most recent step, if that step was a
    /// [`ParseEvent::Reduce`].
    pub fn reduction(&self) -> Option<Reduction<'_, T>> {
        let production = self.reduced?;
        Some(Reduction {
            production,
            head: self.stack.last()?,
            handles: &self.handles,
        })
    }

    pub fn reduction_mut(&mut self) -> Option<ReductionMut<'_, 'input, T>> {
        let production = self.reduced?;
        Some(ReductionMut {
            production,
            head: self.stack.last_mut()?,
            handles: &mut self.handles,
            input: self.lexer.buffer(),
        })
    }

    /// The error reported by the most recent step, if that step was a [`ParseEvent::Error`].
    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    pub fn position(&self) -> (usize, usize) {
        self.lexer.position()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use grammar_testing::{
        fixtures::{list_table, operator_table},
        writer::{END_OF_FILE, ERROR, NONTERMINAL, REDUCE, SHIFT, TERMINAL, TableBuilder},
    };

    /// Parse `input` to completion, returning every event rendered alongside the parser state.
    fn trace_events(psr: &mut Parser) -> Vec<String> {
        let mut evs = Vec::new();
        loop {
            let e = psr.parse_step();
            evs.push(format!("{:?} {}", e, psr.state()));
            if matches!(e, ParseEvent::Accept | ParseEvent::Error) {
                return evs;
            }
        }
    }

    #[test]
    fn events() {
        let grm = Grammar::from_bytes(&list_table()).unwrap();
        let mut psr: Parser = Parser::new(&grm);
        psr.load_str("[a]");
        let evs = (0..6).map(|_| psr.parse_step()).collect::<Vec<_>>();
        assert_eq!(
            evs,
            vec![
                ParseEvent::Shift,
                ParseEvent::Shift,
                ParseEvent::Reduce,
                ParseEvent::Shift,
                ParseEvent::Reduce,
                ParseEvent::Accept
            ]
        );
        assert_eq!(psr.parse_step(), ParseEvent::Accept);
        assert!(psr.error().is_none());
    }

    #[test]
    fn reductions() {
        let grm = Grammar::from_bytes(&list_table()).unwrap();
        let mut psr: Parser = Parser::new(&grm);
        psr.load_str("[a]");
        assert!(psr.reduction().is_none());
        assert_eq!(psr.parse_reduce(), ParseEvent::Reduce);
        let r = psr.reduction().unwrap();
        assert_eq!(r.pp(&grm), "P=3, H=(S=4, P=<List1> ::= Id), Hs=[S=5, T=Id]");
        assert_eq!(r.handles[0].lexeme(psr.buffer()), Some("a"));
        assert_eq!(psr.parse_reduce(), ParseEvent::Reduce);
        assert_eq!(psr.reduction().unwrap().production, PIdx(0));
        assert_eq!(psr.stack().len(), 2);
        assert_eq!(psr.stack()[0].pp(&grm), "S=0");
        assert_eq!(psr.parse_reduce(), ParseEvent::Accept);
        assert!(psr.reduction().is_none());
    }

    #[test]
    fn empty_productions() {
        let grm = Grammar::from_bytes(&list_table()).unwrap();
        let mut psr: Parser = Parser::new(&grm);
        psr.load_str("{}");
        assert_eq!(psr.parse_reduce(), ParseEvent::Reduce);
        let r = psr.reduction().unwrap();
        assert_eq!(grm.prod(r.production).id(), "<List2> ::=");
        assert!(r.handles.is_empty());
        assert_eq!(psr.parse_all(), ParseEvent::Accept);
    }

    #[test]
    fn syntax_error() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        let mut psr: Parser = Parser::new(&grm);
        psr.load_str("2+*3");
        assert_eq!(psr.parse_all(), ParseEvent::Error);
        let e = psr.error().unwrap();
        assert_eq!(e.kind(), ParseErrorKind::Syntax);
        assert_eq!(e.position(), (1, 3));
        assert_eq!(
            e.pp(&grm, psr.buffer()),
            "SyntaxError(1:3) Token=* '*' ExpectedTokens=[-, (, Num]"
        );
        assert_eq!(e.to_string(), "Syntax error at line 1 column 3");
        for s in e.expected() {
            assert!(matches!(
                grm.symbol(*s).kind(),
                SymbolKind::Terminal | SymbolKind::EndOfFile
            ));
        }

        psr.load_str("(1");
        assert_eq!(psr.parse_all(), ParseEvent::Error);
        assert_eq!(
            psr.error().unwrap().pp(&grm, psr.buffer()),
            "SyntaxError(1:3) Token=(EOF) '' ExpectedTokens=[-, ), +]"
        );
    }

    #[test]
    fn lexical_error() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        let mut psr: Parser = Parser::new(&grm);
        psr.load_str("2 + $");
        assert_eq!(psr.parse_all(), ParseEvent::Error);
        let e = psr.error().unwrap();
        assert_eq!(e.kind(), ParseErrorKind::Lexical);
        assert_eq!(e.pp(&grm, psr.buffer()), "LexicalError(1:5) Token='$'");

        // The parser stays usable.
        psr.load_str("2 + 3");
        assert_eq!(psr.parse_all(), ParseEvent::Accept);
        assert!(psr.error().is_none());
    }

    #[test]
    fn internal_error() {
        // State 0 can shift `a`, but has no goto for `<S>`.
        let mut tb = TableBuilder::new();
        let eof = tb.symbol("EOF", END_OF_FILE);
        tb.symbol("Error", ERROR);
        let a = tb.symbol("a", TERMINAL);
        let s = tb.symbol("S", NONTERMINAL);
        tb.literal(a, "a");
        tb.production(s, &[a]);
        tb.lalr_state(&[(a, SHIFT, 1)]);
        tb.lalr_state(&[(eof, REDUCE, 0)]);
        let grm = Grammar::from_bytes(&tb.to_bytes()).unwrap();
        let mut psr: Parser = Parser::new(&grm);
        psr.load_str("a");
        assert_eq!(psr.parse_step(), ParseEvent::Shift);
        assert_eq!(psr.parse_step(), ParseEvent::Error);
        let e = psr.error().unwrap();
        assert_eq!(e.kind(), ParseErrorKind::Internal);
        assert_eq!(e.pp(&grm, psr.buffer()), "InternalError(1:2) State=1");
    }

    #[test]
    fn reset_cursor_is_idempotent() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        let mut psr: Parser = Parser::new(&grm);
        psr.load_str("-2*(3+4)-5 /* five */");
        let first = trace_events(&mut psr);
        assert_eq!(first.last().unwrap(), "Accept 1");
        psr.reset_cursor();
        assert_eq!(trace_events(&mut psr), first);
    }

    #[test]
    fn trimmed_reductions() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        let mut psr: Parser = ParserBuilder::new(&grm).trim_reductions(true).build();
        psr.load_str("(1)");
        let mut evs = Vec::new();
        loop {
            let e = psr.parse_step();
            if e == ParseEvent::Reduce {
                evs.push(grm.prod(psr.reduction().unwrap().production).id().to_owned());
            } else if e == ParseEvent::ReduceEliminated {
                evs.push("-".to_owned());
            }
            if e == ParseEvent::Accept {
                break;
            }
        }
        assert_eq!(
            evs,
            vec![
                "<V> ::= Num",
                "-",
                "-",
                "-",
                "<V> ::= ( <E> )",
                "-",
                "-",
                "-"
            ]
        );
        // Only the bottom item and the accepted item remain.
        assert_eq!(psr.stack().len(), 2);
        assert_eq!(psr.stack()[1].production(), Some(PIdx(9)));
    }

    #[test]
    fn release_buffer() {
        let grm = Grammar::from_bytes(&list_table()).unwrap();
        let mut psr: Parser = Parser::new(&grm);
        psr.load_string("[x, y]".to_owned());
        assert_eq!(psr.parse_all(), ParseEvent::Accept);
        let buf = psr.release_buffer();
        assert_eq!(buf.as_str(), "[x, y]");
        assert_eq!(psr.stack().len(), 1);
        assert_eq!(psr.parse_all(), ParseEvent::Error);
        assert_eq!(
            psr.error().unwrap().pp(&grm, psr.buffer()),
            "SyntaxError(1:1) Token=(EOF) '' ExpectedTokens=[[, {]"
        );
    }
}
