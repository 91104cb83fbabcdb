use std::{error::Error, fmt, fs, io, path::Path};

use indexmap::IndexMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    CharSetIdx, DfaStIdx, GroupIdx, PIdx, StIdx, SymIdx,
    decoder::{RawTables, TableError, TableErrorKind, decode},
    dfa::{self, DfaState},
    lalr::{Action, LalrState},
};

/// A `(name, value)` pair recorded in the table by the grammar's author.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Property {
    pub index: usize,
    pub name: String,
    pub value: String,
}

/// A set of code points within one Unicode plane, as inclusive ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CharacterSet {
    pub idx: CharSetIdx,
    pub plane: u16,
    pub ranges: Vec<(u16, u16)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SymbolKind {
    NonTerminal,
    Terminal,
    Noise,
    EndOfFile,
    GroupStart,
    GroupEnd,
    Decremented,
    Error,
}

impl SymbolKind {
    pub fn from_code(code: i16) -> Option<Self> {
        Some(match code {
            0 => SymbolKind::NonTerminal,
            1 => SymbolKind::Terminal,
            2 => SymbolKind::Noise,
            3 => SymbolKind::EndOfFile,
            4 => SymbolKind::GroupStart,
            5 => SymbolKind::GroupEnd,
            6 => SymbolKind::Decremented,
            7 => SymbolKind::Error,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Symbol {
    idx: SymIdx,
    name: String,
    kind: SymbolKind,
    id: String,
    single_lexeme: bool,
}

impl Symbol {
    pub(crate) fn new(idx: SymIdx, name: String, kind: SymbolKind) -> Self {
        let id = match kind {
            SymbolKind::NonTerminal => format!("<{}>", name),
            SymbolKind::Terminal => name.clone(),
            _ => format!("({})", name),
        };
        Symbol {
            idx,
            name,
            kind,
            id,
            single_lexeme: false,
        }
    }

    pub fn idx(&self) -> SymIdx {
        self.idx
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    /// The canonical textual ID: `<Name>` for non-terminals, `Name` for terminals and `(Name)`
    /// for everything else.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Is this symbol only ever matched by one fixed lexeme (e.g. a keyword or punctuation)?
    pub fn single_lexeme(&self) -> bool {
        self.single_lexeme
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// How input inside a group that is not a nested group or the group's end is consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AdvanceMode {
    Token,
    Character,
}

impl AdvanceMode {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(AdvanceMode::Token),
            1 => Some(AdvanceMode::Character),
            _ => None,
        }
    }
}

/// Whether a group's end delimiter is part of the group's lexeme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EndingMode {
    Open,
    Closed,
}

impl EndingMode {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(EndingMode::Open),
            1 => Some(EndingMode::Closed),
            _ => None,
        }
    }
}

/// A lexical group: a region such as a block comment which the lexer reduces to a single token
/// of the `container` symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SymbolGroup {
    pub idx: GroupIdx,
    pub name: String,
    pub container: SymIdx,
    pub start: SymIdx,
    pub end: SymIdx,
    pub advance: AdvanceMode,
    pub ending: EndingMode,
    pub nesting: Vec<GroupIdx>,
}

impl SymbolGroup {
    /// May group `gidx` open inside this group?
    pub fn nests(&self, gidx: GroupIdx) -> bool {
        self.nesting.contains(&gidx)
    }
}

/// A production, together with the rules which control how it is represented in a simplified
/// tree.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Production {
    idx: PIdx,
    head: SymIdx,
    handles: Vec<SymIdx>,
    id: String,
    forward_child: bool,
    merge_child: bool,
    listify_recursion: bool,
    remove_single_lexeme: bool,
}

impl Production {
    pub(crate) fn new(idx: PIdx, head: SymIdx, handles: Vec<SymIdx>) -> Self {
        Production {
            idx,
            head,
            handles,
            id: String::new(),
            forward_child: false,
            merge_child: false,
            listify_recursion: false,
            remove_single_lexeme: false,
        }
    }

    pub fn idx(&self) -> PIdx {
        self.idx
    }

    pub fn head(&self) -> SymIdx {
        self.head
    }

    pub fn handles(&self) -> &[SymIdx] {
        &self.handles
    }

    /// The canonical textual ID, e.g. `<E> ::= <E> + <M>`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Does this production disappear from simplified trees, in favour of its only child?
    pub fn forward_child(&self) -> bool {
        self.forward_child
    }

    /// Are children built by the same production spliced into this production's node?
    pub fn merge_child(&self) -> bool {
        self.merge_child
    }

    /// Is this production left recursive on its own head, so that its chains are flattened into
    /// a single list node?
    pub fn listify_recursion(&self) -> bool {
        self.listify_recursion
    }

    /// Are single-lexeme terminals dropped from this production's node?
    pub fn remove_single_lexeme(&self) -> bool {
        self.remove_single_lexeme
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    Table(TableError),
}

impl Error for LoadError {}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "Can't read grammar table: {}", e),
            LoadError::Table(e) => write!(f, "{}", e),
        }
    }
}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        LoadError::Io(err)
    }
}

impl From<TableError> for LoadError {
    fn from(err: TableError) -> Self {
        LoadError::Table(err)
    }
}

/// A loaded and linked grammar table. Apart from the `merge_child` and `forward_child` flags of
/// productions, a `Grammar` is immutable once built, and may be shared between any number of
/// lexers and parsers.
#[derive(Debug)]
pub struct Grammar {
    properties: Vec<Property>,
    charsets: Vec<CharacterSet>,
    symbols: Vec<Symbol>,
    groups: Vec<SymbolGroup>,
    prods: Vec<Production>,
    dfa_states: Vec<DfaState>,
    lalr_states: Vec<LalrState>,
    dfa_init: DfaStIdx,
    lalr_init: StIdx,
    eof: SymIdx,
    error: SymIdx,
    symbol_ids: IndexMap<String, SymIdx>,
    prod_ids: IndexMap<String, PIdx>,
    /// For each symbol, the group it starts (if any).
    group_starts: Vec<Option<GroupIdx>>,
}

fn present<T>(rows: Vec<Option<T>>, what: &'static str) -> Result<Vec<T>, TableError> {
    rows.into_iter()
        .enumerate()
        .map(|(i, r)| r.ok_or_else(|| TableError::link(TableErrorKind::MissingRow(what, i))))
        .collect()
}

fn check(idx: usize, len: usize, what: &'static str) -> Result<(), TableError> {
    if idx < len {
        Ok(())
    } else {
        Err(TableError::link(TableErrorKind::IndexOutOfRange(
            what,
            idx as i64,
        )))
    }
}

impl Grammar {
    /// Decode and link the table in `buf`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, TableError> {
        Grammar::from_raw(decode(buf)?)
    }

    /// Read, decode, and link the table stored at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let buf = fs::read(path)?;
        Ok(Grammar::from_bytes(&buf)?)
    }

    /// Link already decoded rows, checking every cross reference, and derive the lookup tables
    /// used by lexers and parsers.
    pub fn from_raw(raw: RawTables) -> Result<Self, TableError> {
        let charsets = present(raw.charsets, "character sets")?;
        let mut symbols = present(raw.symbols, "symbols")?;
        let groups = present(raw.groups, "groups")?;
        let mut prods = present(raw.productions, "productions")?;
        let mut dfa_states = present(raw.dfa_states, "DFA states")?;
        let mut lalr_states = present(raw.lalr_states, "LALR states")?;
        let (dfa_init, lalr_init) = raw
            .init
            .ok_or_else(|| TableError::link(TableErrorKind::MissingRow("initial states", 0)))?;

        let find = |kind| {
            symbols
                .iter()
                .find(|s| s.kind == kind)
                .map(|s| s.idx)
                .ok_or_else(|| TableError::link(TableErrorKind::MissingSymbol(kind)))
        };
        let eof = find(SymbolKind::EndOfFile)?;
        let error = find(SymbolKind::Error)?;

        let (syms_len, prods_len) = (symbols.len(), prods.len());
        check(usize::from(dfa_init), dfa_states.len(), "DFA states")?;
        check(usize::from(lalr_init), lalr_states.len(), "LALR states")?;
        for p in &prods {
            check(usize::from(p.head), syms_len, "symbols")?;
            for h in &p.handles {
                check(usize::from(*h), syms_len, "symbols")?;
            }
        }
        for g in &groups {
            for s in [g.container, g.start, g.end] {
                check(usize::from(s), syms_len, "symbols")?;
            }
            for n in &g.nesting {
                check(usize::from(*n), groups.len(), "groups")?;
            }
        }
        for d in &dfa_states {
            if let Some(a) = d.accept() {
                check(usize::from(a), syms_len, "symbols")?;
            }
            for e in d.edges() {
                check(usize::from(e.charset), charsets.len(), "character sets")?;
                check(usize::from(e.target), dfa_states.len(), "DFA states")?;
            }
        }
        for l in &lalr_states {
            for (sym, act) in l.actions() {
                check(usize::from(*sym), syms_len, "symbols")?;
                match *act {
                    Action::Shift(st) | Action::Goto(st) => {
                        check(usize::from(st), lalr_states.len(), "LALR states")?
                    }
                    Action::Reduce(p) => check(usize::from(p), prods_len, "productions")?,
                    Action::Accept => (),
                }
            }
        }

        let mut symbol_ids = IndexMap::with_capacity(syms_len);
        for s in &symbols {
            symbol_ids.insert(s.id.clone(), s.idx);
        }
        let mut prod_ids = IndexMap::with_capacity(prods_len);
        for p in prods.iter_mut() {
            let mut id = format!("{} ::=", symbols[usize::from(p.head)].id);
            for h in &p.handles {
                id.push(' ');
                id.push_str(&symbols[usize::from(*h)].id);
            }
            p.id = id;
            prod_ids.insert(p.id.clone(), p.idx);
        }

        let mut group_starts = vec![None; syms_len];
        for g in &groups {
            let slot = &mut group_starts[usize::from(g.start)];
            if slot.is_none() {
                *slot = Some(g.idx);
            }
        }

        for d in dfa_states.iter_mut() {
            d.build_lookup(&charsets);
        }
        for l in lalr_states.iter_mut() {
            l.build_lookup(syms_len);
        }

        for (sidx, n) in dfa::single_path_accepts(&dfa_states, dfa_init, syms_len)
            .into_iter()
            .enumerate()
        {
            symbols[sidx].single_lexeme = n == 1;
        }
        for p in prods.iter_mut() {
            infer_simplification(p, &symbols);
        }

        log::debug!(
            "Loaded grammar table: {} symbols, {} productions, {} DFA states, {} LALR states",
            syms_len,
            prods_len,
            dfa_states.len(),
            lalr_states.len()
        );

        Ok(Grammar {
            properties: raw.properties,
            charsets,
            symbols,
            groups,
            prods,
            dfa_states,
            lalr_states,
            dfa_init,
            lalr_init,
            eof,
            error,
            symbol_ids,
            prod_ids,
            group_starts,
        })
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// The value of the property `name`, if it exists.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn charsets(&self) -> &[CharacterSet] {
        &self.charsets
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, sidx: SymIdx) -> &Symbol {
        &self.symbols[usize::from(sidx)]
    }

    /// How many symbols does this grammar have?
    pub fn symbols_len(&self) -> usize {
        self.symbols.len()
    }

    /// Look up a symbol by its canonical ID (e.g. `<E>`, `Num`, `(EOF)`).
    pub fn symbol_idx(&self, id: &str) -> Option<SymIdx> {
        self.symbol_ids.get(id).copied()
    }

    pub fn groups(&self) -> &[SymbolGroup] {
        &self.groups
    }

    pub fn group(&self, gidx: GroupIdx) -> &SymbolGroup {
        &self.groups[usize::from(gidx)]
    }

    /// The group whose start delimiter is `sidx`, if there is one.
    pub fn group_started_by(&self, sidx: SymIdx) -> Option<GroupIdx> {
        self.group_starts[usize::from(sidx)]
    }

    pub fn prods(&self) -> &[Production] {
        &self.prods
    }

    pub fn prod(&self, pidx: PIdx) -> &Production {
        &self.prods[usize::from(pidx)]
    }

    pub fn prods_len(&self) -> usize {
        self.prods.len()
    }

    /// Look up a production by its canonical ID (e.g. `<E> ::= <E> + <M>`).
    pub fn prod_idx(&self, id: &str) -> Option<PIdx> {
        self.prod_ids.get(id).copied()
    }

    pub fn set_merge_child(&mut self, pidx: PIdx, merge: bool) {
        self.prods[usize::from(pidx)].merge_child = merge;
    }

    pub fn set_forward_child(&mut self, pidx: PIdx, forward: bool) {
        self.prods[usize::from(pidx)].forward_child = forward;
    }

    pub fn dfa_states(&self) -> &[DfaState] {
        &self.dfa_states
    }

    pub fn dfa_state(&self, didx: DfaStIdx) -> &DfaState {
        &self.dfa_states[usize::from(didx)]
    }

    pub fn dfa_init(&self) -> DfaStIdx {
        self.dfa_init
    }

    pub fn lalr_states(&self) -> &[LalrState] {
        &self.lalr_states
    }

    pub fn lalr_state(&self, stidx: StIdx) -> &LalrState {
        &self.lalr_states[usize::from(stidx)]
    }

    pub fn lalr_init(&self) -> StIdx {
        self.lalr_init
    }

    /// The action for `sidx` in state `stidx`, if there is one.
    pub fn action(&self, stidx: StIdx, sidx: SymIdx) -> Option<Action> {
        self.lalr_state(stidx).action(sidx)
    }

    pub fn eof_symbol(&self) -> SymIdx {
        self.eof
    }

    pub fn error_symbol(&self) -> SymIdx {
        self.error
    }
}

fn infer_simplification(p: &mut Production, symbols: &[Symbol]) {
    // Non-terminals, terminals, and terminals which can match more than one lexeme.
    let (mut nts, mut ts, mut its) = (0, 0, 0);
    for h in &p.handles {
        let s = &symbols[usize::from(*h)];
        match s.kind {
            SymbolKind::Terminal => {
                ts += 1;
                if !s.single_lexeme {
                    its += 1;
                }
            }
            SymbolKind::NonTerminal => nts += 1,
            _ => (),
        }
    }
    p.forward_child = (nts == 1 && ts == 0) || (nts == 0 && its == 1) || (nts == 0 && ts == 1);
    p.merge_child = false;
    p.listify_recursion = p
        .handles
        .iter()
        .any(|h| *h == p.head && symbols[usize::from(*h)].kind == SymbolKind::NonTerminal);
    p.remove_single_lexeme = (nts > 0 || its > 0) && ts > its;
}

#[cfg(test)]
mod test {
    use super::*;
    use grammar_testing::{
        fixtures::{list_table, operator_table},
        writer::{self, END_OF_FILE, ERROR, REDUCE, TERMINAL, TableBuilder},
    };

    #[test]
    fn sizes_match_header() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        assert_eq!(grm.symbols_len(), 17);
        assert_eq!(grm.prods_len(), 10);
        assert_eq!(grm.lalr_states().len(), 19);
        assert_eq!(grm.groups().len(), 1);
        assert_eq!(grm.eof_symbol(), SymIdx(0));
        assert_eq!(grm.error_symbol(), SymIdx(1));
        assert_eq!(grm.property("Name"), Some("Operators"));
        assert_eq!(grm.property("Author"), None);
    }

    #[test]
    fn ids() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        assert_eq!(grm.symbol(SymIdx(0)).id(), "(EOF)");
        assert_eq!(grm.symbol(SymIdx(4)).id(), "(Comment Start)");
        assert_eq!(grm.symbol(SymIdx(12)).id(), "Num");
        assert_eq!(grm.symbol(SymIdx(13)).id(), "<E>");
        assert_eq!(grm.prod(PIdx(0)).id(), "<E> ::= <E> + <M>");
        assert_eq!(grm.prod(PIdx(9)).to_string(), "<V> ::= ( <E> )");
        assert_eq!(grm.symbol_idx("<V>"), Some(SymIdx(16)));
        assert_eq!(grm.symbol_idx("V"), None);
        assert_eq!(grm.prod_idx("<N> ::= - <V>"), Some(PIdx(6)));
        assert_eq!(grm.group_started_by(SymIdx(4)), Some(GroupIdx(0)));
        assert_eq!(grm.group_started_by(SymIdx(5)), None);
    }

    #[test]
    fn single_lexeme() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        for id in ["-", "(", ")", "*", "/", "+"] {
            let s = grm.symbol(grm.symbol_idx(id).unwrap());
            assert!(s.single_lexeme(), "{}", id);
        }
        assert!(!grm.symbol(grm.symbol_idx("Num").unwrap()).single_lexeme());
        assert!(!grm.symbol(grm.symbol_idx("(Whitespace)").unwrap()).single_lexeme());
    }

    #[test]
    fn simplification_rules() {
        let mut grm = Grammar::from_bytes(&list_table()).unwrap();
        let flags = |grm: &Grammar, i| {
            let p = grm.prod(PIdx(i));
            (
                p.forward_child(),
                p.merge_child(),
                p.listify_recursion(),
                p.remove_single_lexeme(),
            )
        };
        // <List> ::= [ <List1> ]
        assert_eq!(flags(&grm, 0), (false, false, false, true));
        // <List1> ::= <List1> , Id
        assert_eq!(flags(&grm, 2), (false, false, true, true));
        // <List1> ::= Id
        assert_eq!(flags(&grm, 3), (true, false, false, false));
        // <List2> ::=
        assert_eq!(flags(&grm, 5), (false, false, false, false));

        grm.set_merge_child(PIdx(0), true);
        grm.set_forward_child(PIdx(3), false);
        assert_eq!(flags(&grm, 0), (false, true, false, true));
        assert_eq!(flags(&grm, 3), (false, false, false, false));
    }

    #[test]
    fn operator_rules() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        // <E> ::= <E> + <M>
        assert!(grm.prod(PIdx(0)).listify_recursion());
        assert!(grm.prod(PIdx(0)).remove_single_lexeme());
        // <E> ::= <M>
        assert!(grm.prod(PIdx(2)).forward_child());
        // <N> ::= - <V>
        assert!(!grm.prod(PIdx(6)).forward_child());
        assert!(grm.prod(PIdx(6)).remove_single_lexeme());
        // <V> ::= Num
        assert!(grm.prod(PIdx(8)).forward_child());
        assert!(!grm.prod(PIdx(8)).remove_single_lexeme());
        // <V> ::= ( <E> )
        assert!(!grm.prod(PIdx(9)).forward_child());
    }

    #[test]
    fn corrupt_magic_fails() {
        let mut buf = operator_table();
        buf[0] = b'X';
        let e = Grammar::from_bytes(&buf).unwrap_err();
        assert_eq!(e.kind, TableErrorKind::BadMagic);
    }

    #[test]
    fn empty_table_fails_to_link() {
        let mut buf = Vec::new();
        writer::encode_header(&mut buf);
        assert_eq!(
            Grammar::from_bytes(&buf).unwrap_err().kind,
            TableErrorKind::MissingRow("initial states", 0)
        );
    }

    #[test]
    fn missing_eof() {
        let mut tb = TableBuilder::new();
        tb.symbol("Error", ERROR);
        tb.symbol("a", TERMINAL);
        tb.lalr_state(&[]);
        assert_eq!(
            Grammar::from_bytes(&tb.to_bytes()).unwrap_err().kind,
            TableErrorKind::MissingSymbol(SymbolKind::EndOfFile)
        );
    }

    #[test]
    fn dangling_references() {
        let mut tb = TableBuilder::new();
        let eof = tb.symbol("EOF", END_OF_FILE);
        tb.symbol("Error", ERROR);
        tb.lalr_state(&[(eof, REDUCE, 3)]);
        assert_eq!(
            Grammar::from_bytes(&tb.to_bytes()).unwrap_err().kind,
            TableErrorKind::IndexOutOfRange("productions", 3)
        );

        let mut tb = TableBuilder::new();
        let eof = tb.symbol("EOF", END_OF_FILE);
        tb.symbol("Error", ERROR);
        tb.production(eof, &[9]);
        tb.lalr_state(&[]);
        assert_eq!(
            Grammar::from_bytes(&tb.to_bytes()).unwrap_err().kind,
            TableErrorKind::IndexOutOfRange("symbols", 9)
        );
    }

    #[test]
    fn undeclared_rows_are_missing() {
        let mut buf = Vec::new();
        writer::encode_header(&mut buf);
        let i = |x| writer::Value::Int(x);
        writer::encode_record(
            &mut buf,
            &[writer::Value::Byte(b't'), i(2), i(0), i(0), i(1), i(1), i(0)],
        );
        assert_eq!(
            Grammar::from_bytes(&buf).unwrap_err().kind,
            TableErrorKind::MissingRow("symbols", 0)
        );
    }

    #[test]
    fn from_file() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&list_table()).unwrap();
        let grm = Grammar::from_file(f.path()).unwrap();
        assert_eq!(grm.prods_len(), 6);
        match Grammar::from_file(f.path().with_extension("missing")) {
            Err(LoadError::Io(_)) => (),
            r => panic!("{:?}", r.map(|_| ())),
        }
    }
}
