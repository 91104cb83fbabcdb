//! An encoder for the binary grammar table format, used to produce fixture tables without an
//! external grammar compiler.

use std::collections::HashMap;

pub const MAGIC: &str = "GOLD Parser Tables/v5.0";

pub const NONTERMINAL: i16 = 0;
pub const TERMINAL: i16 = 1;
pub const NOISE: i16 = 2;
pub const END_OF_FILE: i16 = 3;
pub const GROUP_START: i16 = 4;
pub const GROUP_END: i16 = 5;
pub const ERROR: i16 = 7;

pub const SHIFT: i16 = 1;
pub const REDUCE: i16 = 2;
pub const GOTO: i16 = 3;
pub const ACCEPT: i16 = 4;

pub const ADVANCE_TOKEN: i16 = 0;
pub const ADVANCE_CHARACTER: i16 = 1;
pub const ENDING_OPEN: i16 = 0;
pub const ENDING_CLOSED: i16 = 1;

/// A single tagged value within a record.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Empty,
    Byte(u8),
    Bool(bool),
    Int(i16),
    Str(String),
}

/// Append `s` as a NUL-terminated UTF-16LE string.
pub fn encode_str(buf: &mut Vec<u8>, s: &str) {
    for u in s.encode_utf16() {
        buf.extend_from_slice(&u.to_le_bytes());
    }
    buf.extend_from_slice(&[0, 0]);
}

pub fn encode_header(buf: &mut Vec<u8>) {
    encode_str(buf, MAGIC);
}

pub fn encode_record(buf: &mut Vec<u8>, vals: &[Value]) {
    buf.push(b'M');
    buf.extend_from_slice(&(vals.len() as u16).to_le_bytes());
    for v in vals {
        match v {
            Value::Empty => buf.push(b'E'),
            Value::Byte(b) => buf.extend_from_slice(&[b'b', *b]),
            Value::Bool(b) => buf.extend_from_slice(&[b'B', u8::from(*b)]),
            Value::Int(i) => {
                buf.push(b'I');
                buf.extend_from_slice(&i.to_le_bytes());
            }
            Value::Str(s) => {
                buf.push(b'S');
                encode_str(buf, s);
            }
        }
    }
}

fn int(x: u16) -> Value {
    Value::Int(x as i16)
}

/// One step of a lexical pattern: a character class matched once, or one or more times.
#[derive(Clone, Debug)]
pub enum Atom {
    One(Vec<(u16, u16)>),
    Many(Vec<(u16, u16)>),
}

impl Atom {
    pub fn ch(c: char) -> Self {
        Atom::One(vec![(c as u16, c as u16)])
    }
}

#[derive(Default)]
struct DfaNode {
    accept: Option<u16>,
    edges: Vec<(usize, u16)>,
}

struct GroupDef {
    name: String,
    container: u16,
    start: u16,
    end: u16,
    advance: i16,
    ending: i16,
    nesting: Vec<u16>,
}

/// Accumulates symbols, productions, groups, lexical patterns and LALR states and encodes them
/// as a complete table. The lexical DFA is built as a trie over pattern atoms: patterns sharing a
/// prefix must use identical character classes, and classes leaving a single state must not
/// overlap.
pub struct TableBuilder {
    properties: Vec<(String, String)>,
    symbols: Vec<(String, i16)>,
    charsets: Vec<Vec<(u16, u16)>>,
    charset_map: HashMap<Vec<(u16, u16)>, usize>,
    groups: Vec<GroupDef>,
    prods: Vec<(u16, Vec<u16>)>,
    dfa: Vec<DfaNode>,
    lalr: Vec<Vec<(u16, i16, u16)>>,
}

impl TableBuilder {
    pub fn new() -> Self {
        TableBuilder {
            properties: Vec::new(),
            symbols: Vec::new(),
            charsets: Vec::new(),
            charset_map: HashMap::new(),
            groups: Vec::new(),
            prods: Vec::new(),
            dfa: vec![DfaNode::default()],
            lalr: Vec::new(),
        }
    }

    pub fn property(&mut self, name: &str, value: &str) {
        self.properties.push((name.to_owned(), value.to_owned()));
    }

    pub fn symbol(&mut self, name: &str, kind: i16) -> u16 {
        self.symbols.push((name.to_owned(), kind));
        (self.symbols.len() - 1) as u16
    }

    pub fn production(&mut self, head: u16, handles: &[u16]) -> u16 {
        self.prods.push((head, handles.to_vec()));
        (self.prods.len() - 1) as u16
    }

    #[allow(clippy::too_many_arguments)]
    pub fn group(
        &mut self,
        name: &str,
        container: u16,
        start: u16,
        end: u16,
        advance: i16,
        ending: i16,
        nesting: &[u16],
    ) -> u16 {
        self.groups.push(GroupDef {
            name: name.to_owned(),
            container,
            start,
            end,
            advance,
            ending,
            nesting: nesting.to_vec(),
        });
        (self.groups.len() - 1) as u16
    }

    /// Add an LALR state whose actions are `(symbol, action kind, target)` triples.
    pub fn lalr_state(&mut self, actions: &[(u16, i16, u16)]) -> u16 {
        self.lalr.push(actions.to_vec());
        (self.lalr.len() - 1) as u16
    }

    /// Make the lexer accept exactly `text` as `sym`.
    pub fn literal(&mut self, sym: u16, text: &str) {
        let atoms = text.chars().map(Atom::ch).collect::<Vec<_>>();
        self.pattern(sym, &atoms);
    }

    pub fn pattern(&mut self, sym: u16, atoms: &[Atom]) {
        let mut cur = 0;
        for a in atoms {
            let (class, many) = match a {
                Atom::One(c) => (c.clone(), false),
                Atom::Many(c) => (c.clone(), true),
            };
            let cs = self.charset(class);
            let existing = self.dfa[cur]
                .edges
                .iter()
                .find(|(e, t)| *e == cs && *t != cur as u16)
                .map(|(_, t)| usize::from(*t));
            let next = match existing {
                Some(n) => n,
                None => {
                    self.dfa.push(DfaNode::default());
                    let n = self.dfa.len() - 1;
                    self.dfa[cur].edges.push((cs, n as u16));
                    n
                }
            };
            if many && !self.dfa[next].edges.iter().any(|(e, t)| *e == cs && usize::from(*t) == next) {
                self.dfa[next].edges.push((cs, next as u16));
            }
            cur = next;
        }
        self.dfa[cur].accept = Some(sym);
    }

    fn charset(&mut self, class: Vec<(u16, u16)>) -> usize {
        if let Some(i) = self.charset_map.get(&class) {
            return *i;
        }
        self.charsets.push(class.clone());
        let i = self.charsets.len() - 1;
        self.charset_map.insert(class, i);
        i
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_header(&mut buf);
        for (i, (n, v)) in self.properties.iter().enumerate() {
            encode_record(
                &mut buf,
                &[
                    Value::Byte(b'p'),
                    int(i as u16),
                    Value::Str(n.clone()),
                    Value::Str(v.clone()),
                ],
            );
        }
        encode_record(
            &mut buf,
            &[
                Value::Byte(b't'),
                int(self.symbols.len() as u16),
                int(self.charsets.len() as u16),
                int(self.prods.len() as u16),
                int(self.dfa.len() as u16),
                int(self.lalr.len() as u16),
                int(self.groups.len() as u16),
            ],
        );
        encode_record(&mut buf, &[Value::Byte(b'I'), int(0), int(0)]);
        for (i, ranges) in self.charsets.iter().enumerate() {
            let mut vals = vec![
                Value::Byte(b'c'),
                int(i as u16),
                int(0),
                int(ranges.len() as u16),
                Value::Empty,
            ];
            for (from, to) in ranges {
                vals.push(int(*from));
                vals.push(int(*to));
            }
            encode_record(&mut buf, &vals);
        }
        for (i, (n, k)) in self.symbols.iter().enumerate() {
            encode_record(
                &mut buf,
                &[
                    Value::Byte(b'S'),
                    int(i as u16),
                    Value::Str(n.clone()),
                    Value::Int(*k),
                ],
            );
        }
        for (i, g) in self.groups.iter().enumerate() {
            let mut vals = vec![
                Value::Byte(b'g'),
                int(i as u16),
                Value::Str(g.name.clone()),
                int(g.container),
                int(g.start),
                int(g.end),
                Value::Int(g.advance),
                Value::Int(g.ending),
                Value::Empty,
                int(g.nesting.len() as u16),
            ];
            vals.extend(g.nesting.iter().map(|x| int(*x)));
            encode_record(&mut buf, &vals);
        }
        for (i, (head, handles)) in self.prods.iter().enumerate() {
            let mut vals = vec![Value::Byte(b'R'), int(i as u16), int(*head), Value::Empty];
            vals.extend(handles.iter().map(|x| int(*x)));
            encode_record(&mut buf, &vals);
        }
        for (i, n) in self.dfa.iter().enumerate() {
            let mut vals = vec![
                Value::Byte(b'D'),
                int(i as u16),
                Value::Bool(n.accept.is_some()),
                n.accept.map(int).unwrap_or(Value::Int(-1)),
                Value::Empty,
            ];
            for (cs, target) in &n.edges {
                vals.push(int(*cs as u16));
                vals.push(int(*target));
                vals.push(Value::Empty);
            }
            encode_record(&mut buf, &vals);
        }
        for (i, actions) in self.lalr.iter().enumerate() {
            let mut vals = vec![Value::Byte(b'L'), int(i as u16), Value::Empty];
            for (sym, kind, target) in actions {
                vals.push(int(*sym));
                vals.push(Value::Int(*kind));
                vals.push(int(*target));
                vals.push(Value::Empty);
            }
            encode_record(&mut buf, &vals);
        }
        buf
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn trie_shares_prefixes() {
        let mut tb = TableBuilder::new();
        let slash = tb.symbol("/", TERMINAL);
        let open = tb.symbol("Comment Start", GROUP_START);
        tb.literal(slash, "/");
        tb.literal(open, "/*");
        assert_eq!(tb.dfa.len(), 3);
        assert_eq!(tb.dfa[1].accept, Some(slash));
        assert_eq!(tb.dfa[2].accept, Some(open));
    }

    #[test]
    fn many_adds_self_loop() {
        let mut tb = TableBuilder::new();
        let id = tb.symbol("Id", TERMINAL);
        tb.pattern(id, &[Atom::Many(vec![(b'a' as u16, b'z' as u16)])]);
        assert_eq!(tb.dfa[1].edges, vec![(0, 1)]);
    }

    #[test]
    fn record_layout() {
        let mut buf = Vec::new();
        encode_record(&mut buf, &[Value::Byte(b'I'), Value::Int(1), Value::Int(-1)]);
        assert_eq!(buf, vec![b'M', 3, 0, b'b', b'I', b'I', 1, 0, b'I', 0xFF, 0xFF]);
    }
}
