//! Decoding of the binary table format into raw, not yet linked, table rows.
//!
//! A table starts with a NUL-terminated UTF-16LE header naming the format, followed by a series
//! of records. Each record is the byte `M`, a little-endian `u16` count, and that many tagged
//! values. The first value of a record is a byte naming the kind of row the record describes.

use std::{collections::BTreeMap, error::Error, fmt};

use crate::{
    CharSetIdx, DfaStIdx, GroupIdx, PIdx, StIdx, SymIdx,
    dfa::{DfaEdge, DfaState},
    grammar::{
        AdvanceMode, CharacterSet, EndingMode, Production, Property, Symbol, SymbolGroup,
        SymbolKind,
    },
    lalr::{Action, LalrState},
};

/// The header every table must start with.
pub const MAGIC: &str = "GOLD Parser Tables/v5.0";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableErrorKind {
    BadMagic,
    Truncated,
    UnknownRecordTag(u8),
    UnknownValueTag(u8),
    UnknownRowKind(u8),
    /// A record of the given row kind has too few values, or a value of the wrong type.
    MalformedRecord(char),
    /// An index into the named table is negative or beyond the table's declared size.
    IndexOutOfRange(&'static str, i64),
    /// The size header declared a row which was never supplied.
    MissingRow(&'static str, usize),
    MissingSymbol(SymbolKind),
    InvalidSymbolKind(i16),
    InvalidActionKind(i16),
    InvalidGroupMode(i16),
}

/// Any error from decoding or linking a grammar table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableError {
    pub kind: TableErrorKind,
    /// The byte offset at which the problem was detected, if it was detected while decoding.
    pub offset: Option<usize>,
}

impl TableError {
    pub(crate) fn link(kind: TableErrorKind) -> Self {
        TableError { kind, offset: None }
    }
}

impl Error for TableError {}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self.kind {
            TableErrorKind::BadMagic => "Not a grammar table (bad header)".to_owned(),
            TableErrorKind::Truncated => "Table is truncated".to_owned(),
            TableErrorKind::UnknownRecordTag(t) => format!("Unknown record tag 0x{:02x}", t),
            TableErrorKind::UnknownValueTag(t) => format!("Unknown value tag 0x{:02x}", t),
            TableErrorKind::UnknownRowKind(t) => format!("Unknown row kind 0x{:02x}", t),
            TableErrorKind::MalformedRecord(k) => format!("Malformed '{}' record", k),
            TableErrorKind::IndexOutOfRange(what, i) => {
                format!("Index {} out of range for {}", i, what)
            }
            TableErrorKind::MissingRow(what, i) => format!("No row {} in {}", i, what),
            TableErrorKind::MissingSymbol(k) => format!("Grammar has no {:?} symbol", k),
            TableErrorKind::InvalidSymbolKind(k) => format!("Invalid symbol kind {}", k),
            TableErrorKind::InvalidActionKind(k) => format!("Invalid action kind {}", k),
            TableErrorKind::InvalidGroupMode(k) => format!("Invalid group mode {}", k),
        };
        match self.offset {
            Some(off) => write!(f, "{} at byte {}", s, off),
            None => write!(f, "{}", s),
        }
    }
}

/// One tagged value of a record.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Empty,
    Byte(u8),
    Bool(bool),
    Int(i16),
    Str(String),
}

/// The rows of a table, exactly as decoded. Rows are positioned by their own index field; a
/// `None` is a row the size header declared but no record supplied.
#[derive(Debug, Default)]
pub struct RawTables {
    pub properties: Vec<Property>,
    pub charsets: Vec<Option<CharacterSet>>,
    pub symbols: Vec<Option<Symbol>>,
    pub groups: Vec<Option<SymbolGroup>>,
    pub productions: Vec<Option<Production>>,
    pub dfa_states: Vec<Option<DfaState>>,
    pub lalr_states: Vec<Option<LalrState>>,
    /// The `(DFA, LALR)` initial states.
    pub init: Option<(DfaStIdx, StIdx)>,
}

struct Reader<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> Reader<'a> {
    fn err(&self, kind: TableErrorKind) -> TableError {
        TableError {
            kind,
            offset: Some(self.off),
        }
    }

    fn at_end(&self) -> bool {
        self.off >= self.buf.len()
    }

    fn u8(&mut self) -> Result<u8, TableError> {
        match self.buf.get(self.off) {
            Some(b) => {
                self.off += 1;
                Ok(*b)
            }
            None => Err(self.err(TableErrorKind::Truncated)),
        }
    }

    fn u16(&mut self) -> Result<u16, TableError> {
        match self.buf.get(self.off..self.off + 2) {
            Some(b) => {
                self.off += 2;
                Ok(u16::from_le_bytes([b[0], b[1]]))
            }
            None => Err(self.err(TableErrorKind::Truncated)),
        }
    }

    /// Read a NUL-terminated UTF-16LE string. Unpaired surrogates are replaced.
    fn string(&mut self) -> Result<String, TableError> {
        let mut units = Vec::new();
        loop {
            match self.u16()? {
                0 => break,
                u => units.push(u),
            }
        }
        Ok(char::decode_utf16(units)
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect())
    }

    fn value(&mut self) -> Result<Value, TableError> {
        let start = self.off;
        match self.u8()? {
            b'E' => Ok(Value::Empty),
            b'b' => Ok(Value::Byte(self.u8()?)),
            b'B' => Ok(Value::Bool(self.u8()? == 1)),
            b'I' => Ok(Value::Int(self.u16()? as i16)),
            b'S' => Ok(Value::Str(self.string()?)),
            t => Err(TableError {
                kind: TableErrorKind::UnknownValueTag(t),
                offset: Some(start),
            }),
        }
    }

    /// Read the next record, or `None` at the end of the buffer.
    fn record(&mut self) -> Result<Option<Vec<Value>>, TableError> {
        if self.at_end() {
            return Ok(None);
        }
        let start = self.off;
        match self.u8()? {
            b'M' => (),
            t => {
                return Err(TableError {
                    kind: TableErrorKind::UnknownRecordTag(t),
                    offset: Some(start),
                });
            }
        }
        let count = self.u16()?;
        let mut vals = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            vals.push(self.value()?);
        }
        Ok(Some(vals))
    }
}

/// Positional access to the values of one record.
struct Row<'v> {
    vals: &'v [Value],
    kind: char,
}

impl Row<'_> {
    fn malformed(&self) -> TableErrorKind {
        TableErrorKind::MalformedRecord(self.kind)
    }

    fn len(&self) -> usize {
        self.vals.len()
    }

    fn int(&self, i: usize) -> Result<i16, TableErrorKind> {
        match self.vals.get(i) {
            Some(Value::Int(x)) => Ok(*x),
            _ => Err(self.malformed()),
        }
    }

    /// An integer which is an index into the table named `what`.
    fn idx(&self, i: usize, what: &'static str) -> Result<u16, TableErrorKind> {
        let x = self.int(i)?;
        num_traits::cast(x).ok_or(TableErrorKind::IndexOutOfRange(what, i64::from(x)))
    }

    /// A non-negative count.
    fn count(&self, i: usize) -> Result<usize, TableErrorKind> {
        let x = self.int(i)?;
        num_traits::cast(x).ok_or_else(|| self.malformed())
    }

    fn bool(&self, i: usize) -> Result<bool, TableErrorKind> {
        match self.vals.get(i) {
            Some(Value::Bool(b)) => Ok(*b),
            _ => Err(self.malformed()),
        }
    }

    fn str(&self, i: usize) -> Result<String, TableErrorKind> {
        match self.vals.get(i) {
            Some(Value::Str(s)) => Ok(s.clone()),
            _ => Err(self.malformed()),
        }
    }

    fn require(&self, n: usize) -> Result<(), TableErrorKind> {
        if self.vals.len() < n {
            Err(self.malformed())
        } else {
            Ok(())
        }
    }
}

/// Find the slot for row `idx` of a table whose size was declared by the size header.
fn slot<'t, T>(
    table: &'t mut [Option<T>],
    idx: u16,
    what: &'static str,
) -> Result<&'t mut Option<T>, TableErrorKind> {
    table
        .get_mut(usize::from(idx))
        .ok_or(TableErrorKind::IndexOutOfRange(what, i64::from(idx)))
}

/// Decode `buf` into raw table rows. Only the format is checked here: cross references between
/// rows are validated when a [`Grammar`](crate::Grammar) is built from the result.
pub fn decode(buf: &[u8]) -> Result<RawTables, TableError> {
    let mut rdr = Reader { buf, off: 0 };
    let header = rdr.string().map_err(|e| TableError {
        kind: TableErrorKind::BadMagic,
        offset: e.offset,
    })?;
    if header != MAGIC {
        return Err(TableError {
            kind: TableErrorKind::BadMagic,
            offset: Some(0),
        });
    }

    let mut tables = RawTables::default();
    loop {
        let start = rdr.off;
        let vals = match rdr.record()? {
            Some(vals) => vals,
            None => break,
        };
        let rk = match vals.first() {
            Some(Value::Byte(b)) => *b,
            _ => {
                return Err(TableError {
                    kind: TableErrorKind::MalformedRecord('?'),
                    offset: Some(start),
                });
            }
        };
        decode_row(&mut tables, rk, &vals).map_err(|kind| TableError {
            kind,
            offset: Some(start),
        })?;
    }
    Ok(tables)
}

fn decode_row(tables: &mut RawTables, rk: u8, vals: &[Value]) -> Result<(), TableErrorKind> {
    let row = Row {
        vals,
        kind: char::from(rk),
    };
    match rk {
        b'p' => {
            tables.properties.push(Property {
                index: row.count(1)?,
                name: row.str(2)?,
                value: row.str(3)?,
            });
        }
        b't' => {
            tables.symbols = (0..row.count(1)?).map(|_| None).collect();
            tables.charsets = (0..row.count(2)?).map(|_| None).collect();
            tables.productions = (0..row.count(3)?).map(|_| None).collect();
            tables.dfa_states = (0..row.count(4)?).map(|_| None).collect();
            tables.lalr_states = (0..row.count(5)?).map(|_| None).collect();
            tables.groups = (0..row.count(6)?).map(|_| None).collect();
        }
        b'c' => {
            let idx = row.idx(1, "character sets")?;
            let plane = row.int(2)? as u16;
            let n = row.count(3)?;
            row.require(5 + n * 2)?;
            let mut ranges = Vec::with_capacity(n);
            for i in 0..n {
                ranges.push((row.int(5 + i * 2)? as u16, row.int(6 + i * 2)? as u16));
            }
            *slot(&mut tables.charsets, idx, "character sets")? = Some(CharacterSet {
                idx: CharSetIdx(idx),
                plane,
                ranges,
            });
        }
        b'S' => {
            let idx = row.idx(1, "symbols")?;
            let code = row.int(3)?;
            let kind = SymbolKind::from_code(code).ok_or(TableErrorKind::InvalidSymbolKind(code))?;
            *slot(&mut tables.symbols, idx, "symbols")? =
                Some(Symbol::new(SymIdx(idx), row.str(2)?, kind));
        }
        b'g' => {
            let idx = row.idx(1, "groups")?;
            let advance = row.int(6)?;
            let ending = row.int(7)?;
            let n = row.count(9)?;
            row.require(10 + n)?;
            let mut nesting = Vec::with_capacity(n);
            for i in 0..n {
                nesting.push(GroupIdx(row.idx(10 + i, "groups")?));
            }
            *slot(&mut tables.groups, idx, "groups")? = Some(SymbolGroup {
                idx: GroupIdx(idx),
                name: row.str(2)?,
                container: SymIdx(row.idx(3, "symbols")?),
                start: SymIdx(row.idx(4, "symbols")?),
                end: SymIdx(row.idx(5, "symbols")?),
                advance: AdvanceMode::from_code(advance)
                    .ok_or(TableErrorKind::InvalidGroupMode(advance))?,
                ending: EndingMode::from_code(ending)
                    .ok_or(TableErrorKind::InvalidGroupMode(ending))?,
                nesting,
            });
        }
        b'R' => {
            let idx = row.idx(1, "productions")?;
            let head = SymIdx(row.idx(2, "symbols")?);
            row.require(4)?;
            let handles = (4..row.len())
                .map(|i| row.idx(i, "symbols").map(SymIdx))
                .collect::<Result<Vec<_>, _>>()?;
            *slot(&mut tables.productions, idx, "productions")? =
                Some(Production::new(PIdx(idx), head, handles));
        }
        b'I' => {
            tables.init = Some((
                DfaStIdx(row.idx(1, "DFA states")?),
                StIdx(row.idx(2, "LALR states")?),
            ));
        }
        b'D' => {
            let idx = row.idx(1, "DFA states")?;
            row.require(5)?;
            let accept = if row.bool(2)? {
                Some(SymIdx(row.idx(3, "symbols")?))
            } else {
                None
            };
            let edges = (0..(row.len() - 5) / 3)
                .map(|i| {
                    Ok(DfaEdge {
                        charset: CharSetIdx(row.idx(5 + i * 3, "character sets")?),
                        target: DfaStIdx(row.idx(6 + i * 3, "DFA states")?),
                    })
                })
                .collect::<Result<Vec<_>, TableErrorKind>>()?;
            *slot(&mut tables.dfa_states, idx, "DFA states")? =
                Some(DfaState::new(DfaStIdx(idx), accept, edges));
        }
        b'L' => {
            let idx = row.idx(1, "LALR states")?;
            row.require(3)?;
            let mut actions = BTreeMap::new();
            for i in 0..(row.len() - 3) / 4 {
                let sym = SymIdx(row.idx(3 + i * 4, "symbols")?);
                let code = row.int(4 + i * 4)?;
                let target = row.idx(5 + i * 4, "action targets")?;
                let act =
                    Action::from_code(code, target).ok_or(TableErrorKind::InvalidActionKind(code))?;
                actions.insert(sym, act);
            }
            *slot(&mut tables.lalr_states, idx, "LALR states")? =
                Some(LalrState::new(StIdx(idx), actions));
        }
        _ => return Err(TableErrorKind::UnknownRowKind(rk)),
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use grammar_testing::writer::{self, Value as V, encode_header, encode_record};

    #[test]
    fn empty_table() {
        let mut buf = Vec::new();
        encode_header(&mut buf);
        let t = decode(&buf).unwrap();
        assert!(t.symbols.is_empty());
        assert!(t.lalr_states.is_empty());
        assert!(t.init.is_none());
    }

    #[test]
    fn bad_magic() {
        let mut buf = Vec::new();
        writer::encode_str(&mut buf, "GOLD Parser Tables/v1.0");
        assert_eq!(decode(&buf).unwrap_err().kind, TableErrorKind::BadMagic);
        assert_eq!(decode(&[]).unwrap_err().kind, TableErrorKind::BadMagic);
        assert_eq!(decode(b"G\0O").unwrap_err().kind, TableErrorKind::BadMagic);
    }

    #[test]
    fn unknown_row_kind() {
        let mut buf = Vec::new();
        encode_header(&mut buf);
        let off = buf.len();
        encode_record(&mut buf, &[V::Byte(b'x')]);
        let e = decode(&buf).unwrap_err();
        assert_eq!(e.kind, TableErrorKind::UnknownRowKind(b'x'));
        assert_eq!(e.offset, Some(off));
    }

    #[test]
    fn unknown_value_tag() {
        let mut buf = Vec::new();
        encode_header(&mut buf);
        buf.extend_from_slice(&[b'M', 1, 0, b'Q']);
        assert_eq!(
            decode(&buf).unwrap_err().kind,
            TableErrorKind::UnknownValueTag(b'Q')
        );
    }

    #[test]
    fn truncated() {
        let mut buf = Vec::new();
        encode_header(&mut buf);
        buf.extend_from_slice(&[b'M', 2, 0, b'b', b't', b'I', 7]);
        assert_eq!(decode(&buf).unwrap_err().kind, TableErrorKind::Truncated);
    }

    #[test]
    fn rows_must_fit_size_header() {
        let mut buf = Vec::new();
        encode_header(&mut buf);
        encode_record(
            &mut buf,
            &[V::Byte(b'S'), V::Int(0), V::Str("EOF".to_owned()), V::Int(3)],
        );
        assert_eq!(
            decode(&buf).unwrap_err().kind,
            TableErrorKind::IndexOutOfRange("symbols", 0)
        );
    }

    #[test]
    fn wrong_value_type() {
        let mut buf = Vec::new();
        encode_header(&mut buf);
        encode_record(
            &mut buf,
            &[V::Byte(b'I'), V::Str("0".to_owned()), V::Int(0)],
        );
        assert_eq!(
            decode(&buf).unwrap_err().kind,
            TableErrorKind::MalformedRecord('I')
        );
    }

    #[test]
    fn rows_land_at_their_index() {
        let t = decode(&grammar_testing::fixtures::list_table()).unwrap();
        assert_eq!(t.symbols.len(), 13);
        assert_eq!(t.productions.len(), 6);
        assert_eq!(t.lalr_states.len(), 13);
        assert_eq!(t.init, Some((DfaStIdx(0), StIdx(0))));
        let s = t.symbols[9].as_ref().unwrap();
        assert_eq!(s.name(), "Id");
        assert_eq!(s.kind(), SymbolKind::Terminal);
        let p = t.productions[5].as_ref().unwrap();
        assert!(p.handles().is_empty());
        let l = t.lalr_states[3].as_ref().unwrap();
        assert_eq!(l.actions().len(), 3);
    }
}
