//! Hand-built tables for the grammars used throughout the test suites.

use crate::writer::*;

fn range(from: u8, to: u8) -> (u16, u16) {
    (u16::from(from), u16::from(to))
}

fn whitespace() -> Atom {
    Atom::Many(vec![range(b'\t', b'\n'), range(b'\r', b'\r'), range(b' ', b' ')])
}

/// Arithmetic expressions with `+ - * /`, unary `-`, parentheses and nestable `/* */` comments:
///
/// ```text
/// <E> ::= <E> + <M> | <E> - <M> | <M>
/// <M> ::= <M> * <N> | <M> / <N> | <N>
/// <N> ::= - <V> | <V>
/// <V> ::= Num | ( <E> )
/// ```
///
/// Productions are numbered in the order above (0 to 9).
pub fn operator_table() -> Vec<u8> {
    let mut tb = TableBuilder::new();
    tb.property("Name", "Operators");
    tb.property("Version", "1.0");
    let eof = tb.symbol("EOF", END_OF_FILE);
    tb.symbol("Error", ERROR);
    let ws = tb.symbol("Whitespace", NOISE);
    let comment = tb.symbol("Comment", NOISE);
    let cstart = tb.symbol("Comment Start", GROUP_START);
    let cend = tb.symbol("Comment End", GROUP_END);
    let minus = tb.symbol("-", TERMINAL);
    let lparen = tb.symbol("(", TERMINAL);
    let rparen = tb.symbol(")", TERMINAL);
    let times = tb.symbol("*", TERMINAL);
    let div = tb.symbol("/", TERMINAL);
    let plus = tb.symbol("+", TERMINAL);
    let num = tb.symbol("Num", TERMINAL);
    let e = tb.symbol("E", NONTERMINAL);
    let m = tb.symbol("M", NONTERMINAL);
    let n = tb.symbol("N", NONTERMINAL);
    let v = tb.symbol("V", NONTERMINAL);

    tb.pattern(ws, &[whitespace()]);
    tb.literal(minus, "-");
    tb.literal(lparen, "(");
    tb.literal(rparen, ")");
    tb.literal(times, "*");
    tb.literal(div, "/");
    tb.literal(plus, "+");
    tb.literal(cstart, "/*");
    tb.literal(cend, "*/");
    tb.pattern(num, &[Atom::Many(vec![range(b'0', b'9')])]);

    let g = 0;
    tb.group(
        "Comment",
        comment,
        cstart,
        cend,
        ADVANCE_CHARACTER,
        ENDING_CLOSED,
        &[g],
    );

    tb.production(e, &[e, plus, m]);
    tb.production(e, &[e, minus, m]);
    tb.production(e, &[m]);
    tb.production(m, &[m, times, n]);
    tb.production(m, &[m, div, n]);
    tb.production(m, &[n]);
    tb.production(n, &[minus, v]);
    tb.production(n, &[v]);
    tb.production(v, &[num]);
    tb.production(v, &[lparen, e, rparen]);

    let follow_e = [plus, minus, rparen, eof];
    let follow_m = [plus, minus, rparen, eof, times, div];
    let reduce = |syms: &[u16], prod: u16| -> Vec<(u16, i16, u16)> {
        syms.iter().map(|s| (*s, REDUCE, prod)).collect()
    };
    let operand = |first: &[(u16, i16, u16)]| -> Vec<(u16, i16, u16)> {
        let mut acts = first.to_vec();
        acts.extend([(minus, SHIFT, 4), (num, SHIFT, 6), (lparen, SHIFT, 7)]);
        acts
    };

    // 0
    tb.lalr_state(&operand(&[(e, GOTO, 1), (m, GOTO, 2), (n, GOTO, 3), (v, GOTO, 5)]));
    // 1
    tb.lalr_state(&[(eof, ACCEPT, 0), (plus, SHIFT, 8), (minus, SHIFT, 9)]);
    // 2
    let mut s2 = vec![(times, SHIFT, 10), (div, SHIFT, 11)];
    s2.extend(reduce(&follow_e, 2));
    tb.lalr_state(&s2);
    // 3
    tb.lalr_state(&reduce(&follow_m, 5));
    // 4
    tb.lalr_state(&[(v, GOTO, 12), (num, SHIFT, 6), (lparen, SHIFT, 7)]);
    // 5
    tb.lalr_state(&reduce(&follow_m, 7));
    // 6
    tb.lalr_state(&reduce(&follow_m, 8));
    // 7
    tb.lalr_state(&operand(&[(e, GOTO, 13), (m, GOTO, 2), (n, GOTO, 3), (v, GOTO, 5)]));
    // 8
    tb.lalr_state(&operand(&[(m, GOTO, 14), (n, GOTO, 3), (v, GOTO, 5)]));
    // 9
    tb.lalr_state(&operand(&[(m, GOTO, 15), (n, GOTO, 3), (v, GOTO, 5)]));
    // 10
    tb.lalr_state(&operand(&[(n, GOTO, 16), (v, GOTO, 5)]));
    // 11
    tb.lalr_state(&operand(&[(n, GOTO, 17), (v, GOTO, 5)]));
    // 12
    tb.lalr_state(&reduce(&follow_m, 6));
    // 13
    tb.lalr_state(&[(rparen, SHIFT, 18), (plus, SHIFT, 8), (minus, SHIFT, 9)]);
    // 14
    let mut s14 = vec![(times, SHIFT, 10), (div, SHIFT, 11)];
    s14.extend(reduce(&follow_e, 0));
    tb.lalr_state(&s14);
    // 15
    let mut s15 = vec![(times, SHIFT, 10), (div, SHIFT, 11)];
    s15.extend(reduce(&follow_e, 1));
    tb.lalr_state(&s15);
    // 16
    tb.lalr_state(&reduce(&follow_m, 3));
    // 17
    tb.lalr_state(&reduce(&follow_m, 4));
    // 18
    tb.lalr_state(&reduce(&follow_m, 9));

    tb.to_bytes()
}

/// Comma separated and semicolon terminated lists:
///
/// ```text
/// <List>  ::= [ <List1> ] | { <List2> }
/// <List1> ::= <List1> , Id | Id
/// <List2> ::= <List2> Id ; |
/// ```
pub fn list_table() -> Vec<u8> {
    let mut tb = TableBuilder::new();
    let eof = tb.symbol("EOF", END_OF_FILE);
    tb.symbol("Error", ERROR);
    let ws = tb.symbol("Whitespace", NOISE);
    let comma = tb.symbol(",", TERMINAL);
    let semi = tb.symbol(";", TERMINAL);
    let lbrack = tb.symbol("[", TERMINAL);
    let rbrack = tb.symbol("]", TERMINAL);
    let lbrace = tb.symbol("{", TERMINAL);
    let rbrace = tb.symbol("}", TERMINAL);
    let id = tb.symbol("Id", TERMINAL);
    let list = tb.symbol("List", NONTERMINAL);
    let list1 = tb.symbol("List1", NONTERMINAL);
    let list2 = tb.symbol("List2", NONTERMINAL);

    tb.pattern(ws, &[whitespace()]);
    tb.literal(comma, ",");
    tb.literal(semi, ";");
    tb.literal(lbrack, "[");
    tb.literal(rbrack, "]");
    tb.literal(lbrace, "{");
    tb.literal(rbrace, "}");
    tb.pattern(id, &[Atom::Many(vec![range(b'a', b'z')])]);

    tb.production(list, &[lbrack, list1, rbrack]);
    tb.production(list, &[lbrace, list2, rbrace]);
    tb.production(list1, &[list1, comma, id]);
    tb.production(list1, &[id]);
    tb.production(list2, &[list2, id, semi]);
    tb.production(list2, &[]);

    // 0
    tb.lalr_state(&[(list, GOTO, 1), (lbrack, SHIFT, 2), (lbrace, SHIFT, 3)]);
    // 1
    tb.lalr_state(&[(eof, ACCEPT, 0)]);
    // 2
    tb.lalr_state(&[(list1, GOTO, 4), (id, SHIFT, 5)]);
    // 3
    tb.lalr_state(&[(list2, GOTO, 6), (rbrace, REDUCE, 5), (id, REDUCE, 5)]);
    // 4
    tb.lalr_state(&[(rbrack, SHIFT, 7), (comma, SHIFT, 8)]);
    // 5
    tb.lalr_state(&[(rbrack, REDUCE, 3), (comma, REDUCE, 3)]);
    // 6
    tb.lalr_state(&[(rbrace, SHIFT, 9), (id, SHIFT, 10)]);
    // 7
    tb.lalr_state(&[(eof, REDUCE, 0)]);
    // 8
    tb.lalr_state(&[(id, SHIFT, 11)]);
    // 9
    tb.lalr_state(&[(eof, REDUCE, 1)]);
    // 10
    tb.lalr_state(&[(semi, SHIFT, 12)]);
    // 11
    tb.lalr_state(&[(rbrack, REDUCE, 2), (comma, REDUCE, 2)]);
    // 12
    tb.lalr_state(&[(rbrace, REDUCE, 4), (id, REDUCE, 4)]);

    tb.to_bytes()
}

/// A lexer-only table exercising lexical groups: nestable, character-advancing `/* */` block
/// comments and token-advancing `//` line comments ended (but not consumed) by a newline.
///
/// ```text
/// <Lines> ::= <Lines> Id | <Lines> NewLine |
/// ```
pub fn group_table() -> Vec<u8> {
    let mut tb = TableBuilder::new();
    let eof = tb.symbol("EOF", END_OF_FILE);
    tb.symbol("Error", ERROR);
    let ws = tb.symbol("Whitespace", NOISE);
    let nl = tb.symbol("NewLine", TERMINAL);
    let id = tb.symbol("Id", TERMINAL);
    let block = tb.symbol("BlockComment", NOISE);
    let bstart = tb.symbol("BlockComment Start", GROUP_START);
    let bend = tb.symbol("BlockComment End", GROUP_END);
    let line = tb.symbol("LineComment", NOISE);
    let lstart = tb.symbol("LineComment Start", GROUP_START);
    let lines = tb.symbol("Lines", NONTERMINAL);

    tb.pattern(
        ws,
        &[Atom::Many(vec![range(b'\t', b'\t'), range(b' ', b' ')])],
    );
    tb.literal(nl, "\n");
    tb.pattern(id, &[Atom::Many(vec![range(b'a', b'z')])]);
    tb.literal(bstart, "/*");
    tb.literal(bend, "*/");
    tb.literal(lstart, "//");

    tb.group(
        "BlockComment",
        block,
        bstart,
        bend,
        ADVANCE_CHARACTER,
        ENDING_CLOSED,
        &[0],
    );
    tb.group(
        "LineComment",
        line,
        lstart,
        nl,
        ADVANCE_TOKEN,
        ENDING_OPEN,
        &[],
    );

    tb.production(lines, &[lines, id]);
    tb.production(lines, &[lines, nl]);
    tb.production(lines, &[]);

    // 0
    tb.lalr_state(&[(lines, GOTO, 1), (eof, REDUCE, 2), (id, REDUCE, 2), (nl, REDUCE, 2)]);
    // 1
    tb.lalr_state(&[(eof, ACCEPT, 0), (id, SHIFT, 2), (nl, SHIFT, 3)]);
    // 2
    tb.lalr_state(&[(eof, REDUCE, 0), (id, REDUCE, 0), (nl, REDUCE, 0)]);
    // 3
    tb.lalr_state(&[(eof, REDUCE, 1), (id, REDUCE, 1), (nl, REDUCE, 1)]);

    tb.to_bytes()
}
