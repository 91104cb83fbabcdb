//! A tree builder which drops what a consumer of the tree rarely needs.
//!
//! Each production carries four rules, inferred when the grammar is loaded and adjustable with
//! [`Grammar::set_merge_child`] and [`Grammar::set_forward_child`]:
//!
//!   * remove single lexeme: handles which are terminals that only ever match one lexeme (`+`,
//!     `(`, keywords) are left out of the tree.
//!   * forward child: if only one child remains, it takes the place of the reduced node, so chains
//!     like `<E> ::= <M>`, `<M> ::= <N>` leave no trace.
//!   * listify recursion: left or right recursive productions such as `<E> ::= <E> + <M>` build
//!     one flat list node rather than a deep chain.
//!   * merge child: children created by their own non-terminal's production are spliced into the
//!     new node, e.g. to flatten `<List> ::= [ <List1> ]` into a single node.
//!
//! List nodes are "open" while a recursion may still extend them. A list is closed as soon as it
//! becomes the child of any other node, and at the latest when the input is accepted.

use egtgrammar::{Grammar, PIdx, Production, SymbolKind};
use log::trace;

use crate::{Arena, Node, NodeId, ParseEvent, ParseHandler, Parser};

/// A handle which survived removal: the production of the parse item it came from and its node.
struct Candidate {
    production: Option<PIdx>,
    node: NodeId,
}

#[derive(Debug, Default)]
pub struct SimplifiedTreeBuilder {
    arena: Arena,
    /// Open list nodes, innermost last.
    lists: Vec<NodeId>,
    root: Option<NodeId>,
}

impl SimplifiedTreeBuilder {
    pub fn new() -> Self {
        SimplifiedTreeBuilder::default()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn into_tree(self) -> (Arena, Option<NodeId>) {
        (self.arena, self.root)
    }

    /// If `id` is an open list, close it.
    fn close(&mut self, id: NodeId) {
        if let Some(i) = self.lists.iter().rposition(|l| *l == id) {
            self.lists.remove(i);
            if let Node::Nonterm { children, .. } = self.arena.node_mut(id) {
                children.shrink_to_fit();
            }
        }
    }

    fn close_all(&mut self) {
        while let Some(id) = self.lists.last().copied() {
            self.close(id);
        }
    }

    fn reduce(&mut self, grm: &Grammar, prod: &Production, mut ccs: Vec<Candidate>) -> NodeId {
        if prod.forward_child() && ccs.len() == 1 {
            let id = ccs[0].node;
            self.close(id);
            return id;
        }

        if prod.listify_recursion() {
            let fi = ccs.iter().position(|c| {
                c.production
                    .is_some_and(|p| grm.prod(p).head() == prod.head())
            });
            if let Some(fi) = fi {
                let cp = ccs[fi].production;
                let list = ccs[fi].node;
                // Siblings may be open lists sitting above `list`.
                for (i, c) in ccs.iter().enumerate() {
                    if i != fi {
                        self.close(c.node);
                    }
                }
                if cp == Some(prod.idx()) && self.lists.last() == Some(&list) {
                    if let Node::Nonterm { children, .. } = self.arena.node_mut(list) {
                        children.splice(0..0, ccs[..fi].iter().map(|c| c.node));
                        children.extend(ccs[fi + 1..].iter().map(|c| c.node));
                    }
                    return list;
                }
                if cp.is_some_and(|p| grm.prod(p).handles().is_empty()) {
                    // The list's empty base case adds nothing.
                    ccs.remove(fi);
                }
            }
            for c in &ccs {
                self.close(c.node);
            }
            let mut children = Vec::with_capacity(ccs.len().max(16));
            children.extend(ccs.iter().map(|c| c.node));
            let list = self.arena.alloc_nonterm(prod.idx(), children);
            self.lists.push(list);
            return list;
        }

        let mut children = Vec::with_capacity(ccs.len());
        for c in ccs {
            self.close(c.node);
            if prod.merge_child() {
                if let Node::Nonterm {
                    production,
                    children: grandchildren,
                } = self.arena.node(c.node)
                    && c.production == Some(*production)
                {
                    children.extend_from_slice(grandchildren);
                    continue;
                }
            }
            children.push(c.node);
        }
        self.arena.alloc_nonterm(prod.idx(), children)
    }
}

impl ParseHandler<NodeId> for SimplifiedTreeBuilder {
    fn on_event(&mut self, event: ParseEvent, psr: &mut Parser<'_, '_, NodeId>) {
        let grm = psr.grammar();
        match event {
            ParseEvent::Shift => {
                if let Some(tok) = psr.token() {
                    let id = self.arena.alloc_term(tok);
                    if let Some(top) = psr.top_mut() {
                        top.payload = Some(id);
                    }
                }
            }
            ParseEvent::Reduce => {
                let Some(r) = psr.reduction_mut() else {
                    return;
                };
                let prod = grm.prod(r.production);
                let mut ccs = Vec::with_capacity(r.handles.len());
                for h in r.handles.iter() {
                    if prod.remove_single_lexeme()
                        && h.production().is_none()
                        && h.token().is_some_and(|t| {
                            let sym = grm.symbol(t.symbol());
                            sym.kind() != SymbolKind::NonTerminal && sym.single_lexeme()
                        })
                    {
                        continue;
                    }
                    let node = match (h.payload, h.token()) {
                        (Some(id), _) => id,
                        (None, Some(tok)) => self.arena.alloc_term(tok),
                        (None, None) => continue,
                    };
                    ccs.push(Candidate {
                        production: h.production(),
                        node,
                    });
                }
                let id = self.reduce(grm, prod, ccs);
                trace!("{} -> node {}", prod.id(), id.index());
                r.head.payload = Some(id);
            }
            ParseEvent::Accept => {
                self.root = psr.top().and_then(|t| t.payload);
                self.close_all();
            }
            ParseEvent::ReduceEliminated | ParseEvent::Error => (),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ParserBuilder, tree::test::eval};
    use egtlex::InputBuffer;
    use grammar_testing::fixtures::{list_table, operator_table};

    fn build(grm: &Grammar, input: &str) -> (Arena, NodeId) {
        let mut tb = SimplifiedTreeBuilder::new();
        let mut psr = Parser::new(grm);
        psr.load_str(input);
        assert_eq!(psr.parse_all_with(&mut tb), ParseEvent::Accept);
        assert!(tb.lists.is_empty());
        let (arena, root) = tb.into_tree();
        (arena, root.unwrap())
    }

    #[test]
    fn operators() {
        let mut grm = Grammar::from_bytes(&operator_table()).unwrap();
        grm.set_forward_child(PIdx(9), true);
        let input = InputBuffer::shared("-2*(1+2+4)-2-2-1");
        let (arena, root) = build(&grm, input.as_str());
        assert_eq!(
            arena.pp(root, &grm, &input),
            "<E> ::= <E> - <M>
 <M> ::= <M> * <N>
  <N> ::= - <V>
   Num '2'
  <E> ::= <E> + <M>
   Num '1'
   Num '2'
   Num '4'
 Num '2'
 Num '2'
 Num '1'
"
        );
        assert_eq!(eval(&arena, root, &input), -19);
    }

    #[test]
    fn parentheses_without_forwarding() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        let input = InputBuffer::shared("(1+2)");
        let (arena, root) = build(&grm, input.as_str());
        assert_eq!(
            arena.pp(root, &grm, &input),
            "<V> ::= ( <E> )
 <E> ::= <E> + <M>
  Num '1'
  Num '2'
"
        );
    }

    #[test]
    fn nested_lists_stay_apart() {
        let mut grm = Grammar::from_bytes(&operator_table()).unwrap();
        grm.set_forward_child(PIdx(9), true);
        let input = InputBuffer::shared("1+(2+3)+4");
        let (arena, root) = build(&grm, input.as_str());
        assert_eq!(
            arena.pp(root, &grm, &input),
            "<E> ::= <E> + <M>
 Num '1'
 <E> ::= <E> + <M>
  Num '2'
  Num '3'
 Num '4'
"
        );
        assert_eq!(eval(&arena, root, &input), 10);
    }

    #[test]
    fn chains_extend_past_open_sibling_lists() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        let input = InputBuffer::shared("1+2+3*4");
        let (arena, root) = build(&grm, input.as_str());
        assert_eq!(
            arena.pp(root, &grm, &input),
            "<E> ::= <E> + <M>
 Num '1'
 Num '2'
 <M> ::= <M> * <N>
  Num '3'
  Num '4'
"
        );
        assert_eq!(eval(&arena, root, &input), 15);

        let input = InputBuffer::shared("1+2*3+4*5");
        let (arena, root) = build(&grm, input.as_str());
        assert_eq!(arena.children(root).len(), 3);
        assert_eq!(eval(&arena, root, &input), 27);
    }

    #[test]
    fn comma_list() {
        let mut grm = Grammar::from_bytes(&list_table()).unwrap();
        let input = InputBuffer::shared("[a,b,c]");
        let (arena, root) = build(&grm, input.as_str());
        assert_eq!(
            arena.pp(root, &grm, &input),
            "<List> ::= [ <List1> ]
 <List1> ::= <List1> , Id
  Id 'a'
  Id 'b'
  Id 'c'
"
        );

        grm.set_merge_child(PIdx(0), true);
        let (arena, root) = build(&grm, input.as_str());
        assert_eq!(
            arena.pp(root, &grm, &input),
            "<List> ::= [ <List1> ]
 Id 'a'
 Id 'b'
 Id 'c'
"
        );
        assert_eq!(arena.children(root).len(), 3);
    }

    #[test]
    fn terminated_list() {
        let mut grm = Grammar::from_bytes(&list_table()).unwrap();
        grm.set_merge_child(PIdx(1), true);
        let input = InputBuffer::shared("{a;b;c;}");
        let (arena, root) = build(&grm, input.as_str());
        assert_eq!(
            arena.pp(root, &grm, &input),
            "<List> ::= { <List2> }
 Id 'a'
 Id 'b'
 Id 'c'
"
        );
    }

    #[test]
    fn single_element_lists() {
        let grm = Grammar::from_bytes(&list_table()).unwrap();
        let input = InputBuffer::shared("[a]");
        let (arena, root) = build(&grm, input.as_str());
        assert_eq!(
            arena.pp(root, &grm, &input),
            "<List> ::= [ <List1> ]
 Id 'a'
"
        );

        let input = InputBuffer::shared("{}");
        let (arena, root) = build(&grm, input.as_str());
        assert_eq!(
            arena.pp(root, &grm, &input),
            "<List> ::= { <List2> }
 <List2> ::=
"
        );
    }

    #[test]
    fn terminals_survive_simplification() {
        let mut grm = Grammar::from_bytes(&operator_table()).unwrap();
        grm.set_forward_child(PIdx(9), true);
        let input = InputBuffer::shared("-2*(1+2+4)-2-2-1");
        let (arena, root) = build(&grm, input.as_str());
        let nums = arena
            .terminals(root)
            .iter()
            .map(|t| t.lexeme(&input))
            .collect::<Vec<_>>();
        assert_eq!(nums, vec!["2", "1", "2", "4", "2", "2", "1"]);
    }

    #[test]
    fn trimmed_reductions() {
        let mut grm = Grammar::from_bytes(&operator_table()).unwrap();
        grm.set_forward_child(PIdx(9), true);
        let input = InputBuffer::shared("-2*(1+2+4)-2-2-1");
        let (full, root) = build(&grm, input.as_str());
        let mut tb = SimplifiedTreeBuilder::new();
        let mut psr = ParserBuilder::new(&grm).trim_reductions(true).build();
        psr.load_str(input.as_str());
        assert_eq!(psr.parse_all_with(&mut tb), ParseEvent::Accept);
        let (trimmed, troot) = tb.into_tree();
        let troot = troot.unwrap();
        assert_eq!(
            trimmed.pp(troot, &grm, &input),
            full.pp(root, &grm, &input)
        );
        assert_eq!(eval(&trimmed, troot, &input), -19);
    }
}
