use egtgrammar::{Grammar, PIdx};
use egtlex::{InputBuffer, Token};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ParseEvent, ParseHandler, Parser};

/// The index of a node in an [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Node {
    /// A terminal.
    Term { token: Token },
    /// A non-terminal created by reducing `production`.
    Nonterm {
        production: PIdx,
        children: Vec<NodeId>,
    },
}

/// The storage for a parse tree. Nodes refer to their children by [`NodeId`] and all nodes live
/// as long as the arena.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Arena { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// # Panics
    ///
    /// If `id` was not allocated by this arena.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// The children of `id`: empty for terminals.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Node::Term { .. } => &[],
            Node::Nonterm { children, .. } => children,
        }
    }

    pub fn alloc_term(&mut self, token: Token) -> NodeId {
        self.alloc(Node::Term { token })
    }

    pub fn alloc_nonterm(&mut self, production: PIdx, children: Vec<NodeId>) -> NodeId {
        self.alloc(Node::Nonterm {
            production,
            children,
        })
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// The terminals below `root`, left to right.
    pub fn terminals(&self, root: NodeId) -> Vec<Token> {
        let mut toks = Vec::new();
        let mut st = vec![root];
        while let Some(id) = st.pop() {
            match self.node(id) {
                Node::Term { token } => toks.push(*token),
                Node::Nonterm { children, .. } => st.extend(children.iter().rev()),
            }
        }
        toks
    }

    /// Pretty-print the tree below `root`, one node per line, indenting children by one space.
    /// Non-terminals are shown by their production's ID; terminals as `ID 'lexeme'`.
    pub fn pp(&self, root: NodeId, grm: &Grammar, input: &InputBuffer<'_>) -> String {
        let mut st = vec![(0, root)]; // Stack of (indent level, node) pairs
        let mut s = String::new();
        while let Some((indent, id)) = st.pop() {
            for _ in 0..indent {
                s.push(' ');
            }
            match self.node(id) {
                Node::Term { token } => {
                    s.push_str(&token.pp(grm, input));
                    s.push('\n');
                }
                Node::Nonterm {
                    production,
                    children,
                } => {
                    s.push_str(grm.prod(*production).id());
                    s.push('\n');
                    for c in children.iter().rev() {
                        st.push((indent + 1, *c));
                    }
                }
            }
        }
        s
    }
}

/// Builds a parse tree mirroring the grammar exactly: every shifted token becomes a terminal
/// node and every reduction becomes a non-terminal node with one child per handle.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    arena: Arena,
    root: Option<NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder::default()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// The root of the tree, once the input has been accepted.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn into_tree(self) -> (Arena, Option<NodeId>) {
        (self.arena, self.root)
    }
}

impl ParseHandler<NodeId> for TreeBuilder {
    fn on_event(&mut self, event: ParseEvent, psr: &mut Parser<'_, '_, NodeId>) {
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
                if let Some(r) = psr.reduction_mut() {
                    let children = r.handles.iter().filter_map(|h| h.payload).collect();
                    r.head.payload = Some(self.arena.alloc_nonterm(r.production, children));
                }
            }
            ParseEvent::Accept => self.root = psr.top().and_then(|t| t.payload),
            ParseEvent::ReduceEliminated | ParseEvent::Error => (),
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::ParserBuilder;
    use grammar_testing::fixtures::{list_table, operator_table};

    /// Evaluate a tree over the operator grammar, whichever builder made it.
    pub(crate) fn eval(arena: &Arena, id: NodeId, input: &InputBuffer<'_>) -> i64 {
        // Operators and parentheses only appear in raw trees.
        let ops = arena
            .children(id)
            .iter()
            .copied()
            .filter(|c| match arena.node(*c) {
                Node::Term { token } => token.lexeme(input).bytes().all(|b| b.is_ascii_digit()),
                Node::Nonterm { .. } => true,
            })
            .collect::<Vec<_>>();
        let ev = |c: &NodeId| eval(arena, *c, input);
        match arena.node(id) {
            Node::Term { token } => token.lexeme(input).parse().unwrap(),
            Node::Nonterm { production, .. } => match usize::from(*production) {
                0 => ops.iter().map(ev).sum(),
                1 => ops[1..].iter().fold(ev(&ops[0]), |a, c| a - ev(c)),
                3 => ops.iter().map(ev).product(),
                4 => ops[1..].iter().fold(ev(&ops[0]), |a, c| a / ev(c)),
                6 => -ev(&ops[0]),
                _ => ev(&ops[0]),
            },
        }
    }

    fn build(grm: &Grammar, input: &str, trim: bool) -> (Arena, NodeId) {
        let mut tb = TreeBuilder::new();
        let mut psr = ParserBuilder::new(grm).trim_reductions(trim).build();
        psr.load_str(input);
        assert_eq!(psr.parse_all_with(&mut tb), ParseEvent::Accept);
        let (arena, root) = tb.into_tree();
        (arena, root.unwrap())
    }

    #[test]
    fn raw_tree() {
        let grm = Grammar::from_bytes(&list_table()).unwrap();
        let input = InputBuffer::shared("[a, b]");
        let (arena, root) = build(&grm, input.as_str(), false);
        assert_eq!(
            arena.pp(root, &grm, &input),
            "<List> ::= [ <List1> ]
 [ '['
 <List1> ::= <List1> , Id
  <List1> ::= Id
   Id 'a'
  , ','
  Id 'b'
 ] ']'
"
        );
    }

    #[test]
    fn children_match_handles() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        let (arena, root) = build(&grm, "-2*(3+4)-5", false);
        let mut st = vec![root];
        while let Some(id) = st.pop() {
            if let Node::Nonterm {
                production,
                children,
            } = arena.node(id)
            {
                assert_eq!(children.len(), grm.prod(*production).handles().len());
                st.extend(children);
            }
        }
    }

    #[test]
    fn evaluate() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        let input = InputBuffer::shared("-2*(3+4)-5");
        for trim in [false, true] {
            let (arena, root) = build(&grm, input.as_str(), trim);
            assert_eq!(eval(&arena, root, &input), -19);
        }
    }

    #[test]
    fn terminals() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        let input = InputBuffer::shared("-2 * (3+4) /* c */ - 5");
        let (arena, root) = build(&grm, input.as_str(), false);
        let s = arena
            .terminals(root)
            .iter()
            .map(|t| t.lexeme(&input))
            .collect::<String>();
        assert_eq!(s, "-2*(3+4)-5");
    }

    #[test]
    fn trimmed_trees_are_smaller() {
        let grm = Grammar::from_bytes(&operator_table()).unwrap();
        let (full, _) = build(&grm, "(1)", false);
        let (trimmed, root) = build(&grm, "(1)", true);
        assert!(trimmed.len() < full.len());
        assert!(matches!(
            trimmed.node(root),
            Node::Nonterm { production: PIdx(9), .. }
        ));
    }
}
