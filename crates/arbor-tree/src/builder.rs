use arbor_lexer::Token;
use arbor_tables::{GrammarTable, ProductionId, StateId, Symbol};

use crate::green::{GreenNode, NodeFlags};

/// Assembles green nodes for the stack machine and counts what it builds.
pub struct TreeBuilder<'t> {
    table: &'t GrammarTable,
    nodes_created: usize,
    nodes_reused: usize,
}

impl<'t> TreeBuilder<'t> {
    pub fn new(table: &'t GrammarTable) -> Self {
        Self { table, nodes_created: 0, nodes_reused: 0 }
    }

    pub fn nodes_created(&self) -> usize {
        self.nodes_created
    }

    pub fn nodes_reused(&self) -> usize {
        self.nodes_reused
    }

    /// Records that `node` was taken from an old tree instead of being rebuilt.
    pub fn note_reused(&mut self, node: &GreenNode) {
        self.nodes_reused += node.descendant_count() as usize;
    }

    pub fn leaf(&mut self, token: &Token, parse_state: StateId, extra: bool) -> GreenNode {
        self.nodes_created += 1;
        let flags = if extra { NodeFlags::EXTRA } else { NodeFlags::empty() };
        GreenNode::leaf(
            token.symbol,
            token.padding,
            token.range.len(),
            token.lookahead_bytes,
            parse_state,
            flags,
            token.scanner_state.clone(),
        )
    }

    /// Node for `production` over `children`. `lookahead_bytes` is how far past
    /// the node's end the parser looked before deciding to reduce. Fragile
    /// nodes are never reused.
    pub fn reduce(
        &mut self,
        production: ProductionId,
        children: Vec<GreenNode>,
        parse_state: StateId,
        lookahead_bytes: u32,
        fragile: bool,
    ) -> GreenNode {
        self.nodes_created += 1;
        let (symbol, precedence) = self
            .table
            .production(production)
            .map_or((Symbol::ERROR, 0), |production| (production.lhs, production.dynamic_precedence));
        let flags = if fragile { NodeFlags::FRAGILE } else { NodeFlags::empty() };
        GreenNode::interior(symbol, production, parse_state, children, flags, precedence.into())
            .with_lookahead(lookahead_bytes)
    }

    /// Wraps skipped material into an ERROR node that sits on the stack as an extra.
    pub fn error(&mut self, children: Vec<GreenNode>, parse_state: StateId) -> GreenNode {
        self.nodes_created += 1;
        let flags = NodeFlags::EXTRA | NodeFlags::FRAGILE;
        GreenNode::interior(Symbol::ERROR, ProductionId::NONE, parse_state, children, flags, 0)
    }

    /// ERROR root holding everything left on a stack that never accepted.
    pub fn error_root(&mut self, children: Vec<GreenNode>, parse_state: StateId) -> GreenNode {
        self.nodes_created += 1;
        GreenNode::interior(
            Symbol::ERROR,
            ProductionId::NONE,
            parse_state,
            children,
            NodeFlags::FRAGILE,
            0,
        )
    }

    /// Root of an accepted parse. Extras around the single structural subtree
    /// are spliced into it.
    pub fn root(&mut self, subtrees: Vec<GreenNode>, parse_state: StateId) -> GreenNode {
        let mut structural = subtrees.iter().enumerate().filter(|(_, tree)| !tree.is_extra());
        let (index, main) = match (structural.next(), structural.next()) {
            (Some((index, main)), None) => (index, main.clone()),
            _ => return self.error_root(subtrees, parse_state),
        };
        if subtrees.len() == 1 {
            return main;
        }

        self.nodes_created += 1;
        let data = main.data();
        let mut children = Vec::with_capacity(subtrees.len() + data.children.len());
        children.extend_from_slice(&subtrees[..index]);
        if main.is_leaf() {
            children.push(main.clone());
        } else {
            children.extend_from_slice(main.children());
        }
        children.extend_from_slice(&subtrees[index + 1..]);
        let flags = data.flags & (NodeFlags::FRAGILE | NodeFlags::HAS_CHANGES);
        let precedence = self
            .table
            .production(data.production)
            .map_or(0, |production| production.dynamic_precedence.into());
        GreenNode::interior(data.symbol, data.production, data.parse_state, children, flags, precedence)
    }
}
