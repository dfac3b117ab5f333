//! Graph-structured parse stack.
//!
//! Nodes live in an arena and point down towards the bottom of the stack.
//! Versions that reach the same state at the same position share a node with
//! several links, so every path below it is kept without copying.

use arbor_lexer::{ScannerState, Token};
use arbor_tables::StateId;
use arbor_tree::GreenNode;
use la_arena::{Arena, Idx};
use smallvec::{SmallVec, smallvec};
use text_size::TextSize;

pub(crate) type NodeId = Idx<StackNode>;

/// Upper bound on paths explored by a single pop.
const MAX_REDUCE_PATHS: usize = 32;
/// Upper bound on links a single node keeps.
const MAX_LINKS: usize = 8;

#[derive(Debug)]
pub(crate) struct StackNode {
    pub(crate) state: StateId,
    /// End of the last subtree pushed, padding included.
    pub(crate) position: TextSize,
    pub(crate) error_cost: u32,
    pub(crate) dynamic_precedence: i32,
    /// Link 0 is the primary path, used by recovery and accept.
    links: SmallVec<[Link; 2]>,
}

#[derive(Debug, Clone)]
pub(crate) struct Link {
    pub(crate) node: NodeId,
    pub(crate) subtree: GreenNode,
}

/// Subtrees popped along one path, bottom first, and the node below them.
#[derive(Debug)]
pub(crate) struct Path {
    pub(crate) base: NodeId,
    pub(crate) subtrees: Vec<GreenNode>,
}

#[derive(Debug, Clone)]
pub(crate) enum Status {
    Active,
    /// Stopped on a token with no action while other versions were alive.
    Paused(Token),
    Halted,
}

/// Top of one stack version plus the state that is not part of the graph.
#[derive(Debug, Clone)]
pub(crate) struct Head {
    pub(crate) node: NodeId,
    pub(crate) status: Status,
    pub(crate) scanner_state: ScannerState,
    /// Token carried over from the reduction that created this head.
    pub(crate) lookahead: Option<Token>,
    /// Tokens skipped by recovery and not yet wrapped in an ERROR node.
    pub(crate) skipped: Vec<GreenNode>,
    /// Position of the last search for a recovery frame.
    pub(crate) searched_at: Option<TextSize>,
    /// Position of the last zero-width token shifted.
    pub(crate) empty_token_at: Option<TextSize>,
    /// Refuse zero-width external tokens until the next shift.
    pub(crate) forbid_empty: bool,
    pub(crate) reductions_since_shift: u32,
}

impl Head {
    pub(crate) fn new(node: NodeId) -> Self {
        Self {
            node,
            status: Status::Active,
            scanner_state: ScannerState::new(),
            lookahead: None,
            skipped: Vec::new(),
            searched_at: None,
            empty_token_at: None,
            forbid_empty: false,
            reductions_since_shift: 0,
        }
    }

    /// Copy of this head sitting on `node`.
    pub(crate) fn fork(&self, node: NodeId) -> Self {
        Self {
            node,
            status: Status::Active,
            scanner_state: self.scanner_state.clone(),
            lookahead: None,
            skipped: Vec::new(),
            searched_at: self.searched_at,
            empty_token_at: self.empty_token_at,
            forbid_empty: self.forbid_empty,
            reductions_since_shift: self.reductions_since_shift,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(self.status, Status::Active)
    }

    pub(crate) fn is_halted(&self) -> bool {
        matches!(self.status, Status::Halted)
    }

    pub(crate) fn skipped_len(&self) -> TextSize {
        self.skipped.iter().map(GreenNode::total_len).sum()
    }

    pub(crate) fn skipped_cost(&self) -> u32 {
        self.skipped.iter().map(GreenNode::error_cost).sum()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Stack {
    nodes: Arena<StackNode>,
}

impl Stack {
    pub(crate) fn base(&mut self, state: StateId) -> NodeId {
        self.nodes.alloc(StackNode {
            state,
            position: TextSize::new(0),
            error_cost: 0,
            dynamic_precedence: 0,
            links: SmallVec::new(),
        })
    }

    pub(crate) fn node(&self, id: NodeId) -> &StackNode {
        &self.nodes[id]
    }

    pub(crate) fn state(&self, id: NodeId) -> StateId {
        self.nodes[id].state
    }

    pub(crate) fn position(&self, id: NodeId) -> TextSize {
        self.nodes[id].position
    }

    /// Pushes `subtree` on top of `below` and enters `state`.
    pub(crate) fn push(&mut self, below: NodeId, subtree: GreenNode, state: StateId) -> NodeId {
        let base = &self.nodes[below];
        let node = StackNode {
            state,
            position: base.position + subtree.total_len(),
            error_cost: base.error_cost.saturating_add(subtree.error_cost()),
            dynamic_precedence: base.dynamic_precedence.saturating_add(subtree.dynamic_precedence()),
            links: smallvec![Link { node: below, subtree }],
        };
        self.nodes.alloc(node)
    }

    /// Pops `count` structural subtrees along every path below `top`.
    ///
    /// Extras on the way are collected but not counted. Paths come back with
    /// the primary one first.
    pub(crate) fn pop_count(&self, top: NodeId, count: usize) -> Vec<Path> {
        struct Pending {
            node: NodeId,
            /// Top first.
            subtrees: Vec<GreenNode>,
            remaining: usize,
        }

        let mut paths = Vec::new();
        let mut pending = vec![Pending { node: top, subtrees: Vec::new(), remaining: count }];
        while let Some(Pending { node, mut subtrees, remaining }) = pending.pop() {
            if remaining == 0 {
                subtrees.reverse();
                paths.push(Path { base: node, subtrees });
                continue;
            }
            let links = &self.nodes[node].links;
            for (index, link) in links.iter().enumerate().rev() {
                if index > 0 && paths.len() + pending.len() >= MAX_REDUCE_PATHS {
                    continue;
                }
                let mut subtrees = subtrees.clone();
                subtrees.push(link.subtree.clone());
                let remaining = if link.subtree.is_extra() { remaining } else { remaining - 1 };
                pending.push(Pending { node: link.node, subtrees, remaining });
            }
        }
        paths
    }

    /// Pops `count` subtrees, extras included, along the primary path.
    pub(crate) fn pop_primary(&self, top: NodeId, count: usize) -> Path {
        let mut node = top;
        let mut subtrees = Vec::new();
        for _ in 0..count {
            let Some(link) = self.nodes[node].links.first() else { break };
            subtrees.push(link.subtree.clone());
            node = link.node;
        }
        subtrees.reverse();
        Path { base: node, subtrees }
    }

    /// Every subtree on the primary path, bottom first.
    pub(crate) fn primary_subtrees(&self, top: NodeId) -> Vec<GreenNode> {
        self.pop_primary(top, usize::MAX).subtrees
    }

    /// Nodes on the primary path starting at `top`, with their depth.
    pub(crate) fn primary_nodes(&self, top: NodeId) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        std::iter::successors(Some(top), |&node| {
            self.nodes[node].links.first().map(|link| link.node)
        })
        .enumerate()
    }

    /// Folds the links of `from` into `into`. Both must be in the same state
    /// at the same position.
    pub(crate) fn merge(&mut self, into: NodeId, from: NodeId) {
        let links = self.nodes[from].links.clone();
        for link in links {
            self.add_link(into, link);
        }
    }

    fn add_link(&mut self, into: NodeId, link: Link) {
        if link.node == into {
            return;
        }
        let node = &mut self.nodes[into];
        if let Some(existing) = node.links.iter_mut().find(|existing| {
            existing.node == link.node && existing.subtree.symbol() == link.subtree.symbol()
        }) {
            if prefer(&existing.subtree, &link.subtree) {
                existing.subtree = link.subtree;
            }
            return;
        }
        if node.links.len() < MAX_LINKS {
            node.links.push(link);
        }
    }
}

/// Whether `candidate` should replace `current` as the interpretation of the
/// same text: cheaper errors first, then higher dynamic precedence, then the
/// more left-leaning shape.
pub(crate) fn prefer(current: &GreenNode, candidate: &GreenNode) -> bool {
    if candidate.error_cost() != current.error_cost() {
        return candidate.error_cost() < current.error_cost();
    }
    if candidate.dynamic_precedence() != current.dynamic_precedence() {
        return candidate.dynamic_precedence() > current.dynamic_precedence();
    }
    left_weight(candidate) > left_weight(current)
}

fn left_weight(node: &GreenNode) -> u32 {
    node.children().first().map_or(0, GreenNode::descendant_count)
}
