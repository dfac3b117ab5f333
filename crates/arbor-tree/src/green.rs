use std::fmt;

use arbor_lexer::ScannerState;
use arbor_tables::{ProductionId, StateId, Symbol};
use bitflags::bitflags;
use text_size::TextSize;
use triomphe::Arc;

pub const ERROR_COST_PER_RECOVERY: u32 = 500;
pub const ERROR_COST_PER_SKIPPED_TREE: u32 = 100;
pub const ERROR_COST_PER_SKIPPED_CHAR: u32 = 1;

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// May appear anywhere; skipped when mapping fields.
        const EXTRA = 1;
        /// Touched by an edit since it was built.
        const HAS_CHANGES = 1 << 1;
        /// Built while several stack versions were alive or during recovery.
        const FRAGILE = 1 << 2;
        const HAS_EXTERNAL_TOKENS = 1 << 3;
        /// This node or a descendant is an ERROR.
        const HAS_ERROR = 1 << 4;
    }
}

/// Immutable, shareable subtree. Positions are relative: a node only knows its
/// padding and size, so the same node can sit at different offsets in
/// different trees.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GreenNode(Arc<GreenNodeData>);

#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct GreenNodeData {
    pub(crate) symbol: Symbol,
    pub(crate) padding: TextSize,
    pub(crate) size: TextSize,
    pub(crate) lookahead_bytes: u32,
    pub(crate) parse_state: StateId,
    pub(crate) production: ProductionId,
    pub(crate) flags: NodeFlags,
    pub(crate) error_cost: u32,
    pub(crate) dynamic_precedence: i32,
    pub(crate) descendant_count: u32,
    pub(crate) children: Box<[GreenNode]>,
    pub(crate) scanner_state: Option<ScannerState>,
}

impl GreenNode {
    pub(crate) fn from_data(data: GreenNodeData) -> Self {
        Self(Arc::new(data))
    }

    pub(crate) fn data(&self) -> &GreenNodeData {
        &self.0
    }

    pub(crate) fn leaf(
        symbol: Symbol,
        padding: TextSize,
        size: TextSize,
        lookahead_bytes: u32,
        parse_state: StateId,
        mut flags: NodeFlags,
        scanner_state: Option<ScannerState>,
    ) -> Self {
        let mut error_cost = 0;
        if symbol == Symbol::ERROR {
            flags |= NodeFlags::HAS_ERROR;
            error_cost = ERROR_COST_PER_RECOVERY + ERROR_COST_PER_SKIPPED_CHAR * u32::from(size);
        }
        if scanner_state.is_some() {
            flags |= NodeFlags::HAS_EXTERNAL_TOKENS;
        }
        Self::from_data(GreenNodeData {
            symbol,
            padding,
            size,
            lookahead_bytes,
            parse_state,
            production: ProductionId::NONE,
            flags,
            error_cost,
            dynamic_precedence: 0,
            descendant_count: 1,
            children: Box::new([]),
            scanner_state,
        })
    }

    /// Builds an interior node, deriving position, flags and costs from `children`.
    pub(crate) fn interior(
        symbol: Symbol,
        production: ProductionId,
        parse_state: StateId,
        children: Vec<Self>,
        mut flags: NodeFlags,
        dynamic_precedence: i32,
    ) -> Self {
        let mut total = TextSize::new(0);
        let mut lookahead_end = 0u32;
        let mut error_cost = 0u32;
        let mut precedence = dynamic_precedence;
        let mut descendant_count = 1u32;
        for child in &children {
            let child_end = total + child.total_len();
            lookahead_end = lookahead_end.max(u32::from(child_end) + child.lookahead_bytes());
            total = child_end;
            error_cost = error_cost.saturating_add(child.error_cost());
            precedence = precedence.saturating_add(child.dynamic_precedence());
            descendant_count = descendant_count.saturating_add(child.descendant_count());
            if child.has_error() {
                flags |= NodeFlags::HAS_ERROR;
            }
            if child.has_external_tokens() {
                flags |= NodeFlags::HAS_EXTERNAL_TOKENS;
            }
        }
        let padding = children.first().map_or(TextSize::new(0), Self::padding);
        let size = total - padding;
        if symbol == Symbol::ERROR {
            flags |= NodeFlags::HAS_ERROR;
            error_cost = error_cost
                .saturating_add(ERROR_COST_PER_RECOVERY)
                .saturating_add(ERROR_COST_PER_SKIPPED_TREE * children.len() as u32)
                .saturating_add(ERROR_COST_PER_SKIPPED_CHAR * u32::from(size));
        }
        Self::from_data(GreenNodeData {
            symbol,
            padding,
            size,
            lookahead_bytes: lookahead_end.saturating_sub(u32::from(total)),
            parse_state,
            production,
            flags,
            error_cost,
            dynamic_precedence: precedence,
            descendant_count,
            children: children.into_boxed_slice(),
            scanner_state: None,
        })
    }

    pub(crate) fn with_lookahead(self, lookahead_bytes: u32) -> Self {
        if lookahead_bytes <= self.lookahead_bytes() {
            return self;
        }
        let mut data = GreenNodeData::clone(&self.0);
        data.lookahead_bytes = lookahead_bytes;
        Self::from_data(data)
    }

    #[inline]
    pub fn symbol(&self) -> Symbol {
        self.0.symbol
    }

    /// Skipped bytes (whitespace) before the content.
    #[inline]
    pub fn padding(&self) -> TextSize {
        self.0.padding
    }

    #[inline]
    pub fn size(&self) -> TextSize {
        self.0.size
    }

    /// Padding plus size.
    #[inline]
    pub fn total_len(&self) -> TextSize {
        self.0.padding + self.0.size
    }

    #[inline]
    pub fn lookahead_bytes(&self) -> u32 {
        self.0.lookahead_bytes
    }

    /// The parse state the node was pushed from.
    #[inline]
    pub fn parse_state(&self) -> StateId {
        self.0.parse_state
    }

    #[inline]
    pub fn production(&self) -> ProductionId {
        self.0.production
    }

    #[inline]
    pub fn flags(&self) -> NodeFlags {
        self.0.flags
    }

    pub fn is_extra(&self) -> bool {
        self.0.flags.contains(NodeFlags::EXTRA)
    }

    pub fn has_changes(&self) -> bool {
        self.0.flags.contains(NodeFlags::HAS_CHANGES)
    }

    pub fn is_fragile(&self) -> bool {
        self.0.flags.contains(NodeFlags::FRAGILE)
    }

    pub fn has_external_tokens(&self) -> bool {
        self.0.flags.contains(NodeFlags::HAS_EXTERNAL_TOKENS)
    }

    pub fn has_error(&self) -> bool {
        self.0.flags.contains(NodeFlags::HAS_ERROR)
    }

    pub fn is_error(&self) -> bool {
        self.0.symbol == Symbol::ERROR
    }

    pub fn is_leaf(&self) -> bool {
        self.0.children.is_empty() && self.0.production == ProductionId::NONE
    }

    #[inline]
    pub fn error_cost(&self) -> u32 {
        self.0.error_cost
    }

    #[inline]
    pub fn dynamic_precedence(&self) -> i32 {
        self.0.dynamic_precedence
    }

    /// Number of nodes in this subtree, itself included.
    #[inline]
    pub fn descendant_count(&self) -> u32 {
        self.0.descendant_count
    }

    #[inline]
    pub fn children(&self) -> &[Self] {
        &self.0.children
    }

    pub fn scanner_state(&self) -> Option<&ScannerState> {
        self.0.scanner_state.as_ref()
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }

    pub fn first_leaf(&self) -> &Self {
        let mut node = self;
        while let Some(first) = node.children().first() {
            node = first;
        }
        node
    }

    /// Scanner state after the last external token inside this subtree.
    pub fn last_external_scanner_state(&self) -> Option<&ScannerState> {
        let mut node = self;
        loop {
            if !node.has_external_tokens() {
                return None;
            }
            if let Some(state) = node.scanner_state() {
                return Some(state);
            }
            node = node.children().iter().rev().find(|child| child.has_external_tokens())?;
        }
    }
}

impl fmt::Debug for GreenNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GreenNode")
            .field("symbol", &self.0.symbol)
            .field("padding", &self.0.padding)
            .field("size", &self.0.size)
            .field("flags", &self.0.flags)
            .field("children", &self.0.children.len())
            .finish_non_exhaustive()
    }
}
