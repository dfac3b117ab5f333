//! Positioned views over green nodes.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::successors;

use arbor_tables::{FieldId, GrammarTable, Language, Production, Symbol};
use text_size::{TextRange, TextSize};

use crate::cursor::TreeCursor;
use crate::dump;
use crate::green::GreenNode;

/// Immutable snapshot of a parse: a root node plus the length of the text it
/// was parsed from. Cloning is cheap and shares every node.
#[derive(Clone)]
pub struct Tree {
    root: GreenNode,
    language: Language,
    text_len: TextSize,
}

impl Tree {
    pub fn new(root: GreenNode, language: Language, text_len: TextSize) -> Self {
        Self { root, language, text_len }
    }

    /// Returns the root node. Its range always spans the whole text.
    #[inline]
    pub fn root_node(&self) -> SyntaxNode<'_> {
        SyntaxNode { tree: self, green: &self.root, offset: TextSize::new(0), is_root: true }
    }

    #[inline]
    pub fn green(&self) -> &GreenNode {
        &self.root
    }

    #[inline]
    pub fn language(&self) -> &Language {
        &self.language
    }

    #[inline]
    pub fn text_len(&self) -> TextSize {
        self.text_len
    }

    pub fn has_error(&self) -> bool {
        self.root.has_error()
    }

    /// Deepest node whose range contains `offset`.
    pub fn node_at(&self, offset: TextSize) -> SyntaxNode<'_> {
        self.root_node().descendant_for_byte_range(offset, offset)
    }

    pub fn walk(&self) -> TreeCursor<'_> {
        TreeCursor::new(self.root_node())
    }

    pub fn to_sexp(&self) -> String {
        self.root_node().to_sexp()
    }

    pub fn debug_tree(&self) -> String {
        self.root_node().debug_tree()
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("language", &self.language.name())
            .field("text_len", &self.text_len)
            .finish_non_exhaustive()
    }
}

/// Node handle tied to the lifetime of its tree.
#[derive(Clone, Copy)]
pub struct SyntaxNode<'t> {
    tree: &'t Tree,
    green: &'t GreenNode,
    /// Absolute start of the padding.
    offset: TextSize,
    is_root: bool,
}

impl<'t> SyntaxNode<'t> {
    fn child_at(self, green: &'t GreenNode, offset: TextSize) -> Self {
        Self { tree: self.tree, green, offset, is_root: false }
    }

    #[inline]
    pub fn tree(self) -> &'t Tree {
        self.tree
    }

    #[inline]
    pub fn green(self) -> &'t GreenNode {
        self.green
    }

    fn table(self) -> &'t GrammarTable {
        self.tree.language.table()
    }

    #[inline]
    pub fn symbol(self) -> Symbol {
        self.green.symbol()
    }

    /// Returns the grammar name of this node's symbol.
    pub fn kind(self) -> &'t str {
        self.table().symbol_name(self.symbol())
    }

    pub fn is_named(self) -> bool {
        self.table().is_named(self.symbol())
    }

    pub fn is_extra(self) -> bool {
        self.green.is_extra()
    }

    pub fn is_error(self) -> bool {
        self.green.is_error()
    }

    pub fn has_error(self) -> bool {
        self.green.has_error()
    }

    pub fn has_changes(self) -> bool {
        self.green.has_changes()
    }

    pub fn is_root(self) -> bool {
        self.is_root
    }

    /// Start of this node, padding excluded.
    pub fn start_byte(self) -> TextSize {
        if self.is_root { TextSize::new(0) } else { self.offset + self.green.padding() }
    }

    pub fn end_byte(self) -> TextSize {
        if self.is_root { self.tree.text_len } else { self.offset + self.green.total_len() }
    }

    pub fn byte_range(self) -> TextRange {
        TextRange::new(self.start_byte(), self.end_byte())
    }

    /// Range including the leading padding.
    pub(crate) fn total_range(self) -> TextRange {
        TextRange::at(self.offset, self.green.total_len())
    }

    /// Returns the source text of this node, if `source` is the parsed text.
    pub fn text<'s>(self, source: &'s str) -> Option<&'s str> {
        source.get(std::ops::Range::<usize>::from(self.byte_range()))
    }

    #[inline]
    pub fn child_count(self) -> usize {
        self.green.children().len()
    }

    pub fn children(self) -> Children<'t> {
        let end = self.offset + self.green.total_len();
        Children { node: self, iter: self.green.children().iter(), offset: self.offset, end }
    }

    pub fn child(self, index: usize) -> Option<Self> {
        self.children().nth(index)
    }

    pub fn named_children(self) -> impl Iterator<Item = Self> + 't {
        self.children().filter(|child| child.is_named())
    }

    pub fn named_child_count(self) -> usize {
        self.named_children().count()
    }

    pub fn named_child(self, index: usize) -> Option<Self> {
        self.named_children().nth(index)
    }

    pub fn first_child(self) -> Option<Self> {
        self.children().next()
    }

    pub fn last_child(self) -> Option<Self> {
        self.children().last()
    }

    /// Green nodes do not know their parents, so this searches down from the root.
    pub fn parent(self) -> Option<Self> {
        if self.is_root {
            return None;
        }
        let target = self.total_range();
        let mut stack = vec![self.tree.root_node()];
        while let Some(node) = stack.pop() {
            for child in node.children() {
                if child == self {
                    return Some(node);
                }
                if child.child_count() > 0 && child.total_range().contains_range(target) {
                    stack.push(child);
                }
            }
        }
        None
    }

    pub fn ancestors(self) -> impl Iterator<Item = Self> {
        successors(Some(self), |node| node.parent())
    }

    pub fn next_sibling(self) -> Option<Self> {
        let parent = self.parent()?;
        let mut children = parent.children();
        children.find(|child| *child == self)?;
        children.next()
    }

    pub fn prev_sibling(self) -> Option<Self> {
        let parent = self.parent()?;
        let mut previous = None;
        for child in parent.children() {
            if child == self {
                return previous;
            }
            previous = Some(child);
        }
        None
    }

    fn production(self) -> Option<&'t Production> {
        self.table().production(self.green.production())
    }

    /// Children paired with their index among the structural (non-extra) ones.
    fn structural_children(self) -> impl Iterator<Item = (Option<usize>, Self)> + 't {
        let mut structural = 0;
        self.children().map(move |child| {
            if child.is_extra() {
                (None, child)
            } else {
                structural += 1;
                (Some(structural - 1), child)
            }
        })
    }

    pub fn child_by_field_id(self, field: FieldId) -> Option<Self> {
        self.children_by_field_id(field).next()
    }

    pub fn children_by_field_id(self, field: FieldId) -> impl Iterator<Item = Self> + 't {
        let production = self.production();
        self.structural_children().filter_map(move |(index, child)| {
            (production?.field_for_child(index?)? == field).then_some(child)
        })
    }

    pub fn child_by_field_name(self, name: &str) -> Option<Self> {
        self.child_by_field_id(self.table().field_id_for_name(name)?)
    }

    /// Returns the field name of the child at `index`, if the production names it.
    pub fn field_name_for_child(self, index: usize) -> Option<&'t str> {
        let (structural, _) = self.structural_children().nth(index)?;
        let field = self.production()?.field_for_child(structural?)?;
        self.table().field_name(field)
    }

    /// Smallest node spanning `start..end`.
    pub fn descendant_for_byte_range(self, start: TextSize, end: TextSize) -> Self {
        let mut node = self;
        'descend: loop {
            for child in node.children() {
                let range = child.byte_range();
                if range.start() > start {
                    break;
                }
                if range.start() <= start && end <= range.end() && start < range.end() {
                    node = child;
                    continue 'descend;
                }
            }
            return node;
        }
    }

    /// Leaves touching `offset`: the leaf containing it, or the two leaves it
    /// separates.
    pub fn leaf_at_offset(self, offset: TextSize) -> TokenAtOffset<Self> {
        let mut found = Vec::with_capacity(2);
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.child_count() == 0 {
                found.push(node);
                continue;
            }
            let mut touching: Vec<_> = node
                .children()
                .filter(|child| {
                    let range = child.byte_range();
                    range.start() <= offset && offset <= range.end()
                })
                .collect();
            touching.reverse();
            stack.extend(touching);
        }
        found.sort_by_key(|leaf| (leaf.start_byte(), leaf.end_byte()));
        found.dedup();
        match found.as_slice() {
            [] => TokenAtOffset::None,
            [leaf] => TokenAtOffset::Single(*leaf),
            [.., left, right] if left.end_byte() == offset && right.start_byte() == offset => {
                TokenAtOffset::Between(*left, *right)
            }
            [.., last] => TokenAtOffset::Single(*last),
        }
    }

    pub fn preorder(self) -> Preorder<'t> {
        Preorder::new(self)
    }

    pub fn descendants(self) -> impl Iterator<Item = Self> {
        self.preorder().filter_map(|event| match event {
            WalkEvent::Enter(node) => Some(node),
            WalkEvent::Leave(_) => None,
        })
    }

    pub fn walk(self) -> TreeCursor<'t> {
        TreeCursor::new(self)
    }

    /// S-expression of the named nodes below this one, with field labels.
    pub fn to_sexp(self) -> String {
        dump::sexp(self)
    }

    /// Every node with its range, one per line.
    pub fn debug_tree(self) -> String {
        dump::debug_tree(self)
    }
}

impl PartialEq for SyntaxNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree)
            && GreenNode::ptr_eq(self.green, other.green)
            && self.offset == other.offset
            && self.is_root == other.is_root
    }
}

impl Eq for SyntaxNode<'_> {}

impl Hash for SyntaxNode<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.tree, state);
        std::ptr::hash(self.green.data(), state);
        self.offset.hash(state);
    }
}

impl fmt::Debug for SyntaxNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", self.kind(), self.byte_range())
    }
}

/// Iterator over the direct children of a node.
#[derive(Clone)]
pub struct Children<'t> {
    node: SyntaxNode<'t>,
    iter: std::slice::Iter<'t, GreenNode>,
    offset: TextSize,
    /// End of the last child not yet yielded from the back.
    end: TextSize,
}

impl<'t> Iterator for Children<'t> {
    type Item = SyntaxNode<'t>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let green = self.iter.next()?;
        let child = self.node.child_at(green, self.offset);
        self.offset += green.total_len();
        Some(child)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl DoubleEndedIterator for Children<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let green = self.iter.next_back()?;
        self.end -= green.total_len();
        Some(self.node.child_at(green, self.end))
    }
}

impl ExactSizeIterator for Children<'_> {}

/// Preorder traversal over nodes.
#[derive(Clone)]
pub struct Preorder<'t> {
    stack: Vec<(SyntaxNode<'t>, Children<'t>)>,
    root: Option<SyntaxNode<'t>>,
}

impl<'t> Preorder<'t> {
    fn new(start: SyntaxNode<'t>) -> Self {
        Self { stack: Vec::with_capacity(64), root: Some(start) }
    }

    /// Skips the children of the node just entered.
    pub fn skip_subtree(&mut self) {
        if let Some((_, children)) = self.stack.last_mut() {
            children.for_each(drop);
        }
    }
}

impl<'t> Iterator for Preorder<'t> {
    type Item = WalkEvent<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let Some((_, children)) = self.stack.last_mut() else {
            let root = self.root.take()?;
            self.stack.push((root, root.children()));
            return Some(WalkEvent::Enter(root));
        };
        match children.next() {
            Some(child) => {
                self.stack.push((child, child.children()));
                Some(WalkEvent::Enter(child))
            }
            None => {
                let (exited, _) = self.stack.pop()?;
                Some(WalkEvent::Leave(exited))
            }
        }
    }
}

/// Preorder walk event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent<'t> {
    Enter(SyntaxNode<'t>),
    Leave(SyntaxNode<'t>),
}

/// Result of [`SyntaxNode::leaf_at_offset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAtOffset<T> {
    /// No leaf at offset.
    None,
    /// Only a single leaf at offset.
    Single(T),
    /// Offset is exactly between two leaves.
    Between(T, T),
}

impl<T> TokenAtOffset<T> {
    /// Maps leaves to a different type.
    pub fn map<F: Fn(T) -> U, U>(self, f: F) -> TokenAtOffset<U> {
        match self {
            Self::None => TokenAtOffset::None,
            Self::Single(it) => TokenAtOffset::Single(f(it)),
            Self::Between(l, r) => TokenAtOffset::Between(f(l), f(r)),
        }
    }

    /// Convert to option, preferring the right leaf in case of a tie.
    pub fn right_biased(self) -> Option<T> {
        match self {
            Self::None => None,
            Self::Single(node) => Some(node),
            Self::Between(_, right) => Some(right),
        }
    }

    /// Convert to option, preferring the left leaf in case of a tie.
    pub fn left_biased(self) -> Option<T> {
        match self {
            Self::None => None,
            Self::Single(node) => Some(node),
            Self::Between(left, _) => Some(left),
        }
    }
}

impl<T> Iterator for TokenAtOffset<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match std::mem::replace(self, Self::None) {
            Self::None => None,
            Self::Single(node) => Some(node),
            Self::Between(left, right) => {
                *self = Self::Single(right);
                Some(left)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::None => (0, Some(0)),
            Self::Single(_) => (1, Some(1)),
            Self::Between(_, _) => (2, Some(2)),
        }
    }
}

impl<T> ExactSizeIterator for TokenAtOffset<T> {}
