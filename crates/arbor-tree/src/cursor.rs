use text_size::TextSize;

use crate::syntax::SyntaxNode;

/// Stateful walker that keeps the path from its starting node, so moving to a
/// parent is constant time.
#[derive(Clone, Debug)]
pub struct TreeCursor<'t> {
    node: SyntaxNode<'t>,
    /// Index of `node` within the last ancestor.
    index: usize,
    ancestors: Vec<(SyntaxNode<'t>, usize)>,
}

impl<'t> TreeCursor<'t> {
    pub fn new(node: SyntaxNode<'t>) -> Self {
        Self { node, index: 0, ancestors: Vec::new() }
    }

    pub fn node(&self) -> SyntaxNode<'t> {
        self.node
    }

    /// Levels below the starting node.
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn reset(&mut self, node: SyntaxNode<'t>) {
        *self = Self::new(node);
    }

    fn descend(&mut self, child: SyntaxNode<'t>, index: usize) {
        self.ancestors.push((self.node, self.index));
        self.node = child;
        self.index = index;
    }

    pub fn goto_first_child(&mut self) -> bool {
        match self.node.first_child() {
            Some(child) => {
                self.descend(child, 0);
                true
            }
            None => false,
        }
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        let Some(&(parent, _)) = self.ancestors.last() else { return false };
        match parent.child(self.index + 1) {
            Some(sibling) => {
                self.node = sibling;
                self.index += 1;
                true
            }
            None => false,
        }
    }

    pub fn goto_parent(&mut self) -> bool {
        match self.ancestors.pop() {
            Some((parent, index)) => {
                self.node = parent;
                self.index = index;
                true
            }
            None => false,
        }
    }

    /// Moves to the first child that ends after `offset` and returns its index.
    pub fn goto_first_child_for_byte(&mut self, offset: TextSize) -> Option<usize> {
        let (index, child) =
            self.node.children().enumerate().find(|(_, child)| child.end_byte() > offset)?;
        self.descend(child, index);
        Some(index)
    }

    /// Field label of the current node within its parent.
    pub fn field_name(&self) -> Option<&'t str> {
        let &(parent, _) = self.ancestors.last()?;
        parent.field_name_for_child(self.index)
    }
}
