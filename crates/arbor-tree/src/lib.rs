//! Immutable, structurally shared syntax trees.
//!
//! Green nodes store only relative lengths and are shared between trees by
//! reference counting. Positioned [`SyntaxNode`] handles borrow their [`Tree`]
//! and are computed while navigating.

mod builder;
mod cursor;
mod diff;
mod dump;
mod edit;
mod green;
mod syntax;

#[cfg(test)]
mod tests;

/// Node construction for the stack machine.
pub use builder::TreeBuilder;
pub use cursor::TreeCursor;
pub use diff::changed_ranges;
/// Edits and the trees they produce.
pub use edit::{EditRejection, EditedTree, InputEdit, InvalidEditSequence};
pub use green::{
    ERROR_COST_PER_RECOVERY, ERROR_COST_PER_SKIPPED_CHAR, ERROR_COST_PER_SKIPPED_TREE, GreenNode,
    NodeFlags,
};
/// Positioned views and traversal.
pub use syntax::{Children, Preorder, SyntaxNode, TokenAtOffset, Tree, WalkEvent};
