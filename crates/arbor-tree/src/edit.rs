//! Applying text edits to trees by path copying.
//!
//! Ranges after an edit shift by its delta. Every node whose range or
//! lookahead touches the edited span is copied with `HAS_CHANGES` set; the
//! rest of the tree is shared with the unedited tree.

use text_size::{TextRange, TextSize};

use crate::green::{GreenNode, GreenNodeData, NodeFlags};
use crate::syntax::Tree;

/// A single replacement of `start..old_end` by text ending at `new_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputEdit {
    pub start: TextSize,
    pub old_end: TextSize,
    pub new_end: TextSize,
}

impl InputEdit {
    pub fn new(start: TextSize, old_end: TextSize, new_end: TextSize) -> Self {
        Self { start, old_end, new_end }
    }

    /// Replaces `deleted` bytes at `start` with `inserted` bytes.
    pub fn replace(start: TextSize, deleted: TextSize, inserted: TextSize) -> Self {
        Self { start, old_end: start + deleted, new_end: start + inserted }
    }

    pub fn insert(start: TextSize, inserted: TextSize) -> Self {
        Self::replace(start, TextSize::new(0), inserted)
    }

    pub fn delete(range: TextRange) -> Self {
        Self { start: range.start(), old_end: range.end(), new_end: range.start() }
    }

    pub fn old_range(&self) -> TextRange {
        TextRange::new(self.start, self.old_end)
    }

    pub fn new_range(&self) -> TextRange {
        TextRange::new(self.start, self.new_end)
    }

    /// Applies the edit to a UTF-8 string. Offsets must fall on char boundaries.
    pub fn apply_to(&self, text: &mut String, inserted: &str) {
        text.replace_range(usize::from(self.start)..usize::from(self.old_end), inserted);
    }

    fn validate(&self, text_len: TextSize, previous: Option<&Self>) -> Result<(), EditRejection> {
        if self.old_end < self.start {
            return Err(EditRejection::Inverted);
        }
        if self.new_end < self.start {
            return Err(EditRejection::NewEndBeforeStart);
        }
        if self.old_end > text_len {
            return Err(EditRejection::OutOfBounds { old_end: self.old_end, text_len });
        }
        if let Some(previous) = previous
            && self.start < previous.new_end
        {
            return Err(EditRejection::Overlapping { previous_end: previous.new_end });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EditRejection {
    #[error("old end precedes start")]
    Inverted,
    #[error("new end precedes start")]
    NewEndBeforeStart,
    #[error("old end {old_end:?} is past the end of the text ({text_len:?})")]
    OutOfBounds { old_end: TextSize, text_len: TextSize },
    #[error("edit starts before the end of the previous edit at {previous_end:?}")]
    Overlapping { previous_end: TextSize },
}

/// An edit batch was rejected. Nothing was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid edit #{index}: {reason}")]
pub struct InvalidEditSequence {
    pub index: usize,
    pub reason: EditRejection,
}

/// A tree whose positions were adjusted for edits but not reparsed yet.
#[derive(Debug, Clone)]
pub struct EditedTree {
    tree: Tree,
    edits: Vec<InputEdit>,
}

impl EditedTree {
    /// Applies another edit after the ones already recorded.
    pub fn edit(&mut self, edit: &InputEdit) -> Result<(), InvalidEditSequence> {
        let index = self.edits.len();
        edit.validate(self.tree.text_len(), self.edits.last())
            .map_err(|reason| InvalidEditSequence { index, reason })?;
        self.tree = edit_tree(&self.tree, edit);
        self.edits.push(*edit);
        Ok(())
    }

    /// The edited tree. Its ranges match the new text; unchanged nodes are
    /// shared with the tree it was made from.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn edits(&self) -> &[InputEdit] {
        &self.edits
    }

    pub fn into_tree(self) -> Tree {
        self.tree
    }
}

impl Tree {
    pub fn edit(&self, edit: &InputEdit) -> Result<EditedTree, InvalidEditSequence> {
        self.apply_edits(std::slice::from_ref(edit))
    }

    /// Applies `edits` in order. Each edit is in the coordinates produced by the
    /// previous ones and must start at or after the previous edit's new end.
    pub fn apply_edits(&self, edits: &[InputEdit]) -> Result<EditedTree, InvalidEditSequence> {
        let mut text_len = self.text_len();
        let mut previous = None;
        for (index, edit) in edits.iter().enumerate() {
            edit.validate(text_len, previous)
                .map_err(|reason| InvalidEditSequence { index, reason })?;
            text_len = text_len - edit.old_end + edit.new_end;
            previous = Some(edit);
        }

        let mut edited = EditedTree { tree: self.clone(), edits: Vec::with_capacity(edits.len()) };
        for edit in edits {
            edited.tree = edit_tree(&edited.tree, edit);
            edited.edits.push(*edit);
        }
        Ok(edited)
    }
}

fn edit_tree(tree: &Tree, edit: &InputEdit) -> Tree {
    let span = Span {
        start: edit.start.into(),
        old_end: edit.old_end.into(),
        new_end: edit.new_end.into(),
    };
    let root = edit_node(tree.green(), span);
    let text_len = tree.text_len() - edit.old_end + edit.new_end;
    Tree::new(root, tree.language().clone(), text_len)
}

/// An edit relative to the start of a node's padding.
#[derive(Clone, Copy)]
struct Span {
    start: u32,
    old_end: u32,
    new_end: u32,
}

impl Span {
    fn relative_to(self, offset: u32) -> Self {
        Self {
            start: self.start.saturating_sub(offset),
            old_end: self.old_end.saturating_sub(offset),
            new_end: self.new_end.saturating_sub(offset),
        }
    }
}

fn edit_node(node: &GreenNode, mut edit: Span) -> GreenNode {
    let is_noop = edit.old_end == edit.start && edit.new_end == edit.start;
    let is_pure_insertion = edit.old_end == edit.start;
    let padding = u32::from(node.padding());
    let size = u32::from(node.size());
    let total = padding + size;
    let reach = total + node.lookahead_bytes();
    if edit.start > reach || (is_noop && edit.start == reach) {
        return node.clone();
    }

    let mut data = GreenNodeData::clone(node.data());
    data.flags |= NodeFlags::HAS_CHANGES;

    if node.children().is_empty() {
        let (padding, size) = if edit.old_end <= padding {
            (edit.new_end + (padding - edit.old_end), size)
        } else if edit.start < padding {
            (edit.new_end, size.saturating_sub(edit.old_end - padding))
        } else if edit.start < total || (edit.start == total && is_pure_insertion) {
            (padding, (edit.new_end - padding) + total.saturating_sub(edit.old_end))
        } else {
            (padding, size)
        };
        data.padding = padding.into();
        data.size = size.into();
        return GreenNode::from_data(data);
    }

    let mut children = node.children().to_vec();
    let mut right = 0u32;
    for (index, child) in node.children().iter().enumerate() {
        let child_len = u32::from(child.total_len());
        let left = right;
        right = left + child_len;

        if right + child.lookahead_bytes() < edit.start {
            continue;
        }
        if left > edit.old_end || (left == edit.old_end && child_len > 0 && index > 0) {
            break;
        }

        let mut child_edit = edit.relative_to(left);
        // Inserted text goes to the first child touching the edit; later ones
        // only shrink.
        if right > edit.start || (right == edit.start && is_pure_insertion) {
            edit.new_end = edit.start;
        } else {
            child_edit.old_end = child_edit.start;
            child_edit.new_end = child_edit.start;
        }
        children[index] = edit_node(child, child_edit);
    }

    let total = children.iter().map(GreenNode::total_len).sum::<TextSize>();
    data.padding = children.first().map_or(TextSize::new(0), GreenNode::padding);
    data.size = total - data.padding;
    data.children = children.into_boxed_slice();
    GreenNode::from_data(data)
}
