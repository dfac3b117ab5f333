use text_size::TextRange;

use crate::edit::{EditedTree, InputEdit};
use crate::green::GreenNode;
use crate::syntax::{SyntaxNode, Tree};

/// Ranges of the new text whose syntax differs between `old` and `new`.
///
/// `old` must be the edited tree `new` was reparsed from, so both use the same
/// coordinates. Subtrees shared between the two are skipped without a visit.
/// The result is sorted; touching ranges are merged.
pub fn changed_ranges(old: &EditedTree, new: &Tree) -> Vec<TextRange> {
    let edits = old.edits();
    let mut ranges = Vec::new();
    let mut stack = vec![(old.tree().root_node(), new.root_node())];

    while let Some((old_node, new_node)) = stack.pop() {
        if GreenNode::ptr_eq(old_node.green(), new_node.green())
            && old_node.start_byte() == new_node.start_byte()
        {
            continue;
        }

        let same_kind = old_node.symbol() == new_node.symbol()
            && old_node.is_extra() == new_node.is_extra()
            && old_node.child_count() == new_node.child_count();

        // Matching interior nodes are compared child by child even when an
        // edit moved their bounds, so only the differing leaves are reported.
        if same_kind && old_node.child_count() > 0 {
            stack.extend(old_node.children().zip(new_node.children()).rev());
            continue;
        }
        if same_kind
            && old_node.byte_range() == new_node.byte_range()
            && !is_damaged(old_node, edits)
        {
            continue;
        }

        let range = old_node.byte_range().cover(new_node.byte_range());
        if !range.is_empty() {
            ranges.push(range);
        }
    }

    merge(ranges)
}

/// Whether an edit replaced text inside this node.
fn is_damaged(node: SyntaxNode<'_>, edits: &[InputEdit]) -> bool {
    if !node.has_changes() {
        return false;
    }
    let range = node.byte_range();
    edits.iter().any(|edit| {
        let inserted = edit.new_range();
        if inserted.is_empty() {
            range.contains_inclusive(inserted.start())
        } else {
            range.intersect(inserted).is_some_and(|common| !common.is_empty())
        }
    })
}

fn merge(mut ranges: Vec<TextRange>) -> Vec<TextRange> {
    ranges.sort_by_key(|range| (range.start(), range.end()));
    let mut merged: Vec<TextRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start() <= last.end() => *last = last.cover(range),
            _ => merged.push(range),
        }
    }
    merged
}
