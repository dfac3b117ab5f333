use std::fmt::Write;

use crate::syntax::{SyntaxNode, WalkEvent};

enum Visit<'t> {
    Enter { node: SyntaxNode<'t>, label: Option<&'t str>, depth: usize },
    Leave,
}

/// Preorder walk that also reports each entered node's field label.
fn walk_labelled<'t>(node: SyntaxNode<'t>, mut visit: impl FnMut(Visit<'t>)) {
    // Open nodes and how many of their children were entered so far.
    let mut open: Vec<(SyntaxNode<'t>, usize)> = Vec::new();
    for event in node.preorder() {
        match event {
            WalkEvent::Enter(current) => {
                let depth = open.len();
                let label = open.last_mut().and_then(|(parent, entered)| {
                    *entered += 1;
                    parent.field_name_for_child(*entered - 1)
                });
                visit(Visit::Enter { node: current, label, depth });
                open.push((current, 0));
            }
            WalkEvent::Leave(_) => {
                open.pop();
                visit(Visit::Leave);
            }
        }
    }
}

pub(crate) fn sexp(node: SyntaxNode<'_>) -> String {
    let mut out = String::new();
    // Whether each open node was printed.
    let mut printed = Vec::new();
    walk_labelled(node, |visit| match visit {
        Visit::Enter { node, label, depth } => {
            let visible = depth == 0 || node.is_named() || node.is_error();
            if visible {
                if !out.is_empty() {
                    out.push(' ');
                }
                if let Some(label) = label {
                    let _ = write!(out, "{label}: ");
                }
                let _ = write!(out, "({}", node.kind());
            }
            printed.push(visible);
        }
        Visit::Leave => {
            if printed.pop() == Some(true) {
                out.push(')');
            }
        }
    });
    out
}

pub(crate) fn debug_tree(node: SyntaxNode<'_>) -> String {
    let mut out = String::new();
    walk_labelled(node, |visit| {
        let Visit::Enter { node, label, depth } = visit else { return };
        let _ = write!(out, "{:indent$}", "", indent = depth * 2);
        if let Some(label) = label {
            let _ = write!(out, "{label}: ");
        }
        if node.is_named() || node.is_error() {
            out.push_str(node.kind());
        } else {
            let _ = write!(out, "{:?}", node.kind());
        }
        let _ = writeln!(out, "@{:?}", node.byte_range());
    });
    out
}
