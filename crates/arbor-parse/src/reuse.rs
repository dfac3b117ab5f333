use arbor_lexer::{ScannerState, Token};
use arbor_tables::{Action, GrammarTable, StateId};
use arbor_tree::{GreenNode, Tree};
use text_size::TextSize;

/// Walks an edited tree in document order, offering subtrees that can be
/// pushed as they are instead of being parsed again.
pub(crate) struct ReuseCursor {
    /// Path from the root to the current node.
    stack: Vec<Entry>,
    /// Scanner state after the last external token passed so far.
    last_external: Option<ScannerState>,
}

struct Entry {
    node: GreenNode,
    /// Start of the node, padding included.
    offset: TextSize,
    /// Index within the parent.
    index: usize,
}

/// A subtree approved for reuse and the state to enter after pushing it.
pub(crate) struct Reusable {
    pub(crate) node: GreenNode,
    pub(crate) next_state: StateId,
}

impl ReuseCursor {
    pub(crate) fn new(tree: &Tree) -> Self {
        let root = Entry { node: tree.green().clone(), offset: TextSize::new(0), index: 0 };
        Self { stack: vec![root], last_external: None }
    }

    fn advance(&mut self) {
        while let Some(entry) = self.stack.pop() {
            if let Some(state) = entry.node.last_external_scanner_state() {
                self.last_external = Some(state.clone());
            }
            let Some(parent) = self.stack.last() else { return };
            if let Some(sibling) = parent.node.children().get(entry.index + 1) {
                let offset = entry.offset + entry.node.total_len();
                self.stack.push(Entry { node: sibling.clone(), offset, index: entry.index + 1 });
                return;
            }
        }
    }

    fn descend(&mut self) -> bool {
        let Some(entry) = self.stack.last() else { return false };
        let Some(first) = entry.node.children().first() else { return false };
        let child = Entry { node: first.clone(), offset: entry.offset, index: 0 };
        self.stack.push(child);
        true
    }

    fn external_state_matches(&self, current: &ScannerState) -> bool {
        match &self.last_external {
            Some(last) => last == current,
            None => current.is_empty(),
        }
    }

    /// Finds a subtree starting exactly at `position` that a parser in `state`
    /// with `scanner_state` would rebuild identically.
    ///
    /// A version that already holds `lookahead` only takes subtrees starting
    /// with that same token.
    pub(crate) fn take(
        &mut self,
        table: &GrammarTable,
        position: TextSize,
        state: StateId,
        scanner_state: &ScannerState,
        lookahead: Option<&Token>,
    ) -> Option<Reusable> {
        loop {
            let entry = self.stack.last()?;
            let (node, offset) = (entry.node.clone(), entry.offset);
            let end = offset + node.total_len();

            if offset > position {
                return None;
            }
            if offset < position || node.total_len() == TextSize::new(0) {
                if end > position && self.descend() {
                    continue;
                }
                self.advance();
                continue;
            }
            if !self.external_state_matches(scanner_state) {
                self.advance();
                continue;
            }
            if node.has_changes() || node.has_error() || node.is_fragile() || node.is_extra() {
                if !self.descend() {
                    self.advance();
                }
                continue;
            }
            if node.parse_state() != state {
                // Every node starting here was pushed from the same state, so
                // descending cannot help.
                return None;
            }
            if let Some(token) = lookahead {
                let first = node.first_leaf();
                if first.symbol() != token.symbol || first.total_len() != token.total_len() {
                    return None;
                }
            }
            let Some(next_state) = next_state(table, state, &node) else {
                if self.descend() {
                    continue;
                }
                return None;
            };
            tracing::trace!(
                symbol = table.symbol_name(node.symbol()),
                position = u32::from(position),
                "reusing subtree"
            );
            self.advance();
            return Some(Reusable { node, next_state });
        }
    }
}

/// State after pushing `node`, if its first leaf is shifted here without
/// competing actions.
fn next_state(table: &GrammarTable, state: StateId, node: &GreenNode) -> Option<StateId> {
    let &[Action::Shift { state: shifted, extra: false }] =
        table.actions(state, node.first_leaf().symbol())
    else {
        return None;
    };
    if node.is_leaf() { Some(shifted) } else { table.goto(state, node.symbol()) }
}
