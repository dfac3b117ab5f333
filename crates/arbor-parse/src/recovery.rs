//! Error recovery for a version that has no action on its lookahead.
//!
//! The version first looks down its stack for a state that can handle the
//! token and wraps everything above it in an ERROR node. Failing that it skips
//! the token. At the end of input the whole stack becomes an ERROR root.

use arbor_lexer::Token;
use arbor_tables::Symbol;

use crate::parser::ParseRun;
use crate::stack::Status;

/// How far below the top recovery looks for a state accepting the token.
const MAX_RECOVERY_DEPTH: usize = 64;

impl ParseRun<'_> {
    pub(crate) fn recover(&mut self, index: usize, token: Token) {
        if token.range.is_empty() && token.symbol != Symbol::END {
            // Retry at the same position without zero-width tokens.
            self.heads[index].forbid_empty = true;
            return;
        }

        let position = token.total_start();
        if self.heads[index].searched_at != Some(position) {
            self.heads[index].searched_at = Some(position);
            if let Some(depth) = self.find_frame(index, token.symbol) {
                self.recover_to(index, depth);
                self.process(index, token);
                return;
            }
        }

        if token.symbol == Symbol::END {
            self.finish_with_errors(index);
        } else {
            self.skip_token(index, &token);
        }
    }

    /// Depth of the nearest stack node below the top whose state has an action
    /// for `symbol`.
    fn find_frame(&self, index: usize, symbol: Symbol) -> Option<usize> {
        let table = self.table;
        let top = self.heads[index].node;
        self.stack
            .primary_nodes(top)
            .skip(1)
            .take(MAX_RECOVERY_DEPTH)
            .find(|&(_, node)| table.has_actions(self.stack.state(node), symbol))
            .map(|(depth, _)| depth)
    }

    /// Pops `depth` subtrees and pushes them back, with any skipped tokens, as
    /// one ERROR extra in the state found below.
    fn recover_to(&mut self, index: usize, depth: usize) {
        let top = self.heads[index].node;
        let path = self.stack.pop_primary(top, depth);
        let mut children = path.subtrees;
        children.append(&mut self.heads[index].skipped);
        let state = self.stack.state(path.base);
        tracing::debug!(depth, state = state.0, "recovering");

        let error = self.builder.error(children, state);
        self.heads[index].node = self.stack.push(path.base, error, state);
    }

    /// Wraps pending skipped tokens into an ERROR extra on top of the stack.
    pub(crate) fn flush_skipped(&mut self, index: usize) {
        let children = std::mem::take(&mut self.heads[index].skipped);
        let state = self.state(index);
        let error = self.builder.error(children, state);
        let head = &mut self.heads[index];
        head.node = self.stack.push(head.node, error, state);
    }

    fn skip_token(&mut self, index: usize, token: &Token) {
        tracing::trace!(symbol = self.table.symbol_name(token.symbol), range = ?token.range, "skip");
        let state = self.state(index);
        let leaf = self.builder.leaf(token, state, false);
        let head = &mut self.heads[index];
        head.skipped.push(leaf);
        if let Some(scanner_state) = &token.scanner_state {
            head.scanner_state = scanner_state.clone();
        }
    }

    /// Ends the version at end of input with everything it holds under an
    /// ERROR root.
    fn finish_with_errors(&mut self, index: usize) {
        let top = self.heads[index].node;
        let mut children = self.stack.primary_subtrees(top);
        children.append(&mut self.heads[index].skipped);
        let root = self.builder.error_root(children, self.stack.state(top));
        tracing::debug!(error_cost = root.error_cost(), "finished with errors");
        self.finish(root);
        self.heads[index].status = Status::Halted;
    }
}
