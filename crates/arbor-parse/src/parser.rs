//! The GLR driver.
//!
//! Each active version advances one token at a time, the one furthest behind
//! first. Conflicting actions fork versions; versions that meet in the same
//! state at the same position are merged again.

use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};

use arbor_inputs::{Encoding, Input};
use arbor_lexer::{ExternalScanner, LexContext, Lexer, ScannerState, Token};
use arbor_tables::{Action, GrammarTable, ProductionId, StateId};
use arbor_tree::{GreenNode, TreeBuilder};
use text_size::TextSize;

use crate::reuse::{ReuseCursor, Reusable};
use crate::stack::{Head, NodeId, Stack, Status, prefer};
use crate::{Cancelled, ParseStats};

/// Reductions a version may perform without shifting before it is dropped.
const MAX_REDUCTIONS_WITHOUT_SHIFT: u32 = 1024;

#[derive(PartialEq, Eq)]
struct CacheKey {
    position: TextSize,
    state: StateId,
    scanner_state: ScannerState,
    allow_zero_width: bool,
}

pub(crate) struct ParseRun<'a> {
    pub(crate) table: &'a GrammarTable,
    lexer: Lexer<'a>,
    pub(crate) builder: TreeBuilder<'a>,
    pub(crate) stack: Stack,
    pub(crate) heads: Vec<Head>,
    reuse: Option<ReuseCursor>,
    finished: Option<GreenNode>,
    max_versions: usize,
    peak_versions: usize,
    cancellation_flag: Option<&'a AtomicBool>,
    token_cache: Option<(CacheKey, Token)>,
}

impl<'a> ParseRun<'a> {
    pub(crate) fn new(
        table: &'a GrammarTable,
        input: &'a dyn Input,
        encoding: Encoding,
        scanner: Option<&'a dyn ExternalScanner>,
        max_versions: usize,
    ) -> Self {
        Self {
            table,
            lexer: Lexer::new(table, input, encoding).with_scanner(scanner),
            builder: TreeBuilder::new(table),
            stack: Stack::default(),
            heads: Vec::new(),
            reuse: None,
            finished: None,
            max_versions: max_versions.max(1),
            peak_versions: 0,
            cancellation_flag: None,
            token_cache: None,
        }
    }

    pub(crate) fn with_reuse(mut self, reuse: Option<ReuseCursor>) -> Self {
        self.reuse = reuse;
        self
    }

    pub(crate) fn with_cancellation_flag(mut self, flag: Option<&'a AtomicBool>) -> Self {
        self.cancellation_flag = flag;
        self
    }

    pub(crate) fn run(mut self) -> Result<(GreenNode, ParseStats), Cancelled> {
        let start = self.table.start_state();
        let base = self.stack.base(start);
        self.heads.push(Head::new(base));

        while let Some(index) = self.next_head() {
            if self.cancellation_flag.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::debug!("parse cancelled");
                return Err(Cancelled);
            }
            self.advance(index);
            self.condense();
        }

        let root = match self.finished.take() {
            Some(root) => root,
            None => {
                tracing::debug!("no version finished");
                self.builder.error_root(Vec::new(), start)
            }
        };
        let stats = ParseStats {
            nodes_created: self.builder.nodes_created(),
            nodes_reused: self.builder.nodes_reused(),
            tokens_lexed: self.lexer.tokens_lexed(),
            max_versions: self.peak_versions,
        };
        tracing::debug!(
            nodes_created = stats.nodes_created,
            nodes_reused = stats.nodes_reused,
            tokens_lexed = stats.tokens_lexed,
            max_versions = stats.max_versions,
            "parse finished"
        );
        Ok((root, stats))
    }

    /// The active version furthest behind; ties go to the older one.
    fn next_head(&self) -> Option<usize> {
        self.heads
            .iter()
            .enumerate()
            .filter(|(_, head)| head.is_active())
            .min_by_key(|&(_, head)| self.position(head))
            .map(|(index, _)| index)
    }

    pub(crate) fn position(&self, head: &Head) -> TextSize {
        self.stack.position(head.node) + head.skipped_len()
    }

    pub(crate) fn state(&self, index: usize) -> StateId {
        self.stack.state(self.heads[index].node)
    }

    fn live_versions(&self) -> usize {
        self.heads.iter().filter(|head| !head.is_halted()).count()
    }

    fn advance(&mut self, index: usize) {
        let state = self.state(index);
        let position = self.position(&self.heads[index]);

        // A lookahead carried over from a reduction does not block reuse: the
        // subtree's first leaf replaces it.
        let head = &self.heads[index];
        if head.lookahead.as_ref().is_none_or(|token| token.total_start() == position)
            && head.skipped.is_empty()
            && self.live_versions() == 1
            && let Some(reuse) = &mut self.reuse
            && let Some(found) = reuse.take(
                self.table,
                position,
                state,
                &self.heads[index].scanner_state,
                self.heads[index].lookahead.as_ref(),
            )
        {
            self.heads[index].lookahead = None;
            self.push_reused(index, found);
            return;
        }

        let token = match self.heads[index].lookahead.take() {
            Some(token) => token,
            None => self.lex(index, position, state),
        };
        self.process(index, token);
    }

    fn lex(&mut self, index: usize, position: TextSize, state: StateId) -> Token {
        let head = &self.heads[index];
        let allow_zero_width = !head.forbid_empty && head.empty_token_at != Some(position);
        let key =
            CacheKey { position, state, scanner_state: head.scanner_state.clone(), allow_zero_width };
        if let Some((cached, token)) = &self.token_cache
            && *cached == key
        {
            return token.clone();
        }
        let context = LexContext { state, scanner_state: &key.scanner_state, allow_zero_width };
        let token = self.lexer.next_token(position, context);
        self.token_cache = Some((key, token.clone()));
        token
    }

    /// Applies every action for `token` in the version's current state.
    pub(crate) fn process(&mut self, index: usize, token: Token) {
        let table = self.table;
        let state = self.state(index);
        let actions = table.actions(state, token.symbol);
        if actions.is_empty() {
            self.handle_error(index, token);
            return;
        }
        if !self.heads[index].skipped.is_empty() {
            self.flush_skipped(index);
        }

        let fragile = actions.len() > 1 || self.live_versions() > 1;
        let mut shift = None;
        for &action in actions {
            match action {
                Action::Shift { state: next, extra } => {
                    shift = Some(if extra { (state, true) } else { (next, false) });
                }
                Action::Reduce { production } => self.reduce(index, production, &token, fragile),
                Action::Accept => self.accept(index),
            }
        }

        match shift {
            Some((next, extra)) => self.shift(index, token, next, extra),
            None => self.heads[index].status = Status::Halted,
        }
    }

    fn shift(&mut self, index: usize, token: Token, next: StateId, extra: bool) {
        let state = self.state(index);
        let leaf = self.builder.leaf(&token, state, extra);
        tracing::trace!(
            symbol = self.table.symbol_name(token.symbol),
            from = state.0,
            to = next.0,
            extra,
            "shift"
        );
        let head = &mut self.heads[index];
        head.node = self.stack.push(head.node, leaf, next);
        head.reductions_since_shift = 0;
        if token.range.is_empty() {
            head.empty_token_at = Some(token.end());
        } else {
            head.forbid_empty = false;
        }
        if let Some(scanner_state) = token.scanner_state {
            head.scanner_state = scanner_state;
        }
    }

    fn push_reused(&mut self, index: usize, found: Reusable) {
        let Reusable { node, next_state } = found;
        self.builder.note_reused(&node);
        let head = &mut self.heads[index];
        if let Some(scanner_state) = node.last_external_scanner_state() {
            head.scanner_state = scanner_state.clone();
        }
        head.node = self.stack.push(head.node, node, next_state);
        head.reductions_since_shift = 0;
    }

    /// Forks a new version for every distinct stack below the popped
    /// children. Paths sharing a base are alternatives for the same text and
    /// are resolved here.
    fn reduce(&mut self, index: usize, production: ProductionId, token: &Token, fragile: bool) {
        let table = self.table;
        let Some(rule) = table.production(production) else { return };
        if self.heads[index].reductions_since_shift >= MAX_REDUCTIONS_WITHOUT_SHIFT {
            tracing::debug!(production = production.0, "too many reductions without a shift");
            return;
        }

        let paths = self.stack.pop_count(self.heads[index].node, usize::from(rule.child_count));
        let mut results: Vec<(NodeId, GreenNode, Vec<GreenNode>)> = Vec::with_capacity(paths.len());
        for path in paths {
            let mut children = path.subtrees;
            let structural_end = children.iter().rposition(|child| !child.is_extra()).map_or(0, |i| i + 1);
            let trailing = children.split_off(structural_end);

            let base_state = self.stack.state(path.base);
            let len: TextSize = children.iter().map(GreenNode::total_len).sum();
            let end = self.stack.position(path.base) + len;
            let lookahead = u32::from(token.lookahead_end()).saturating_sub(u32::from(end));
            let node = self.builder.reduce(production, children, base_state, lookahead, fragile);

            match results.iter_mut().find(|(base, ..)| *base == path.base) {
                Some(result) => {
                    if prefer(&result.1, &node) {
                        result.1 = node;
                        result.2 = trailing;
                    }
                }
                None => results.push((path.base, node, trailing)),
            }
        }

        for (base, node, trailing) in results {
            let Some(next) = table.goto(self.stack.state(base), rule.lhs) else {
                tracing::debug!(symbol = table.symbol_name(rule.lhs), "missing goto");
                continue;
            };
            tracing::trace!(symbol = table.symbol_name(rule.lhs), to = next.0, "reduce");
            let mut top = self.stack.push(base, node, next);
            for extra in trailing {
                top = self.stack.push(top, extra, next);
            }
            let mut head = self.heads[index].fork(top);
            head.lookahead = Some(token.clone());
            head.reductions_since_shift += 1;
            self.heads.push(head);
        }
    }

    fn accept(&mut self, index: usize) {
        let node = self.heads[index].node;
        let subtrees = self.stack.primary_subtrees(node);
        let root = self.builder.root(subtrees, self.stack.state(node));
        tracing::debug!(error_cost = root.error_cost(), "accept");
        self.finish(root);
    }

    pub(crate) fn finish(&mut self, root: GreenNode) {
        if self.finished.as_ref().is_none_or(|current| prefer(current, &root)) {
            self.finished = Some(root);
        }
    }

    fn handle_error(&mut self, index: usize, token: Token) {
        let others_alive =
            self.heads.iter().enumerate().any(|(other, head)| other != index && head.is_active());
        if others_alive {
            tracing::trace!(symbol = self.table.symbol_name(token.symbol), "pause");
            self.heads[index].status = Status::Paused(token);
        } else {
            self.recover(index, token);
        }
    }

    /// Drops dead and hopeless versions, merges equivalent ones and resumes
    /// the best paused version when no active one ranks above it.
    fn condense(&mut self) {
        self.heads.retain(|head| !head.is_halted());

        if let Some(finished) = &self.finished {
            let limit = finished.error_cost();
            let stack = &self.stack;
            self.heads.retain(|head| version_cost(stack, head) <= limit);
        }

        let mut i = 0;
        while i < self.heads.len() {
            let mut j = i + 1;
            while j < self.heads.len() {
                if self.can_merge(i, j) {
                    let other = self.heads.remove(j);
                    self.stack.merge(self.heads[i].node, other.node);
                    if self.heads[i].lookahead.is_none() {
                        self.heads[i].lookahead = other.lookahead;
                    }
                } else {
                    j += 1;
                }
            }
            i += 1;
        }

        let stack = &self.stack;
        self.heads.sort_by_key(|head| {
            (
                version_cost(stack, head),
                !head.is_active(),
                Reverse(stack.node(head.node).dynamic_precedence),
            )
        });
        if self.heads.len() > self.max_versions {
            tracing::trace!(dropped = self.heads.len() - self.max_versions, "too many versions");
            self.heads.truncate(self.max_versions);
        }
        self.peak_versions = self.peak_versions.max(self.heads.len());

        let mut has_active = false;
        let mut index = 0;
        while index < self.heads.len() {
            if self.heads[index].is_active() {
                has_active = true;
                index += 1;
                continue;
            }
            if has_active {
                self.heads.remove(index);
                continue;
            }
            has_active = true;
            let status = std::mem::replace(&mut self.heads[index].status, Status::Active);
            if let Status::Paused(token) = status {
                tracing::trace!("resume");
                self.recover(index, token);
            }
            index += 1;
        }
    }

    /// Versions merge only at equal error cost, so a merged node's cost holds
    /// for every path below it. A costlier twin stays separate and loses in
    /// ranking or at accept.
    fn can_merge(&self, i: usize, j: usize) -> bool {
        let (a, b) = (&self.heads[i], &self.heads[j]);
        let (x, y) = (self.stack.node(a.node), self.stack.node(b.node));
        a.is_active()
            && b.is_active()
            && a.skipped.is_empty()
            && b.skipped.is_empty()
            && x.state == y.state
            && x.position == y.position
            && x.error_cost == y.error_cost
            && a.scanner_state == b.scanner_state
    }
}

fn version_cost(stack: &Stack, head: &Head) -> u32 {
    stack.node(head.node).error_cost.saturating_add(head.skipped_cost())
}
