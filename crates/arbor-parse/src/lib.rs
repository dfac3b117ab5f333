//! Incremental GLR parsing driven by generated grammar tables.
//!
//! A [`Parser`] turns text into a [`Tree`]. Given an [`EditedTree`] it parses
//! the new text again, reusing every subtree the edits did not touch, and
//! reports which ranges of the new tree differ from the old one.

mod parser;
mod recovery;
mod reuse;
mod stack;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use arbor_inputs::{Encoding, Input};
use arbor_lexer::ExternalScanner;
use arbor_tables::Language;
use arbor_tree::{EditedTree, Tree, changed_ranges};
use text_size::{TextRange, TextSize};

use crate::parser::ParseRun;
use crate::reuse::ReuseCursor;

/// The parse was stopped through the cancellation flag. No tree is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("parse cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    pub encoding: Encoding,
    /// Stack versions kept alive at once.
    pub max_versions: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { encoding: Encoding::Utf8, max_versions: 6 }
    }
}

/// Counters from the most recent parse.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    pub nodes_created: usize,
    /// Nodes taken from the old tree, descendants included.
    pub nodes_reused: usize,
    pub tokens_lexed: usize,
    /// Most stack versions alive at the same time.
    pub max_versions: usize,
}

pub struct Parser {
    language: Language,
    config: ParserConfig,
    scanner: Option<Box<dyn ExternalScanner>>,
    cancellation_flag: Option<Arc<AtomicBool>>,
    stats: ParseStats,
}

impl Parser {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            config: ParserConfig::default(),
            scanner: None,
            cancellation_flag: None,
            stats: ParseStats::default(),
        }
    }

    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// Scanner for the language's external tokens.
    pub fn with_scanner(mut self, scanner: impl ExternalScanner + 'static) -> Self {
        self.scanner = Some(Box::new(scanner));
        self
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Switches grammars. Any scanner belongs to the old language and is dropped.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
        self.scanner = None;
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parses stop with [`Cancelled`] once `flag` is set.
    pub fn set_cancellation_flag(&mut self, flag: Option<Arc<AtomicBool>>) {
        self.cancellation_flag = flag;
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    /// Parses `input` from scratch. Malformed input still yields a tree, with
    /// ERROR nodes where the grammar did not match.
    pub fn parse(&mut self, input: impl Input) -> Result<Tree, Cancelled> {
        self.run(&input, None)
    }

    /// Parses the edited text, reusing what `old` left undamaged.
    ///
    /// Returns the new tree together with the sorted, disjoint ranges whose
    /// syntax differs from `old`. A tree from another language is not reused.
    pub fn reparse(
        &mut self,
        old: &EditedTree,
        input: impl Input,
    ) -> Result<(Tree, Vec<TextRange>), Cancelled> {
        let reuse = Language::ptr_eq(old.tree().language(), &self.language)
            .then(|| ReuseCursor::new(old.tree()));
        let tree = self.run(&input, reuse)?;
        let ranges = changed_ranges(old, &tree);
        Ok((tree, ranges))
    }

    fn run(&mut self, input: &dyn Input, reuse: Option<ReuseCursor>) -> Result<Tree, Cancelled> {
        let language = self.language.clone();
        let run = ParseRun::new(
            language.table(),
            input,
            self.config.encoding,
            self.scanner.as_deref(),
            self.config.max_versions,
        )
        .with_reuse(reuse)
        .with_cancellation_flag(self.cancellation_flag.as_deref());
        let (root, stats) = run.run()?;
        self.stats = stats;
        Ok(Tree::new(root, language, TextSize::new(input.len() as u32)))
    }
}
