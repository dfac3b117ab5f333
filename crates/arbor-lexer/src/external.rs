use std::fmt;

use arbor_inputs::{Encoding, Input};
use smallvec::SmallVec;
use text_size::TextSize;

use crate::cursor::Cursor;

/// Serialized state of an external scanner.
///
/// Each stack version carries its own copy; the lexer hands the scanner a
/// scratch copy and only keeps it when a token is produced.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ScannerState(SmallVec<[u8; 16]>);

impl ScannerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(SmallVec::from_slice(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn set(&mut self, bytes: &[u8]) {
        self.0.clear();
        self.0.extend_from_slice(bytes);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ScannerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScannerState").field(&self.0.as_slice()).finish()
    }
}

/// External tokens the parser can accept at this point, indexed like
/// `GrammarTable::external_tokens`.
#[derive(Clone, Copy, Debug)]
pub struct ValidSymbols<'a> {
    valid: &'a [bool],
}

impl<'a> ValidSymbols<'a> {
    pub fn new(valid: &'a [bool]) -> Self {
        Self { valid }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.valid.get(index).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + 'a {
        self.valid.iter().enumerate().filter(|(_, valid)| **valid).map(|(index, _)| index)
    }
}

/// Hand-written lexing for tokens the DFA cannot express.
pub trait ExternalScanner: Send + Sync {
    /// Tries to recognize one of `valid` at the cursor. On success the scanner
    /// sets [`ScanCursor::set_result_symbol`] and returns `true`; a `false`
    /// return lets the built-in lexer run instead.
    fn scan(
        &self,
        state: &mut ScannerState,
        cursor: &mut ScanCursor<'_>,
        valid: ValidSymbols<'_>,
    ) -> bool;
}

pub struct ScanCursor<'a> {
    cursor: Cursor<'a>,
    token_start: usize,
    marked_end: Option<usize>,
    result_symbol: Option<usize>,
    current: Option<(u32, usize)>,
}

impl<'a> ScanCursor<'a> {
    pub(crate) fn new(input: &'a dyn Input, encoding: Encoding, offset: usize) -> Self {
        let mut cursor = Cursor::new(input, encoding, offset);
        let current = cursor.peek();
        Self { cursor, token_start: offset, marked_end: None, result_symbol: None, current }
    }

    /// The character under the cursor, `None` at end of input. Bytes read as
    /// Latin-1 characters under [`Encoding::Bytes`].
    pub fn lookahead(&self) -> Option<char> {
        self.current.map(|(unit, _)| char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    /// Moves past the current character. Skipped characters before the token
    /// content become padding.
    pub fn advance(&mut self, skip: bool) {
        let Some((_, width)) = self.current else { return };
        let at_start = self.cursor.offset() == self.token_start;
        self.cursor.advance(width);
        if skip && at_start {
            self.token_start = self.cursor.offset();
        }
        self.current = self.cursor.peek();
    }

    /// Ends the token at the current position. Characters read afterwards
    /// only count as lookahead.
    pub fn mark_end(&mut self) {
        self.marked_end = Some(self.cursor.offset());
    }

    pub fn set_result_symbol(&mut self, index: usize) {
        self.result_symbol = Some(index);
    }

    pub fn result_symbol(&self) -> Option<usize> {
        self.result_symbol
    }

    pub fn eof(&self) -> bool {
        self.cursor.is_eof()
    }

    /// Absolute byte offset of the cursor.
    pub fn position(&self) -> TextSize {
        TextSize::new(self.cursor.offset() as u32)
    }

    /// `(content start, end, furthest byte read)`.
    pub(crate) fn finish(&self) -> (usize, usize, usize) {
        let end = self.marked_end.unwrap_or(self.cursor.offset()).max(self.token_start);
        (self.token_start, end, self.cursor.furthest())
    }
}
