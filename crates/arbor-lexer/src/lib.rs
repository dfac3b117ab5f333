//! State-dependent lexing over grammar-table DFAs.

mod cursor;
mod external;


use arbor_inputs::{Encoding, Input};
use arbor_tables::{GrammarTable, LexStateId, StateId, Symbol};
use cursor::Cursor;
pub use external::{ExternalScanner, ScanCursor, ScannerState, ValidSymbols};
use text_size::{TextRange, TextSize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub symbol: Symbol,
    /// Skipped bytes before `range`.
    pub padding: TextSize,
    pub range: TextRange,
    /// How far past `range.end()` the lexer read, at least one.
    pub lookahead_bytes: u32,
    /// Nothing matched; the token covers a single unit.
    pub is_error: bool,
    /// Scanner state after an external token.
    pub scanner_state: Option<ScannerState>,
}

impl Token {
    /// Start of the padding.
    pub fn total_start(&self) -> TextSize {
        self.range.start() - self.padding
    }

    pub fn total_len(&self) -> TextSize {
        self.padding + self.range.len()
    }

    pub fn end(&self) -> TextSize {
        self.range.end()
    }

    pub fn lookahead_end(&self) -> TextSize {
        self.range.end() + TextSize::new(self.lookahead_bytes)
    }

    pub fn is_external(&self) -> bool {
        self.scanner_state.is_some()
    }
}

/// What the lexer needs to know about the parse.
#[derive(Debug, Clone, Copy)]
pub struct LexContext<'s> {
    pub state: StateId,
    pub scanner_state: &'s ScannerState,
    /// Whether an external scanner may produce an empty token.
    pub allow_zero_width: bool,
}

pub struct Lexer<'a> {
    table: &'a GrammarTable,
    input: &'a dyn Input,
    encoding: Encoding,
    scanner: Option<&'a dyn ExternalScanner>,
    tokens_lexed: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(table: &'a GrammarTable, input: &'a dyn Input, encoding: Encoding) -> Self {
        Self { table, input, encoding, scanner: None, tokens_lexed: 0 }
    }

    pub fn with_scanner(mut self, scanner: Option<&'a dyn ExternalScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn tokens_lexed(&self) -> usize {
        self.tokens_lexed
    }

    pub fn text_len(&self) -> TextSize {
        TextSize::new(self.input.len() as u32)
    }

    /// Lexes the token at `position` as seen from `context.state`.
    ///
    /// Order: external scanner, the state's DFA restricted to symbols the state
    /// accepts, end of input, the error DFA accepting any terminal, and finally
    /// a one-unit ERROR token. Never fails.
    pub fn next_token(&mut self, position: TextSize, context: LexContext<'_>) -> Token {
        self.tokens_lexed += 1;
        let offset = usize::from(position);

        if let (Some(scanner), Some(valid)) =
            (self.scanner, self.table.valid_external_symbols(context.state))
            && let Some(token) = self.scan_external(scanner, valid, offset, context)
        {
            tracing::trace!(
                symbol = self.table.symbol_name(token.symbol),
                range = ?token.range,
                "external token"
            );
            return token;
        }

        let mode = self.table.lex_mode(context.state);
        let token = match self.run_dfa(mode.lex_state, offset, Some(context.state)) {
            Ok(token) => token,
            Err(_) => match self.run_dfa(self.table.error_lex_state(), offset, None) {
                Ok(token) => token,
                Err(content_start) => self.error_token(offset, content_start),
            },
        };
        tracing::trace!(
            symbol = self.table.symbol_name(token.symbol),
            range = ?token.range,
            state = context.state.0,
            "token"
        );
        token
    }

    fn scan_external(
        &self,
        scanner: &dyn ExternalScanner,
        valid: &[bool],
        offset: usize,
        context: LexContext<'_>,
    ) -> Option<Token> {
        let mut state = context.scanner_state.clone();
        let mut cursor = ScanCursor::new(self.input, self.encoding, offset);
        if !scanner.scan(&mut state, &mut cursor, ValidSymbols::new(valid)) {
            return None;
        }
        let index = cursor.result_symbol().filter(|&index| ValidSymbols::new(valid).contains(index))?;
        let symbol = *self.table.external_tokens().get(index)?;
        let (start, end, furthest) = cursor.finish();
        if start == end && !context.allow_zero_width {
            return None;
        }
        let mut token = token(symbol, offset, start, end, furthest);
        token.scanner_state = Some(state);
        Some(token)
    }

    /// Longest match from `start`. Only symbols valid in `state` are accepted
    /// when it is given. On failure returns where the token content would
    /// have started.
    fn run_dfa(&self, start: LexStateId, offset: usize, state: Option<StateId>) -> Result<Token, usize> {
        let mut cursor = Cursor::new(self.input, self.encoding, offset);
        let mut lex_state = start;
        let mut content_start = offset;
        let mut best = None;

        while let Some(dfa) = self.table.lex_state(lex_state) {
            if cursor.offset() > content_start
                && let Some(&symbol) = dfa.accepts().iter().find(|&&symbol| {
                    state.is_none_or(|state| self.table.has_actions(state, symbol))
                })
            {
                best = Some((symbol, cursor.offset()));
            }
            let Some((unit, width)) = cursor.peek() else { break };
            let Some(transition) = dfa.transition_for(unit) else { break };
            let skipping = transition.skip && cursor.offset() == content_start;
            cursor.advance(width);
            if skipping {
                content_start = cursor.offset();
            }
            lex_state = transition.next;
        }

        let furthest = cursor.furthest();
        match best {
            Some((symbol, end)) => Ok(token(symbol, offset, content_start, end, furthest)),
            None if content_start >= self.input.len() => {
                Ok(token(Symbol::END, offset, content_start, content_start, furthest))
            }
            None => Err(content_start),
        }
    }

    fn error_token(&self, offset: usize, content_start: usize) -> Token {
        let mut cursor = Cursor::new(self.input, self.encoding, content_start);
        let width = cursor.peek().map_or(1, |(_, width)| width);
        let mut token =
            token(Symbol::ERROR, offset, content_start, content_start + width, cursor.furthest());
        token.is_error = true;
        token
    }
}

fn token(symbol: Symbol, offset: usize, start: usize, end: usize, furthest: usize) -> Token {
    Token {
        symbol,
        padding: TextSize::new((start - offset) as u32),
        range: TextRange::new(TextSize::new(start as u32), TextSize::new(end as u32)),
        lookahead_bytes: furthest.saturating_sub(end).max(1) as u32,
        is_error: false,
        scanner_state: None,
    }
}
