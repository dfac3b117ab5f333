use std::fmt;

use crate::{FieldId, LexStateId, ProductionId, StateId, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Push the lookahead and move to `state`. Extras keep the current state.
    Shift { state: StateId, extra: bool },
    Reduce { production: ProductionId },
    Accept,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMetadata {
    pub name: Box<str>,
    pub named: bool,
    pub terminal: bool,
    pub extra: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldEntry {
    pub field: FieldId,
    /// Index among the structural (non-extra) children.
    pub child_index: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub lhs: Symbol,
    pub child_count: u16,
    pub dynamic_precedence: i16,
    pub fields: Box<[FieldEntry]>,
}

impl Production {
    pub fn field_for_child(&self, structural_index: usize) -> Option<FieldId> {
        self.fields
            .iter()
            .find(|entry| usize::from(entry.child_index) == structural_index)
            .map(|entry| entry.field)
    }
}

/// Which lexer to run in a parse state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LexMode {
    pub lex_state: LexStateId,
    pub external_set: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ActionEntry {
    pub(crate) symbol: Symbol,
    pub(crate) start: u32,
    pub(crate) len: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseState {
    pub(crate) lex_mode: LexMode,
    pub(crate) entries: Box<[ActionEntry]>,
    pub(crate) gotos: Box<[(Symbol, StateId)]>,
}

impl ParseState {
    pub fn lex_mode(&self) -> LexMode {
        self.lex_mode
    }

    /// Terminals with at least one action in this state.
    pub fn valid_symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.entries.iter().map(|entry| entry.symbol)
    }

    pub fn gotos(&self) -> &[(Symbol, StateId)] {
        &self.gotos
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Inclusive range of code points (or bytes).
    pub lo: u32,
    pub hi: u32,
    pub next: LexStateId,
    /// Consumed characters become padding instead of token content.
    pub skip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LexState {
    pub(crate) accepts: Box<[Symbol]>,
    pub(crate) transitions: Box<[Transition]>,
}

impl LexState {
    /// Accepted symbols, in declaration order.
    pub fn accepts(&self) -> &[Symbol] {
        &self.accepts
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn transition_for(&self, unit: u32) -> Option<&Transition> {
        let index = self.transitions.partition_point(|transition| transition.hi < unit);
        self.transitions.get(index).filter(|transition| transition.lo <= unit)
    }
}

/// Immutable parse and lex tables of one grammar.
#[derive(Clone, PartialEq, Eq)]
pub struct GrammarTable {
    pub(crate) name: Box<str>,
    pub(crate) symbols: Box<[SymbolMetadata]>,
    pub(crate) terminal_count: u16,
    pub(crate) fields: Box<[Box<str>]>,
    pub(crate) productions: Box<[Production]>,
    pub(crate) states: Box<[ParseState]>,
    pub(crate) actions: Box<[Action]>,
    pub(crate) lex_states: Box<[LexState]>,
    pub(crate) external_tokens: Box<[Symbol]>,
    pub(crate) external_sets: Box<[Box<[bool]>]>,
    pub(crate) start_state: StateId,
    pub(crate) error_lex_state: LexStateId,
}

impl GrammarTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn terminal_count(&self) -> usize {
        usize::from(self.terminal_count)
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn lex_state_count(&self) -> usize {
        self.lex_states.len()
    }

    pub fn start_state(&self) -> StateId {
        self.start_state
    }

    pub fn error_lex_state(&self) -> LexStateId {
        self.error_lex_state
    }

    /// All actions for `symbol` in `state`. More than one action means the
    /// grammar is ambiguous there.
    pub fn actions(&self, state: StateId, symbol: Symbol) -> &[Action] {
        let Some(state) = self.states.get(state.index()) else { return &[] };
        let Ok(index) = state.entries.binary_search_by_key(&symbol, |entry| entry.symbol) else {
            return &[];
        };
        let entry = state.entries[index];
        let start = entry.start as usize;
        self.actions.get(start..start + usize::from(entry.len)).unwrap_or(&[])
    }

    pub fn has_actions(&self, state: StateId, symbol: Symbol) -> bool {
        !self.actions(state, symbol).is_empty()
    }

    pub fn goto(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        let state = self.states.get(state.index())?;
        let index = state.gotos.binary_search_by_key(&symbol, |&(symbol, _)| symbol).ok()?;
        Some(state.gotos[index].1)
    }

    pub fn parse_state(&self, state: StateId) -> Option<&ParseState> {
        self.states.get(state.index())
    }

    pub fn lex_mode(&self, state: StateId) -> LexMode {
        self.states.get(state.index()).map(|state| state.lex_mode).unwrap_or_default()
    }

    pub fn lex_state(&self, state: LexStateId) -> Option<&LexState> {
        self.lex_states.get(state.index())
    }

    pub fn production(&self, production: ProductionId) -> Option<&Production> {
        self.productions.get(production.index())
    }

    pub fn external_tokens(&self) -> &[Symbol] {
        &self.external_tokens
    }

    /// The external tokens valid in `state`, indexed like [`Self::external_tokens`].
    pub fn valid_external_symbols(&self, state: StateId) -> Option<&[bool]> {
        let set = self.lex_mode(state).external_set?;
        self.external_sets.get(usize::from(set)).map(|set| &set[..])
    }

    pub fn symbol_metadata(&self, symbol: Symbol) -> Option<&SymbolMetadata> {
        self.symbols.get(symbol.index())
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        if symbol == Symbol::ERROR {
            return "ERROR";
        }
        self.symbol_metadata(symbol).map_or("<unknown>", |metadata| &metadata.name)
    }

    pub fn is_named(&self, symbol: Symbol) -> bool {
        symbol == Symbol::ERROR || self.symbol_metadata(symbol).is_some_and(|m| m.named)
    }

    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.index() < self.terminal_count()
    }

    pub fn is_extra(&self, symbol: Symbol) -> bool {
        self.symbol_metadata(symbol).is_some_and(|metadata| metadata.extra)
    }

    /// Looks a symbol up by name, preferring the named one when both exist.
    pub fn symbol_for_name(&self, name: &str) -> Option<Symbol> {
        if name == "ERROR" {
            return Some(Symbol::ERROR);
        }
        let mut candidates = self.symbols.iter().enumerate().filter(|(_, m)| &*m.name == name);
        let first = candidates.next()?;
        let best = if first.1.named { first } else { candidates.find(|(_, m)| m.named).unwrap_or(first) };
        Some(Symbol::from_index(best.0))
    }

    pub fn field_name(&self, field: FieldId) -> Option<&str> {
        self.fields.get(field.index()).map(|name| &**name)
    }

    pub fn field_id_for_name(&self, name: &str) -> Option<FieldId> {
        self.fields.iter().position(|field| &**field == name).map(FieldId::from_index)
    }
}

impl fmt::Debug for GrammarTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrammarTable")
            .field("name", &self.name)
            .field("symbols", &self.symbols.len())
            .field("states", &self.states.len())
            .field("productions", &self.productions.len())
            .field("lex_states", &self.lex_states.len())
            .finish_non_exhaustive()
    }
}
