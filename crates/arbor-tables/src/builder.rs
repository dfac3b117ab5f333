use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::error::CorruptTableError;
use crate::table::{
    Action, ActionEntry, FieldEntry, GrammarTable, LexMode, LexState, ParseState, Production,
    SymbolMetadata, Transition,
};
use crate::validate::validate;
use crate::{FieldId, LexStateId, ProductionId, StateId, Symbol};

/// Assembles a [`GrammarTable`] in memory.
///
/// Terminals must be declared before non-terminals. Ids handed out by one
/// builder are only meaningful to that builder; passing foreign ids panics.
pub struct TableBuilder {
    name: Box<str>,
    symbols: Vec<SymbolMetadata>,
    fields: Vec<Box<str>>,
    productions: Vec<Production>,
    states: Vec<StateBuilder>,
    lex_states: Vec<LexStateBuilder>,
    external_tokens: Vec<Symbol>,
    external_sets: Vec<Box<[bool]>>,
    start_state: StateId,
    error_lex_state: LexStateId,
}

#[derive(Default)]
struct StateBuilder {
    lex_mode: LexMode,
    actions: BTreeMap<Symbol, Vec<Action>>,
    gotos: BTreeMap<Symbol, StateId>,
}

#[derive(Default)]
struct LexStateBuilder {
    accepts: Vec<Symbol>,
    transitions: Vec<Transition>,
}

impl TableBuilder {
    pub fn new(name: &str) -> Self {
        let end = SymbolMetadata { name: "end".into(), named: false, terminal: true, extra: false };
        Self {
            name: name.into(),
            symbols: vec![end],
            fields: Vec::new(),
            productions: Vec::new(),
            states: Vec::new(),
            lex_states: Vec::new(),
            external_tokens: Vec::new(),
            external_sets: Vec::new(),
            start_state: StateId(0),
            error_lex_state: LexStateId(0),
        }
    }

    fn symbol(&mut self, name: &str, named: bool, terminal: bool, extra: bool) -> Symbol {
        let symbol = Symbol::from_index(self.symbols.len());
        self.symbols.push(SymbolMetadata { name: name.into(), named, terminal, extra });
        symbol
    }

    pub fn terminal(&mut self, name: &str, named: bool) -> Symbol {
        self.symbol(name, named, true, false)
    }

    /// A terminal that may appear anywhere, such as a comment.
    pub fn extra_terminal(&mut self, name: &str, named: bool) -> Symbol {
        self.symbol(name, named, true, true)
    }

    pub fn nonterminal(&mut self, name: &str) -> Symbol {
        self.symbol(name, true, false, false)
    }

    pub fn field(&mut self, name: &str) -> FieldId {
        let field = FieldId::from_index(self.fields.len());
        self.fields.push(name.into());
        field
    }

    pub fn production(&mut self, lhs: Symbol, child_count: u16) -> ProductionId {
        self.production_with_fields(lhs, child_count, &[])
    }

    /// `fields` pairs a field with the index of a structural child.
    pub fn production_with_fields(
        &mut self,
        lhs: Symbol,
        child_count: u16,
        fields: &[(FieldId, u16)],
    ) -> ProductionId {
        let production = ProductionId::from_index(self.productions.len());
        let fields = fields
            .iter()
            .map(|&(field, child_index)| FieldEntry { field, child_index })
            .collect();
        self.productions.push(Production { lhs, child_count, dynamic_precedence: 0, fields });
        production
    }

    pub fn dynamic_precedence(&mut self, production: ProductionId, precedence: i16) {
        self.productions[production.index()].dynamic_precedence = precedence;
    }

    pub fn external_token(&mut self, symbol: Symbol) -> usize {
        self.external_tokens.push(symbol);
        self.external_tokens.len() - 1
    }

    /// Declares a set of external tokens valid together. Call after every
    /// external token has been declared.
    pub fn external_set(&mut self, valid: &[Symbol]) -> u16 {
        let set = self.external_tokens.iter().map(|symbol| valid.contains(symbol)).collect();
        self.external_sets.push(set);
        (self.external_sets.len() - 1) as u16
    }

    pub fn lex_state(&mut self) -> LexStateId {
        self.lex_states.push(LexStateBuilder::default());
        LexStateId::from_index(self.lex_states.len() - 1)
    }

    pub fn lex_accept(&mut self, state: LexStateId, symbol: Symbol) {
        let accepts = &mut self.lex_states[state.index()].accepts;
        if !accepts.contains(&symbol) {
            accepts.push(symbol);
        }
    }

    pub fn lex_range(&mut self, from: LexStateId, range: RangeInclusive<char>, to: LexStateId) {
        let transition =
            Transition { lo: u32::from(*range.start()), hi: u32::from(*range.end()), next: to, skip: false };
        self.lex_states[from.index()].transitions.push(transition);
    }

    /// Transitions over raw code point or byte values.
    pub fn lex_units(&mut self, from: LexStateId, lo: u32, hi: u32, to: LexStateId) {
        let transition = Transition { lo, hi, next: to, skip: false };
        self.lex_states[from.index()].transitions.push(transition);
    }

    /// Every character of `chars` is skipped as padding in `state`.
    pub fn lex_skip(&mut self, state: LexStateId, chars: &str) {
        for ch in chars.chars() {
            let unit = u32::from(ch);
            let transition = Transition { lo: unit, hi: unit, next: state, skip: true };
            self.lex_states[state.index()].transitions.push(transition);
        }
    }

    /// Adds the chain of states matching `text` from `start` and returns the
    /// accepting one.
    pub fn lex_literal(&mut self, start: LexStateId, text: &str, symbol: Symbol) -> LexStateId {
        let mut state = start;
        for ch in text.chars() {
            let unit = u32::from(ch);
            let existing = self.lex_states[state.index()]
                .transitions
                .iter()
                .find(|transition| transition.lo == unit && transition.hi == unit && !transition.skip)
                .map(|transition| transition.next);
            state = match existing {
                Some(next) => next,
                None => {
                    let next = self.lex_state();
                    self.lex_range(state, ch..=ch, next);
                    next
                }
            };
        }
        self.lex_accept(state, symbol);
        state
    }

    /// One or more characters of `range`.
    pub fn lex_repeat(&mut self, start: LexStateId, range: RangeInclusive<char>, symbol: Symbol) -> LexStateId {
        let body = self.lex_state();
        self.lex_range(start, range.clone(), body);
        self.lex_range(body, range, body);
        self.lex_accept(body, symbol);
        body
    }

    pub fn error_lex_state(&mut self, state: LexStateId) {
        self.error_lex_state = state;
    }

    pub fn state(&mut self, lex_state: LexStateId) -> StateId {
        self.push_state(LexMode { lex_state, external_set: None })
    }

    pub fn state_with_externals(&mut self, lex_state: LexStateId, external_set: u16) -> StateId {
        self.push_state(LexMode { lex_state, external_set: Some(external_set) })
    }

    fn push_state(&mut self, lex_mode: LexMode) -> StateId {
        self.states.push(StateBuilder { lex_mode, ..StateBuilder::default() });
        StateId::from_index(self.states.len() - 1)
    }

    pub fn start_state(&mut self, state: StateId) {
        self.start_state = state;
    }

    fn action(&mut self, state: StateId, symbol: Symbol, action: Action) {
        let actions = self.states[state.index()].actions.entry(symbol).or_default();
        if !actions.contains(&action) {
            actions.push(action);
        }
    }

    pub fn shift(&mut self, state: StateId, symbol: Symbol, to: StateId) {
        self.action(state, symbol, Action::Shift { state: to, extra: false });
    }

    /// Lets the extra `symbol` appear in `state` without changing it.
    pub fn shift_extra(&mut self, state: StateId, symbol: Symbol) {
        self.action(state, symbol, Action::Shift { state, extra: true });
    }

    pub fn reduce(&mut self, state: StateId, lookaheads: &[Symbol], production: ProductionId) {
        for &symbol in lookaheads {
            self.action(state, symbol, Action::Reduce { production });
        }
    }

    pub fn accept(&mut self, state: StateId) {
        self.action(state, Symbol::END, Action::Accept);
    }

    pub fn goto(&mut self, state: StateId, symbol: Symbol, to: StateId) {
        self.states[state.index()].gotos.insert(symbol, to);
    }

    /// Lays the actions out and runs the same validation as [`GrammarTable::load`].
    pub fn build(self) -> Result<GrammarTable, CorruptTableError> {
        let terminal_count = self.symbols.iter().take_while(|symbol| symbol.terminal).count();

        let mut actions = Vec::new();
        let states = self
            .states
            .into_iter()
            .map(|state| {
                let entries = state
                    .actions
                    .into_iter()
                    .map(|(symbol, list)| {
                        let entry =
                            ActionEntry { symbol, start: actions.len() as u32, len: list.len() as u16 };
                        actions.extend(list);
                        entry
                    })
                    .collect();
                ParseState { lex_mode: state.lex_mode, entries, gotos: state.gotos.into_iter().collect() }
            })
            .collect();

        let lex_states = self
            .lex_states
            .into_iter()
            .map(|mut state| {
                state.accepts.sort_unstable();
                state.transitions.sort_by_key(|transition| transition.lo);
                LexState { accepts: state.accepts.into(), transitions: state.transitions.into() }
            })
            .collect();

        let table = GrammarTable {
            name: self.name,
            symbols: self.symbols.into(),
            terminal_count: terminal_count as u16,
            fields: self.fields.into(),
            productions: self.productions.into(),
            states,
            actions: actions.into(),
            lex_states,
            external_tokens: self.external_tokens.into(),
            external_sets: self.external_sets.into(),
            start_state: self.start_state,
            error_lex_state: self.error_lex_state,
        };
        validate(&table)?;
        Ok(table)
    }
}
