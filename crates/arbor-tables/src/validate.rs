use crate::error::CorruptTableError;
use crate::table::{Action, GrammarTable};
use crate::Symbol;

fn check_index(what: &'static str, index: usize, len: usize) -> Result<(), CorruptTableError> {
    if index < len {
        Ok(())
    } else {
        Err(CorruptTableError::IndexOutOfBounds { what, index, len })
    }
}

/// Checks every cross reference so lookups on a loaded table never go out of bounds.
pub(crate) fn validate(table: &GrammarTable) -> Result<(), CorruptTableError> {
    let symbol_count = table.symbols.len();
    let terminal_count = table.terminal_count();

    if symbol_count == 0 || !table.symbols[0].terminal {
        return Err(CorruptTableError::invalid("the end symbol must be a terminal"));
    }
    if symbol_count >= Symbol::ERROR.index() {
        return Err(CorruptTableError::invalid("too many symbols"));
    }
    if terminal_count > symbol_count {
        return Err(CorruptTableError::IndexOutOfBounds {
            what: "terminal count",
            index: terminal_count,
            len: symbol_count,
        });
    }
    for (index, metadata) in table.symbols.iter().enumerate() {
        if metadata.terminal != (index < terminal_count) {
            return Err(CorruptTableError::invalid(format!(
                "symbol `{}` is out of order: terminals must precede non-terminals",
                metadata.name
            )));
        }
    }

    for production in &table.productions {
        check_index("symbol", production.lhs.index(), symbol_count)?;
        if table.is_terminal(production.lhs) {
            return Err(CorruptTableError::invalid(format!(
                "production reduces to terminal `{}`",
                table.symbol_name(production.lhs)
            )));
        }
        for entry in &production.fields {
            check_index("field", entry.field.index(), table.fields.len())?;
            check_index("field child", entry.child_index.into(), production.child_count.into())?;
        }
    }

    for action in &table.actions {
        match *action {
            Action::Shift { state, .. } => check_index("state", state.index(), table.states.len())?,
            Action::Reduce { production } => {
                check_index("production", production.index(), table.productions.len())?
            }
            Action::Accept => {}
        }
    }

    for state in &table.states {
        check_index("lex state", state.lex_mode.lex_state.index(), table.lex_states.len())?;
        if let Some(set) = state.lex_mode.external_set {
            check_index("external set", set.into(), table.external_sets.len())?;
        }
        for pair in state.entries.windows(2) {
            if pair[0].symbol >= pair[1].symbol {
                return Err(CorruptTableError::invalid("action entries are not sorted by symbol"));
            }
        }
        for entry in &state.entries {
            check_index("symbol", entry.symbol.index(), symbol_count)?;
            if !table.is_terminal(entry.symbol) {
                return Err(CorruptTableError::invalid(format!(
                    "action on non-terminal `{}`",
                    table.symbol_name(entry.symbol)
                )));
            }
            let end = entry.start as usize + usize::from(entry.len);
            if entry.len == 0 || end > table.actions.len() {
                return Err(CorruptTableError::IndexOutOfBounds {
                    what: "action",
                    index: end,
                    len: table.actions.len(),
                });
            }
        }
        for pair in state.gotos.windows(2) {
            if pair[0].0 >= pair[1].0 {
                return Err(CorruptTableError::invalid("gotos are not sorted by symbol"));
            }
        }
        for &(symbol, target) in &state.gotos {
            check_index("symbol", symbol.index(), symbol_count)?;
            if table.is_terminal(symbol) {
                return Err(CorruptTableError::invalid(format!(
                    "goto on terminal `{}`",
                    table.symbol_name(symbol)
                )));
            }
            check_index("state", target.index(), table.states.len())?;
        }
    }

    for lex_state in &table.lex_states {
        for pair in lex_state.accepts.windows(2) {
            if pair[0] >= pair[1] {
                return Err(CorruptTableError::invalid("lexer accepts are not in declaration order"));
            }
        }
        for &symbol in &lex_state.accepts {
            check_index("terminal", symbol.index(), terminal_count)?;
        }
        for transition in &lex_state.transitions {
            if transition.lo > transition.hi {
                return Err(CorruptTableError::invalid("lexer transition range is inverted"));
            }
            check_index("lex state", transition.next.index(), table.lex_states.len())?;
        }
        for pair in lex_state.transitions.windows(2) {
            if pair[0].hi >= pair[1].lo {
                return Err(CorruptTableError::invalid("lexer transitions overlap"));
            }
        }
    }

    for &symbol in &table.external_tokens {
        check_index("terminal", symbol.index(), terminal_count)?;
    }
    for set in &table.external_sets {
        if set.len() != table.external_tokens.len() {
            return Err(CorruptTableError::invalid("external valid set has the wrong length"));
        }
    }

    check_index("state", table.start_state.index(), table.states.len())?;
    check_index("lex state", table.error_lex_state.index(), table.lex_states.len())?;
    Ok(())
}
