use std::fmt::Write as _;

use anyhow::Context;
use arbor_tables::{FieldId, GrammarTable, Language, StateId, Symbol, fixtures};
use camino::Utf8Path;

/// Resolves `name` to a language: a built-in table by name, otherwise a
/// serialized table on disk. Loaded tables are registered under `name`.
pub(crate) fn load(name: &str) -> anyhow::Result<Language> {
    if let Some(language) = arbor_tables::get(name) {
        return Ok(language);
    }
    if let Some((name, build)) = fixtures::all().into_iter().find(|(builtin, _)| *builtin == name) {
        return Ok(arbor_tables::register(name, build()));
    }

    let path = Utf8Path::new(name);
    let bytes = std::fs::read(path).with_context(|| {
        let builtin = fixtures::all().map(|(name, _)| name).join(", ");
        format!("`{path}` is neither a built-in table ({builtin}) nor a readable file")
    })?;
    let table = GrammarTable::load(&bytes).with_context(|| format!("failed to load `{path}`"))?;
    tracing::debug!(name = table.name(), states = table.state_count(), "loaded table");
    Ok(arbor_tables::register(name, table))
}

pub(crate) fn summary(table: &GrammarTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "table `{}`", table.name());
    let _ = writeln!(
        out,
        "{} symbols ({} terminals), {} fields, {} productions, {} parse states, {} lex states",
        table.symbol_count(),
        table.terminal_count(),
        table.field_count(),
        table.production_count(),
        table.state_count(),
        table.lex_state_count(),
    );

    let _ = writeln!(out, "\nsymbols:");
    for index in 0..table.symbol_count() {
        let symbol = Symbol(index as u16);
        let mut traits = Vec::new();
        traits.push(if table.is_terminal(symbol) { "terminal" } else { "nonterminal" });
        if table.is_named(symbol) {
            traits.push("named");
        }
        if table.is_extra(symbol) {
            traits.push("extra");
        }
        if table.external_tokens().contains(&symbol) {
            traits.push("external");
        }
        let _ = writeln!(out, "  {index:>3} {:<16} {}", table.symbol_name(symbol), traits.join(", "));
    }

    if table.field_count() > 0 {
        let _ = writeln!(out, "\nfields:");
        for index in 0..table.field_count() {
            let name = table.field_name(FieldId(index as u16)).unwrap_or("?");
            let _ = writeln!(out, "  {index:>3} {name}");
        }
    }

    let _ = writeln!(out, "\nstates:");
    for index in 0..table.state_count() {
        let state = StateId(index as u16);
        let Some(parse_state) = table.parse_state(state) else { continue };
        let valid: Vec<_> = parse_state.valid_symbols().map(|symbol| table.symbol_name(symbol)).collect();
        let _ = writeln!(out, "  {index:>3} on {}", valid.join(" "));
    }
    out
}

#[cfg(test)]
mod tests {
    use arbor_tables::Language;

    use super::{load, summary};

    #[test]
    fn builtin_tables_load_by_name() {
        let language = load("statements").unwrap();
        assert!(Language::ptr_eq(&language, &load("statements").unwrap()));

        let text = summary(&language);
        assert!(text.starts_with("table `statements`\n"));
        assert!(text.contains("comment          terminal, named, extra"), "{text}");
        assert!(text.contains("fields:\n    0 left\n    1 right\n"), "{text}");
    }

    #[test]
    fn unknown_tables_name_the_builtins() {
        let err = load("no-such-table").unwrap_err();
        assert!(err.to_string().contains("arithmetic, ambiguous_sum, statements, heredoc"), "{err}");
    }
}
