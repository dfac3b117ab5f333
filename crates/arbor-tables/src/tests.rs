use expect_test::expect;

use crate::{
    Action, CorruptTableError, FORMAT_VERSION, GrammarTable, LexStateId, StateId, Symbol,
    TableBuilder, fixtures,
};

#[test]
fn arithmetic_lookups() {
    let table = fixtures::arithmetic();
    let number = table.symbol_for_name("number").unwrap();
    let plus = table.symbol_for_name("+").unwrap();
    let expr = table.symbol_for_name("expr").unwrap();

    assert_eq!(table.actions(StateId(0), number), &[Action::Shift { state: StateId(1), extra: false }]);
    assert!(table.actions(StateId(0), plus).is_empty());
    assert_eq!(table.actions(StateId(2), Symbol::END), &[Action::Accept]);
    assert_eq!(table.goto(StateId(0), expr), Some(StateId(2)));
    assert_eq!(table.goto(StateId(1), expr), None);
    assert!(table.is_terminal(plus));
    assert!(!table.is_terminal(expr));
    assert!(!table.is_named(plus));
    assert_eq!(table.symbol_name(Symbol::ERROR), "ERROR");
    assert_eq!(table.field_name(table.field_id_for_name("right").unwrap()), Some("right"));
}

#[test]
fn conflicting_entry_keeps_every_action() {
    let table = fixtures::ambiguous_sum();
    let plus = table.symbol_for_name("+").unwrap();
    let actions = table.actions(StateId(4), plus);
    expect![[r#"[Reduce { production: ProductionId(0) }, Shift { state: StateId(3), extra: false }]"#]]
        .assert_eq(&format!("{actions:?}"));
}

#[test]
fn fixtures_survive_serialization() {
    for (name, fixture) in fixtures::all() {
        let table = fixture();
        let loaded = GrammarTable::load(&table.to_bytes());
        assert_eq!(loaded.as_ref(), Ok(&table), "{name}");
    }
}

#[test]
fn rejects_bad_magic() {
    assert_eq!(GrammarTable::load(b"NOPE\x01\x00"), Err(CorruptTableError::BadMagic));
    assert_eq!(GrammarTable::load(b""), Err(CorruptTableError::BadMagic));
}

#[test]
fn rejects_unsupported_version() {
    let mut bytes = fixtures::arithmetic().to_bytes();
    bytes[4..6].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
    assert_eq!(
        GrammarTable::load(&bytes),
        Err(CorruptTableError::UnsupportedVersion {
            found: FORMAT_VERSION + 1,
            min: 1,
            max: FORMAT_VERSION
        })
    );
}

#[test]
fn rejects_truncated_header() {
    let bytes = fixtures::arithmetic().to_bytes();
    assert_eq!(
        GrammarTable::load(&bytes[..6]),
        Err(CorruptTableError::Truncated { section: "header", offset: 6 })
    );
}

#[test]
fn rejects_section_past_end() {
    let bytes = fixtures::arithmetic().to_bytes();
    let err = GrammarTable::load(&bytes[..bytes.len() - 1]).unwrap_err();
    assert!(matches!(err, CorruptTableError::SectionOutOfBounds { ref section, .. } if section == "EXTN"));
}

#[test]
fn rejects_dangling_goto() {
    let mut b = TableBuilder::new("broken");
    let number = b.terminal("number", true);
    let expr = b.nonterminal("expr");
    let lex = b.lex_state();
    b.lex_repeat(lex, '0'..='9', number);
    let s0 = b.state(lex);
    b.goto(s0, expr, StateId(42));
    assert_eq!(
        b.build().unwrap_err(),
        CorruptTableError::IndexOutOfBounds { what: "state", index: 42, len: 1 }
    );
}

#[test]
fn rejects_terminal_after_nonterminal() {
    let mut b = TableBuilder::new("broken");
    b.nonterminal("expr");
    b.terminal("number", true);
    let lex = b.lex_state();
    b.state(lex);
    let err = b.build().unwrap_err();
    expect![[r#"invalid table: symbol `number` is out of order: terminals must precede non-terminals"#]]
        .assert_eq(&err.to_string());
}

#[test]
fn rejects_overlapping_transitions() {
    let mut b = TableBuilder::new("broken");
    let number = b.terminal("number", true);
    let one = b.terminal("one", false);
    let lex = b.lex_state();
    b.lex_repeat(lex, '0'..='9', number);
    b.lex_literal(lex, "1", one);
    b.state(lex);
    assert_eq!(b.build().unwrap_err(), CorruptTableError::invalid("lexer transitions overlap"));
}

#[test]
fn lexer_accepts_follow_declaration_order() {
    let mut b = TableBuilder::new("keywords");
    let keyword = b.terminal("if", false);
    let identifier = b.terminal("identifier", true);
    let lex = b.lex_state();
    let end = b.lex_literal(lex, "if", identifier);
    b.lex_accept(end, keyword);
    b.state(lex);
    let table = b.build().unwrap();

    let mut state = LexStateId(0);
    for ch in "if".chars() {
        state = table.lex_state(state).unwrap().transition_for(ch.into()).unwrap().next;
    }
    assert_eq!(table.lex_state(state).unwrap().accepts(), &[keyword, identifier]);
    assert!(table.lex_state(LexStateId(0)).unwrap().transition_for('x'.into()).is_none());
}

#[test]
fn registry_is_append_only() {
    let first = crate::register("registry-test", fixtures::arithmetic());
    let second = crate::register("registry-test", fixtures::statements());
    assert!(crate::Language::ptr_eq(&first, &second));
    assert_eq!(second.name(), "arithmetic");
    assert!(crate::get("registry-test").is_some());
    assert!(crate::names().iter().any(|name| &**name == "registry-test"));
    assert!(crate::get("missing").is_none());
}
