//! Small hand-built tables for tests, benchmarks and the command line.

use crate::{GrammarTable, Symbol, TableBuilder};

const WHITESPACE: &str = " \t\r\n";

fn finish(builder: TableBuilder) -> GrammarTable {
    builder.build().unwrap_or_else(|err| panic!("fixture table is invalid: {err}"))
}

/// `expr := expr '+' number | number`, left-associative.
pub fn arithmetic() -> GrammarTable {
    let mut b = TableBuilder::new("arithmetic");
    let number = b.terminal("number", true);
    let plus = b.terminal("+", false);
    let expr = b.nonterminal("expr");

    let left = b.field("left");
    let right = b.field("right");
    let binary = b.production_with_fields(expr, 3, &[(left, 0), (right, 2)]);
    let single = b.production(expr, 1);

    let lex = b.lex_state();
    b.lex_skip(lex, WHITESPACE);
    b.lex_literal(lex, "+", plus);
    b.lex_repeat(lex, '0'..='9', number);
    b.error_lex_state(lex);

    let [s0, s1, s2, s3, s4] = [(); 5].map(|()| b.state(lex));
    b.shift(s0, number, s1);
    b.goto(s0, expr, s2);
    b.reduce(s1, &[Symbol::END, plus], single);
    b.accept(s2);
    b.shift(s2, plus, s3);
    b.shift(s3, number, s4);
    b.reduce(s4, &[Symbol::END, plus], binary);
    b.start_state(s0);
    finish(b)
}

/// `sum := sum '+' sum | number`, with the shift/reduce conflict left in the
/// table so both groupings are explored.
pub fn ambiguous_sum() -> GrammarTable {
    let mut b = TableBuilder::new("ambiguous_sum");
    let number = b.terminal("number", true);
    let plus = b.terminal("+", false);
    let sum = b.nonterminal("sum");

    let left = b.field("left");
    let right = b.field("right");
    let binary = b.production_with_fields(sum, 3, &[(left, 0), (right, 2)]);
    let single = b.production(sum, 1);

    let lex = b.lex_state();
    b.lex_skip(lex, WHITESPACE);
    b.lex_literal(lex, "+", plus);
    b.lex_repeat(lex, '0'..='9', number);
    b.error_lex_state(lex);

    let [s0, s1, s2, s3, s4] = [(); 5].map(|()| b.state(lex));
    b.shift(s0, number, s1);
    b.goto(s0, sum, s2);
    b.reduce(s1, &[Symbol::END, plus], single);
    b.accept(s2);
    b.shift(s2, plus, s3);
    b.shift(s3, number, s1);
    b.goto(s3, sum, s4);
    b.reduce(s4, &[Symbol::END, plus], binary);
    b.shift(s4, plus, s3);
    b.start_state(s0);
    finish(b)
}

/// `program := statement+`, `statement := expr ';'`, `expr := expr '+' number | number`,
/// with `#` line comments allowed anywhere.
pub fn statements() -> GrammarTable {
    let mut b = TableBuilder::new("statements");
    let number = b.terminal("number", true);
    let plus = b.terminal("+", false);
    let semi = b.terminal(";", false);
    let comment = b.extra_terminal("comment", true);
    let program = b.nonterminal("program");
    let statement = b.nonterminal("statement");
    let expr = b.nonterminal("expr");

    let left = b.field("left");
    let right = b.field("right");
    let more = b.production(program, 2);
    let first = b.production(program, 1);
    let terminated = b.production(statement, 2);
    let binary = b.production_with_fields(expr, 3, &[(left, 0), (right, 2)]);
    let single = b.production(expr, 1);

    let lex = b.lex_state();
    b.lex_skip(lex, WHITESPACE);
    b.lex_literal(lex, "+", plus);
    b.lex_literal(lex, ";", semi);
    b.lex_repeat(lex, '0'..='9', number);
    let comment_body = b.lex_literal(lex, "#", comment);
    b.lex_units(comment_body, 0, u32::from('\n') - 1, comment_body);
    b.lex_units(comment_body, u32::from('\n') + 1, u32::from(char::MAX), comment_body);
    b.error_lex_state(lex);

    let [s0, s1, s2, s3, s4, s5, s6, s7, s8] = [(); 9].map(|()| b.state(lex));
    b.shift(s0, number, s2);
    b.goto(s0, program, s1);
    b.goto(s0, statement, s8);
    b.goto(s0, expr, s4);
    b.accept(s1);
    b.shift(s1, number, s2);
    b.goto(s1, statement, s3);
    b.goto(s1, expr, s4);
    b.reduce(s2, &[plus, semi], single);
    b.reduce(s3, &[Symbol::END, number], more);
    b.shift(s4, semi, s5);
    b.shift(s4, plus, s6);
    b.reduce(s5, &[Symbol::END, number], terminated);
    b.shift(s6, number, s7);
    b.reduce(s7, &[plus, semi], binary);
    b.reduce(s8, &[Symbol::END, number], first);
    for state in [s0, s1, s2, s3, s4, s5, s6, s7, s8] {
        b.shift_extra(state, comment);
    }
    b.start_state(s0);
    finish(b)
}

/// `program := (number | heredoc)+` where `heredoc := heredoc_start heredoc_body`
/// are produced by an external scanner.
pub fn heredoc() -> GrammarTable {
    let mut b = TableBuilder::new("heredoc");
    let number = b.terminal("number", true);
    let start = b.terminal("heredoc_start", true);
    let body = b.terminal("heredoc_body", true);
    let program = b.nonterminal("program");
    let heredoc = b.nonterminal("heredoc");

    let start_field = b.field("start");
    let body_field = b.field("body");
    let more_numbers = b.production(program, 2);
    let more_heredocs = b.production(program, 2);
    let first_number = b.production(program, 1);
    let first_heredoc = b.production(program, 1);
    let document = b.production_with_fields(heredoc, 2, &[(start_field, 0), (body_field, 1)]);

    b.external_token(start);
    b.external_token(body);
    let at_item = b.external_set(&[start]);
    let at_body = b.external_set(&[body]);

    let lex = b.lex_state();
    b.lex_skip(lex, WHITESPACE);
    b.lex_repeat(lex, '0'..='9', number);
    b.error_lex_state(lex);

    let [s0, s1, s2] = [(); 3].map(|()| b.state_with_externals(lex, at_item));
    let s3 = b.state_with_externals(lex, at_body);
    let [s4, s5, s6, s7] = [(); 4].map(|()| b.state_with_externals(lex, at_item));

    let follow = [Symbol::END, number, start];
    b.shift(s0, number, s1);
    b.shift(s0, start, s3);
    b.goto(s0, program, s2);
    b.goto(s0, heredoc, s5);
    b.reduce(s1, &follow, first_number);
    b.accept(s2);
    b.shift(s2, number, s6);
    b.shift(s2, start, s3);
    b.goto(s2, heredoc, s7);
    b.shift(s3, body, s4);
    b.reduce(s4, &follow, document);
    b.reduce(s5, &follow, first_heredoc);
    b.reduce(s6, &follow, more_numbers);
    b.reduce(s7, &follow, more_heredocs);
    b.start_state(s0);
    finish(b)
}

/// Every fixture, by name.
pub fn all() -> [(&'static str, fn() -> GrammarTable); 4] {
    [
        ("arithmetic", arithmetic),
        ("ambiguous_sum", ambiguous_sum),
        ("statements", statements),
        ("heredoc", heredoc),
    ]
}
