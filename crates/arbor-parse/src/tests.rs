use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arbor_inputs::ChunkedText;
use arbor_lexer::{ExternalScanner, ScanCursor, ScannerState, ValidSymbols};
use arbor_tables::{GrammarTable, Language, fixtures};
use arbor_tree::{EditedTree, GreenNode, InputEdit, Tree};
use expect_test::expect;
use text_size::{TextRange, TextSize};

use crate::{Cancelled, ParseStats, Parser, ParserConfig};

fn parser(table: GrammarTable) -> Parser {
    Parser::new(Language::new(table))
}

fn parse(table: GrammarTable, text: &str) -> (Tree, ParseStats) {
    let mut parser = parser(table);
    let tree = parser.parse(text).unwrap();
    (tree, parser.stats())
}

fn range(start: u32, end: u32) -> TextRange {
    TextRange::new(start.into(), end.into())
}

/// `<<TAG` opens a heredoc; the body runs up to a line holding only `TAG`.
struct HeredocScanner;

impl ExternalScanner for HeredocScanner {
    fn scan(&self, state: &mut ScannerState, cursor: &mut ScanCursor<'_>, valid: ValidSymbols<'_>) -> bool {
        if valid.contains(1) && !state.is_empty() {
            let tag = String::from_utf8_lossy(state.as_bytes()).into_owned();
            let mut line = String::new();
            loop {
                let ch = cursor.lookahead();
                if matches!(ch, None | Some('\n')) && line == tag {
                    break;
                }
                match ch {
                    None => return false,
                    Some('\n') => line.clear(),
                    Some(ch) => line.push(ch),
                }
                cursor.advance(false);
            }
            cursor.mark_end();
            state.clear();
            cursor.set_result_symbol(1);
            return true;
        }
        if !valid.contains(0) {
            return false;
        }
        while cursor.lookahead().is_some_and(char::is_whitespace) {
            cursor.advance(true);
        }
        for _ in 0..2 {
            if cursor.lookahead() != Some('<') {
                return false;
            }
            cursor.advance(false);
        }
        let mut tag = String::new();
        while let Some(ch) = cursor.lookahead().filter(char::is_ascii_uppercase) {
            tag.push(ch);
            cursor.advance(false);
        }
        if tag.is_empty() {
            return false;
        }
        cursor.mark_end();
        state.set(tag.as_bytes());
        cursor.set_result_symbol(0);
        true
    }
}

#[test]
fn parses_left_associative_sums() {
    let (tree, stats) = parse(fixtures::arithmetic(), "1 + 2 + 3");
    expect![[r#"
        expr@0..9
          left: expr@0..5
            left: expr@0..1
              number@0..1
            "+"@2..3
            right: number@4..5
          "+"@6..7
          right: number@8..9
    "#]]
    .assert_eq(&tree.debug_tree());
    assert!(!tree.has_error());
    assert_eq!(stats, ParseStats { nodes_created: 8, nodes_reused: 0, tokens_lexed: 6, max_versions: 1 });
}

#[test]
fn reparse_reuses_untouched_subtrees() {
    let mut parser = parser(fixtures::arithmetic());
    let old = parser.parse("1+2+3").unwrap();

    let edit = InputEdit::insert(5.into(), 1.into());
    let mut text = String::from("1+2+3");
    edit.apply_to(&mut text, "0");
    assert_eq!(text, "1+2+30");

    let edited = old.edit(&edit).unwrap();
    let (tree, changed) = parser.reparse(&edited, &text).unwrap();
    expect![[r#"(expr left: (expr left: (expr (number)) right: (number)) right: (number))"#]]
        .assert_eq(&tree.to_sexp());
    assert_eq!(changed, [range(4, 6)]);

    // `1+2` and the second `+` come from the old tree.
    let stats = parser.stats();
    assert_eq!(stats.nodes_reused, 6);
    assert_eq!(stats.nodes_created, 2);
    assert_eq!(stats.tokens_lexed, 2);

    let left = tree.root_node().child_by_field_name("left").unwrap();
    let old_left = old.root_node().child_by_field_name("left").unwrap();
    assert!(GreenNode::ptr_eq(left.green(), old_left.green()));

    let (fresh, _) = parse(fixtures::arithmetic(), &text);
    assert_eq!(tree.debug_tree(), fresh.debug_tree());
}

/// A document of `count` statements `12+3;`, one per line.
fn long_document(count: usize) -> String {
    "12+3;\n".repeat(count)
}

#[test]
fn reparse_in_a_long_document_only_rebuilds_the_edited_statement() {
    let text = long_document(2000);
    let mut parser = parser(fixtures::statements());
    let old = parser.parse(text.as_str()).unwrap();
    let full = parser.stats();
    assert_eq!(full.nodes_created, 16_000);

    // `12+3;` becomes `12+34;` in statement 1000.
    let at = 6 * 1000 + 4;
    let edit = InputEdit::insert(TextSize::new(at), 1.into());
    let mut new_text = text.clone();
    edit.apply_to(&mut new_text, "4");
    let edited = old.edit(&edit).unwrap();
    let (tree, changed) = parser.reparse(&edited, new_text.as_str()).unwrap();
    assert_eq!(changed, [range(at - 1, at + 1)]);

    // Statements 0..1000 arrive as one subtree and every later statement is
    // reused whole. Only the `program` nodes enclosing the edit are new.
    let stats = parser.stats();
    assert!(stats.nodes_created <= 1010, "{stats:?}");
    assert!(stats.nodes_created * 10 < full.nodes_created, "{stats:?}");
    assert!(stats.tokens_lexed <= 1010, "{stats:?}");
    assert!(stats.nodes_reused > 14_000, "{stats:?}");

    let fresh = parser.parse(new_text.as_str()).unwrap();
    assert_eq!(tree.debug_tree(), fresh.debug_tree());
}

#[test]
fn edit_at_the_start_of_a_long_document() {
    let text = long_document(2000);
    let mut parser = parser(fixtures::statements());
    let old = parser.parse(text.as_str()).unwrap();

    let edit = InputEdit::insert(0.into(), 1.into());
    let new_text = format!("9{text}");
    let edited = old.edit(&edit).unwrap();
    let (tree, changed) = parser.reparse(&edited, new_text.as_str()).unwrap();
    // Every `program` on the spine moved, but only the first number changed.
    assert_eq!(changed, [range(0, 3)]);

    let stats = parser.stats();
    assert!(stats.nodes_created <= 2010, "{stats:?}");
    assert!(stats.nodes_reused > 13_000, "{stats:?}");

    let fresh = parser.parse(new_text.as_str()).unwrap();
    assert_eq!(tree.debug_tree(), fresh.debug_tree());
}

#[test]
fn reuse_replaces_a_pending_lookahead() {
    let mut parser = parser(fixtures::statements());
    let old = parser.parse("1;\n2;\n3;").unwrap();
    assert_eq!(parser.stats().nodes_created, 15);

    // `1;` becomes `10;`. The next two statements are pushed whole after the
    // reductions their first number triggered.
    let edited = old.edit(&InputEdit::insert(1.into(), 1.into())).unwrap();
    let (tree, changed) = parser.reparse(&edited, "10;\n2;\n3;").unwrap();
    assert_eq!(changed, [range(0, 2)]);
    let stats = parser.stats();
    assert_eq!(stats.nodes_created, 6);
    assert_eq!(stats.nodes_reused, 9);

    let third = tree.root_node().child(1).unwrap();
    let old_third = old.root_node().child(1).unwrap();
    assert!(GreenNode::ptr_eq(third.green(), old_third.green()));
}

#[test]
fn trees_and_languages_are_shared_across_threads() {
    fn shared<T: Send + Sync>() {}
    fn sent<T: Send>() {}
    shared::<Language>();
    shared::<Tree>();
    shared::<EditedTree>();
    sent::<Parser>();

    let language = Language::new(fixtures::statements());
    let text = "1+2; 3;\n".repeat(50);
    let old = Parser::new(language.clone()).parse(text.as_str()).unwrap();
    let expected = old.debug_tree();
    let edited = old.edit(&InputEdit::insert(0.into(), 1.into())).unwrap();
    let new_text = format!("9{text}");

    let (language, text, new_text, edited) = (&language, text.as_str(), new_text.as_str(), &edited);
    std::thread::scope(|scope| {
        let parses: Vec<_> = (0..4)
            .map(|_| scope.spawn(move || Parser::new(language.clone()).parse(text).unwrap()))
            .collect();
        let reparse = scope.spawn(move || {
            let mut parser = Parser::new(language.clone());
            parser.reparse(edited, new_text).unwrap().0
        });

        // The old tree stays readable while it is reparsed.
        assert_eq!(old.debug_tree(), expected);
        for parse in parses {
            assert_eq!(parse.join().unwrap().debug_tree(), expected);
        }
        let reparsed = reparse.join().unwrap();
        let first = reparsed.root_node().descendant_for_byte_range(0.into(), 2.into());
        assert_eq!(first.kind(), "number");
        assert!(!reparsed.has_error());
    });
    assert_eq!(old.debug_tree(), expected);
}

#[test]
fn reparse_without_edits_reports_nothing() {
    let mut parser = parser(fixtures::statements());
    let old = parser.parse("1; 2+3;").unwrap();
    let edited = old.apply_edits(&[]).unwrap();
    let (tree, changed) = parser.reparse(&edited, "1; 2+3;").unwrap();
    assert_eq!(changed, []);
    // The whole program is pushed in one step.
    assert!(GreenNode::ptr_eq(tree.green(), old.green()));
    assert_eq!(parser.stats().nodes_reused, old.green().descendant_count() as usize);
    assert_eq!(parser.stats().nodes_created, 0);
}

#[test]
fn missing_operand_becomes_an_error_node() {
    let (tree, _) = parse(fixtures::arithmetic(), "1+");
    expect![[r#"(expr (number) (ERROR))"#]].assert_eq(&tree.to_sexp());
    expect![[r#"
        expr@0..2
          number@0..1
          ERROR@1..2
            "+"@1..2
    "#]]
    .assert_eq(&tree.debug_tree());
    assert!(tree.has_error());
    assert_eq!(tree.root_node().byte_range(), range(0, 2));
}

#[test]
fn recovery_resumes_at_a_statement_boundary() {
    let (tree, _) = parse(fixtures::statements(), "1 ? 2;");
    expect![[r#"(program (ERROR (number) (ERROR)) (statement (expr (number))))"#]]
        .assert_eq(&tree.to_sexp());
    expect![[r#"
        program@0..6
          ERROR@0..3
            number@0..1
            ERROR@2..3
          statement@4..6
            expr@4..5
              number@4..5
            ";"@5..6
    "#]]
    .assert_eq(&tree.debug_tree());
}

#[test]
fn comments_stay_between_statements() {
    let (tree, _) = parse(fixtures::statements(), "1; # c\n2;");
    expect![[r#"(program (program (statement (expr (number)))) (comment) (statement (expr (number))))"#]]
        .assert_eq(&tree.to_sexp());
    let comment = tree.root_node().child(1).unwrap();
    assert!(comment.is_extra());
    assert_eq!(comment.byte_range(), range(3, 6));
}

#[test]
fn garbage_input_is_skipped_in_linear_time() {
    let text = "+".repeat(1000);
    let (tree, stats) = parse(fixtures::arithmetic(), &text);
    let root = tree.root_node();
    assert_eq!(root.kind(), "ERROR");
    assert_eq!(root.byte_range(), range(0, 1000));
    assert_eq!(root.child_count(), 1000);
    assert!(stats.tokens_lexed <= text.len() + 1);
}

#[test]
fn empty_input_yields_an_empty_error_root() {
    let (tree, _) = parse(fixtures::arithmetic(), "");
    expect![[r#"(ERROR)"#]].assert_eq(&tree.to_sexp());
    assert!(tree.has_error());
    assert_eq!(tree.root_node().byte_range(), range(0, 0));

    let (tree, _) = parse(fixtures::arithmetic(), "   ");
    assert_eq!(tree.root_node().byte_range(), range(0, 3));
}

#[test]
fn ambiguity_prefers_the_left_deep_tree() {
    let (tree, stats) = parse(fixtures::ambiguous_sum(), "1+2+3");
    expect![[r#"(sum left: (sum left: (sum (number)) right: (sum (number))) right: (sum (number)))"#]]
        .assert_eq(&tree.to_sexp());
    assert_eq!(stats.max_versions, 2);
}

#[test]
fn a_single_version_keeps_the_shift() {
    let config = ParserConfig { max_versions: 1, ..ParserConfig::default() };
    let mut parser = parser(fixtures::ambiguous_sum()).with_config(config);
    let tree = parser.parse("1+2+3").unwrap();
    expect![[r#"(sum left: (sum (number)) right: (sum left: (sum (number)) right: (sum (number))))"#]]
        .assert_eq(&tree.to_sexp());
    assert_eq!(parser.stats().max_versions, 1);
}

#[test]
fn external_scanner_drives_heredocs() {
    let text = "1 <<EOF\nhello\nEOF\n2";
    let mut parser = parser(fixtures::heredoc()).with_scanner(HeredocScanner);
    let tree = parser.parse(text).unwrap();
    expect![[r#"(program (program (program (number)) (heredoc start: (heredoc_start) body: (heredoc_body))) (number))"#]]
        .assert_eq(&tree.to_sexp());
    let heredoc = tree.root_node().child(0).unwrap().child(1).unwrap();
    assert_eq!(heredoc.child_by_field_name("start").unwrap().byte_range(), range(2, 7));
    assert_eq!(heredoc.child_by_field_name("body").unwrap().byte_range(), range(7, 17));

    let edit = InputEdit::insert(TextSize::of(text), 1.into());
    let edited = tree.edit(&edit).unwrap();
    let new_text = format!("{text}5");
    let (reparsed, changed) = parser.reparse(&edited, &new_text).unwrap();
    assert_eq!(changed, [range(18, 20)]);
    assert!(parser.stats().nodes_reused > 0);

    let fresh = parser.parse(&new_text).unwrap();
    assert_eq!(reparsed.debug_tree(), fresh.debug_tree());
}

#[test]
fn chunked_input_parses_like_contiguous_text() {
    let chunks = ChunkedText::new(["1 +", " 2", "+3"]);
    let (expected, _) = parse(fixtures::arithmetic(), "1 + 2+3");
    let tree = parser(fixtures::arithmetic()).parse(&chunks).unwrap();
    assert_eq!(tree.debug_tree(), expected.debug_tree());
}

#[test]
fn cancellation_stops_the_parse() {
    let flag = Arc::new(AtomicBool::new(true));
    let mut parser = parser(fixtures::arithmetic());
    parser.set_cancellation_flag(Some(flag.clone()));
    assert_eq!(parser.parse("1+2").unwrap_err(), Cancelled);

    flag.store(false, Ordering::Relaxed);
    assert!(parser.parse("1+2").is_ok());
}

#[test]
fn trees_from_other_languages_are_not_reused() {
    let mut parser = parser(fixtures::arithmetic());
    let old = parser.parse("1+2").unwrap();
    parser.set_language(Language::new(fixtures::ambiguous_sum()));
    let edited = old.edit(&InputEdit::insert(3.into(), 2.into())).unwrap();
    let (tree, changed) = parser.reparse(&edited, "1+2+3").unwrap();
    assert_eq!(parser.stats().nodes_reused, 0);
    assert_eq!(tree.root_node().kind(), "sum");
    assert_eq!(changed, [range(0, 5)]);
}
