use arbor_inputs::Encoding;
use arbor_lexer::{LexContext, Lexer, ScannerState};
use arbor_tables::{Language, ProductionId, StateId, Symbol, fixtures};
use expect_test::expect;
use text_size::{TextRange, TextSize};

use crate::{
    EditRejection, GreenNode, InputEdit, InvalidEditSequence, SyntaxNode, TokenAtOffset, Tree,
    TreeBuilder, WalkEvent, changed_ranges,
};

const BINARY: ProductionId = ProductionId(0);
const SINGLE: ProductionId = ProductionId(1);

/// Builds the left-associative tree for `number ('+' number)*` the way the
/// arithmetic table would reduce it.
fn sum_tree(text: &str) -> Tree {
    let language = Language::new(fixtures::arithmetic());
    let table = language.table();
    let scanner_state = ScannerState::new();
    let mut lexer = Lexer::new(table, &text, Encoding::Utf8);
    let mut lex = |position: TextSize, state: u16| {
        let context =
            LexContext { state: StateId(state), scanner_state: &scanner_state, allow_zero_width: false };
        lexer.next_token(position, context)
    };

    let mut builder = TreeBuilder::new(table);
    let first = lex(TextSize::new(0), 0);
    let mut position = first.end();
    let leaf = builder.leaf(&first, StateId(0), false);
    let mut expr = builder.reduce(SINGLE, vec![leaf], StateId(0), 0, false);
    loop {
        let plus = lex(position, 2);
        if plus.symbol == Symbol::END {
            break;
        }
        let number = lex(plus.end(), 3);
        position = number.end();
        let children =
            vec![expr, builder.leaf(&plus, StateId(2), false), builder.leaf(&number, StateId(3), false)];
        expr = builder.reduce(BINARY, children, StateId(0), 0, false);
    }
    Tree::new(expr, language.clone(), TextSize::of(text))
}

fn range(start: u32, end: u32) -> TextRange {
    TextRange::new(start.into(), end.into())
}

#[test]
fn sexp_shows_named_nodes_and_fields() {
    let tree = sum_tree("1+2+3");
    expect![[r#"(expr left: (expr left: (expr (number)) right: (number)) right: (number))"#]]
        .assert_eq(&tree.to_sexp());
}

#[test]
fn debug_tree_lists_every_node() {
    let tree = sum_tree(" 1 + 2 ");
    expect![[r#"
        expr@0..7
          left: expr@1..2
            number@1..2
          "+"@3..4
          right: number@5..6
    "#]]
    .assert_eq(&tree.debug_tree());
}

#[test]
fn navigation() {
    let text = "1 + 2 + 3";
    let tree = sum_tree(text);
    let root = tree.root_node();
    assert!(root.is_root());
    assert_eq!(root.kind(), "expr");
    assert_eq!(root.child_count(), 3);
    assert_eq!(root.named_child_count(), 2);

    let right = root.child_by_field_name("right").unwrap();
    assert_eq!(right.text(text), Some("3"));
    assert_eq!(right.parent(), Some(root));
    assert_eq!(root.field_name_for_child(0), Some("left"));
    assert_eq!(root.field_name_for_child(1), None);
    assert_eq!(root.child_by_field_name("middle"), None);

    let plus = right.prev_sibling().unwrap();
    assert_eq!(plus.kind(), "+");
    assert!(!plus.is_named());
    assert_eq!(plus.next_sibling(), Some(right));
    assert_eq!(right.next_sibling(), None);

    let inner = root.named_child(0).unwrap();
    assert_eq!(inner.byte_range(), range(0, 5));
    assert_eq!(inner.child_by_field_name("left").unwrap().text(text), Some("1"));

    let deepest = tree.node_at(TextSize::new(4));
    assert_eq!(deepest.text(text), Some("2"));
    assert_eq!(deepest.ancestors().count(), 3);
    assert_eq!(root.descendant_for_byte_range(4.into(), 9.into()), root);
    assert_eq!(root.descendant_for_byte_range(0.into(), 5.into()), inner);
}

fn kinds<'t>(found: TokenAtOffset<SyntaxNode<'t>>) -> TokenAtOffset<&'t str> {
    found.map(SyntaxNode::kind)
}

#[test]
fn leaves_at_offset() {
    let tree = sum_tree("1+2");
    let root = tree.root_node();
    assert_eq!(kinds(root.leaf_at_offset(0.into())), TokenAtOffset::Single("number"));
    assert_eq!(kinds(root.leaf_at_offset(1.into())), TokenAtOffset::Between("number", "+"));
    assert_eq!(root.leaf_at_offset(1.into()).right_biased().map(|node| node.kind()), Some("+"));
    assert_eq!(root.leaf_at_offset(2.into()).count(), 2);
}

#[test]
fn preorder_can_skip_subtrees() {
    let tree = sum_tree("1+2+3");
    let root = tree.root_node();
    assert_eq!(root.descendants().count(), 8);

    let mut preorder = root.preorder();
    let mut entered = Vec::new();
    while let Some(event) = preorder.next() {
        if let WalkEvent::Enter(node) = event {
            entered.push(node.kind());
            if node != root && node.kind() == "expr" {
                preorder.skip_subtree();
            }
        }
    }
    assert_eq!(entered, ["expr", "expr", "+", "number"]);
}

#[test]
fn cursor_walks_the_tree() {
    let tree = sum_tree("1+2+3");
    let mut cursor = tree.walk();
    assert!(!cursor.goto_parent());
    assert!(!cursor.goto_next_sibling());
    assert!(cursor.goto_first_child());
    assert_eq!(cursor.field_name(), Some("left"));
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.node().kind(), "+");
    assert_eq!(cursor.field_name(), None);
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.field_name(), Some("right"));
    assert!(!cursor.goto_next_sibling());
    assert_eq!(cursor.depth(), 1);
    assert!(cursor.goto_parent());
    assert_eq!(cursor.node(), tree.root_node());

    assert_eq!(cursor.goto_first_child_for_byte(3.into()), Some(1));
    assert_eq!(cursor.node().byte_range(), range(3, 4));
    cursor.reset(tree.root_node());
    assert_eq!(cursor.goto_first_child_for_byte(2.into()), Some(0));
    assert!(cursor.goto_first_child());
    assert_eq!(cursor.node().kind(), "expr");
    assert_eq!(cursor.depth(), 2);
}

#[test]
fn edits_shift_and_mark_nodes() {
    let tree = sum_tree("1+2+3");
    let edited = tree.edit(&InputEdit::insert(5.into(), 1.into())).unwrap();
    let new = edited.tree();
    assert_eq!(new.text_len(), TextSize::new(6));

    let root = new.root_node();
    assert!(root.has_changes());
    let last = root.child_by_field_name("right").unwrap();
    assert_eq!(last.byte_range(), range(4, 6));
    assert!(last.has_changes());
    // `+` looked ahead up to the insertion point but not into it.
    let plus = root.child(1).unwrap();
    assert!(!plus.has_changes());
    assert!(GreenNode::ptr_eq(plus.green(), tree.root_node().child(1).unwrap().green()));

    let left = root.child_by_field_name("left").unwrap();
    assert!(!left.has_changes());
    let old_left = tree.root_node().child(0).unwrap();
    assert!(GreenNode::ptr_eq(left.green(), old_left.green()));

    // The unedited tree is untouched.
    assert!(!tree.root_node().has_changes());
    assert_eq!(tree.root_node().child(2).unwrap().byte_range(), range(4, 5));
}

#[test]
fn insertion_before_a_token_grows_its_padding() {
    let tree = sum_tree("1+2+3");
    let edited = tree.edit(&InputEdit::insert(0.into(), 2.into())).unwrap();
    expect![[r#"
        expr@0..7
          left: expr@2..5
            left: expr@2..3
              number@2..3
            "+"@3..4
            right: number@4..5
          "+"@5..6
          right: number@6..7
    "#]]
    .assert_eq(&edited.tree().debug_tree());
}

#[test]
fn deletion_across_tokens() {
    let tree = sum_tree("1+2+3");
    let edited = tree.edit(&InputEdit::delete(range(1, 3))).unwrap();
    let root = edited.tree().root_node();
    assert_eq!(edited.tree().text_len(), TextSize::new(3));
    assert_eq!(root.child(1).unwrap().byte_range(), range(1, 2));
    assert_eq!(root.child(2).unwrap().byte_range(), range(2, 3));
    let inner = root.child(0).unwrap();
    assert_eq!(inner.byte_range(), range(0, 1));
    assert!(inner.child(1).unwrap().byte_range().is_empty());
}

#[test]
fn invalid_edits_are_rejected() {
    let tree = sum_tree("1+2");
    let inverted = InputEdit::new(2.into(), 1.into(), 2.into());
    assert_eq!(
        tree.edit(&inverted).unwrap_err(),
        InvalidEditSequence { index: 0, reason: EditRejection::Inverted }
    );

    let shrinking = InputEdit::new(2.into(), 3.into(), 1.into());
    assert_eq!(tree.edit(&shrinking).unwrap_err().reason, EditRejection::NewEndBeforeStart);

    let past_end = InputEdit::new(2.into(), 4.into(), 2.into());
    assert_eq!(
        tree.edit(&past_end).unwrap_err().reason,
        EditRejection::OutOfBounds { old_end: 4.into(), text_len: 3.into() }
    );

    let batch = [InputEdit::insert(2.into(), 1.into()), InputEdit::insert(1.into(), 1.into())];
    let err = tree.apply_edits(&batch).unwrap_err();
    assert_eq!(err.index, 1);
    assert_eq!(err.to_string(), "invalid edit #1: edit starts before the end of the previous edit at 3");

    let mut edited = tree.edit(&batch[0]).unwrap();
    assert!(edited.edit(&batch[1]).is_err());
    assert_eq!(edited.edits(), &batch[..1]);
    assert_eq!(edited.tree().text_len(), TextSize::new(4));
    edited.edit(&InputEdit::insert(4.into(), 1.into())).unwrap();
    assert_eq!(edited.tree().text_len(), TextSize::new(5));
}

#[test]
fn children_iterate_from_both_ends() {
    let tree = sum_tree("1 + 2 + 3");
    let root = tree.root_node();
    let backwards: Vec<_> = root.children().rev().map(|child| child.byte_range()).collect();
    assert_eq!(backwards, [range(8, 9), range(6, 7), range(0, 5)]);

    let mut children = root.children();
    assert_eq!(children.next_back().map(|child| child.kind()), Some("number"));
    assert_eq!(children.next().map(|child| child.kind()), Some("expr"));
    assert_eq!(children.next_back().map(|child| child.byte_range()), Some(range(6, 7)));
    assert_eq!(children.next().map(|child| child.kind()), None);
}

#[test]
fn changed_ranges_cover_only_the_edited_token() {
    let tree = sum_tree("1+2+3");
    let edited = tree.edit(&InputEdit::insert(5.into(), 1.into())).unwrap();
    let new = sum_tree("1+2+30");
    assert_eq!(changed_ranges(&edited, &new), [range(4, 6)]);
}

#[test]
fn changed_ranges_look_inside_moved_nodes() {
    // The insertion moves the start of every `expr` on the left spine, but
    // only the first number reads differently.
    let tree = sum_tree("1+2+3");
    let edited = tree.edit(&InputEdit::insert(0.into(), 1.into())).unwrap();
    let new = sum_tree("91+2+3");
    assert_eq!(changed_ranges(&edited, &new), [range(0, 2)]);
}

#[test]
fn changed_ranges_follow_each_edit() {
    let tree = sum_tree("1+2+3");
    let edited = tree
        .apply_edits(&[InputEdit::insert(1.into(), 1.into()), InputEdit::insert(4.into(), 1.into())])
        .unwrap();
    let new = sum_tree("1 +2 +3");
    // Both insertions grow the number before them.
    assert_eq!(changed_ranges(&edited, &new), [range(0, 2), range(3, 5)]);

    let edited = tree.edit(&InputEdit::replace(0.into(), 1.into(), 1.into())).unwrap();
    assert_eq!(changed_ranges(&edited, &tree), [range(0, 1)]);

    let unchanged = tree.apply_edits(&[]).unwrap();
    assert_eq!(changed_ranges(&unchanged, &tree), []);
}

#[test]
fn builder_counts_and_root_splicing() {
    let language = Language::new(fixtures::statements());
    let table = language.table();
    let scanner_state = ScannerState::new();
    let text = "# c\n1;";
    let mut lexer = Lexer::new(table, &text, Encoding::Utf8);
    let context = LexContext { state: StateId(0), scanner_state: &scanner_state, allow_zero_width: false };
    let comment = lexer.next_token(0.into(), context);
    let number = lexer.next_token(comment.end(), context);
    let semi = lexer.next_token(number.end(), LexContext { state: StateId(4), ..context });

    let mut builder = TreeBuilder::new(table);
    let comment = builder.leaf(&comment, StateId(0), true);
    let number = builder.leaf(&number, StateId(0), false);
    let expr = builder.reduce(ProductionId(4), vec![number], StateId(0), 0, false);
    let semi = builder.leaf(&semi, StateId(4), false);
    let statement = builder.reduce(ProductionId(2), vec![expr, semi], StateId(0), 0, false);
    let program = builder.reduce(ProductionId(1), vec![statement], StateId(0), 0, false);
    let root = builder.root(vec![comment, program], StateId(0));
    assert_eq!(builder.nodes_created(), 7);

    let tree = Tree::new(root, language.clone(), TextSize::of(text));
    expect![[r#"(program (comment) (statement (expr (number))))"#]].assert_eq(&tree.to_sexp());
    assert!(tree.root_node().child(0).unwrap().is_extra());

    builder.note_reused(tree.green());
    assert_eq!(builder.nodes_reused(), 6);
}

#[test]
fn error_nodes_carry_costs() {
    let language = Language::new(fixtures::arithmetic());
    let table = language.table();
    let scanner_state = ScannerState::new();
    let text = "1?";
    let mut lexer = Lexer::new(table, &text, Encoding::Utf8);
    let context = LexContext { state: StateId(1), scanner_state: &scanner_state, allow_zero_width: false };
    let bad = lexer.next_token(1.into(), context);
    assert!(bad.is_error);

    let mut builder = TreeBuilder::new(table);
    let bad = builder.leaf(&bad, StateId(1), false);
    assert_eq!(bad.error_cost(), crate::ERROR_COST_PER_RECOVERY + crate::ERROR_COST_PER_SKIPPED_CHAR);
    let error = builder.error(vec![bad], StateId(1));
    assert!(error.is_extra());
    assert!(error.has_error());
    assert_eq!(
        error.error_cost(),
        2 * crate::ERROR_COST_PER_RECOVERY
            + crate::ERROR_COST_PER_SKIPPED_TREE
            + 2 * crate::ERROR_COST_PER_SKIPPED_CHAR
    );

    let tree = Tree::new(error, language.clone(), TextSize::of(text));
    assert!(tree.has_error());
    assert_eq!(tree.to_sexp(), "(ERROR (ERROR))");
}
