use std::fmt::{self, Display};

pub use annotate_snippets::Renderer;
use annotate_snippets::{Level, Snippet};
use arbor_inputs::{LineCol, LineIndex};
use arbor_tree::{Tree, WalkEvent};
pub use text_size::TextRange;


/// Longest excerpt of source quoted in a message.
const MAX_EXCERPT: usize = 24;

/// Stable number of each kind of diagnostic, shown as `E201` and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Text the grammar could not place.
    UnexpectedInput = 201,
    /// The text ended where the grammar needed more.
    UnexpectedEnd = 202,
}

impl ErrorCode {
    pub fn number(self) -> u16 {
        self as u16
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnexpectedInput => "E201",
            Self::UnexpectedEnd => "E202",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    code: ErrorCode,
    message: String,
    range: TextRange,
}

impl Diagnostic {
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    pub fn error(code: ErrorCode, message: impl Into<String>, range: TextRange) -> Self {
        Self { code, message: message.into(), range }
    }

    /// Zero-based line and column of the start of the range.
    pub fn line_col(&self, index: &LineIndex) -> LineCol {
        index.line_col(self.range.start())
    }

    pub fn render<'a>(
        &'a self,
        renderer: &'a Renderer,
        path: &'a str,
        text: &'a str,
    ) -> impl Display + 'a {
        let message = Level::Error.title(&self.message).id(self.code.as_str()).snippet(
            Snippet::source(text)
                .origin(path)
                .annotation(Level::Error.span(self.range.into()).label("here"))
                .fold(true),
        );
        renderer.render(message)
    }
}

/// One diagnostic per outermost ERROR node of `tree`, in document order.
pub fn syntax_errors(tree: &Tree, text: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut preorder = tree.root_node().preorder();
    while let Some(event) = preorder.next() {
        let WalkEvent::Enter(node) = event else { continue };
        if !node.is_error() {
            continue;
        }
        preorder.skip_subtree();

        let range = node.byte_range();
        let diagnostic = match node.text(text).map(str::trim) {
            Some(excerpt) if !excerpt.is_empty() => Diagnostic::error(
                ErrorCode::UnexpectedInput,
                format!("unexpected `{}`", shorten(excerpt)),
                range,
            ),
            _ => Diagnostic::error(ErrorCode::UnexpectedEnd, "unexpected end of input", range),
        };
        diagnostics.push(diagnostic);
    }
    diagnostics
}

fn shorten(excerpt: &str) -> String {
    let line = excerpt.lines().next().unwrap_or_default();
    match line.char_indices().nth(MAX_EXCERPT) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None if line.len() < excerpt.len() => format!("{line}..."),
        None => line.to_owned(),
    }
}
