use thiserror::Error;

/// Returned when serialized tables cannot be exposed as a [`GrammarTable`].
///
/// [`GrammarTable`]: crate::GrammarTable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorruptTableError {
    /// The buffer does not start with the `ARBT` magic.
    #[error("not a grammar table (bad magic number)")]
    BadMagic,
    #[error("unsupported table format version {found} (supported {min}..={max})")]
    UnsupportedVersion { found: u16, min: u16, max: u16 },
    /// A read ran past the end of a section or of the header.
    #[error("section `{section}` is truncated at byte {offset}")]
    Truncated { section: &'static str, offset: usize },
    #[error("section `{section}` spans {offset}..{end}, outside a {len}-byte buffer")]
    SectionOutOfBounds { section: String, offset: usize, end: usize, len: usize },
    #[error("missing required section `{0}`")]
    MissingSection(&'static str),
    #[error("duplicate section `{0}`")]
    DuplicateSection(String),
    #[error("{what} index {index} is out of bounds ({len} entries)")]
    IndexOutOfBounds { what: &'static str, index: usize, len: usize },
    #[error("invalid table: {0}")]
    Invalid(String),
}

impl CorruptTableError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
