//! Parse and lex tables of a generated grammar.
//!
//! A [`GrammarTable`] is immutable once built or loaded and is shared by every
//! parse through a [`Language`] handle.

mod builder;
mod codec;
mod error;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
mod ids;
mod language;
mod table;
mod validate;

#[cfg(test)]
mod tests;

pub use builder::TableBuilder;
pub use codec::{FORMAT_VERSION, MAGIC, MIN_FORMAT_VERSION};
pub use error::CorruptTableError;
pub use ids::{FieldId, LexStateId, ProductionId, StateId, Symbol};
pub use language::{Language, get, names, register};
pub use table::{
    Action, FieldEntry, GrammarTable, LexMode, LexState, ParseState, Production, SymbolMetadata,
    Transition,
};

impl GrammarTable {
    /// Validates serialized tables and exposes them.
    pub fn load(bytes: &[u8]) -> Result<Self, CorruptTableError> {
        codec::decode(bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode(self)
    }
}
