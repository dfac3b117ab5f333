use std::fmt;
use std::ops::Deref;
use std::sync::OnceLock;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use triomphe::Arc;

use crate::GrammarTable;

/// Shared handle to a loaded grammar table.
#[derive(Clone)]
pub struct Language(Arc<GrammarTable>);

impl Language {
    pub fn new(table: GrammarTable) -> Self {
        Self(Arc::new(table))
    }

    pub fn table(&self) -> &GrammarTable {
        &self.0
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }
}

impl Deref for Language {
    type Target = GrammarTable;

    fn deref(&self) -> &GrammarTable {
        &self.0
    }
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other) || self.0 == other.0
    }
}

impl Eq for Language {}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Language").field(&self.0.name()).finish()
    }
}

static REGISTRY: OnceLock<RwLock<FxHashMap<Box<str>, Language>>> = OnceLock::new();

fn registry() -> &'static RwLock<FxHashMap<Box<str>, Language>> {
    REGISTRY.get_or_init(Default::default)
}

/// Registers `table` under `name`. Entries are never replaced or removed:
/// registering a taken name returns the language registered first.
pub fn register(name: &str, table: GrammarTable) -> Language {
    if let Some(language) = get(name) {
        return language;
    }
    registry().write().entry(name.into()).or_insert_with(|| Language::new(table)).clone()
}

pub fn get(name: &str) -> Option<Language> {
    registry().read().get(name).cloned()
}

/// Registered names, sorted.
pub fn names() -> Vec<Box<str>> {
    let mut names: Vec<_> = registry().read().keys().cloned().collect();
    names.sort_unstable();
    names
}
