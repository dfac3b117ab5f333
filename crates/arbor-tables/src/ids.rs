use std::fmt;

macro_rules! index_type {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u16);

        impl $name {
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                Self(u16::try_from(index).unwrap_or(u16::MAX))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

index_type!(
    /// A grammar symbol, terminal or non-terminal.
    Symbol
);
index_type!(
    /// A parse state of the LR automaton.
    StateId
);
index_type!(ProductionId);
index_type!(FieldId);
index_type!(
    /// A state of the lexer DFA.
    LexStateId
);

impl Symbol {
    /// End of input. Always the first terminal.
    pub const END: Self = Self(0);
    /// The builtin error symbol. It never appears in the symbol table.
    pub const ERROR: Self = Self(u16::MAX - 1);
}

impl ProductionId {
    /// Marks nodes that were not built by a reduction (leaves, error nodes).
    pub const NONE: Self = Self(u16::MAX);
}
