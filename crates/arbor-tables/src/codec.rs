//! Binary table format.
//!
//! ```text
//! header    := "ARBT" version:u16 flags:u16 count:u32 (tag:[u8; 4] offset:u32 len:u32)*
//! META      := start_state:u16 error_lex_state:u16 terminal_count:u16 name:str
//! SYMB      := count:u32 (flags:u8 name:str)*
//! FLDS      := count:u32 name:str*
//! PROD      := count:u32 (lhs:u16 child_count:u16 dynamic_precedence:i16 n:u16 (field:u16 child:u16)*n)*
//! ACTN      := count:u32 (kind:u8 flags:u8 value:u16)*
//! STAT      := count:u32 (lex_state:u16 external_set:u16 entries:u16 gotos:u16
//!                         (symbol:u16 start:u32 len:u16)* (symbol:u16 state:u16)*)*
//! LEXS      := count:u32 (accepts:u16 transitions:u16 symbol:u16* (lo:u32 hi:u32 next:u16 flags:u8)*)*
//! EXTN      := tokens:u16 symbol:u16* sets:u16 (valid:u8 * tokens)*
//! str       := len:u16 utf8-bytes
//! ```
//!
//! All integers are little endian.

use crate::error::CorruptTableError;
use crate::table::{
    Action, ActionEntry, FieldEntry, GrammarTable, LexMode, LexState, ParseState, Production,
    SymbolMetadata, Transition,
};
use crate::validate::validate;
use crate::{FieldId, LexStateId, ProductionId, StateId, Symbol};

pub const MAGIC: [u8; 4] = *b"ARBT";
pub const FORMAT_VERSION: u16 = 1;
pub const MIN_FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = 12;
const DIRECTORY_ENTRY_LEN: usize = 12;
const NO_EXTERNAL_SET: u16 = u16::MAX;

const SECTIONS: [&str; 8] = ["META", "SYMB", "FLDS", "PROD", "ACTN", "STAT", "LEXS", "EXTN"];

const SYMBOL_NAMED: u8 = 1;
const SYMBOL_TERMINAL: u8 = 1 << 1;
const SYMBOL_EXTRA: u8 = 1 << 2;

const ACTION_SHIFT: u8 = 0;
const ACTION_REDUCE: u8 = 1;
const ACTION_ACCEPT: u8 = 2;
const ACTION_EXTRA: u8 = 1;

struct Reader<'a> {
    section: &'static str,
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(section: &'static str, data: &'a [u8]) -> Self {
        Self { section, data, pos: 0 }
    }

    fn truncated(&self) -> CorruptTableError {
        CorruptTableError::Truncated { section: self.section, offset: self.pos }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], CorruptTableError> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        let end = end.ok_or_else(|| self.truncated())?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CorruptTableError> {
        let mut array = [0; N];
        array.copy_from_slice(self.bytes(N)?);
        Ok(array)
    }

    fn u8(&mut self) -> Result<u8, CorruptTableError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, CorruptTableError> {
        self.array().map(u16::from_le_bytes)
    }

    fn i16(&mut self) -> Result<i16, CorruptTableError> {
        self.array().map(i16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, CorruptTableError> {
        self.array().map(u32::from_le_bytes)
    }

    /// An element count; every element takes at least one byte.
    fn count(&mut self) -> Result<usize, CorruptTableError> {
        let count = self.u32()? as usize;
        if count > self.data.len() - self.pos {
            return Err(self.truncated());
        }
        Ok(count)
    }

    fn str(&mut self) -> Result<Box<str>, CorruptTableError> {
        let len = self.u16()?.into();
        let section = self.section;
        let text = std::str::from_utf8(self.bytes(len)?).map_err(|err| {
            CorruptTableError::invalid(format!("section `{section}` holds a non UTF-8 name: {err}"))
        })?;
        Ok(text.into())
    }

    fn finish(self) -> Result<(), CorruptTableError> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(CorruptTableError::invalid(format!(
                "section `{}` has {} trailing bytes",
                self.section,
                self.data.len() - self.pos
            )))
        }
    }
}

#[derive(Default)]
struct Writer(Vec<u8>);

impl Writer {
    fn u8(&mut self, value: u8) {
        self.0.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn i16(&mut self, value: i16) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn len(&mut self, len: usize) {
        self.u32(len as u32);
    }

    fn str(&mut self, text: &str) {
        self.u16(text.len() as u16);
        self.0.extend_from_slice(text.as_bytes());
    }
}

pub(crate) fn decode(bytes: &[u8]) -> Result<GrammarTable, CorruptTableError> {
    if bytes.get(..MAGIC.len()) != Some(&MAGIC[..]) {
        return Err(CorruptTableError::BadMagic);
    }
    let mut header = Reader::new("header", bytes);
    header.bytes(MAGIC.len())?;
    let version = header.u16()?;
    if !(MIN_FORMAT_VERSION..=FORMAT_VERSION).contains(&version) {
        return Err(CorruptTableError::UnsupportedVersion {
            found: version,
            min: MIN_FORMAT_VERSION,
            max: FORMAT_VERSION,
        });
    }
    let _flags = header.u16()?;
    let section_count = header.u32()?;

    let mut directory: Vec<([u8; 4], &[u8])> = Vec::new();
    for _ in 0..section_count {
        let tag = header.array::<4>()?;
        let offset = header.u32()? as usize;
        let len = header.u32()? as usize;
        let end = offset.saturating_add(len);
        if end > bytes.len() {
            return Err(CorruptTableError::SectionOutOfBounds {
                section: String::from_utf8_lossy(&tag).into_owned(),
                offset,
                end,
                len: bytes.len(),
            });
        }
        if directory.iter().any(|(seen, _)| *seen == tag) {
            return Err(CorruptTableError::DuplicateSection(
                String::from_utf8_lossy(&tag).into_owned(),
            ));
        }
        directory.push((tag, &bytes[offset..end]));
    }

    let section = |name: &'static str| {
        directory
            .iter()
            .find(|(tag, _)| tag == name.as_bytes())
            .map(|&(_, data)| Reader::new(name, data))
            .ok_or(CorruptTableError::MissingSection(name))
    };

    let mut meta = section("META")?;
    let start_state = StateId(meta.u16()?);
    let error_lex_state = LexStateId(meta.u16()?);
    let terminal_count = meta.u16()?;
    let name = meta.str()?;
    meta.finish()?;

    let mut reader = section("SYMB")?;
    let symbols = (0..reader.count()?)
        .map(|_| {
            let flags = reader.u8()?;
            Ok(SymbolMetadata {
                name: reader.str()?,
                named: flags & SYMBOL_NAMED != 0,
                terminal: flags & SYMBOL_TERMINAL != 0,
                extra: flags & SYMBOL_EXTRA != 0,
            })
        })
        .collect::<Result<Box<[_]>, CorruptTableError>>()?;
    reader.finish()?;

    let mut reader = section("FLDS")?;
    let fields = (0..reader.count()?).map(|_| reader.str()).collect::<Result<Box<[_]>, _>>()?;
    reader.finish()?;

    let mut reader = section("PROD")?;
    let productions = (0..reader.count()?)
        .map(|_| {
            let lhs = Symbol(reader.u16()?);
            let child_count = reader.u16()?;
            let dynamic_precedence = reader.i16()?;
            let field_count = reader.u16()?;
            let fields = (0..field_count)
                .map(|_| Ok(FieldEntry { field: FieldId(reader.u16()?), child_index: reader.u16()? }))
                .collect::<Result<Box<[_]>, CorruptTableError>>()?;
            Ok(Production { lhs, child_count, dynamic_precedence, fields })
        })
        .collect::<Result<Box<[_]>, CorruptTableError>>()?;
    reader.finish()?;

    let mut reader = section("ACTN")?;
    let actions = (0..reader.count()?)
        .map(|_| {
            let kind = reader.u8()?;
            let flags = reader.u8()?;
            let value = reader.u16()?;
            match kind {
                ACTION_SHIFT => {
                    Ok(Action::Shift { state: StateId(value), extra: flags & ACTION_EXTRA != 0 })
                }
                ACTION_REDUCE => Ok(Action::Reduce { production: ProductionId(value) }),
                ACTION_ACCEPT => Ok(Action::Accept),
                _ => Err(CorruptTableError::invalid(format!("unknown action kind {kind}"))),
            }
        })
        .collect::<Result<Box<[_]>, CorruptTableError>>()?;
    reader.finish()?;

    let mut reader = section("STAT")?;
    let states = (0..reader.count()?)
        .map(|_| {
            let lex_state = LexStateId(reader.u16()?);
            let external_set = Some(reader.u16()?).filter(|&set| set != NO_EXTERNAL_SET);
            let entry_count = reader.u16()?;
            let goto_count = reader.u16()?;
            let entries = (0..entry_count)
                .map(|_| {
                    Ok(ActionEntry {
                        symbol: Symbol(reader.u16()?),
                        start: reader.u32()?,
                        len: reader.u16()?,
                    })
                })
                .collect::<Result<Box<[_]>, CorruptTableError>>()?;
            let gotos = (0..goto_count)
                .map(|_| Ok((Symbol(reader.u16()?), StateId(reader.u16()?))))
                .collect::<Result<Box<[_]>, CorruptTableError>>()?;
            Ok(ParseState { lex_mode: LexMode { lex_state, external_set }, entries, gotos })
        })
        .collect::<Result<Box<[_]>, CorruptTableError>>()?;
    reader.finish()?;

    let mut reader = section("LEXS")?;
    let lex_states = (0..reader.count()?)
        .map(|_| {
            let accept_count = reader.u16()?;
            let transition_count = reader.u16()?;
            let accepts = (0..accept_count)
                .map(|_| reader.u16().map(Symbol))
                .collect::<Result<Box<[_]>, _>>()?;
            let transitions = (0..transition_count)
                .map(|_| {
                    Ok(Transition {
                        lo: reader.u32()?,
                        hi: reader.u32()?,
                        next: LexStateId(reader.u16()?),
                        skip: reader.u8()? != 0,
                    })
                })
                .collect::<Result<Box<[_]>, CorruptTableError>>()?;
            Ok(LexState { accepts, transitions })
        })
        .collect::<Result<Box<[_]>, CorruptTableError>>()?;
    reader.finish()?;

    let mut reader = section("EXTN")?;
    let token_count = reader.u16()?;
    let external_tokens =
        (0..token_count).map(|_| reader.u16().map(Symbol)).collect::<Result<Box<[_]>, _>>()?;
    let set_count = reader.u16()?;
    let external_sets = (0..set_count)
        .map(|_| Ok(reader.bytes(token_count.into())?.iter().map(|&valid| valid != 0).collect()))
        .collect::<Result<Box<[_]>, CorruptTableError>>()?;
    reader.finish()?;

    let table = GrammarTable {
        name,
        symbols,
        terminal_count,
        fields,
        productions,
        states,
        actions,
        lex_states,
        external_tokens,
        external_sets,
        start_state,
        error_lex_state,
    };
    validate(&table)?;
    Ok(table)
}

pub(crate) fn encode(table: &GrammarTable) -> Vec<u8> {
    let mut meta = Writer::default();
    let mut symbols = Writer::default();
    let mut fields = Writer::default();
    let mut productions = Writer::default();
    let mut actions = Writer::default();
    let mut states = Writer::default();
    let mut lex_states = Writer::default();
    let mut externals = Writer::default();

    meta.u16(table.start_state.0);
    meta.u16(table.error_lex_state.0);
    meta.u16(table.terminal_count);
    meta.str(&table.name);

    symbols.len(table.symbols.len());
    for symbol in &table.symbols {
        let mut flags = 0;
        if symbol.named {
            flags |= SYMBOL_NAMED;
        }
        if symbol.terminal {
            flags |= SYMBOL_TERMINAL;
        }
        if symbol.extra {
            flags |= SYMBOL_EXTRA;
        }
        symbols.u8(flags);
        symbols.str(&symbol.name);
    }

    fields.len(table.fields.len());
    for field in &table.fields {
        fields.str(field);
    }

    productions.len(table.productions.len());
    for production in &table.productions {
        productions.u16(production.lhs.0);
        productions.u16(production.child_count);
        productions.i16(production.dynamic_precedence);
        productions.u16(production.fields.len() as u16);
        for entry in &production.fields {
            productions.u16(entry.field.0);
            productions.u16(entry.child_index);
        }
    }

    actions.len(table.actions.len());
    for action in &table.actions {
        let (kind, flags, value) = match *action {
            Action::Shift { state, extra } => (ACTION_SHIFT, u8::from(extra) * ACTION_EXTRA, state.0),
            Action::Reduce { production } => (ACTION_REDUCE, 0, production.0),
            Action::Accept => (ACTION_ACCEPT, 0, 0),
        };
        actions.u8(kind);
        actions.u8(flags);
        actions.u16(value);
    }

    states.len(table.states.len());
    for state in &table.states {
        states.u16(state.lex_mode.lex_state.0);
        states.u16(state.lex_mode.external_set.unwrap_or(NO_EXTERNAL_SET));
        states.u16(state.entries.len() as u16);
        states.u16(state.gotos.len() as u16);
        for entry in &state.entries {
            states.u16(entry.symbol.0);
            states.u32(entry.start);
            states.u16(entry.len);
        }
        for &(symbol, target) in &state.gotos {
            states.u16(symbol.0);
            states.u16(target.0);
        }
    }

    lex_states.len(table.lex_states.len());
    for state in &table.lex_states {
        lex_states.u16(state.accepts.len() as u16);
        lex_states.u16(state.transitions.len() as u16);
        for symbol in &state.accepts {
            lex_states.u16(symbol.0);
        }
        for transition in &state.transitions {
            lex_states.u32(transition.lo);
            lex_states.u32(transition.hi);
            lex_states.u16(transition.next.0);
            lex_states.u8(u8::from(transition.skip));
        }
    }

    externals.u16(table.external_tokens.len() as u16);
    for symbol in &table.external_tokens {
        externals.u16(symbol.0);
    }
    externals.u16(table.external_sets.len() as u16);
    for set in &table.external_sets {
        for &valid in set {
            externals.u8(u8::from(valid));
        }
    }

    let sections = [
        (SECTIONS[0], meta),
        (SECTIONS[1], symbols),
        (SECTIONS[2], fields),
        (SECTIONS[3], productions),
        (SECTIONS[4], actions),
        (SECTIONS[5], states),
        (SECTIONS[6], lex_states),
        (SECTIONS[7], externals),
    ];
    let mut out = Writer::default();
    out.0.extend_from_slice(&MAGIC);
    out.u16(FORMAT_VERSION);
    out.u16(0);
    out.len(sections.len());
    let mut offset = HEADER_LEN + DIRECTORY_ENTRY_LEN * sections.len();
    for (name, data) in &sections {
        out.0.extend_from_slice(name.as_bytes());
        out.len(offset);
        out.len(data.0.len());
        offset += data.0.len();
    }
    for (_, data) in sections {
        out.0.extend(data.0);
    }
    out.0
}
