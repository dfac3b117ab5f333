use std::borrow::Cow;
use std::ops::Range;

pub use line_index::{LineCol, LineIndex};
use ropey::Rope;

/// How input bytes are split into lexer units.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Units are code points; invalid sequences read as U+FFFD over one byte.
    #[default]
    Utf8,
    /// Every byte is one unit.
    Bytes,
}

/// Source text, possibly stored in pieces.
pub trait Input {
    fn len(&self) -> usize;

    /// The bytes from `offset` to the end of the chunk containing it; empty at
    /// or past the end of the input.
    fn chunk_at(&self, offset: usize) -> &[u8];

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, range: Range<usize>) -> Cow<'_, [u8]> {
        let end = range.end.min(self.len());
        let first = self.chunk_at(range.start);
        if range.start >= end {
            return Cow::Borrowed(&[]);
        }
        if first.len() >= end - range.start {
            return Cow::Borrowed(&first[..end - range.start]);
        }
        let mut bytes = Vec::with_capacity(end - range.start);
        let mut offset = range.start;
        while offset < end {
            let chunk = self.chunk_at(offset);
            if chunk.is_empty() {
                break;
            }
            let take = chunk.len().min(end - offset);
            bytes.extend_from_slice(&chunk[..take]);
            offset += take;
        }
        Cow::Owned(bytes)
    }
}

impl<T: Input + ?Sized> Input for &T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn chunk_at(&self, offset: usize) -> &[u8] {
        (**self).chunk_at(offset)
    }
}

impl Input for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn chunk_at(&self, offset: usize) -> &[u8] {
        self.get(offset..).unwrap_or_default()
    }
}

impl Input for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn chunk_at(&self, offset: usize) -> &[u8] {
        self.as_slice().chunk_at(offset)
    }
}

impl Input for str {
    fn len(&self) -> usize {
        str::len(self)
    }

    fn chunk_at(&self, offset: usize) -> &[u8] {
        self.as_bytes().chunk_at(offset)
    }
}

impl Input for String {
    fn len(&self) -> usize {
        self.as_str().len()
    }

    fn chunk_at(&self, offset: usize) -> &[u8] {
        self.as_bytes().chunk_at(offset)
    }
}

impl Input for Rope {
    fn len(&self) -> usize {
        self.len_bytes()
    }

    fn chunk_at(&self, offset: usize) -> &[u8] {
        if offset >= self.len_bytes() {
            return &[];
        }
        let (chunk, start, _, _) = self.chunk_at_byte(offset);
        &chunk.as_bytes()[offset - start..]
    }
}

/// Text held as a list of byte chunks. Chunk boundaries may fall anywhere,
/// including inside a UTF-8 sequence.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkedText {
    chunks: Vec<Box<[u8]>>,
    starts: Vec<usize>,
    len: usize,
}

impl ChunkedText {
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        let mut text = Self::default();
        for chunk in chunks {
            text.push(chunk);
        }
        text
    }

    pub fn push(&mut self, chunk: impl Into<Vec<u8>>) {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return;
        }
        self.starts.push(self.len);
        self.len += chunk.len();
        self.chunks.push(chunk.into_boxed_slice());
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl Input for ChunkedText {
    fn len(&self) -> usize {
        self.len
    }

    fn chunk_at(&self, offset: usize) -> &[u8] {
        if offset >= self.len {
            return &[];
        }
        let index = self.starts.partition_point(|&start| start <= offset) - 1;
        &self.chunks[index][offset - self.starts[index]..]
    }
}
