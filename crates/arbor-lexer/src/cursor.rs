use arbor_inputs::{Encoding, Input};

pub(crate) const REPLACEMENT: u32 = char::REPLACEMENT_CHARACTER as u32;

pub(crate) struct Cursor<'a> {
    input: &'a dyn Input,
    encoding: Encoding,
    offset: usize,
    /// One past the last byte inspected, end of input counting as one byte.
    furthest: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(input: &'a dyn Input, encoding: Encoding, offset: usize) -> Self {
        Self { input, encoding, offset, furthest: offset }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn furthest(&self) -> usize {
        self.furthest
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.offset >= self.input.len()
    }

    /// The unit under the cursor and its width in bytes.
    pub(crate) fn peek(&mut self) -> Option<(u32, usize)> {
        let chunk = self.input.chunk_at(self.offset);
        let Some(&first) = chunk.first() else {
            self.furthest = self.furthest.max(self.offset + 1);
            return None;
        };
        let (unit, width) = match self.encoding {
            Encoding::Bytes => (u32::from(first), 1),
            Encoding::Utf8 => decode(self.input, self.offset, chunk),
        };
        self.furthest = self.furthest.max(self.offset + width);
        Some((unit, width))
    }

    pub(crate) fn advance(&mut self, width: usize) {
        self.offset += width;
    }
}

fn decode(input: &dyn Input, offset: usize, chunk: &[u8]) -> (u32, usize) {
    let first = chunk[0];
    if first < 0x80 {
        return (u32::from(first), 1);
    }
    let width = match first {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return (REPLACEMENT, 1),
    };

    let mut buf = [0; 4];
    if chunk.len() >= width {
        buf[..width].copy_from_slice(&chunk[..width]);
    } else {
        let mut filled = 0;
        while filled < width {
            let next = input.chunk_at(offset + filled);
            if next.is_empty() {
                return (REPLACEMENT, 1);
            }
            let take = next.len().min(width - filled);
            buf[filled..filled + take].copy_from_slice(&next[..take]);
            filled += take;
        }
    }

    match std::str::from_utf8(&buf[..width]).ok().and_then(|text| text.chars().next()) {
        Some(ch) => (u32::from(ch), width),
        None => (REPLACEMENT, 1),
    }
}

#[cfg(test)]
mod tests {
    use arbor_inputs::{ChunkedText, Encoding};

    use super::{Cursor, REPLACEMENT};

    fn units(cursor: &mut Cursor<'_>) -> Vec<(u32, usize)> {
        let mut units = Vec::new();
        while let Some((unit, width)) = cursor.peek() {
            units.push((unit, width));
            cursor.advance(width);
        }
        units
    }

    #[test]
    fn decodes_across_chunks() {
        let text = ChunkedText::new([&b"a\xC3"[..], &b"\xA9\xE2\x82"[..], &b"\xAC"[..]]);
        let mut cursor = Cursor::new(&text, Encoding::Utf8, 0);
        assert_eq!(units(&mut cursor), [(u32::from('a'), 1), (u32::from('é'), 2), (u32::from('€'), 3)]);
        assert_eq!(cursor.furthest(), 7);
    }

    #[test]
    fn invalid_utf8_is_one_byte() {
        let text = &b"\xFFa\xE2\x82"[..];
        let mut cursor = Cursor::new(&text, Encoding::Utf8, 0);
        assert_eq!(units(&mut cursor), [(REPLACEMENT, 1), (u32::from('a'), 1), (REPLACEMENT, 1), (REPLACEMENT, 1)]);
    }

    #[test]
    fn byte_encoding() {
        let text = "é";
        let mut cursor = Cursor::new(&text, Encoding::Bytes, 0);
        assert_eq!(units(&mut cursor), [(0xC3, 1), (0xA9, 1)]);
        assert!(cursor.is_eof());
    }
}
