//! LZW decompression of GIF image data.
//!
//! Turns the variable-width code stream into a flat sequence of palette
//! indices. The code table stores every entry as a range into one byte
//! arena, so emitting a string and deriving `P + c[0]` are both plain
//! slice operations. The table lives for a single frame decode.

use alloc::format;
use alloc::vec::Vec;

use crate::decoder::bit_reader::BitReader;
use crate::decoder::DecodeError;
use crate::source::ByteSource;

/// Code width never exceeds 12 bits; at that point the table is frozen.
const MAX_CODE_WIDTH: u8 = 12;
const MAX_TABLE_SIZE: usize = 1 << MAX_CODE_WIDTH;

/// LZW decoder for one frame's index stream.
pub(crate) struct LzwDecoder {
    /// Concatenated bytes of every table entry.
    arena: Vec<u8>,
    /// `(offset, len)` into the arena, indexed by code.
    entries: Vec<(u32, u16)>,
    root_count: u16,
    clear_code: u16,
    end_code: u16,
    width: u8,
    min_code_size: u8,
    previous: Option<u16>,
}

impl LzwDecoder {
    /// Create a decoder for the given minimum code size.
    ///
    /// Fails with [`DecodeError::Unsupported`] when the minimum code size is
    /// outside `1..=8`.
    pub(crate) fn new(min_code_size: u8) -> Result<Self, DecodeError> {
        if !(1..=8).contains(&min_code_size) {
            return Err(DecodeError::Unsupported(format!(
                "LZW minimum code size {min_code_size} (expected 1..=8)"
            )));
        }
        let root_count = 1u16 << min_code_size;
        let mut decoder = Self {
            arena: Vec::new(),
            entries: Vec::new(),
            root_count,
            clear_code: root_count,
            end_code: root_count + 1,
            width: min_code_size + 1,
            min_code_size,
            previous: None,
        };
        decoder.reset_table();
        Ok(decoder)
    }

    fn reset_table(&mut self) {
        self.arena.clear();
        self.entries.clear();
        for c in 0..self.root_count {
            self.arena.push(c as u8);
            self.entries.push((u32::from(c), 1));
        }
        // Placeholder slots so entry index equals code value.
        self.entries.push((0, 0));
        self.entries.push((0, 0));
        self.width = self.min_code_size + 1;
        self.previous = None;
    }

    /// Decode until the end-of-information code, producing exactly
    /// `pixel_count` palette indices.
    ///
    /// Indices past `pixel_count` are ignored; a stream that ends short of it
    /// fails with [`DecodeError::Corrupt`].
    pub(crate) fn decode<S: ByteSource + ?Sized>(
        mut self,
        mut reader: BitReader<'_, '_, S>,
        pixel_count: usize,
    ) -> Result<Vec<u8>, DecodeError> {
        let mut out = Vec::with_capacity(pixel_count);

        loop {
            let code = reader.next_code(self.width)?;
            if code == self.clear_code {
                self.reset_table();
                continue;
            }
            if code == self.end_code {
                break;
            }
            self.step(code, &mut out)?;
            if out.len() >= pixel_count {
                break;
            }
        }
        reader.finish()?;

        if out.len() < pixel_count {
            return Err(DecodeError::Corrupt(
                "LZW stream ended short of the frame's pixel count",
            ));
        }
        out.truncate(pixel_count);
        Ok(out)
    }

    fn step(&mut self, code: u16, out: &mut Vec<u8>) -> Result<(), DecodeError> {
        let next_slot = self.entries.len();
        let frozen = next_slot >= MAX_TABLE_SIZE;

        let Some(previous) = self.previous else {
            // First code after a clear must be a root.
            if code >= self.root_count {
                return Err(DecodeError::Corrupt("LZW stream starts with a non-root code"));
            }
            self.emit(code, out);
            self.previous = Some(code);
            return Ok(());
        };

        if usize::from(code) < next_slot {
            self.emit(code, out);
            if !frozen {
                // New entry: previous string plus the first byte of this one.
                let (p_off, p_len) = self.entries[usize::from(previous)];
                let (c_off, _) = self.entries[usize::from(code)];
                let first = self.arena[c_off as usize];
                let new_off = self.arena.len() as u32;
                self.arena
                    .extend_from_within(p_off as usize..(p_off + u32::from(p_len)) as usize);
                self.arena.push(first);
                self.push_entry(new_off, p_len + 1);
            }
        } else if usize::from(code) == next_slot && !frozen {
            // The code being defined right now: previous string plus its own
            // first byte.
            let (p_off, p_len) = self.entries[usize::from(previous)];
            let first = self.arena[p_off as usize];
            let new_off = self.arena.len() as u32;
            self.arena
                .extend_from_within(p_off as usize..(p_off + u32::from(p_len)) as usize);
            self.arena.push(first);
            self.push_entry(new_off, p_len + 1);
            self.emit(code, out);
        } else {
            return Err(DecodeError::Corrupt("LZW code beyond the code table"));
        }

        self.previous = Some(code);
        Ok(())
    }

    fn push_entry(&mut self, offset: u32, len: u16) {
        self.entries.push((offset, len));
        if self.entries.len() == 1usize << self.width && self.width < MAX_CODE_WIDTH {
            self.width += 1;
        }
    }

    fn emit(&self, code: u16, out: &mut Vec<u8>) {
        let (off, len) = self.entries[usize::from(code)];
        out.extend_from_slice(&self.arena[off as usize..(off + u32::from(len)) as usize]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, SourceCursor};

    fn decode_bytes(min_code_size: u8, data: &[u8], pixels: usize) -> Result<Vec<u8>, DecodeError> {
        let source = MemorySource::from(data);
        let mut cursor = SourceCursor::new(&source, 0);
        let reader = BitReader::new(&mut cursor);
        LzwDecoder::new(min_code_size)?.decode(reader, pixels)
    }

    #[test]
    fn single_white_pixel() {
        // CLEAR(100), 1(001), END(101) at width 3, LSB-first.
        let result = decode_bytes(2, &[0x02, 0x4C, 0x01, 0x00], 1).unwrap();
        assert_eq!(result, [1]);
    }

    #[test]
    fn repeated_string_defines_next_slot() {
        // CLEAR, 1, 6 (= "11", the entry being defined), END.
        // Width 3, LSB-first: codes 4, 1, 6, 5 pack to 0x8C, 0x0B.
        let result = decode_bytes(2, &[0x02, 0x8C, 0x0B, 0x00], 3).unwrap();
        assert_eq!(result, [1, 1, 1]);
    }

    #[test]
    fn short_stream_is_corrupt() {
        // Declares 4 pixels but carries one.
        let err = decode_bytes(2, &[0x02, 0x4C, 0x01, 0x00], 4).unwrap_err();
        assert!(matches!(err, DecodeError::Corrupt(_)));
    }

    #[test]
    fn invalid_code_is_corrupt() {
        // CLEAR, 1, then 7 which is two slots past the next entry.
        // bits: 100 | 001 | 111 -> 0xCC, 0x01.
        let err = decode_bytes(2, &[0x02, 0xCC, 0x01, 0x00], 8).unwrap_err();
        assert!(matches!(err, DecodeError::Corrupt(_)));
    }

    #[test]
    fn min_code_size_out_of_range() {
        assert!(matches!(
            LzwDecoder::new(0),
            Err(DecodeError::Unsupported(_))
        ));
        assert!(matches!(
            LzwDecoder::new(9),
            Err(DecodeError::Unsupported(_))
        ));
    }

    #[test]
    fn excess_indices_are_ignored() {
        // CLEAR, 1, 1, END but only one pixel wanted.
        let result = decode_bytes(2, &[0x02, 0x4C, 0x0A, 0x00], 1).unwrap();
        assert_eq!(result, [1]);
    }
}
