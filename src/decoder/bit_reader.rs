//! Variable-width code extraction from LZW sub-block data.
//!
//! GIF image data is a chain of `(length, bytes...)` sub-blocks terminated
//! by a zero-length block. LZW codes are packed LSB-first across byte and
//! sub-block boundaries, and the code width changes between reads as the
//! decoder's table grows, so this reader holds nothing beyond a single bit
//! accumulator and extracts exactly the requested width on demand.

use crate::decoder::DecodeError;
use crate::source::{ByteSource, SourceCursor};

/// Reads little-endian bit codes out of a sub-block chain.
pub(crate) struct BitReader<'a, 'src, S: ByteSource + ?Sized> {
    cursor: &'a mut SourceCursor<'src, S>,
    block: [u8; 255],
    block_len: usize,
    block_pos: usize,
    acc: u32,
    bits: u8,
    terminated: bool,
}

impl<'a, 'src, S: ByteSource + ?Sized> BitReader<'a, 'src, S> {
    /// The cursor must be positioned at the first sub-block length byte.
    pub(crate) fn new(cursor: &'a mut SourceCursor<'src, S>) -> Self {
        Self {
            cursor,
            block: [0; 255],
            block_len: 0,
            block_pos: 0,
            acc: 0,
            bits: 0,
            terminated: false,
        }
    }

    /// Extract the next code of `width` bits (1..=12).
    ///
    /// Fails with [`DecodeError::Corrupt`] if the sub-block chain ends before
    /// enough bits are available.
    pub(crate) fn next_code(&mut self, width: u8) -> Result<u16, DecodeError> {
        debug_assert!((1..=12).contains(&width));
        while self.bits < width {
            if self.block_pos == self.block_len {
                self.refill()?;
            }
            self.acc |= u32::from(self.block[self.block_pos]) << self.bits;
            self.block_pos += 1;
            self.bits += 8;
        }
        let code = (self.acc & ((1u32 << width) - 1)) as u16;
        self.acc >>= width;
        self.bits -= width;
        Ok(code)
    }

    fn refill(&mut self) -> Result<(), DecodeError> {
        if self.terminated {
            return Err(DecodeError::Corrupt("LZW data ended inside a code"));
        }
        let len = self.cursor.read_u8()? as usize;
        if len == 0 {
            self.terminated = true;
            return Err(DecodeError::Corrupt(
                "LZW data ended before the end-of-information code",
            ));
        }
        self.cursor.read_exact(&mut self.block[..len])?;
        self.block_len = len;
        self.block_pos = 0;
        Ok(())
    }

    /// Drain the remainder of the sub-block chain so the cursor lands on the
    /// byte following the image data.
    pub(crate) fn finish(mut self) -> Result<(), DecodeError> {
        while !self.terminated {
            let len = self.cursor.read_u8()? as u64;
            if len == 0 {
                self.terminated = true;
            } else {
                self.cursor.skip(len)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn codes_cross_byte_and_block_boundaries() {
        // Two sub-blocks holding the bytes 0b1010_1100, 0b0000_0101.
        let source = MemorySource::from(&[0x01, 0xAC, 0x01, 0x05, 0x00][..]);
        let mut cursor = SourceCursor::new(&source, 0);
        let mut reader = BitReader::new(&mut cursor);
        assert_eq!(reader.next_code(3).unwrap(), 0b100);
        assert_eq!(reader.next_code(3).unwrap(), 0b101);
        // Next 3 bits straddle the sub-block boundary: 10 | 1.
        assert_eq!(reader.next_code(3).unwrap(), 0b110);
        assert_eq!(reader.next_code(5).unwrap(), 0b00010);
        reader.finish().unwrap();
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn width_changes_between_reads() {
        let source = MemorySource::from(&[0x02, 0xFF, 0x0F, 0x00][..]);
        let mut cursor = SourceCursor::new(&source, 0);
        let mut reader = BitReader::new(&mut cursor);
        assert_eq!(reader.next_code(4).unwrap(), 0xF);
        assert_eq!(reader.next_code(8).unwrap(), 0xFF);
        assert_eq!(reader.next_code(4).unwrap(), 0x0);
    }

    #[test]
    fn underflow_is_corrupt() {
        let source = MemorySource::from(&[0x01, 0xAA, 0x00][..]);
        let mut cursor = SourceCursor::new(&source, 0);
        let mut reader = BitReader::new(&mut cursor);
        assert_eq!(reader.next_code(8).unwrap(), 0xAA);
        assert!(matches!(
            reader.next_code(8),
            Err(DecodeError::Corrupt(_))
        ));
    }

    #[test]
    fn missing_terminator_is_corrupt() {
        let source = MemorySource::from(&[0x02, 0xAA][..]);
        let mut cursor = SourceCursor::new(&source, 0);
        let mut reader = BitReader::new(&mut cursor);
        assert!(reader.next_code(8).is_err());
    }

    #[test]
    fn finish_skips_unread_blocks() {
        let source = MemorySource::from(&[0x02, 0xAA, 0xBB, 0x01, 0xCC, 0x00, 0x3B][..]);
        let mut cursor = SourceCursor::new(&source, 0);
        let reader = BitReader::new(&mut cursor);
        reader.finish().unwrap();
        assert_eq!(cursor.read_u8().unwrap(), 0x3B);
    }
}
