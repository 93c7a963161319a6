//! GIF container structure.
//!
//! Parses the byte-level container into typed records: header, logical
//! screen descriptor, color tables, image descriptors, and the extension
//! blocks that carry per-frame control state. All multi-byte fields are
//! little-endian per the GIF89a specification.

use alloc::vec::Vec;

use crate::decoder::DecodeError;
use crate::source::{ByteSource, SourceCursor};

pub(crate) const INTRODUCER_IMAGE: u8 = 0x2C;
pub(crate) const INTRODUCER_EXTENSION: u8 = 0x21;
pub(crate) const INTRODUCER_TRAILER: u8 = 0x3B;

const LABEL_GRAPHIC_CONTROL: u8 = 0xF9;
const LABEL_APPLICATION: u8 = 0xFF;

/// The GIF container version declared in the stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GifVersion {
    /// The original 1987 format.
    Gif87a,
    /// The 1989 revision that added extensions (timing, transparency).
    Gif89a,
}

impl core::fmt::Display for GifVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            GifVersion::Gif87a => f.write_str("GIF87a"),
            GifVersion::Gif89a => f.write_str("GIF89a"),
        }
    }
}

/// How a frame's sub-rectangle is treated after the frame has been shown,
/// before the next frame is composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposeMethod {
    /// No disposal specified; treated like [`DisposeMethod::Keep`].
    #[default]
    Unspecified,
    /// Leave the canvas as composed.
    Keep,
    /// Fill the sub-rectangle with the background color.
    Background,
    /// Restore the sub-rectangle to its state before the frame was applied.
    Previous,
}

impl DisposeMethod {
    /// Decode bits 2..=4 of the graphic control packed byte. Reserved values
    /// fall back to `Unspecified`.
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => DisposeMethod::Keep,
            2 => DisposeMethod::Background,
            3 => DisposeMethod::Previous,
            _ => DisposeMethod::Unspecified,
        }
    }
}

/// An RGB color table, global or local, holding up to 256 entries.
#[derive(Debug, Clone)]
pub struct ColorTable {
    colors: Vec<u32>,
}

impl ColorTable {
    pub(crate) fn parse<S: ByteSource + ?Sized>(
        cursor: &mut SourceCursor<'_, S>,
        entries: usize,
    ) -> Result<Self, DecodeError> {
        let mut raw = [0u8; 256 * 3];
        cursor.read_exact(&mut raw[..entries * 3])?;
        let colors = raw[..entries * 3]
            .chunks_exact(3)
            .map(|c| u32::from(c[0]) << 16 | u32::from(c[1]) << 8 | u32::from(c[2]))
            .collect();
        Ok(Self { colors })
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// The color at `index` as packed `0x00RRGGBB`, or `None` when the index
    /// is out of range.
    pub fn rgb(&self, index: u8) -> Option<u32> {
        self.colors.get(usize::from(index)).copied()
    }
}

/// Logical screen descriptor plus the optional global color table.
#[derive(Debug, Clone)]
pub(crate) struct ScreenDescriptor {
    pub width: u16,
    pub height: u16,
    pub background_index: u8,
    pub pixel_aspect_ratio: u8,
    pub global_table: Option<ColorTable>,
}

/// Per-frame state parsed from a graphic control extension.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GraphicControl {
    pub dispose: DisposeMethod,
    pub transparent_index: Option<u8>,
    pub duration_ms: u32,
}

impl Default for GraphicControl {
    fn default() -> Self {
        Self {
            dispose: DisposeMethod::Unspecified,
            transparent_index: None,
            // An absent or zero delay renders at the conventional 100 ms.
            duration_ms: 100,
        }
    }
}

/// An image descriptor: the frame's placement and local-table flags.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ImageDescriptor {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub interlaced: bool,
    pub local_table_entries: Option<usize>,
}

/// Read and validate the 6-byte stream header.
pub(crate) fn read_header<S: ByteSource + ?Sized>(
    cursor: &mut SourceCursor<'_, S>,
) -> Result<GifVersion, DecodeError> {
    let mut signature = [0u8; 6];
    match cursor.read_exact(&mut signature) {
        Ok(()) => {}
        Err(DecodeError::Corrupt(_)) => return Err(DecodeError::NotAGif(signature)),
        Err(e) => return Err(e),
    }
    match &signature {
        b"GIF87a" => Ok(GifVersion::Gif87a),
        b"GIF89a" => Ok(GifVersion::Gif89a),
        _ => Err(DecodeError::NotAGif(signature)),
    }
}

/// Read the logical screen descriptor and, when flagged, the global color
/// table that follows it.
pub(crate) fn read_screen_descriptor<S: ByteSource + ?Sized>(
    cursor: &mut SourceCursor<'_, S>,
) -> Result<ScreenDescriptor, DecodeError> {
    let width = cursor.read_u16_le()?;
    let height = cursor.read_u16_le()?;
    let packed = cursor.read_u8()?;
    let background_index = cursor.read_u8()?;
    let pixel_aspect_ratio = cursor.read_u8()?;

    let global_table = if packed & 0x80 != 0 {
        let entries = 2usize << (packed & 0x07);
        Some(ColorTable::parse(cursor, entries)?)
    } else {
        None
    };

    Ok(ScreenDescriptor {
        width,
        height,
        background_index,
        pixel_aspect_ratio,
        global_table,
    })
}

fn read_image_descriptor<S: ByteSource + ?Sized>(
    cursor: &mut SourceCursor<'_, S>,
) -> Result<ImageDescriptor, DecodeError> {
    let left = cursor.read_u16_le()?;
    let top = cursor.read_u16_le()?;
    let width = cursor.read_u16_le()?;
    let height = cursor.read_u16_le()?;
    let packed = cursor.read_u8()?;

    let local_table_entries = if packed & 0x80 != 0 {
        Some(2usize << (packed & 0x07))
    } else {
        None
    };

    Ok(ImageDescriptor {
        left,
        top,
        width,
        height,
        interlaced: packed & 0x40 != 0,
        local_table_entries,
    })
}

/// Re-parse the image descriptor (and local color table, when present) at a
/// recorded frame offset, leaving the cursor at the LZW minimum code size
/// byte.
pub(crate) fn read_frame_image<S: ByteSource + ?Sized>(
    cursor: &mut SourceCursor<'_, S>,
) -> Result<(ImageDescriptor, Option<ColorTable>), DecodeError> {
    if cursor.read_u8()? != INTRODUCER_IMAGE {
        return Err(DecodeError::Corrupt(
            "frame offset does not point at an image descriptor",
        ));
    }
    let descriptor = read_image_descriptor(cursor)?;
    let local_table = match descriptor.local_table_entries {
        Some(entries) => Some(ColorTable::parse(cursor, entries)?),
        None => None,
    };
    Ok((descriptor, local_table))
}

/// Skip the LZW minimum code size byte and the sub-block chain of one
/// frame's image data, validating the code size on the way past.
pub(crate) fn skip_image_data<S: ByteSource + ?Sized>(
    cursor: &mut SourceCursor<'_, S>,
) -> Result<(), DecodeError> {
    let min_code_size = cursor.read_u8()?;
    if !(1..=8).contains(&min_code_size) {
        return Err(DecodeError::Unsupported(alloc::format!(
            "LZW minimum code size {min_code_size} (expected 1..=8)"
        )));
    }
    skip_sub_blocks(cursor)
}

/// Skip a sub-block chain up to and including its zero-length terminator.
pub(crate) fn skip_sub_blocks<S: ByteSource + ?Sized>(
    cursor: &mut SourceCursor<'_, S>,
) -> Result<(), DecodeError> {
    loop {
        let len = cursor.read_u8()?;
        if len == 0 {
            return Ok(());
        }
        cursor.skip(u64::from(len))?;
    }
}

/// An image descriptor together with the graphic-control state that was
/// pending when it was encountered.
pub(crate) struct PendingImage {
    /// Absolute offset of the `0x2C` introducer byte.
    pub byte_offset: u64,
    pub descriptor: ImageDescriptor,
    pub control: GraphicControl,
}

/// Walks the block sequence after the screen descriptor, emitting one record
/// per image and folding extension blocks into parser state.
pub(crate) struct StreamParser<'a, S: ByteSource + ?Sized> {
    cursor: SourceCursor<'a, S>,
    control: Option<GraphicControl>,
    loop_count: Option<u16>,
}

impl<'a, S: ByteSource + ?Sized> StreamParser<'a, S> {
    pub(crate) fn new(cursor: SourceCursor<'a, S>) -> Self {
        Self {
            cursor,
            control: None,
            loop_count: None,
        }
    }

    pub(crate) fn cursor_mut(&mut self) -> &mut SourceCursor<'a, S> {
        &mut self.cursor
    }

    /// The NETSCAPE2.0 loop count, if one was seen so far. `0` is infinite.
    pub(crate) fn loop_count(&self) -> Option<u16> {
        self.loop_count
    }

    /// Advance to the next image descriptor, skipping the local color table.
    ///
    /// Returns `None` at the trailer. A stream that simply ends where a
    /// block introducer belongs is treated the same way; plenty of real
    /// files omit the trailer byte.
    pub(crate) fn next_image(&mut self) -> Result<Option<PendingImage>, DecodeError> {
        loop {
            if self.cursor.remaining() == 0 {
                return Ok(None);
            }
            let byte_offset = self.cursor.position();
            match self.cursor.read_u8()? {
                INTRODUCER_TRAILER => return Ok(None),
                INTRODUCER_EXTENSION => self.read_extension()?,
                INTRODUCER_IMAGE => {
                    let descriptor = read_image_descriptor(&mut self.cursor)?;
                    if let Some(entries) = descriptor.local_table_entries {
                        self.cursor.skip(entries as u64 * 3)?;
                    }
                    return Ok(Some(PendingImage {
                        byte_offset,
                        descriptor,
                        control: self.control.take().unwrap_or_default(),
                    }));
                }
                _ => return Err(DecodeError::Corrupt("unknown block introducer")),
            }
        }
    }

    fn read_extension(&mut self) -> Result<(), DecodeError> {
        match self.cursor.read_u8()? {
            LABEL_GRAPHIC_CONTROL => self.read_graphic_control(),
            LABEL_APPLICATION => self.read_application(),
            // Comment, plain text, and unknown extensions carry nothing the
            // decoder needs.
            _ => skip_sub_blocks(&mut self.cursor),
        }
    }

    fn read_graphic_control(&mut self) -> Result<(), DecodeError> {
        let len = self.cursor.read_u8()? as usize;
        if len < 4 {
            return Err(DecodeError::Corrupt("graphic control extension too short"));
        }
        let mut data = [0u8; 255];
        self.cursor.read_exact(&mut data[..len])?;

        let packed = data[0];
        let delay_cs = u16::from_le_bytes([data[1], data[2]]);
        self.control = Some(GraphicControl {
            dispose: DisposeMethod::from_bits((packed >> 2) & 0x07),
            transparent_index: (packed & 0x01 != 0).then_some(data[3]),
            // Delay is in centiseconds; zero renders at the conventional
            // 100 ms rather than as fast as possible.
            duration_ms: if delay_cs == 0 {
                100
            } else {
                u32::from(delay_cs) * 10
            },
        });
        skip_sub_blocks(&mut self.cursor)
    }

    fn read_application(&mut self) -> Result<(), DecodeError> {
        let len = self.cursor.read_u8()? as usize;
        let mut ident = [0u8; 255];
        self.cursor.read_exact(&mut ident[..len])?;

        if len >= 11 && &ident[..11] == b"NETSCAPE2.0" {
            loop {
                let block_len = self.cursor.read_u8()? as usize;
                if block_len == 0 {
                    return Ok(());
                }
                let mut block = [0u8; 255];
                self.cursor.read_exact(&mut block[..block_len])?;
                if block_len >= 3 && block[0] == 0x01 {
                    self.loop_count = Some(u16::from_le_bytes([block[1], block[2]]));
                }
            }
        }
        skip_sub_blocks(&mut self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn cursor_over(source: &MemorySource) -> SourceCursor<'_, MemorySource> {
        SourceCursor::new(source, 0)
    }

    #[test]
    fn header_versions() {
        let source = MemorySource::from(&b"GIF89a"[..]);
        assert_eq!(
            read_header(&mut cursor_over(&source)).unwrap(),
            GifVersion::Gif89a
        );

        let source = MemorySource::from(&b"GIF87a"[..]);
        assert_eq!(
            read_header(&mut cursor_over(&source)).unwrap(),
            GifVersion::Gif87a
        );
    }

    #[test]
    fn bad_signature_is_not_a_gif() {
        let source = MemorySource::from(&b"PNG\r\n\x1a"[..]);
        assert!(matches!(
            read_header(&mut cursor_over(&source)),
            Err(DecodeError::NotAGif(_))
        ));

        // Too short to even hold a signature.
        let source = MemorySource::from(&b"GIF"[..]);
        assert!(matches!(
            read_header(&mut cursor_over(&source)),
            Err(DecodeError::NotAGif(_))
        ));
    }

    #[test]
    fn screen_descriptor_with_global_table() {
        let source = MemorySource::from(
            &[
                0x03, 0x00, 0x02, 0x00, // 3x2
                0x80, // global table, 2 entries
                0x01, // background index
                0x00, // aspect ratio
                10, 20, 30, 40, 50, 60, // table
            ][..],
        );
        let screen = read_screen_descriptor(&mut cursor_over(&source)).unwrap();
        assert_eq!((screen.width, screen.height), (3, 2));
        assert_eq!(screen.background_index, 1);
        let table = screen.global_table.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rgb(0), Some(10 << 16 | 20 << 8 | 30));
        assert_eq!(table.rgb(1), Some(40 << 16 | 50 << 8 | 60));
        assert_eq!(table.rgb(2), None);
    }

    #[test]
    fn graphic_control_state_applies_to_next_image() {
        // GCE (dispose=background, transparent idx 7, delay 2cs), then a
        // 1x1 image descriptor at (5,6).
        let source = MemorySource::from(
            &[
                INTRODUCER_EXTENSION,
                0xF9,
                0x04,
                0b0000_1001, // dispose 2, transparency on
                0x02,
                0x00,
                0x07,
                0x00, // terminator
                INTRODUCER_IMAGE,
                5,
                0,
                6,
                0,
                1,
                0,
                1,
                0,
                0x00,
            ][..],
        );
        let mut parser = StreamParser::new(cursor_over(&source));
        let image = parser.next_image().unwrap().unwrap();
        assert_eq!(image.byte_offset, 8);
        assert_eq!(image.descriptor.left, 5);
        assert_eq!(image.descriptor.top, 6);
        assert_eq!(image.control.dispose, DisposeMethod::Background);
        assert_eq!(image.control.transparent_index, Some(7));
        assert_eq!(image.control.duration_ms, 20);
    }

    #[test]
    fn control_state_resets_after_an_image() {
        let source = MemorySource::from(
            &[
                INTRODUCER_IMAGE,
                0,
                0,
                0,
                0,
                1,
                0,
                1,
                0,
                0x00,
                INTRODUCER_TRAILER,
            ][..],
        );
        let mut parser = StreamParser::new(cursor_over(&source));
        let image = parser.next_image().unwrap().unwrap();
        assert_eq!(image.control.transparent_index, None);
        assert_eq!(image.control.duration_ms, 100);
        assert!(parser.next_image().unwrap().is_none());
    }

    #[test]
    fn netscape_loop_count() {
        let source = MemorySource::from(
            &[
                INTRODUCER_EXTENSION,
                0xFF,
                0x0B,
                b'N',
                b'E',
                b'T',
                b'S',
                b'C',
                b'A',
                b'P',
                b'E',
                b'2',
                b'.',
                b'0',
                0x03,
                0x01,
                0x05,
                0x00, // loop 5 times
                0x00, // terminator
                INTRODUCER_TRAILER,
            ][..],
        );
        let mut parser = StreamParser::new(cursor_over(&source));
        assert!(parser.next_image().unwrap().is_none());
        assert_eq!(parser.loop_count(), Some(5));
    }

    #[test]
    fn comment_extension_is_skipped() {
        let source = MemorySource::from(
            &[
                INTRODUCER_EXTENSION,
                0xFE,
                0x02,
                b'h',
                b'i',
                0x00,
                INTRODUCER_TRAILER,
            ][..],
        );
        let mut parser = StreamParser::new(cursor_over(&source));
        assert!(parser.next_image().unwrap().is_none());
    }

    #[test]
    fn missing_trailer_is_an_implicit_end() {
        let source = MemorySource::from(&[][..]);
        let mut parser = StreamParser::new(cursor_over(&source));
        assert!(parser.next_image().unwrap().is_none());
    }

    #[test]
    fn unknown_introducer_is_corrupt() {
        let source = MemorySource::from(&[0x42][..]);
        let mut parser = StreamParser::new(cursor_over(&source));
        assert!(matches!(
            parser.next_image(),
            Err(DecodeError::Corrupt(_))
        ));
    }
}
