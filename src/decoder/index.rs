//! Open-time frame index.
//!
//! A single forward parse over the whole stream records, for every image
//! descriptor, where its bytes live and which graphic-control state applies
//! to it. Random-access reads later re-parse image data straight from these
//! offsets. No pixel data is decoded here; cache materialization happens in
//! the facade once the index exists.

use alloc::vec::Vec;

use crate::decoder::blocks::{
    read_header, read_screen_descriptor, skip_image_data, DisposeMethod, GifVersion, ScreenDescriptor,
    StreamParser,
};
use crate::decoder::DecodeError;
use crate::source::{ByteSource, SourceCursor};

/// Everything recorded about one animation frame during the index pass.
#[derive(Debug, Clone)]
pub(crate) struct FrameMeta {
    pub index: usize,
    /// Absolute offset of the frame's image descriptor introducer.
    pub byte_offset: u64,
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub interlaced: bool,
    pub dispose: DisposeMethod,
    pub transparent_index: Option<u8>,
    pub has_local_table: bool,
    pub duration_ms: u32,
    pub timestamp_ms: u64,
    /// Applying this frame fully overwrites the canvas, so replay may start
    /// here from a cleared canvas.
    pub is_keyframe: bool,
    /// Composed canvas at this frame, materialized at cache intervals.
    pub cached_argb: Option<Vec<u32>>,
}

/// Stream-level metadata captured by the index pass.
#[derive(Debug, Clone)]
pub(crate) struct StreamIndex {
    pub version: GifVersion,
    pub screen: ScreenDescriptor,
    /// Raw NETSCAPE2.0 loop count; `Some(0)` means loop forever.
    pub netscape_loops: Option<u16>,
    pub frames: Vec<FrameMeta>,
    pub duration_ms: u64,
}

/// Parse the whole stream once, producing the frame index.
pub(crate) fn build_index<S: ByteSource + ?Sized>(source: &S) -> Result<StreamIndex, DecodeError> {
    let mut cursor = SourceCursor::new(source, 0);
    let version = read_header(&mut cursor)?;
    let screen = read_screen_descriptor(&mut cursor)?;

    let mut parser = StreamParser::new(cursor);
    let mut frames: Vec<FrameMeta> = Vec::new();
    let mut timestamp_ms = 0u64;

    while let Some(image) = parser.next_image()? {
        let d = image.descriptor;
        if u32::from(d.left) + u32::from(d.width) > u32::from(screen.width)
            || u32::from(d.top) + u32::from(d.height) > u32::from(screen.height)
        {
            return Err(DecodeError::Corrupt(
                "frame rectangle outside the logical screen",
            ));
        }
        if d.local_table_entries.is_none() && screen.global_table.is_none() {
            return Err(DecodeError::Corrupt("frame has no color table"));
        }

        let index = frames.len();
        let covers_screen =
            d.left == 0 && d.top == 0 && d.width == screen.width && d.height == screen.height;

        frames.push(FrameMeta {
            index,
            byte_offset: image.byte_offset,
            left: d.left,
            top: d.top,
            width: d.width,
            height: d.height,
            interlaced: d.interlaced,
            dispose: image.control.dispose,
            transparent_index: image.control.transparent_index,
            has_local_table: d.local_table_entries.is_some(),
            duration_ms: image.control.duration_ms,
            timestamp_ms,
            is_keyframe: index == 0
                || (covers_screen && image.control.transparent_index.is_none()),
            cached_argb: None,
        });
        timestamp_ms += u64::from(image.control.duration_ms);

        skip_image_data(parser.cursor_mut())?;
    }

    Ok(StreamIndex {
        version,
        screen,
        netscape_loops: parser.loop_count(),
        frames,
        duration_ms: timestamp_ms,
    })
}
