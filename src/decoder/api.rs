use alloc::string::String;
use thiserror::Error;

/// Errors that can occur when decoding a GIF stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// An IO error surfaced by the underlying byte source.
    #[cfg(feature = "std")]
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream does not start with a `GIF87a` or `GIF89a` signature.
    #[error("Not a GIF stream: {0:x?}")]
    NotAGif([u8; 6]),

    /// A recognized but un-handleable variant, such as an LZW minimum code
    /// size outside `1..=8`.
    #[error("Unsupported GIF feature: {0}")]
    Unsupported(String),

    /// A structural violation: truncated data, an LZW code beyond the code
    /// table, a frame rectangle outside the logical screen, or a frame with
    /// no color table at all.
    #[error("Corrupt GIF stream: {0}")]
    Corrupt(&'static str),

    /// A frame index outside `0..frame_count`.
    #[error("Frame {index} out of range (total: {total})")]
    OutOfRange {
        /// The requested frame index.
        index: usize,
        /// The total number of frames.
        total: usize,
    },

    /// An invalid caller-supplied value, such as a timestamp beyond the
    /// animation duration or a zero cache interval.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The stream holds no frames.
    #[error("GIF stream has no frames")]
    Empty,

    /// The decoder was closed and its byte source released.
    #[error("Decoder is closed")]
    Closed,
}

use alloc::format;
use alloc::vec::Vec;
use core::num::NonZeroU16;

use crate::decoder::bit_reader::BitReader;
use crate::decoder::blocks::{
    read_frame_image, ColorTable, DisposeMethod, GifVersion, ScreenDescriptor,
};
use crate::decoder::composite::{Compositor, TRANSPARENT};
use crate::decoder::index::{build_index, FrameMeta};
use crate::decoder::lzw::LzwDecoder;
use crate::source::{ByteSource, MemorySource, SourceCursor};

/// Number of times that an animation loops.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoopCount {
    /// The animation loops forever (a NETSCAPE2.0 loop count of zero).
    Forever,
    /// The animation plays the specified number of times.
    Times(NonZeroU16),
}

impl core::fmt::Display for LoopCount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LoopCount::Forever => f.write_str("infinite"),
            LoopCount::Times(n) => write!(f, "{} time{}", n, if n.get() == 1 { "" } else { "s" }),
        }
    }
}

impl From<u16> for LoopCount {
    fn from(n: u16) -> Self {
        match NonZeroU16::new(n) {
            None => LoopCount::Forever,
            Some(n) => LoopCount::Times(n),
        }
    }
}

/// GIF decoder configuration. Reusable across decoders.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodeConfig {
    /// Materialize the composed canvas every this many frames, bounding the
    /// cost of a random-access read. Must be positive. Default: 50.
    pub cache_frame_interval: u32,
    /// Memory limit in bytes for canvas and cache buffers (0 = no limit).
    /// Default: 0.
    pub memory_limit: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            cache_frame_interval: 50,
            memory_limit: 0,
        }
    }
}

impl DecodeConfig {
    /// Set the cache interval in frames.
    #[must_use]
    pub fn cache_frame_interval(mut self, frames: u32) -> Self {
        self.cache_frame_interval = frames;
        self
    }

    /// Set a memory limit in bytes (0 = no limit).
    #[must_use]
    pub fn memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }
}

/// A fully composited animation frame.
///
/// The pixel buffer always covers the whole logical screen, with alpha in
/// the high byte (`0xAARRGGBB`); opaque pixels carry alpha `0xFF`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    /// Composed ARGB pixels, `width * height` of them, row-major.
    pub argb: Vec<u32>,
    /// Logical screen width in pixels.
    pub width: u16,
    /// Logical screen height in pixels.
    pub height: u16,
    /// Display duration of this frame in milliseconds.
    pub duration_ms: u32,
    /// Cumulative presentation timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Zero-based position in the animation.
    pub index: usize,
}

/// Per-frame timing, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Display duration in milliseconds.
    pub duration_ms: u32,
    /// Cumulative presentation timestamp in milliseconds.
    pub timestamp_ms: u64,
}

/// Stream-level metadata summary.
#[derive(Debug, Clone)]
pub struct GifInfo {
    /// Logical screen width in pixels.
    pub width: u16,
    /// Logical screen height in pixels.
    pub height: u16,
    /// Total number of frames.
    pub frame_count: usize,
    /// Sum of all frame durations in milliseconds.
    pub duration_ms: u64,
    /// Number of times the animation loops.
    pub loop_count: LoopCount,
    /// Container version declared in the header.
    pub version: GifVersion,
    /// Index of the background color in the global color table.
    pub background_color_index: u8,
    /// Raw pixel aspect ratio byte from the screen descriptor.
    pub pixel_aspect_ratio: u8,
}

/// GIF image format decoder over a random-access byte source.
///
/// Opening the decoder parses the whole container once, building a frame
/// index; pixel data is decoded on demand when frames are read. Frames are
/// served by index, by timestamp, or through a sequential iterator.
///
/// # Example
///
/// ```
/// use zengif::{GifDecoder, MemorySource};
///
/// // A 1x1 GIF with a two-entry palette and a single white pixel.
/// let data: &[u8] = &[
///     0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00,
///     0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF,
///     0x2C, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00,
///     0x02, 0x02, 0x4C, 0x01, 0x00, 0x3B,
/// ];
/// let decoder = GifDecoder::open(MemorySource::from(data))?;
/// assert_eq!((decoder.width(), decoder.height()), (1, 1));
/// let frame = decoder.read_frame(0)?;
/// assert_eq!(frame.argb, [0xFFFF_FFFF]);
/// # Ok::<(), zengif::DecodeError>(())
/// ```
pub struct GifDecoder<S: ByteSource> {
    source: Option<S>,
    version: GifVersion,
    screen: ScreenDescriptor,
    loop_count: LoopCount,
    frames: Vec<FrameMeta>,
    duration_ms: u64,
}

impl<S: ByteSource> GifDecoder<S> {
    /// Open a decoder with the default configuration.
    pub fn open(source: S) -> Result<Self, DecodeError> {
        Self::open_with(source, DecodeConfig::default())
    }

    /// Open a decoder, parsing the container and building the frame index.
    pub fn open_with(source: S, config: DecodeConfig) -> Result<Self, DecodeError> {
        if config.cache_frame_interval == 0 {
            return Err(DecodeError::InvalidArgument(String::from(
                "cache_frame_interval must be positive",
            )));
        }

        let index = build_index(&source)?;

        let canvas_bytes = usize::from(index.screen.width)
            .checked_mul(usize::from(index.screen.height))
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| DecodeError::Unsupported(String::from("logical screen too large")))?;
        // The compositor keeps the canvas plus one restore snapshot.
        let mut budget = canvas_bytes.saturating_mul(2);
        if config.memory_limit > 0 && budget > config.memory_limit {
            return Err(DecodeError::Unsupported(String::from(
                "memory limit exceeded by the canvas",
            )));
        }

        let loop_count = index
            .netscape_loops
            .map(LoopCount::from)
            .unwrap_or(LoopCount::Times(NonZeroU16::new(1).unwrap()));

        let mut decoder = Self {
            source: Some(source),
            version: index.version,
            screen: index.screen,
            loop_count,
            frames: index.frames,
            duration_ms: index.duration_ms,
        };

        // Materialize synthetic keyframes so any random-access read replays
        // at most one cache interval of frames.
        let interval = config.cache_frame_interval as usize;
        let mut at = interval;
        while at < decoder.frames.len() {
            let canvas = decoder.compose_at(at)?;
            budget = budget.saturating_add(canvas.len() * 4);
            if config.memory_limit > 0 && budget > config.memory_limit {
                return Err(DecodeError::Unsupported(String::from(
                    "memory limit exceeded by frame caches",
                )));
            }
            decoder.frames[at].cached_argb = Some(canvas);
            at += interval;
        }

        Ok(decoder)
    }

    fn source(&self) -> Result<&S, DecodeError> {
        self.source.as_ref().ok_or(DecodeError::Closed)
    }

    /// Logical screen width in pixels.
    pub fn width(&self) -> u16 {
        self.screen.width
    }

    /// Logical screen height in pixels.
    pub fn height(&self) -> u16 {
        self.screen.height
    }

    /// Total number of frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Sum of all frame durations in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Number of times the animation loops.
    pub fn loop_count(&self) -> LoopCount {
        self.loop_count
    }

    /// Container version declared in the header.
    pub fn version(&self) -> GifVersion {
        self.version
    }

    /// Index of the background color in the global color table.
    pub fn background_color_index(&self) -> u8 {
        self.screen.background_index
    }

    /// Raw pixel aspect ratio byte from the screen descriptor.
    pub fn pixel_aspect_ratio(&self) -> u8 {
        self.screen.pixel_aspect_ratio
    }

    /// The global color table, when the stream carries one.
    pub fn global_color_table(&self) -> Option<&ColorTable> {
        self.screen.global_table.as_ref()
    }

    /// The background color resolved through the global color table as
    /// opaque ARGB, or `None` when it cannot be resolved.
    pub fn background_color_hint(&self) -> Option<u32> {
        self.screen
            .global_table
            .as_ref()
            .and_then(|t| t.rgb(self.screen.background_index))
            .map(|rgb| 0xFF00_0000 | rgb)
    }

    /// Stream-level metadata summary.
    pub fn info(&self) -> GifInfo {
        GifInfo {
            width: self.screen.width,
            height: self.screen.height,
            frame_count: self.frames.len(),
            duration_ms: self.duration_ms,
            loop_count: self.loop_count,
            version: self.version,
            background_color_index: self.screen.background_index,
            pixel_aspect_ratio: self.screen.pixel_aspect_ratio,
        }
    }

    /// Per-frame timing, in presentation order.
    pub fn frame_infos(&self) -> Vec<FrameInfo> {
        self.frames
            .iter()
            .map(|f| FrameInfo {
                duration_ms: f.duration_ms,
                timestamp_ms: f.timestamp_ms,
            })
            .collect()
    }

    /// Compose and return the frame at `index`.
    ///
    /// Replays from the nearest prior keyframe or cached canvas, so the cost
    /// is bounded by the cache interval.
    pub fn read_frame(&self, index: usize) -> Result<ImageFrame, DecodeError> {
        self.source()?;
        if self.frames.is_empty() {
            return Err(DecodeError::Empty);
        }
        if index >= self.frames.len() {
            return Err(DecodeError::OutOfRange {
                index,
                total: self.frames.len(),
            });
        }
        let argb = self.compose_at(index)?;
        Ok(self.image_frame(index, argb))
    }

    /// Compose and return the frame on display at `timestamp_ms`.
    ///
    /// Resolves to the greatest frame whose timestamp does not exceed the
    /// requested time; timestamps at or past the last frame's timestamp
    /// yield the last frame.
    pub fn read_frame_at(&self, timestamp_ms: u64) -> Result<ImageFrame, DecodeError> {
        self.source()?;
        if self.frames.is_empty() {
            return Err(DecodeError::Empty);
        }
        if timestamp_ms > self.duration_ms {
            return Err(DecodeError::InvalidArgument(format!(
                "timestamp {timestamp_ms}ms exceeds the animation duration {}ms",
                self.duration_ms
            )));
        }
        let index = self
            .frames
            .partition_point(|f| f.timestamp_ms <= timestamp_ms)
            .saturating_sub(1);
        self.read_frame(index)
    }

    /// Iterate all frames in presentation order over one shared composition
    /// pass. Restart by calling `frames()` again.
    pub fn frames(&self) -> FrameIter<'_, S> {
        FrameIter {
            decoder: self,
            compositor: Compositor::new(self.screen.width, self.screen.height),
            next: 0,
        }
    }

    /// Release the byte source. Subsequent frame reads fail with
    /// [`DecodeError::Closed`]; metadata accessors keep answering from the
    /// in-memory index.
    pub fn close(&mut self) {
        self.source = None;
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    fn image_frame(&self, index: usize, argb: Vec<u32>) -> ImageFrame {
        let meta = &self.frames[index];
        ImageFrame {
            argb,
            width: self.screen.width,
            height: self.screen.height,
            duration_ms: meta.duration_ms,
            timestamp_ms: meta.timestamp_ms,
            index,
        }
    }

    /// Choose the replay starting frame for `target`: the greatest usable
    /// keyframe or cached frame at or before it.
    ///
    /// A frame that disposes to previous cannot seed a replay of later
    /// frames: its disposal restores canvas state recorded before the seed
    /// point. Frame 0 always can, since its pre-apply state is the cleared
    /// canvas replay starts from anyway.
    fn seed_frame(&self, target: usize) -> usize {
        let mut k = target;
        loop {
            let meta = &self.frames[k];
            if (meta.cached_argb.is_some() || meta.is_keyframe)
                && (k == target || k == 0 || meta.dispose != DisposeMethod::Previous)
            {
                return k;
            }
            k -= 1;
        }
    }

    fn compose_at(&self, target: usize) -> Result<Vec<u32>, DecodeError> {
        let source = self.source()?;
        let mut compositor = Compositor::new(self.screen.width, self.screen.height);

        let seed = self.seed_frame(target);
        let mut start = seed;
        if let Some(cache) = &self.frames[seed].cached_argb {
            compositor.seed(cache);
            if seed < target {
                self.dispose_into(&mut compositor, &self.frames[seed]);
            }
            start = seed + 1;
        }

        for j in start..=target {
            let meta = &self.frames[j];
            let (indices, local_table) = self.decode_frame_pixels(source, meta)?;
            let table = local_table
                .as_ref()
                .or(self.screen.global_table.as_ref())
                .ok_or(DecodeError::Corrupt("frame has no color table"))?;
            compositor.apply(meta, &indices, table);
            if j < target {
                self.dispose_into(&mut compositor, meta);
            }
        }

        Ok(compositor.canvas().to_vec())
    }

    fn decode_frame_pixels(
        &self,
        source: &S,
        meta: &FrameMeta,
    ) -> Result<(Vec<u8>, Option<ColorTable>), DecodeError> {
        let mut cursor = SourceCursor::new(source, meta.byte_offset);
        let (_, local_table) = read_frame_image(&mut cursor)?;
        let pixel_count = usize::from(meta.width) * usize::from(meta.height);
        let min_code_size = cursor.read_u8()?;
        let lzw = LzwDecoder::new(min_code_size)?;
        let reader = BitReader::new(&mut cursor);
        let indices = lzw.decode(reader, pixel_count)?;
        Ok((indices, local_table))
    }

    fn dispose_into(&self, compositor: &mut Compositor, meta: &FrameMeta) {
        compositor.dispose(meta, self.background_fill(meta));
    }

    /// The fill color for restore-to-background disposal: the global-table
    /// background color, or transparent when the index is out of range or
    /// the disposing frame used a local color table.
    fn background_fill(&self, meta: &FrameMeta) -> u32 {
        if meta.has_local_table {
            return TRANSPARENT;
        }
        match self
            .screen
            .global_table
            .as_ref()
            .and_then(|t| t.rgb(self.screen.background_index))
        {
            Some(rgb) => 0xFF00_0000 | rgb,
            None => TRANSPARENT,
        }
    }
}

/// Lazy iterator over composed frames, sharing one composition pass.
///
/// Created by [`GifDecoder::frames`]. A decode error ends the iteration
/// after yielding the error once.
pub struct FrameIter<'a, S: ByteSource> {
    decoder: &'a GifDecoder<S>,
    compositor: Compositor,
    next: usize,
}

impl<S: ByteSource> FrameIter<'_, S> {
    fn advance(&mut self) -> Result<ImageFrame, DecodeError> {
        let decoder = self.decoder;
        let source = decoder.source()?;

        // The previous frame's disposal runs after its canvas was observed,
        // immediately before the next frame is applied.
        if self.next > 0 {
            decoder.dispose_into(&mut self.compositor, &decoder.frames[self.next - 1]);
        }

        let meta = &decoder.frames[self.next];
        let (indices, local_table) = decoder.decode_frame_pixels(source, meta)?;
        let table = local_table
            .as_ref()
            .or(decoder.screen.global_table.as_ref())
            .ok_or(DecodeError::Corrupt("frame has no color table"))?;
        self.compositor.apply(meta, &indices, table);

        let frame = decoder.image_frame(self.next, self.compositor.canvas().to_vec());
        self.next += 1;
        Ok(frame)
    }
}

impl<S: ByteSource> Iterator for FrameIter<'_, S> {
    type Item = Result<ImageFrame, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.decoder.frames.len() {
            return None;
        }
        match self.advance() {
            Ok(frame) => Some(Ok(frame)),
            Err(e) => {
                self.next = self.decoder.frames.len();
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.decoder.frames.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl<S: ByteSource> ExactSizeIterator for FrameIter<'_, S> {}

// ============================================================================
// Convenience decode functions
// ============================================================================

/// Decode the first frame of a GIF to ARGB pixels.
///
/// Returns the composed pixels and the logical screen dimensions.
///
/// # Example
///
/// ```rust,no_run
/// let gif_data: &[u8] = &[]; // your GIF data
/// let (pixels, width, height) = zengif::decode_argb(gif_data)?;
/// # Ok::<(), zengif::DecodeError>(())
/// ```
pub fn decode_argb(data: &[u8]) -> Result<(Vec<u32>, u16, u16), DecodeError> {
    let decoder = GifDecoder::open(MemorySource::from(data))?;
    let frame = decoder.read_frame(0)?;
    Ok((frame.argb, frame.width, frame.height))
}

/// Decode every frame of a GIF in presentation order.
pub fn decode_frames(data: &[u8]) -> Result<Vec<ImageFrame>, DecodeError> {
    let decoder = GifDecoder::open(MemorySource::from(data))?;
    decoder.frames().collect()
}
