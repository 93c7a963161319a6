//! Decoding of GIF87a and GIF89a Images
//!
//! Copyright (C) 2026 Imazen LLC
//!
//! This program is free software: you can redistribute it and/or modify
//! it under the terms of the GNU Affero General Public License as published
//! by the Free Software Foundation, either version 3 of the License, or
//! (at your option) any later version.
//!
//! For commercial licensing inquiries: support@imazen.io
//!
//! This crate decodes GIF streams into fully composited ARGB frames with
//! correct inter-frame disposal semantics. Frames can be read in order or
//! random-accessed by index or timestamp; random access replays from the
//! nearest keyframe or cached canvas, so seeking into a long animation does
//! not decode it from the start.
//!
//! # Features
//!
//! - `std` (default): Enables `std::io::Error` conversion for byte sources.
//!   Everything else works without it.
//!
//! # no_std Support
//!
//! Decoding works in `no_std` environments (requires `alloc`):
//! ```toml
//! [dependencies]
//! zengif = { version = "...", default-features = false }
//! ```
//!
//! # Decoding
//!
//! Use the convenience functions for one-shot decodes:
//!
//! ```rust,no_run
//! let gif_data: &[u8] = &[]; // your GIF data
//! let (pixels, width, height) = zengif::decode_argb(gif_data)?;
//! # Ok::<(), zengif::DecodeError>(())
//! ```
//!
//! Or [`GifDecoder`] for metadata access and per-frame reads:
//!
//! ```rust,no_run
//! use zengif::{GifDecoder, MemorySource};
//!
//! let gif_data: Vec<u8> = Vec::new(); // your GIF data
//! let decoder = GifDecoder::open(MemorySource::from(gif_data))?;
//! println!("{}x{}, {} frame(s), loops {}",
//!     decoder.width(), decoder.height(), decoder.frame_count(), decoder.loop_count());
//!
//! for frame in decoder.frames() {
//!     let frame = frame?;
//!     println!("  frame {} at {}ms, duration {}ms",
//!         frame.index, frame.timestamp_ms, frame.duration_ms);
//! }
//! # Ok::<(), zengif::DecodeError>(())
//! ```
//!
//! # Safety
//!
//! This crate uses `#![forbid(unsafe_code)]` and contains no unsafe code.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

// Core modules
pub mod decoder;

// Byte source seam (used by the decoder and callers providing input)
mod source;

// Re-export decoder public API
pub use decoder::{
    decode_argb, decode_frames, ColorTable, DecodeConfig, DecodeError, DisposeMethod, FrameInfo,
    FrameIter, GifDecoder, GifInfo, GifVersion, ImageFrame, LoopCount,
};

// Re-export byte source types
pub use source::{ByteSource, MemorySource, SourceCursor};
