//! GIF decoder implementation

mod api;
mod bit_reader;
mod blocks;
mod composite;
mod index;
mod lzw;

// Re-export public API
pub use api::{
    decode_argb, decode_frames, DecodeConfig, DecodeError, FrameInfo, FrameIter, GifDecoder,
    GifInfo, ImageFrame, LoopCount,
};
pub use blocks::{ColorTable, DisposeMethod, GifVersion};
