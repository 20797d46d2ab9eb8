//! Protocol module - file-channel wire format and framing.
//!
//! Implements the binary protocol for bulk file transfer:
//! - length-prefixed frame encoding/decoding
//! - frame buffer for accumulating partial reads

mod frame_buffer;
mod wire_format;

pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    FilePayload, CONTENT_LENGTH_SIZE, DEFAULT_MAX_FRAME_SIZE, END_OF_TRANSFER, LENGTH_PREFIX_SIZE,
    NAME_LENGTH_SIZE,
};
