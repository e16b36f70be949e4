//! Protocol module - wire format and framing.
//!
//! This module implements the transport framing used in both directions:
//! - 8-byte big-endian length prefix encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Deadline-bounded async frame read/write

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{decode_frame, encode_frame, encode_frame_parts, read_frame, write_frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{LengthPrefix, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE};
