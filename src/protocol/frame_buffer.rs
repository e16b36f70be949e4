//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForPrefix`: Need at least 8 bytes
//! - `WaitingForPayload`: Prefix parsed, need N more payload bytes
//!
//! # Example
//!
//! ```
//! use quadwire::protocol::{encode_frame, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let bytes = encode_frame(b"hello");
//!
//! // Data arrives in chunks from the socket
//! assert!(buffer.push(&bytes[..5]).unwrap().is_none());
//! let payload = buffer.push(&bytes[5..]).unwrap().unwrap();
//! assert_eq!(&payload[..], b"hello");
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{LengthPrefix, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE};
use crate::error::FrameError;

/// Upper bound on the up-front reservation for a declared payload.
const MAX_RESERVE: usize = 16 * 1024 * 1024;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for the complete 8-byte prefix.
    WaitingForPrefix,
    /// Prefix parsed, waiting for payload bytes.
    WaitingForPayload { payload_length: u64 },
}

/// Buffer for accumulating incoming bytes until one frame is complete.
///
/// The protocol carries exactly one frame per direction per connection,
/// so `push` yields at most one payload; bytes after it stay buffered
/// and are reported through [`FrameBuffer::len`].
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_frame_size: u64,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max payload: 1GB.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_frame_size(max_frame_size: u64) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForPrefix,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract the frame if complete.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLength` as soon as a prefix exceeding the maximum
    /// is seen, before any payload is buffered.
    pub fn push(&mut self, data: &[u8]) -> std::result::Result<Option<Bytes>, FrameError> {
        self.buffer.extend_from_slice(data);
        self.try_extract()
    }

    fn try_extract(&mut self) -> std::result::Result<Option<Bytes>, FrameError> {
        if let State::WaitingForPrefix = self.state {
            let Some(prefix) = LengthPrefix::decode(&self.buffer) else {
                return Ok(None);
            };
            prefix.validate(self.max_frame_size)?;

            let _ = self.buffer.split_to(LENGTH_PREFIX_SIZE);
            let wanted = usize::try_from(prefix.payload_length).unwrap_or(usize::MAX);
            self.buffer
                .reserve(wanted.saturating_sub(self.buffer.len()).min(MAX_RESERVE));
            self.state = State::WaitingForPayload {
                payload_length: prefix.payload_length,
            };
        }

        let State::WaitingForPayload { payload_length } = self.state else {
            return Ok(None);
        };
        if (self.buffer.len() as u64) < payload_length {
            return Ok(None);
        }

        let payload = self.buffer.split_to(payload_length as usize).freeze();
        self.state = State::WaitingForPrefix;
        Ok(Some(payload))
    }

    /// Total bytes a complete frame needs, once the prefix is known.
    pub fn expected_len(&self) -> Option<u64> {
        match self.state {
            State::WaitingForPrefix => None,
            State::WaitingForPayload { payload_length } => {
                Some(LENGTH_PREFIX_SIZE as u64 + payload_length)
            }
        }
    }

    /// Bytes of the current frame received so far, prefix included.
    pub fn received_len(&self) -> u64 {
        match self.state {
            State::WaitingForPrefix => self.buffer.len() as u64,
            State::WaitingForPayload { .. } => LENGTH_PREFIX_SIZE as u64 + self.buffer.len() as u64,
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForPrefix;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForPrefix => "WaitingForPrefix",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
