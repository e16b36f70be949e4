//! Wire format encoding and decoding.
//!
//! Every message is a single frame:
//! ```text
//! ┌──────────────────┬────────────────────────┐
//! │ Length           │ Payload                │
//! │ 8 bytes          │ `Length` bytes         │
//! │ uint64 BE        │ opaque                 │
//! └──────────────────┴────────────────────────┘
//! ```
//!
//! The prefix always equals the payload length; zero is legal.

use crate::error::FrameError;

/// Length prefix size in bytes (fixed, exactly 8).
pub const LENGTH_PREFIX_SIZE: usize = 8;

/// Default maximum payload size (1 GB).
pub const DEFAULT_MAX_FRAME_SIZE: u64 = 1_073_741_824;

/// Decoded length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthPrefix {
    /// Payload length in bytes.
    pub payload_length: u64,
}

impl LengthPrefix {
    /// Create a new prefix.
    pub fn new(payload_length: u64) -> Self {
        Self { payload_length }
    }

    /// Encode prefix to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use quadwire::protocol::LengthPrefix;
    ///
    /// let bytes = LengthPrefix::new(258).encode();
    /// assert_eq!(bytes, [0, 0, 0, 0, 0, 0, 1, 2]);
    /// ```
    pub fn encode(&self) -> [u8; LENGTH_PREFIX_SIZE] {
        self.payload_length.to_be_bytes()
    }

    /// Decode prefix from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let bytes: [u8; LENGTH_PREFIX_SIZE] = buf.get(..LENGTH_PREFIX_SIZE)?.try_into().ok()?;
        Some(Self {
            payload_length: u64::from_be_bytes(bytes),
        })
    }

    /// Reject lengths above `max_frame_size`.
    pub fn validate(&self, max_frame_size: u64) -> std::result::Result<(), FrameError> {
        if self.payload_length > max_frame_size {
            return Err(FrameError::InvalidLength {
                length: self.payload_length,
                max: max_frame_size,
            });
        }
        Ok(())
    }
}
