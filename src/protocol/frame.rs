//! Frame encoding plus deadline-bounded async frame I/O.
//!
//! The codec is content-neutral: a frame is a length prefix and opaque
//! bytes. What the bytes mean is decided by the envelope layer.
//!
//! # Example
//!
//! ```
//! use quadwire::protocol::{encode_frame, LENGTH_PREFIX_SIZE};
//!
//! let bytes = encode_frame(b"hello");
//! assert_eq!(bytes.len(), LENGTH_PREFIX_SIZE + 5);
//! assert_eq!(&bytes[..LENGTH_PREFIX_SIZE], &5u64.to_be_bytes());
//! ```

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::frame_buffer::FrameBuffer;
use super::wire_format::{LengthPrefix, LENGTH_PREFIX_SIZE};
use crate::error::FrameError;

/// Socket read chunk size.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Build a complete frame as a single byte vector.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&LengthPrefix::new(payload.len() as u64).encode());
    buf.extend_from_slice(payload);
    buf
}

/// Build frame parts for writes that should not copy the payload.
pub fn encode_frame_parts(payload: &[u8]) -> ([u8; LENGTH_PREFIX_SIZE], &[u8]) {
    (LengthPrefix::new(payload.len() as u64).encode(), payload)
}

/// Decode the first frame of an in-memory buffer.
///
/// Bytes after the frame are not part of it and are ignored, as they
/// would be on a stream.
pub fn decode_frame(bytes: &[u8], max_frame_size: u64) -> std::result::Result<Bytes, FrameError> {
    let mut buffer = FrameBuffer::with_max_frame_size(max_frame_size);
    buffer.push(bytes)?.ok_or_else(|| incomplete(&buffer))
}

/// Read exactly one frame, giving up after `deadline`.
///
/// Performs as many partial reads as the transport delivers.
pub async fn read_frame<R>(
    reader: &mut R,
    max_frame_size: u64,
    deadline: Duration,
) -> std::result::Result<Bytes, FrameError>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(deadline, read_frame_inner(reader, max_frame_size)).await {
        Ok(result) => result,
        Err(_) => Err(FrameError::Timeout(deadline)),
    }
}

async fn read_frame_inner<R>(
    reader: &mut R,
    max_frame_size: u64,
) -> std::result::Result<Bytes, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = FrameBuffer::with_max_frame_size(max_frame_size);
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(incomplete(&buffer));
        }
        if let Some(payload) = buffer.push(&chunk[..n])? {
            if !buffer.is_empty() {
                tracing::debug!("Ignoring {} bytes after frame", buffer.len());
            }
            return Ok(payload);
        }
    }
}

/// Write one frame and flush, giving up after `deadline`.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
    deadline: Duration,
) -> std::result::Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let (prefix, payload) = encode_frame_parts(payload);
    let write = async {
        writer.write_all(&prefix).await?;
        writer.write_all(payload).await?;
        writer.flush().await
    };
    match tokio::time::timeout(deadline, write).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(FrameError::Timeout(deadline)),
    }
}

fn incomplete(buffer: &FrameBuffer) -> FrameError {
    FrameError::IncompleteFrame {
        expected: buffer
            .expected_len()
            .unwrap_or(LENGTH_PREFIX_SIZE as u64),
        received: buffer.received_len(),
    }
}
