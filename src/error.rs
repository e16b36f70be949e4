//! Error types for quadwire.

use std::time::Duration;

use thiserror::Error;

/// Failures while reading or writing a single length-prefixed frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The stream closed before the declared payload (or the header) arrived.
    #[error("incomplete frame: expected {expected} bytes, received {received}")]
    IncompleteFrame {
        /// Bytes the frame should have carried (header included while the
        /// header itself is still incomplete).
        expected: u64,
        /// Bytes actually received before the stream closed.
        received: u64,
    },

    /// Declared payload length exceeds the configured maximum.
    #[error("frame length {length} exceeds maximum {max}")]
    InvalidLength {
        /// Declared length from the prefix.
        length: u64,
        /// Configured maximum.
        max: u64,
    },

    /// The read or write deadline expired.
    #[error("frame I/O timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level I/O error.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while recomposing a variant from its four partitions.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// One or more partitions did not succeed or lack the variant.
    #[error("cannot assemble variant '{variant}': missing partition(s) {indices:?}")]
    MissingPartitions {
        /// Variant being assembled.
        variant: String,
        /// Partition indices that are absent, in ascending order.
        indices: Vec<usize>,
    },

    /// Quadrant shapes cannot be stitched back together.
    #[error("cannot assemble variant '{variant}': shape mismatch ({detail})")]
    ShapeMismatch {
        /// Variant being assembled.
        variant: String,
        /// Which dimensions disagree.
        detail: String,
    },
}

/// Main error type for all quadwire operations.
#[derive(Debug, Error)]
pub enum QuadwireError {
    /// Connecting to an endpoint failed (refused, unreachable, DNS).
    #[error("connection to {endpoint} failed: {source}")]
    Connection {
        /// Endpoint as `host:port`.
        endpoint: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Connecting to an endpoint did not finish within the deadline.
    #[error("connection to {endpoint} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Endpoint as `host:port`.
        endpoint: String,
        /// Deadline that expired.
        timeout: Duration,
    },

    /// Framing error on an established connection.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The worker reported that its transform failed.
    #[error("transform failed: {0}")]
    Transform(String),

    /// The worker refused the request because it is at capacity.
    #[error("worker overloaded: {0}")]
    Overloaded(String),

    /// The worker could not understand the request.
    #[error("worker rejected request: {0}")]
    BadRequest(String),

    /// Recomposition failed.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// Image is too small to yield four non-empty quadrants.
    #[error("empty image: {width}x{height} cannot be split into four non-empty quadrants")]
    EmptyImage {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },

    /// Image buffer does not match its declared shape.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Envelope carries a version this build does not speak.
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    /// Protocol violation.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error outside of framing (bind, accept, config files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (configuration only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
}

impl QuadwireError {
    /// True for errors raised before or while establishing the connection.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            QuadwireError::Connection { .. } | QuadwireError::ConnectTimeout { .. }
        )
    }

    /// True for framing errors (truncation, oversize, read/write timeout).
    pub fn is_frame_error(&self) -> bool {
        matches!(self, QuadwireError::Frame(_))
    }
}

/// Result type alias using QuadwireError.
pub type Result<T> = std::result::Result<T, QuadwireError>;
