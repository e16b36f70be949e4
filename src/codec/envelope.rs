//! Versioned request and response envelopes.
//!
//! Frames are content-neutral; this is the payload convention spoken by
//! [`Dispatcher`](crate::Dispatcher) and [`Worker`](crate::Worker). Both
//! envelopes carry an explicit `version` that is checked before the rest
//! of the payload is decoded, and decoding only ever produces the concrete
//! types below.
//!
//! ```text
//! request  = { version, index, origin: { x, y }, image }
//! response = { version, outcome: Success { variants, transform_time_ms }
//!                              | Failure { kind, message } }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::MsgPackCodec;
use crate::error::{QuadwireError, Result};
use crate::image::Image;
use crate::partition::{Origin, Partition};
use crate::transform::VariantSet;

/// Envelope version spoken by this build.
pub const ENVELOPE_VERSION: u8 = 1;

/// Reads only the version field of either envelope.
#[derive(Deserialize)]
struct VersionTag {
    version: u8,
}

fn check_version(bytes: &[u8]) -> Result<()> {
    let tag: VersionTag = MsgPackCodec::decode(bytes)?;
    if tag.version != ENVELOPE_VERSION {
        return Err(QuadwireError::UnsupportedVersion(tag.version));
    }
    Ok(())
}

/// Dispatcher → worker: one quadrant to transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRequest {
    /// Envelope version.
    pub version: u8,
    /// Grid index of the quadrant.
    pub index: u8,
    /// Offset of the quadrant within the source image.
    pub origin: Origin,
    /// Quadrant pixels.
    pub image: Image,
}

impl PartitionRequest {
    /// Wrap a partition in a current-version envelope.
    pub fn new(partition: Partition) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            index: partition.index() as u8,
            origin: partition.origin,
            image: partition.image,
        }
    }

    /// Encode to MsgPack.
    pub fn encode(&self) -> Result<Vec<u8>> {
        MsgPackCodec::encode(self)
    }

    /// Decode from MsgPack, rejecting other versions.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        check_version(bytes)?;
        let request: Self = MsgPackCodec::decode(bytes)?;
        if usize::from(request.index) >= crate::partition::PARTITION_COUNT {
            return Err(QuadwireError::Protocol(format!(
                "partition index {} out of range",
                request.index
            )));
        }
        Ok(request)
    }
}

/// Why a worker answered with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The transform failed or produced undeclared output.
    Transform,
    /// The worker was at its connection limit.
    Overloaded,
    /// The request could not be decoded.
    BadRequest,
}

/// Result carried by a response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseOutcome {
    /// Transform succeeded.
    Success {
        /// Output variants for the quadrant.
        variants: VariantSet,
        /// Wall-clock time spent in the transform.
        transform_time_ms: u64,
    },
    /// Request was not processed.
    Failure {
        /// Category of failure.
        kind: FailureKind,
        /// Human-readable reason.
        message: String,
    },
}

/// Worker → dispatcher: the outcome for one quadrant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// Envelope version.
    pub version: u8,
    /// Success or failure.
    pub outcome: ResponseOutcome,
}

impl WorkerResponse {
    /// Successful response.
    pub fn success(variants: VariantSet, transform_time: Duration) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            outcome: ResponseOutcome::Success {
                variants,
                transform_time_ms: u64::try_from(transform_time.as_millis()).unwrap_or(u64::MAX),
            },
        }
    }

    /// Failure response.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            outcome: ResponseOutcome::Failure {
                kind,
                message: message.into(),
            },
        }
    }

    /// True for a failure outcome.
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Failure { .. })
    }

    /// Encode to MsgPack.
    pub fn encode(&self) -> Result<Vec<u8>> {
        MsgPackCodec::encode(self)
    }

    /// Decode from MsgPack, rejecting other versions.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        check_version(bytes)?;
        MsgPackCodec::decode(bytes)
    }

    /// Split into variants and transform time, or the reported failure.
    pub fn into_result(self) -> Result<(VariantSet, Duration)> {
        match self.outcome {
            ResponseOutcome::Success {
                variants,
                transform_time_ms,
            } => Ok((variants, Duration::from_millis(transform_time_ms))),
            ResponseOutcome::Failure { kind, message } => Err(match kind {
                FailureKind::Transform => QuadwireError::Transform(message),
                FailureKind::Overloaded => QuadwireError::Overloaded(message),
                FailureKind::BadRequest => QuadwireError::BadRequest(message),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Quadrant;

    fn quadrant_image() -> Image {
        Image::from_fn(4, 3, 3, |x, y, c| (x * 16 + y * 4 + c) as u8)
    }

    #[test]
    fn test_request_roundtrip() {
        let request = PartitionRequest::new(Partition {
            quadrant: Quadrant::BottomRight,
            origin: Origin { x: 4, y: 3 },
            image: quadrant_image(),
        });
        assert_eq!(request.index, 3);

        let decoded = PartitionRequest::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_request_rejects_other_version() {
        let mut request = PartitionRequest::new(Partition {
            quadrant: Quadrant::TopLeft,
            origin: Origin::default(),
            image: quadrant_image(),
        });
        request.version = 7;

        let err = PartitionRequest::decode(&request.encode().unwrap()).unwrap_err();
        assert!(matches!(err, QuadwireError::UnsupportedVersion(7)));
    }

    #[test]
    fn test_request_rejects_out_of_range_index() {
        let mut request = PartitionRequest::new(Partition {
            quadrant: Quadrant::TopLeft,
            origin: Origin::default(),
            image: quadrant_image(),
        });
        request.index = 9;

        let err = PartitionRequest::decode(&request.encode().unwrap()).unwrap_err();
        assert!(matches!(err, QuadwireError::Protocol(_)));
    }

    #[test]
    fn test_request_rejects_garbage() {
        assert!(PartitionRequest::decode(b"\x00\x01garbage").is_err());
        assert!(PartitionRequest::decode(b"").is_err());
    }

    #[test]
    fn test_success_response_into_result() {
        let variants = VariantSet::single("gray", quadrant_image());
        let response = WorkerResponse::success(variants.clone(), Duration::from_millis(12));

        let decoded = WorkerResponse::decode(&response.encode().unwrap()).unwrap();
        assert!(!decoded.is_failure());
        let (got, time) = decoded.into_result().unwrap();
        assert_eq!(got, variants);
        assert_eq!(time, Duration::from_millis(12));
    }

    #[test]
    fn test_failure_kinds_map_to_errors() {
        let cases = [
            (FailureKind::Transform, "transform failed"),
            (FailureKind::Overloaded, "worker overloaded"),
            (FailureKind::BadRequest, "worker rejected request"),
        ];
        for (kind, prefix) in cases {
            let response = WorkerResponse::failure(kind, "boom");
            let decoded = WorkerResponse::decode(&response.encode().unwrap()).unwrap();
            assert!(decoded.is_failure());
            let err = decoded.into_result().unwrap_err();
            assert!(err.to_string().starts_with(prefix), "{}", err);
        }
    }

    #[test]
    fn test_response_rejects_other_version() {
        let mut response = WorkerResponse::failure(FailureKind::Transform, "x");
        response.version = 0;
        let err = WorkerResponse::decode(&response.encode().unwrap()).unwrap_err();
        assert!(matches!(err, QuadwireError::UnsupportedVersion(0)));
    }
}
