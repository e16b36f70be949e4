//! Codec module - payload serialization layered on top of frames.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`)
//! - [`PartitionRequest`] / [`WorkerResponse`] - versioned envelopes
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects.
//! The frame layer never looks inside payloads; everything that gives
//! bytes a meaning lives here.

mod envelope;
mod msgpack;

pub use envelope::{
    FailureKind, PartitionRequest, ResponseOutcome, WorkerResponse, ENVELOPE_VERSION,
};
pub use msgpack::MsgPackCodec;
