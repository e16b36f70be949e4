//! MsgPack codec using `rmp-serde`.
//!
//! Always encodes with `to_vec_named` so structs travel as maps keyed by
//! field name. Envelopes stay readable by peers that add fields later and
//! never depend on positional layout.
//!
//! # Example
//!
//! ```
//! use quadwire::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Origin {
//!     x: u32,
//!     y: u32,
//! }
//!
//! let origin = Origin { x: 128, y: 0 };
//! let encoded = MsgPackCodec::encode(&origin).unwrap();
//! let decoded: Origin = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, origin);
//! ```

use crate::error::Result;

/// MessagePack codec for structured payloads.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes in struct-as-map format.
    ///
    /// Fails with [`QuadwireError::MsgPackEncode`](crate::QuadwireError::MsgPackEncode).
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes into a concrete, schema-typed value.
    ///
    /// Fails with [`QuadwireError::MsgPackDecode`](crate::QuadwireError::MsgPackDecode)
    /// when the bytes are not a valid `T`.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Timing {
        index: u8,
        transform_time_ms: u64,
        variant: String,
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = Timing {
            index: 3,
            transform_time_ms: 42,
            variant: "edges".to_string(),
        };

        let encoded = MsgPackCodec::encode(&original).unwrap();
        let decoded: Timing = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_to_vec_named_produces_map_format() {
        let encoded = MsgPackCodec::encode(&Timing {
            index: 0,
            transform_time_ms: 0,
            variant: String::new(),
        })
        .unwrap();

        // fixmap with 3 entries, not fixarray (0x93)
        assert_eq!(encoded[0], 0x83, "Expected map format, got {:02X}", encoded[0]);
    }

    #[test]
    fn test_ordered_map_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("gray".to_string(), 1u32);
        map.insert("edges".to_string(), 2u32);

        let encoded = MsgPackCodec::encode(&map).unwrap();
        let decoded: BTreeMap<String, u32> = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<Timing> = MsgPackCodec::decode(b"not valid msgpack");
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let encoded = MsgPackCodec::encode(&vec!["a", "b"]).unwrap();
        let result: Result<Timing> = MsgPackCodec::decode(&encoded);
        assert!(result.is_err());
    }

    #[test]
    fn test_byte_buffers_use_bin_format() {
        let data: Vec<u8> = vec![0x01, 0x02, 0x03, 0x04, 0x05];
        let encoded = MsgPackCodec::encode(&serde_bytes::Bytes::new(&data)).unwrap();

        // bin8 marker + length, not an array of integers
        assert_eq!(encoded[0], 0xc4, "Expected bin8 format");
        assert_eq!(encoded.len(), 2 + data.len());

        let decoded: serde_bytes::ByteBuf = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded.as_ref(), &data);
    }
}
