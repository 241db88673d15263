//! Binary envelope framing for gapi microservice messages.
//!
//! Wire format: `[4-byte magic][4-byte little-endian length][JSON][binary]`
//!
//! The length counts the UTF-8 bytes of the JSON segment only. Everything
//! after the JSON segment is the binary payload, which may be empty.

use crate::error::{FramingError, GapiResult};

/// Fixed magic prefix of every envelope (20, 10, 5, 17).
pub const MAGIC: [u8; 4] = [0x14, 0x0A, 0x05, 0x11];

/// Size of the magic plus the length field.
pub const HEADER_LEN: usize = 8;

/// A decoded envelope: a JSON text segment paired with an opaque binary payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub json: String,
    pub binary: Vec<u8>,
}

impl Envelope {
    pub fn new(json: impl Into<String>, binary: impl Into<Vec<u8>>) -> Self {
        Self {
            json: json.into(),
            binary: binary.into(),
        }
    }

    /// An envelope with an empty binary segment.
    pub fn json(json: impl Into<String>) -> Self {
        Self::new(json, Vec::new())
    }

    pub fn has_binary(&self) -> bool {
        !self.binary.is_empty()
    }

    pub fn encode(&self) -> GapiResult<Vec<u8>> {
        frame_encode(&self.json, &self.binary)
    }

    pub fn decode(data: &[u8]) -> GapiResult<Self> {
        frame_decode(data)
    }
}

/// Encode a JSON segment and binary payload into one envelope.
pub fn frame_encode(json: &str, binary: &[u8]) -> GapiResult<Vec<u8>> {
    let json_bytes = json.as_bytes();
    let len = u32::try_from(json_bytes.len())
        .map_err(|_| FramingError::PayloadTooLarge(json_bytes.len()))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + json_bytes.len() + binary.len());
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(json_bytes);
    frame.extend_from_slice(binary);
    Ok(frame)
}

/// Decode a complete envelope.
///
/// The magic is checked before anything else is read, so a bad prefix never
/// reaches the length field.
pub fn frame_decode(data: &[u8]) -> GapiResult<Envelope> {
    if data.len() < MAGIC.len() || data[..MAGIC.len()] != MAGIC {
        return Err(FramingError::InvalidHeader.into());
    }

    let len_bytes: [u8; 4] = data
        .get(4..HEADER_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            FramingError::TruncatedOrInvalidUtf8(format!(
                "length field missing, got {} bytes",
                data.len()
            ))
        })?;
    let json_len = u32::from_le_bytes(len_bytes) as usize;

    let rest = &data[HEADER_LEN..];
    if rest.len() < json_len {
        return Err(FramingError::TruncatedOrInvalidUtf8(format!(
            "declared {json_len} json bytes, only {} available",
            rest.len()
        ))
        .into());
    }

    let (json_bytes, binary) = rest.split_at(json_len);
    let json = std::str::from_utf8(json_bytes)
        .map_err(|e| FramingError::TruncatedOrInvalidUtf8(e.to_string()))?;

    Ok(Envelope {
        json: json.to_string(),
        binary: binary.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GapiError;

    fn framing_err(result: GapiResult<Envelope>) -> FramingError {
        match result {
            Err(GapiError::Framing(e)) => e,
            other => panic!("expected framing error, got {other:?}"),
        }
    }

    #[test]
    fn encode_layout() {
        let frame = frame_encode(r#"{"a":1}"#, &[0x01, 0x02]).unwrap();
        assert_eq!(&frame[..4], &MAGIC);
        assert_eq!(&frame[4..8], &7u32.to_le_bytes());
        assert_eq!(&frame[8..15], br#"{"a":1}"#);
        assert_eq!(&frame[15..], &[0x01, 0x02]);
    }

    #[test]
    fn round_trip_with_binary() {
        let env = Envelope::new(r#"{"a":1}"#, vec![0x01, 0x02]);
        let decoded = Envelope::decode(&env.encode().unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn round_trip_empty_binary() {
        let env = Envelope::json(r#"{"apiServiceName":"x"}"#);
        let frame = env.encode().unwrap();
        assert_eq!(frame.len(), HEADER_LEN + env.json.len());
        let decoded = Envelope::decode(&frame).unwrap();
        assert_eq!(decoded, env);
        assert!(!decoded.has_binary());
    }

    #[test]
    fn length_counts_utf8_bytes() {
        let json = r#"{"name":"café ☕"}"#;
        let frame = frame_encode(json, &[]).unwrap();
        let declared = u32::from_le_bytes(frame[4..8].try_into().unwrap()) as usize;
        assert_eq!(declared, json.len());
        assert!(declared > json.chars().count());
        assert_eq!(frame_decode(&frame).unwrap().json, json);
    }

    #[test]
    fn binary_segment_may_look_like_json() {
        let env = Envelope::new("{}", b"{\"not\":\"json segment\"}".to_vec());
        assert_eq!(Envelope::decode(&env.encode().unwrap()).unwrap(), env);
    }

    #[test]
    fn round_trip_sweep() {
        let padded = |n: usize| format!("\"{}\"", "x".repeat(n - 2));
        let json_cases = vec![
            String::new(),
            "1".to_string(),
            padded(255),
            padded(256),
            padded(65_536),
            r#"{"greeting":"héllo wörld","emoji":"🦀☕","cjk":"漢字"}"#.to_string(),
            format!("[{}]", vec!["\"ü\""; 1_000].join(",")),
        ];
        let binary_cases: Vec<Vec<u8>> = vec![
            Vec::new(),
            vec![0x00],
            (0..=255).collect(),
            MAGIC.repeat(3),
            (0..1_048_576u32).map(|i| (i % 251) as u8).collect(),
        ];

        for json in &json_cases {
            for binary in &binary_cases {
                let frame = frame_encode(json, binary).unwrap();
                assert_eq!(frame.len(), HEADER_LEN + json.len() + binary.len());
                let env = frame_decode(&frame).unwrap();
                assert_eq!(&env.json, json, "json of {} bytes", json.len());
                assert_eq!(&env.binary, binary, "binary of {} bytes", binary.len());
            }
        }
    }

    #[test]
    fn invalid_magic() {
        let mut frame = frame_encode("{}", &[]).unwrap();
        frame[0] = 0x15;
        assert_eq!(framing_err(frame_decode(&frame)), FramingError::InvalidHeader);
    }

    #[test]
    fn short_buffer_is_invalid_header() {
        assert_eq!(framing_err(frame_decode(&[])), FramingError::InvalidHeader);
        assert_eq!(
            framing_err(frame_decode(&[0x14, 0x0A, 0x05])),
            FramingError::InvalidHeader
        );
    }

    #[test]
    fn magic_without_length_is_truncated() {
        let err = framing_err(frame_decode(&[0x14, 0x0A, 0x05, 0x11, 0x01]));
        assert!(matches!(err, FramingError::TruncatedOrInvalidUtf8(_)));
    }

    #[test]
    fn declared_length_exceeds_buffer() {
        let mut frame = frame_encode(r#"{"a":1}"#, &[]).unwrap();
        frame.pop();
        let err = framing_err(frame_decode(&frame));
        assert!(matches!(err, FramingError::TruncatedOrInvalidUtf8(_)));

        let mut huge = MAGIC.to_vec();
        huge.extend_from_slice(&u32::MAX.to_le_bytes());
        huge.extend_from_slice(b"{}");
        let err = framing_err(frame_decode(&huge));
        assert!(matches!(err, FramingError::TruncatedOrInvalidUtf8(_)));
    }

    #[test]
    fn invalid_utf8_json_segment() {
        let mut frame = MAGIC.to_vec();
        frame.extend_from_slice(&2u32.to_le_bytes());
        frame.extend_from_slice(&[0xC3, 0x28]);
        let err = framing_err(frame_decode(&frame));
        assert!(matches!(err, FramingError::TruncatedOrInvalidUtf8(_)));
    }

    #[test]
    fn zero_length_json() {
        let mut frame = MAGIC.to_vec();
        frame.extend_from_slice(&0u32.to_le_bytes());
        frame.extend_from_slice(&[0xFF]);
        let env = frame_decode(&frame).unwrap();
        assert_eq!(env.json, "");
        assert_eq!(env.binary, vec![0xFF]);
    }
}
