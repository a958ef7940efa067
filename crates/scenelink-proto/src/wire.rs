// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Binary framing and CBOR helpers for session sockets.
//!
//! Packet layout:
//!
//! ``MAGIC(4) || VERSION(2) || FLAGS(2) || LENGTH(4) || PAYLOAD || CHECKSUM(32)``
//!
//! * PAYLOAD is one CBOR-encoded event (`UplinkEvent` or `DownlinkEvent`)
//! * CHECKSUM = blake3-256 over HEADER (first 12 bytes) || PAYLOAD

use blake3::Hasher;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{DownlinkEvent, UplinkEvent};

/// Protocol magic constant "SCNL".
pub const MAGIC: [u8; 4] = [0x53, 0x43, 0x4e, 0x4c];
/// Wire protocol version (big-endian u16).
pub const VERSION: u16 = 0x0001;
/// Reserved flags (zero).
pub const FLAGS: u16 = 0x0000;
/// Header length in bytes.
pub const HEADER_BYTES: usize = 12;
/// Trailing checksum length in bytes.
pub const CHECKSUM_BYTES: usize = 32;
/// Default cap on payload size.
pub const DEFAULT_MAX_PAYLOAD: usize = 8 * 1024 * 1024;

/// Framing or payload failure.
#[derive(Debug, Error)]
pub enum WireError {
    /// Fewer bytes than the header/length announce.
    #[error("incomplete packet")]
    Incomplete,
    /// Magic bytes mismatch.
    #[error("bad magic")]
    BadMagic,
    /// Version other than [`VERSION`].
    #[error("unsupported version {0:#06x}")]
    UnsupportedVersion(u16),
    /// Payload larger than the configured cap.
    #[error("payload too large ({len} > {max})")]
    TooLarge {
        /// Announced payload length.
        len: usize,
        /// Configured cap.
        max: usize,
    },
    /// Checksum does not cover header||payload.
    #[error("checksum mismatch")]
    Checksum,
    /// CBOR serialization failed.
    #[error("cbor encode: {0}")]
    Encode(String),
    /// CBOR deserialization failed.
    #[error("cbor decode: {0}")]
    Decode(String),
}

/// Encode to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|e| WireError::Encode(e.to_string()))?;
    Ok(out)
}

/// Decode from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    ciborium::de::from_reader(bytes).map_err(|e| WireError::Decode(e.to_string()))
}

/// A full packet (header + payload + checksum).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Raw header.
    pub header: [u8; HEADER_BYTES],
    /// CBOR payload bytes.
    pub payload: Vec<u8>,
    /// blake3 checksum over header||payload.
    pub checksum: [u8; CHECKSUM_BYTES],
}

impl Packet {
    /// Build a packet around a CBOR payload.
    pub fn from_payload(payload: Vec<u8>) -> Result<Self, WireError> {
        let len = u32::try_from(payload.len()).map_err(|_| WireError::TooLarge {
            len: payload.len(),
            max: u32::MAX as usize,
        })?;
        let mut header = [0u8; HEADER_BYTES];
        header[0..4].copy_from_slice(&MAGIC);
        header[4..6].copy_from_slice(&VERSION.to_be_bytes());
        header[6..8].copy_from_slice(&FLAGS.to_be_bytes());
        header[8..12].copy_from_slice(&len.to_be_bytes());

        let checksum = digest(&header, &payload);
        Ok(Packet {
            header,
            payload,
            checksum,
        })
    }

    /// Concatenate header, payload and checksum.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_BYTES + self.payload.len() + CHECKSUM_BYTES);
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.checksum);
        out
    }
}

fn digest(header: &[u8], payload: &[u8]) -> [u8; CHECKSUM_BYTES] {
    let mut hasher = Hasher::new();
    hasher.update(header);
    hasher.update(payload);
    *hasher.finalize().as_bytes()
}

/// Total packet length announced by the header at the start of `buf`.
///
/// `Ok(None)` while fewer than [`HEADER_BYTES`] are buffered. Used by stream
/// readers to know how many bytes to wait for. A header with the wrong magic
/// or version, or an oversized length, is an error: the stream cannot be
/// resynchronised after it.
pub fn frame_len(buf: &[u8], max_payload: usize) -> Result<Option<usize>, WireError> {
    if buf.len() < HEADER_BYTES {
        return Ok(None);
    }
    if buf[0..4] != MAGIC {
        return Err(WireError::BadMagic);
    }
    let version = u16::from_be_bytes([buf[4], buf[5]]);
    if version != VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let payload_len = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;
    if payload_len > max_payload {
        return Err(WireError::TooLarge {
            len: payload_len,
            max: max_payload,
        });
    }
    Ok(Some(HEADER_BYTES + payload_len + CHECKSUM_BYTES))
}

/// Serialize `value` and wrap it in a packet.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    Ok(Packet::from_payload(to_cbor(value)?)?.into_bytes())
}

/// Verify and decode one packet at the start of `bytes`; returns the value
/// and the number of bytes consumed.
pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8]) -> Result<(T, usize), WireError> {
    if bytes.len() < HEADER_BYTES + CHECKSUM_BYTES {
        return Err(WireError::Incomplete);
    }
    if bytes[0..4] != MAGIC {
        return Err(WireError::BadMagic);
    }
    let version = u16::from_be_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let len = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    if bytes.len() < HEADER_BYTES + len + CHECKSUM_BYTES {
        return Err(WireError::Incomplete);
    }
    let header = &bytes[0..HEADER_BYTES];
    let payload = &bytes[HEADER_BYTES..HEADER_BYTES + len];
    let checksum = &bytes[HEADER_BYTES + len..HEADER_BYTES + len + CHECKSUM_BYTES];
    if digest(header, payload) != checksum {
        return Err(WireError::Checksum);
    }
    let value = from_cbor(payload)?;
    Ok((value, HEADER_BYTES + len + CHECKSUM_BYTES))
}

/// Frame a client event.
pub fn encode_uplink(event: &UplinkEvent) -> Result<Vec<u8>, WireError> {
    encode_frame(event)
}

/// Decode a client event (server side / loopback tests).
pub fn decode_uplink(bytes: &[u8]) -> Result<(UplinkEvent, usize), WireError> {
    decode_frame(bytes)
}

/// Frame a server event (server side / loopback tests).
pub fn encode_downlink(event: &DownlinkEvent) -> Result<Vec<u8>, WireError> {
    encode_frame(event)
}

/// Decode a server event.
pub fn decode_downlink(bytes: &[u8]) -> Result<(DownlinkEvent, usize), WireError> {
    decode_frame(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{etype, Value};

    #[test]
    fn frame_carries_length_and_checksum() {
        let bytes = encode_uplink(&UplinkEvent::session_start()).unwrap();
        assert_eq!(&bytes[0..4], &MAGIC);
        let total = frame_len(&bytes, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(total, bytes.len());
        let (back, used) = decode_uplink(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(back.etype, etype::INIT);
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut bytes = encode_downlink(&DownlinkEvent::new(etype::SET)).unwrap();
        bytes[HEADER_BYTES] ^= 0xff;
        assert!(matches!(decode_downlink(&bytes), Err(WireError::Checksum)));
    }

    #[test]
    fn truncated_packet_is_incomplete() {
        let bytes = encode_downlink(&DownlinkEvent::new(etype::SET)).unwrap();
        assert!(matches!(
            decode_downlink(&bytes[..bytes.len() - 1]),
            Err(WireError::Incomplete)
        ));
        assert!(frame_len(&bytes[..HEADER_BYTES - 1], 16).unwrap().is_none());
    }

    #[test]
    fn oversized_payload_is_rejected_from_header() {
        let event = DownlinkEvent::new(etype::SET).with_data(Value::Bytes(vec![0u8; 64]));
        let bytes = encode_downlink(&event).unwrap();
        assert!(matches!(
            frame_len(&bytes, 8),
            Err(WireError::TooLarge { max: 8, .. })
        ));
    }

    #[test]
    fn consecutive_frames_decode_one_at_a_time() {
        let a = encode_downlink(&DownlinkEvent::new("A")).unwrap();
        let b = encode_downlink(&DownlinkEvent::new("B")).unwrap();
        let buf = [a.clone(), b].concat();
        let (first, used) = decode_downlink(&buf).unwrap();
        assert_eq!(first.etype, "A");
        assert_eq!(used, a.len());
        let (second, _) = decode_downlink(&buf[used..]).unwrap();
        assert_eq!(second.etype, "B");
    }

    #[test]
    fn bad_version_is_reported() {
        let mut bytes = encode_downlink(&DownlinkEvent::new("A")).unwrap();
        bytes[5] = 0x09;
        assert!(matches!(
            decode_downlink(&bytes),
            Err(WireError::UnsupportedVersion(0x0009))
        ));
        assert!(matches!(
            frame_len(&bytes, DEFAULT_MAX_PAYLOAD),
            Err(WireError::UnsupportedVersion(0x0009))
        ));
    }
}
