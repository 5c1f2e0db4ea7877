//! MAVLink v2 frame codec.
//!
//! Wire format:
//! ```text
//! [0xFD][len:1][incompat:1][compat:1][seq:1][sysid:1][compid:1][msgid:3][payload:len][crc:2][signature:13?]
//! ```
//! Header size: 10 bytes.  Multi-byte integers are little-endian.  The
//! checksum is X.25 over everything after the magic byte up to the end of the
//! payload, followed by the message's CRC extra.  Trailing zero bytes of the
//! payload are stripped on encode (at least one byte is always kept) and
//! restored by [`Message::decode`].
//!
//! The signature block (present when incompat flag `0x01` is set) is consumed
//! but not verified; this codec never signs outgoing frames.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::protocol::crc::X25Crc;
use crate::protocol::dialect::Dialect;
use crate::protocol::messages::Message;

/// Start-of-frame marker for MAVLink v2.
pub const MAGIC_V2: u8 = 0xFD;

/// Header length including the magic byte.
pub const HEADER_LEN: usize = 10;

/// Checksum length.
pub const CHECKSUM_LEN: usize = 2;

/// Signature block length.
pub const SIGNATURE_LEN: usize = 13;

/// Incompatibility flag: frame carries a signature.
pub const INCOMPAT_FLAG_SIGNED: u8 = 0x01;

/// Largest frame the codec can produce or accept.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + u8::MAX as usize + CHECKSUM_LEN + SIGNATURE_LEN;

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The buffer is shorter than the frame it starts.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The buffer does not start with the v2 magic byte.
    #[error("bad magic byte: 0x{0:02X}")]
    BadMagic(u8),

    /// The frame is well-formed but its message id is not in the dialect, so
    /// the checksum cannot be verified.  `skip` is the frame length.
    #[error("unknown message id {id} ({skip} byte frame)")]
    UnknownMessage { id: u32, skip: usize },

    /// The checksum does not match the header, payload, and CRC extra.
    #[error("checksum mismatch for message id {id}: frame has 0x{received:04X}, computed 0x{computed:04X}")]
    ChecksumMismatch {
        id: u32,
        received: u16,
        computed: u16,
    },

    /// The payload does not fit the message definition.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Header fields of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub incompat_flags: u8,
    pub compat_flags: u8,
    pub sequence: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub message_id: u32,
}

/// One decoded frame: header plus the payload as it appeared on the wire
/// (possibly truncated).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Decodes the payload into a typed [`Message`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownMessage`] if the dialect lacks the id,
    /// or [`ProtocolError::MalformedPayload`] if the payload is oversized.
    pub fn message(&self, dialect: &Dialect) -> Result<Message, ProtocolError> {
        let id = self.header.message_id;
        let def = dialect.get(id).ok_or(ProtocolError::UnknownMessage {
            id,
            skip: HEADER_LEN + self.payload.len() + CHECKSUM_LEN,
        })?;
        Message::decode(def, &self.payload)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Message`] into one complete frame.
///
/// The sequence number is **not** chosen by this function; pass the next
/// value from a [`crate::protocol::SequenceCounter`].
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the payload exceeds 255 bytes.
///
/// # Examples
///
/// ```rust
/// use navlink_core::protocol::{decode_frame, encode_message, Dialect, Message};
///
/// let dialect = Dialect::navlink();
/// let bytes = encode_message(&Message::heartbeat(), 0, 251, 1).unwrap();
/// let (frame, consumed) = decode_frame(&bytes, &dialect).unwrap();
/// assert_eq!(consumed, bytes.len());
/// assert_eq!(frame.header.system_id, 251);
/// assert_eq!(frame.message(&dialect).unwrap(), Message::heartbeat());
/// ```
pub fn encode_message(
    msg: &Message,
    sequence: u8,
    system_id: u8,
    component_id: u8,
) -> Result<Vec<u8>, ProtocolError> {
    let header = FrameHeader {
        incompat_flags: 0,
        compat_flags: 0,
        sequence,
        system_id,
        component_id,
        message_id: msg.id(),
    };
    encode_frame(&header, &msg.encode_payload(), msg.def().crc_extra)
}

/// Encodes a raw payload into one frame, truncating trailing zeros.
///
/// The signed flag is always cleared since no signature is appended.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the payload exceeds 255 bytes.
pub fn encode_frame(
    header: &FrameHeader,
    payload: &[u8],
    crc_extra: u8,
) -> Result<Vec<u8>, ProtocolError> {
    let trimmed = truncate_payload(payload);
    let len = u8::try_from(trimmed.len()).map_err(|_| {
        ProtocolError::MalformedPayload(format!(
            "payload of {} bytes exceeds 255",
            trimmed.len()
        ))
    })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + trimmed.len() + CHECKSUM_LEN);
    buf.push(MAGIC_V2);
    buf.push(len);
    buf.push(header.incompat_flags & !INCOMPAT_FLAG_SIGNED);
    buf.push(header.compat_flags);
    buf.push(header.sequence);
    buf.push(header.system_id);
    buf.push(header.component_id);
    buf.extend_from_slice(&header.message_id.to_le_bytes()[..3]);
    buf.extend_from_slice(trimmed);

    let checksum = frame_checksum(&buf[1..], crc_extra);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the frame and the total number of bytes consumed (header, payload,
/// checksum, and signature if present), so the caller can advance its cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are not a complete, valid frame of a
/// message known to `dialect`.
pub fn decode_frame(bytes: &[u8], dialect: &Dialect) -> Result<(Frame, usize), ProtocolError> {
    let magic = *bytes.first().ok_or(ProtocolError::InsufficientData {
        needed: HEADER_LEN,
        available: 0,
    })?;
    if magic != MAGIC_V2 {
        return Err(ProtocolError::BadMagic(magic));
    }
    require_len(bytes, HEADER_LEN)?;

    let payload_len = bytes[1] as usize;
    let incompat_flags = bytes[2];
    let signed = incompat_flags & INCOMPAT_FLAG_SIGNED != 0;
    let checked_len = HEADER_LEN + payload_len + CHECKSUM_LEN;
    let frame_len = checked_len + if signed { SIGNATURE_LEN } else { 0 };
    require_len(bytes, frame_len)?;

    let message_id = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], 0]);
    let def = dialect.get(message_id).ok_or(ProtocolError::UnknownMessage {
        id: message_id,
        skip: frame_len,
    })?;

    let payload_end = HEADER_LEN + payload_len;
    let computed = frame_checksum(&bytes[1..payload_end], def.crc_extra);
    let received = u16::from_le_bytes([bytes[payload_end], bytes[payload_end + 1]]);
    if computed != received {
        return Err(ProtocolError::ChecksumMismatch {
            id: message_id,
            received,
            computed,
        });
    }

    let frame = Frame {
        header: FrameHeader {
            incompat_flags,
            compat_flags: bytes[3],
            sequence: bytes[4],
            system_id: bytes[5],
            component_id: bytes[6],
            message_id,
        },
        payload: bytes[HEADER_LEN..payload_end].to_vec(),
    };
    Ok((frame, frame_len))
}

/// Splits one received datagram into frames.
///
/// Bytes before a magic marker are skipped.  A frame that fails its checksum
/// is reported and scanning resumes one byte later, so a stray `0xFD` inside
/// garbage cannot swallow a following valid frame.  A frame for an unknown
/// message is skipped whole.  A truncated tail ends the scan.
pub fn split_datagram(bytes: &[u8], dialect: &Dialect) -> Vec<Result<Frame, ProtocolError>> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(offset) = bytes[pos..].iter().position(|&b| b == MAGIC_V2) else {
            debug!(skipped = bytes.len() - pos, "no frame marker in remaining bytes");
            break;
        };
        if offset > 0 {
            debug!(skipped = offset, "skipping bytes before frame marker");
        }
        pos += offset;

        match decode_frame(&bytes[pos..], dialect) {
            Ok((frame, consumed)) => {
                out.push(Ok(frame));
                pos += consumed;
            }
            Err(err @ ProtocolError::UnknownMessage { skip, .. }) => {
                out.push(Err(err));
                pos += skip;
            }
            Err(err @ ProtocolError::InsufficientData { .. }) => {
                out.push(Err(err));
                break;
            }
            Err(err) => {
                out.push(Err(err));
                pos += 1;
            }
        }
    }

    out
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn truncate_payload(payload: &[u8]) -> &[u8] {
    let end = payload
        .iter()
        .rposition(|&b| b != 0)
        .map_or(1, |i| i + 1)
        .min(payload.len());
    &payload[..end]
}

fn frame_checksum(header_and_payload: &[u8], crc_extra: u8) -> u16 {
    let mut crc = X25Crc::new();
    crc.accumulate(header_and_payload);
    crc.accumulate_byte(crc_extra);
    crc.value()
}

fn require_len(buf: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::InsufficientData {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::FieldValue;
    use std::collections::BTreeMap;

    fn check_in(ttl_ms: i64) -> Message {
        let dialect = Dialect::navlink();
        let def = dialect.by_name("CHECK_IN").unwrap();
        let params: BTreeMap<String, FieldValue> = [
            ("boot_id", 123),
            ("msg_seq", 1),
            ("time_ms", 1000),
            ("ttl_ms", ttl_ms),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), FieldValue::Int(v)))
        .collect();
        Message::build(def, &params).unwrap()
    }

    const CHECK_IN_FRAME: [u8; 24] = [
        253, 12, 0, 0, 0, 252, 1, 170, 97, 0, 123, 0, 0, 0, 232, 3, 0, 0, 1, 0, 136, 19, 47, 254,
    ];

    #[test]
    fn test_encode_check_in_matches_reference_bytes() {
        // Act
        let bytes = encode_message(&check_in(5000), 0, 252, 1).unwrap();

        // Assert
        assert_eq!(bytes, CHECK_IN_FRAME);
    }

    #[test]
    fn test_decode_check_in_reference_bytes() {
        // Arrange
        let dialect = Dialect::navlink();

        // Act
        let (frame, consumed) = decode_frame(&CHECK_IN_FRAME, &dialect).unwrap();

        // Assert
        assert_eq!(consumed, CHECK_IN_FRAME.len());
        assert_eq!(frame.header.system_id, 252);
        assert_eq!(frame.header.component_id, 1);
        assert_eq!(frame.header.message_id, 25002);
        assert_eq!(frame.message(&dialect).unwrap(), check_in(5000));
    }

    #[test]
    fn test_encode_heartbeat_matches_reference_bytes() {
        // Arrange – custom_mode 0, type 6, autopilot 8, base_mode 0, status 0, version 3
        let dialect = Dialect::navlink();
        let def = dialect.get(0).unwrap();
        let header = FrameHeader {
            incompat_flags: 0,
            compat_flags: 0,
            sequence: 7,
            system_id: 251,
            component_id: 1,
            message_id: 0,
        };

        // Act
        let bytes = encode_frame(&header, &[0, 0, 0, 0, 6, 8, 0, 0, 3], def.crc_extra).unwrap();

        // Assert
        assert_eq!(
            bytes,
            vec![253, 9, 0, 0, 7, 251, 1, 0, 0, 0, 0, 0, 0, 0, 6, 8, 0, 0, 3, 244, 219]
        );
    }

    #[test]
    fn test_trailing_zeros_are_truncated_and_restored() {
        // Arrange – ttl_ms = 0 puts two zero bytes at the end of the payload
        let dialect = Dialect::navlink();
        let msg = check_in(0);

        // Act
        let bytes = encode_message(&msg, 3, 252, 1).unwrap();
        let (frame, _) = decode_frame(&bytes, &dialect).unwrap();

        // Assert
        assert_eq!(bytes[1], 10);
        assert_eq!(frame.message(&dialect).unwrap(), msg);
    }

    #[test]
    fn test_all_zero_payload_keeps_one_byte() {
        assert_eq!(truncate_payload(&[0, 0, 0]), &[0]);
        assert_eq!(truncate_payload(&[]), &[] as &[u8]);
    }

    #[test]
    fn test_decode_rejects_corrupted_checksum() {
        // Arrange
        let mut bytes = CHECK_IN_FRAME;
        bytes[12] ^= 0xFF;

        // Act
        let result = decode_frame(&bytes, &Dialect::navlink());

        // Assert
        assert!(matches!(
            result,
            Err(ProtocolError::ChecksumMismatch { id: 25002, .. })
        ));
    }

    #[test]
    fn test_decode_reports_insufficient_data_for_partial_frame() {
        let result = decode_frame(&CHECK_IN_FRAME[..15], &Dialect::navlink());
        assert_eq!(
            result,
            Err(ProtocolError::InsufficientData {
                needed: 24,
                available: 15
            })
        );
    }

    #[test]
    fn test_decode_reports_bad_magic() {
        let result = decode_frame(&[0xFE, 9, 0, 0], &Dialect::navlink());
        assert_eq!(result, Err(ProtocolError::BadMagic(0xFE)));
    }

    #[test]
    fn test_decode_reports_unknown_message_with_skip_length() {
        // Arrange – CHECK_IN frame decoded with a dialect that lacks it
        let dialect = Dialect::from_defs([&crate::protocol::dialect::HEARTBEAT]);

        // Act
        let result = decode_frame(&CHECK_IN_FRAME, &dialect);

        // Assert
        assert_eq!(
            result,
            Err(ProtocolError::UnknownMessage {
                id: 25002,
                skip: 24
            })
        );
    }

    #[test]
    fn test_decode_consumes_signature_block() {
        // Arrange – a signed frame: flag set, checksum over the flagged header
        let dialect = Dialect::navlink();
        let mut bytes = CHECK_IN_FRAME[..22].to_vec();
        bytes[2] = INCOMPAT_FLAG_SIGNED;
        let checksum = frame_checksum(&bytes[1..], 153);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        bytes.extend_from_slice(&[0xAA; SIGNATURE_LEN]);

        // Act
        let (frame, consumed) = decode_frame(&bytes, &dialect).unwrap();

        // Assert
        assert_eq!(consumed, 24 + SIGNATURE_LEN);
        assert_eq!(frame.message(&dialect).unwrap(), check_in(5000));
    }

    #[test]
    fn test_split_datagram_resyncs_after_garbage() {
        // Arrange – garbage, a valid frame, a corrupted frame, a valid frame
        let dialect = Dialect::navlink();
        let heartbeat = encode_message(&Message::heartbeat(), 1, 1, 1).unwrap();
        let mut corrupted = CHECK_IN_FRAME.to_vec();
        corrupted[11] ^= 0x01;

        let mut datagram = vec![0x00, 0x42];
        datagram.extend_from_slice(&heartbeat);
        datagram.extend_from_slice(&corrupted);
        datagram.extend_from_slice(&CHECK_IN_FRAME);

        // Act
        let results = split_datagram(&datagram, &dialect);
        let frames: Vec<&Frame> = results.iter().filter_map(|r| r.as_ref().ok()).collect();

        // Assert
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].header.message_id, 0);
        assert_eq!(frames[1].header.message_id, 25002);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ProtocolError::ChecksumMismatch { .. }))));
    }

    #[test]
    fn test_split_datagram_stops_on_truncated_tail() {
        let dialect = Dialect::navlink();
        let mut datagram = CHECK_IN_FRAME.to_vec();
        datagram.extend_from_slice(&CHECK_IN_FRAME[..8]);

        let results = split_datagram(&datagram, &dialect);

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ProtocolError::InsufficientData { .. })
        ));
    }
}
