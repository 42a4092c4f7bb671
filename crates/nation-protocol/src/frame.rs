//! Frame encoding/decoding utilities.
//!
//! Every message travels in the same frame:
//!
//! ```text
//! +------+--------+--------+-----+-----+--------+--------+-------------+--------+--------+
//! | 0x5A | pcw_hi | pcw_lo | cat | mid | len_hi | len_lo | data[0..len]| crc_hi | crc_lo |
//! +------+--------+--------+-----+-----+--------+--------+-------------+--------+--------+
//! ```
//!
//! The CRC covers everything between the sync byte and the end of the payload.

use std::fmt;

use bytes::{BufMut, Bytes};

use crate::constants::*;
use crate::crc::crc16_ccitt;
use crate::error::{ProtocolError, ProtocolResult};

/// A validated protocol frame: category, message id and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    category: u8,
    message_id: u8,
    payload: Bytes,
}

impl Frame {
    /// Create a frame. Fails if the payload does not fit the length field.
    pub fn new(category: u8, message_id: u8, payload: impl Into<Bytes>) -> ProtocolResult<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLong {
                max: MAX_PAYLOAD_SIZE,
                actual: payload.len(),
            });
        }
        Ok(Frame {
            category,
            message_id,
            payload,
        })
    }

    /// Build a frame from a payload already known to fit the length field.
    pub(crate) fn from_parts(category: u8, message_id: u8, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD_SIZE);
        Frame {
            category,
            message_id,
            payload: Bytes::from(payload),
        }
    }

    /// Category byte.
    pub fn category(&self) -> u8 {
        self.category
    }

    /// Message id byte.
    pub fn message_id(&self) -> u8 {
        self.message_id
    }

    /// Payload bytes.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whether this frame carries the given (category, message id) pair.
    pub fn is(&self, category: u8, message_id: u8) -> bool {
        self.category == category && self.message_id == message_id
    }

    /// Size of the frame on the wire.
    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Encode the frame for transmission.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.put_u8(FRAME_SYNC);
        buf.put_slice(&PROTOCOL_CONTROL_WORD);
        buf.put_u8(self.category);
        buf.put_u8(self.message_id);
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
        let crc = crc16_ccitt(&buf[1..]);
        buf.put_u16(crc);
        buf
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}/{:02X} [{}]",
            self.category,
            self.message_id,
            hex::encode_upper(&self.payload)
        )
    }
}

/// Why a decode attempt asked the caller to drop bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncReason {
    /// No sync byte anywhere in the buffer.
    SyncLost,
    /// Bytes before the first sync byte.
    LeadingGarbage,
    /// A complete candidate frame failed its checksum.
    CrcMismatch {
        /// CRC computed over the candidate.
        computed: u16,
        /// CRC carried by the candidate.
        received: u16,
        /// Declared size of the candidate frame.
        frame_len: usize,
    },
}

/// Result of one decode attempt on a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A frame starts at offset 0 and validated.
    Decoded {
        /// The frame.
        frame: Frame,
        /// Bytes it occupied.
        consumed: usize,
    },
    /// The buffer holds the start of a frame but not all of it.
    NeedMoreData,
    /// The caller must drop `drop` bytes from the front and try again.
    Resync {
        /// Bytes to discard.
        drop: usize,
        /// Why.
        reason: ResyncReason,
    },
}

/// Stateless frame encoder/decoder.
///
/// Buffering of partial input is handled by [`StreamReassembler`](crate::StreamReassembler).
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl FrameCodec {
    /// Encode a (category, message id, payload) triple.
    pub fn encode(category: u8, message_id: u8, payload: &[u8]) -> ProtocolResult<Vec<u8>> {
        Ok(Frame::new(category, message_id, Bytes::copy_from_slice(payload))?.encode())
    }

    /// Try to decode one frame from the front of `buf`.
    ///
    /// Garbage ahead of the sync byte is reported as a resync rather than
    /// skipped silently, so the caller always knows what it discarded. A
    /// checksum failure asks for a single byte to be dropped; the caller may
    /// drop the whole candidate instead using the length in the reason.
    pub fn try_decode(buf: &[u8]) -> DecodeOutcome {
        if buf.is_empty() {
            return DecodeOutcome::NeedMoreData;
        }

        match buf.iter().position(|&b| b == FRAME_SYNC) {
            None => {
                return DecodeOutcome::Resync {
                    drop: buf.len(),
                    reason: ResyncReason::SyncLost,
                }
            }
            Some(0) => {}
            Some(offset) => {
                return DecodeOutcome::Resync {
                    drop: offset,
                    reason: ResyncReason::LeadingGarbage,
                }
            }
        }

        if buf.len() < HEADER_SIZE {
            return DecodeOutcome::NeedMoreData;
        }

        let len = u16::from_be_bytes([buf[5], buf[6]]) as usize;
        let total = FRAME_OVERHEAD + len;
        if buf.len() < total {
            return DecodeOutcome::NeedMoreData;
        }

        let crc_offset = HEADER_SIZE + len;
        let computed = crc16_ccitt(&buf[1..crc_offset]);
        let received = u16::from_be_bytes([buf[crc_offset], buf[crc_offset + 1]]);
        if computed != received {
            return DecodeOutcome::Resync {
                drop: 1,
                reason: ResyncReason::CrcMismatch {
                    computed,
                    received,
                    frame_len: total,
                },
            };
        }

        DecodeOutcome::Decoded {
            frame: Frame {
                category: buf[3],
                message_id: buf[4],
                payload: Bytes::copy_from_slice(&buf[HEADER_SIZE..crc_offset]),
            },
            consumed: total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_start_inventory_frame() {
        let encoded = FrameCodec::encode(0x02, 0x10, &[0x00, 0x00, 0x00, 0x01, 0x01]).unwrap();
        assert_eq!(
            encoded,
            vec![0x5A, 0x00, 0x01, 0x02, 0x10, 0x00, 0x05, 0x00, 0x00, 0x00, 0x01, 0x01, 0xF4, 0x87]
        );
    }

    #[test]
    fn test_encode_empty_payload() {
        let encoded = FrameCodec::encode(0x02, 0xFF, &[]).unwrap();
        assert_eq!(encoded, vec![0x5A, 0x00, 0x01, 0x02, 0xFF, 0x00, 0x00, 0x88, 0x5A]);
        assert_eq!(encoded.len(), FRAME_OVERHEAD);
    }

    #[test]
    fn test_decode_roundtrip() {
        let cases: [(u8, u8, &[u8]); 4] = [
            (0x02, 0x00, &[0x00, 0x02, 0xAB, 0xCD, 0x30, 0x00, 0x01]),
            (0x02, 0xFF, &[]),
            (0x01, 0x12, &[0x5A, 0x5A, 0x5A]),
            (0xFF, 0xFF, &[0xFF; 300]),
        ];
        for (category, message_id, payload) in cases {
            let encoded = FrameCodec::encode(category, message_id, payload).unwrap();
            match FrameCodec::try_decode(&encoded) {
                DecodeOutcome::Decoded { frame, consumed } => {
                    assert_eq!(consumed, encoded.len());
                    assert_eq!(frame.category(), category);
                    assert_eq!(frame.message_id(), message_id);
                    assert_eq!(&frame.payload()[..], payload);
                }
                other => panic!("expected decoded frame, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_decode_partial_header_and_body() {
        let encoded = FrameCodec::encode(0x02, 0x10, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(FrameCodec::try_decode(&encoded[..1]), DecodeOutcome::NeedMoreData);
        assert_eq!(FrameCodec::try_decode(&encoded[..6]), DecodeOutcome::NeedMoreData);
        assert_eq!(
            FrameCodec::try_decode(&encoded[..encoded.len() - 1]),
            DecodeOutcome::NeedMoreData
        );
    }

    #[test]
    fn test_decode_leading_garbage() {
        let mut data = vec![0x01, 0x02, 0x03];
        data.extend(FrameCodec::encode(0x02, 0xFF, &[]).unwrap());
        assert_eq!(
            FrameCodec::try_decode(&data),
            DecodeOutcome::Resync {
                drop: 3,
                reason: ResyncReason::LeadingGarbage
            }
        );
    }

    #[test]
    fn test_decode_no_sync() {
        assert_eq!(
            FrameCodec::try_decode(&[0x00, 0x11, 0x22]),
            DecodeOutcome::Resync {
                drop: 3,
                reason: ResyncReason::SyncLost
            }
        );
    }

    #[test]
    fn test_decode_crc_mismatch() {
        let mut encoded = FrameCodec::encode(0x02, 0x11, &[0x00]).unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        match FrameCodec::try_decode(&encoded) {
            DecodeOutcome::Resync {
                drop,
                reason: ResyncReason::CrcMismatch { frame_len, .. },
            } => {
                assert_eq!(drop, 1);
                assert_eq!(frame_len, encoded.len());
            }
            other => panic!("expected CRC mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_too_long() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            FrameCodec::encode(0x02, 0x10, &payload),
            Err(ProtocolError::PayloadTooLong { .. })
        ));
    }

    #[test]
    fn test_frame_display() {
        let frame = Frame::new(0x02, 0x11, vec![0x10]).unwrap();
        assert_eq!(frame.to_string(), "02/11 [10]");
        assert!(frame.is(CATEGORY_RFID, MID_WRITE_EPC));
    }
}
