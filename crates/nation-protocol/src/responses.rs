//! Messages received from the reader.

use std::fmt;

use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::Frame;
use crate::types::Epc;

/// A tag seen during inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReport {
    /// The tag's EPC.
    pub epc: Epc,
    /// Antenna the tag was read on. Zero when the report omits it.
    pub antenna_id: u8,
}

impl TagReport {
    /// Uppercase hex EPC.
    pub fn epc_hex(&self) -> String {
        self.epc.to_hex()
    }

    /// Decode a tag report payload.
    ///
    /// ```text
    /// epc_len (2, BE) | epc[epc_len] | reserved (2) | antenna (1)
    /// ```
    pub fn decode(payload: &[u8]) -> ProtocolResult<Self> {
        if payload.len() < 2 {
            return Err(ProtocolError::FrameTooShort {
                expected: 2,
                actual: payload.len(),
            });
        }

        let epc_len = u16::from_be_bytes([payload[0], payload[1]]) as usize;
        let epc_end = 2 + epc_len;
        if payload.len() < epc_end {
            return Err(ProtocolError::FrameTooShort {
                expected: epc_end,
                actual: payload.len(),
            });
        }

        let antenna_id = payload.get(epc_end + 2).copied().unwrap_or(0);

        Ok(TagReport {
            epc: Epc::from(&payload[2..epc_end]),
            antenna_id,
        })
    }
}

/// Outcome of a write command, as reported by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteResult {
    /// The EPC was written.
    Success,
    /// No tag matching the filter answered.
    TagOutOfRange,
    /// The reader rejected a parameter.
    InvalidParameter,
    /// Wrong access password or locked memory.
    PasswordOrLockError,
    /// Any other result code.
    UnknownError(u8),
}

impl WriteResult {
    /// Decode a write response payload.
    pub fn decode(payload: &[u8]) -> ProtocolResult<Self> {
        payload
            .first()
            .map(|&code| WriteResult::from(code))
            .ok_or(ProtocolError::FrameTooShort {
                expected: 1,
                actual: 0,
            })
    }

    /// Whether the write succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, WriteResult::Success)
    }

    /// Convert into a `Result`, rejecting anything but success.
    pub fn into_result(self) -> ProtocolResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(ProtocolError::WriteRejected(self))
        }
    }
}

impl fmt::Display for WriteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteResult::Success => write!(f, "success"),
            WriteResult::TagOutOfRange => write!(f, "tag out of range"),
            WriteResult::InvalidParameter => write!(f, "invalid parameter"),
            WriteResult::PasswordOrLockError => write!(f, "wrong password or memory locked"),
            WriteResult::UnknownError(code) => write!(f, "unknown error (0x{:02X})", code),
        }
    }
}

impl From<u8> for WriteResult {
    fn from(code: u8) -> Self {
        match code {
            WRITE_RESULT_SUCCESS => WriteResult::Success,
            WRITE_RESULT_TAG_OUT_OF_RANGE => WriteResult::TagOutOfRange,
            WRITE_RESULT_INVALID_PARAMETER => WriteResult::InvalidParameter,
            WRITE_RESULT_PASSWORD_OR_LOCK => WriteResult::PasswordOrLockError,
            _ => WriteResult::UnknownError(code),
        }
    }
}

impl From<WriteResult> for u8 {
    fn from(result: WriteResult) -> Self {
        match result {
            WriteResult::Success => WRITE_RESULT_SUCCESS,
            WriteResult::TagOutOfRange => WRITE_RESULT_TAG_OUT_OF_RANGE,
            WriteResult::InvalidParameter => WRITE_RESULT_INVALID_PARAMETER,
            WriteResult::PasswordOrLockError => WRITE_RESULT_PASSWORD_OR_LOCK,
            WriteResult::UnknownError(code) => code,
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Tag seen during inventory (0x02/0x00).
    TagReport(TagReport),
    /// Result of a write command (0x02/0x11).
    WriteResult(WriteResult),
    /// Any other (category, message id) pair, kept intact.
    Unrecognized(Frame),
}

impl Message {
    /// Classify and decode a frame.
    ///
    /// Unknown pairs are not an error; a known pair with a malformed payload is.
    pub fn decode(frame: &Frame) -> ProtocolResult<Self> {
        match (frame.category(), frame.message_id()) {
            (CATEGORY_RFID, MID_TAG_REPORT) => TagReport::decode(frame.payload()).map(Message::TagReport),
            (CATEGORY_RFID, MID_WRITE_EPC) => WriteResult::decode(frame.payload()).map(Message::WriteResult),
            _ => Ok(Message::Unrecognized(frame.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_report_payload(epc: &[u8], antenna: u8) -> Vec<u8> {
        let mut payload = (epc.len() as u16).to_be_bytes().to_vec();
        payload.extend_from_slice(epc);
        payload.extend_from_slice(&[0x30, 0x00]);
        payload.push(antenna);
        payload
    }

    #[test]
    fn test_decode_tag_report() {
        let epc = [0xE2, 0x80, 0x11, 0x70, 0x00, 0x00, 0x02, 0x0A, 0x1B, 0x2C, 0x3D, 0x4E];
        let frame = Frame::new(0x02, 0x00, tag_report_payload(&epc, 3)).unwrap();
        match Message::decode(&frame).unwrap() {
            Message::TagReport(report) => {
                assert_eq!(report.epc_hex(), "E28011700000020A1B2C3D4E");
                assert_eq!(report.antenna_id, 3);
            }
            other => panic!("expected tag report, got {:?}", other),
        }
    }

    #[test]
    fn test_tag_report_too_short() {
        assert_eq!(
            TagReport::decode(&[0x00, 0x0C, 0xE2, 0x80]),
            Err(ProtocolError::FrameTooShort {
                expected: 14,
                actual: 4
            })
        );
        assert!(TagReport::decode(&[0x00]).is_err());
    }

    #[test]
    fn test_tag_report_without_antenna() {
        let report = TagReport::decode(&[0x00, 0x02, 0xAB, 0xCD]).unwrap();
        assert_eq!(report.epc_hex(), "ABCD");
        assert_eq!(report.antenna_id, 0);
    }

    #[test]
    fn test_write_result_codes() {
        assert_eq!(WriteResult::from(0x00), WriteResult::Success);
        assert_eq!(WriteResult::from(0x10), WriteResult::TagOutOfRange);
        assert_eq!(WriteResult::from(0x03), WriteResult::InvalidParameter);
        assert_eq!(WriteResult::from(0x08), WriteResult::PasswordOrLockError);
        assert_eq!(WriteResult::from(0x42), WriteResult::UnknownError(0x42));
        assert_eq!(u8::from(WriteResult::UnknownError(0x42)), 0x42);
    }

    #[test]
    fn test_write_result_into_result() {
        assert!(WriteResult::Success.into_result().is_ok());
        assert_eq!(
            WriteResult::TagOutOfRange.into_result(),
            Err(ProtocolError::WriteRejected(WriteResult::TagOutOfRange))
        );
    }

    #[test]
    fn test_decode_write_response() {
        let frame = Frame::new(0x02, 0x11, vec![0x10]).unwrap();
        assert_eq!(
            Message::decode(&frame).unwrap(),
            Message::WriteResult(WriteResult::TagOutOfRange)
        );
        let empty = Frame::new(0x02, 0x11, Vec::new()).unwrap();
        assert!(Message::decode(&empty).is_err());
    }

    #[test]
    fn test_unrecognized_frame() {
        let frame = Frame::new(0x01, 0x12, vec![0xAA]).unwrap();
        assert_eq!(Message::decode(&frame).unwrap(), Message::Unrecognized(frame));
        let stop_ack = Frame::new(0x02, 0xFF, vec![0x00]).unwrap();
        assert!(matches!(Message::decode(&stop_ack), Ok(Message::Unrecognized(_))));
    }
}
