//! Protocol error types.

use thiserror::Error;

use crate::responses::WriteResult;

/// Errors that can occur when building or interpreting protocol messages.
///
/// Framing conditions (partial data, lost sync, checksum mismatch) are not
/// errors; they are reported as [`DecodeOutcome`](crate::DecodeOutcome) and
/// [`StreamEvent`](crate::StreamEvent) values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload is too short for the fields it declares.
    #[error("payload too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Payload does not fit the 16-bit length field.
    #[error("payload too long: maximum {max} bytes, got {actual}")]
    PayloadTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length.
        actual: usize,
    },

    /// EPC string is not valid hexadecimal.
    #[error("invalid EPC hex: {0}")]
    InvalidHex(String),

    /// New EPC is not a whole number of 16-bit words.
    #[error("EPC length must be a multiple of 4 hex characters, got {hex_len}")]
    InvalidEpcLength {
        /// Number of hex characters supplied.
        hex_len: usize,
    },

    /// New EPC does not fit the PC word length field.
    #[error("EPC too long: {words} words (maximum 31)")]
    EpcTooLong {
        /// Length of the EPC in words.
        words: usize,
    },

    /// Match data does not fit the 1-byte bit length field.
    #[error("match filter too long: {bytes} bytes (maximum 31)")]
    MatchFilterTooLong {
        /// Length of the match data in bytes.
        bytes: usize,
    },

    /// Antenna id outside 1..=4.
    #[error("invalid antenna id: {0} (expected 1-4)")]
    InvalidAntenna(u8),

    /// Inventory requested with no antenna selected.
    #[error("no antenna selected")]
    NoAntennaSelected,

    /// The reader refused a write.
    #[error("write rejected: {0}")]
    WriteRejected(WriteResult),
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
