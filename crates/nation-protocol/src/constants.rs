//! Protocol constants
//!
//! These constants define the frame layout, message identifiers, memory banks,
//! and result codes used by the Nation reader protocol.

// ============================================================================
// Frame Layout
// ============================================================================

/// Sync byte that starts every frame.
pub const FRAME_SYNC: u8 = 0x5A;
/// Protocol control word carried by every frame (protocol type 0, version 1).
pub const PROTOCOL_CONTROL_WORD: [u8; 2] = [0x00, 0x01];
/// Header size: sync + control word + category + message id + length.
pub const HEADER_SIZE: usize = 7;
/// Size of the trailing CRC16.
pub const CRC_SIZE: usize = 2;
/// Bytes a frame carries in addition to its payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + CRC_SIZE;
/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

// ============================================================================
// Categories
// ============================================================================

/// RFID operations (inventory, tag access).
pub const CATEGORY_RFID: u8 = 0x02;

// ============================================================================
// Message IDs (category 0x02)
// ============================================================================

/// Tag report pushed by the reader during inventory (inbound only).
pub const MID_TAG_REPORT: u8 = 0x00;
/// Start EPC inventory.
pub const MID_START_INVENTORY: u8 = 0x10;
/// Write a tag's EPC bank; the reader answers with the same id.
pub const MID_WRITE_EPC: u8 = 0x11;
/// Stop any running inventory.
pub const MID_STOP_INVENTORY: u8 = 0xFF;

// ============================================================================
// Antennas
// ============================================================================

/// Number of physical antenna ports on the reader.
pub const MAX_ANTENNAS: u8 = 4;

// ============================================================================
// Memory Banks
// ============================================================================

/// Reserved bank (kill and access passwords).
pub const MEM_BANK_RESERVED: u8 = 0x00;
/// EPC bank (CRC word, PC word, EPC).
pub const MEM_BANK_EPC: u8 = 0x01;
/// TID bank (factory identifier, read-only).
pub const MEM_BANK_TID: u8 = 0x02;
/// User bank.
pub const MEM_BANK_USER: u8 = 0x03;

// ============================================================================
// EPC Write Parameters
// ============================================================================

/// First word written in the EPC bank: word 1 is the PC word (word 0 is the CRC).
pub const EPC_WRITE_START_WORD: u16 = 0x0001;
/// Bit address of the EPC field inside the EPC bank (after CRC and PC words).
pub const EPC_MATCH_START_BIT: u16 = 0x0020;
/// Parameter id of the match filter TLV.
pub const PID_MATCH_FILTER: u8 = 0x01;
/// Parameter id of the access password TLV.
pub const PID_ACCESS_PASSWORD: u8 = 0x02;
/// Largest EPC length the 5-bit PC length field can express, in words.
pub const MAX_EPC_WORDS: usize = 31;
/// Largest match filter the 1-byte bit length can express, in bytes.
pub const MAX_MATCH_BYTES: usize = 31;
/// Shift of the length field inside the PC word.
pub const PC_WORD_LENGTH_SHIFT: u16 = 11;

// ============================================================================
// Write Result Codes
// ============================================================================

/// Write completed.
pub const WRITE_RESULT_SUCCESS: u8 = 0x00;
/// Parameter error reported by the reader.
pub const WRITE_RESULT_INVALID_PARAMETER: u8 = 0x03;
/// Wrong access password or the bank is locked.
pub const WRITE_RESULT_PASSWORD_OR_LOCK: u8 = 0x08;
/// No tag matching the filter answered.
pub const WRITE_RESULT_TAG_OUT_OF_RANGE: u8 = 0x10;
