//! Commands that can be sent to the reader.

use bytes::BufMut;

use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::Frame;
use crate::types::*;

/// An EPC rewrite: replace the EPC of the tag currently holding `old_epc`.
///
/// Validated on construction, so encoding never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpcWrite {
    antenna: u8,
    old_epc: Epc,
    new_epc: Epc,
    password: u32,
}

impl EpcWrite {
    /// Build a write request from hex strings.
    ///
    /// The new EPC must be a whole number of 16-bit words (hex length
    /// divisible by 4). The old EPC is used as the match filter.
    pub fn new(old_epc_hex: &str, new_epc_hex: &str, antenna: u8, password: u32) -> ProtocolResult<Self> {
        let hex_len = new_epc_hex.trim().len();
        if hex_len % 4 != 0 {
            return Err(ProtocolError::InvalidEpcLength { hex_len });
        }
        let new_epc = Epc::from_hex(new_epc_hex)?;
        let old_epc = Epc::from_hex(old_epc_hex)?;
        Self::from_epcs(old_epc, new_epc, antenna, password)
    }

    /// Build a write request from parsed EPCs.
    pub fn from_epcs(old_epc: Epc, new_epc: Epc, antenna: u8, password: u32) -> ProtocolResult<Self> {
        if new_epc.len() % 2 != 0 {
            return Err(ProtocolError::InvalidEpcLength {
                hex_len: new_epc.len() * 2,
            });
        }
        if new_epc.word_count() > MAX_EPC_WORDS {
            return Err(ProtocolError::EpcTooLong {
                words: new_epc.word_count(),
            });
        }
        if old_epc.len() > MAX_MATCH_BYTES {
            return Err(ProtocolError::MatchFilterTooLong {
                bytes: old_epc.len(),
            });
        }
        validate_antenna(antenna)?;

        Ok(EpcWrite {
            antenna,
            old_epc,
            new_epc,
            password,
        })
    }

    /// Antenna used for the write.
    pub fn antenna(&self) -> u8 {
        self.antenna
    }

    /// EPC the target tag currently holds.
    pub fn old_epc(&self) -> &Epc {
        &self.old_epc
    }

    /// EPC to write.
    pub fn new_epc(&self) -> &Epc {
        &self.new_epc
    }

    /// Access password.
    pub fn password(&self) -> u32 {
        self.password
    }

    /// Gen2 PC word for the new EPC: length in words in the top five bits,
    /// all flags clear.
    pub fn pc_word(&self) -> u16 {
        (self.new_epc.word_count() as u16) << PC_WORD_LENGTH_SHIFT
    }

    /// Encode the command payload.
    ///
    /// ```text
    /// antenna mask (4) | bank (1) | start word (2)
    /// content len (2) | PC word (2) | new EPC
    /// 0x01 | len (2) | match bank (1) | start bit (2) | bit len (1) | old EPC
    /// 0x02 | password (4)
    /// ```
    pub fn payload(&self) -> Vec<u8> {
        let content_len = 2 + self.new_epc.len();
        let match_len = 4 + self.old_epc.len();
        let mut buf = Vec::with_capacity(7 + 2 + content_len + 3 + match_len + 5);

        // validated in from_epcs
        let mask = 1u32 << (self.antenna - 1);
        buf.put_u32(mask);
        buf.put_u8(MEM_BANK_EPC);
        buf.put_u16(EPC_WRITE_START_WORD);

        buf.put_u16(content_len as u16);
        buf.put_u16(self.pc_word());
        buf.put_slice(self.new_epc.as_bytes());

        buf.put_u8(PID_MATCH_FILTER);
        buf.put_u16(match_len as u16);
        buf.put_u8(MemoryBank::Epc.into());
        buf.put_u16(EPC_MATCH_START_BIT);
        buf.put_u8(self.old_epc.bit_len() as u8);
        buf.put_slice(self.old_epc.as_bytes());

        buf.put_u8(PID_ACCESS_PASSWORD);
        buf.put_u32(self.password);

        buf
    }
}

/// Commands that can be sent to the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start EPC inventory on the selected antennas.
    StartInventory {
        /// Antennas to read on.
        antennas: AntennaSet,
        /// Keep reading until stopped (false = single round).
        continuous: bool,
    },

    /// Stop any running inventory.
    StopInventory,

    /// Rewrite a tag's EPC.
    WriteEpc(EpcWrite),
}

impl Command {
    /// Start inventory.
    pub fn start_inventory(antennas: AntennaSet, continuous: bool) -> Self {
        Command::StartInventory {
            antennas,
            continuous,
        }
    }

    /// Stop inventory.
    pub fn stop_inventory() -> Self {
        Command::StopInventory
    }

    /// Rewrite a tag's EPC. Fails before any I/O if the request is invalid.
    pub fn write_epc(old_epc_hex: &str, new_epc_hex: &str, antenna: u8, password: u32) -> ProtocolResult<Self> {
        EpcWrite::new(old_epc_hex, new_epc_hex, antenna, password).map(Command::WriteEpc)
    }

    /// Category byte.
    pub fn category(&self) -> u8 {
        CATEGORY_RFID
    }

    /// Message id byte.
    pub fn message_id(&self) -> u8 {
        match self {
            Command::StartInventory { .. } => MID_START_INVENTORY,
            Command::StopInventory => MID_STOP_INVENTORY,
            Command::WriteEpc(_) => MID_WRITE_EPC,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::StartInventory { .. } => "START_INVENTORY",
            Command::StopInventory => "STOP_INVENTORY",
            Command::WriteEpc(_) => "WRITE_EPC",
        }
    }

    /// Encode the payload.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Command::StartInventory {
                antennas,
                continuous,
            } => {
                vec![0x00, 0x00, 0x00, antennas.mask(), u8::from(*continuous)]
            }
            Command::StopInventory => Vec::new(),
            Command::WriteEpc(write) => write.payload(),
        }
    }

    /// Build the frame for this command.
    pub fn to_frame(&self) -> Frame {
        Frame::from_parts(self.category(), self.message_id(), self.payload())
    }

    /// Encode the full frame for transmission.
    pub fn encode(&self) -> Vec<u8> {
        self.to_frame().encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_inventory_single_antenna() {
        let cmd = Command::start_inventory(AntennaSet::from_ids(&[1]).unwrap(), true);
        assert_eq!(cmd.payload(), vec![0x00, 0x00, 0x00, 0x01, 0x01]);
        assert_eq!(
            cmd.encode(),
            vec![0x5A, 0x00, 0x01, 0x02, 0x10, 0x00, 0x05, 0x00, 0x00, 0x00, 0x01, 0x01, 0xF4, 0x87]
        );
    }

    #[test]
    fn test_start_inventory_mask_and_single_shot() {
        let cmd = Command::start_inventory(AntennaSet::from_ids(&[1, 3]).unwrap(), false);
        assert_eq!(cmd.payload(), vec![0x00, 0x00, 0x00, 0x05, 0x00]);
        assert_eq!(cmd.message_id(), MID_START_INVENTORY);
    }

    #[test]
    fn test_stop_inventory() {
        let cmd = Command::stop_inventory();
        assert!(cmd.payload().is_empty());
        assert_eq!(cmd.encode(), vec![0x5A, 0x00, 0x01, 0x02, 0xFF, 0x00, 0x00, 0x88, 0x5A]);
    }

    #[test]
    fn test_pc_word() {
        let w = EpcWrite::new("E2801170", "300833B2DDD9014000000000", 1, 0).unwrap();
        assert_eq!(w.pc_word(), 0x3000);
        let w = EpcWrite::new("E2801170", "300833B2DDD90140", 1, 0).unwrap();
        assert_eq!(w.pc_word(), 0x2000);
    }

    #[test]
    fn test_invalid_epc_length() {
        assert_eq!(
            Command::write_epc("E2801170", "300833B2DDD901", 1, 0),
            Err(ProtocolError::InvalidEpcLength { hex_len: 14 })
        );
        assert_eq!(
            Command::write_epc("E2801170", "ABC", 1, 0),
            Err(ProtocolError::InvalidEpcLength { hex_len: 3 })
        );
    }

    #[test]
    fn test_invalid_write_parameters() {
        assert!(matches!(
            Command::write_epc("E2801170", "ZZZZ", 1, 0),
            Err(ProtocolError::InvalidHex(_))
        ));
        assert_eq!(
            Command::write_epc("E2801170", "3008", 5, 0),
            Err(ProtocolError::InvalidAntenna(5))
        );
        let too_long = "0".repeat(4 * 32);
        assert_eq!(
            Command::write_epc("E2801170", &too_long, 1, 0),
            Err(ProtocolError::EpcTooLong { words: 32 })
        );
    }

    #[test]
    fn test_write_epc_payload_layout() {
        let cmd = Command::write_epc(
            "E28011700000020A1B2C3D4E",
            "300833B2DDD9014000000000",
            2,
            0,
        )
        .unwrap();
        assert_eq!(cmd.message_id(), MID_WRITE_EPC);

        let expected: Vec<u8> = [
            &[0x00, 0x00, 0x00, 0x02][..],                 // antenna 2
            &[0x01],                                       // EPC bank
            &[0x00, 0x01],                                 // start at PC word
            &[0x00, 0x0E],                                 // content length
            &[0x30, 0x00],                                 // PC word, 6 words
            &[0x30, 0x08, 0x33, 0xB2, 0xDD, 0xD9, 0x01, 0x40, 0x00, 0x00, 0x00, 0x00],
            &[0x01, 0x00, 0x10],                           // match TLV header
            &[0x01, 0x00, 0x20, 0x60],                     // bank, bit 32, 96 bits
            &[0xE2, 0x80, 0x11, 0x70, 0x00, 0x00, 0x02, 0x0A, 0x1B, 0x2C, 0x3D, 0x4E],
            &[0x02, 0x00, 0x00, 0x00, 0x00],               // password TLV
        ]
        .concat();
        assert_eq!(cmd.payload(), expected);
        assert_eq!(cmd.payload().len(), 47);
    }

    #[test]
    fn test_write_epc_password() {
        let cmd = Command::write_epc("E280", "3008", 4, 0x1234_5678).unwrap();
        let payload = cmd.payload();
        assert_eq!(payload[3], 0x08);
        assert_eq!(&payload[payload.len() - 5..], &[0x02, 0x12, 0x34, 0x56, 0x78]);
    }
}
