//! Common types used in the protocol.

use std::fmt;

use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};

/// An Electronic Product Code as stored in a tag's EPC bank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Epc(Vec<u8>);

impl Epc {
    /// Create from raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Epc(bytes)
    }

    /// Parse a hex string (either case, surrounding whitespace ignored).
    pub fn from_hex(hex_str: &str) -> ProtocolResult<Self> {
        hex::decode(hex_str.trim())
            .map(Epc)
            .map_err(|e| ProtocolError::InvalidHex(format!("{:?}: {}", hex_str, e)))
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the EPC is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in 16-bit words (rounded down).
    pub fn word_count(&self) -> usize {
        self.0.len() / 2
    }

    /// Length in bits.
    pub fn bit_len(&self) -> usize {
        self.0.len() * 8
    }

    /// Uppercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.0)
    }
}

impl fmt::Display for Epc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Epc {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Epc {
    fn from(bytes: &[u8]) -> Self {
        Epc(bytes.to_vec())
    }
}

/// Check that an antenna id names one of the reader's ports.
pub fn validate_antenna(id: u8) -> ProtocolResult<u8> {
    if (1..=MAX_ANTENNAS).contains(&id) {
        Ok(id)
    } else {
        Err(ProtocolError::InvalidAntenna(id))
    }
}

/// Mask bit for a single antenna port.
pub fn antenna_bit(id: u8) -> ProtocolResult<u8> {
    validate_antenna(id).map(|id| 1 << (id - 1))
}

/// A set of antenna ports, stored as the reader's bitmask (bit 0 = antenna 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AntennaSet(u8);

impl AntennaSet {
    /// An empty selection.
    pub fn new() -> Self {
        AntennaSet(0)
    }

    /// Build a selection from antenna ids (1-4). Duplicates are ignored.
    pub fn from_ids(ids: &[u8]) -> ProtocolResult<Self> {
        let mut set = AntennaSet::new();
        for &id in ids {
            set.insert(id)?;
        }
        Ok(set)
    }

    /// A selection holding a single antenna.
    pub fn single(id: u8) -> ProtocolResult<Self> {
        Ok(AntennaSet(antenna_bit(id)?))
    }

    /// Add an antenna to the selection.
    pub fn insert(&mut self, id: u8) -> ProtocolResult<()> {
        self.0 |= antenna_bit(id)?;
        Ok(())
    }

    /// Remove an antenna from the selection. Unknown ids are ignored.
    pub fn remove(&mut self, id: u8) {
        if let Ok(bit) = antenna_bit(id) {
            self.0 &= !bit;
        }
    }

    /// Add the antenna if absent, remove it if present.
    pub fn toggle(&mut self, id: u8) -> ProtocolResult<()> {
        self.0 ^= antenna_bit(id)?;
        Ok(())
    }

    /// Whether the antenna is selected.
    pub fn contains(&self, id: u8) -> bool {
        antenna_bit(id).map(|bit| self.0 & bit != 0).unwrap_or(false)
    }

    /// The bitmask sent to the reader.
    pub fn mask(&self) -> u8 {
        self.0
    }

    /// Whether no antenna is selected.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of selected antennas.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Selected antenna ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=MAX_ANTENNAS).filter(move |&id| self.contains(id))
    }

    /// Selected antenna ids as a vector.
    pub fn ids(&self) -> Vec<u8> {
        self.iter().collect()
    }
}

impl fmt::Display for AntennaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.iter().map(|id| id.to_string()).collect();
        write!(f, "{{{}}}", ids.join(","))
    }
}

/// Tag memory banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryBank {
    /// Kill and access passwords.
    Reserved,
    /// CRC, PC word and EPC.
    Epc,
    /// Factory tag identifier.
    Tid,
    /// User memory.
    User,
    /// Bank code not known to this crate.
    Other(u8),
}

impl From<u8> for MemoryBank {
    fn from(code: u8) -> Self {
        match code {
            MEM_BANK_RESERVED => MemoryBank::Reserved,
            MEM_BANK_EPC => MemoryBank::Epc,
            MEM_BANK_TID => MemoryBank::Tid,
            MEM_BANK_USER => MemoryBank::User,
            _ => MemoryBank::Other(code),
        }
    }
}

impl From<MemoryBank> for u8 {
    fn from(bank: MemoryBank) -> Self {
        match bank {
            MemoryBank::Reserved => MEM_BANK_RESERVED,
            MemoryBank::Epc => MEM_BANK_EPC,
            MemoryBank::Tid => MEM_BANK_TID,
            MemoryBank::User => MEM_BANK_USER,
            MemoryBank::Other(code) => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epc_hex_roundtrip_is_uppercase() {
        let epc = Epc::from_hex("e2801170000002").unwrap();
        assert_eq!(epc.len(), 7);
        assert_eq!(epc.to_hex(), "E2801170000002");
        assert_eq!(epc.to_string(), "E2801170000002");
    }

    #[test]
    fn test_epc_invalid_hex() {
        assert!(matches!(Epc::from_hex("E28G"), Err(ProtocolError::InvalidHex(_))));
        assert!(matches!(Epc::from_hex("E28"), Err(ProtocolError::InvalidHex(_))));
    }

    #[test]
    fn test_epc_lengths() {
        let epc = Epc::from_hex("300833B2DDD9014000000000").unwrap();
        assert_eq!(epc.len(), 12);
        assert_eq!(epc.word_count(), 6);
        assert_eq!(epc.bit_len(), 96);
    }

    #[test]
    fn test_antenna_mask() {
        assert_eq!(AntennaSet::from_ids(&[1, 3]).unwrap().mask(), 0x05);
        assert_eq!(AntennaSet::from_ids(&[1, 2, 3, 4]).unwrap().mask(), 0x0F);
        assert_eq!(AntennaSet::from_ids(&[2, 2]).unwrap().mask(), 0x02);
        assert!(AntennaSet::new().is_empty());
    }

    #[test]
    fn test_antenna_out_of_range() {
        assert_eq!(AntennaSet::from_ids(&[0]), Err(ProtocolError::InvalidAntenna(0)));
        assert_eq!(AntennaSet::from_ids(&[1, 5]), Err(ProtocolError::InvalidAntenna(5)));
    }

    #[test]
    fn test_antenna_toggle_and_iter() {
        let mut set = AntennaSet::single(1).unwrap();
        set.toggle(4).unwrap();
        set.toggle(1).unwrap();
        assert_eq!(set.ids(), vec![4]);
        set.insert(2).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_string(), "{2,4}");
        set.remove(4);
        assert!(set.contains(2));
        assert!(!set.contains(4));
    }

    #[test]
    fn test_memory_bank_codes() {
        assert_eq!(MemoryBank::from(0x01), MemoryBank::Epc);
        assert_eq!(u8::from(MemoryBank::User), 0x03);
        assert_eq!(MemoryBank::from(0x09), MemoryBank::Other(0x09));
    }
}
