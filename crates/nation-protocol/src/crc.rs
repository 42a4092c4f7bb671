//! CRC-16/CCITT as used by the reader (a.k.a. CRC-16/XMODEM).

/// Generator polynomial.
pub const CRC16_POLY: u16 = 0x1021;

/// Initial register value.
pub const CRC16_INIT: u16 = 0x0000;

/// Compute the frame checksum over `data`.
///
/// MSB-first, polynomial 0x1021, zero initial value, no final XOR.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ CRC16_POLY;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(crc16_ccitt(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(crc16_ccitt(&[]), 0x0000);
    }

    #[test]
    fn test_deterministic() {
        let data = [0x00, 0x01, 0x02, 0x10, 0x00, 0x05, 0x00, 0x00, 0x00, 0x01, 0x01];
        assert_eq!(crc16_ccitt(&data), crc16_ccitt(&data));
        assert_eq!(crc16_ccitt(&data), 0xF487);
    }

    #[test]
    fn test_single_bit_change() {
        let a = crc16_ccitt(&[0x00, 0x01, 0x02, 0xFF, 0x00, 0x00]);
        let b = crc16_ccitt(&[0x00, 0x01, 0x02, 0xFE, 0x00, 0x00]);
        assert_ne!(a, b);
    }
}
