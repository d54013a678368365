//! CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection).
//!
//! The vendor documentation does not name the algorithm; this variant
//! is pinned here so a correction touches exactly one function.

/// Compute the checksum over `bytes`.
pub fn crc16_ccitt_false(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in bytes {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ 0x1021;
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
    fn known_vector() {
        // "123456789" is the standard check input for CCITT-FALSE.
        assert_eq!(crc16_ccitt_false(b"123456789"), 0x29B1);
    }

    #[test]
    fn empty_input_is_init_value() {
        assert_eq!(crc16_ccitt_false(&[]), 0xFFFF);
    }

    #[test]
    fn single_bit_changes_checksum() {
        let base = crc16_ccitt_false(b"\x01\x00\x00\x00");
        let flipped = crc16_ccitt_false(b"\x01\x00\x00\x01");
        assert_ne!(base, flipped);
    }
}
