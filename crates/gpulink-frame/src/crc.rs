//! CRC-16/XMODEM: polynomial 0x1021, initial value 0, no reflection, no
//! final xor. Matches the device DMA checksum unit and `binascii.crc_hqx(data, 0)`.

const POLYNOMIAL: u16 = 0x1021;

/// Compute the checksum of `bytes`.
pub fn crc16(bytes: &[u8]) -> u16 {
    crc16_update(0, bytes)
}

/// Continue a running checksum over more bytes.
pub fn crc16_update(mut crc: u16, bytes: &[u8]) -> u16 {
    for &b in bytes {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
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
    fn check_value() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(crc16(&[]), 0x0000);
    }

    #[test]
    fn incremental_matches_oneshot() {
        let data = b"\x03\x02\x00\x01\x02";
        let split = crc16_update(crc16(&data[..2]), &data[2..]);
        assert_eq!(split, crc16(data));
    }

    #[test]
    fn known_header_values() {
        // crc_hqx(b"\x03\x02\x00", 0) and crc_hqx(b"\x01\x02", 0)
        assert_eq!(crc16(&[0x03, 0x02, 0x00]), 0x3F32);
        assert_eq!(crc16(&[0x01, 0x02]), 0x1373);
    }
}
