//! VMS CRC: CRC-16/XMODEM (poly 0x1021, MSB first, no reflection, no final
//! XOR).

use crate::header::OFFSET_CRC;
use crate::{HEADER_SIZE, VmsError};

const POLY: u16 = 0x1021;

/// CRC over `bytes`, continuing from `seed` when checksumming in chunks.
///
/// `checksum16(b, checksum16(a, None).into())` equals the CRC of `a`
/// followed by `b`.
#[must_use]
pub fn checksum16(bytes: &[u8], seed: Option<u16>) -> u16 {
    let mut crc = seed.unwrap_or(0);
    for &byte in bytes {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// CRC of a whole VMS file as stored in its header: every byte of the file,
/// with the CRC field itself counted as zero.
///
/// `header_offset` is 0 for data files and one block for game files.
pub fn file_crc(file: &[u8], header_offset: usize) -> Result<u16, VmsError> {
    let needed = header_offset + HEADER_SIZE;
    if file.len() < needed {
        return Err(VmsError::TooShort {
            needed,
            actual: file.len(),
        });
    }
    let crc_at = header_offset + OFFSET_CRC;
    let crc = checksum16(&file[..crc_at], None);
    let crc = checksum16(&[0, 0], Some(crc));
    Ok(checksum16(&file[crc_at + 2..], Some(crc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VmsHeader;

    #[test]
    fn xmodem_check_value() {
        assert_eq!(checksum16(b"123456789", None), 0x31C3);
    }

    #[test]
    fn empty_input_returns_seed() {
        assert_eq!(checksum16(&[], None), 0);
        assert_eq!(checksum16(&[], Some(0x1234)), 0x1234);
    }

    #[test]
    fn same_bytes_same_seed_same_crc() {
        let data: Vec<u8> = (0..=255).collect();
        assert_eq!(checksum16(&data, None), checksum16(&data, None));
        assert_eq!(checksum16(&data, Some(0xABCD)), checksum16(&data, Some(0xABCD)));
    }

    #[test]
    fn chunked_matches_whole() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        let whole = checksum16(&data, None);
        let mut running = None;
        for chunk in data.chunks(37) {
            running = Some(checksum16(chunk, running));
        }
        assert_eq!(running, Some(whole));
    }

    #[test]
    fn file_crc_ignores_stored_crc() {
        let mut file = VmsHeader::default().encode().to_vec();
        file.extend_from_slice(&[1, 2, 3, 4]);
        let crc = file_crc(&file, 0).expect("crc");

        file[OFFSET_CRC] = (crc & 0xFF) as u8;
        file[OFFSET_CRC + 1] = (crc >> 8) as u8;
        assert_eq!(file_crc(&file, 0), Ok(crc));
        assert_eq!(VmsHeader::decode(&file).expect("header").crc, crc);
    }

    #[test]
    fn file_crc_needs_a_whole_header() {
        assert_eq!(
            file_crc(&[0u8; 600], 512),
            Err(VmsError::TooShort {
                needed: 640,
                actual: 600
            })
        );
    }
}
