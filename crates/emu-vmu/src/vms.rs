//! VMS files as they sit in flash.
//!
//! Files are addressed by their first flash block. Everything here reads
//! through [`Flash::read_bytes`], so a file running off the end of flash
//! shows up as a short read and is reported, never padded.

use format_vms::{
    BLOCK_SIZE, Bitmap, FileType, HEADER_SIZE, VmsError, VmsHeader, classify_file_type,
    decode_eyecatch, decode_icons, file_crc,
};
use log::debug;

use crate::VmuError;
use crate::flash::{Flash, FlashError};

const LOG_TARGET: &str = "format_vms";

fn block_address(flash: &Flash, block: usize) -> Result<usize, VmuError> {
    block
        .checked_mul(BLOCK_SIZE)
        .ok_or_else(|| {
            FlashError::OutOfRange {
                address: usize::MAX,
                capacity: flash.capacity(),
            }
            .into()
        })
}

/// Read exactly `len` bytes or fail.
///
/// The length is checked against what flash holds before anything is
/// allocated, so a corrupt size field costs nothing.
fn read_exact(flash: &Flash, address: usize, len: usize) -> Result<Vec<u8>, VmuError> {
    let capacity = flash.capacity();
    if address >= capacity {
        return Err(FlashError::OutOfRange { address, capacity }.into());
    }
    let available = capacity - address;
    if len > available {
        debug!(
            target: LOG_TARGET,
            "{len} byte read at {address:#07X} runs past the end of flash"
        );
        return Err(VmsError::TooShort {
            needed: len,
            actual: available,
        }
        .into());
    }
    let mut buffer = vec![0u8; len];
    flash.read_bytes(address, &mut buffer)?;
    Ok(buffer)
}

/// Classify the file starting at `block` by probing both header positions.
pub fn file_type_at(flash: &Flash, block: usize) -> Result<FileType, VmuError> {
    let mut probe = vec![0u8; 2 * BLOCK_SIZE];
    let transfer = flash.read_bytes(block_address(flash, block)?, &mut probe)?;
    Ok(classify_file_type(&probe[..transfer.bytes]))
}

fn header_address(flash: &Flash, block: usize) -> Result<usize, VmuError> {
    let offset = file_type_at(flash, block)?
        .header_offset()
        .ok_or(VmsError::InvalidHeader)?;
    Ok(block_address(flash, block)?.saturating_add(offset))
}

/// Locate and decode the header of the file at `block`.
pub fn read_header(flash: &Flash, block: usize) -> Result<VmsHeader, VmuError> {
    let bytes = read_exact(flash, header_address(flash, block)?, HEADER_SIZE)?;
    let header = VmsHeader::decode_valid(&bytes)?;
    header.log_info();
    Ok(header)
}

/// The header, icons and eyecatch of the file at `block`, rounded up to
/// whole flash blocks.
pub fn read_header_region(flash: &Flash, block: usize) -> Result<Vec<u8>, VmuError> {
    let address = header_address(flash, block)?;
    let header = VmsHeader::decode_valid(&read_exact(flash, address, HEADER_SIZE)?)?;
    let len = header.header_bytes().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    debug!(
        target: LOG_TARGET,
        "reading {len} byte header region at {address:#07X}"
    );
    read_exact(flash, address, len)
}

pub fn read_icons(flash: &Flash, block: usize) -> Result<Vec<Bitmap>, VmuError> {
    Ok(decode_icons(&read_header_region(flash, block)?)?)
}

pub fn read_eyecatch(flash: &Flash, block: usize) -> Result<Option<Bitmap>, VmuError> {
    Ok(decode_eyecatch(&read_header_region(flash, block)?)?)
}

/// Recompute the whole-file CRC of the file at `block` and compare it with
/// the one stored in its header.
///
/// Game files store their CRC as zero and are not checked; they always
/// report a match.
pub fn crc_matches(flash: &Flash, block: usize) -> Result<bool, VmuError> {
    let file_type = file_type_at(flash, block)?;
    let offset = file_type.header_offset().ok_or(VmsError::InvalidHeader)?;
    let header = read_header(flash, block)?;
    if file_type == FileType::Game {
        return Ok(true);
    }
    let len = offset.saturating_add(header.total_bytes());
    let file = read_exact(flash, block_address(flash, block)?, len)?;
    let crc = file_crc(&file, offset)?;
    if crc != header.crc {
        debug!(
            target: LOG_TARGET,
            "CRC mismatch at block {block}: stored {:#06X}, computed {crc:#06X}", header.crc
        );
    }
    Ok(crc == header.crc)
}
