//! Dreamcast VMS save-data header codec.
//!
//! Every file stored on a VMU carries a VMS header: three text fields, icon
//! and eyecatch settings, a CRC, the payload length and a 16-colour icon
//! palette, 128 bytes in all. The header is followed by the animated icon
//! frames and an optional eyecatch (title) image, then the payload itself.
//!
//! ```text
//! +---------------------+ 0x000
//! | VmsHeader           |  128 bytes (incl. icon palette)
//! +---------------------+ 0x080
//! | icon frames × N     |  512 bytes each (32×32, 4 bpp)
//! +---------------------+
//! | eyecatch            |  0 / 8064 / 4544 / 2048 bytes by type
//! +---------------------+
//! | payload             |  data_bytes
//! +---------------------+
//! ```
//!
//! Data files start with the header. Game files reserve their first flash
//! block for loader code and put the header at the start of the second one.
//! Nothing else records the difference, so [`classify_file_type`] probes
//! both positions.

mod crc;
mod header;
mod image;

pub use crc::{checksum16, file_crc};
pub use header::{EyecatchType, VmsHeader, is_valid_header};
pub use image::{Bitmap, decode_eyecatch, decode_icons};

use thiserror::Error;

/// Size of a flash block, and of the loader block in front of a game
/// file's header.
pub const BLOCK_SIZE: usize = 512;

/// Fixed header length, icon palette included.
pub const HEADER_SIZE: usize = 0x80;

pub const VMU_DESCRIPTION_SIZE: usize = 16;
pub const DC_DESCRIPTION_SIZE: usize = 32;
pub const CREATOR_APP_SIZE: usize = 16;
pub const RESERVED_SIZE: usize = 20;
pub const ICON_PALETTE_ENTRIES: usize = 16;

pub const ICON_COUNT_MAX: u16 = 3;
pub const ICON_WIDTH: usize = 32;
pub const ICON_HEIGHT: usize = 32;
/// One 4 bpp icon frame.
pub const ICON_BITMAP_SIZE: usize = ICON_WIDTH * ICON_HEIGHT / 2;

pub const EYECATCH_WIDTH: usize = 72;
pub const EYECATCH_HEIGHT: usize = 56;
pub const EYECATCH_PIXELS: usize = EYECATCH_WIDTH * EYECATCH_HEIGHT;
pub const EYECATCH_BITMAP_SIZE_16BIT: usize = EYECATCH_PIXELS * 2;
pub const EYECATCH_PALETTE_SIZE_256: usize = 256 * 2;
pub const EYECATCH_BITMAP_SIZE_256: usize = EYECATCH_PIXELS;
pub const EYECATCH_PALETTE_SIZE_16: usize = 16 * 2;
pub const EYECATCH_BITMAP_SIZE_16: usize = EYECATCH_PIXELS / 2;

/// Errors produced while decoding VMS data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmsError {
    #[error("VMS data truncated: needed {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("VMS header failed validation")]
    InvalidHeader,
}

/// What kind of VMS file a block image holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FileType {
    None,
    Data,
    Game,
}

impl FileType {
    /// Byte offset of the VMS header within the file, if there is one.
    #[must_use]
    pub fn header_offset(self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::Data => Some(0),
            Self::Game => Some(BLOCK_SIZE),
        }
    }
}

/// Work out whether `image` is a data file, a game file, or neither, by
/// looking for a plausible header at offset 0 and then one block in.
#[must_use]
pub fn classify_file_type(image: &[u8]) -> FileType {
    if is_valid_header(image) {
        FileType::Data
    } else if image.len() > BLOCK_SIZE && is_valid_header(&image[BLOCK_SIZE..]) {
        FileType::Game
    } else {
        FileType::None
    }
}
