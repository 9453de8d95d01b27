//! The fixed 128-byte VMS header.
//!
//! | Offset | Size | Field           |
//! |--------|------|-----------------|
//! | 0x00   | 16   | VMU description |
//! | 0x10   | 32   | DC description  |
//! | 0x30   | 16   | creator app     |
//! | 0x40   | 2    | icon count      |
//! | 0x42   | 2    | animation speed |
//! | 0x44   | 2    | eyecatch type   |
//! | 0x46   | 2    | CRC             |
//! | 0x48   | 4    | data bytes      |
//! | 0x4C   | 20   | reserved (zero) |
//! | 0x60   | 32   | icon palette    |
//!
//! All multi-byte fields are little-endian. Text fields are space padded and
//! not NUL terminated.

use log::debug;

use crate::{
    CREATOR_APP_SIZE, DC_DESCRIPTION_SIZE, EYECATCH_BITMAP_SIZE_16, EYECATCH_BITMAP_SIZE_16BIT,
    EYECATCH_BITMAP_SIZE_256, EYECATCH_PALETTE_SIZE_16, EYECATCH_PALETTE_SIZE_256, HEADER_SIZE,
    ICON_BITMAP_SIZE, ICON_COUNT_MAX, ICON_PALETTE_ENTRIES, RESERVED_SIZE, VMU_DESCRIPTION_SIZE,
    VmsError,
};

const LOG_TARGET: &str = "format_vms";

const OFFSET_VMU_DESC: usize = 0x00;
const OFFSET_DC_DESC: usize = 0x10;
const OFFSET_CREATOR_APP: usize = 0x30;
const OFFSET_ICON_COUNT: usize = 0x40;
const OFFSET_ANIM_SPEED: usize = 0x42;
const OFFSET_EYECATCH_TYPE: usize = 0x44;
pub(crate) const OFFSET_CRC: usize = 0x46;
const OFFSET_DATA_BYTES: usize = 0x48;
const OFFSET_RESERVED: usize = 0x4C;
const OFFSET_PALETTE: usize = 0x60;

/// Encoding of the eyecatch image that follows the icon frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EyecatchType {
    None = 0,
    /// ARGB4444 pixels stored directly.
    Color16Bit = 1,
    /// 256-entry palette followed by one index byte per pixel.
    Palette256 = 2,
    /// 16-entry palette followed by two 4-bit indices per byte.
    Palette16 = 3,
}

impl EyecatchType {
    /// Bytes the eyecatch occupies in the header region, palette included.
    #[must_use]
    pub fn payload_size(self) -> usize {
        match self {
            Self::None => 0,
            Self::Color16Bit => EYECATCH_BITMAP_SIZE_16BIT,
            Self::Palette256 => EYECATCH_PALETTE_SIZE_256 + EYECATCH_BITMAP_SIZE_256,
            Self::Palette16 => EYECATCH_PALETTE_SIZE_16 + EYECATCH_BITMAP_SIZE_16,
        }
    }
}

impl TryFrom<u16> for EyecatchType {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Color16Bit),
            2 => Ok(Self::Palette256),
            3 => Ok(Self::Palette16),
            other => Err(other),
        }
    }
}

/// Decoded VMS header.
///
/// `eyecatch_type` is kept raw so that headers with undefined values can
/// still be decoded and then rejected by [`VmsHeader::is_valid`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VmsHeader {
    pub vmu_desc: [u8; VMU_DESCRIPTION_SIZE],
    pub dc_desc: [u8; DC_DESCRIPTION_SIZE],
    pub creator_app: [u8; CREATOR_APP_SIZE],
    pub icon_count: u16,
    pub anim_speed: u16,
    pub eyecatch_type: u16,
    pub crc: u16,
    pub data_bytes: u32,
    pub reserved: [u8; RESERVED_SIZE],
    /// ARGB4444 colours indexed by icon pixels.
    pub palette: [u16; ICON_PALETTE_ENTRIES],
}

impl Default for VmsHeader {
    fn default() -> Self {
        Self {
            vmu_desc: [b' '; VMU_DESCRIPTION_SIZE],
            dc_desc: [b' '; DC_DESCRIPTION_SIZE],
            creator_app: [b' '; CREATOR_APP_SIZE],
            icon_count: 0,
            anim_speed: 0,
            eyecatch_type: EyecatchType::None as u16,
            crc: 0,
            data_bytes: 0,
            reserved: [0; RESERVED_SIZE],
            palette: [0; ICON_PALETTE_ENTRIES],
        }
    }
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn field<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

fn trimmed(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |last| last + 1);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn store(dest: &mut [u8], text: &str) -> usize {
    let len = text.len().min(dest.len());
    dest.fill(b' ');
    dest[..len].copy_from_slice(&text.as_bytes()[..len]);
    len
}

impl VmsHeader {
    /// Decode the header at the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, VmsError> {
        if bytes.len() < HEADER_SIZE {
            return Err(VmsError::TooShort {
                needed: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut palette = [0u16; ICON_PALETTE_ENTRIES];
        for (i, colour) in palette.iter_mut().enumerate() {
            *colour = u16_at(bytes, OFFSET_PALETTE + i * 2);
        }

        Ok(Self {
            vmu_desc: field(bytes, OFFSET_VMU_DESC),
            dc_desc: field(bytes, OFFSET_DC_DESC),
            creator_app: field(bytes, OFFSET_CREATOR_APP),
            icon_count: u16_at(bytes, OFFSET_ICON_COUNT),
            anim_speed: u16_at(bytes, OFFSET_ANIM_SPEED),
            eyecatch_type: u16_at(bytes, OFFSET_EYECATCH_TYPE),
            crc: u16_at(bytes, OFFSET_CRC),
            data_bytes: u32::from_le_bytes(field(bytes, OFFSET_DATA_BYTES)),
            reserved: field(bytes, OFFSET_RESERVED),
            palette,
        })
    }

    /// Decode and validate in one step.
    pub fn decode_valid(bytes: &[u8]) -> Result<Self, VmsError> {
        let header = Self::decode(bytes)?;
        if header.is_valid() {
            Ok(header)
        } else {
            Err(VmsError::InvalidHeader)
        }
    }

    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[OFFSET_VMU_DESC..OFFSET_VMU_DESC + VMU_DESCRIPTION_SIZE].copy_from_slice(&self.vmu_desc);
        out[OFFSET_DC_DESC..OFFSET_DC_DESC + DC_DESCRIPTION_SIZE].copy_from_slice(&self.dc_desc);
        out[OFFSET_CREATOR_APP..OFFSET_CREATOR_APP + CREATOR_APP_SIZE]
            .copy_from_slice(&self.creator_app);
        out[OFFSET_ICON_COUNT..OFFSET_ICON_COUNT + 2].copy_from_slice(&self.icon_count.to_le_bytes());
        out[OFFSET_ANIM_SPEED..OFFSET_ANIM_SPEED + 2].copy_from_slice(&self.anim_speed.to_le_bytes());
        out[OFFSET_EYECATCH_TYPE..OFFSET_EYECATCH_TYPE + 2]
            .copy_from_slice(&self.eyecatch_type.to_le_bytes());
        out[OFFSET_CRC..OFFSET_CRC + 2].copy_from_slice(&self.crc.to_le_bytes());
        out[OFFSET_DATA_BYTES..OFFSET_DATA_BYTES + 4].copy_from_slice(&self.data_bytes.to_le_bytes());
        out[OFFSET_RESERVED..OFFSET_RESERVED + RESERVED_SIZE].copy_from_slice(&self.reserved);
        for (i, colour) in self.palette.iter().enumerate() {
            let at = OFFSET_PALETTE + i * 2;
            out[at..at + 2].copy_from_slice(&colour.to_le_bytes());
        }
        out
    }

    /// Plausibility check: icon count in range, a defined eyecatch type and
    /// an all-zero reserved block. This is a heuristic, not an integrity
    /// check; the CRC is separate.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.icon_count <= ICON_COUNT_MAX
            && self.eyecatch().is_some()
            && self.reserved.iter().all(|&b| b == 0)
    }

    /// Decoded eyecatch type, or `None` for an undefined value.
    #[must_use]
    pub fn eyecatch(&self) -> Option<EyecatchType> {
        EyecatchType::try_from(self.eyecatch_type).ok()
    }

    /// Header plus icon frames plus eyecatch.
    #[must_use]
    pub fn header_bytes(&self) -> usize {
        HEADER_SIZE
            + usize::from(self.icon_count) * ICON_BITMAP_SIZE
            + self.eyecatch().map_or(0, EyecatchType::payload_size)
    }

    /// Header region plus payload.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.header_bytes()
            .saturating_add(self.data_bytes as usize)
    }

    #[must_use]
    pub fn vmu_description(&self) -> String {
        trimmed(&self.vmu_desc)
    }

    #[must_use]
    pub fn dc_description(&self) -> String {
        trimmed(&self.dc_desc)
    }

    #[must_use]
    pub fn creator_app_name(&self) -> String {
        trimmed(&self.creator_app)
    }

    /// Store `text`, cut to the field width and space padded. Returns the
    /// number of bytes kept.
    pub fn set_vmu_description(&mut self, text: &str) -> usize {
        store(&mut self.vmu_desc, text)
    }

    pub fn set_dc_description(&mut self, text: &str) -> usize {
        store(&mut self.dc_desc, text)
    }

    pub fn set_creator_app(&mut self, text: &str) -> usize {
        store(&mut self.creator_app, text)
    }

    /// Dump the header at debug level.
    pub fn log_info(&self) {
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "VMU Description", self.vmu_description());
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "DC Description", self.dc_description());
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Creator Application", self.creator_app_name());
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Icon Count", self.icon_count);
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Animation Speed", self.anim_speed);
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Eyecatch Type", self.eyecatch_type);
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "CRC", self.crc);
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Header Size", self.header_bytes());
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Data Size", self.data_bytes);
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Valid", self.is_valid());
    }
}

/// Header heuristic applied to raw bytes. Too-short input is never valid.
#[must_use]
pub fn is_valid_header(bytes: &[u8]) -> bool {
    VmsHeader::decode(bytes).is_ok_and(|header| header.is_valid())
}
