//! VMU `.LCD` animation file parser.
//!
//! An `.LCD` file is a flip-book for the 48×32 monochrome VMU screen:
//!
//! ```text
//! +----------------------+
//! | header               |  16 bytes
//! +----------------------+
//! | frame info × N       |  1 byte each (display delay)
//! +----------------------+
//! | frame data × N       |  48 × 32 bytes each, one byte per pixel
//! +----------------------+
//! | copyright            |  24 bytes, NUL padded
//! +----------------------+
//! ```
//!
//! Header fields (little-endian):
//!
//! | Offset | Size | Field        |
//! |--------|------|--------------|
//! | 0      | 4    | `"LCDi"`     |
//! | 4      | 1    | version      |
//! | 5      | 2    | width        |
//! | 7      | 2    | height       |
//! | 9      | 1    | bit depth    |
//! | 10     | 2    | reserved     |
//! | 12     | 2    | repeat count |
//! | 14     | 2    | frame count  |
//!
//! The parsed file keeps the whole image in one buffer. Frame accessors
//! compute byte ranges into it on demand.

use std::path::Path;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

pub const SIGNATURE: [u8; 4] = *b"LCDi";
pub const HEADER_SIZE: usize = 16;
pub const FRAME_INFO_SIZE: usize = 1;
pub const COPYRIGHT_SIZE: usize = 24;

/// Fixed VMU screen resolution every file must match.
pub const LCD_WIDTH: usize = 48;
pub const LCD_HEIGHT: usize = 32;
pub const FRAME_DATA_SIZE: usize = LCD_WIDTH * LCD_HEIGHT;

/// Only monochrome files exist.
pub const SUPPORTED_BIT_DEPTH: u8 = 1;

/// Frame data byte value for a lit pixel. Anything else is dark.
pub const PIXEL_ON: u8 = 0x01;

/// `repeat_count` value meaning "loop forever".
pub const REPEAT_INFINITE: u16 = 0xFFFF;

/// Length of one frame-delay tick.
pub const DELAY_UNIT: Duration = Duration::from_millis(10);

const LOG_TARGET: &str = "vmu::lcd_file";

/// Errors produced while loading an `.LCD` file.
#[derive(Debug, Error)]
pub enum LcdError {
    #[error("could not read LCD file: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} bytes is too small to be an LCD file")]
    TooShort(usize),
    #[error("unknown file signature {0:02X?}")]
    BadSignature([u8; 4]),
    #[error("unsupported bit depth {0}")]
    UnsupportedBitDepth(u8),
    #[error("unsupported resolution {width}x{height}")]
    UnsupportedResolution { width: u16, height: u16 },
    #[error("file declares zero frames")]
    NoFrames,
    #[error("file size {actual} does not match expected size {expected}")]
    SizeMismatch { actual: usize, expected: usize },
}

impl LcdError {
    /// True for every rejection caused by the file's contents rather than
    /// by the filesystem.
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Decoded `.LCD` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LcdHeader {
    pub signature: [u8; 4],
    pub version: u8,
    pub width: u16,
    pub height: u16,
    pub bit_depth: u8,
    pub reserved: u16,
    pub repeat_count: u16,
    pub frame_count: u16,
}

impl LcdHeader {
    /// Header for a valid VMU animation with the given playback settings.
    #[must_use]
    pub fn new(repeat_count: u16, frame_count: u16) -> Self {
        Self {
            signature: SIGNATURE,
            version: 1,
            width: LCD_WIDTH as u16,
            height: LCD_HEIGHT as u16,
            bit_depth: SUPPORTED_BIT_DEPTH,
            reserved: 0,
            repeat_count,
            frame_count,
        }
    }

    /// Decode the header fields from the start of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`HEADER_SIZE`].
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        let u16_at = |offset: usize| u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        Self {
            signature: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version: bytes[4],
            width: u16_at(5),
            height: u16_at(7),
            bit_depth: bytes[9],
            reserved: u16_at(10),
            repeat_count: u16_at(12),
            frame_count: u16_at(14),
        }
    }

    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.signature);
        out[4] = self.version;
        out[5..7].copy_from_slice(&self.width.to_le_bytes());
        out[7..9].copy_from_slice(&self.height.to_le_bytes());
        out[9] = self.bit_depth;
        out[10..12].copy_from_slice(&self.reserved.to_le_bytes());
        out[12..14].copy_from_slice(&self.repeat_count.to_le_bytes());
        out[14..16].copy_from_slice(&self.frame_count.to_le_bytes());
        out
    }

    /// Whether playback loops forever.
    #[must_use]
    pub fn repeats_forever(&self) -> bool {
        self.repeat_count == REPEAT_INFINITE
    }
}

/// Exact byte length of a file holding `frame_count` frames.
#[must_use]
pub const fn expected_size(frame_count: usize) -> usize {
    HEADER_SIZE + frame_count * FRAME_INFO_SIZE + frame_count * FRAME_DATA_SIZE + COPYRIGHT_SIZE
}

/// Per-frame playback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Display time in units of the player's delay constant.
    pub delay: u8,
}

/// A validated `.LCD` file.
#[derive(Debug, Clone)]
pub struct LcdFile {
    data: Vec<u8>,
    header: LcdHeader,
}

impl LcdFile {
    /// Read and validate a file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LcdError> {
        let path = path.as_ref();
        debug!(target: LOG_TARGET, "loading LCD animation file [{}]", path.display());
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Validate an in-memory image. Takes ownership of the buffer; frame
    /// accessors index into it.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, LcdError> {
        let file = Self::validate(&data).map(|header| Self { data, header });
        match &file {
            Ok(file) => file.log_info(),
            Err(err) => warn!(target: LOG_TARGET, "rejecting LCD file: {err}"),
        }
        file
    }

    fn validate(data: &[u8]) -> Result<LcdHeader, LcdError> {
        if data.len() < HEADER_SIZE + COPYRIGHT_SIZE {
            return Err(LcdError::TooShort(data.len()));
        }

        let header = LcdHeader::decode(data);

        if header.signature != SIGNATURE {
            return Err(LcdError::BadSignature(header.signature));
        }
        if header.bit_depth != SUPPORTED_BIT_DEPTH {
            return Err(LcdError::UnsupportedBitDepth(header.bit_depth));
        }
        if usize::from(header.width) != LCD_WIDTH || usize::from(header.height) != LCD_HEIGHT {
            return Err(LcdError::UnsupportedResolution {
                width: header.width,
                height: header.height,
            });
        }
        if header.frame_count == 0 {
            return Err(LcdError::NoFrames);
        }

        let expected = expected_size(usize::from(header.frame_count));
        if data.len() != expected {
            return Err(LcdError::SizeMismatch {
                actual: data.len(),
                expected,
            });
        }

        Ok(header)
    }

    #[must_use]
    pub fn header(&self) -> &LcdHeader {
        &self.header
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        usize::from(self.header.frame_count)
    }

    #[must_use]
    pub fn repeat_count(&self) -> u16 {
        self.header.repeat_count
    }

    /// Raw file image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn frame_info_offset(index: usize) -> usize {
        HEADER_SIZE + index * FRAME_INFO_SIZE
    }

    fn frame_data_offset(&self, index: usize) -> usize {
        Self::frame_info_offset(self.frame_count()) + index * FRAME_DATA_SIZE
    }

    fn copyright_offset(&self) -> usize {
        self.frame_data_offset(self.frame_count())
    }

    /// Playback record for frame `index`, or `None` past the last frame.
    #[must_use]
    pub fn frame_info(&self, index: usize) -> Option<FrameInfo> {
        (index < self.frame_count()).then(|| FrameInfo {
            delay: self.data[Self::frame_info_offset(index)],
        })
    }

    /// How long frame `index` stays on screen.
    #[must_use]
    pub fn frame_delay(&self, index: usize) -> Option<Duration> {
        self.frame_info(index)
            .map(|info| DELAY_UNIT * u32::from(info.delay))
    }

    /// Pixel bytes for frame `index`, row-major, or `None` past the last
    /// frame.
    #[must_use]
    pub fn frame_data(&self, index: usize) -> Option<&[u8]> {
        if index >= self.frame_count() {
            return None;
        }
        let start = self.frame_data_offset(index);
        Some(&self.data[start..start + FRAME_DATA_SIZE])
    }

    /// Raw copyright trailer.
    #[must_use]
    pub fn copyright_bytes(&self) -> &[u8] {
        let start = self.copyright_offset();
        &self.data[start..start + COPYRIGHT_SIZE]
    }

    /// Copyright trailer as text, up to the first NUL.
    #[must_use]
    pub fn copyright(&self) -> String {
        let raw = self.copyright_bytes();
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }

    /// Dump the header at debug level.
    pub fn log_info(&self) {
        let h = &self.header;
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Signature", String::from_utf8_lossy(&h.signature));
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Version Number", h.version);
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Frame Width", h.width);
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Frame Height", h.height);
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Bit Depth", h.bit_depth);
        debug!(target: LOG_TARGET, "{:<20}: {:>40x}", "Reserved", h.reserved);
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Repeat Count", h.repeat_count);
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Frame Count", h.frame_count);
        debug!(target: LOG_TARGET, "{:<20}: {:>40}", "Copyright", self.copyright());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(header: LcdHeader, delays: &[u8]) -> Vec<u8> {
        let mut data = header.encode().to_vec();
        data.extend_from_slice(delays);
        for frame in 0..delays.len() {
            data.extend(std::iter::repeat_n(frame as u8, FRAME_DATA_SIZE));
        }
        let mut copyright = [0u8; COPYRIGHT_SIZE];
        copyright[..9].copy_from_slice(b"(c) tests");
        data.extend_from_slice(&copyright);
        data
    }

    #[test]
    fn expected_size_formula() {
        assert_eq!(expected_size(1), 16 + 1 + 1536 + 24);
        assert_eq!(expected_size(3), 16 + 3 + 3 * 1536 + 24);
    }

    #[test]
    fn header_fields_decode_at_fixed_offsets() {
        let mut raw = [0u8; HEADER_SIZE];
        raw[0..4].copy_from_slice(b"LCDi");
        raw[4] = 7;
        raw[5] = 48;
        raw[7] = 32;
        raw[9] = 1;
        raw[10] = 0xCD;
        raw[11] = 0xAB;
        raw[12] = 0x02;
        raw[14] = 0x05;
        let h = LcdHeader::decode(&raw);
        assert_eq!(h.version, 7);
        assert_eq!((h.width, h.height), (48, 32));
        assert_eq!(h.reserved, 0xABCD);
        assert_eq!(h.repeat_count, 2);
        assert_eq!(h.frame_count, 5);
        assert_eq!(h.encode(), raw);
    }

    #[test]
    fn accepts_valid_file_and_exposes_frame_views() {
        let data = build(LcdHeader::new(1, 3), &[4, 5, 6]);
        let file = LcdFile::from_bytes(data).expect("valid");
        assert_eq!(file.frame_count(), 3);
        assert_eq!(file.frame_info(1), Some(FrameInfo { delay: 5 }));
        assert_eq!(file.frame_info(3), None);
        assert_eq!(file.frame_delay(2), Some(Duration::from_millis(60)));
        assert_eq!(file.frame_delay(3), None);
        let frame2 = file.frame_data(2).expect("frame 2");
        assert_eq!(frame2.len(), FRAME_DATA_SIZE);
        assert!(frame2.iter().all(|&b| b == 2));
        assert!(file.frame_data(3).is_none());
        assert_eq!(file.copyright(), "(c) tests");
    }

    #[test]
    fn one_byte_too_many_or_too_few_is_rejected() {
        let data = build(LcdHeader::new(1, 2), &[1, 1]);

        let mut longer = data.clone();
        longer.push(0);
        assert!(matches!(
            LcdFile::from_bytes(longer),
            Err(LcdError::SizeMismatch { .. })
        ));

        let mut shorter = data;
        shorter.pop();
        assert!(matches!(
            LcdFile::from_bytes(shorter),
            Err(LcdError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn wrong_bit_depth_is_a_format_error() {
        let mut header = LcdHeader::new(1, 1);
        header.bit_depth = 2;
        let err = LcdFile::from_bytes(build(header, &[1])).expect_err("bit depth");
        assert!(matches!(err, LcdError::UnsupportedBitDepth(2)));
        assert!(err.is_format_error());
    }

    #[test]
    fn wrong_resolution_is_a_format_error() {
        let mut header = LcdHeader::new(1, 1);
        header.width = 47;
        let err = LcdFile::from_bytes(build(header, &[1])).expect_err("resolution");
        assert!(matches!(
            err,
            LcdError::UnsupportedResolution { width: 47, height: 32 }
        ));

        let mut header = LcdHeader::new(1, 1);
        header.height = 33;
        assert!(LcdFile::from_bytes(build(header, &[1])).is_err());
    }

    #[test]
    fn bad_signature_rejected() {
        let mut header = LcdHeader::new(1, 1);
        header.signature = *b"LCDx";
        assert!(matches!(
            LcdFile::from_bytes(build(header, &[1])),
            Err(LcdError::BadSignature(sig)) if &sig == b"LCDx"
        ));
    }

    #[test]
    fn tiny_and_frameless_files_rejected() {
        assert!(matches!(
            LcdFile::from_bytes(vec![0; 10]),
            Err(LcdError::TooShort(10))
        ));
        let data = build(LcdHeader::new(1, 0), &[]);
        assert!(matches!(LcdFile::from_bytes(data), Err(LcdError::NoFrames)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = LcdFile::load("/nonexistent/definitely/missing.lcd").expect_err("missing");
        assert!(matches!(err, LcdError::Io(_)));
        assert!(!err.is_format_error());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn header_serializes_to_json() {
        let json = serde_json::to_value(LcdHeader::new(REPEAT_INFINITE, 2)).expect("json");
        assert_eq!(json["frame_count"], 2);
        assert_eq!(json["repeat_count"], 0xFFFF);
    }
}
