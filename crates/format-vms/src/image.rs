//! Icon and eyecatch decoding to ARGB4444 bitmaps.

use crate::{
    EYECATCH_BITMAP_SIZE_16, EYECATCH_BITMAP_SIZE_16BIT, EYECATCH_BITMAP_SIZE_256,
    EYECATCH_HEIGHT, EYECATCH_PALETTE_SIZE_16, EYECATCH_PALETTE_SIZE_256, EYECATCH_PIXELS,
    EYECATCH_WIDTH, EyecatchType, HEADER_SIZE, ICON_BITMAP_SIZE, ICON_HEIGHT, ICON_WIDTH,
    VmsError, VmsHeader,
};

/// A decoded image, one ARGB4444 value per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u16>,
}

impl Bitmap {
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> u16 {
        self.pixels[y * self.width + x]
    }
}

fn require(bytes: &[u8], needed: usize) -> Result<(), VmsError> {
    if bytes.len() < needed {
        Err(VmsError::TooShort {
            needed,
            actual: bytes.len(),
        })
    } else {
        Ok(())
    }
}

fn read_palette(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Expand 4 bpp data: the high nibble is the even pixel, the low nibble the
/// odd one.
fn expand_nibbles(packed: &[u8], palette: &[u16]) -> Vec<u16> {
    packed
        .iter()
        .flat_map(|&byte| [palette[usize::from(byte >> 4)], palette[usize::from(byte & 0x0F)]])
        .collect()
}

/// Decode every icon frame in a header region.
///
/// `region` must start at the VMS header and hold at least
/// `header_bytes()` worth of data.
pub fn decode_icons(region: &[u8]) -> Result<Vec<Bitmap>, VmsError> {
    let header = VmsHeader::decode_valid(region)?;
    let count = usize::from(header.icon_count);
    require(region, HEADER_SIZE + count * ICON_BITMAP_SIZE)?;

    Ok(region[HEADER_SIZE..HEADER_SIZE + count * ICON_BITMAP_SIZE]
        .chunks_exact(ICON_BITMAP_SIZE)
        .map(|frame| Bitmap {
            width: ICON_WIDTH,
            height: ICON_HEIGHT,
            pixels: expand_nibbles(frame, &header.palette),
        })
        .collect())
}

/// Decode the eyecatch image in a header region, or `None` when the file
/// has no eyecatch.
pub fn decode_eyecatch(region: &[u8]) -> Result<Option<Bitmap>, VmsError> {
    let header = VmsHeader::decode_valid(region)?;
    let Some(kind) = header.eyecatch() else {
        return Err(VmsError::InvalidHeader);
    };
    if kind == EyecatchType::None {
        return Ok(None);
    }

    let start = HEADER_SIZE + usize::from(header.icon_count) * ICON_BITMAP_SIZE;
    require(region, start + kind.payload_size())?;
    let payload = &region[start..start + kind.payload_size()];

    let pixels = match kind {
        EyecatchType::None => return Ok(None),
        EyecatchType::Color16Bit => read_palette(&payload[..EYECATCH_BITMAP_SIZE_16BIT]),
        EyecatchType::Palette256 => {
            let (palette, image) = payload.split_at(EYECATCH_PALETTE_SIZE_256);
            let palette = read_palette(palette);
            image[..EYECATCH_BITMAP_SIZE_256]
                .iter()
                .map(|&index| palette[usize::from(index)])
                .collect()
        }
        EyecatchType::Palette16 => {
            let (palette, image) = payload.split_at(EYECATCH_PALETTE_SIZE_16);
            expand_nibbles(&image[..EYECATCH_BITMAP_SIZE_16], &read_palette(palette))
        }
    };
    debug_assert_eq!(pixels.len(), EYECATCH_PIXELS);

    Ok(Some(Bitmap {
        width: EYECATCH_WIDTH,
        height: EYECATCH_HEIGHT,
        pixels,
    }))
}
