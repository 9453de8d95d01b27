//! VMU configuration.

use crate::memory::ROM_SIZE;

/// Configuration for creating a VMU instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VmuConfig {
    /// BIOS image. Must be exactly 65,536 bytes.
    pub rom: Vec<u8>,
    /// Initial flash contents, zero padded to 128 KiB. `None` starts blank.
    pub flash: Option<Vec<u8>>,
}

impl Default for VmuConfig {
    /// Zeroed ROM, blank flash.
    fn default() -> Self {
        Self {
            rom: vec![0; ROM_SIZE],
            flash: None,
        }
    }
}
