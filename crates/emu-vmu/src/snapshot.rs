//! Whole-device save states.
//!
//! A snapshot is the concatenation of every peripheral's state, in a fixed
//! order, with no header or version:
//!
//! | Field                         | Size      |
//! |-------------------------------|-----------|
//! | ROM                           | `$10000`  |
//! | flash storage                 | `$20000`  |
//! | flash program state           | 1         |
//! | flash program byte count      | 2         |
//! | flash changed flag            | 1         |
//! | RAM banks 0-1                 | 2 × `$100`|
//! | XRAM banks 0-2                | 3 × `$80` |
//! | SFRs                          | `$80`     |
//! | LCD pixels, one byte each     | 48 × 32   |
//! | LCD screen/refresh/icons/dirty| 4         |
//!
//! Images are tied to this layout and are not portable between builds that
//! change it.
//!
//! Bank selectors, the flash observer and the animation player are never
//! stored. After a restore the selectors are re-derived from the restored
//! control registers, the observer stays as it was, any animation is
//! dropped, and the LCD is flagged for a full redraw.
//!
//! A restore is not transactional. Fields are applied to the live device as
//! they are read, so a short image leaves everything before the cut
//! overwritten and nothing after it, and none of the post-restore steps run.

use std::path::Path;

use emu_core::{Peripheral, StateError, StateReader, StateWriter};
use log::{error, info, warn};
use thiserror::Error;

use crate::flash::FLASH_SIZE;
use crate::lcd::LCD_PIXELS;
use crate::memory::{
    RAM_BANK_COUNT, RAM_BANK_SIZE, ROM_SIZE, SFR_SIZE, XRAM_BANK_COUNT, XRAM_BANK_SIZE,
};
use crate::vmu::Vmu;

/// Exact length of every snapshot image.
pub const SNAPSHOT_SIZE: usize = ROM_SIZE
    + FLASH_SIZE
    + 4
    + RAM_BANK_COUNT * RAM_BANK_SIZE
    + XRAM_BANK_COUNT * XRAM_BANK_SIZE
    + SFR_SIZE
    + LCD_PIXELS
    + 4;

const LOG_TARGET: &str = "vmu::snapshot";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    State(#[from] StateError),
}

impl Vmu {
    /// Serialize the whole device.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        let mut state = StateWriter::with_capacity(SNAPSHOT_SIZE);
        self.memory.save_state(&mut state);
        self.lcd.save_state(&mut state);
        debug_assert_eq!(state.len(), SNAPSHOT_SIZE);
        state.into_bytes()
    }

    /// Overwrite the device from a snapshot image.
    ///
    /// On error the device is left partially overwritten.
    pub fn restore(&mut self, image: &[u8]) -> Result<(), SnapshotError> {
        let mut state = StateReader::new(image);
        if let Err(err) = self.apply(&mut state) {
            error!(target: LOG_TARGET, "snapshot restore failed: {err}");
            return Err(err.into());
        }
        if state.remaining() > 0 {
            warn!(
                target: LOG_TARGET,
                "ignoring {} bytes past the end of the snapshot",
                state.remaining()
            );
        }

        // An XBNK past the last bank leaves the XRAM selector as it was
        // before the restore rather than as the image had it.
        if let Err(err) = self.memory.recompute_from_control_bits() {
            warn!(target: LOG_TARGET, "restored control registers are invalid: {err}");
        }
        if self.animation.take().is_some() {
            info!(target: LOG_TARGET, "detached animation file on restore");
        }
        self.lcd.mark_changed();
        Ok(())
    }

    fn apply(&mut self, state: &mut StateReader<'_>) -> Result<(), StateError> {
        self.memory.load_state(state)?;
        self.lcd.load_state(state)
    }

    /// Write a snapshot file.
    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        info!(target: LOG_TARGET, "saving state to [{}]", path.display());
        std::fs::write(path, self.snapshot()).map_err(|err| {
            error!(target: LOG_TARGET, "could not write [{}]: {err}", path.display());
            SnapshotError::from(err)
        })
    }

    /// Restore from a snapshot file. See [`Vmu::restore`].
    pub fn load_state(&mut self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        info!(target: LOG_TARGET, "loading state from [{}]", path.display());
        let image = std::fs::read(path).map_err(|err| {
            error!(target: LOG_TARGET, "could not read [{}]: {err}", path.display());
            SnapshotError::from(err)
        })?;
        self.restore(&image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmuConfig;
    use crate::lcd::LcdDisplay;
    use crate::memory::{Region, SFR_XBNK};
    use emu_core::Bus;

    #[test]
    fn snapshot_has_fixed_size() {
        let vmu = Vmu::new(&VmuConfig::default());
        assert_eq!(vmu.snapshot().len(), SNAPSHOT_SIZE);
        assert_eq!(
            SNAPSHOT_SIZE,
            vmu.memory.state_size() + vmu.lcd.state_size()
        );
    }

    #[test]
    fn restore_rederives_banks_and_forces_redraw() {
        let mut vmu = Vmu::new(&VmuConfig::default());
        vmu.memory.select(Region::Xram, 2).expect("xram 2");
        vmu.memory.select(Region::Program, 1).expect("flash 0");
        vmu.lcd.set_pixel(5, 5, true);
        let image = vmu.snapshot();

        let mut other = Vmu::new(&VmuConfig::default());
        other.restore(&image).expect("restore");
        assert_eq!(other.memory.selected(Region::Xram), 2);
        assert_eq!(other.memory.selected(Region::Program), 1);
        assert!(other.lcd.pixel(5, 5));
        assert!(other.lcd.screen_changed());
    }

    #[test]
    fn short_image_fails_without_fixups() {
        let mut source = Vmu::new(&VmuConfig::default());
        source.memory.write(SFR_XBNK, 1);
        source.memory.write(0x0010, 0x5A);
        let image = source.snapshot();

        let mut vmu = Vmu::new(&VmuConfig::default());
        let cut = SNAPSHOT_SIZE - 1;
        assert!(matches!(
            vmu.restore(&image[..cut]),
            Err(SnapshotError::State(StateError::Truncated { .. }))
        ));
        // Memory came through whole; only the last LCD byte was missing.
        assert_eq!(vmu.memory.sfr(SFR_XBNK), 1);
        assert_eq!(vmu.memory.selected(Region::Xram), 0);
        assert!(!vmu.lcd.screen_changed());
    }

    #[test]
    fn invalid_xbnk_in_image_keeps_prior_xram_bank() {
        let mut source = Vmu::new(&VmuConfig::default());
        source.memory.write(SFR_XBNK, 3);
        let image = source.snapshot();

        let mut vmu = Vmu::new(&VmuConfig::default());
        vmu.memory.select(Region::Xram, 1).expect("xram 1");
        vmu.restore(&image).expect("restore");
        assert_eq!(vmu.memory.sfr(SFR_XBNK), 3);
        assert_eq!(vmu.memory.selected(Region::Xram), 1);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let vmu = Vmu::new(&VmuConfig::default());
        let mut image = vmu.snapshot();
        image.extend_from_slice(&[0xEE; 8]);
        let mut other = Vmu::new(&VmuConfig::default());
        assert!(other.restore(&image).is_ok());
    }
}
