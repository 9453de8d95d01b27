//! Top-level VMU device.
//!
//! Owns the address space (with the flash inside it), the LCD and, while an
//! `.LCD` file is attached, the animation player. There is no CPU here: an
//! external core drives [`Memory`] through its [`emu_core::Bus`] impl, and
//! the host calls [`Vmu::update`] once per tick.

use std::path::Path;
use std::time::Duration;

use emu_core::Peripheral;
use format_lcd::{LcdError, LcdFile};
use format_vms::VmsError;
use log::debug;
use thiserror::Error;

use crate::animation::AnimationPlayer;
use crate::config::VmuConfig;
use crate::flash::{Flash, FlashError};
use crate::lcd::Lcd;
use crate::memory::{Memory, MemoryError};
use crate::snapshot::SnapshotError;

/// Any failure a device operation can report.
#[derive(Debug, Error)]
pub enum VmuError {
    #[error(transparent)]
    Lcd(#[from] LcdError),
    #[error(transparent)]
    Vms(#[from] VmsError),
    #[error(transparent)]
    Flash(#[from] FlashError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Sega Visual Memory Unit.
pub struct Vmu {
    pub(crate) memory: Memory,
    pub(crate) lcd: Lcd,
    pub(crate) animation: Option<AnimationPlayer>,
}

impl Vmu {
    /// Create a new VMU from the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the ROM is not exactly 65,536 bytes or the flash image is
    /// larger than the flash.
    #[must_use]
    pub fn new(config: &VmuConfig) -> Self {
        match Self::try_new(config) {
            Ok(vmu) => vmu,
            Err(err) => panic!("invalid VMU configuration: {err}"),
        }
    }

    /// Like [`Vmu::new`], but an oversized flash image is an error.
    ///
    /// # Panics
    ///
    /// Panics if the ROM is not exactly 65,536 bytes.
    pub fn try_new(config: &VmuConfig) -> Result<Self, VmuError> {
        let flash = match &config.flash {
            Some(image) => Flash::with_image(image)?,
            None => Flash::new(),
        };
        let mut memory = Memory::new(&config.rom, flash);
        memory.recompute_from_control_bits()?;
        Ok(Self {
            memory,
            lcd: Lcd::new(),
            animation: None,
        })
    }

    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    #[must_use]
    pub fn flash(&self) -> &Flash {
        self.memory.flash()
    }

    pub fn flash_mut(&mut self) -> &mut Flash {
        self.memory.flash_mut()
    }

    #[must_use]
    pub fn lcd(&self) -> &Lcd {
        &self.lcd
    }

    pub fn lcd_mut(&mut self) -> &mut Lcd {
        &mut self.lcd
    }

    /// The attached animation, if any.
    #[must_use]
    pub fn animation(&self) -> Option<&AnimationPlayer> {
        self.animation.as_ref()
    }

    /// The attached animation together with the display it draws on, for
    /// driving the player's transport controls.
    pub fn animation_controls(&mut self) -> Option<(&mut AnimationPlayer, &mut Lcd)> {
        let lcd = &mut self.lcd;
        self.animation.as_mut().map(|player| (player, lcd))
    }

    /// Power-cycle the hardware. Flash contents survive; any animation is
    /// detached.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.lcd.reset();
        self.animation = None;
    }

    /// Advance host-driven state by `delta`.
    pub fn update(&mut self, delta: Duration) {
        if let Some(player) = self.animation.as_mut() {
            player.update(&mut self.lcd, delta);
        }
    }

    /// Load an `.LCD` file and start playing it, replacing any current one.
    ///
    /// On failure nothing is attached and the screen is left alone.
    pub fn load_lcd_file(&mut self, path: impl AsRef<Path>) -> Result<(), VmuError> {
        let file = LcdFile::load(path)?;
        self.start_animation(file);
        Ok(())
    }

    /// Start playing an already parsed file.
    pub fn start_animation(&mut self, file: LcdFile) {
        self.animation = Some(AnimationPlayer::start(file, &mut self.lcd));
    }

    /// Stop playback and detach the file, handing it back.
    pub fn unload_lcd_file(&mut self) -> Option<LcdFile> {
        let file = self.animation.take().map(AnimationPlayer::into_file);
        if file.is_some() {
            debug!(target: "vmu::lcd_file", "animation unloaded");
        }
        file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::PlaybackState;
    use crate::flash::FLASH_SIZE;
    use format_lcd::{COPYRIGHT_SIZE, FRAME_DATA_SIZE, LcdHeader, PIXEL_ON, REPEAT_INFINITE};

    fn lcd_file() -> LcdFile {
        let mut data = LcdHeader::new(REPEAT_INFINITE, 2).encode().to_vec();
        data.extend_from_slice(&[1, 1]);
        let mut frame = [0u8; FRAME_DATA_SIZE];
        frame[0] = PIXEL_ON;
        data.extend_from_slice(&frame);
        data.extend_from_slice(&[0; FRAME_DATA_SIZE]);
        data.extend_from_slice(&[0; COPYRIGHT_SIZE]);
        LcdFile::from_bytes(data).expect("valid")
    }

    #[test]
    fn default_config_builds_a_blank_device() {
        let vmu = Vmu::new(&VmuConfig::default());
        assert!(vmu.flash().data().iter().all(|&b| b == 0));
        assert!(vmu.animation().is_none());
        assert!(!vmu.lcd().screen_enabled());
    }

    #[test]
    fn flash_image_is_preloaded() {
        let config = VmuConfig {
            flash: Some(vec![0xAB; 16]),
            ..VmuConfig::default()
        };
        let vmu = Vmu::new(&config);
        assert_eq!(vmu.flash().read_byte(15), Ok(0xAB));
        assert_eq!(vmu.flash().read_byte(16), Ok(0));
    }

    #[test]
    fn oversized_flash_image_is_rejected() {
        let config = VmuConfig {
            flash: Some(vec![0; FLASH_SIZE + 1]),
            ..VmuConfig::default()
        };
        assert!(matches!(Vmu::try_new(&config), Err(VmuError::Flash(_))));
    }

    #[test]
    #[should_panic(expected = "65536")]
    fn short_rom_panics() {
        let config = VmuConfig {
            rom: vec![0; 0x4000],
            flash: None,
        };
        let _ = Vmu::new(&config);
    }

    #[test]
    fn update_drives_the_attached_animation() {
        let mut vmu = Vmu::new(&VmuConfig::default());
        vmu.update(Duration::from_millis(10));

        vmu.start_animation(lcd_file());
        assert!(vmu.lcd().pixel(0, 0));
        vmu.update(Duration::from_millis(10));
        assert_eq!(
            vmu.animation().and_then(AnimationPlayer::current_frame),
            Some(1)
        );
        assert!(!vmu.lcd().pixel(0, 0));

        let (player, lcd) = vmu.animation_controls().expect("attached");
        player.step_back(lcd);
        player.pause();
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert!(vmu.lcd().pixel(0, 0));
    }

    #[test]
    fn unload_detaches_the_file() {
        let mut vmu = Vmu::new(&VmuConfig::default());
        vmu.start_animation(lcd_file());
        let file = vmu.unload_lcd_file().expect("was attached");
        assert_eq!(file.frame_count(), 2);
        assert!(vmu.animation().is_none());
        assert!(vmu.unload_lcd_file().is_none());
    }

    #[test]
    fn missing_lcd_file_leaves_nothing_attached() {
        let mut vmu = Vmu::new(&VmuConfig::default());
        let err = vmu
            .load_lcd_file("/nonexistent/animation.lcd")
            .expect_err("missing file");
        assert!(matches!(err, VmuError::Lcd(LcdError::Io(_))));
        assert!(vmu.animation().is_none());
    }

    #[test]
    fn reset_keeps_flash_and_detaches_animation() {
        let mut vmu = Vmu::new(&VmuConfig::default());
        vmu.flash_mut().write_byte(0x100, 7).expect("write");
        vmu.start_animation(lcd_file());
        vmu.reset();
        assert!(vmu.animation().is_none());
        assert_eq!(vmu.flash().read_byte(0x100), Ok(7));
        assert!(!vmu.lcd().screen_enabled());
    }
}
