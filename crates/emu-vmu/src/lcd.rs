//! LCD display state.
//!
//! The 48×32 monochrome panel plus the four status icons printed below it.
//! Anything that draws on the screen does so through [`LcdDisplay`]; the
//! device's own [`Lcd`] just records what it is told so that a front end can
//! render it later.

use bitflags::bitflags;
use emu_core::{Peripheral, StateError, StateReader, StateWriter};
use format_lcd::{LCD_HEIGHT, LCD_WIDTH};

pub const LCD_PIXELS: usize = LCD_WIDTH * LCD_HEIGHT;

bitflags! {
    /// Status icons under the dot-matrix area.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LcdIcons: u8 {
        const FILE  = 1 << 0;
        const GAME  = 1 << 1;
        const CLOCK = 1 << 2;
        const FLASH = 1 << 3;
    }
}

/// Drawing interface the animation player talks to.
pub trait LcdDisplay {
    fn set_pixel(&mut self, x: usize, y: usize, on: bool);
    fn set_screen_enabled(&mut self, enabled: bool);
    fn set_refresh_enabled(&mut self, enabled: bool);
    fn set_icons(&mut self, icons: LcdIcons);
}

/// The device's panel.
#[derive(Debug, Clone)]
pub struct Lcd {
    pixels: [bool; LCD_PIXELS],
    screen_enabled: bool,
    refresh_enabled: bool,
    icons: LcdIcons,
    /// Set whenever the picture changes; cleared by the front end.
    screen_changed: bool,
}

impl Default for Lcd {
    fn default() -> Self {
        Self::new()
    }
}

impl Lcd {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pixels: [false; LCD_PIXELS],
            screen_enabled: false,
            refresh_enabled: false,
            icons: LcdIcons::empty(),
            screen_changed: false,
        }
    }

    /// Pixel state; off-screen coordinates read as dark.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < LCD_WIDTH && y < LCD_HEIGHT && self.pixels[y * LCD_WIDTH + x]
    }

    /// Row-major pixel states.
    #[must_use]
    pub fn pixels(&self) -> &[bool] {
        &self.pixels
    }

    #[must_use]
    pub fn screen_enabled(&self) -> bool {
        self.screen_enabled
    }

    #[must_use]
    pub fn refresh_enabled(&self) -> bool {
        self.refresh_enabled
    }

    #[must_use]
    pub fn icons(&self) -> LcdIcons {
        self.icons
    }

    #[must_use]
    pub fn screen_changed(&self) -> bool {
        self.screen_changed
    }

    /// Force the front end to redraw.
    pub fn mark_changed(&mut self) {
        self.screen_changed = true;
    }

    pub fn clear_changed(&mut self) {
        self.screen_changed = false;
    }
}

impl LcdDisplay for Lcd {
    fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        if x < LCD_WIDTH && y < LCD_HEIGHT {
            let pixel = &mut self.pixels[y * LCD_WIDTH + x];
            if *pixel != on {
                *pixel = on;
                self.screen_changed = true;
            }
        }
    }

    fn set_screen_enabled(&mut self, enabled: bool) {
        self.screen_enabled = enabled;
        self.screen_changed = true;
    }

    fn set_refresh_enabled(&mut self, enabled: bool) {
        self.refresh_enabled = enabled;
    }

    fn set_icons(&mut self, icons: LcdIcons) {
        if self.icons != icons {
            self.icons = icons;
            self.screen_changed = true;
        }
    }
}

impl Peripheral for Lcd {
    fn reset(&mut self) {
        *self = Self::new();
    }

    fn state_size(&self) -> usize {
        LCD_PIXELS + 4
    }

    fn save_state(&self, state: &mut StateWriter) {
        for &pixel in &self.pixels {
            state.put_bool(pixel);
        }
        state.put_bool(self.screen_enabled);
        state.put_bool(self.refresh_enabled);
        state.put_u8(self.icons.bits());
        state.put_bool(self.screen_changed);
    }

    fn load_state(&mut self, state: &mut StateReader<'_>) -> Result<(), StateError> {
        for pixel in &mut self.pixels {
            *pixel = state.bool()?;
        }
        self.screen_enabled = state.bool()?;
        self.refresh_enabled = state.bool()?;
        self.icons = LcdIcons::from_bits_truncate(state.u8()?);
        self.screen_changed = state.bool()?;
        Ok(())
    }
}
