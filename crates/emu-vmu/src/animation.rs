//! `.LCD` animation playback.
//!
//! The player owns a validated [`LcdFile`] and a cursor into it, and pushes
//! frames to any [`LcdDisplay`]. It is driven by [`AnimationPlayer::update`]
//! once per host tick.
//!
//! Each call evaluates at most one frame advance, however large `delta` is.
//! A tick that spans several frame delays moves one frame and carries the
//! rest of the time forward only until the next advance resets it.

use std::time::Duration;

use format_lcd::{LCD_WIDTH, LcdFile, PIXEL_ON, REPEAT_INFINITE};
use log::debug;

use crate::lcd::{LcdDisplay, LcdIcons};

const LOG_TARGET: &str = "vmu::lcd_file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    /// The last repeat finished. The final frame stays on screen.
    Complete,
}

/// Playback cursor over an animation file.
#[derive(Debug, Clone)]
pub struct AnimationPlayer {
    file: LcdFile,
    current_frame: Option<usize>,
    elapsed: Duration,
    loop_count: u16,
    state: PlaybackState,
}

impl AnimationPlayer {
    /// Attach a file without touching any display. Nothing is shown until a
    /// frame is started.
    #[must_use]
    pub fn new(file: LcdFile) -> Self {
        Self {
            file,
            current_frame: None,
            elapsed: Duration::ZERO,
            loop_count: 0,
            state: PlaybackState::Stopped,
        }
    }

    /// Attach a file and start playing it: turn the screen on, show frame 0
    /// and hide the status icons.
    pub fn start(file: LcdFile, display: &mut impl LcdDisplay) -> Self {
        let mut player = Self::new(file);
        display.set_screen_enabled(true);
        display.set_refresh_enabled(true);
        player.start_frame(display, 0);
        display.set_icons(LcdIcons::empty());
        player.state = PlaybackState::Playing;
        debug!(
            target: LOG_TARGET,
            "playing {} frame animation", player.file.frame_count()
        );
        player
    }

    #[must_use]
    pub fn file(&self) -> &LcdFile {
        &self.file
    }

    /// Detach and hand the file back.
    #[must_use]
    pub fn into_file(self) -> LcdFile {
        self.file
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Frame on screen, or `None` before the first frame is started.
    #[must_use]
    pub fn current_frame(&self) -> Option<usize> {
        self.current_frame
    }

    /// Time spent on the current frame.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Completed passes through the whole file.
    #[must_use]
    pub fn loop_count(&self) -> u16 {
        self.loop_count
    }

    /// Show frame `index` and restart its timer.
    ///
    /// A completed animation drops back to stopped. Returns false and
    /// changes nothing if `index` is past the last frame.
    pub fn start_frame(&mut self, display: &mut impl LcdDisplay, index: usize) -> bool {
        let Some(frame) = self.file.frame_data(index) else {
            return false;
        };
        self.current_frame = Some(index);
        self.elapsed = Duration::ZERO;
        if self.state == PlaybackState::Complete {
            self.state = PlaybackState::Stopped;
        }
        for (i, &value) in frame.iter().enumerate() {
            display.set_pixel(i % LCD_WIDTH, i / LCD_WIDTH, value == PIXEL_ON);
        }
        true
    }

    /// Advance playback by `delta`.
    pub fn update(&mut self, display: &mut impl LcdDisplay, delta: Duration) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let Some(current) = self.current_frame else {
            return;
        };

        self.elapsed += delta;
        let delay = self.file.frame_delay(current).unwrap_or_default();
        if self.elapsed < delay {
            return;
        }

        let mut next = current + 1;
        if next >= self.file.frame_count() {
            let repeat_count = self.file.repeat_count();
            if repeat_count != REPEAT_INFINITE {
                self.loop_count = self.loop_count.saturating_add(1);
                if self.loop_count >= repeat_count {
                    self.current_frame = Some(self.file.frame_count() - 1);
                    self.state = PlaybackState::Complete;
                    debug!(
                        target: LOG_TARGET,
                        "animation complete after {} loops", self.loop_count
                    );
                    return;
                }
            }
            next = 0;
        }
        self.start_frame(display, next);
    }

    /// Resume a stopped animation.
    pub fn play(&mut self) {
        if self.state == PlaybackState::Stopped {
            self.state = PlaybackState::Playing;
        }
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Stopped;
        }
    }

    /// Back to frame 0 with the loop counter cleared, playing.
    pub fn restart(&mut self, display: &mut impl LcdDisplay) {
        self.loop_count = 0;
        self.start_frame(display, 0);
        self.state = PlaybackState::Playing;
    }

    /// Show the next frame. Does nothing on the last one.
    pub fn step_forward(&mut self, display: &mut impl LcdDisplay) {
        let next = self.current_frame.map_or(0, |current| current + 1);
        self.start_frame(display, next);
    }

    /// Show the previous frame. Does nothing on the first one.
    pub fn step_back(&mut self, display: &mut impl LcdDisplay) {
        if let Some(previous) = self.current_frame.and_then(|current| current.checked_sub(1)) {
            self.start_frame(display, previous);
        }
    }
}
