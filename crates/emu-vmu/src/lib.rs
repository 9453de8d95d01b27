//! Sega Visual Memory Unit storage and display subsystem.
//!
//! The VMU is a Dreamcast memory card with its own LC86K-series CPU, a
//! 48×32 monochrome LCD and 128 KiB of flash. This crate models everything
//! around the CPU core:
//!
//! - [`Memory`]: the bank-switched program and data spaces
//! - [`Flash`]: flash storage behind its program-unlock sequence
//! - [`Lcd`]: the panel state the animation player draws on
//! - [`AnimationPlayer`]: `.LCD` animation playback
//! - [`vms`]: reading VMS save files straight out of flash
//! - device snapshots via [`Vmu::save_state`] and [`Vmu::load_state`]
//!
//! Everything is single-threaded and synchronous.

mod animation;
mod config;
mod flash;
mod lcd;
mod memory;
mod snapshot;
pub mod vms;
mod vmu;

pub use animation::{AnimationPlayer, PlaybackState};
pub use config::VmuConfig;
pub use flash::{
    FLASH_BANK_COUNT, FLASH_BANK_SIZE, FLASH_SIZE, Flash, FlashError, FlashObserver,
    PROGRAM_BYTES, ProgramState, Transfer, program_address, program_value,
};
pub use lcd::{LCD_PIXELS, Lcd, LcdDisplay, LcdIcons};
pub use memory::{
    DATA_ADDRESS_MASK, EXT_FLASH_BANK_0, EXT_FLASH_BANK_1, EXT_ROM, Memory, MemoryError,
    PSW_RAM_BANK, RAM_BANK_COUNT, RAM_BANK_SIZE, ROM_SIZE, Region, SFR_BASE, SFR_EXT, SFR_PSW,
    SFR_SIZE, SFR_XBNK, XRAM_BANK_COUNT, XRAM_BANK_SIZE, XRAM_BASE,
};
pub use snapshot::{SNAPSHOT_SIZE, SnapshotError};
pub use vmu::{Vmu, VmuError};
