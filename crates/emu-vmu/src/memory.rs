//! VMU address space and bank router.
//!
//! Two independent spaces:
//!
//! - Program space, 64 KiB: the BIOS ROM or one of the two flash banks,
//!   chosen by the EXT register.
//! - Data space, 9 bits:
//!   - `$000-$0FF`: general-purpose RAM, bank chosen by PSW bit 1
//!   - `$100-$17F`: special function registers
//!   - `$180-$1FF`: extended RAM (XRAM), bank chosen by XBNK
//!
//! The active bank of each region is never stored independently of the
//! control registers: [`Memory::recompute_from_control_bits`] derives all
//! three selectors from the SFRs, and every write that touches PSW, EXT or
//! XBNK re-runs it.
//!
//! EXT decoding:
//!
//! | bit 1 | bit 0 | Program space |
//! |-------|-------|---------------|
//! | x     | 0     | ROM           |
//! | 0     | 1     | flash bank 0  |
//! | 1     | 1     | flash bank 1  |

use emu_core::{Bus, Peripheral, StateError, StateReader, StateWriter};
use log::{debug, warn};
use thiserror::Error;

use crate::flash::{FLASH_BANK_SIZE, Flash, FlashError};

pub const ROM_SIZE: usize = 0x1_0000;

pub const RAM_BANK_SIZE: usize = 0x100;
pub const RAM_BANK_COUNT: usize = 2;
pub const XRAM_BANK_SIZE: usize = 0x80;
pub const XRAM_BANK_COUNT: usize = 3;

pub const SFR_BASE: u16 = 0x100;
pub const SFR_SIZE: usize = 0x80;
pub const XRAM_BASE: u16 = 0x180;
/// Data addresses are 9 bits wide.
pub const DATA_ADDRESS_MASK: u16 = 0x1FF;

pub const SFR_PSW: u16 = 0x101;
pub const SFR_EXT: u16 = 0x10D;
pub const SFR_XBNK: u16 = 0x125;

/// PSW bit selecting general-purpose RAM bank 1.
pub const PSW_RAM_BANK: u8 = 0x02;

pub const EXT_ROM: u8 = 0x00;
pub const EXT_FLASH_BANK_0: u8 = 0x01;
pub const EXT_FLASH_BANK_1: u8 = 0x03;
const EXT_FLASH_ENABLE: u8 = 0x01;
const EXT_FLASH_BANK: u8 = 0x02;

const LOG_TARGET: &str = "vmu::memory";

/// A logical region with more than one physical bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Index 0 is the ROM, 1 and 2 are flash banks 0 and 1.
    Program,
    Xram,
    Ram,
}

impl Region {
    #[must_use]
    pub fn bank_count(self) -> usize {
        match self {
            Self::Program => 3,
            Self::Xram => XRAM_BANK_COUNT,
            Self::Ram => RAM_BANK_COUNT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("{region:?} bank {index} does not exist ({count} banks)")]
    OutOfRange {
        region: Region,
        index: usize,
        count: usize,
    },
}

/// ROM, flash, RAM, XRAM and the SFR block, plus the derived bank
/// selectors.
pub struct Memory {
    rom: Box<[u8]>,
    flash: Flash,
    ram: [[u8; RAM_BANK_SIZE]; RAM_BANK_COUNT],
    xram: [[u8; XRAM_BANK_SIZE]; XRAM_BANK_COUNT],
    sfr: [u8; SFR_SIZE],
    program_bank: usize,
    xram_bank: usize,
    ram_bank: usize,
}

fn sfr_offset(address: u16) -> usize {
    usize::from(address - SFR_BASE)
}

impl Memory {
    /// Create the address space around a ROM image and a flash controller.
    ///
    /// # Panics
    ///
    /// Panics if `rom` is not exactly 65,536 bytes.
    #[must_use]
    pub fn new(rom: &[u8], flash: Flash) -> Self {
        assert!(
            rom.len() == ROM_SIZE,
            "VMU ROM must be exactly 65536 bytes, got {}",
            rom.len()
        );
        Self {
            rom: rom.into(),
            flash,
            ram: [[0; RAM_BANK_SIZE]; RAM_BANK_COUNT],
            xram: [[0; XRAM_BANK_SIZE]; XRAM_BANK_COUNT],
            sfr: [0; SFR_SIZE],
            program_bank: 0,
            xram_bank: 0,
            ram_bank: 0,
        }
    }

    #[must_use]
    pub fn flash(&self) -> &Flash {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut Flash {
        &mut self.flash
    }

    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    /// Raw SFR value, without any side effects.
    #[must_use]
    pub fn sfr(&self, address: u16) -> u8 {
        self.sfr[sfr_offset(address)]
    }

    /// Index of the bank currently backing `region`.
    #[must_use]
    pub fn selected(&self, region: Region) -> usize {
        match region {
            Region::Program => self.program_bank,
            Region::Xram => self.xram_bank,
            Region::Ram => self.ram_bank,
        }
    }

    /// Any bank of a region, selected or not.
    #[must_use]
    pub fn bank(&self, region: Region, index: usize) -> Option<&[u8]> {
        match (region, index) {
            (Region::Program, 0) => Some(&self.rom),
            (Region::Program, n) => self.flash.bank(n - 1),
            (Region::Xram, n) => self.xram.get(n).map(<[u8; XRAM_BANK_SIZE]>::as_slice),
            (Region::Ram, n) => self.ram.get(n).map(<[u8; RAM_BANK_SIZE]>::as_slice),
        }
    }

    /// The bank currently backing `region`.
    #[must_use]
    pub fn active_bank(&self, region: Region) -> &[u8] {
        match region {
            Region::Program if self.program_bank == 0 => &self.rom,
            Region::Program => {
                let start = (self.program_bank - 1) * FLASH_BANK_SIZE;
                &self.flash.data()[start..start + FLASH_BANK_SIZE]
            }
            Region::Xram => &self.xram[self.xram_bank],
            Region::Ram => &self.ram[self.ram_bank],
        }
    }

    /// Point `region` at bank `index` by writing the control bits that name
    /// it.
    pub fn select(&mut self, region: Region, index: usize) -> Result<(), MemoryError> {
        let count = region.bank_count();
        if index >= count {
            return Err(MemoryError::OutOfRange {
                region,
                index,
                count,
            });
        }
        match region {
            Region::Program => {
                self.sfr[sfr_offset(SFR_EXT)] =
                    [EXT_ROM, EXT_FLASH_BANK_0, EXT_FLASH_BANK_1][index];
            }
            Region::Xram => self.sfr[sfr_offset(SFR_XBNK)] = index as u8,
            Region::Ram => {
                let psw = &mut self.sfr[sfr_offset(SFR_PSW)];
                if index == 0 {
                    *psw &= !PSW_RAM_BANK;
                } else {
                    *psw |= PSW_RAM_BANK;
                }
            }
        }
        self.recompute_from_control_bits()
    }

    /// Re-derive every region's active bank from EXT, XBNK and PSW.
    ///
    /// An XBNK value naming a bank that does not exist leaves the XRAM
    /// selector where it was and is reported. The other regions are still
    /// updated.
    pub fn recompute_from_control_bits(&mut self) -> Result<(), MemoryError> {
        let ext = self.sfr(SFR_EXT);
        self.program_bank = match (ext & EXT_FLASH_ENABLE, ext & EXT_FLASH_BANK) {
            (0, _) => 0,
            (_, 0) => 1,
            _ => 2,
        };
        self.ram_bank = usize::from(self.sfr(SFR_PSW) & PSW_RAM_BANK != 0);

        let xbnk = usize::from(self.sfr(SFR_XBNK));
        let result = if xbnk < XRAM_BANK_COUNT {
            self.xram_bank = xbnk;
            Ok(())
        } else {
            warn!(target: LOG_TARGET, "XBNK set to nonexistent bank {xbnk}");
            Err(MemoryError::OutOfRange {
                region: Region::Xram,
                index: xbnk,
                count: XRAM_BANK_COUNT,
            })
        };

        debug!(
            target: LOG_TARGET,
            "banks: program {} xram {} ram {}", self.program_bank, self.xram_bank, self.ram_bank
        );
        result
    }

    /// Fetch from program space.
    #[must_use]
    pub fn read_program(&self, address: u16) -> u8 {
        self.active_bank(Region::Program)[usize::from(address)]
    }

    /// A flash write issued by running code. Goes through the unlock
    /// sequence.
    pub fn flash_write(&mut self, address: usize, value: u8) -> Result<(), FlashError> {
        self.flash.program_write(address, value)
    }
}

impl Bus for Memory {
    fn read(&mut self, address: u16) -> u8 {
        let address = address & DATA_ADDRESS_MASK;
        match address {
            0x000..SFR_BASE => self.ram[self.ram_bank][usize::from(address)],
            SFR_BASE..XRAM_BASE => self.sfr[sfr_offset(address)],
            _ => self.xram[self.xram_bank][usize::from(address - XRAM_BASE)],
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        let address = address & DATA_ADDRESS_MASK;
        match address {
            0x000..SFR_BASE => self.ram[self.ram_bank][usize::from(address)] = value,
            SFR_BASE..XRAM_BASE => {
                self.sfr[sfr_offset(address)] = value;
                if matches!(address, SFR_PSW | SFR_EXT | SFR_XBNK) {
                    // Bad XBNK values are already logged; the bus has no
                    // error path.
                    let _ = self.recompute_from_control_bits();
                }
            }
            _ => self.xram[self.xram_bank][usize::from(address - XRAM_BASE)] = value,
        }
    }
}

impl Peripheral for Memory {
    /// Clears RAM, XRAM and the SFRs, which maps the ROM and bank 0 of
    /// everything else. ROM and flash contents are kept.
    fn reset(&mut self) {
        self.ram = [[0; RAM_BANK_SIZE]; RAM_BANK_COUNT];
        self.xram = [[0; XRAM_BANK_SIZE]; XRAM_BANK_COUNT];
        self.sfr = [0; SFR_SIZE];
        self.flash.reset();
        self.program_bank = 0;
        self.xram_bank = 0;
        self.ram_bank = 0;
    }

    fn state_size(&self) -> usize {
        ROM_SIZE
            + self.flash.state_size()
            + RAM_BANK_COUNT * RAM_BANK_SIZE
            + XRAM_BANK_COUNT * XRAM_BANK_SIZE
            + SFR_SIZE
    }

    /// Bank selectors are not part of the image.
    fn save_state(&self, state: &mut StateWriter) {
        state.put_bytes(&self.rom);
        self.flash.save_state(state);
        for bank in &self.ram {
            state.put_bytes(bank);
        }
        for bank in &self.xram {
            state.put_bytes(bank);
        }
        state.put_bytes(&self.sfr);
    }

    /// Leaves the bank selectors untouched. The owner must call
    /// [`Memory::recompute_from_control_bits`] once the whole image is in.
    fn load_state(&mut self, state: &mut StateReader<'_>) -> Result<(), StateError> {
        state.read_into(&mut self.rom)?;
        self.flash.load_state(state)?;
        for bank in &mut self.ram {
            state.read_into(bank)?;
        }
        for bank in &mut self.xram {
            state.read_into(bank)?;
        }
        state.read_into(&mut self.sfr)
    }
}
