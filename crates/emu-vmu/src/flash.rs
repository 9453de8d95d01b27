//! Flash storage controller.
//!
//! 128 KiB of flash split into two 64 KiB banks. Ordinary byte I/O through
//! [`Flash::read_bytes`] / [`Flash::write_bytes`] is always clamped to the
//! capacity. Writes issued by running code go through
//! [`Flash::program_write`] instead, which only reaches storage after the
//! three-step unlock sequence:
//!
//! | Step | Address  | Value |
//! |------|----------|-------|
//! | 0    | `$5555`  | `$AA` |
//! | 1    | `$2AAA`  | `$55` |
//! | 2    | `$5555`  | `$A0` |
//!
//! Any other write during the sequence drops back to step 0. Once unlocked,
//! the next [`PROGRAM_BYTES`] writes are stored and the controller locks
//! again.

use emu_core::{Peripheral, StateError, StateReader, StateWriter};
use log::{debug, trace, warn};
use thiserror::Error;

/// Total flash capacity.
pub const FLASH_SIZE: usize = 0x2_0000;

/// Size of each of the two banks the program window can map.
pub const FLASH_BANK_SIZE: usize = 0x1_0000;

pub const FLASH_BANK_COUNT: usize = FLASH_SIZE / FLASH_BANK_SIZE;

/// Bytes stored per unlock.
pub const PROGRAM_BYTES: usize = 128;

const LOG_TARGET: &str = "vmu::flash";

/// Access that starts outside the flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlashError {
    #[error("flash address {address:#07X} is outside capacity {capacity:#07X}")]
    OutOfRange { address: usize, capacity: usize },
}

/// Outcome of a ranged transfer.
///
/// `truncated` is set when the request ran past the end of flash and was
/// cut short. That is not an error: `bytes` were still transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub bytes: usize,
    pub truncated: bool,
}

/// Position in the unlock sequence.
///
/// `State0` is also the idle state the controller returns to on a bad write
/// or at the end of a program burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ProgramState {
    #[default]
    State0,
    State1,
    State2,
    Unlocked,
}

const PROGRAM_ADDRESS: [usize; 3] = [0x5555, 0x2AAA, 0x5555];
const PROGRAM_VALUE: [u8; 3] = [0xAA, 0x55, 0xA0];

impl ProgramState {
    fn step(self) -> Option<usize> {
        match self {
            Self::State0 => Some(0),
            Self::State1 => Some(1),
            Self::State2 => Some(2),
            Self::Unlocked => None,
        }
    }

    fn next(self) -> Self {
        match self {
            Self::State0 => Self::State1,
            Self::State1 => Self::State2,
            Self::State2 | Self::Unlocked => Self::Unlocked,
        }
    }

    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::State0),
            1 => Some(Self::State1),
            2 => Some(Self::State2),
            3 => Some(Self::Unlocked),
            _ => None,
        }
    }
}

/// Address the sequence expects in `state`. `None` once unlocked.
#[must_use]
pub fn program_address(state: ProgramState) -> Option<usize> {
    state.step().map(|step| PROGRAM_ADDRESS[step])
}

/// Value the sequence expects in `state`. `None` once unlocked.
#[must_use]
pub fn program_value(state: ProgramState) -> Option<u8> {
    state.step().map(|step| PROGRAM_VALUE[step])
}

/// Receives every successful flash write.
///
/// Called synchronously from inside the write. Implementations must not call
/// back into the flash or the address space.
pub trait FlashObserver {
    fn flash_changed(&mut self, address: usize, data: &[u8]);
}

impl<F: FnMut(usize, &[u8])> FlashObserver for F {
    fn flash_changed(&mut self, address: usize, data: &[u8]) {
        self(address, data);
    }
}

/// The flash controller. Owns the storage exclusively.
pub struct Flash {
    data: Box<[u8]>,
    state: ProgramState,
    program_bytes: usize,
    changed: bool,
    observer: Option<Box<dyn FlashObserver>>,
}

impl std::fmt::Debug for Flash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flash")
            .field("capacity", &self.data.len())
            .field("state", &self.state)
            .field("program_bytes", &self.program_bytes)
            .field("changed", &self.changed)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for Flash {
    fn default() -> Self {
        Self::new()
    }
}

impl Flash {
    /// Blank (zeroed) flash.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: vec![0; FLASH_SIZE].into_boxed_slice(),
            state: ProgramState::State0,
            program_bytes: 0,
            changed: false,
            observer: None,
        }
    }

    /// Flash preloaded with `image`. Shorter images are zero padded.
    pub fn with_image(image: &[u8]) -> Result<Self, FlashError> {
        if image.len() > FLASH_SIZE {
            return Err(FlashError::OutOfRange {
                address: image.len(),
                capacity: FLASH_SIZE,
            });
        }
        let mut flash = Self::new();
        flash.data[..image.len()].copy_from_slice(image);
        Ok(flash)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Whole storage.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One 64 KiB bank, or `None` past the last bank.
    #[must_use]
    pub fn bank(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(FLASH_BANK_SIZE)?;
        let end = start.checked_add(FLASH_BANK_SIZE)?;
        self.data.get(start..end)
    }

    #[must_use]
    pub fn program_state(&self) -> ProgramState {
        self.state
    }

    /// Bytes stored since the last unlock.
    #[must_use]
    pub fn program_bytes(&self) -> usize {
        self.program_bytes
    }

    #[must_use]
    pub fn unlocked(&self) -> bool {
        self.state == ProgramState::Unlocked
    }

    /// Set by every successful write until cleared.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    /// Install the write observer, replacing any previous one.
    pub fn set_observer(&mut self, observer: impl FlashObserver + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn take_observer(&mut self) -> Option<Box<dyn FlashObserver>> {
        self.observer.take()
    }

    #[must_use]
    pub fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    fn clamp(&self, address: usize, requested: usize) -> Result<Transfer, FlashError> {
        let capacity = self.data.len();
        if address >= capacity {
            warn!(target: LOG_TARGET, "access at {address:#07X} is beyond flash capacity");
            return Err(FlashError::OutOfRange { address, capacity });
        }
        let bytes = requested.min(capacity - address);
        let truncated = bytes < requested;
        if truncated {
            debug!(
                target: LOG_TARGET,
                "truncating {requested} byte access at {address:#07X} to {bytes}"
            );
        }
        Ok(Transfer { bytes, truncated })
    }

    /// Copy flash starting at `address` into `buffer`.
    ///
    /// Only the first `bytes` of `buffer` are filled when the request runs
    /// past the end of flash.
    pub fn read_bytes(&self, address: usize, buffer: &mut [u8]) -> Result<Transfer, FlashError> {
        let transfer = self.clamp(address, buffer.len())?;
        buffer[..transfer.bytes].copy_from_slice(&self.data[address..address + transfer.bytes]);
        Ok(transfer)
    }

    /// Store `data` at `address`, mark the flash changed and notify the
    /// observer.
    pub fn write_bytes(&mut self, address: usize, data: &[u8]) -> Result<Transfer, FlashError> {
        let transfer = self.clamp(address, data.len())?;
        let end = address + transfer.bytes;
        self.data[address..end].copy_from_slice(&data[..transfer.bytes]);
        self.changed = true;
        if let Some(observer) = self.observer.as_mut() {
            observer.flash_changed(address, &self.data[address..end]);
        }
        Ok(transfer)
    }

    pub fn read_byte(&self, address: usize) -> Result<u8, FlashError> {
        let mut value = [0u8];
        self.read_bytes(address, &mut value)?;
        Ok(value[0])
    }

    pub fn write_byte(&mut self, address: usize, value: u8) -> Result<(), FlashError> {
        self.write_bytes(address, &[value]).map(|_| ())
    }

    /// A write from running code.
    ///
    /// Advances the unlock sequence, or stores the byte if the controller is
    /// already unlocked. Sequence addresses compare against the low 16 bits
    /// so that the commands work from either bank. Only stored bytes count
    /// towards the program burst.
    pub fn program_write(&mut self, address: usize, value: u8) -> Result<(), FlashError> {
        if self.state == ProgramState::Unlocked {
            self.write_byte(address, value)?;
            self.program_bytes += 1;
            if self.program_bytes >= PROGRAM_BYTES {
                debug!(
                    target: LOG_TARGET,
                    "program burst of {} bytes complete, locking", self.program_bytes
                );
                self.state = ProgramState::State0;
                self.program_bytes = 0;
            }
            return Ok(());
        }

        let expected = (program_address(self.state), program_value(self.state));
        if expected == (Some(address & 0xFFFF), Some(value)) {
            self.state = self.state.next();
            trace!(target: LOG_TARGET, "unlock sequence advanced to {:?}", self.state);
            if self.state == ProgramState::Unlocked {
                self.program_bytes = 0;
            }
        } else if self.state != ProgramState::State0 {
            trace!(
                target: LOG_TARGET,
                "unlock sequence broken by {value:#04X} at {address:#07X}"
            );
            self.state = ProgramState::State0;
        }
        Ok(())
    }
}

impl Peripheral for Flash {
    /// Storage survives a reset. Only the controller state is cleared.
    fn reset(&mut self) {
        self.state = ProgramState::State0;
        self.program_bytes = 0;
    }

    fn state_size(&self) -> usize {
        FLASH_SIZE + 1 + 2 + 1
    }

    fn save_state(&self, state: &mut StateWriter) {
        state.put_bytes(&self.data);
        state.put_u8(self.state as u8);
        state.put_u16(self.program_bytes as u16);
        state.put_bool(self.changed);
    }

    fn load_state(&mut self, state: &mut StateReader<'_>) -> Result<(), StateError> {
        state.read_into(&mut self.data)?;
        let raw = state.u8()?;
        self.state = ProgramState::from_raw(raw).unwrap_or_else(|| {
            warn!(target: LOG_TARGET, "unknown program state {raw} in snapshot, locking");
            ProgramState::State0
        });
        self.program_bytes = usize::from(state.u16()?);
        self.changed = state.bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn unlock(flash: &mut Flash) {
        for (address, value) in PROGRAM_ADDRESS.into_iter().zip(PROGRAM_VALUE) {
            flash.program_write(address, value).expect("sequence write");
        }
    }

    #[test]
    fn lookup_tables() {
        assert_eq!(program_address(ProgramState::State0), Some(0x5555));
        assert_eq!(program_value(ProgramState::State1), Some(0x55));
        assert_eq!(program_address(ProgramState::State2), Some(0x5555));
        assert_eq!(program_value(ProgramState::State2), Some(0xA0));
        assert_eq!(program_address(ProgramState::Unlocked), None);
    }

    #[test]
    fn full_sequence_unlocks() {
        let mut flash = Flash::new();
        flash.program_write(0x5555, 0xAA).expect("step 0");
        assert_eq!(flash.program_state(), ProgramState::State1);
        flash.program_write(0x2AAA, 0x55).expect("step 1");
        assert_eq!(flash.program_state(), ProgramState::State2);
        assert!(!flash.unlocked());
        flash.program_write(0x5555, 0xA0).expect("step 2");
        assert!(flash.unlocked());
        assert!(!flash.changed());
    }

    #[test]
    fn wrong_value_or_address_resets() {
        let mut flash = Flash::new();
        flash.program_write(0x5555, 0xAA).expect("step 0");
        flash.program_write(0x2AAA, 0x56).expect("bad value");
        assert_eq!(flash.program_state(), ProgramState::State0);

        flash.program_write(0x5555, 0xAA).expect("step 0");
        flash.program_write(0x2AAB, 0x55).expect("bad address");
        assert_eq!(flash.program_state(), ProgramState::State0);

        flash.program_write(0x5555, 0xAA).expect("step 0");
        flash.program_write(0x2AAA, 0x55).expect("step 1");
        assert_eq!(flash.program_state(), ProgramState::State2);
        flash.program_write(0x5555, 0xA1).expect("bad final value");
        assert_eq!(flash.program_state(), ProgramState::State0);
        assert!(!flash.unlocked());
    }

    #[test]
    fn failed_burst_write_is_not_counted() {
        let mut flash = Flash::new();
        for (address, value) in [(0x5555, 0xAA), (0x2AAA, 0x55), (0x5555, 0xA0)] {
            flash.program_write(address, value).expect("sequence write");
        }
        assert!(matches!(
            flash.program_write(FLASH_SIZE, 0x12),
            Err(FlashError::OutOfRange { .. })
        ));
        assert_eq!(flash.program_bytes(), 0);
        assert!(flash.unlocked());

        flash.program_write(0x10, 0x34).expect("write");
        assert_eq!(flash.program_bytes(), 1);
    }

    #[test]
    fn locked_writes_never_reach_storage() {
        let mut flash = Flash::new();
        flash.program_write(0x0100, 0x42).expect("write");
        assert_eq!(flash.read_byte(0x0100), Ok(0));
        assert!(!flash.changed());
    }

    #[test]
    fn sequence_works_in_bank_one() {
        let mut flash = Flash::new();
        for (address, value) in PROGRAM_ADDRESS.into_iter().zip(PROGRAM_VALUE) {
            flash
                .program_write(FLASH_BANK_SIZE + address, value)
                .expect("sequence write");
        }
        assert!(flash.unlocked());
    }

    #[test]
    fn burst_stores_then_relocks() {
        let mut flash = Flash::new();
        unlock(&mut flash);
        for i in 0..PROGRAM_BYTES {
            flash.program_write(0x1000 + i, i as u8).expect("burst");
            if i + 1 < PROGRAM_BYTES {
                assert_eq!(flash.program_bytes(), i + 1);
                assert!(flash.unlocked());
            }
        }
        assert_eq!(flash.program_state(), ProgramState::State0);
        assert_eq!(flash.program_bytes(), 0);
        assert_eq!(flash.read_byte(0x1000 + 5), Ok(5));
        assert!(flash.changed());

        flash.program_write(0x1000, 0xEE).expect("locked write");
        assert_eq!(flash.read_byte(0x1000), Ok(0));
    }

    #[test]
    fn write_spanning_end_is_truncated() {
        let mut flash = Flash::new();
        let transfer = flash
            .write_bytes(FLASH_SIZE - 1, &[0x5A; 10])
            .expect("truncated write");
        assert_eq!(
            transfer,
            Transfer {
                bytes: 1,
                truncated: true
            }
        );
        assert_eq!(flash.read_byte(FLASH_SIZE - 1), Ok(0x5A));
    }

    #[test]
    fn read_spanning_end_is_truncated() {
        let mut flash = Flash::new();
        flash.write_bytes(FLASH_SIZE - 2, &[1, 2]).expect("write");
        let mut buffer = [0xFFu8; 4];
        let transfer = flash.read_bytes(FLASH_SIZE - 2, &mut buffer).expect("read");
        assert_eq!(transfer.bytes, 2);
        assert!(transfer.truncated);
        assert_eq!(buffer, [1, 2, 0xFF, 0xFF]);
    }

    #[test]
    fn exact_fit_is_not_truncated() {
        let mut flash = Flash::new();
        let transfer = flash.write_bytes(FLASH_SIZE - 4, &[7; 4]).expect("write");
        assert_eq!(
            transfer,
            Transfer {
                bytes: 4,
                truncated: false
            }
        );
    }

    #[test]
    fn access_past_capacity_fails_cleanly() {
        let mut flash = Flash::new();
        let calls = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&calls);
        flash.set_observer(move |_: usize, _: &[u8]| *seen.borrow_mut() += 1);

        assert_eq!(
            flash.write_bytes(FLASH_SIZE, &[1, 2, 3]),
            Err(FlashError::OutOfRange {
                address: FLASH_SIZE,
                capacity: FLASH_SIZE
            })
        );
        assert!(!flash.changed());
        assert_eq!(*calls.borrow(), 0);
        assert!(flash.read_byte(FLASH_SIZE + 10).is_err());
    }

    #[test]
    fn observer_sees_each_write() {
        let mut flash = Flash::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        flash.set_observer(move |address: usize, data: &[u8]| {
            sink.borrow_mut().push((address, data.to_vec()));
        });

        flash.write_bytes(0x200, &[1, 2, 3]).expect("write");
        flash.write_bytes(FLASH_SIZE - 1, &[9, 9]).expect("write");

        assert_eq!(
            *log.borrow(),
            vec![(0x200, vec![1, 2, 3]), (FLASH_SIZE - 1, vec![9])]
        );
        assert!(flash.changed());
        flash.clear_changed();
        assert!(!flash.changed());
    }

    #[test]
    fn banks_are_views_into_storage() {
        let mut flash = Flash::new();
        flash.write_byte(FLASH_BANK_SIZE + 3, 0x77).expect("write");
        assert_eq!(flash.bank(1).expect("bank 1")[3], 0x77);
        assert_eq!(flash.bank(0).expect("bank 0")[3], 0);
        assert!(flash.bank(FLASH_BANK_COUNT).is_none());
        assert!(flash.bank(usize::MAX / FLASH_BANK_SIZE).is_none());
        assert!(flash.bank(usize::MAX).is_none());
    }

    #[test]
    fn image_must_fit() {
        let flash = Flash::with_image(&[1, 2, 3]).expect("small image");
        assert_eq!(&flash.data()[..4], &[1, 2, 3, 0]);
        assert!(Flash::with_image(&vec![0; FLASH_SIZE + 1]).is_err());
    }

    #[test]
    fn state_round_trip_keeps_controller_state() {
        let mut flash = Flash::new();
        flash.write_byte(0x10, 0xAB).expect("write");
        flash.program_write(0x5555, 0xAA).expect("step 0");

        let mut writer = StateWriter::new();
        flash.save_state(&mut writer);
        assert_eq!(writer.len(), flash.state_size());
        let image = writer.into_bytes();

        let mut restored = Flash::new();
        restored
            .load_state(&mut StateReader::new(&image))
            .expect("load");
        assert_eq!(restored.read_byte(0x10), Ok(0xAB));
        assert_eq!(restored.program_state(), ProgramState::State1);
        assert!(restored.changed());
    }
}
