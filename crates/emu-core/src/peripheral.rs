//! Capability set shared by every device peripheral.

use crate::{StateError, StateReader, StateWriter};

/// A device peripheral that can be reset and snapshotted.
///
/// Only genuine emulated state goes into a snapshot. Host-side attachments
/// (observers, callbacks, file handles) and anything derivable from other
/// serialized fields are left out and rebuilt by the owner after a restore.
pub trait Peripheral {
    /// Return the peripheral to its power-on state.
    fn reset(&mut self);

    /// Number of bytes `save_state` appends. Constant for a given build.
    fn state_size(&self) -> usize;

    /// Append this peripheral's state to the image.
    fn save_state(&self, state: &mut StateWriter);

    /// Overwrite this peripheral's state from the image.
    ///
    /// Reads straight into live state. On a short image, whatever was read
    /// before the end stays applied and the error is returned.
    fn load_state(&mut self, state: &mut StateReader<'_>) -> Result<(), StateError>;
}
