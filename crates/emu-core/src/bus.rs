//! Memory and I/O bus interface.

/// Memory and I/O bus interface.
///
/// The processor core reaches RAM, special function registers and banked
/// regions through this trait. The implementation owns address decoding and
/// routes each access to whichever physical bank is currently active.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    ///
    /// Writes that land on bank-select registers take effect before the call
    /// returns, so the next access already sees the new mapping.
    fn write(&mut self, address: u16, value: u8);
}
