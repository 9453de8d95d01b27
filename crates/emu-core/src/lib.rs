//! Core traits and types shared by every VMU component.
//!
//! Components expose byte access through [`Bus`] and take part in device
//! snapshots through [`Peripheral`]. Snapshot images are flat, fixed-layout
//! byte streams produced by [`StateWriter`] and consumed by [`StateReader`].

mod bus;
mod peripheral;
mod state;

pub use bus::Bus;
pub use peripheral::Peripheral;
pub use state::{StateError, StateReader, StateWriter};
