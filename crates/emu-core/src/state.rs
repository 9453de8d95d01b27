//! Fixed-layout snapshot image encoding.
//!
//! Multi-byte fields are little-endian. There is no framing, tagging or
//! version field: the image is the concatenation of every peripheral's
//! fields in a fixed order, so its size is a compile-time property of the
//! device.

use thiserror::Error;

/// Snapshot decoding error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The image ended before a field could be read in full.
    #[error("state image truncated at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Appends state fields to a growing image.
#[derive(Debug, Default)]
pub struct StateWriter {
    data: Vec<u8>,
}

impl StateWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the buffer for an image of known length.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_bool(&mut self, value: bool) {
        self.data.push(u8::from(value));
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Reads state fields back out of an image, front to back.
#[derive(Debug)]
pub struct StateReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> StateReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current read position.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], StateError> {
        if self.remaining() < needed {
            return Err(StateError::Truncated {
                offset: self.offset,
                needed,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(bytes)
    }

    pub fn u8(&mut self) -> Result<u8, StateError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, StateError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn bool(&mut self) -> Result<bool, StateError> {
        Ok(self.u8()? != 0)
    }

    /// Copy the next `dest.len()` bytes into `dest`.
    ///
    /// A short image still copies everything that is left before reporting
    /// the error, the same as a short `fread` into live memory would.
    pub fn read_into(&mut self, dest: &mut [u8]) -> Result<(), StateError> {
        let available = self.remaining().min(dest.len());
        dest[..available].copy_from_slice(&self.data[self.offset..self.offset + available]);
        if available < dest.len() {
            let err = StateError::Truncated {
                offset: self.offset,
                needed: dest.len(),
                available,
            };
            self.offset += available;
            return Err(err);
        }
        self.offset += available;
        Ok(())
    }
}
