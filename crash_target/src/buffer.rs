//! The fixed-size input buffer and the single read that fills it.

use std::io::Read;

use crate::Error;

/// How many bytes the target consumes from stdin, at most.
pub const BUFFER_CAPACITY: usize = 100;

/// A zero-filled, fixed-capacity byte buffer plus the number of bytes the read delivered.
///
/// Bytes past [`InputBuffer::len`] are never written and stay zero, so looking at any
/// offset below [`BUFFER_CAPACITY`] is well-defined even for short inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBuffer {
    bytes: [u8; BUFFER_CAPACITY],
    len: usize,
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBuffer {
    /// Creates an all-zero buffer that has not received anything yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: [0; BUFFER_CAPACITY],
            len: 0,
        }
    }

    /// Fills a fresh buffer with exactly one call to [`Read::read`].
    ///
    /// There is no retry and no accumulation of partial reads: whatever the
    /// first read returns is the input. A read of zero bytes is reported as
    /// [`Error::EmptyInput`].
    pub fn read_once<R>(reader: &mut R) -> Result<Self, Error>
    where
        R: Read + ?Sized,
    {
        let mut buffer = Self::new();
        let len = reader.read(&mut buffer.bytes).map_err(Error::read)?;
        if len == 0 {
            return Err(Error::empty_input());
        }
        buffer.len = len;
        log::debug!("read {len} bytes from stdin");
        Ok(buffer)
    }

    /// Number of bytes the read actually delivered.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if nothing has been read into this buffer.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The received bytes, without the zero tail.
    #[inline]
    #[must_use]
    pub fn received(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The whole buffer, including unread (zero) positions.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; BUFFER_CAPACITY] {
        &self.bytes
    }

    /// The byte at `offset`; unread positions yield `0`.
    ///
    /// # Panics
    /// If `offset >= BUFFER_CAPACITY`.
    #[inline]
    #[must_use]
    pub fn byte_at(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }
}
