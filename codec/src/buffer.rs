//! A growable byte region with positional insert and remove.
//!
//! # Layout
//!
//! ```text
//! 0                 pos                  size
//! +------------------+--------------------+
//! |     content      |   zeroed reserve   |
//! +------------------+--------------------+
//! ```
//!
//! `pos` (the write cursor) tracks the logical length of the content: appends and inserts
//! advance it by the number of bytes added and removals pull it back. `size` is the allocated
//! capacity and only ever grows.
//!
//! # Growth
//!
//! Before a write of `n` bytes, if `pos + n > size`, the capacity grows by `max(n, size)`: at
//! least doubling, and always enough for the pending write.
//!
//! # Contract
//!
//! Inserting past the write cursor, or removing a range that extends past it, is a caller bug
//! and panics. Code that handles untrusted offsets must validate them first.

use bytes::{Bytes, BytesMut};
use tracing::trace;

/// A growable byte buffer with a write cursor.
#[derive(Clone, Debug)]
pub struct Buffer {
    // Always `size` bytes long, zero beyond `pos`.
    data: BytesMut,
    pos: usize,
}

impl Buffer {
    /// Creates an empty buffer with `size` bytes of capacity.
    pub fn new(size: usize) -> Self {
        let mut data = BytesMut::with_capacity(size);
        data.resize(size, 0);
        Self { data, pos: 0 }
    }

    /// Creates a buffer holding a copy of `content`, with at least `size` bytes of capacity.
    pub fn with_content(size: usize, content: &[u8]) -> Self {
        let mut buffer = Self::new(size.max(content.len()));
        buffer.append(content);
        buffer
    }

    /// Grows the capacity so that `n` more bytes fit after the write cursor.
    pub fn reserve(&mut self, n: usize) {
        let size = self.size();
        if self.pos + n > size {
            self.resize(size + n.max(size));
        }
    }

    /// Grows the capacity to hold at least `size` bytes in total.
    pub fn ensure(&mut self, size: usize) {
        let current = self.size();
        if size > current {
            self.resize(current + size);
        }
    }

    fn resize(&mut self, size: usize) {
        trace!(from = self.size(), to = size, "growing buffer");
        self.data.resize(size, 0);
    }

    /// Appends one byte at the write cursor.
    pub fn put_u8(&mut self, byte: u8) {
        self.reserve(1);
        self.data[self.pos] = byte;
        self.pos += 1;
    }

    /// Appends `bytes` at the write cursor.
    pub fn append(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.data[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    /// Inserts one byte at `pos`.
    pub fn insert_u8(&mut self, pos: usize, byte: u8) {
        self.insert(pos, &[byte]);
    }

    /// Inserts `bytes` at `pos`, shifting `[pos, tell())` right.
    ///
    /// # Panics
    ///
    /// Panics if `pos > tell()`.
    pub fn insert(&mut self, pos: usize, bytes: &[u8]) {
        assert!(
            pos <= self.pos,
            "insert out of range: {pos} > {}",
            self.pos
        );
        let n = bytes.len();
        self.reserve(n);
        self.data.copy_within(pos..self.pos, pos + n);
        self.data[pos..pos + n].copy_from_slice(bytes);
        self.pos += n;
    }

    /// Removes `len` bytes at `pos`, shifting the tail left.
    ///
    /// # Panics
    ///
    /// Panics if `pos + len > tell()`.
    pub fn remove(&mut self, pos: usize, len: usize) {
        let end = pos
            .checked_add(len)
            .filter(|end| *end <= self.pos)
            .unwrap_or_else(|| panic!("remove out of range: {pos} + {len} > {}", self.pos));
        self.data.copy_within(end..self.pos, pos);
        let tail = self.pos - len;
        self.data[tail..self.pos].fill(0);
        self.pos = tail;
    }

    /// Returns up to `len` bytes starting at `pos`.
    ///
    /// Reads are clamped to the capacity rather than the content: bytes between the write
    /// cursor and the capacity read as zero, and anything past the capacity is cut off.
    pub fn read_at(&self, pos: usize, len: usize) -> &[u8] {
        let size = self.size();
        let start = pos.min(size);
        let end = pos.saturating_add(len).min(size);
        &self.data[start..end]
    }

    /// Returns the content byte at `pos`.
    ///
    /// # Panics
    ///
    /// Panics if `pos >= tell()`.
    pub fn at(&self, pos: usize) -> u8 {
        assert!(pos < self.pos, "at out of range: {pos} >= {}", self.pos);
        self.data[pos]
    }

    /// Returns the write cursor (the length of the content).
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Returns the allocated capacity.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns the content.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.pos]
    }

    /// Returns a copy of the content.
    pub fn freeze(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_slice())
    }
}
