//! The append-only output buffer.
//!
//! The buffer is exclusively owned by one [`crate::Builder`]. Offsets it hands out stay
//! valid for its whole lifetime: bytes are only ever appended, never moved or removed.

use crate::format::{BitWidth, padding_bytes};

/// A growable byte sequence with a monotonically advancing write cursor.
#[derive(Debug, Clone)]
pub struct Buffer {
    bytes: Vec<u8>,
    /// Logical capacity. Doubles whenever a write would exceed it.
    capacity: usize,
}

impl Buffer {
    /// Creates an empty buffer with room for `initial_capacity` bytes.
    pub fn with_capacity(initial_capacity: usize) -> Self {
        let capacity = initial_capacity.max(1);
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Current cursor position, i.e. the offset of the next written byte.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Logical capacity before the next doubling.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Everything written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Drops all content, keeping the allocation.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    fn reserve(&mut self, additional: usize) {
        let needed = self.bytes.len() + additional;
        if needed <= self.capacity {
            return;
        }
        let mut capacity = self.capacity;
        while capacity < needed {
            capacity = capacity.saturating_mul(2);
        }
        self.bytes.reserve_exact(capacity - self.bytes.len());
        self.capacity = capacity;
    }

    /// Appends `data` and returns the offset where the write started.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.reserve(data.len());
        let start = self.bytes.len();
        self.bytes.extend_from_slice(data);
        start
    }

    /// Appends a single byte.
    pub fn push(&mut self, byte: u8) {
        self.reserve(1);
        self.bytes.push(byte);
    }

    /// Writes zero padding until the cursor is a multiple of `width`'s byte width.
    /// Returns that byte width.
    pub fn align(&mut self, width: BitWidth) -> usize {
        let byte_width = width.byte_width();
        let padding = padding_bytes(self.bytes.len(), byte_width);
        self.reserve(padding);
        self.bytes.resize(self.bytes.len() + padding, 0);
        byte_width
    }

    /// Writes the low `byte_width` bytes of `value`, little endian.
    pub fn write_u64(&mut self, value: u64, byte_width: usize) {
        let le = value.to_le_bytes();
        self.write(&le[..byte_width.min(8)]);
    }

    /// Writes the low `byte_width` bytes of a two's complement `value`, little endian.
    pub fn write_i64(&mut self, value: i64, byte_width: usize) {
        let le = value.to_le_bytes();
        self.write(&le[..byte_width.min(8)]);
    }

    /// Writes a float as f32 (`byte_width` 4) or f64 (`byte_width` 8).
    ///
    /// Returns false for any other width; floats never occupy narrower slots.
    pub fn write_f64(&mut self, value: f64, byte_width: usize) -> bool {
        match byte_width {
            4 => {
                self.write(&(value as f32).to_le_bytes());
                true
            }
            8 => {
                self.write(&value.to_le_bytes());
                true
            }
            _ => false,
        }
    }

    /// Writes the backwards distance from the cursor to `target`.
    pub fn write_offset(&mut self, target: usize, byte_width: usize) {
        let relative = self.bytes.len() - target;
        self.write_u64(relative as u64, byte_width);
    }

    /// Consumes the buffer, returning its bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::with_capacity(crate::constants::DEFAULT_BUFFER_SIZE)
    }
}
