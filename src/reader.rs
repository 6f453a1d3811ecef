//! The Read-Side Engine.
//!
//! Validates the trailer of a finished buffer and provides zero-copy random access to
//! the tree through [`Reference`] handles. Buffers come from memory or from a
//! memory-mapped file. Every read is bounds checked, so a truncated or corrupted buffer
//! yields [`FlexError::Format`] rather than a panic.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::constants::MAX_DECODE_DEPTH;
use crate::error::{FlexError, Result};
use crate::format::{BitWidth, PackedType, TRAILER_FIXED_SIZE, ValueType};
use crate::value::Value;

#[derive(Debug)]
enum Source {
    Memory(Vec<u8>),
    Mapped(Mmap),
}

/// The main handle for reading a finished buffer.
#[derive(Debug)]
pub struct FlexReader {
    data: Source,
}

impl FlexReader {
    /// Memory-maps a file and validates its trailer.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < (TRAILER_FIXED_SIZE + 1) as u64 {
            return Err(FlexError::format("File smaller than trailer"));
        }

        // Safety: the map is only read. Concurrent modification of the file by another
        // process is outside the contract, as with any memory-mapped reader.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        let reader = Self {
            data: Source::Mapped(mmap),
        };
        root(reader.as_bytes())?;
        Ok(reader)
    }

    /// Takes ownership of finished bytes and validates their trailer.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        root(&bytes)?;
        Ok(Self {
            data: Source::Memory(bytes),
        })
    }

    /// The whole buffer.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.data {
            Source::Memory(v) => v.as_slice(),
            Source::Mapped(m) => &m[..],
        }
    }

    /// Total buffer length.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Always false for a validated reader; present for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Returns a handle to the root value.
    pub fn root(&self) -> Result<Reference<'_>> {
        root(self.as_bytes())
    }
}

/// Locates the root value of a finished buffer from its trailer.
pub fn root(buf: &[u8]) -> Result<Reference<'_>> {
    let len = buf.len();
    if len < TRAILER_FIXED_SIZE + 1 {
        return Err(FlexError::format(format!(
            "Buffer of {len} bytes is smaller than the trailer"
        )));
    }
    let root_width = usize::from(buf[len - 1]);
    BitWidth::from_byte_width(root_width)?;
    let packed = PackedType::from_byte(buf[len - 2]);
    let slot = (len - TRAILER_FIXED_SIZE)
        .checked_sub(root_width)
        .ok_or_else(|| FlexError::format("Root slot lies before the buffer start"))?;
    Reference::new(buf, slot, root_width, packed)
}

/// A view of one value: its slot position, the slot width and its packed type.
#[derive(Debug, Clone, Copy)]
pub struct Reference<'a> {
    buf: &'a [u8],
    offset: usize,
    parent_width: usize,
    value_type: ValueType,
    bit_width: BitWidth,
}

impl<'a> Reference<'a> {
    fn new(buf: &'a [u8], offset: usize, parent_width: usize, packed: PackedType) -> Result<Self> {
        Ok(Self {
            buf,
            offset,
            parent_width,
            value_type: packed.value_type()?,
            bit_width: packed.bit_width(),
        })
    }

    /// Type of the referenced value.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Width from the packed type: the slot width for inline values, the payload width
    /// otherwise.
    pub fn bit_width(&self) -> BitWidth {
        self.bit_width
    }

    /// Absolute offset of the slot holding this value.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte width of the slot holding this value.
    pub fn slot_width(&self) -> usize {
        self.parent_width
    }

    /// Absolute offset of the payload of an out-of-line value.
    pub fn payload_offset(&self) -> Result<usize> {
        if self.value_type.is_inline() {
            return Err(self.mismatch("an out-of-line value"));
        }
        self.indirect()
    }

    fn indirect(&self) -> Result<usize> {
        let relative = read_u64(self.buf, self.offset, self.parent_width)?;
        let relative = usize::try_from(relative)
            .map_err(|_| FlexError::format("Relative offset exceeds address space"))?;
        self.offset
            .checked_sub(relative)
            .ok_or_else(|| FlexError::format(format!("Offset at {} points before start", self.offset)))
    }

    fn mismatch(&self, expected: &str) -> FlexError {
        FlexError::format(format!(
            "Expected {expected} at {}, found {:?}",
            self.offset, self.value_type
        ))
    }

    /// Returns true for null.
    pub fn is_null(&self) -> bool {
        self.value_type == ValueType::Null
    }

    /// Reads a boolean.
    pub fn as_bool(&self) -> Result<bool> {
        match self.value_type {
            ValueType::Bool => Ok(read_u64(self.buf, self.offset, self.parent_width)? != 0),
            _ => Err(self.mismatch("a bool")),
        }
    }

    /// Reads a signed integer, converting from unsigned when it fits.
    pub fn as_i64(&self) -> Result<i64> {
        match self.value_type {
            ValueType::Int => read_i64(self.buf, self.offset, self.parent_width),
            ValueType::IndirectInt => {
                read_i64(self.buf, self.indirect()?, self.bit_width.byte_width())
            }
            ValueType::UInt | ValueType::IndirectUInt => i64::try_from(self.as_u64()?)
                .map_err(|_| FlexError::format("Unsigned value does not fit i64")),
            _ => Err(self.mismatch("an integer")),
        }
    }

    /// Reads an unsigned integer, converting from signed when non-negative.
    pub fn as_u64(&self) -> Result<u64> {
        match self.value_type {
            ValueType::UInt => read_u64(self.buf, self.offset, self.parent_width),
            ValueType::IndirectUInt => {
                read_u64(self.buf, self.indirect()?, self.bit_width.byte_width())
            }
            ValueType::Int | ValueType::IndirectInt => u64::try_from(self.as_i64()?)
                .map_err(|_| FlexError::format("Negative value does not fit u64")),
            _ => Err(self.mismatch("an integer")),
        }
    }

    /// Reads a float.
    pub fn as_f64(&self) -> Result<f64> {
        match self.value_type {
            ValueType::Float => read_f64(self.buf, self.offset, self.parent_width),
            ValueType::IndirectFloat => {
                read_f64(self.buf, self.indirect()?, self.bit_width.byte_width())
            }
            _ => Err(self.mismatch("a float")),
        }
    }

    /// Reads a string or a key.
    pub fn as_str(&self) -> Result<&'a str> {
        let bytes = match self.value_type {
            ValueType::String => self.sized_bytes()?,
            ValueType::Key => self.key_bytes()?,
            _ => return Err(self.mismatch("a string")),
        };
        std::str::from_utf8(bytes).map_err(|e| FlexError::format(format!("Invalid UTF-8: {e}")))
    }

    /// Reads blob bytes (strings are accepted as their raw bytes).
    pub fn as_blob(&self) -> Result<&'a [u8]> {
        match self.value_type {
            ValueType::Blob | ValueType::String => self.sized_bytes(),
            _ => Err(self.mismatch("a blob")),
        }
    }

    fn sized_bytes(&self) -> Result<&'a [u8]> {
        let start = self.indirect()?;
        let width = self.bit_width.byte_width();
        let len = read_prefixed_len(self.buf, start, width)?;
        slice(self.buf, start, len)
    }

    fn key_bytes(&self) -> Result<&'a [u8]> {
        let start = self.indirect()?;
        let tail = self
            .buf
            .get(start..)
            .ok_or_else(|| FlexError::format("Key outside buffer"))?;
        let end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| FlexError::format("Unterminated key"))?;
        Ok(&tail[..end])
    }

    /// Opens a vector (untyped, typed or fixed).
    pub fn as_vector(&self) -> Result<VectorRef<'a>> {
        let start = self.indirect()?;
        let width = self.bit_width.byte_width();
        match self.value_type {
            ValueType::Vector => VectorRef::untyped(self.buf, start, width),
            ty => match ty.typed_vector_element() {
                Some((element, 0)) => VectorRef::typed(self.buf, start, width, element, None),
                Some((element, arity)) => {
                    VectorRef::typed(self.buf, start, width, element, Some(arity))
                }
                None => Err(self.mismatch("a vector")),
            },
        }
    }

    /// Opens a map.
    pub fn as_map(&self) -> Result<MapRef<'a>> {
        if self.value_type != ValueType::Map {
            return Err(self.mismatch("a map"));
        }
        MapRef::new(self.buf, self.indirect()?, self.bit_width.byte_width())
    }

    /// Decodes the whole subtree.
    pub fn to_value(&self) -> Result<Value> {
        self.to_value_at(0)
    }

    fn to_value_at(&self, depth: usize) -> Result<Value> {
        if depth > MAX_DECODE_DEPTH {
            return Err(FlexError::format(format!(
                "Nesting deeper than {MAX_DECODE_DEPTH}"
            )));
        }
        let value = match self.value_type {
            ValueType::Null => Value::Null,
            ValueType::Bool => Value::Bool(self.as_bool()?),
            ValueType::Int | ValueType::IndirectInt => Value::Int(self.as_i64()?),
            ValueType::UInt | ValueType::IndirectUInt => Value::UInt(self.as_u64()?),
            ValueType::Float | ValueType::IndirectFloat => Value::Float(self.as_f64()?),
            ValueType::String | ValueType::Key => Value::String(self.as_str()?.to_owned()),
            ValueType::Blob => Value::Blob(self.as_blob()?.to_vec()),
            ValueType::Map => {
                let map = self.as_map()?;
                let mut entries = std::collections::BTreeMap::new();
                for i in 0..map.len() {
                    let key = map.key(i)?.to_owned();
                    entries.insert(key, map.value(i)?.to_value_at(depth + 1)?);
                }
                Value::Map(entries)
            }
            _ => {
                let vector = self.as_vector()?;
                let mut items = Vec::with_capacity(vector.len());
                for i in 0..vector.len() {
                    items.push(vector.index(i)?.to_value_at(depth + 1)?);
                }
                Value::Vector(items)
            }
        };
        Ok(value)
    }
}

/// A vector view. Elements are decoded on access.
#[derive(Debug, Clone, Copy)]
pub struct VectorRef<'a> {
    buf: &'a [u8],
    start: usize,
    byte_width: usize,
    len: usize,
    element: Option<ValueType>,
}

impl<'a> VectorRef<'a> {
    fn untyped(buf: &'a [u8], start: usize, byte_width: usize) -> Result<Self> {
        let len = read_prefixed_len(buf, start, byte_width)?;
        // Slots plus one type byte per element.
        slice(buf, start, len.saturating_mul(byte_width + 1))?;
        Ok(Self {
            buf,
            start,
            byte_width,
            len,
            element: None,
        })
    }

    fn typed(
        buf: &'a [u8],
        start: usize,
        byte_width: usize,
        element: ValueType,
        arity: Option<usize>,
    ) -> Result<Self> {
        let len = match arity {
            Some(n) => n,
            None => read_prefixed_len(buf, start, byte_width)?,
        };
        slice(buf, start, len.saturating_mul(byte_width))?;
        Ok(Self {
            buf,
            start,
            byte_width,
            len,
            element: Some(element),
        })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the vector has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte width shared by every slot.
    pub fn byte_width(&self) -> usize {
        self.byte_width
    }

    /// Absolute offset of the first slot.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Element type for typed vectors.
    pub fn element_type(&self) -> Option<ValueType> {
        self.element
    }

    /// O(1) random access to element `i`.
    pub fn index(&self, i: usize) -> Result<Reference<'a>> {
        if i >= self.len {
            return Err(FlexError::format(format!(
                "Index {i} out of bounds for vector of {}",
                self.len
            )));
        }
        let slot = self.start + i * self.byte_width;
        let packed = match self.element {
            Some(element) => PackedType::new(element, BitWidth::W8),
            None => {
                let at = self.start + self.len * self.byte_width + i;
                let byte = *self
                    .buf
                    .get(at)
                    .ok_or_else(|| FlexError::format("Type byte outside buffer"))?;
                PackedType::from_byte(byte)
            }
        };
        Reference::new(self.buf, slot, self.byte_width, packed)
    }
}

/// A map view: a sorted keys vector and a parallel values vector.
#[derive(Debug, Clone, Copy)]
pub struct MapRef<'a> {
    keys: VectorRef<'a>,
    values: VectorRef<'a>,
}

impl<'a> MapRef<'a> {
    fn new(buf: &'a [u8], start: usize, byte_width: usize) -> Result<Self> {
        let values = VectorRef::untyped(buf, start, byte_width)?;
        let keys_slot = start
            .checked_sub(3 * byte_width)
            .ok_or_else(|| FlexError::format("Map prefix before buffer start"))?;
        let keys_ref = Reference {
            buf,
            offset: keys_slot,
            parent_width: byte_width,
            value_type: ValueType::VectorKey,
            bit_width: BitWidth::W8,
        };
        let keys_start = keys_ref.indirect()?;
        let keys_width = read_len(buf, keys_slot + byte_width, byte_width)?;
        BitWidth::from_byte_width(keys_width)?;
        let keys = VectorRef::typed(buf, keys_start, keys_width, ValueType::Key, None)?;
        if keys.len() != values.len() {
            return Err(FlexError::format(format!(
                "Map has {} keys but {} values",
                keys.len(),
                values.len()
            )));
        }
        Ok(Self { keys, values })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The sorted keys vector.
    pub fn keys(&self) -> VectorRef<'a> {
        self.keys
    }

    /// The values vector, in key order.
    pub fn values(&self) -> VectorRef<'a> {
        self.values
    }

    /// Key of entry `i`.
    pub fn key(&self, i: usize) -> Result<&'a str> {
        self.keys.index(i)?.as_str()
    }

    /// Value of entry `i`.
    pub fn value(&self, i: usize) -> Result<Reference<'a>> {
        self.values.index(i)
    }

    /// Binary search for `key`.
    pub fn get(&self, key: &str) -> Result<Option<Reference<'a>>> {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let probe = self.keys.index(mid)?.key_bytes()?;
            match probe.cmp(key.as_bytes()) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return self.value(mid).map(Some),
            }
        }
        Ok(None)
    }
}

fn slice(buf: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    start
        .checked_add(len)
        .and_then(|end| buf.get(start..end))
        .ok_or_else(|| FlexError::format(format!("{len} bytes at {start} exceed the buffer")))
}

fn read_u64(buf: &[u8], at: usize, width: usize) -> Result<u64> {
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(FlexError::format(format!("Invalid slot width {width}")));
    }
    let bytes = slice(buf, at, width)?;
    let mut le = [0u8; 8];
    le[..width].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(le))
}

fn read_i64(buf: &[u8], at: usize, width: usize) -> Result<i64> {
    let raw = read_u64(buf, at, width)?;
    let shift = 64 - 8 * width as u32;
    // Sign-extend from the slot width.
    Ok(((raw << shift) as i64) >> shift)
}

fn read_f64(buf: &[u8], at: usize, width: usize) -> Result<f64> {
    let raw = read_u64(buf, at, width)?;
    match width {
        4 => Ok(f64::from(f32::from_bits(raw as u32))),
        8 => Ok(f64::from_bits(raw)),
        other => Err(FlexError::format(format!("Float in a {other}-byte slot"))),
    }
}

fn read_len(buf: &[u8], at: usize, width: usize) -> Result<usize> {
    usize::try_from(read_u64(buf, at, width)?)
        .map_err(|_| FlexError::format("Length exceeds address space"))
}

/// Reads the length stored in the slot right before `start`.
fn read_prefixed_len(buf: &[u8], start: usize, width: usize) -> Result<usize> {
    let at = start
        .checked_sub(width)
        .ok_or_else(|| FlexError::format("Length prefix before buffer start"))?;
    read_len(buf, at, width)
}
