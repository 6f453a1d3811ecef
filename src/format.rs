//! Defines the physical binary layout of a Flexcode buffer.
//!
//! # Layout Strategy
//! The buffer is append-only. Children are always written before the values that
//! reference them, so every reference is an unsigned offset pointing *backwards*.
//!
//! Buffer: `[Payloads ...] [Root Slot] [Packed Type] [Root Byte Width]`
//!
//! ## Composite Anatomy
//! - Vector: `[Len] [Slot 0] ... [Slot N-1] [Type 0] ... [Type N-1]`
//! - Typed vector: `[Len] [Slot 0] ... [Slot N-1]` (fixed arity drops `Len`)
//! - Map: `[Keys Offset] [Keys Width] [Len] [Value Slots] [Value Types]`
//! - String: `[Len] [Bytes] [0]`, Blob: `[Len] [Bytes]`, Key: `[Bytes] [0]`
//!
//! All length/slot fields of one composite share its byte width, and every field
//! starts at an address divisible by that width.

use crate::error::{FlexError, Result};
use serde::Serialize;
use std::fmt;

/// Size of the trailer excluding the root slot: packed type byte + root width byte.
pub const TRAILER_FIXED_SIZE: usize = 2;

/// The power-of-two width class of a scalar or offset slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub enum BitWidth {
    /// 1 byte.
    #[default]
    W8 = 0,
    /// 2 bytes.
    W16 = 1,
    /// 4 bytes.
    W32 = 2,
    /// 8 bytes.
    W64 = 3,
}

impl BitWidth {
    /// Returns the width code stored in the low two bits of a packed type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decodes the low two bits of a packed type.
    pub fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0 => Self::W8,
            1 => Self::W16,
            2 => Self::W32,
            _ => Self::W64,
        }
    }

    /// Number of bytes a slot of this width occupies.
    pub fn byte_width(self) -> usize {
        1 << (self as usize)
    }

    /// Maps a byte count (1, 2, 4 or 8) back to its width class.
    pub fn from_byte_width(byte_width: usize) -> Result<Self> {
        match byte_width {
            1 => Ok(Self::W8),
            2 => Ok(Self::W16),
            4 => Ok(Self::W32),
            8 => Ok(Self::W64),
            other => Err(FlexError::format(format!("Invalid byte width {other}"))),
        }
    }

    /// Smallest width holding an unsigned value.
    pub fn for_u64(value: u64) -> Self {
        if value <= u64::from(u8::MAX) {
            Self::W8
        } else if value <= u64::from(u16::MAX) {
            Self::W16
        } else if value <= u64::from(u32::MAX) {
            Self::W32
        } else {
            Self::W64
        }
    }

    /// Smallest width holding a signed value.
    pub fn for_i64(value: i64) -> Self {
        if i8::try_from(value).is_ok() {
            Self::W8
        } else if i16::try_from(value).is_ok() {
            Self::W16
        } else if i32::try_from(value).is_ok() {
            Self::W32
        } else {
            Self::W64
        }
    }

    /// Smallest width holding a float without loss. Never below 32 bits.
    pub fn for_f64(value: f64) -> Self {
        let narrowed = value as f32;
        if f64::from(narrowed) == value || value.is_nan() {
            Self::W32
        } else {
            Self::W64
        }
    }
}

impl fmt::Display for BitWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.byte_width() * 8)
    }
}

/// Number of zero bytes needed to bring `offset` up to a multiple of `byte_width`.
///
/// `byte_width` must be a power of two.
pub fn padding_bytes(offset: usize, byte_width: usize) -> usize {
    offset.wrapping_neg() & (byte_width - 1)
}

/// The tag identifying the kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueType {
    /// Absent value.
    Null = 0,
    /// Signed integer stored inline.
    Int = 1,
    /// Unsigned integer stored inline.
    UInt = 2,
    /// Float stored inline.
    Float = 3,
    /// NUL-terminated map key.
    Key = 4,
    /// Length-prefixed, NUL-terminated UTF-8 string.
    String = 5,
    /// Signed integer stored out of line.
    IndirectInt = 6,
    /// Unsigned integer stored out of line.
    IndirectUInt = 7,
    /// Float stored out of line.
    IndirectFloat = 8,
    /// Sorted keys vector plus parallel values vector.
    Map = 9,
    /// Heterogeneous vector with per-element type bytes.
    Vector = 10,
    /// Typed vector of signed integers.
    VectorInt = 11,
    /// Typed vector of unsigned integers.
    VectorUInt = 12,
    /// Typed vector of floats.
    VectorFloat = 13,
    /// Typed vector of keys (map key vectors).
    VectorKey = 14,
    /// Fixed typed vector of 2 signed integers.
    VectorInt2 = 16,
    /// Fixed typed vector of 2 unsigned integers.
    VectorUInt2 = 17,
    /// Fixed typed vector of 2 floats.
    VectorFloat2 = 18,
    /// Fixed typed vector of 3 signed integers.
    VectorInt3 = 19,
    /// Fixed typed vector of 3 unsigned integers.
    VectorUInt3 = 20,
    /// Fixed typed vector of 3 floats.
    VectorFloat3 = 21,
    /// Fixed typed vector of 4 signed integers.
    VectorInt4 = 22,
    /// Fixed typed vector of 4 unsigned integers.
    VectorUInt4 = 23,
    /// Fixed typed vector of 4 floats.
    VectorFloat4 = 24,
    /// Length-prefixed raw bytes.
    Blob = 25,
    /// Boolean stored inline.
    Bool = 26,
    /// Typed vector of booleans.
    VectorBool = 36,
}

impl ValueType {
    /// Decodes a type code (the high six bits of a packed type).
    pub fn from_code(code: u8) -> Result<Self> {
        let ty = match code {
            0 => Self::Null,
            1 => Self::Int,
            2 => Self::UInt,
            3 => Self::Float,
            4 => Self::Key,
            5 => Self::String,
            6 => Self::IndirectInt,
            7 => Self::IndirectUInt,
            8 => Self::IndirectFloat,
            9 => Self::Map,
            10 => Self::Vector,
            11 => Self::VectorInt,
            12 => Self::VectorUInt,
            13 => Self::VectorFloat,
            14 => Self::VectorKey,
            16 => Self::VectorInt2,
            17 => Self::VectorUInt2,
            18 => Self::VectorFloat2,
            19 => Self::VectorInt3,
            20 => Self::VectorUInt3,
            21 => Self::VectorFloat3,
            22 => Self::VectorInt4,
            23 => Self::VectorUInt4,
            24 => Self::VectorFloat4,
            25 => Self::Blob,
            26 => Self::Bool,
            36 => Self::VectorBool,
            other => return Err(FlexError::format(format!("Unknown type code {other}"))),
        };
        Ok(ty)
    }

    /// Raw type code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Inline values live directly in their reference slot.
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            Self::Null | Self::Int | Self::UInt | Self::Float | Self::Bool
        )
    }

    /// Element types allowed in a (variable length) typed vector.
    pub fn is_typed_vector_element(self) -> bool {
        matches!(
            self,
            Self::Int | Self::UInt | Self::Float | Self::Key | Self::Bool
        )
    }

    /// Element types allowed in a fixed-arity typed vector.
    pub fn is_fixed_vector_element(self) -> bool {
        matches!(self, Self::Int | Self::UInt | Self::Float)
    }

    /// Maps an element type to its typed vector type. `arity` 0 means variable length.
    pub fn to_typed_vector(self, arity: usize) -> Option<Self> {
        let ty = match (self, arity) {
            (Self::Int, 0) => Self::VectorInt,
            (Self::UInt, 0) => Self::VectorUInt,
            (Self::Float, 0) => Self::VectorFloat,
            (Self::Key, 0) => Self::VectorKey,
            (Self::Bool, 0) => Self::VectorBool,
            (Self::Int, 2) => Self::VectorInt2,
            (Self::UInt, 2) => Self::VectorUInt2,
            (Self::Float, 2) => Self::VectorFloat2,
            (Self::Int, 3) => Self::VectorInt3,
            (Self::UInt, 3) => Self::VectorUInt3,
            (Self::Float, 3) => Self::VectorFloat3,
            (Self::Int, 4) => Self::VectorInt4,
            (Self::UInt, 4) => Self::VectorUInt4,
            (Self::Float, 4) => Self::VectorFloat4,
            _ => return None,
        };
        Some(ty)
    }

    /// For a typed vector type, the element type and the fixed arity (0 if variable).
    pub fn typed_vector_element(self) -> Option<(Self, usize)> {
        let pair = match self {
            Self::VectorInt => (Self::Int, 0),
            Self::VectorUInt => (Self::UInt, 0),
            Self::VectorFloat => (Self::Float, 0),
            Self::VectorKey => (Self::Key, 0),
            Self::VectorBool => (Self::Bool, 0),
            Self::VectorInt2 => (Self::Int, 2),
            Self::VectorUInt2 => (Self::UInt, 2),
            Self::VectorFloat2 => (Self::Float, 2),
            Self::VectorInt3 => (Self::Int, 3),
            Self::VectorUInt3 => (Self::UInt, 3),
            Self::VectorFloat3 => (Self::Float, 3),
            Self::VectorInt4 => (Self::Int, 4),
            Self::VectorUInt4 => (Self::UInt, 4),
            Self::VectorFloat4 => (Self::Float, 4),
            _ => return None,
        };
        Some(pair)
    }
}

/// One byte packing a [`ValueType`] (bits 2-7) and a [`BitWidth`] (bits 0-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedType(u8);

impl PackedType {
    /// Packs a type and width.
    pub fn new(value_type: ValueType, bit_width: BitWidth) -> Self {
        Self((value_type.code() << 2) | bit_width.code())
    }

    /// Wraps a raw byte read from a buffer.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Returns the raw byte representation.
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// The width bits.
    pub fn bit_width(self) -> BitWidth {
        BitWidth::from_code(self.0)
    }

    /// The type bits, validated.
    pub fn value_type(self) -> Result<ValueType> {
        ValueType::from_code(self.0 >> 2)
    }
}
