use crate::error::{FlexError, Result};
use crate::format::{BitWidth, PackedType, ValueType, padding_bytes};
use crate::io::Buffer;

/// One pending entry on the construction stack.
///
/// Inline scalars keep their payload until their slot is written. Out-of-line values
/// start as a pending payload and become [`StackValue::Placed`] once their bytes are
/// in the buffer. Composites are always `Placed`: they are written when their scope
/// closes.
#[derive(Debug, Clone, PartialEq)]
pub enum StackValue {
    /// Null, stored as a zero slot.
    Null,
    /// Boolean, stored as 0 or 1.
    Bool(bool),
    /// Signed integer with the width implied by the add call.
    Int(i64, BitWidth),
    /// Unsigned integer with the width implied by the add call.
    UInt(u64, BitWidth),
    /// Float, W32 or W64.
    Float(f64, BitWidth),
    /// String bytes not yet written.
    String(Vec<u8>),
    /// Blob bytes not yet written.
    Blob(Vec<u8>),
    /// Map key bytes not yet written.
    Key(Vec<u8>),
    /// Out-of-line signed integer not yet written.
    IndirectInt(i64, BitWidth),
    /// Out-of-line unsigned integer not yet written.
    IndirectUInt(u64, BitWidth),
    /// Out-of-line float not yet written.
    IndirectFloat(f64, BitWidth),
    /// A value whose payload already lives in the buffer at `offset`.
    Placed {
        /// Absolute offset of the payload (first element for composites).
        offset: usize,
        /// Kind of the payload.
        value_type: ValueType,
        /// Width the payload was written with.
        bit_width: BitWidth,
    },
}

impl StackValue {
    /// The type tag this value will carry.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Null,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(..) => ValueType::Int,
            Self::UInt(..) => ValueType::UInt,
            Self::Float(..) => ValueType::Float,
            Self::String(_) => ValueType::String,
            Self::Blob(_) => ValueType::Blob,
            Self::Key(_) => ValueType::Key,
            Self::IndirectInt(..) => ValueType::IndirectInt,
            Self::IndirectUInt(..) => ValueType::IndirectUInt,
            Self::IndirectFloat(..) => ValueType::IndirectFloat,
            Self::Placed { value_type, .. } => *value_type,
        }
    }

    /// The value's own width: the scalar width for inline values, the payload width
    /// for out-of-line ones.
    pub fn bit_width(&self) -> BitWidth {
        match self {
            Self::Null | Self::Bool(_) | Self::Key(_) => BitWidth::W8,
            Self::Int(_, w)
            | Self::UInt(_, w)
            | Self::Float(_, w)
            | Self::IndirectInt(_, w)
            | Self::IndirectUInt(_, w)
            | Self::IndirectFloat(_, w) => *w,
            Self::String(bytes) | Self::Blob(bytes) => BitWidth::for_u64(bytes.len() as u64),
            Self::Placed { bit_width, .. } => *bit_width,
        }
    }

    /// Key content, if this is a key that has not been written yet.
    pub fn key_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Key(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns true if the payload still has to be written before a slot can point at it.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::String(_)
                | Self::Blob(_)
                | Self::Key(_)
                | Self::IndirectInt(..)
                | Self::IndirectUInt(..)
                | Self::IndirectFloat(..)
        )
    }

    /// Writes a pending out-of-line payload and turns `self` into `Placed`.
    /// Inline and already placed values are left untouched.
    pub fn materialize(&mut self, buffer: &mut Buffer) -> Result<()> {
        let placed = match self {
            Self::String(bytes) => {
                let (offset, bit_width) = write_sized(buffer, bytes, true);
                Self::Placed {
                    offset,
                    value_type: ValueType::String,
                    bit_width,
                }
            }
            Self::Blob(bytes) => {
                let (offset, bit_width) = write_sized(buffer, bytes, false);
                Self::Placed {
                    offset,
                    value_type: ValueType::Blob,
                    bit_width,
                }
            }
            Self::Key(bytes) => {
                let offset = buffer.write(bytes);
                buffer.push(0);
                Self::Placed {
                    offset,
                    value_type: ValueType::Key,
                    bit_width: BitWidth::W8,
                }
            }
            Self::IndirectInt(v, w) => {
                let byte_width = buffer.align(*w);
                let offset = buffer.len();
                buffer.write_i64(*v, byte_width);
                Self::Placed {
                    offset,
                    value_type: ValueType::IndirectInt,
                    bit_width: *w,
                }
            }
            Self::IndirectUInt(v, w) => {
                let byte_width = buffer.align(*w);
                let offset = buffer.len();
                buffer.write_u64(*v, byte_width);
                Self::Placed {
                    offset,
                    value_type: ValueType::IndirectUInt,
                    bit_width: *w,
                }
            }
            Self::IndirectFloat(v, w) => {
                let byte_width = buffer.align(*w);
                let offset = buffer.len();
                if !buffer.write_f64(*v, byte_width) {
                    return Err(FlexError::Encoding(format!(
                        "Float cannot be stored in {byte_width} bytes"
                    )));
                }
                Self::Placed {
                    offset,
                    value_type: ValueType::IndirectFloat,
                    bit_width: *w,
                }
            }
            _ => return Ok(()),
        };
        tracing::trace!(value = ?placed, "materialized out-of-line payload");
        *self = placed;
        Ok(())
    }

    /// Smallest width a slot needs to hold this value when the slot is the
    /// `elem_index`-th one of a composite starting at the (unaligned) cursor `buf_len`.
    ///
    /// Inline values need their own width. Placed values need a width that can hold
    /// the backwards offset from the slot to the payload, which itself depends on the
    /// slot width through alignment and the slot position, so each width is tried in
    /// turn.
    pub fn element_width(&self, buf_len: usize, elem_index: usize) -> Result<BitWidth> {
        let offset = match self {
            Self::Placed { offset, .. } => *offset,
            _ if self.value_type().is_inline() => return Ok(self.bit_width()),
            _ => {
                return Err(FlexError::state(
                    "Out-of-line value referenced before its payload was written",
                ));
            }
        };
        for width in [BitWidth::W8, BitWidth::W16, BitWidth::W32, BitWidth::W64] {
            let byte_width = width.byte_width();
            let slot = buf_len + padding_bytes(buf_len, byte_width) + elem_index * byte_width;
            let relative = slot.checked_sub(offset).ok_or_else(|| {
                FlexError::Encoding(format!("Payload at {offset} lies ahead of slot {slot}"))
            })?;
            if BitWidth::for_u64(relative as u64) == width {
                return Ok(width);
            }
        }
        Err(FlexError::Encoding(format!(
            "Relative offset to payload at {offset} exceeds 64 bits"
        )))
    }

    /// Width recorded in the packed type byte when stored under a parent of `parent_width`.
    ///
    /// Inline values are widened to the parent slot; out-of-line values report their
    /// own payload width.
    pub fn stored_width(&self, parent_width: BitWidth) -> BitWidth {
        if self.value_type().is_inline() {
            self.bit_width().max(parent_width)
        } else {
            self.bit_width()
        }
    }

    /// Packed type byte for this value under a parent of `parent_width`.
    pub fn stored_packed_type(&self, parent_width: BitWidth) -> PackedType {
        PackedType::new(self.value_type(), self.stored_width(parent_width))
    }

    /// Writes this value's slot at the cursor: the scalar itself for inline values, the
    /// backwards offset otherwise.
    pub fn write_slot(&self, buffer: &mut Buffer, byte_width: usize) -> Result<()> {
        match self {
            Self::Null => buffer.write_u64(0, byte_width),
            Self::Bool(b) => buffer.write_u64(u64::from(*b), byte_width),
            Self::Int(v, _) => buffer.write_i64(*v, byte_width),
            Self::UInt(v, _) => buffer.write_u64(*v, byte_width),
            Self::Float(v, _) => {
                if !buffer.write_f64(*v, byte_width) {
                    return Err(FlexError::Encoding(format!(
                        "Float cannot be stored in {byte_width} bytes"
                    )));
                }
            }
            Self::Placed { offset, .. } => buffer.write_offset(*offset, byte_width),
            _ => {
                return Err(FlexError::state(
                    "Out-of-line value written before its payload",
                ));
            }
        }
        Ok(())
    }
}

/// Writes `[len] [bytes]` (plus a NUL when `terminate`), returning the offset of the
/// first content byte and the width of the length field.
fn write_sized(buffer: &mut Buffer, bytes: &[u8], terminate: bool) -> (usize, BitWidth) {
    let bit_width = BitWidth::for_u64(bytes.len() as u64);
    let byte_width = buffer.align(bit_width);
    buffer.write_u64(bytes.len() as u64, byte_width);
    let offset = buffer.write(bytes);
    if terminate {
        buffer.push(0);
    }
    (offset, bit_width)
}
