//! The two-phase placement algorithm run when a scope closes.
//!
//! Phase one writes every pending out-of-line payload of the closing scope (strings,
//! blobs, keys, indirect scalars). Phase two picks one byte width that fits every
//! element slot, then writes the length prefix, the slots and (for untyped vectors)
//! the per-element type bytes. The result replaces the scope's entries on the stack.

use super::value::StackValue;
use crate::error::{FlexError, Result};
use crate::format::{BitWidth, ValueType};
use crate::io::Buffer;

/// How a vector's elements are typed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorShape {
    /// One packed type byte per element.
    Untyped,
    /// One element type for the whole vector, stored in the vector's own type.
    Typed,
    /// Typed with an arity of 2..=4 encoded in the type; no length field.
    Fixed,
}

/// Places a closed vector scope.
pub(crate) fn place_vector(
    buffer: &mut Buffer,
    elements: &mut [StackValue],
    shape: VectorShape,
) -> Result<StackValue> {
    for element in elements.iter_mut() {
        element.materialize(buffer)?;
    }
    create_vector(buffer, elements, shape, None)
}

/// Places a closed map scope from its interleaved key, value entries.
///
/// Keys are sorted byte-lexicographically (stable) and the values permuted to match,
/// so readers can binary search. Duplicate keys are rejected.
pub(crate) fn place_map(buffer: &mut Buffer, entries: Vec<StackValue>) -> Result<StackValue> {
    if entries.len() % 2 != 0 {
        return Err(FlexError::state(format!(
            "Map has {} entries; every key needs a value",
            entries.len()
        )));
    }

    let mut pairs = Vec::with_capacity(entries.len() / 2);
    let mut iter = entries.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        if key.key_bytes().is_none() {
            return Err(FlexError::state(format!(
                "Expected a key in map, found {:?}",
                key.value_type()
            )));
        }
        if value.value_type() == ValueType::Key {
            return Err(FlexError::state("Map value cannot be a key"));
        }
        pairs.push((key, value));
    }

    pairs.sort_by(|(a, _), (b, _)| a.key_bytes().cmp(&b.key_bytes()));
    if let Some(dup) = pairs
        .windows(2)
        .find(|w| w[0].0.key_bytes() == w[1].0.key_bytes())
    {
        let name = String::from_utf8_lossy(dup[0].0.key_bytes().unwrap_or_default());
        return Err(FlexError::state(format!("Duplicate key {name:?} in map")));
    }

    let (mut keys, mut values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
    for key in &mut keys {
        key.materialize(buffer)?;
    }
    for value in &mut values {
        value.materialize(buffer)?;
    }

    let keys_vector = create_vector(buffer, &keys, VectorShape::Typed, None)?;
    create_vector(buffer, &values, VectorShape::Untyped, Some(&keys_vector))
}

/// Writes a vector whose elements all have their payloads in place.
///
/// With `keys`, the vector is the values half of a map and is prefixed with the keys
/// vector's offset and byte width.
pub(crate) fn create_vector(
    buffer: &mut Buffer,
    elements: &[StackValue],
    shape: VectorShape,
    keys: Option<&StackValue>,
) -> Result<StackValue> {
    let len = elements.len();
    let value_type = vector_type(elements, shape, keys.is_some())?;

    let start = buffer.len();
    let mut width = BitWidth::for_u64(len as u64);
    let mut prefix = 1;
    if let Some(keys) = keys {
        width = width.max(keys.element_width(start, 0)?);
        prefix += 2;
    }
    for (i, element) in elements.iter().enumerate() {
        width = width.max(element.element_width(start, i + prefix)?);
    }

    let byte_width = buffer.align(width);
    if let Some(keys) = keys {
        keys.write_slot(buffer, byte_width)?;
        buffer.write_u64(keys.bit_width().byte_width() as u64, byte_width);
    }
    if shape != VectorShape::Fixed {
        buffer.write_u64(len as u64, byte_width);
    }
    let offset = buffer.len();
    for element in elements {
        element.write_slot(buffer, byte_width)?;
    }
    if shape == VectorShape::Untyped {
        for element in elements {
            buffer.push(element.stored_packed_type(width).as_u8());
        }
    }

    tracing::debug!(
        ?value_type,
        len,
        %width,
        offset,
        "placed composite"
    );
    Ok(StackValue::Placed {
        offset,
        value_type,
        bit_width: width,
    })
}

fn vector_type(elements: &[StackValue], shape: VectorShape, is_map: bool) -> Result<ValueType> {
    if is_map {
        return Ok(ValueType::Map);
    }
    if shape == VectorShape::Untyped {
        return Ok(ValueType::Vector);
    }

    let element_type = match elements.first() {
        Some(first) => first.value_type(),
        // An empty typed vector carries no element type; readers see length 0 either way.
        None if shape == VectorShape::Typed => return Ok(ValueType::VectorKey),
        None => return Err(FlexError::state("Fixed typed vector cannot be empty")),
    };
    if let Some(other) = elements.iter().find(|e| e.value_type() != element_type) {
        return Err(FlexError::state(format!(
            "Typed vector mixes {element_type:?} and {:?}",
            other.value_type()
        )));
    }

    let arity = match shape {
        VectorShape::Fixed => {
            if !(2..=4).contains(&elements.len()) || !element_type.is_fixed_vector_element() {
                return Err(FlexError::state(format!(
                    "Fixed typed vector needs 2 to 4 Int, UInt or Float elements, got {} x {element_type:?}",
                    elements.len()
                )));
            }
            elements.len()
        }
        _ => {
            if !element_type.is_typed_vector_element() {
                return Err(FlexError::state(format!(
                    "{element_type:?} cannot be an element of a typed vector"
                )));
            }
            0
        }
    };
    element_type
        .to_typed_vector(arity)
        .ok_or_else(|| FlexError::state(format!("No typed vector for {element_type:?}")))
}
