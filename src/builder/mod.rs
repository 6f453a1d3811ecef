//! The stack-based encoder.
//!
//! Values are pushed onto a construction stack by the `add_*` calls. `start_*` records a
//! [`ScopeMarker`] at the current depth; the matching `end_*` runs the placement
//! algorithm over the stack slice above that marker and replaces it with a single
//! placed composite. [`Builder::finish`] places the one remaining root and appends the
//! trailer.
//!
//! Widths and offsets are decided only when a scope closes, because the width of a
//! reference depends on where its payload finally lands.

mod placement;
mod scope;
mod value;

pub use placement::VectorShape;
pub use scope::{ScopeKind, ScopeMarker};
pub use value::StackValue;

use crate::api::BuilderOptions;
use crate::error::{FlexError, Result};
use crate::format::BitWidth;
use crate::io::Buffer;
use crate::value::Value;

/// Builds one Flexcode buffer.
///
/// ```rust
/// use flexcode::Builder;
///
/// let mut builder = Builder::new();
/// builder.start_map()?;
/// builder.add_key("name")?;
/// builder.add_string("flex")?;
/// builder.add_key("level")?;
/// builder.add_uint8(3)?;
/// builder.end_map()?;
/// let bytes = builder.finish()?;
/// assert_eq!(bytes[bytes.len() - 1], 1);
/// # Ok::<(), flexcode::FlexError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    buffer: Buffer,
    stack: Vec<StackValue>,
    scopes: Vec<ScopeMarker>,
    finished: bool,
}

impl Builder {
    /// Creates a builder with the default initial capacity.
    pub fn new() -> Self {
        Self::with_options(BuilderOptions::default())
    }

    /// Creates a builder whose buffer starts with room for `initial_capacity` bytes.
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self::with_options(BuilderOptions::new().initial_capacity(initial_capacity))
    }

    /// Creates a builder from explicit options.
    pub fn with_options(options: BuilderOptions) -> Self {
        Self {
            buffer: Buffer::with_capacity(options.get_initial_capacity()),
            stack: Vec::new(),
            scopes: Vec::new(),
            finished: false,
        }
    }

    /// Clears all state so the instance can encode a new document.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.stack.clear();
        self.scopes.clear();
        self.finished = false;
    }

    /// Returns true once [`Builder::finish`] has succeeded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of values on the construction stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of currently open vectors and maps.
    pub fn open_scopes(&self) -> usize {
        self.scopes.len()
    }

    // --- SCALARS ---

    /// Adds a null.
    pub fn add_null(&mut self) -> Result<()> {
        self.push(StackValue::Null)
    }

    /// Adds a boolean.
    pub fn add_bool(&mut self, value: bool) -> Result<()> {
        self.push(StackValue::Bool(value))
    }

    /// Adds an 8-bit signed integer.
    pub fn add_int8(&mut self, value: i8) -> Result<()> {
        self.push(StackValue::Int(value.into(), BitWidth::W8))
    }

    /// Adds a 16-bit signed integer.
    pub fn add_int16(&mut self, value: i16) -> Result<()> {
        self.push(StackValue::Int(value.into(), BitWidth::W16))
    }

    /// Adds a 32-bit signed integer.
    pub fn add_int32(&mut self, value: i32) -> Result<()> {
        self.push(StackValue::Int(value.into(), BitWidth::W32))
    }

    /// Adds a 64-bit signed integer.
    pub fn add_int64(&mut self, value: i64) -> Result<()> {
        self.push(StackValue::Int(value, BitWidth::W64))
    }

    /// Adds an 8-bit unsigned integer.
    pub fn add_uint8(&mut self, value: u8) -> Result<()> {
        self.push(StackValue::UInt(value.into(), BitWidth::W8))
    }

    /// Adds a 16-bit unsigned integer.
    pub fn add_uint16(&mut self, value: u16) -> Result<()> {
        self.push(StackValue::UInt(value.into(), BitWidth::W16))
    }

    /// Adds a 32-bit unsigned integer.
    pub fn add_uint32(&mut self, value: u32) -> Result<()> {
        self.push(StackValue::UInt(value.into(), BitWidth::W32))
    }

    /// Adds a 64-bit unsigned integer.
    pub fn add_uint64(&mut self, value: u64) -> Result<()> {
        self.push(StackValue::UInt(value, BitWidth::W64))
    }

    /// Adds a 32-bit float.
    pub fn add_float32(&mut self, value: f32) -> Result<()> {
        self.push(StackValue::Float(value.into(), BitWidth::W32))
    }

    /// Adds a 64-bit float.
    pub fn add_float64(&mut self, value: f64) -> Result<()> {
        self.push(StackValue::Float(value, BitWidth::W64))
    }

    /// Adds a signed integer stored out of line, so it never widens its siblings.
    pub fn add_indirect_int(&mut self, value: i64) -> Result<()> {
        self.push(StackValue::IndirectInt(value, BitWidth::for_i64(value)))
    }

    /// Adds an unsigned integer stored out of line.
    pub fn add_indirect_uint(&mut self, value: u64) -> Result<()> {
        self.push(StackValue::IndirectUInt(value, BitWidth::for_u64(value)))
    }

    /// Adds a 32-bit float stored out of line.
    pub fn add_indirect_float32(&mut self, value: f32) -> Result<()> {
        self.push(StackValue::IndirectFloat(value.into(), BitWidth::W32))
    }

    /// Adds a 64-bit float stored out of line.
    pub fn add_indirect_float64(&mut self, value: f64) -> Result<()> {
        self.push(StackValue::IndirectFloat(value, BitWidth::W64))
    }

    // --- BYTES ---

    /// Adds a UTF-8 string.
    pub fn add_string(&mut self, value: &str) -> Result<()> {
        self.push(StackValue::String(value.as_bytes().to_vec()))
    }

    /// Adds raw bytes.
    pub fn add_blob(&mut self, value: &[u8]) -> Result<()> {
        self.push(StackValue::Blob(value.to_vec()))
    }

    /// Adds a map key. Only valid inside a map, in key position.
    pub fn add_key(&mut self, key: &str) -> Result<()> {
        self.check_writable()?;
        match self.scopes.last() {
            Some(scope) if scope.is_map() => {
                if (self.stack.len() - scope.start()) % 2 != 0 {
                    return Err(FlexError::state(
                        "Cannot add a key where the map expects a value",
                    ));
                }
            }
            _ => return Err(FlexError::state("Cannot add a key outside of a map")),
        }
        if key.as_bytes().contains(&0) {
            return Err(FlexError::Encoding(format!(
                "Key {key:?} contains a NUL byte"
            )));
        }
        self.stack.push(StackValue::Key(key.as_bytes().to_vec()));
        Ok(())
    }

    // --- SCOPES ---

    /// Opens a vector. Values added until the matching `end_*` become its elements.
    pub fn start_vector(&mut self) -> Result<()> {
        self.start_scope(ScopeKind::Vector)
    }

    /// Opens a map. Entries must alternate `add_key` and a value.
    pub fn start_map(&mut self) -> Result<()> {
        self.start_scope(ScopeKind::Map)
    }

    /// Closes the innermost vector as an untyped vector.
    pub fn end_vector(&mut self) -> Result<()> {
        self.end_vector_as(VectorShape::Untyped)
    }

    /// Closes the innermost vector as a typed vector; all elements must share one
    /// of Int, UInt, Float or Bool.
    pub fn end_typed_vector(&mut self) -> Result<()> {
        self.end_vector_as(VectorShape::Typed)
    }

    /// Closes the innermost vector as a fixed typed vector of 2 to 4 Int, UInt or
    /// Float elements.
    pub fn end_fixed_typed_vector(&mut self) -> Result<()> {
        self.end_vector_as(VectorShape::Fixed)
    }

    /// Closes the innermost map.
    pub fn end_map(&mut self) -> Result<()> {
        let marker = self.pop_scope(ScopeKind::Map)?;
        let entries = self.stack.split_off(marker.start());
        let map = placement::place_map(&mut self.buffer, entries)?;
        self.stack.push(map);
        Ok(())
    }

    /// Pushes a whole logical tree through the add/start/end calls.
    ///
    /// Integers use the narrowest add call that holds them; floats use 32 bits when
    /// that is lossless.
    pub fn add_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.add_null(),
            Value::Bool(b) => self.add_bool(*b),
            Value::Int(i) => match BitWidth::for_i64(*i) {
                BitWidth::W8 => self.add_int8(narrow(*i)?),
                BitWidth::W16 => self.add_int16(narrow(*i)?),
                BitWidth::W32 => self.add_int32(narrow(*i)?),
                BitWidth::W64 => self.add_int64(*i),
            },
            Value::UInt(u) => match BitWidth::for_u64(*u) {
                BitWidth::W8 => self.add_uint8(narrow(*u)?),
                BitWidth::W16 => self.add_uint16(narrow(*u)?),
                BitWidth::W32 => self.add_uint32(narrow(*u)?),
                BitWidth::W64 => self.add_uint64(*u),
            },
            Value::Float(f) => match BitWidth::for_f64(*f) {
                BitWidth::W8 | BitWidth::W16 | BitWidth::W32 => self.add_float32(*f as f32),
                BitWidth::W64 => self.add_float64(*f),
            },
            Value::String(s) => self.add_string(s),
            Value::Blob(b) => self.add_blob(b),
            Value::Vector(items) => {
                self.start_vector()?;
                for item in items {
                    self.add_value(item)?;
                }
                self.end_vector()
            }
            Value::Map(entries) => {
                self.start_map()?;
                for (key, item) in entries {
                    self.add_key(key)?;
                    self.add_value(item)?;
                }
                self.end_map()
            }
        }
    }

    // --- FINISH ---

    /// Places the single root value and appends the trailer.
    ///
    /// Returns the finished bytes. Calling it again returns the same bytes.
    pub fn finish(&mut self) -> Result<&[u8]> {
        if !self.finished {
            self.write_root()?;
            self.finished = true;
        }
        Ok(self.buffer.as_slice())
    }

    /// Finishes (if needed) and hands over the bytes.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        self.finish()?;
        Ok(self.buffer.into_vec())
    }

    fn write_root(&mut self) -> Result<()> {
        if let Some(scope) = self.scopes.last() {
            return Err(FlexError::state(format!(
                "Cannot finish with {} open scope(s), innermost {scope:?}",
                self.scopes.len()
            )));
        }
        let root = match self.stack.as_mut_slice() {
            [root] => root,
            other => {
                return Err(FlexError::state(format!(
                    "Stack length has to be exactly 1 to finish, but is {}",
                    other.len()
                )));
            }
        };

        root.materialize(&mut self.buffer)?;
        let width = root.element_width(self.buffer.len(), 0)?;
        let byte_width = self.buffer.align(width);
        root.write_slot(&mut self.buffer, byte_width)?;
        self.buffer
            .push(root.stored_packed_type(BitWidth::W8).as_u8());
        let width_byte = u8::try_from(byte_width)
            .map_err(|_| FlexError::Encoding(format!("Root byte width {byte_width}")))?;
        self.buffer.push(width_byte);

        tracing::debug!(
            root_type = ?root.value_type(),
            root_width = %width,
            size = self.buffer.len(),
            "finished buffer"
        );
        Ok(())
    }

    // --- INTEGRITY ---

    fn check_writable(&self) -> Result<()> {
        if self.finished {
            return Err(FlexError::state("Cannot modify a finished builder"));
        }
        Ok(())
    }

    /// Checks that a non-key value may be added at the current position.
    fn check_value_position(&self) -> Result<()> {
        self.check_writable()?;
        if let Some(scope) = self.scopes.last()
            && scope.is_map()
            && (self.stack.len() - scope.start()) % 2 == 0
        {
            return Err(FlexError::state(
                "Cannot add a value to a map before adding its key",
            ));
        }
        Ok(())
    }

    fn push(&mut self, value: StackValue) -> Result<()> {
        self.check_value_position()?;
        self.stack.push(value);
        Ok(())
    }

    fn start_scope(&mut self, kind: ScopeKind) -> Result<()> {
        self.check_value_position()?;
        self.scopes.push(ScopeMarker::new(self.stack.len(), kind));
        Ok(())
    }

    fn pop_scope(&mut self, kind: ScopeKind) -> Result<ScopeMarker> {
        self.check_writable()?;
        match self.scopes.pop() {
            Some(scope) if scope.kind() == kind => Ok(scope),
            Some(scope) => Err(FlexError::state(format!(
                "Cannot end a {kind:?}: innermost open scope is {scope:?}"
            ))),
            None => Err(FlexError::state(format!(
                "Cannot end a {kind:?}: no scope is open"
            ))),
        }
    }

    fn end_vector_as(&mut self, shape: VectorShape) -> Result<()> {
        let marker = self.pop_scope(ScopeKind::Vector)?;
        let start = marker.start();
        let vector =
            placement::place_vector(&mut self.buffer, &mut self.stack[start..], shape)?;
        self.stack.truncate(start);
        self.stack.push(vector);
        Ok(())
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

fn narrow<T, U>(value: T) -> Result<U>
where
    U: TryFrom<T>,
    T: Copy + std::fmt::Debug,
{
    U::try_from(value).map_err(|_| FlexError::Encoding(format!("{value:?} does not fit its width")))
}
