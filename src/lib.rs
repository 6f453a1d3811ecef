//! # Flexcode
//!
//! A builder for FlexBuffers-style self-describing binary buffers: schema-less,
//! compact, and readable in place without a parse step.
//!
//! ## Overview
//!
//! Values are added bottom-up to a [`Builder`]. Scalars stay on a value stack until
//! their enclosing vector or map is closed; only then is the narrowest slot width that
//! fits every element known, and the whole container is written in one pass. Finishing
//! places the single root value and appends a short trailer.
//!
//! ### Buffer layout
//!
//! ```text
//! [payloads ...] [child vectors ...] [parent vectors ...] [root slot] [packed type] [root width]
//! ```
//!
//! Children always precede their parents, so every reference is a backwards
//! relative offset. A reader starts at the last byte.
//!
//! ## Core Concepts
//!
//! ### Widths
//!
//! Every slot is 1, 2, 4 or 8 bytes wide ([`BitWidth`]). Each value reports the
//! narrowest width that holds it; a container takes the widest width of its elements,
//! its length and any offsets it stores.
//!
//! ### Packed types
//!
//! A type byte carries a [`ValueType`] in its upper six bits and a [`BitWidth`] in its
//! lower two. Untyped vectors store one per element after the slots; typed vectors
//! store it once in the parent.
//!
//! ### Maps
//!
//! A map is a values vector prefixed by a sorted keys vector. Keys are sorted by their
//! raw bytes when the map is closed, so lookups are a binary search.
//!
//! ## Usage
//!
//! ```rust
//! use flexcode::{Builder, reader};
//!
//! let mut builder = Builder::new();
//! builder.start_map()?;
//! builder.add_key("name")?;
//! builder.add_string("flexcode")?;
//! builder.add_key("version")?;
//! builder.add_uint8(1)?;
//! builder.end_map()?;
//! let bytes = builder.finish()?;
//!
//! let root = reader::root(bytes)?;
//! let name = root.as_map()?.get("name")?;
//! assert_eq!(name.map(|n| n.as_str()).transpose()?, Some("flexcode"));
//! # Ok::<(), flexcode::FlexError>(())
//! ```
//!
//! ### Value trees
//!
//! ```rust
//! use flexcode::{Flexcode, Value};
//!
//! let value = Value::map([("xs", Value::Vector(vec![1i64.into(), 2i64.into()]))]);
//! let bytes = Flexcode::encode(&value)?;
//! assert_eq!(Flexcode::decode(&bytes)?, value);
//! # Ok::<(), flexcode::FlexError>(())
//! ```
//!
//! ## Safety and Error Handling
//!
//! * **Encapsulated Unsafe:** the only `unsafe` block is the memory map in
//!   [`FlexReader::open`].
//! * **No Panics:** No `unwrap()` or `panic!()` calls in the library (enforced by clippy lints).
//! * **Comprehensive Errors:** misuse of the builder, unencodable input and malformed
//!   buffers all surface as a [`FlexError`].

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod builder;
pub mod error;
pub mod format;
pub mod inspector;
pub mod reader;
pub mod value;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod io;

// --- RE-EXPORTS ---

pub use api::{BuilderOptions, Flexcode};
pub use builder::{Builder, VectorShape};
pub use error::{FlexError, Result};
pub use format::{BitWidth, PackedType, ValueType};
pub use inspector::{DebugReport, Inspector};
pub use reader::{FlexReader, MapRef, Reference, VectorRef};
pub use value::Value;

/// Constants used throughout the library.
pub mod constants {
    /// The default initial capacity of a builder's buffer.
    pub const DEFAULT_BUFFER_SIZE: usize = 2 * 1024;

    /// Deepest nesting the reader will walk before reporting a malformed buffer.
    pub const MAX_DECODE_DEPTH: usize = 512;
}
