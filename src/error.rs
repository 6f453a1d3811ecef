//! Centralized error handling for Flexcode.
//!
//! Every failure in the crate is surfaced as a [`FlexError`] through the [`Result`] alias.
//! The library never panics on caller misuse or malformed input.
//!
//! ## Error Categories
//!
//! - **State Errors** ([`FlexError::State`]): Structural misuse of the [`crate::Builder`]:
//!   adding after `finish`, a value in a map without a preceding key, unbalanced
//!   `start_*`/`end_*` calls, duplicate map keys, or `finish` with zero or several roots.
//! - **Encoding Errors** ([`FlexError::Encoding`]): A value cannot be represented in the
//!   layout, e.g. a relative offset wider than 64 bits or a key with an interior NUL.
//! - **Format Errors** ([`FlexError::Format`]): A buffer handed to the reader is truncated
//!   or does not follow the layout.
//! - **I/O Errors** ([`FlexError::Io`]): Saving or memory-mapping a file failed.
//!
//! State and encoding errors are programmer errors and are never retried. After one of
//! them the builder must be discarded (or [`crate::Builder::reset`]).
//!
//! ## Usage
//!
//! ```rust
//! use flexcode::{Builder, FlexError};
//!
//! let mut builder = Builder::new();
//! match builder.add_key("x") {
//!     Err(FlexError::State(msg)) => eprintln!("misuse: {msg}"),
//!     Err(e) => eprintln!("other error: {e}"),
//!     Ok(()) => unreachable!(),
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for Flexcode operations.
pub type Result<T> = std::result::Result<T, FlexError>;

/// The master error enum covering all failure domains in Flexcode.
///
/// This type is `Clone`; I/O errors are wrapped in an `Arc` for that purpose.
#[derive(Debug, Clone)]
pub enum FlexError {
    /// Structural misuse of the builder.
    ///
    /// ## Common Causes
    ///
    /// - Any mutating call after `finish`
    /// - A map value without a preceding key, or a key outside a map
    /// - `end_vector`/`end_map` without a matching open scope
    /// - Two identical keys in one map
    /// - `finish` while a scope is open or with zero/multiple top-level values
    State(String),

    /// A value cannot be expressed in the wire layout.
    ///
    /// Practically only reachable through keys containing a NUL byte, or offsets
    /// that overflow 64 bits.
    Encoding(String),

    /// The buffer being read is truncated or malformed.
    Format(String),

    /// Low-level I/O failure while saving or opening a file.
    Io(Arc<io::Error>),
}

impl FlexError {
    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}

impl fmt::Display for FlexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(s) => write!(f, "Builder State Error: {s}"),
            Self::Encoding(s) => write!(f, "Encoding Error: {s}"),
            Self::Format(s) => write!(f, "Format Error: {s}"),
            Self::Io(e) => write!(f, "I/O Error: {e}"),
        }
    }
}

impl std::error::Error for FlexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FlexError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
