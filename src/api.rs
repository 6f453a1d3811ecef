//! High-level entry points.
//!
//! [`Flexcode`] wraps the [`Builder`] and [`FlexReader`] for the common cases:
//! encode a [`Value`] tree to bytes or a file, and decode it back.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::builder::Builder;
use crate::constants::DEFAULT_BUFFER_SIZE;
use crate::error::Result;
use crate::inspector::{DebugReport, Inspector};
use crate::reader::FlexReader;
use crate::value::Value;

/// Builder configuration.
///
/// ```rust
/// use flexcode::{Builder, BuilderOptions};
///
/// let builder = Builder::with_options(BuilderOptions::new().initial_capacity(64 * 1024));
/// # drop(builder);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuilderOptions {
    initial_capacity: usize,
}

impl BuilderOptions {
    /// Options with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes reserved up front. The buffer doubles when it runs out.
    pub fn initial_capacity(mut self, bytes: usize) -> Self {
        self.initial_capacity = bytes;
        self
    }

    /// Configured initial capacity.
    pub fn get_initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    /// Creates a builder with these options.
    pub fn build(self) -> Builder {
        Builder::with_options(self)
    }

    /// Encodes `value` with a builder configured by these options.
    pub fn encode(self, value: &Value) -> Result<Vec<u8>> {
        let mut builder = self.build();
        builder.add_value(value)?;
        builder.into_bytes()
    }
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// The main entry point for encoding and decoding whole documents.
#[derive(Debug)]
pub struct Flexcode;

impl Flexcode {
    /// Returns options for configuring a builder.
    pub fn builder() -> BuilderOptions {
        BuilderOptions::new()
    }

    /// Encodes a value tree into a finished buffer.
    pub fn encode(value: &Value) -> Result<Vec<u8>> {
        BuilderOptions::new().encode(value)
    }

    /// Decodes a finished buffer into a value tree.
    pub fn decode(bytes: &[u8]) -> Result<Value> {
        crate::reader::root(bytes)?.to_value()
    }

    /// Encodes a value tree and writes it to `path`.
    pub fn save<P: AsRef<Path>>(path: P, value: &Value) -> Result<()> {
        let bytes = Self::encode(value)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Reads a whole file and decodes it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Value> {
        Self::open(path)?.root()?.to_value()
    }

    /// Memory-maps a file for random access without decoding it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FlexReader> {
        FlexReader::open(path)
    }

    /// Reports the node layout of a finished buffer.
    pub fn inspect_bytes(bytes: &[u8]) -> Result<DebugReport> {
        Inspector::inspect_bytes(bytes)
    }
}
