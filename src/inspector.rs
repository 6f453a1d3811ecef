//! Tools for inspecting the physical structure of finished buffers.
//! Useful for checking chosen widths, offsets and map ordering.

use crate::constants::MAX_DECODE_DEPTH;
use crate::error::{FlexError, Result};
use crate::format::ValueType;
use crate::reader::{self, FlexReader, Reference};
use serde::Serialize;
use std::path::Path;

/// A structural report of a finished buffer.
#[derive(Debug, Serialize)]
pub struct DebugReport {
    /// Total buffer size.
    pub buffer_size: usize,
    /// Byte width of the root slot (last byte of the buffer).
    pub root_byte_width: usize,
    /// The hierarchical tree of values.
    pub tree: NodeInfo,
}

/// Layout of a single value.
#[derive(Debug, Serialize)]
pub struct NodeInfo {
    /// Map key this value is stored under, if any.
    pub key: Option<String>,
    /// Value type.
    pub value_type: ValueType,
    /// Width in bits from the packed type.
    pub bit_width: usize,
    /// Absolute offset of the slot referencing this value.
    pub slot_offset: usize,
    /// Byte width of that slot.
    pub slot_width: usize,
    /// Absolute offset of the payload, for out-of-line values.
    pub payload_offset: Option<usize>,
    /// Short rendering of scalars and byte strings.
    pub summary: Option<String>,
    /// Child values of vectors and maps.
    pub children: Vec<NodeInfo>,
}

/// The Flexcode Inspector tool.
#[derive(Debug)]
pub struct Inspector;

impl Inspector {
    /// Analyzes a file and returns a structural report.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<DebugReport> {
        let reader = FlexReader::open(path)?;
        Self::inspect_bytes(reader.as_bytes())
    }

    /// Analyzes an in-memory buffer.
    pub fn inspect_bytes(bytes: &[u8]) -> Result<DebugReport> {
        let root = reader::root(bytes)?;
        Ok(DebugReport {
            buffer_size: bytes.len(),
            root_byte_width: root.slot_width(),
            tree: Self::inspect_node(&root, None, 0)?,
        })
    }

    fn inspect_node(node: &Reference<'_>, key: Option<String>, depth: usize) -> Result<NodeInfo> {
        if depth > MAX_DECODE_DEPTH {
            return Err(FlexError::format(format!(
                "Nesting deeper than {MAX_DECODE_DEPTH}"
            )));
        }
        let value_type = node.value_type();
        let payload_offset = if value_type.is_inline() {
            None
        } else {
            Some(node.payload_offset()?)
        };

        let mut children = Vec::new();
        let summary = match value_type {
            ValueType::Map => {
                let map = node.as_map()?;
                for i in 0..map.len() {
                    let key = map.key(i)?.to_owned();
                    children.push(Self::inspect_node(&map.value(i)?, Some(key), depth + 1)?);
                }
                Some(format!("{} entries", map.len()))
            }
            ValueType::Null => None,
            ValueType::Bool => Some(node.as_bool()?.to_string()),
            ValueType::Int | ValueType::IndirectInt => Some(node.as_i64()?.to_string()),
            ValueType::UInt | ValueType::IndirectUInt => Some(node.as_u64()?.to_string()),
            ValueType::Float | ValueType::IndirectFloat => Some(node.as_f64()?.to_string()),
            ValueType::String | ValueType::Key => Some(format!("{:?}", node.as_str()?)),
            ValueType::Blob => Some(format!("{} bytes", node.as_blob()?.len())),
            _ => {
                let vector = node.as_vector()?;
                for i in 0..vector.len() {
                    children.push(Self::inspect_node(&vector.index(i)?, None, depth + 1)?);
                }
                Some(format!("{} elements", vector.len()))
            }
        };

        Ok(NodeInfo {
            key,
            value_type,
            bit_width: node.bit_width().byte_width() * 8,
            slot_offset: node.offset(),
            slot_width: node.slot_width(),
            payload_offset,
            summary,
            children,
        })
    }
}

impl std::fmt::Display for DebugReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== FLEXCODE INSPECTOR REPORT ===")?;
        writeln!(f, "Buffer Size:     {}", self.buffer_size)?;
        writeln!(f, "Root Byte Width: {}", self.root_byte_width)?;
        writeln!(f, "\n[VALUE LAYOUT]")?;
        self.tree.fmt_recursive(f, "", true)
    }
}

impl NodeInfo {
    fn fmt_recursive(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
    ) -> std::fmt::Result {
        let connector = if is_last { "└── " } else { "├── " };
        let child_prefix = if is_last { "    " } else { "│   " };
        let key = self
            .key
            .as_deref()
            .map(|k| format!("{k:?}: "))
            .unwrap_or_default();
        let payload = self
            .payload_offset
            .map(|p| format!(" -> @{p}"))
            .unwrap_or_default();
        let summary = self
            .summary
            .as_deref()
            .map(|s| format!(" = {s}"))
            .unwrap_or_default();

        writeln!(
            f,
            "{}{}{}[{:?}/{}] @{}x{}{}{}",
            prefix,
            connector,
            key,
            self.value_type,
            self.bit_width,
            self.slot_offset,
            self.slot_width,
            payload,
            summary
        )?;

        for (i, child) in self.children.iter().enumerate() {
            let is_last_child = i == self.children.len() - 1;
            child.fmt_recursive(f, &format!("{prefix}{child_prefix}"), is_last_child)?;
        }
        Ok(())
    }
}
