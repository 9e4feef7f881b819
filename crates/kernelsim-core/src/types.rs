//! Element types for tensor allocations.

use std::fmt;

/// Element type named by an ALLOC node's `dtype` attribute.
///
/// Only the element width matters to the pipeline. Names other than `f16`,
/// `f32`, and `f64` are kept as [`DataType::Other`] and sized as 4 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    F16,
    F32,
    F64,
    Other(String),
}

impl DataType {
    /// Parse a dtype name. Never fails; unrecognized names become `Other`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "f16" => DataType::F16,
            "f32" => DataType::F32,
            "f64" => DataType::F64,
            other => DataType::Other(other.to_string()),
        }
    }

    /// Size of one element in bytes.
    pub fn size_bytes(&self) -> u64 {
        match self {
            DataType::F16 => 2,
            DataType::F32 => 4,
            DataType::F64 => 8,
            DataType::Other(_) => 4,
        }
    }

    /// Whether the name was one of the recognized element types.
    pub fn is_known(&self) -> bool {
        !matches!(self, DataType::Other(_))
    }

    /// The dtype name as written in IR attributes.
    pub fn name(&self) -> &str {
        match self {
            DataType::F16 => "f16",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::Other(name) => name,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
