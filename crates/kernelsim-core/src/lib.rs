//! Core intermediate representation and pass tracing for kernelsim.
//!
//! This crate provides the foundational abstractions the pass pipeline
//! depends on:
//! - Arena-backed program IR (`IrGraph`, `IrNode`, `IrNodeId`)
//! - Closed attribute values (`AttributeValue`) with fallible typed access
//! - Node factories for tensors and matmuls
//! - Instrumentation store (`TraceRecorder`) and its export document

pub mod dot;
pub mod ir;
pub mod ir_builder;
pub mod trace;
pub mod types;

// Re-export commonly used types
pub use ir::{AttributeKind, AttributeValue, IrGraph, IrNode, IrNodeId, OpKind, SourceLocation};
pub use trace::{
    IrSnapshot, MemoryRegion, PassRecord, PassTrace, SymbolInfo, TraceDocument, TraceRecorder,
};
pub use types::DataType;

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for kernelsim operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Attribute '{key}' not found on node '{node}'")]
    AttributeNotFound { node: String, key: String },

    #[error("Attribute '{key}' on node '{node}' is {found}, expected {expected}")]
    AttributeTypeMismatch {
        node: String,
        key: String,
        expected: AttributeKind,
        found: AttributeKind,
    },

    #[error("Loop '{node}' has a step that never reaches its end bound")]
    InvalidStep { node: String },

    #[error("Unroll factor must be positive, got {0}")]
    InvalidUnrollFactor(usize),

    #[error("Tensor '{node}' has malformed shape {dims:?}")]
    MalformedShape { node: String, dims: Vec<i64> },

    #[error("Tensor '{node}' has unknown dtype '{dtype}'")]
    UnknownDType { node: String, dtype: String },

    #[error("Allocation for tensor '{node}' overflows the address space")]
    AllocationOverflow { node: String },

    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Trace serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
