//! Pass definitions.

use crate::passes::{LoopUnrollingPass, MemoryMapPass, TensorFusionPass};
use kernelsim_core::{IrGraph, Result, TraceRecorder};
use std::fmt;
use std::str::FromStr;

/// Selector for a pass, used by configuration surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum PassKind {
    /// Fully unroll LOOP nodes into BLOCK nodes.
    LoopUnroll,
    /// Fuse adjacent matmul + add pairs.
    Fusion,
    /// Place ALLOC nodes in device memory.
    MemoryMap,
}

impl PassKind {
    /// All kinds in the default pipeline order.
    pub const ALL: [PassKind; 3] = [PassKind::LoopUnroll, PassKind::Fusion, PassKind::MemoryMap];

    /// Name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::LoopUnroll => "loop-unroll",
            PassKind::Fusion => "fusion",
            PassKind::MemoryMap => "memory-map",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PassKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown pass '{}'", s))
    }
}

/// A configured pass.
///
/// The set of passes is closed, so dispatch is an exhaustive `match` rather
/// than a trait object.
#[derive(Debug, Clone)]
pub enum Pass {
    LoopUnroll(LoopUnrollingPass),
    Fusion(TensorFusionPass),
    MemoryMap(MemoryMapPass),
}

impl Pass {
    /// Get the pass name (used for tracing and logging).
    pub fn name(&self) -> &'static str {
        match self {
            Pass::LoopUnroll(_) => "LoopUnrollingPass",
            Pass::Fusion(_) => "TensorFusionPass",
            Pass::MemoryMap(_) => "MemoryMapPass",
        }
    }

    /// Selector for this pass.
    pub fn kind(&self) -> PassKind {
        match self {
            Pass::LoopUnroll(_) => PassKind::LoopUnroll,
            Pass::Fusion(_) => PassKind::Fusion,
            Pass::MemoryMap(_) => PassKind::MemoryMap,
        }
    }

    /// Run the pass with exclusive access to the program.
    ///
    /// Transformation events go into the recorder's open entry.
    pub fn run(&self, graph: &mut IrGraph, recorder: &mut TraceRecorder) -> Result<()> {
        match self {
            Pass::LoopUnroll(pass) => pass.run(graph, recorder),
            Pass::Fusion(pass) => pass.run(graph, recorder),
            Pass::MemoryMap(pass) => pass.run(graph, recorder),
        }
    }
}

impl From<LoopUnrollingPass> for Pass {
    fn from(pass: LoopUnrollingPass) -> Self {
        Pass::LoopUnroll(pass)
    }
}

impl From<TensorFusionPass> for Pass {
    fn from(pass: TensorFusionPass) -> Self {
        Pass::Fusion(pass)
    }
}

impl From<MemoryMapPass> for Pass {
    fn from(pass: MemoryMapPass) -> Self {
        Pass::MemoryMap(pass)
    }
}
