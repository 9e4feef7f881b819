//! Pass pipeline for kernelsim programs.
//!
//! This crate takes an `IrGraph` built by a producer and runs it through an
//! ordered list of transformation passes:
//! 1. **Loop unrolling** - Replace LOOP nodes with per-iteration BLOCK nodes
//! 2. **Tensor fusion** - Merge adjacent matmul + add pairs
//! 3. **Memory mapping** - Assign aligned offsets to ALLOC nodes
//!
//! Every pass reports into a shared `TraceRecorder`, which can be exported
//! to JSON once the run finishes.
//!
//! # Example
//!
//! ```no_run
//! use kernelsim_compiler::{IrGraph, PipelineConfig, compile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = IrGraph::new();
//! graph.add_tensor("A", &[1024, 512], "f32")?;
//! graph.add_loop("main_loop", 0, 10, 1)?;
//!
//! let recorder = compile(&mut graph, &PipelineConfig::default())?;
//! recorder.export_trace("trace.json")?;
//!
//! println!("Ran {} passes", recorder.passes().len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod pass;
pub mod pass_manager;
pub mod passes;

pub use config::PipelineConfig;
pub use pass::{Pass, PassKind};
pub use pass_manager::PassManager;
pub use passes::{
    ALIGNMENT, DEFAULT_UNROLL_FACTOR, FUSED_OPS_ATTR, LoopUnrollingPass, MEMORY_OFFSET_ATTR,
    MEMORY_SIZE_ATTR, MemoryMapPass, TensorFusionPass,
};

// Re-export commonly used types from kernelsim-core
pub use kernelsim_core::{Error, IrGraph, IrNode, IrNodeId, OpKind, Result, TraceRecorder};

/// A pipeline run that stopped early, with the trace recorded up to that point.
#[derive(Debug, thiserror::Error)]
#[error("Pass pipeline aborted")]
pub struct PipelineFailure {
    /// The error that stopped the run.
    #[source]
    pub error: Error,

    /// Trace of every pass that ran, including the one that failed.
    pub recorder: TraceRecorder,
}

/// Run the configured pipeline over `graph` and return its trace.
///
/// This is a convenience wrapper around `PipelineConfig::build` and
/// `PassManager::run`.
///
/// # Errors
///
/// Returns a `PipelineFailure` carrying both the error and the partial trace,
/// so the trace can still be exported.
#[tracing::instrument(skip_all, fields(num_nodes = graph.len(), num_passes = config.passes.len()))]
pub fn compile(
    graph: &mut IrGraph,
    config: &PipelineConfig,
) -> std::result::Result<TraceRecorder, PipelineFailure> {
    let mut manager = config.build().map_err(|error| PipelineFailure {
        error,
        recorder: TraceRecorder::new(),
    })?;

    match manager.run(graph) {
        Ok(()) => Ok(manager.into_recorder()),
        Err(error) => Err(PipelineFailure {
            error,
            recorder: manager.into_recorder(),
        }),
    }
}
