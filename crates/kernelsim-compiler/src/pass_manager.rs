//! Ordered pass execution with per-pass tracing.

use crate::pass::Pass;
use kernelsim_core::{IrGraph, Result, TraceRecorder};

/// Runs a fixed list of passes over one program and owns the trace.
///
/// Passes run strictly in registration order. For each pass the manager
/// opens a trace entry, optionally snapshots the program, runs the pass,
/// optionally snapshots again, and closes the entry with the full dump of
/// the program after the pass.
///
/// If a pass fails, its trace entry is closed with the program as it stood
/// at the failure and the run stops. Changes the pass already made are kept.
#[derive(Debug, Default)]
pub struct PassManager {
    /// Passes in execution order.
    passes: Vec<Pass>,

    /// Instrumentation shared by all passes.
    recorder: TraceRecorder,

    /// Record before/after snapshots for every pass.
    emit_ir: bool,
}

impl PassManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable before/after snapshots.
    pub fn with_emit_ir(mut self, emit_ir: bool) -> Self {
        self.emit_ir = emit_ir;
        self
    }

    /// Register a pass at the end of the pipeline.
    ///
    /// Returns a mutable reference to self for method chaining.
    pub fn add_pass(&mut self, pass: impl Into<Pass>) -> &mut Self {
        self.passes.push(pass.into());
        self
    }

    /// Registered passes in execution order.
    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// The trace accumulated so far.
    pub fn recorder(&self) -> &TraceRecorder {
        &self.recorder
    }

    /// Mutable access to the trace, e.g. to register producer symbols.
    pub fn recorder_mut(&mut self) -> &mut TraceRecorder {
        &mut self.recorder
    }

    /// Give up the manager and keep its trace.
    pub fn into_recorder(self) -> TraceRecorder {
        self.recorder
    }

    /// Run every registered pass over `graph`, in order.
    ///
    /// On return `graph` holds the last pass's output.
    ///
    /// # Errors
    ///
    /// Returns the first pass error. Later passes do not run.
    #[tracing::instrument(skip_all, fields(num_nodes = graph.len(), num_passes = self.passes.len()))]
    pub fn run(&mut self, graph: &mut IrGraph) -> Result<()> {
        for pass in &self.passes {
            let name = pass.name();
            let _span = tracing::debug_span!("pass", name).entered();

            self.recorder.begin_pass(name);

            if self.emit_ir {
                self.recorder
                    .record_snapshot(format!("Before {}", name), graph.dump());
            }

            if let Err(e) = pass.run(graph, &mut self.recorder) {
                tracing::error!(pass = name, error = %e, "pass failed; aborting pipeline");
                self.recorder.end_pass(graph.dump());
                return Err(e);
            }

            let ir_after = graph.dump();
            if self.emit_ir {
                self.recorder
                    .record_snapshot(format!("After {}", name), ir_after.clone());
            }

            self.recorder.end_pass(ir_after);
            tracing::debug!(num_nodes = graph.len(), "pass finished");
        }

        Ok(())
    }
}
