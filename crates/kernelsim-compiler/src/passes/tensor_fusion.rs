//! Tensor fusion pass.
//!
//! Fuses a MATMUL with the ADD that immediately follows it in program order
//! when that ADD reads the MATMUL as its first operand.

use kernelsim_core::{IrGraph, IrNode, IrNodeId, OpKind, Result, TraceRecorder};
use std::collections::HashSet;

/// Attribute key marking a node produced by fusion.
pub const FUSED_OPS_ATTR: &str = "fused_ops";

/// Pass that fuses `matmul` + `add` pairs into a single biased matmul.
///
/// Matching is by program adjacency and node identity: the ADD must sit
/// directly after the MATMUL and its first input must be that exact node.
/// The fused node reads the matmul's inputs followed by the add's second
/// input (the bias) when present, writes the add's outputs, and carries
/// `fused_ops = matmul_add`.
///
/// Only this single two-node pattern is recognized. Nodes that referenced
/// the original ADD keep pointing at it.
#[derive(Debug, Clone, Default)]
pub struct TensorFusionPass;

impl TensorFusionPass {
    /// Create a new tensor fusion pass.
    pub fn new() -> Self {
        Self
    }

    /// Check whether `next` is an ADD consuming `matmul` as its first operand.
    fn is_fusable(matmul_id: IrNodeId, matmul: &IrNode, next: &IrNode) -> bool {
        matmul.kind() == OpKind::MatMul
            && next.kind() == OpKind::Add
            && next.inputs().first() == Some(&matmul_id)
    }

    /// Build the fused node for a matched pair.
    fn fuse(matmul: &IrNode, add: &IrNode) -> IrNode {
        let mut fused = IrNode::new(OpKind::MatMul, format!("{}_fused_add", matmul.name()));

        for &input in matmul.inputs() {
            fused.add_input(input);
        }
        if let Some(&bias) = add.inputs().get(1) {
            fused.add_input(bias);
        }
        for &output in add.outputs() {
            fused.add_output(output);
        }

        fused.set_attribute(FUSED_OPS_ATTR, "matmul_add");
        fused
    }

    /// Run the pass.
    pub fn run(&self, graph: &mut IrGraph, recorder: &mut TraceRecorder) -> Result<()> {
        let program = graph.order().to_vec();
        let mut order = Vec::with_capacity(program.len());
        let mut consumed: HashSet<usize> = HashSet::new();

        let mut i = 0;
        while i < program.len() {
            if consumed.contains(&i) {
                i += 1;
                continue;
            }

            let id = program[i];
            if let Some(&next_id) = program.get(i + 1) {
                let node = graph.node(id)?;
                let next = graph.node(next_id)?;

                if Self::is_fusable(id, node, next) {
                    let fused = Self::fuse(node, next);
                    let description = format!(
                        "Fused {} and {} into {}",
                        node.name(),
                        next.name(),
                        fused.name()
                    );

                    let fused_id = graph.add_detached(fused)?;
                    order.push(fused_id);
                    consumed.insert(i);
                    consumed.insert(i + 1);

                    tracing::debug!(fused = ?fused_id, "{}", description);
                    recorder.record_transformation(description);

                    i += 2;
                    continue;
                }
            }

            order.push(id);
            i += 1;
        }

        graph.replace_order(order)?;
        Ok(())
    }
}
