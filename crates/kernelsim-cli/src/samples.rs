//! Built-in sample programs.
//!
//! These stand in for a front-end: each one builds a small program directly
//! with the node factories.

use kernelsim_core::{IrGraph, IrNode, OpKind, Result};

/// A built-in program to feed through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Sample {
    /// C = A x B with A{1024,512}, B{512,256}, C{1024,256} in f32
    Matmul,
    /// The matmul followed by a bias add, ready for fusion
    Linear,
    /// A tensor and a ten-iteration loop
    Loop,
}

impl Sample {
    /// Build the program.
    pub fn build(self) -> Result<IrGraph> {
        match self {
            Sample::Matmul => matmul(),
            Sample::Linear => linear(),
            Sample::Loop => looped(),
        }
    }
}

fn matmul() -> Result<IrGraph> {
    let mut graph = IrGraph::new();
    let a = graph.add_tensor("A", &[1024, 512], "f32")?;
    let b = graph.add_tensor("B", &[512, 256], "f32")?;
    let c = graph.add_tensor("C", &[1024, 256], "f32")?;

    let matmul = graph.add_matmul("matmul_op", a, b)?;
    graph.add_output(matmul, c)?;
    Ok(graph)
}

fn linear() -> Result<IrGraph> {
    let mut graph = IrGraph::new();
    let a = graph.add_tensor("A", &[1024, 512], "f32")?;
    let b = graph.add_tensor("B", &[512, 256], "f32")?;
    let bias = graph.add_tensor("bias", &[256], "f32")?;
    let y = graph.add_tensor("Y", &[1024, 256], "f32")?;

    let matmul = graph.add_matmul("matmul_op", a, b)?;

    let mut add = IrNode::new(OpKind::Add, "bias_add");
    add.add_input(matmul).add_input(bias).add_output(y);
    graph.add_node(add)?;
    Ok(graph)
}

fn looped() -> Result<IrGraph> {
    let mut graph = IrGraph::new();
    let x = graph.add_tensor("X", &[64, 64], "f16")?;
    let body = graph.add_loop("main_loop", 0, 10, 1)?;
    graph.add_input(body, x)?;
    graph.node_mut(body)?.set_location(4, 5);
    Ok(graph)
}
