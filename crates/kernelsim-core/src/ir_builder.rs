//! Node factories for common program shapes.
//!
//! Producers build programs out of these helpers; they only fill in the
//! attributes the passes read and never validate them.

use crate::Result;
use crate::ir::{IrGraph, IrNode, IrNodeId, OpKind};

/// Build an ALLOC node with `shape`, `dtype`, and element-count `size`.
///
/// `size` is left out when the element count does not fit in an `i64`;
/// memory mapping reports such tensors as overflowing.
pub fn tensor_node(name: &str, shape: &[i64], dtype: &str) -> IrNode {
    let mut node = IrNode::new(OpKind::Alloc, name);
    node.set_attribute("shape", shape).set_attribute("dtype", dtype);

    match shape.iter().try_fold(1i64, |acc, &dim| acc.checked_mul(dim)) {
        Some(elements) => {
            node.set_attribute("size", elements);
        }
        None => {
            tracing::warn!(tensor = name, ?shape, "element count overflows; omitting size");
        }
    }
    node
}

/// Build a MATMUL node reading `a` and `b`.
pub fn matmul_node(name: &str, a: IrNodeId, b: IrNodeId) -> IrNode {
    let mut node = IrNode::new(OpKind::MatMul, name);
    node.add_input(a).add_input(b);
    node
}

/// Build a LOOP node over `[start, end)` with the given step.
pub fn loop_node(name: &str, start: i64, end: i64, step: i64) -> IrNode {
    let mut node = IrNode::new(OpKind::Loop, name);
    node.set_attribute("start", start)
        .set_attribute("end", end)
        .set_attribute("step", step);
    node
}

impl IrGraph {
    /// Append an ALLOC node. See [`tensor_node`].
    pub fn add_tensor(&mut self, name: &str, shape: &[i64], dtype: &str) -> Result<IrNodeId> {
        self.add_node(tensor_node(name, shape, dtype))
    }

    /// Append a MATMUL node. See [`matmul_node`].
    pub fn add_matmul(&mut self, name: &str, a: IrNodeId, b: IrNodeId) -> Result<IrNodeId> {
        self.add_node(matmul_node(name, a, b))
    }

    /// Append a LOOP node. See [`loop_node`].
    pub fn add_loop(&mut self, name: &str, start: i64, end: i64, step: i64) -> Result<IrNodeId> {
        self.add_node(loop_node(name, start, end, step))
    }
}
