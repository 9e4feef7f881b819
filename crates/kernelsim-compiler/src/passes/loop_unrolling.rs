//! Loop unrolling pass.
//!
//! Replaces every LOOP node with one BLOCK node per iteration, in place of the
//! loop's position in program order.

use kernelsim_core::{Error, IrGraph, IrNode, IrNodeId, OpKind, Result, TraceRecorder};

/// Default number of iterations emitted per outer step.
pub const DEFAULT_UNROLL_FACTOR: usize = 4;

/// Pass that fully unrolls LOOP nodes into per-iteration BLOCK nodes.
///
/// Each LOOP must carry integer `start`, `end`, and `step` attributes. The
/// iteration space is the half-open range `[start, end)` walked by `step`.
/// An empty range produces no blocks; a step that cannot reach `end` (zero,
/// or negative over a non-empty range) is rejected. Every iteration becomes a BLOCK named
/// `<loop>_unroll_<index>` with an `iteration` attribute holding the absolute
/// index.
///
/// The unroll factor only sets how many blocks are emitted per outer step
/// (`step * factor`); the total block count is always the full trip count.
///
/// Unrolled blocks carry no dataflow edges: the loop's inputs and outputs are
/// not propagated to them.
#[derive(Debug, Clone)]
pub struct LoopUnrollingPass {
    factor: usize,
}

impl LoopUnrollingPass {
    /// Create a new loop unrolling pass.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUnrollFactor` if `factor` is zero.
    pub fn new(factor: usize) -> Result<Self> {
        if factor == 0 {
            return Err(Error::InvalidUnrollFactor(factor));
        }
        Ok(Self { factor })
    }

    /// The configured unroll factor.
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Emit one BLOCK per iteration of `node`, appending ids to `order`.
    fn unroll(&self, node: &IrNode, graph: &mut IrGraph, order: &mut Vec<IrNodeId>) -> Result<()> {
        let start = node.int_attribute("start")?;
        let end = node.int_attribute("end")?;
        let step = node.int_attribute("step")?;

        // Only `step > 0` ever reaches `end`; an empty range is fine either way.
        if step == 0 || (step < 0 && start < end) {
            return Err(Error::InvalidStep {
                node: node.name.clone(),
            });
        }

        let in_range = |index: i64| index < end;
        let factor = i64::try_from(self.factor).unwrap_or(i64::MAX);
        let outer_step = step.saturating_mul(factor);

        let mut outer = start;
        while in_range(outer) {
            let mut index = outer;
            for _ in 0..self.factor {
                if !in_range(index) {
                    break;
                }

                let name = format!("{}_unroll_{}", node.name, index);
                let mut block = IrNode::new(OpKind::Block, name);
                block.set_attribute("iteration", index);
                order.push(graph.add_detached(block)?);

                index = match index.checked_add(step) {
                    Some(next) => next,
                    None => return Ok(()),
                };
            }

            outer = match outer.checked_add(outer_step) {
                Some(next) => next,
                None => break,
            };
        }

        Ok(())
    }

    /// Run the pass.
    pub fn run(&self, graph: &mut IrGraph, recorder: &mut TraceRecorder) -> Result<()> {
        let mut order = Vec::with_capacity(graph.len());

        for id in graph.order().to_vec() {
            let node = graph.node(id)?;
            match node.kind() {
                OpKind::Loop => {
                    let node = node.clone();
                    recorder.record_transformation(format!(
                        "Unrolling loop {} by factor {}",
                        node.name, self.factor
                    ));
                    let before = order.len();
                    self.unroll(&node, graph, &mut order)?;
                    tracing::debug!(
                        loop_name = %node.name,
                        blocks = order.len() - before,
                        "loop unrolled"
                    );
                }
                OpKind::MatMul
                | OpKind::Add
                | OpKind::Mul
                | OpKind::Load
                | OpKind::Store
                | OpKind::Alloc
                | OpKind::Block => order.push(id),
            }
        }

        graph.replace_order(order)?;
        Ok(())
    }
}

impl Default for LoopUnrollingPass {
    fn default() -> Self {
        Self {
            factor: DEFAULT_UNROLL_FACTOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernelsim_core::AttributeKind;
    use kernelsim_core::ir_builder::loop_node;

    fn iterations(graph: &IrGraph) -> Vec<i64> {
        graph
            .nodes()
            .filter(|(_, n)| n.kind() == OpKind::Block)
            .map(|(_, n)| n.int_attribute("iteration").unwrap())
            .collect()
    }

    fn run_pass(graph: &mut IrGraph, factor: usize) -> Result<TraceRecorder> {
        let mut recorder = TraceRecorder::new();
        recorder.begin_pass("LoopUnrollingPass");
        LoopUnrollingPass::new(factor)?.run(graph, &mut recorder)?;
        recorder.end_pass(graph.dump());
        Ok(recorder)
    }

    #[test]
    fn test_unroll_zero_to_ten() {
        let mut graph = IrGraph::new();
        graph.add_loop("main_loop", 0, 10, 1).unwrap();

        let recorder = run_pass(&mut graph, 4).unwrap();

        assert_eq!(graph.len(), 10);
        assert_eq!(iterations(&graph), (0..10).collect::<Vec<_>>());
        assert_eq!(
            graph.node(graph.order()[3]).unwrap().name(),
            "main_loop_unroll_3"
        );
        assert_eq!(
            recorder.passes()[0].transformations,
            vec!["Unrolling loop main_loop by factor 4"]
        );
    }

    #[test]
    fn test_factor_does_not_change_block_count() {
        for factor in [1, 3, 4, 7, 100] {
            let mut graph = IrGraph::new();
            graph.add_loop("l", 2, 23, 3).unwrap();
            run_pass(&mut graph, factor).unwrap();
            assert_eq!(
                iterations(&graph),
                vec![2, 5, 8, 11, 14, 17, 20],
                "factor {}",
                factor
            );
        }
    }

    #[test]
    fn test_negative_step_over_empty_range_emits_nothing() {
        let mut graph = IrGraph::new();
        graph.add_loop("down", 5, 0, -2).unwrap();
        run_pass(&mut graph, 2).unwrap();
        assert!(iterations(&graph).is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_negative_step_over_nonempty_range_rejected() {
        let mut graph = IrGraph::new();
        graph.add_loop("runaway", 0, 5, -1).unwrap();
        let err = run_pass(&mut graph, 4).unwrap_err();
        assert!(matches!(err, Error::InvalidStep { ref node } if node == "runaway"));
    }

    #[test]
    fn test_empty_range_removes_loop() {
        let mut graph = IrGraph::new();
        graph.add_loop("empty", 4, 4, 1).unwrap();
        run_pass(&mut graph, 4).unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_zero_step_rejected() {
        let mut graph = IrGraph::new();
        graph.add_loop("spin", 0, 10, 0).unwrap();
        let err = run_pass(&mut graph, 4).unwrap_err();
        assert!(matches!(err, Error::InvalidStep { ref node } if node == "spin"));
    }

    #[test]
    fn test_missing_bound_rejected() {
        let mut node = loop_node("l", 0, 10, 1);
        node.attributes.remove("end");
        let mut graph = IrGraph::new();
        graph.add_node(node).unwrap();

        let err = run_pass(&mut graph, 4).unwrap_err();
        assert!(matches!(err, Error::AttributeNotFound { ref key, .. } if key == "end"));
    }

    #[test]
    fn test_bound_of_wrong_kind_rejected() {
        let mut node = loop_node("l", 0, 10, 1);
        node.set_attribute("start", 0.5);
        let mut graph = IrGraph::new();
        graph.add_node(node).unwrap();

        let err = run_pass(&mut graph, 4).unwrap_err();
        assert!(matches!(
            err,
            Error::AttributeTypeMismatch {
                ref key,
                expected: AttributeKind::Int,
                found: AttributeKind::Float,
                ..
            } if key == "start"
        ));
        // The loop is left in place.
        assert_eq!(graph.node(graph.order()[0]).unwrap().kind(), OpKind::Loop);
    }

    #[test]
    fn test_zero_factor_rejected() {
        assert!(matches!(
            LoopUnrollingPass::new(0),
            Err(Error::InvalidUnrollFactor(0))
        ));
    }

    #[test]
    fn test_non_loop_nodes_keep_order() {
        let mut graph = IrGraph::new();
        let a = graph.add_tensor("A", &[4], "f32").unwrap();
        graph.add_loop("l", 0, 2, 1).unwrap();
        let b = graph.add_tensor("B", &[4], "f32").unwrap();

        run_pass(&mut graph, 4).unwrap();

        let names: Vec<&str> = graph.nodes().map(|(_, n)| n.name()).collect();
        assert_eq!(names, vec!["A", "l_unroll_0", "l_unroll_1", "B"]);
        assert_eq!(graph.order()[0], a);
        assert_eq!(graph.order()[3], b);
    }

    #[test]
    fn test_range_near_integer_limit_terminates() {
        let mut graph = IrGraph::new();
        graph.add_loop("edge", i64::MAX - 3, i64::MAX, 2).unwrap();
        run_pass(&mut graph, 4).unwrap();
        assert_eq!(iterations(&graph), vec![i64::MAX - 3, i64::MAX - 1]);
    }
}
