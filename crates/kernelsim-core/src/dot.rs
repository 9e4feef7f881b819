//! DOT graph visualization for IR programs.
//!
//! Generates Graphviz DOT format showing nodes in program order with their
//! dataflow edges.

use crate::ir::{IrGraph, IrNodeId, OpKind};
use std::collections::BTreeSet;

/// Generate a DOT graph from a program.
///
/// The graph shows:
/// - Each node in program order labeled with its name, opcode and position
/// - Input edges (solid) and output edges (dashed)
/// - Referenced nodes that are no longer in program order, greyed out
///
/// # Example
///
/// ```ignore
/// let dot = to_dot(&graph);
/// std::fs::write("program.dot", dot)?;
/// // Render with: dot -Tpng program.dot -o program.png
/// ```
pub fn to_dot(graph: &IrGraph) -> String {
    let mut dot = String::new();
    dot.push_str("digraph program {\n");
    dot.push_str("  rankdir=TB;\n");
    dot.push_str("  node [shape=box, style=rounded];\n\n");

    let placed: BTreeSet<IrNodeId> = graph.order().iter().copied().collect();
    let mut detached: BTreeSet<IrNodeId> = BTreeSet::new();

    for (idx, (id, node)) in graph.nodes().enumerate() {
        let fill = match node.kind() {
            OpKind::Alloc => ", style=\"rounded,filled\", fillcolor=lightyellow",
            OpKind::MatMul => ", style=\"rounded,filled\", fillcolor=lightblue",
            OpKind::Loop | OpKind::Block => ", style=\"rounded,filled\", fillcolor=lightgreen",
            OpKind::Add | OpKind::Mul | OpKind::Load | OpKind::Store => "",
        };
        dot.push_str(&format!(
            "  n{} [label=\"{} [#{}]\\n{}\"{}];\n",
            id.index(),
            escape_dot_string(node.name()),
            idx,
            node.kind(),
            fill
        ));

        for referenced in node.inputs().iter().chain(node.outputs()) {
            if !placed.contains(referenced) {
                detached.insert(*referenced);
            }
        }
    }

    for id in &detached {
        if let Ok(node) = graph.node(*id) {
            dot.push_str(&format!(
                "  n{} [label=\"{}\\n{}\", color=grey, fontcolor=grey];\n",
                id.index(),
                escape_dot_string(node.name()),
                node.kind()
            ));
        }
    }

    dot.push('\n');

    for (id, node) in graph.nodes() {
        for input in node.inputs() {
            dot.push_str(&format!("  n{} -> n{};\n", input.index(), id.index()));
        }
        for output in node.outputs() {
            dot.push_str(&format!(
                "  n{} -> n{} [style=dashed];\n",
                id.index(),
                output.index()
            ));
        }
    }

    dot.push_str("}\n");
    dot
}

/// Escape a string for use inside a DOT label.
fn escape_dot_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_contains_nodes_and_edges() {
        let mut graph = IrGraph::new();
        let a = graph.add_tensor("A", &[4], "f32").unwrap();
        let b = graph.add_tensor("B", &[4], "f32").unwrap();
        let mm = graph.add_matmul("mm", a, b).unwrap();

        let dot = to_dot(&graph);
        assert!(dot.starts_with("digraph program {"));
        assert!(dot.contains("mm [#2]\\nmatmul"));
        assert!(dot.contains(&format!("n{} -> n{};", a.index(), mm.index())));
        assert!(dot.contains(&format!("n{} -> n{};", b.index(), mm.index())));
    }

    #[test]
    fn test_dot_marks_detached_references() {
        let mut graph = IrGraph::new();
        let a = graph.add_tensor("A", &[4], "f32").unwrap();
        let mm = graph.add_matmul("mm", a, a).unwrap();
        graph.replace_order(vec![mm]).unwrap();

        let dot = to_dot(&graph);
        assert!(dot.contains("color=grey"));
    }

    #[test]
    fn test_escape_dot_string() {
        assert_eq!(escape_dot_string("a\"b"), "a\\\"b");
    }
}
