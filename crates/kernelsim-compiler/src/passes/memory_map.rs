//! Memory mapping pass.
//!
//! Assigns every ALLOC node a byte range in a single linear address space.
//! Placement is bump allocation with each offset rounded up to
//! [`ALIGNMENT`]; the running offset then advances by the raw tensor size.

use kernelsim_core::{DataType, Error, IrGraph, OpKind, Result, SymbolInfo, TraceRecorder};

/// Placement alignment in bytes.
pub const ALIGNMENT: u64 = 256;

/// Attribute key holding an ALLOC's assigned offset.
pub const MEMORY_OFFSET_ATTR: &str = "memory_offset";

/// Attribute key holding an ALLOC's size in bytes.
pub const MEMORY_SIZE_ATTR: &str = "memory_size";

/// Pass that places ALLOC nodes in device memory.
///
/// Each ALLOC must carry an integer-sequence `shape` with positive
/// dimensions and a string `dtype`. Element width is 2 bytes for `f16`,
/// 8 for `f64`, and 4 otherwise. An unrecognized dtype is sized as 4 bytes
/// with a warning, unless strict mode is on, in which case it is an error.
///
/// Results are written back as `memory_offset` / `memory_size` attributes,
/// into the recorder's memory map, and as a symbol per tensor.
#[derive(Debug, Clone, Default)]
pub struct MemoryMapPass {
    strict_dtypes: bool,
}

impl MemoryMapPass {
    /// Create a memory mapping pass with the lenient dtype fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject unrecognized dtypes instead of sizing them as 4 bytes.
    pub fn with_strict_dtypes(mut self, strict: bool) -> Self {
        self.strict_dtypes = strict;
        self
    }

    /// Run the pass.
    pub fn run(&self, graph: &mut IrGraph, recorder: &mut TraceRecorder) -> Result<()> {
        let mut current_offset: u64 = 0;

        for id in graph.order().to_vec() {
            let node = graph.node(id)?;
            match node.kind() {
                OpKind::Alloc => {}
                OpKind::MatMul
                | OpKind::Add
                | OpKind::Mul
                | OpKind::Load
                | OpKind::Store
                | OpKind::Loop
                | OpKind::Block => continue,
            }

            let name = node.name().to_string();
            let shape = node.ints_attribute("shape")?.to_vec();
            if shape.iter().any(|&dim| dim <= 0) {
                return Err(Error::MalformedShape {
                    node: name,
                    dims: shape,
                });
            }

            let dtype = DataType::from_name(node.string_attribute("dtype")?);
            if !dtype.is_known() {
                if self.strict_dtypes {
                    return Err(Error::UnknownDType {
                        node: name,
                        dtype: dtype.to_string(),
                    });
                }
                tracing::warn!(tensor = %name, %dtype, "unknown dtype, assuming 4-byte elements");
            }

            let overflow = || Error::AllocationOverflow { node: name.clone() };
            let size = allocation_size(&shape, &dtype).ok_or_else(overflow)?;
            let offset = align_up(current_offset, ALIGNMENT).ok_or_else(overflow)?;
            let end = offset.checked_add(size).ok_or_else(overflow)?;
            let offset_attr = i64::try_from(offset).map_err(|_| overflow())?;
            let size_attr = i64::try_from(size).map_err(|_| overflow())?;
            let location = node.location.clone().unwrap_or_default();

            let node = graph.node_mut(id)?;
            node.set_attribute(MEMORY_OFFSET_ATTR, offset_attr)
                .set_attribute(MEMORY_SIZE_ATTR, size_attr);

            recorder.record_memory_mapping(name.clone(), offset, size);
            recorder.add_symbol(
                name.clone(),
                SymbolInfo {
                    ty: format!("tensor<{}>", dtype),
                    memory_offset: offset,
                    shape,
                    location,
                },
            );
            recorder.record_transformation(format!(
                "Mapped tensor {} to offset {} (size: {} bytes)",
                name, offset, size
            ));

            current_offset = end;
        }

        recorder.record_transformation(format!(
            "Total memory allocated: {} bytes",
            current_offset
        ));
        Ok(())
    }
}

/// Byte size of a tensor. An empty shape has size zero.
fn allocation_size(shape: &[i64], dtype: &DataType) -> Option<u64> {
    if shape.is_empty() {
        return Some(0);
    }

    shape
        .iter()
        .try_fold(1u64, |acc, &dim| acc.checked_mul(u64::try_from(dim).ok()?))?
        .checked_mul(dtype.size_bytes())
}

/// Round `offset` up to the next multiple of `alignment`.
fn align_up(offset: u64, alignment: u64) -> Option<u64> {
    match offset % alignment {
        0 => Some(offset),
        rem => offset.checked_add(alignment - rem),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernelsim_core::{IrNode, IrNodeId, MemoryRegion};

    fn run_pass(graph: &mut IrGraph, strict: bool) -> Result<TraceRecorder> {
        let mut recorder = TraceRecorder::new();
        recorder.begin_pass("MemoryMapPass");
        let result = MemoryMapPass::new()
            .with_strict_dtypes(strict)
            .run(graph, &mut recorder);
        recorder.end_pass(graph.dump());
        result.map(|_| recorder)
    }

    fn placement(graph: &IrGraph, id: IrNodeId) -> (i64, i64) {
        let node = graph.node(id).unwrap();
        (
            node.int_attribute(MEMORY_OFFSET_ATTR).unwrap(),
            node.int_attribute(MEMORY_SIZE_ATTR).unwrap(),
        )
    }

    #[test]
    fn test_matmul_operands_layout() {
        let mut graph = IrGraph::new();
        let a = graph.add_tensor("A", &[1024, 512], "f32").unwrap();
        let b = graph.add_tensor("B", &[512, 256], "f32").unwrap();
        let c = graph.add_tensor("C", &[1024, 256], "f32").unwrap();

        let recorder = run_pass(&mut graph, false).unwrap();

        assert_eq!(placement(&graph, a), (0, 2097152));
        assert_eq!(placement(&graph, b), (2097152, 524288));
        assert_eq!(placement(&graph, c), (2621440, 1048576));
        assert_eq!(
            recorder.memory_region("C"),
            Some(MemoryRegion {
                offset: 2621440,
                size: 1048576
            })
        );
        assert_eq!(
            recorder.passes()[0].transformations.last().unwrap(),
            "Total memory allocated: 3670016 bytes"
        );
    }

    #[test]
    fn test_offsets_are_aligned_and_advance_by_raw_size() {
        let mut graph = IrGraph::new();
        let a = graph.add_tensor("a", &[3], "f16").unwrap(); // 6 bytes
        let b = graph.add_tensor("b", &[5], "f64").unwrap(); // 40 bytes
        let c = graph.add_tensor("c", &[1], "f32").unwrap();

        let recorder = run_pass(&mut graph, false).unwrap();

        assert_eq!(placement(&graph, a), (0, 6));
        assert_eq!(placement(&graph, b), (256, 40));
        assert_eq!(placement(&graph, c), (512, 4));
        assert_eq!(
            recorder.passes()[0].transformations.last().unwrap(),
            "Total memory allocated: 516 bytes"
        );
    }

    #[test]
    fn test_empty_shape_has_zero_size() {
        let mut graph = IrGraph::new();
        let scalar = graph.add_tensor("s", &[], "f32").unwrap();
        let next = graph.add_tensor("t", &[2], "f32").unwrap();

        run_pass(&mut graph, false).unwrap();

        assert_eq!(placement(&graph, scalar), (0, 0));
        assert_eq!(placement(&graph, next), (0, 8));
    }

    #[test]
    fn test_unknown_dtype_defaults_to_four_bytes() {
        let mut graph = IrGraph::new();
        let t = graph.add_tensor("t", &[10], "bf16").unwrap();
        run_pass(&mut graph, false).unwrap();
        assert_eq!(placement(&graph, t), (0, 40));
    }

    #[test]
    fn test_unknown_dtype_rejected_in_strict_mode() {
        let mut graph = IrGraph::new();
        graph.add_tensor("t", &[10], "bf16").unwrap();
        let err = run_pass(&mut graph, true).unwrap_err();
        assert!(matches!(err, Error::UnknownDType { ref dtype, .. } if dtype == "bf16"));
    }

    #[test]
    fn test_non_positive_dimension_rejected() {
        let mut graph = IrGraph::new();
        let first = graph.add_tensor("ok", &[4], "f32").unwrap();
        graph.add_tensor("bad", &[4, 0], "f32").unwrap();

        let err = run_pass(&mut graph, false).unwrap_err();
        assert!(matches!(err, Error::MalformedShape { ref node, .. } if node == "bad"));
        // Placements made before the failure are kept.
        assert_eq!(placement(&graph, first), (0, 16));
    }

    #[test]
    fn test_missing_dtype_rejected() {
        let mut node = IrNode::new(OpKind::Alloc, "t");
        node.set_attribute("shape", vec![4]);
        let mut graph = IrGraph::new();
        graph.add_node(node).unwrap();

        let err = run_pass(&mut graph, false).unwrap_err();
        assert!(matches!(err, Error::AttributeNotFound { ref key, .. } if key == "dtype"));
    }

    #[test]
    fn test_size_overflow_aborts() {
        let mut graph = IrGraph::new();
        graph
            .add_tensor("huge", &[i64::MAX, i64::MAX], "f32")
            .unwrap();
        let err = run_pass(&mut graph, false).unwrap_err();
        assert!(matches!(err, Error::AllocationOverflow { .. }));
    }

    #[test]
    fn test_registers_symbols() {
        let mut graph = IrGraph::new();
        let mut tensor = kernelsim_core::ir_builder::tensor_node("A", &[8, 8], "f16");
        tensor.set_location(3, 1);
        graph.add_node(tensor).unwrap();
        graph.add_tensor("B", &[8], "f32").unwrap();

        let recorder = run_pass(&mut graph, false).unwrap();

        let a = recorder.lookup_symbol("A").unwrap();
        assert_eq!(a.ty, "tensor<f16>");
        assert_eq!(a.shape, vec![8, 8]);
        assert_eq!(a.location.line, 3);
        assert_eq!(recorder.lookup_symbol("B").unwrap().memory_offset, 256);
    }

    #[test]
    fn test_non_alloc_nodes_untouched() {
        let mut graph = IrGraph::new();
        let a = graph.add_tensor("A", &[4], "f32").unwrap();
        let mm = graph.add_matmul("mm", a, a).unwrap();

        run_pass(&mut graph, false).unwrap();
        assert!(!graph.node(mm).unwrap().has_attribute(MEMORY_OFFSET_ATTR));
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), Some(0));
        assert_eq!(align_up(1, 256), Some(256));
        assert_eq!(align_up(256, 256), Some(256));
        assert_eq!(align_up(u64::MAX, 256), None);
    }
}
