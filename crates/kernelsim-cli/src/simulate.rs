//! Illustrative device summary for a compiled program.
//!
//! Nothing here runs a kernel. The summary lists the program's allocations
//! and one tiled launch per MATMUL, with sizes taken from the final graph.

use kernelsim_core::{DataType, IrGraph, IrNode, OpKind};
use std::fmt;

/// Tile edge used for matmul launch geometry.
pub const TILE_SIZE: u64 = 32;

/// One ALLOC as seen by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub name: String,
    /// Placement from memory mapping, if the pass ran.
    pub offset: Option<u64>,
    pub size: u64,
}

/// One matmul kernel launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelLaunch {
    pub name: String,
    pub grid: (u64, u64),
    pub block: (u64, u64),
    pub shared_mem_bytes: u64,
}

/// What a device would be asked to do for one program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSummary {
    pub allocations: Vec<Allocation>,
    pub kernels: Vec<KernelLaunch>,
}

impl DeviceSummary {
    /// Sum of all allocation sizes.
    pub fn total_bytes(&self) -> u64 {
        self.allocations
            .iter()
            .fold(0u64, |acc, a| acc.saturating_add(a.size))
    }
}

/// Collect allocations and kernel launches from `graph` in program order.
pub fn summarize(graph: &IrGraph) -> DeviceSummary {
    let mut summary = DeviceSummary::default();

    for (_, node) in graph.nodes() {
        match node.kind() {
            OpKind::Alloc => summary.allocations.push(Allocation {
                name: node.name().to_string(),
                offset: node
                    .int_attribute("memory_offset")
                    .ok()
                    .and_then(|o| u64::try_from(o).ok()),
                size: allocation_bytes(node),
            }),
            OpKind::MatMul => summary.kernels.push(matmul_launch(graph, node)),
            OpKind::Add
            | OpKind::Mul
            | OpKind::Load
            | OpKind::Store
            | OpKind::Loop
            | OpKind::Block => {}
        }
    }

    summary
}

/// Size recorded by memory mapping, or computed from shape and dtype.
fn allocation_bytes(node: &IrNode) -> u64 {
    if let Ok(size) = node.int_attribute("memory_size") {
        return u64::try_from(size).unwrap_or(0);
    }

    let dtype = node
        .string_attribute("dtype")
        .map(DataType::from_name)
        .unwrap_or(DataType::F32);
    node.ints_attribute("shape")
        .ok()
        .and_then(|dims| {
            dims.iter()
                .try_fold(1u64, |acc, &d| acc.checked_mul(u64::try_from(d).ok()?))
        })
        .map(|elements| elements.saturating_mul(dtype.size_bytes()))
        .unwrap_or(0)
}

/// Tiled launch for `C{M,N} = A{M,K} x B{K,N}`, read from the operand shapes.
fn matmul_launch(graph: &IrGraph, node: &IrNode) -> KernelLaunch {
    let dim = |index: usize, pick_last: bool| -> u64 {
        node.inputs()
            .get(index)
            .and_then(|&id| graph.node(id).ok())
            .and_then(|operand| operand.ints_attribute("shape").ok())
            .and_then(|dims| if pick_last { dims.last() } else { dims.first() })
            .and_then(|&d| u64::try_from(d).ok())
            .unwrap_or(1)
    };
    let (m, n) = (dim(0, false), dim(1, true));

    KernelLaunch {
        name: format!("{}_kernel", node.name()),
        grid: (n.div_ceil(TILE_SIZE), m.div_ceil(TILE_SIZE)),
        block: (TILE_SIZE, TILE_SIZE),
        shared_mem_bytes: 2 * TILE_SIZE * TILE_SIZE * DataType::F32.size_bytes(),
    }
}

/// Human-readable byte count with two decimals, e.g. `2.00 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

impl fmt::Display for DeviceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Device Summary ===")?;
        for alloc in &self.allocations {
            match alloc.offset {
                Some(offset) => writeln!(
                    f,
                    "Allocate {} for {} at +{:#x}",
                    format_bytes(alloc.size),
                    alloc.name,
                    offset
                )?,
                None => writeln!(f, "Allocate {} for {}", format_bytes(alloc.size), alloc.name)?,
            }
        }
        for kernel in &self.kernels {
            writeln!(
                f,
                "Kernel launch: {}<<<({},{}), ({},{})>>> shared={} bytes",
                kernel.name,
                kernel.grid.0,
                kernel.grid.1,
                kernel.block.0,
                kernel.block.1,
                kernel.shared_mem_bytes
            )?;
        }
        writeln!(f, "Kernels: {}", self.kernels.len())?;
        write!(f, "Memory footprint: {}", format_bytes(self.total_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sample;

    #[test]
    fn test_matmul_summary() {
        let graph = Sample::Matmul.build().unwrap();
        let summary = summarize(&graph);

        assert_eq!(summary.allocations.len(), 3);
        assert_eq!(summary.total_bytes(), 2097152 + 524288 + 1048576);
        assert!(summary.allocations.iter().all(|a| a.offset.is_none()));

        assert_eq!(summary.kernels.len(), 1);
        let kernel = &summary.kernels[0];
        assert_eq!(kernel.name, "matmul_op_kernel");
        assert_eq!(kernel.grid, (8, 32));
        assert_eq!(kernel.shared_mem_bytes, 8192);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(3670016), "3.50 MB");
        assert_eq!(format_bytes(1 << 40), "1024.00 GB");
    }

    #[test]
    fn test_display_mentions_footprint() {
        let graph = Sample::Loop.build().unwrap();
        let text = summarize(&graph).to_string();
        assert!(text.contains("Kernels: 0"));
        assert!(text.ends_with("Memory footprint: 8.00 KB"));
    }
}
