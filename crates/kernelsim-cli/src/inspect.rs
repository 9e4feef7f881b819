//! Trace inspection utilities.

use anyhow::{Context, Result};
use kernelsim_core::{TraceDocument, TraceRecorder};
use std::fmt::Write;
use std::path::Path;

/// Read an exported trace file and render its summary.
pub fn inspect_trace(path: &Path) -> Result<String> {
    let document = TraceDocument::read(path)
        .with_context(|| format!("Failed to read trace from {}", path.display()))?;
    Ok(render_document(&document))
}

/// Summary of an in-memory recorder, in the same layout as an exported file.
pub fn render_recorder(recorder: &TraceRecorder) -> String {
    render_document(&recorder.to_document())
}

/// Render pass names, transformation counts, the memory map, and symbols.
pub fn render_document(document: &TraceDocument) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "Passes ({}):", document.passes.len());
    for (i, pass) in document.passes.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {} ({:.3} ms, {} transformations)",
            i + 1,
            pass.name,
            pass.execution_time_ms,
            pass.transformations.len()
        );
        for line in &pass.transformations {
            let _ = writeln!(out, "     - {}", line);
        }
    }

    let mut regions: Vec<_> = document.memory_map.iter().collect();
    regions.sort_by(|a, b| (a.1.offset, a.0).cmp(&(b.1.offset, b.0)));
    let _ = writeln!(out, "Memory map ({}):", regions.len());
    for (name, region) in regions {
        let _ = writeln!(
            out,
            "  {:<16} offset {:>12}  size {:>12}",
            name, region.offset, region.size
        );
    }

    let _ = writeln!(out, "Symbols ({}):", document.symbols.len());
    for (name, symbol) in &document.symbols {
        let _ = writeln!(
            out,
            "  {}: {} {:?} @ {}",
            name, symbol.ty, symbol.shape, symbol.memory_offset
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernelsim_core::{MemoryRegion, PassRecord};
    use std::collections::BTreeMap;

    #[test]
    fn test_memory_map_sorted_by_offset() {
        let document = TraceDocument {
            symbols: BTreeMap::new(),
            passes: vec![PassRecord {
                name: "MemoryMapPass".to_string(),
                execution_time_ms: 0.25,
                transformations: vec!["Total memory allocated: 8 bytes".to_string()],
                ir_after: String::new(),
            }],
            memory_map: BTreeMap::from([
                ("late".to_string(), MemoryRegion { offset: 256, size: 4 }),
                ("early".to_string(), MemoryRegion { offset: 0, size: 4 }),
            ]),
        };

        let text = render_document(&document);
        assert!(text.contains("1. MemoryMapPass (0.250 ms, 1 transformations)"));
        let early = text.find("early").unwrap();
        let late = text.find("late").unwrap();
        assert!(early < late);
    }
}
