//! Instrumentation store for pipeline runs.
//!
//! `TraceRecorder` holds three independent tables:
//! - a symbol table (name -> `SymbolInfo`, last write wins)
//! - the ordered list of `PassTrace` entries, one per executed pass
//! - a memory map (tensor name -> `MemoryRegion`, last write wins)
//!
//! Pass tracing is a two-state protocol. The recorder is either `Idle` or has
//! exactly one pass open. `begin_pass` opens an entry and starts its timer,
//! `record_transformation` appends to the open entry, and `end_pass` stamps
//! the elapsed time and moves the entry into the finished list. Misuse
//! (recording or ending while idle) is logged and otherwise ignored.
//!
//! The whole store can be exported to a JSON document and read back; timing
//! fields are measured values and are not expected to round-trip exactly.

use crate::ir::SourceLocation;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::{Duration, Instant};

// ──────────────────────────────── Records ────────────────────────────────

/// Debug information registered for a named value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Declared type, e.g. `tensor<f32>`.
    #[serde(rename = "type")]
    pub ty: String,

    /// Resolved memory offset in bytes.
    pub memory_offset: u64,

    /// Shape (tensors) or width (scalars).
    pub shape: Vec<i64>,

    /// Where the value was declared.
    pub location: SourceLocation,
}

/// A placed byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub offset: u64,
    pub size: u64,
}

impl MemoryRegion {
    /// One past the last byte of the region.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    /// Whether two regions share at least one byte. Empty regions never
    /// overlap anything.
    pub fn overlaps(&self, other: &MemoryRegion) -> bool {
        self.size > 0 && other.size > 0 && self.offset < other.end() && other.offset < self.end()
    }
}

/// What one pass did during a run.
#[derive(Debug, Clone, Default)]
pub struct PassTrace {
    /// Pass name.
    pub name: String,

    /// Full textual dump of the program after the pass.
    pub ir_after: String,

    /// Human-readable transformation descriptions, in order.
    pub transformations: Vec<String>,

    /// Wall-clock time spent between `begin_pass` and `end_pass`.
    pub elapsed: Duration,
}

impl PassTrace {
    fn open(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Elapsed time in milliseconds.
    pub fn execution_time_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// A textual program snapshot taken at a named stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrSnapshot {
    pub stage: String,
    pub text: String,
}

// ─────────────────────────────── PassState ───────────────────────────────

/// The open entry and the instant its timer started.
#[derive(Debug)]
struct OpenPass {
    trace: PassTrace,
    started: Instant,
}

#[derive(Debug, Default)]
enum PassState {
    #[default]
    Idle,
    PassOpen(OpenPass),
}

// ───────────────────────────── TraceRecorder ─────────────────────────────

/// Instrumentation store shared by all passes of one pipeline run.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    symbols: HashMap<String, SymbolInfo>,
    passes: Vec<PassTrace>,
    state: PassState,
    memory_map: HashMap<String, MemoryRegion>,
    snapshots: Vec<IrSnapshot>,
}

impl TraceRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Symbols ──

    /// Register a symbol, replacing any previous entry with the same name.
    pub fn add_symbol(&mut self, name: impl Into<String>, info: SymbolInfo) {
        self.symbols.insert(name.into(), info);
    }

    /// Look up a symbol by exact name.
    pub fn lookup_symbol(&self, name: &str) -> Option<&SymbolInfo> {
        self.symbols.get(name)
    }

    /// All registered symbols.
    pub fn symbols(&self) -> &HashMap<String, SymbolInfo> {
        &self.symbols
    }

    // ── Pass tracing ──

    /// Open a trace entry for `name` and start its timer.
    ///
    /// If another entry is still open it is closed first with an empty
    /// after-text, so the single-open-entry invariant holds.
    pub fn begin_pass(&mut self, name: &str) {
        if let PassState::PassOpen(open) = &self.state {
            tracing::warn!(
                open = %open.trace.name,
                next = name,
                "begin_pass while another pass is open; closing it"
            );
            self.end_pass(String::new());
        }

        self.state = PassState::PassOpen(OpenPass {
            trace: PassTrace::open(name),
            started: Instant::now(),
        });
    }

    /// Append a transformation description to the open entry.
    ///
    /// Does nothing (beyond a warning) when no pass is open.
    pub fn record_transformation(&mut self, description: impl Into<String>) {
        let description: String = description.into();
        match &mut self.state {
            PassState::PassOpen(open) => {
                tracing::debug!(pass = %open.trace.name, "{}", description);
                open.trace.transformations.push(description);
            }
            PassState::Idle => {
                tracing::warn!(
                    description = %description,
                    "transformation recorded with no open pass; ignoring"
                );
            }
        }
    }

    /// Close the open entry, stamping elapsed time and the after-text.
    ///
    /// Returns `false` (and records nothing) when no pass is open.
    pub fn end_pass(&mut self, ir_after: impl Into<String>) -> bool {
        match std::mem::take(&mut self.state) {
            PassState::PassOpen(OpenPass { mut trace, started }) => {
                trace.elapsed = started.elapsed();
                trace.ir_after = ir_after.into();
                self.passes.push(trace);
                true
            }
            PassState::Idle => {
                tracing::warn!("end_pass with no open pass; ignoring");
                false
            }
        }
    }

    /// Whether a pass entry is currently open.
    pub fn is_pass_open(&self) -> bool {
        matches!(self.state, PassState::PassOpen(_))
    }

    /// Name of the open pass, if any.
    pub fn open_pass_name(&self) -> Option<&str> {
        match &self.state {
            PassState::PassOpen(open) => Some(&open.trace.name),
            PassState::Idle => None,
        }
    }

    /// Finished pass entries in execution order.
    pub fn passes(&self) -> &[PassTrace] {
        &self.passes
    }

    // ── Memory map ──

    /// Record where a tensor was placed, replacing any previous placement.
    pub fn record_memory_mapping(&mut self, tensor: impl Into<String>, offset: u64, size: u64) {
        self.memory_map
            .insert(tensor.into(), MemoryRegion { offset, size });
    }

    /// Placement of a tensor, if recorded.
    pub fn memory_region(&self, tensor: &str) -> Option<MemoryRegion> {
        self.memory_map.get(tensor).copied()
    }

    /// All recorded placements.
    pub fn memory_map(&self) -> &HashMap<String, MemoryRegion> {
        &self.memory_map
    }

    // ── Snapshots ──

    /// Keep a textual program snapshot for a named stage.
    pub fn record_snapshot(&mut self, stage: impl Into<String>, text: impl Into<String>) {
        self.snapshots.push(IrSnapshot {
            stage: stage.into(),
            text: text.into(),
        });
    }

    /// Snapshots in the order they were taken.
    pub fn snapshots(&self) -> &[IrSnapshot] {
        &self.snapshots
    }

    // ── Export ──

    /// Build the structured export document.
    ///
    /// An entry still open is not part of the document.
    pub fn to_document(&self) -> TraceDocument {
        TraceDocument {
            symbols: self
                .symbols
                .iter()
                .map(|(name, info)| (name.clone(), info.clone()))
                .collect(),
            passes: self.passes.iter().map(PassRecord::from).collect(),
            memory_map: self
                .memory_map
                .iter()
                .map(|(name, region)| (name.clone(), *region))
                .collect(),
        }
    }

    /// Rebuild a recorder from an export document. The result is idle.
    pub fn from_document(document: TraceDocument) -> Self {
        Self {
            symbols: document.symbols.into_iter().collect(),
            passes: document.passes.into_iter().map(PassTrace::from).collect(),
            state: PassState::Idle,
            memory_map: document.memory_map.into_iter().collect(),
            snapshots: Vec::new(),
        }
    }

    /// Serialize the export document as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Write the trace to `path` as `{"trace": <document>}`.
    pub fn export_trace(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = TraceFile {
            trace: self.to_document(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path.as_ref(), json)?;
        tracing::debug!(path = %path.as_ref().display(), "trace exported");
        Ok(())
    }

    /// Read a trace previously written by [`TraceRecorder::export_trace`].
    pub fn read_trace(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_document(TraceDocument::read(path)?))
    }
}

// ───────────────────────────── TraceDocument ─────────────────────────────

/// Exported form of one pass entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassRecord {
    pub name: String,
    pub execution_time_ms: f64,
    pub transformations: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ir_after: String,
}

impl From<&PassTrace> for PassRecord {
    fn from(trace: &PassTrace) -> Self {
        Self {
            name: trace.name.clone(),
            execution_time_ms: trace.execution_time_ms(),
            transformations: trace.transformations.clone(),
            ir_after: trace.ir_after.clone(),
        }
    }
}

impl From<PassRecord> for PassTrace {
    fn from(record: PassRecord) -> Self {
        let millis = if record.execution_time_ms.is_finite() {
            record.execution_time_ms.max(0.0)
        } else {
            0.0
        };
        Self {
            name: record.name,
            ir_after: record.ir_after,
            transformations: record.transformations,
            elapsed: Duration::from_secs_f64(millis / 1000.0),
        }
    }
}

/// Structured export of a recorder: symbols, ordered passes, memory map.
///
/// Maps are ordered by name so the serialized form is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceDocument {
    pub symbols: BTreeMap<String, SymbolInfo>,
    pub passes: Vec<PassRecord>,
    pub memory_map: BTreeMap<String, MemoryRegion>,
}

/// On-disk wrapper around the document.
#[derive(Serialize, Deserialize)]
struct TraceFile {
    trace: TraceDocument,
}

impl TraceDocument {
    /// Parse a bare document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a trace file written by [`TraceRecorder::export_trace`].
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read trace {}: {}", path.display(), e),
            ))
        })?;
        let file: TraceFile = serde_json::from_str(&json)?;
        Ok(file.trace)
    }

    /// Pass names in execution order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name.as_str()).collect()
    }

    /// Copy of the document with all timing fields zeroed, for comparisons.
    pub fn without_timing(&self) -> Self {
        let mut copy = self.clone();
        for pass in &mut copy.passes {
            pass.execution_time_ms = 0.0;
        }
        copy
    }
}
