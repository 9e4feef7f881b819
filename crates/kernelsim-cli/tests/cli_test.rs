//! Integration tests for the CLI library: samples through the pipeline,
//! trace export, and inspection.

use anyhow::Result;
use kernelsim_cli::{Sample, inspect, simulate};
use kernelsim_compiler::{OpKind, PassKind, PipelineConfig, compile};

#[test]
fn test_matmul_sample_through_default_pipeline() -> Result<()> {
    let mut graph = Sample::Matmul.build()?;
    let recorder = compile(&mut graph, &PipelineConfig::default())?;

    let summary = inspect::render_recorder(&recorder);
    assert!(summary.contains("Passes (3):"));
    assert!(summary.contains("Mapped tensor C to offset 2621440 (size: 1048576 bytes)"));
    assert!(summary.contains("Total memory allocated: 3670016 bytes"));

    let device = simulate::summarize(&graph);
    assert_eq!(device.total_bytes(), 3670016);
    assert_eq!(device.allocations[1].offset, Some(2097152));
    Ok(())
}

#[test]
fn test_linear_sample_is_fused() -> Result<()> {
    let mut graph = Sample::Linear.build()?;
    let before = graph.len();
    let recorder = compile(&mut graph, &PipelineConfig::default())?;

    assert_eq!(graph.len(), before - 1);
    assert!(graph.find_node_by_name("matmul_op_fused_add").is_some());
    assert_eq!(
        recorder.passes()[1].transformations,
        vec!["Fused matmul_op and bias_add into matmul_op_fused_add"]
    );
    Ok(())
}

#[test]
fn test_loop_sample_unrolled() -> Result<()> {
    let mut graph = Sample::Loop.build()?;
    let config = PipelineConfig {
        passes: vec![PassKind::LoopUnroll],
        unroll_factor: 3,
        ..Default::default()
    };
    compile(&mut graph, &config)?;

    let blocks = graph
        .nodes()
        .filter(|(_, n)| n.kind() == OpKind::Block)
        .count();
    assert_eq!(blocks, 10);
    Ok(())
}

#[test]
fn test_inspect_exported_trace() -> Result<()> {
    let mut graph = Sample::Linear.build()?;
    let recorder = compile(&mut graph, &PipelineConfig::default())?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("trace.json");
    recorder.export_trace(&path)?;

    let from_file = inspect::inspect_trace(&path)?;
    assert!(from_file.contains("Memory map (4):"));
    assert!(from_file.contains("bias: tensor<f32> [256]"));
    assert!(from_file.contains("3. MemoryMapPass"));
    Ok(())
}

#[test]
fn test_inspect_missing_trace_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.json");
    let err = inspect::inspect_trace(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("nope.json"));
}
