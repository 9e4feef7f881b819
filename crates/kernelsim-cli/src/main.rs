//! kernelsim CLI - run sample programs through the pass pipeline, export and
//! inspect traces.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kernelsim_cli::{Sample, inspect, simulate};
use kernelsim_compiler::{DEFAULT_UNROLL_FACTOR, PassKind, PipelineConfig};
use std::path::PathBuf;

/// Trace destination used when `--debug` is given without `--trace`.
const DEFAULT_TRACE_PATH: &str = "trace.json";

#[derive(Parser)]
#[command(name = "kernelsim")]
#[command(about = "Simulated compiler backend for tensor kernel programs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sample program through the pass pipeline
    Run {
        /// Program to compile
        #[arg(value_enum, value_name = "PROGRAM")]
        program: Sample,

        /// Print the program before and after each pass
        #[arg(long)]
        emit_ir: bool,

        /// Enable debug logging and write the trace file
        #[arg(long)]
        debug: bool,

        /// Print an illustrative device summary for the final program
        #[arg(long)]
        simulate_gpu: bool,

        /// Trace output file (written when given, or with --debug)
        #[arg(long, value_name = "FILE")]
        trace: Option<PathBuf>,

        /// Passes to run, in order
        #[arg(long, value_enum, value_delimiter = ',', default_values_t = PassKind::ALL)]
        passes: Vec<PassKind>,

        /// Iterations emitted per outer step by loop unrolling
        #[arg(long, default_value_t = DEFAULT_UNROLL_FACTOR)]
        unroll_factor: usize,

        /// Reject tensors with an unrecognized dtype
        #[arg(long)]
        strict_dtypes: bool,

        /// Write the final program as Graphviz DOT
        #[arg(long, value_name = "FILE")]
        dot: Option<PathBuf>,
    },
    /// Summarize a previously exported trace file
    InspectTrace {
        /// Path to the trace file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

struct RunOptions {
    program: Sample,
    config: PipelineConfig,
    debug: bool,
    simulate_gpu: bool,
    trace: Option<PathBuf>,
    dot: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let debug = matches!(cli.command, Commands::Run { debug: true, .. });
    let _ = tracing_subscriber::fmt()
        .with_max_level(if debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .try_init();

    match cli.command {
        Commands::Run {
            program,
            emit_ir,
            debug,
            simulate_gpu,
            trace,
            passes,
            unroll_factor,
            strict_dtypes,
            dot,
        } => {
            cmd_run(RunOptions {
                program,
                config: PipelineConfig {
                    passes,
                    unroll_factor,
                    emit_ir,
                    strict_dtypes,
                },
                debug,
                simulate_gpu,
                trace,
                dot,
            })?;
        }
        Commands::InspectTrace { file } => {
            cmd_inspect_trace(file)?;
        }
    }

    Ok(())
}

/// Build a sample program, run the pipeline, and report.
fn cmd_run(options: RunOptions) -> Result<()> {
    println!("kernelsim v{}", env!("CARGO_PKG_VERSION"));
    println!("Processing: {:?}\n", options.program);

    let mut graph = options
        .program
        .build()
        .with_context(|| format!("Failed to build sample program {:?}", options.program))?;

    let mut manager = options
        .config
        .build()
        .with_context(|| "Failed to configure pass pipeline")?;

    let result = manager.run(&mut graph);

    if options.config.emit_ir {
        for snapshot in manager.recorder().snapshots() {
            println!("=== {} ===", snapshot.stage);
            print!("{}", snapshot.text);
            println!();
        }
    }

    // The trace is written even when a pass failed, so the failure can be inspected.
    let trace_path = match options.trace {
        Some(path) => Some(path),
        None if options.debug => Some(PathBuf::from(DEFAULT_TRACE_PATH)),
        None => None,
    };
    if let Some(path) = trace_path {
        manager
            .recorder()
            .export_trace(&path)
            .with_context(|| format!("Failed to write trace to {}", path.display()))?;
        println!("Debug trace written to: {}", path.display());
    }

    result.with_context(|| "Pass pipeline failed")?;

    print!("{}", inspect::render_recorder(manager.recorder()));

    if let Some(path) = options.dot {
        let dot = kernelsim_core::dot::to_dot(&graph);
        std::fs::write(&path, dot)
            .with_context(|| format!("Failed to write DOT output to {}", path.display()))?;
        eprintln!("Wrote DOT output to {}", path.display());
    }

    if options.simulate_gpu {
        println!();
        println!("{}", simulate::summarize(&graph));
    }

    Ok(())
}

/// Print the summary of an exported trace.
fn cmd_inspect_trace(path: PathBuf) -> Result<()> {
    let summary = inspect::inspect_trace(&path)?;
    print!("{}", summary);
    Ok(())
}
