use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use rdt_abstract::{FaultConfig, SimConfig};
use rdt_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stop-and-wait ARQ simulator")]
struct Args {
    /// Load a scenario from disk.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    /// Bytes to stream in the default simulation.
    #[arg(long, default_value_t = 2500)]
    len: usize,

    /// Apply the classic lossy profile in both directions.
    #[arg(long, default_value_t = false)]
    reference_faults: bool,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long)]
    max_retries: Option<u32>,

    #[arg(long)]
    linger_ms: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("rdt-sim starting…");

    let report = match &args.scenario {
        Some(path) => scenario_runner::run_scenario(path)?,
        None => run_default_sim(&args)?,
    };

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
        info!("trace written to {}", trace_path.display());
    }
    Ok(())
}

fn run_default_sim(args: &Args) -> Result<SimulationReport> {
    let mut config = SimConfig {
        seed: args.seed,
        ..Default::default()
    };
    if args.reference_faults {
        config.data_faults = FaultConfig::reference();
        config.ack_faults = FaultConfig::reference_acks();
    }
    if let Some(v) = args.max_retries {
        config.arq.max_retries = v;
    }
    if let Some(v) = args.linger_ms {
        config.arq.linger_ms = v;
    }

    let source: Vec<u8> = (0..args.len).map(|i| (i % 251) as u8).collect();
    info!("Starting default simulation…");
    let report = Simulator::new(config)
        .run_blocking(&source)
        .context("Failed to start the simulation runtime")?;

    match &report.failure {
        None if report.intact => info!(
            "Simulation complete: {} bytes delivered in {}ms of virtual time",
            report.delivered_len, report.duration_ms
        ),
        None => warn!("Simulation complete but the delivered bytes differ from the source"),
        Some(reason) => warn!("Simulation failed: {}", reason),
    }
    Ok(report)
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
