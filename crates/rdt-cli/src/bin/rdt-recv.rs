use anyhow::{Context, Result};
use clap::Parser;
use rdt_cli::{Direction, FaultArgs, init_logging, load_config};
use rdt_core::{Receiver, UdpTransport};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::BufWriter;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Receive a file over UDP with stop-and-wait ARQ")]
struct Args {
    /// UDP port to listen on.
    port: u16,

    /// Where to write the received bytes.
    destination: PathBuf,

    /// TOML file with protocol settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every packet and acknowledgment.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(flatten)]
    faults: FaultArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(args.config.as_deref())?;
    let injector = args.faults.injector(Direction::Acks)?;

    let file = File::create(&args.destination)
        .await
        .with_context(|| format!("failed to create {}", args.destination.display()))?;
    let link = UdpTransport::bind(args.port)
        .await
        .with_context(|| format!("failed to bind UDP port {}", args.port))?;
    info!(
        "listening on {}, writing to {}",
        link.local_addr()?,
        args.destination.display()
    );

    let mut receiver = Receiver::with_injector(link, injector, config);
    let stats = receiver
        .receive_loop(BufWriter::new(file))
        .await
        .context("receive failed")?;

    info!(
        "done: {} bytes in {} chunks ({} duplicates, {} corrupted, {} acks sent)",
        stats.bytes, stats.chunks, stats.duplicates, stats.corrupted, stats.acks_sent
    );
    Ok(())
}
