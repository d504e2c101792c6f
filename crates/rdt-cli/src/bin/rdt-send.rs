use anyhow::{Context, Result};
use clap::Parser;
use rdt_cli::{Direction, FaultArgs, init_logging, load_config};
use rdt_core::{Sender, UdpTransport};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Send a file over UDP with stop-and-wait ARQ")]
struct Args {
    /// Receiver host name or address.
    host: String,

    /// Receiver UDP port.
    port: u16,

    /// File to send.
    source: PathBuf,

    /// TOML file with protocol settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every transmission and acknowledgment.
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
    let injector = args.faults.injector(Direction::Data)?;

    let file = File::open(&args.source)
        .await
        .with_context(|| format!("failed to open {}", args.source.display()))?;
    let link = UdpTransport::connect(&args.host, args.port)
        .await
        .with_context(|| format!("failed to set up a socket for {}:{}", args.host, args.port))?;
    info!(
        "sending {} to {}:{}",
        args.source.display(),
        args.host,
        args.port
    );

    let mut sender = Sender::with_injector(link, injector, config);
    let stats = sender
        .send_stream(BufReader::new(file))
        .await
        .inspect_err(|e| {
            if e.is_transfer_failed() {
                error!("receiver stopped answering, giving up");
            }
        })
        .with_context(|| format!("failed to send {}", args.source.display()))?;

    info!(
        "done: {} bytes in {} chunks, {} transmissions ({} timeouts, {} bad acks)",
        stats.bytes, stats.chunks, stats.transmissions, stats.timeouts, stats.bad_acks
    );
    Ok(())
}
