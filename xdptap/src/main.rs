use anyhow::Context as _;
use clap::Parser;
use tokio::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aya::maps::RingBuf;
use aya::programs::Xdp;
use aya::EbpfLoader;

use xdptap_common::{PROGRAM_NAME, RING_BUF_MAP};

mod config;
mod drain;
mod iface;
mod sink;

use config::{CliArgs, Command, Config};
use sink::Sinks;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();

    match cli.command {
        Command::Attach(args) => {
            let config = Config::load(&args)?;
            init_tracing(config.quiet);
            attach(config).await
        }
        Command::Interfaces => {
            init_tracing(false);
            iface::print_interfaces()
        }
        Command::Status { interface } => {
            init_tracing(false);
            iface::print_status(&interface)
        }
    }
}

fn init_tracing(quiet: bool) {
    let filter = if quiet {
        tracing_subscriber::EnvFilter::new("error")
    } else {
        tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        )
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn attach(config: Config) -> anyhow::Result<()> {
    // ── eBPF setup ────────────────────────────────────────────────────
    let mut bpf = EbpfLoader::new()
        .set_max_entries(RING_BUF_MAP, config.ring_buf_bytes)
        .load_file(&config.object)
        .with_context(|| format!("failed to load XDP object {}", config.object.display()))?;

    let iface = config.interface();
    let program: &mut Xdp = bpf
        .program_mut(PROGRAM_NAME)
        .with_context(|| format!("program {PROGRAM_NAME} not found in XDP object"))?
        .try_into()?;
    program.load()?;
    program
        .attach(iface, config.xdp_mode.flags())
        .with_context(|| format!("failed to attach XDP program to {iface}"))?;
    tracing::info!(
        "XDP program attached to {} ({:?} mode, {} byte ring buffer)",
        iface,
        config.xdp_mode,
        config.ring_buf_bytes
    );

    // ── Sinks ─────────────────────────────────────────────────────────
    let sinks = Sinks::from_config(&config)?;

    // ── RingBuf drain ─────────────────────────────────────────────────
    let frames_map = bpf
        .take_map(RING_BUF_MAP)
        .with_context(|| format!("map {RING_BUF_MAP} not found in XDP object"))?;
    let ring_buf = RingBuf::try_from(frames_map)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };
    drain::run(
        ring_buf,
        sinks,
        Duration::from_millis(config.poll_interval_ms),
        shutdown,
    )
    .await?;

    tracing::info!("Detaching XDP program from {}", iface);
    Ok(())
}
