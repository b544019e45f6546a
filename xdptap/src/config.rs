use aya::programs::XdpFlags;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use xdptap_common::RING_BUF_BYTES;

pub const DEFAULT_INTERFACE: &str = "eth0";

/// Page size assumed when `sysconf` cannot report one.
const FALLBACK_PAGE_SIZE: u32 = 4096;

/// The host's page size. Ring buffer maps must be a whole number of pages.
pub fn page_size() -> u32 {
    match nix::unistd::sysconf(nix::unistd::SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) if size > 0 => u32::try_from(size).unwrap_or(FALLBACK_PAGE_SIZE),
        Ok(_) => FALLBACK_PAGE_SIZE,
        Err(e) => {
            tracing::debug!("sysconf(PAGE_SIZE) failed: {}", e);
            FALLBACK_PAGE_SIZE
        }
    }
}

/// How the XDP program is attached to the interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum XdpMode {
    /// Let the kernel pick (driver mode when supported, generic otherwise).
    #[default]
    Default,
    /// Generic XDP in the network stack.
    Skb,
    /// Native driver XDP.
    Driver,
    /// Offloaded to the NIC.
    Hardware,
}

impl XdpMode {
    pub fn flags(self) -> XdpFlags {
        match self {
            XdpMode::Default => XdpFlags::default(),
            XdpMode::Skb => XdpFlags::SKB_MODE,
            XdpMode::Driver => XdpFlags::DRV_MODE,
            XdpMode::Hardware => XdpFlags::HW_MODE,
        }
    }
}

/// Agent configuration, loadable from CLI or YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Network interface to attach the XDP program to.
    #[serde(default)]
    pub interface: Option<String>,

    #[serde(default)]
    pub xdp_mode: XdpMode,

    /// Ring buffer capacity in bytes.
    #[serde(default = "default_ring_buf_bytes")]
    pub ring_buf_bytes: u32,

    /// File that drained records are appended to (raw, fixed-size).
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Quiet mode (suppress non-error logs).
    #[serde(default)]
    pub quiet: bool,

    /// Sleep between ring buffer polls when it is empty, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Compiled XDP object to load.
    #[serde(default = "default_object")]
    pub object: PathBuf,
}

fn default_ring_buf_bytes() -> u32 {
    RING_BUF_BYTES
}

fn default_poll_interval_ms() -> u64 {
    1
}

/// Where `cargo xtask build-ebpf` leaves the object for this build profile.
fn default_object() -> PathBuf {
    let profile = if cfg!(debug_assertions) { "debug" } else { "release" };
    PathBuf::from(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../xdptap-ebpf/target/bpfel-unknown-none"
    ))
    .join(profile)
    .join("xdptap")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: None,
            xdp_mode: XdpMode::default(),
            ring_buf_bytes: default_ring_buf_bytes(),
            output: None,
            quiet: false,
            poll_interval_ms: default_poll_interval_ms(),
            object: default_object(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Builds the effective configuration for `attach`: file (if any), then
    /// CLI overrides, then validation.
    pub fn load(args: &AttachArgs) -> anyhow::Result<Self> {
        let mut config = match args.config {
            Some(ref path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.merge_cli(args);
        config.validate()?;
        Ok(config)
    }

    /// Merge CLI args into config (CLI takes precedence).
    pub fn merge_cli(&mut self, cli: &AttachArgs) {
        if cli.interface.is_some() {
            self.interface = cli.interface.clone();
        }
        if let Some(mode) = cli.mode {
            self.xdp_mode = mode;
        }
        if let Some(bytes) = cli.ring_buf_bytes {
            self.ring_buf_bytes = bytes;
        }
        if cli.output.is_some() {
            self.output = cli.output.clone();
        }
        if cli.quiet {
            self.quiet = true;
        }
        if let Some(ms) = cli.poll_interval_ms {
            self.poll_interval_ms = ms;
        }
        if let Some(ref object) = cli.object {
            self.object = object.clone();
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_for_page(page_size())
    }

    /// Checks `ring_buf_bytes` against a page size of `page` bytes.
    pub fn validate_for_page(&self, page: u32) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.ring_buf_bytes.is_power_of_two(),
            "ring_buf_bytes must be a power of two, got {}",
            self.ring_buf_bytes
        );
        anyhow::ensure!(
            self.ring_buf_bytes >= page && self.ring_buf_bytes % page == 0,
            "ring_buf_bytes must be a multiple of the {}-byte page size, got {}",
            page,
            self.ring_buf_bytes
        );
        Ok(())
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or(DEFAULT_INTERFACE)
    }
}

use clap::{Args, Parser, Subcommand};

/// xdptap: copy IPv4 frames from an interface's receive path into a ring buffer
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load the XDP program, attach it and drain captured frames until Ctrl-C.
    Attach(AttachArgs),
    /// List network interfaces.
    Interfaces,
    /// Report whether an XDP program is attached to an interface.
    Status {
        /// Interface to inspect (e.g., eth0).
        #[arg(short, long)]
        interface: String,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct AttachArgs {
    /// Network interface to attach the XDP program to (e.g., eth0).
    #[arg(short, long)]
    pub interface: Option<String>,

    /// XDP attach mode.
    #[arg(short, long, value_enum)]
    pub mode: Option<XdpMode>,

    /// Ring buffer capacity in bytes (power of two).
    #[arg(long)]
    pub ring_buf_bytes: Option<u32>,

    /// Append drained records to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Path to YAML config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Quiet mode (suppress non-error logs).
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Idle sleep between ring buffer polls, in milliseconds.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Compiled XDP object (defaults to the xtask build output).
    #[arg(long)]
    pub object: Option<PathBuf>,
}
