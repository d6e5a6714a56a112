//! HyperKV unified CLI.
//!
//! A Redis-compatible in-memory key-value store.
//!
//! # Quick Start
//!
//! ```bash
//! # Start the server
//! hyperkv start --data-dir ./data --port 6379
//!
//! # Check that it's alive from another terminal
//! hyperkv info --host 127.0.0.1 --port 6379
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

/// HyperKV - a Redis-compatible in-memory key-value store.
#[derive(Parser)]
#[command(name = "hyperkv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Start the HyperKV server.
    Start(StartArgs),

    /// Query a running server's INFO output.
    Info {
        /// Server host.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port.
        #[arg(short, long, default_value_t = 6379)]
        port: u16,

        /// INFO section to request (server, keyspace, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}

#[derive(Args)]
pub(crate) struct StartArgs {
    /// Directory to load config files from (`hyperkv.toml`, `hyperkv.local.toml`).
    #[arg(long, value_name = "DIR")]
    pub(crate) config_dir: Option<PathBuf>,

    /// Host to bind to.
    #[arg(long)]
    pub(crate) host: Option<String>,

    /// Port to bind to.
    #[arg(short, long)]
    pub(crate) port: Option<u16>,

    /// Directory for the append log and snapshots.
    #[arg(long, value_name = "DIR")]
    pub(crate) data_dir: Option<PathBuf>,

    /// Maximum memory budget (raw bytes, or a `1GB`/`512MB`/`64KB` suffix). `0` disables eviction.
    #[arg(long, value_name = "SIZE")]
    pub(crate) max_memory: Option<String>,

    /// Maximum simultaneous client connections.
    #[arg(long)]
    pub(crate) max_connections: Option<u32>,

    /// Eviction policy: lru, lfu, arc, random, volatile-lru, volatile-lfu.
    #[arg(long, value_name = "POLICY")]
    pub(crate) eviction_policy: Option<String>,

    /// Storage backend (currently only `memory`).
    #[arg(long)]
    pub(crate) backend: Option<String>,

    /// Enable the append-only log.
    #[arg(long, value_name = "BOOL")]
    pub(crate) aof: Option<bool>,

    /// Fsync policy for the append log: always, everysec, no.
    #[arg(long, value_name = "POLICY")]
    pub(crate) aof_fsync_policy: Option<String>,

    /// Enable periodic/startup/shutdown snapshots.
    #[arg(long, value_name = "BOOL")]
    pub(crate) snapshot: Option<bool>,

    /// Required auth password. Unset means no authentication is required.
    #[arg(long, value_name = "PASSWORD")]
    pub(crate) auth_password: Option<String>,

    /// Enable TLS.
    #[arg(long, value_name = "BOOL")]
    pub(crate) tls: Option<bool>,

    /// TLS certificate chain file (PEM).
    #[arg(long, value_name = "FILE")]
    pub(crate) tls_cert: Option<PathBuf>,

    /// TLS private key file (PEM).
    #[arg(long, value_name = "FILE")]
    pub(crate) tls_key: Option<PathBuf>,

    /// Number of shards for key-hash routing (single-loop semantics at 1, the default).
    #[arg(long)]
    pub(crate) shards: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub(crate) log_level: Option<String>,

    /// Write logs to this file instead of stderr.
    #[arg(long, value_name = "FILE")]
    pub(crate) log_file: Option<PathBuf>,

    /// Accepted for compatibility; daemonization is not supported on this platform.
    #[arg(long)]
    pub(crate) daemon: bool,

    /// Write the process id to this file on startup.
    #[arg(long, value_name = "FILE")]
    pub(crate) pid_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Start(args) => commands::start::run(args),
        Commands::Info { host, port, section } => commands::info::run(&host, port, section.as_deref()),
    }
}
