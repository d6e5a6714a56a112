//! Start command - runs the HyperKV server.

use std::fs;

use anyhow::{bail, Context, Result};
use hyperkv_config::ConfigLoader;
use hyperkv_server::{bootstrap, Server};
use tracing::info;

use crate::StartArgs;

pub fn run(args: StartArgs) -> Result<()> {
    if args.daemon {
        bail!(
            "--daemon is not supported: double-fork daemonization is not safe alongside this \
             process's event loop. Background the process at the shell instead, e.g. `hyperkv start ... &`"
        );
    }

    let mut loader = ConfigLoader::new();
    if let Some(dir) = &args.config_dir {
        loader = loader.with_project_dir(dir);
    }

    if let Some(v) = &args.host {
        loader = loader.with_override("server.host", v);
    }
    if let Some(v) = args.port {
        loader = loader.with_override("server.port", v.to_string());
    }
    if let Some(v) = args.max_connections {
        loader = loader.with_override("server.max_connections", v.to_string());
    }
    if let Some(v) = &args.data_dir {
        loader = loader.with_override("storage.data_dir", v.to_string_lossy().to_string());
    }
    if let Some(v) = &args.max_memory {
        loader = loader.with_override("storage.max_memory", v);
    }
    if let Some(v) = &args.backend {
        loader = loader.with_override("storage.backend", v);
    }
    if let Some(v) = &args.eviction_policy {
        loader = loader.with_override("eviction.policy", v);
    }
    if let Some(v) = args.aof {
        loader = loader.with_override("aof.enabled", v.to_string());
    }
    if let Some(v) = &args.aof_fsync_policy {
        loader = loader.with_override("aof.fsync_policy", v);
    }
    if let Some(v) = args.snapshot {
        loader = loader.with_override("snapshot.enabled", v.to_string());
    }
    if let Some(v) = &args.auth_password {
        loader = loader.with_override("auth.password", v);
    }
    if let Some(v) = args.tls {
        loader = loader.with_override("tls.enabled", v.to_string());
    }
    if let Some(v) = &args.tls_cert {
        loader = loader.with_override("tls.cert_file", v.to_string_lossy().to_string());
    }
    if let Some(v) = &args.tls_key {
        loader = loader.with_override("tls.key_file", v.to_string_lossy().to_string());
    }
    if let Some(v) = &args.log_level {
        loader = loader.with_override("logging.level", v);
    }
    if let Some(v) = &args.log_file {
        loader = loader.with_override("logging.file", v.to_string_lossy().to_string());
    }

    let config = loader.load().context("failed to load configuration")?;

    init_logging(&config.logging)?;

    if let Some(pid_path) = &args.pid_file {
        fs::write(pid_path, std::process::id().to_string()).with_context(|| format!("failed to write pid file '{}'", pid_path.display()))?;
    }

    let shards = args.shards.unwrap_or(1).max(1);
    info!(data_dir = %config.storage.data_dir.display(), "starting hyperkv server");

    let bootstrapped = bootstrap::bootstrap(&config, shards).context("failed to bootstrap server")?;
    let addr = bootstrapped.addr;
    let mut server = Server::bind(
        bootstrapped.addr,
        bootstrapped.dispatcher,
        bootstrapped.clients,
        bootstrapped.snapshot_store,
        bootstrapped.options,
        bootstrapped.tls_config,
    )
    .context("failed to bind server")?;

    info!(%addr, "hyperkv listening");
    server.run().context("server event loop failed")?;

    info!("hyperkv stopped");
    Ok(())
}

fn init_logging(logging: &hyperkv_config::LoggingConfig) -> Result<()> {
    let level: tracing::Level = logging.level.parse().unwrap_or(tracing::Level::INFO);
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    match &logging.file {
        Some(path) => {
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file '{}'", path.display()))?;
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::sync::Mutex::new(file)).init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    Ok(())
}
