//! Turns a loaded `HyperKvConfig` into a running [`Dispatcher`] plus the
//! pieces `Server::bind` needs: opening the append log, replaying it,
//! loading the latest snapshot, and wiring pub/sub + auth + metrics.

use std::cell::RefCell;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use hyperkv_config::HyperKvConfig;
use hyperkv_keyspace::{EvictionEngine, EvictionPolicy, Keyspace, KeyspaceConfig};
use hyperkv_pubsub::{BackpressurePolicy, PubSub};
use hyperkv_storage::{AppendLog, FsyncPolicy, MemoryBackend, SnapshotStore};
use hyperkv_types::{NodeId, Timestamp};
use rustls::ServerConfig as RustlsServerConfig;

use crate::auth::AuthGate;
use crate::client_registry::ClientRegistry;
use crate::dispatcher::Dispatcher;
use crate::error::{ServerError, ServerResult};
use crate::metrics::Metrics;
use crate::notify::PubSubNotifier;
use crate::server::ServerOptions;
use crate::shard::ShardRouter;
use crate::tls::TlsConfig;

/// Everything `main` needs to call `Server::bind` and `run`.
pub struct Bootstrapped {
    pub dispatcher: Dispatcher,
    pub clients: ClientRegistry,
    pub snapshot_store: Option<SnapshotStore>,
    pub options: ServerOptions,
    pub addr: SocketAddr,
    pub tls_config: Option<Arc<RustlsServerConfig>>,
}

/// Builds a dispatcher and friends from `config`, replaying the append log
/// and loading the latest snapshot (if present) before returning.
pub fn bootstrap(config: &HyperKvConfig, shards: usize) -> ServerResult<Bootstrapped> {
    std::fs::create_dir_all(&config.storage.data_dir).map_err(ServerError::Io)?;

    let eviction_policy = EvictionPolicy::from_str(&config.eviction.policy).map_err(ServerError::Config)?;
    let max_memory = config
        .storage
        .max_memory_bytes()
        .map_err(|e| ServerError::Config(e.to_string()))? as usize;

    let keyspace_config = KeyspaceConfig {
        max_memory,
        eviction_threshold: config.eviction.memory_threshold,
        node_id: NodeId::new(config.cluster.node_id),
    };

    let backend: Box<dyn hyperkv_storage::StorageBackend> = Box::new(MemoryBackend::new());
    let eviction = EvictionEngine::with_batch_size(eviction_policy, config.eviction.batch_size);
    let mut keyspace = Keyspace::new(backend, eviction, keyspace_config);

    let snapshot_store = if config.snapshot.enabled {
        Some(SnapshotStore::new(config.storage.data_dir.join("snapshots"), config.snapshot.retention, config.snapshot.compression))
    } else {
        None
    };

    if let Some(store) = &snapshot_store {
        if let Some(loaded) = store.load_latest()? {
            for (key, raw) in loaded.entries {
                keyspace.restore_raw(key, raw, Timestamp::now())?;
            }
        }
    }

    let append_log_path = config.storage.data_dir.join("appendonly.log");
    if config.aof.enabled {
        let fsync_policy = parse_fsync_policy(&config.aof.fsync_policy);
        let now = Timestamp::now();
        let mut replay_error = None;
        AppendLog::replay(&append_log_path, |command| {
            if replay_error.is_some() {
                return;
            }
            if let Err(e) = keyspace.apply_log_command(command, now) {
                tracing::error!(error = %e, "append-log replay failed on a corrupted or invalid record");
                replay_error = Some(e);
            }
        })?;
        if let Some(e) = replay_error {
            return Err(ServerError::Keyspace(e));
        }
        let log = AppendLog::open(&append_log_path, fsync_policy)?;
        keyspace = keyspace.with_append_log(log);
    }

    let pubsub_policy = parse_backpressure_policy(&config.pubsub.overflow_policy);
    let pubsub = Rc::new(RefCell::new(PubSub::new(pubsub_policy, config.pubsub.queue_capacity)));
    keyspace = keyspace.with_notifications(Box::new(PubSubNotifier::new(Rc::clone(&pubsub))));

    let clients = ClientRegistry::new();
    let auth = AuthGate::new(config.auth.password.clone());
    let metrics = Rc::new(Metrics::new());
    let shard_router = ShardRouter::new(shards.max(1));

    let mut config_params = HashMap::new();
    config_params.insert("maxmemory".to_string(), config.storage.max_memory.clone());
    config_params.insert("appendonly".to_string(), config.aof.enabled.to_string());
    config_params.insert("maxclients".to_string(), config.server.max_connections.to_string());

    let dispatcher = Dispatcher::new(keyspace, pubsub, clients.clone(), auth, metrics, shard_router, config_params);

    let options = ServerOptions {
        max_connections: config.server.max_connections as usize,
        buffer_size: 8 * 1024,
        client_timeout: config.server.client_timeout_secs.map(Duration::from_secs),
        ttl_check_interval: Duration::from_millis(config.ttl.check_interval_ms),
        ttl_sweep_budget: config.ttl.sweep_budget,
        snapshot_on_shutdown: config.snapshot.enabled,
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|_| ServerError::Config("invalid host/port".to_string()))?;

    let tls_config = build_tls_config(config)?;

    Ok(Bootstrapped {
        dispatcher,
        clients,
        snapshot_store,
        options,
        addr,
        tls_config,
    })
}

/// Builds a rustls `ServerConfig` from `config.tls` when TLS is enabled.
/// Returns `Ok(None)` when TLS is off, so the caller binds a plaintext
/// listener exactly as before.
fn build_tls_config(config: &HyperKvConfig) -> ServerResult<Option<Arc<RustlsServerConfig>>> {
    if !config.tls.enabled {
        return Ok(None);
    }

    let cert_path = config
        .tls
        .cert_file
        .as_ref()
        .ok_or_else(|| ServerError::Config("tls.enabled is true but tls.cert_file is unset".to_string()))?;
    let key_path = config
        .tls
        .key_file
        .as_ref()
        .ok_or_else(|| ServerError::Config("tls.enabled is true but tls.key_file is unset".to_string()))?;

    let tls = TlsConfig::new(cert_path, key_path);
    Ok(Some(tls.build_server_config()?))
}

fn parse_fsync_policy(s: &str) -> FsyncPolicy {
    match s {
        "always" => FsyncPolicy::Always,
        "no" => FsyncPolicy::No,
        _ => FsyncPolicy::EverySec,
    }
}

fn parse_backpressure_policy(s: &str) -> BackpressurePolicy {
    match s {
        "drop_oldest" => BackpressurePolicy::DropOldest,
        "drop_newest" => BackpressurePolicy::DropNewest,
        _ => BackpressurePolicy::DisconnectSlowSubscriber,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsync_policy_defaults_to_everysec() {
        assert!(matches!(parse_fsync_policy("always"), FsyncPolicy::Always));
        assert!(matches!(parse_fsync_policy("no"), FsyncPolicy::No));
        assert!(matches!(parse_fsync_policy("everysec"), FsyncPolicy::EverySec));
        assert!(matches!(parse_fsync_policy("bogus"), FsyncPolicy::EverySec));
    }

    #[test]
    fn backpressure_policy_defaults_to_disconnect() {
        assert!(matches!(parse_backpressure_policy("drop_oldest"), BackpressurePolicy::DropOldest));
        assert!(matches!(parse_backpressure_policy("drop_newest"), BackpressurePolicy::DropNewest));
        assert!(matches!(
            parse_backpressure_policy("disconnect_slow_subscriber"),
            BackpressurePolicy::DisconnectSlowSubscriber
        ));
        assert!(matches!(parse_backpressure_policy("bogus"), BackpressurePolicy::DisconnectSlowSubscriber));
    }

    #[test]
    fn bootstrap_wires_a_runnable_dispatcher() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = HyperKvConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.server.port = 0;

        let bootstrapped = bootstrap(&config, 1).expect("bootstrap should succeed");
        assert_eq!(bootstrapped.options.max_connections, config.server.max_connections as usize);
        assert!(bootstrapped.snapshot_store.is_none());
        assert!(bootstrapped.tls_config.is_none());
    }

    #[test]
    fn tls_disabled_builds_no_server_config() {
        let config = HyperKvConfig::default();
        assert!(build_tls_config(&config).expect("should succeed").is_none());
    }

    #[test]
    fn tls_enabled_without_cert_file_is_a_config_error() {
        let mut config = HyperKvConfig::default();
        config.tls.enabled = true;
        let err = build_tls_config(&config).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn replay_error_aborts_bootstrap() {
        use hyperkv_storage::LogCommand;

        let dir = tempfile::tempdir().expect("tempdir");
        let data_dir = dir.path().to_path_buf();
        std::fs::create_dir_all(&data_dir).expect("create data dir");
        let log_path = data_dir.join("appendonly.log");

        // A CRDT_MERGE record that parses fine as a `LogCommand` but whose
        // payload isn't valid JSON trips `KeyspaceError::Codec` inside
        // `apply_log_command`, which is the real failure mode this test
        // guards against being swallowed.
        let mut log = AppendLog::open(&log_path, FsyncPolicy::Always).expect("open append log");
        log.append(&LogCommand::crdt_merge(b"k", b"not valid json"), Timestamp::from_nanos(1))
            .expect("seed a bad record");
        drop(log);

        let mut config = HyperKvConfig::default();
        config.storage.data_dir = data_dir;
        config.server.port = 0;
        config.aof.enabled = true;

        let err = bootstrap(&config, 1).expect_err("a corrupted replay record should abort bootstrap");
        assert!(matches!(err, ServerError::Keyspace(_)));
    }
}
