//! Configuration management for `HyperKV`.
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (`HYPERKV_*` prefix)
//! 3. `hyperkv.local.toml` (gitignored, local overrides)
//! 4. `hyperkv.toml` (project config)
//! 5. Built-in defaults (lowest precedence)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Top-level `HyperKV` configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperKvConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub eviction: EvictionConfig,
    pub aof: AofConfig,
    pub snapshot: SnapshotConfig,
    pub ttl: TtlConfig,
    pub cluster: ClusterConfig,
    pub tls: TlsConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub pubsub: PubSubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub client_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            max_connections: 10_000,
            client_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub backend: String,
    /// Accepts raw byte counts or a `<n><KB|MB|GB>` suffix; see
    /// [`parse_memory_size`]. `0` disables the memory limit and eviction.
    pub max_memory: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".hyperkv/data"),
            backend: "memory".to_string(),
            max_memory: "0".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn max_memory_bytes(&self) -> Result<u64, ConfigError> {
        parse_memory_size(&self.max_memory)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionConfig {
    pub policy: String,
    pub memory_threshold: f64,
    pub batch_size: usize,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            policy: "lru".to_string(),
            memory_threshold: 0.9,
            batch_size: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AofConfig {
    pub enabled: bool,
    pub fsync_policy: String,
}

impl Default for AofConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fsync_policy: "everysec".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub enabled: bool,
    pub compression: bool,
    pub retention: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            compression: true,
            retention: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    pub check_interval_ms: u64,
    pub sweep_budget: usize,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 100,
            sweep_budget: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub node_id: u64,
    pub enable_clustering: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            enable_clustering: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PubSubConfig {
    pub overflow_policy: String,
    pub queue_capacity: usize,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            overflow_policy: "disconnect_slow_subscriber".to_string(),
            queue_capacity: 1024,
        }
    }
}

impl HyperKvConfig {
    /// Loads configuration from default locations rooted at the current
    /// directory.
    pub fn load() -> anyhow::Result<Self> {
        ConfigLoader::new().load()
    }

    /// Loads configuration rooted at a specific project directory.
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolves `data_dir` (and any other relative paths) against `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();
        if self.storage.data_dir.is_relative() {
            self.storage.data_dir = base.join(&self.storage.data_dir);
        }
    }
}

/// Parses a memory size string: a raw byte count (`"1048576"`) or a
/// `<n><KB|MB|GB>` suffix (`"512MB"`, case-insensitive). `"0"` means
/// unlimited.
pub fn parse_memory_size(input: &str) -> Result<u64, ConfigError> {
    let trimmed = input.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = if let Some(prefix) = upper.strip_suffix("GB") {
        (prefix, 1024 * 1024 * 1024)
    } else if let Some(prefix) = upper.strip_suffix("MB") {
        (prefix, 1024 * 1024)
    } else if let Some(prefix) = upper.strip_suffix("KB") {
        (prefix, 1024)
    } else {
        (upper.as_str(), 1)
    };

    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| ConfigError::InvalidMemorySize(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = HyperKvConfig::default();
        assert_eq!(config.server.port, 6379);
        assert_eq!(config.eviction.policy, "lru");
        assert_eq!(config.eviction.batch_size, 16);
    }

    #[test]
    fn resolve_paths_makes_data_dir_absolute() {
        let mut config = HyperKvConfig::default();
        config.resolve_paths("/srv/hyperkv");
        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/hyperkv/.hyperkv/data"));
    }

    #[test]
    fn parse_memory_size_handles_suffixes() {
        assert_eq!(parse_memory_size("0").unwrap(), 0);
        assert_eq!(parse_memory_size("1024").unwrap(), 1024);
        assert_eq!(parse_memory_size("1KB").unwrap(), 1024);
        assert_eq!(parse_memory_size("512MB").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_memory_size("1GB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_memory_size("1gb").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn parse_memory_size_rejects_garbage() {
        assert!(parse_memory_size("not-a-size").is_err());
    }
}
