//! Configuration loader with multi-source merging

use crate::{HyperKvConfig, Paths};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern.
///
/// Precedence, lowest to highest: built-in defaults, `hyperkv.toml`,
/// `hyperkv.local.toml` (gitignored), environment variables, explicit
/// overrides set via [`with_override`](Self::with_override) (normally fed by
/// parsed CLI flags).
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    overrides: Vec<(String, String)>,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "HYPERKV".to_string(),
            overrides: Vec::new(),
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "HYPERKV")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Add an explicit key/value override, applied after environment
    /// variables. Keys use `.`-separated paths matching the config's nested
    /// sections, e.g. `"server.port"`. Intended for parsed CLI flags.
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<HyperKvConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = HyperKvConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. Project config (hyperkv.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 3. Local config (hyperkv.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Environment variables (HYPERKV__*, double underscore for nesting)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        // 5. Explicit overrides (CLI flags, highest precedence)
        for (key, value) in &self.overrides {
            builder = builder.set_override(key.as_str(), value.as_str())?;
        }

        let config = builder.build().context("failed to build configuration")?;

        let mut hyperkv_config: HyperKvConfig = config
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        hyperkv_config.resolve_paths(&self.project_dir);

        Ok(hyperkv_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> HyperKvConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_defaults() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .load()
            .expect("failed to load config");

        assert_eq!(config.server.port, 6379);
        assert_eq!(config.eviction.policy, "lru");
    }

    #[test]
    fn load_project_config() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[server]
port = 7000
max_connections = 2048

[eviction]
policy = "lfu"
"#;
        fs::write(project_dir.join("hyperkv.toml"), config_content)
            .expect("failed to write config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("failed to load config");

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.max_connections, 2048);
        assert_eq!(config.eviction.policy, "lfu");
    }

    #[test]
    fn local_config_overrides_project_config() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("hyperkv.toml"),
            "[server]\nport = 7000\n",
        )
        .expect("failed to write project config");

        fs::write(
            project_dir.join("hyperkv.local.toml"),
            "[server]\nport = 7001\n",
        )
        .expect("failed to write local config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("failed to load config");

        assert_eq!(config.server.port, 7001);
    }

    #[test]
    fn explicit_override_wins_over_files() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("hyperkv.toml"),
            "[server]\nport = 7000\n",
        )
        .expect("failed to write project config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_override("server.port", "9000")
            .load()
            .expect("failed to load config");

        assert_eq!(config.server.port, 9000);
    }

    // Environment variable precedence (HYPERKV__SERVER__PORT=7000 etc.) is
    // exercised by integration tests rather than here, since the `config`
    // crate reads the process environment directly and unit tests running
    // in the same process would interfere with each other.

    #[test]
    fn path_resolution() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("failed to load config");

        assert!(config.storage.data_dir.is_absolute());
    }
}
