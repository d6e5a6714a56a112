//! Path conventions for config files and the data directory layout.

use std::path::{Path, PathBuf};

/// File and directory conventions rooted at a project directory and a data
/// directory. There is no per-user config directory: precedence collapses to
/// project (`hyperkv.toml`) and local (`hyperkv.local.toml`, gitignored).
pub struct Paths;

impl Paths {
    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("hyperkv.toml")
    }

    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("hyperkv.local.toml")
    }

    pub fn is_initialized(project_dir: impl AsRef<Path>) -> bool {
        Self::project_config_file(project_dir).exists()
    }

    pub fn append_log_file(data_dir: impl AsRef<Path>) -> PathBuf {
        data_dir.as_ref().join("appendonly.log")
    }

    pub fn snapshot_dir(data_dir: impl AsRef<Path>) -> PathBuf {
        data_dir.as_ref().join("snapshots")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn project_paths_are_rooted_at_project_dir() {
        let temp_dir = tempdir().unwrap();
        let project_dir = temp_dir.path();

        assert_eq!(Paths::project_config_file(project_dir), project_dir.join("hyperkv.toml"));
        assert_eq!(Paths::local_config_file(project_dir), project_dir.join("hyperkv.local.toml"));
        assert!(!Paths::is_initialized(project_dir));

        std::fs::write(Paths::project_config_file(project_dir), "").unwrap();
        assert!(Paths::is_initialized(project_dir));
    }

    #[test]
    fn data_dir_layout_matches_documented_filenames() {
        let data_dir = PathBuf::from("/var/lib/hyperkv");
        assert_eq!(Paths::append_log_file(&data_dir), data_dir.join("appendonly.log"));
        assert_eq!(Paths::snapshot_dir(&data_dir), data_dir.join("snapshots"));
    }
}
