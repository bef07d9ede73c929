//! Daemon and NFS subsystem configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{NfsError, Result};

/// Overrides [`NfsConfig::export_dir`].
pub const EXPORT_DIR_ENV: &str = "TARGETD_NFS_EXPORT_DIR";
/// Overrides [`NfsConfig::main_export_file`].
pub const MAIN_EXPORT_ENV: &str = "TARGETD_NFS_EXPORT";
/// Default location of the daemon configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/target/targetd.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfsConfig {
    /// Program used to list, add and remove exports
    pub exportfs_cmd: String,
    /// Directory holding drop-in export files
    pub export_dir: PathBuf,
    /// Name of the generated file inside `export_dir`
    pub export_file: String,
    /// User-maintained exports file, never written
    pub main_export_file: PathBuf,
}

impl Default for NfsConfig {
    fn default() -> Self {
        Self {
            exportfs_cmd: String::from("exportfs"),
            export_dir: PathBuf::from("/etc/exports.d"),
            export_file: String::from("targetd.exports"),
            main_export_file: PathBuf::from("/etc/exports"),
        }
    }
}

impl NfsConfig {
    /// Applies the `TARGETD_NFS_*` overrides found through `lookup`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(EXPORT_DIR_ENV).filter(|v| !v.is_empty()) {
            self.export_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup(MAIN_EXPORT_ENV).filter(|v| !v.is_empty()) {
            self.main_export_file = PathBuf::from(file);
        }
        self
    }

    /// Path of the file this subsystem owns and rewrites.
    pub fn generated_file(&self) -> PathBuf {
        self.export_dir.join(&self.export_file)
    }

    pub fn validate(&self) -> Result<()> {
        if self.exportfs_cmd.trim().is_empty() {
            return Err(NfsError::Config {
                reason: "exportfs command cannot be empty".to_string(),
            });
        }

        if self.export_file.is_empty() {
            return Err(NfsError::Config {
                reason: "generated export file name cannot be empty".to_string(),
            });
        }

        if self.export_file.contains('/') {
            return Err(NfsError::Config {
                reason: format!(
                    "generated export file name must not contain '/': {}",
                    self.export_file
                ),
            });
        }

        if self.generated_file() == self.main_export_file {
            return Err(NfsError::Config {
                reason: "generated export file cannot be the main exports file".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetdConfig {
    pub log_level: String,
    pub nfs: NfsConfig,
}

impl Default for TargetdConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            nfs: NfsConfig::default(),
        }
    }
}

impl TargetdConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: TargetdConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: TargetdConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// Reads `path` when it exists, else uses defaults; env overrides win.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.nfs = config.nfs.with_env_overrides(|key| std::env::var(key).ok());
        config.nfs.validate()?;
        Ok(config)
    }
}
