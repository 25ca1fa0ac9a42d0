//! Configuration for Arboreto
//!
//! Every field has a default, so an empty (or absent) `arboreto.toml` yields
//! the classic layout: `entrada/` watched, `entrada/procesados/` archive,
//! `imagenes/` images, `salida/` documents, `logs/` log files.

use crate::pipeline::PipelinePaths;
use arboreto_render::ConflictPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "arboreto.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("archive_dir_name must be a single folder name, got '{0}'")]
    ArchiveName(String),
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArboretoConfig {
    /// Folder watched for new record files
    #[serde(default = "default_watch_root")]
    pub watch_root: PathBuf,

    /// Name of the archive folder inside the watch root
    #[serde(default = "default_archive_dir_name")]
    pub archive_dir_name: String,

    /// Root that record image paths are relative to
    #[serde(default = "default_image_root")]
    pub image_root: PathBuf,

    /// Folder that receives rendered documents
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Folder for log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// What to do when a record's output document already exists
    #[serde(default)]
    pub on_output_conflict: ConflictPolicy,

    /// Quiet period after the last event on a file before it is processed
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Supervisor wake-up interval while idle
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_watch_root() -> PathBuf {
    PathBuf::from("entrada")
}

fn default_archive_dir_name() -> String {
    "procesados".to_string()
}

fn default_image_root() -> PathBuf {
    PathBuf::from("imagenes")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("salida")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_settle_ms() -> u64 {
    250
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for ArboretoConfig {
    fn default() -> Self {
        Self {
            watch_root: default_watch_root(),
            archive_dir_name: default_archive_dir_name(),
            image_root: default_image_root(),
            output_dir: default_output_dir(),
            log_dir: default_log_dir(),
            on_output_conflict: ConflictPolicy::default(),
            settle_ms: default_settle_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ArboretoConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ArboretoConfig = toml::from_str(&content)?;
        config.check()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the configuration for this run.
    ///
    /// An explicit path must exist. Without one, `arboreto.toml` in the
    /// working directory is used when present, defaults otherwise.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// The archive folder must be a direct child of the watch root.
    pub fn check(&self) -> Result<(), ConfigError> {
        let mut components = Path::new(&self.archive_dir_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(()),
            _ => Err(ConfigError::ArchiveName(self.archive_dir_name.clone())),
        }
    }

    /// `<watch_root>/<archive_dir_name>`
    pub fn archive_dir(&self) -> PathBuf {
        self.watch_root.join(&self.archive_dir_name)
    }

    /// Folders that must exist before the watch starts.
    pub fn required_folders(&self) -> Vec<PathBuf> {
        vec![
            self.watch_root.clone(),
            self.archive_dir(),
            self.output_dir.clone(),
            self.image_root.clone(),
        ]
    }

    pub fn pipeline_paths(&self) -> PipelinePaths {
        PipelinePaths {
            watch_root: self.watch_root.clone(),
            archive_dir: self.archive_dir(),
            image_root: self.image_root.clone(),
            output_dir: self.output_dir.clone(),
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
