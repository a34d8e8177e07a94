
use crate::{executors::Assignment, materials::MaterialError};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Error,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::{error, info};

/// Config file looked up when none is given
pub const DEFAULT_CONFIG: &str = "parastudy.yaml";

// check if a file is executable
#[cfg(unix)]
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    use std::os::unix::fs::MetadataExt;

    if !path.is_file() {
        Err(ConfigErrors::FileNotFound(path.to_path_buf()))
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigErrors::MetadataNotFound(e)),
        }
    }
}

#[cfg(not(unix))]
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound(path.to_path_buf()))
    } else {
        File::open(path)
            .map(|_| true)
            .map_err(ConfigErrors::MetadataNotFound)
    }
}

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to read config: {0}")]
    Read(Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("File {0} not found")]
    FileNotFound(PathBuf),
    #[error("Metadata not found")]
    MetadataNotFound(#[from] Error),
    #[error("Connection {0} needs at least one slot")]
    InvalidSlots(String),
    #[error("No connections configured")]
    NoConnections,
    #[error("Material catalogue failed to load: {0}")]
    Materials(#[from] MaterialError),
    #[error("Preflight checks failed")]
    Preflight,
}

fn default_study_path() -> PathBuf {
    PathBuf::from("study.ps")
}

fn default_poll_interval() -> u64 {
    5
}

fn default_slots() -> usize {
    1
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StudyConfig {
    #[serde(default)]
    pub study: StudyFileConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    // material catalogue, without one materials are passed on by name only
    #[serde(default)]
    pub materials: Option<MaterialsConfig>,
    // Connections as generic executables with fixed parameters
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StudyFileConfig {
    #[serde(default = "default_study_path")]
    pub path: PathBuf,
}

impl Default for StudyFileConfig {
    fn default() -> Self {
        Self {
            path: default_study_path(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    // seconds per bounded wait on a running simulation
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default)]
    pub assignment: Assignment,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            assignment: Assignment::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MaterialsConfig {
    pub path: PathBuf,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub exec: PathBuf,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default = "default_slots")]
    pub slots: usize,
}

impl StudyConfig {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigErrors> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let content = fs::read_to_string(path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => ConfigErrors::FileNotFound(path.to_path_buf()),
            _ => ConfigErrors::Read(error),
        })?;
        let config = Self::from_yaml(&content)?;

        info!(path = ?path, connections = config.connections.len(), "Loaded config");

        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.executor.poll_interval)
    }

    /// Check everything needed to run simulations, logs every problem found.
    ///
    /// Returns whether an error was found.
    pub fn preflight_checks(&self) -> bool {
        let mut contains_error = false;

        if self.connections.is_empty() {
            error!("No connections configured");
            contains_error = true;
        }

        if self.executor.poll_interval == 0 {
            error!("executor.poll_interval must be at least one second");
            contains_error = true;
        }

        for (name, connection) in self.connections.iter() {
            if connection.slots == 0 {
                error!(connection = %name, "Connections need at least one slot");
                contains_error = true;
            }

            match check_executable(&connection.exec) {
                Ok(true) => {}
                Ok(false) => {
                    error!(connection = %name, exec = ?connection.exec, "Connection executable is not executable");
                    contains_error = true;
                }
                Err(error) => {
                    error!(connection = %name, exec = ?connection.exec, "Connection executable can not be used: {error}");
                    contains_error = true;
                }
            }
        }

        if let Some(ref materials) = self.materials {
            if !materials.path.is_file() {
                error!(path = ?materials.path, "Material catalogue not found");
                contains_error = true;
            }
        }

        contains_error
    }
}
