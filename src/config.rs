//! Configuration for study-gate

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use chrono_tz::Tz;

use crate::enrollment::DEFAULT_CREDENTIAL_ATTEMPTS;

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("study-gate")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub study: StudyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP API on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request body limit, covers multipart artifact uploads
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for the database and artifacts
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// SQLite file, relative to data_dir
    #[serde(default = "default_database_file")]
    pub database_file: PathBuf,

    /// Artifact root, relative to data_dir
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    /// IANA name of the reference timezone
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Reject submissions whose declared day is not today's study-day
    #[serde(default = "default_true")]
    pub enforce_current_day: bool,

    /// Credential draws per enrollment before giving up
    #[serde(default = "default_credential_attempts")]
    pub credential_attempts: u32,
}

fn default_bind_addr() -> String { "0.0.0.0".to_string() }
fn default_http_port() -> u16 { 5000 }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 } // 10MB
fn default_database_file() -> PathBuf { PathBuf::from("participants.db") }
fn default_artifact_dir() -> PathBuf { PathBuf::from("uploads/images") }
fn default_timezone() -> String { "America/Toronto".to_string() }
fn default_true() -> bool { true }
fn default_credential_attempts() -> u32 { DEFAULT_CREDENTIAL_ATTEMPTS }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            http_port: default_http_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            artifact_dir: default_artifact_dir(),
        }
    }
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            enforce_current_day: true,
            credential_attempts: default_credential_attempts(),
        }
    }
}

impl StudyConfig {
    /// Parse the configured reference timezone
    pub fn tz(&self) -> Result<Tz, String> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| format!("unknown timezone {:?}: {}", self.timezone, e))
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Load from `path` if it exists, otherwise defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.database_file)
    }

    pub fn artifact_root(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.artifact_dir)
    }
}
