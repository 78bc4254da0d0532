use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub janitor: JanitorConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}
fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_files_dir")]
    pub files_dir: PathBuf,
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
    #[serde(default = "default_diff_dir")]
    pub diff_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            files_dir: default_files_dir(),
            docs_dir: default_docs_dir(),
            diff_dir: default_diff_dir(),
        }
    }
}

fn default_files_dir() -> PathBuf {
    PathBuf::from("files")
}
fn default_docs_dir() -> PathBuf {
    PathBuf::from("doc")
}
fn default_diff_dir() -> PathBuf {
    PathBuf::from("diff")
}

/// Retention settings for rendered diff artifacts.
#[derive(Debug, Deserialize, Clone)]
pub struct JanitorConfig {
    /// Artifacts older than this are deleted.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    /// Pause between two sweeps.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_max_age_secs() -> u64 {
    24 * 60 * 60
}
fn default_interval_secs() -> u64 {
    60 * 60
}

impl JanitorConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_allowed_extensions() -> Vec<String> {
    ["txt", "pdf", "png", "jpg", "jpeg", "gif", "md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    fn validate(&self) -> Result<()> {
        if self.janitor.interval_secs == 0 {
            anyhow::bail!("janitor.interval_secs must be > 0");
        }
        if self.janitor.max_age_secs == 0 {
            anyhow::bail!("janitor.max_age_secs must be > 0");
        }
        if self.server.max_upload_bytes == 0 {
            anyhow::bail!("server.max_upload_bytes must be > 0");
        }
        if self.upload.allowed_extensions.is_empty() {
            anyhow::bail!("upload.allowed_extensions must not be empty");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
