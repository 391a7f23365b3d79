use crate::encoder::{EncoderConfig, DEFAULT_BITRATE_KBPS, DEFAULT_ENCODER};
use crate::{Error, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_CHUNK_SIZE_BYTES: u64 = 100000; // How often the download will pause to execute code.

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub encoder_path: PathBuf,
    pub default_bitrate_kbps: u64,
    pub resolve_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub chunk_size_bytes: u64,
    pub overwrite: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            encoder_path: PathBuf::from(DEFAULT_ENCODER),
            default_bitrate_kbps: DEFAULT_BITRATE_KBPS,
            resolve_timeout_secs: 30,
            fetch_timeout_secs: 60,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            overwrite: true,
        }
    }
}

impl Config {
    /// Load from the config directory, falling back to defaults if no config
    /// file exists.
    pub async fn new() -> Result<Self> {
        Self::from_dir(&get_config_dir()?).await
    }
    pub async fn from_dir(config_dir: &Path) -> Result<Self> {
        if let Ok(config_file) = tokio::fs::read_to_string(config_dir.join(CONFIG_FILE_NAME)).await
        {
            Ok(toml::from_str(&config_file)?)
        } else {
            Ok(Self::default())
        }
    }
    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            program: self.encoder_path.clone(),
            default_bitrate_kbps: self.default_bitrate_kbps,
            overwrite: self.overwrite,
        }
    }
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

pub fn get_data_dir() -> Result<PathBuf> {
    let directory = if let Ok(s) = std::env::var("YTAUDIO_DATA_DIR") {
        PathBuf::from(s)
    } else if let Some(proj_dirs) = ProjectDirs::from("com", "nick42", "ytaudio") {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        return Err(Error::DirectoryName);
    };
    Ok(directory)
}

pub fn get_config_dir() -> Result<PathBuf> {
    let directory = if let Ok(s) = std::env::var("YTAUDIO_CONFIG_DIR") {
        PathBuf::from(s)
    } else if let Some(proj_dirs) = ProjectDirs::from("com", "nick42", "ytaudio") {
        proj_dirs.config_local_dir().to_path_buf()
    } else {
        return Err(Error::DirectoryName);
    };
    Ok(directory)
}
