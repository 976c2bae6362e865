use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{ACK_READ_SIZE, DATA_IDLE_TIMEOUT, IN_BUFFER_SIZE, TEARDOWN_GRACE};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub recv_buffer_size: usize,
    pub ack_read_size: usize,
    pub data_idle_timeout_secs: u64,
    pub teardown_grace_ms: u64,
    pub download_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: IN_BUFFER_SIZE,
            ack_read_size: ACK_READ_SIZE,
            data_idle_timeout_secs: DATA_IDLE_TIMEOUT.as_secs(),
            teardown_grace_ms: TEARDOWN_GRACE.as_millis() as u64,
            download_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.data_idle_timeout_secs)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.recv_buffer_size == 0 {
            bail!("recv_buffer_size must be greater than 0");
        }
        if self.ack_read_size == 0 {
            bail!("ack_read_size must be greater than 0");
        }
        if self.data_idle_timeout_secs == 0 {
            bail!("data_idle_timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

impl Config {
    pub fn parse(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse configuration")?;
        config.client.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        Self::parse(&config_str)
            .with_context(|| format!("Invalid configuration file: {}", path.display()))
    }

    /// Loads `path` when given, otherwise falls back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}
