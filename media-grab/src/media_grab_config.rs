use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use download_client::{client_config::ClientConfig, types::MediaFormat};
use serde::{Deserialize, Serialize};

/// Where the config, preferences and logs live unless told otherwise.
pub const CONFIG_DIR: &str = ".dev";

const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_ms: u64,
    pub max_interval_ms: u64,
    pub backoff_multiplier: f64,
    /// 0 waits forever
    pub stall_timeout_secs: u64,
    pub retry_count: usize,
    pub completion_delay_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            interval_ms: client.poll_interval.as_millis() as u64,
            max_interval_ms: client.max_poll_interval.as_millis() as u64,
            backoff_multiplier: client.backoff_multiplier,
            stall_timeout_secs: client.stall_timeout.map_or(0, |d| d.as_secs()),
            retry_count: client.retry_count,
            completion_delay_ms: client.completion_delay.as_millis() as u64,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MediaGrabConfig {
    pub server: String,
    pub download_dir: PathBuf,
    pub format: MediaFormat,
    pub log_dir: PathBuf,
    pub polling: PollingSettings,
}

impl Default for MediaGrabConfig {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:8000/".into(),
            download_dir: PathBuf::from("."),
            format: MediaFormat::default(),
            log_dir: Path::new(CONFIG_DIR).join("logs"),
            polling: PollingSettings::default(),
        }
    }
}

/// Values given on the command line; each one beats the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub format: Option<MediaFormat>,
    pub log_dir: Option<PathBuf>,
}

impl MediaGrabConfig {
    pub fn default_path() -> PathBuf {
        Path::new(CONFIG_DIR).join("media-grab.toml")
    }

    /// Reads `path`. A missing file is only an error when the user named it.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if !path.exists() {
            if required {
                bail!("config file {} does not exist", path.display());
            }
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: MediaGrabConfig = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        Ok(config)
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(server) = overrides.server {
            self.server = server;
        }
        if let Some(dir) = overrides.download_dir {
            self.download_dir = dir;
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        if let Some(log_dir) = overrides.log_dir {
            self.log_dir = log_dir;
        }
        self
    }

    pub fn client_config(&self) -> Result<ClientConfig> {
        let polling = &self.polling;
        if !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&polling.backoff_multiplier) {
            bail!(
                "polling.backoff_multiplier must be between 1.0 and {}, got {}",
                MAX_BACKOFF_MULTIPLIER,
                polling.backoff_multiplier
            );
        }

        let base = ClientConfig::with_base_url(&self.server)
            .with_context(|| format!("invalid server url '{}'", self.server))?;

        Ok(ClientConfig {
            poll_interval: Duration::from_millis(polling.interval_ms),
            max_poll_interval: Duration::from_millis(polling.max_interval_ms.max(polling.interval_ms)),
            backoff_multiplier: polling.backoff_multiplier,
            stall_timeout: match polling.stall_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            retry_count: polling.retry_count,
            completion_delay: Duration::from_millis(polling.completion_delay_ms),
            ..base
        })
    }
}
