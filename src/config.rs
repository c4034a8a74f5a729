//! Configuration - defaults, config file, environment, then command line
//!
//! Layers, lowest priority first:
//! 1. built-in defaults
//! 2. `<data_dir>/config.json`
//! 3. `CLWALLET_*` environment variables (a `.env` file in the working
//!    directory only fills variables that are not already set)
//! 4. command line flags, applied by the caller through the `with_*` methods

use crate::core::paths::{env, files};
use crate::core::{WalletError, WalletResult};
use crate::identity::{DEFAULT_STRENGTH, SUPPORTED_STRENGTHS};
use crate::wallet::{Network, SessionOptions, DEFAULT_GAP_LIMIT, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub network: Network,
    /// Overrides the per-network default server
    pub electrum_url: Option<String>,
    pub timeout_secs: u64,
    pub gap_limit: u32,
    pub passphrase_strength: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            network: Network::default(),
            electrum_url: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            gap_limit: DEFAULT_GAP_LIMIT,
            passphrase_strength: DEFAULT_STRENGTH,
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join(files::APP_DIR)
}

/// Set variables from a `KEY=value` file. Variables already present win.
pub fn load_dotenv(path: &Path) {
    let Ok(contents) = std::fs::read_to_string(path) else { return };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() && std::env::var(key.trim()).is_err() {
                std::env::set_var(key.trim(), value);
            }
        }
    }
}

impl Config {
    /// Resolve from the process environment. `data_dir` comes from the command line, if given.
    pub fn load(data_dir: Option<PathBuf>) -> WalletResult<Self> {
        Self::from_sources(data_dir, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup
    pub fn from_sources(data_dir: Option<PathBuf>, lookup: impl Fn(&str) -> Option<String>) -> WalletResult<Self> {
        let data_dir = data_dir
            .or_else(|| lookup(env::DATA_DIR).map(PathBuf::from))
            .unwrap_or_else(default_data_dir);

        let file = data_dir.join(files::CONFIG);
        let mut config = if file.exists() {
            let raw = std::fs::read_to_string(&file)?;
            serde_json::from_str::<Config>(&raw)
                .map_err(|e| WalletError::Store(format!("{}: {}", file.display(), e)))?
        } else {
            Config::default()
        };
        config.data_dir = data_dir;

        if let Some(value) = lookup(env::NETWORK) {
            config.network = Network::from_str(&value)?;
        }
        if let Some(value) = lookup(env::ELECTRUM) {
            config.electrum_url = Some(value);
        }
        if let Some(value) = lookup(env::TIMEOUT) {
            config.timeout_secs = parse_env(env::TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(env::GAP_LIMIT) {
            config.gap_limit = parse_env(env::GAP_LIMIT, &value)?;
        }
        if let Some(value) = lookup(env::STRENGTH) {
            config.passphrase_strength = parse_env(env::STRENGTH, &value)?;
        }

        config.validate()?;
        debug!(data_dir = %config.data_dir.display(), network = %config.network, "config resolved");
        Ok(config)
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn with_electrum(mut self, url: impl Into<String>) -> Self {
        self.electrum_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn validate(&self) -> WalletResult<()> {
        if !SUPPORTED_STRENGTHS.contains(&self.passphrase_strength) {
            return Err(WalletError::InvalidStrength(self.passphrase_strength));
        }
        if self.gap_limit == 0 {
            return Err(WalletError::MalformedRequest("gap_limit must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(WalletError::MalformedRequest("timeout must be at least 1 second".into()));
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(files::STORE)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions { gap_limit: self.gap_limit, timeout: Duration::from_secs(self.timeout_secs) }
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> WalletResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| WalletError::MalformedRequest(format!("{}={} is not a valid number", key, value)))
}
