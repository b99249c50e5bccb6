//! Store configuration.
//!
//! # Responsibility
//! - Describe where the store lives and which channel it notifies on.
//! - Allow host applications to embed the store section in their own
//!   settings file (serde).
//!
//! # Invariants
//! - A validated config has a non-blank channel and a non-zero busy timeout.
//! - File locations always carry a non-empty path.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

/// Channel used when neither config nor caller names one.
pub const DEFAULT_CHANNEL: &str = "easystore_update";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Configuration validation/parse errors.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    EmptyChannel,
    EmptyPath,
    ZeroBusyTimeout,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid store config: {err}"),
            Self::EmptyChannel => write!(f, "channel cannot be empty"),
            Self::EmptyPath => write!(f, "file location requires a non-empty path"),
            Self::ZeroBusyTimeout => write!(f, "busy_timeout_ms must be greater than zero"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

/// Where the backing database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreLocation {
    /// Private, process-local database discarded on drop.
    #[default]
    Memory,
    /// Database file on disk, created if missing.
    File { path: PathBuf },
}

/// Object store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub location: StoreLocation,
    pub busy_timeout_ms: u64,
    /// Bus channel notifiers built on this store publish to.
    pub channel: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: StoreLocation::Memory,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File { path: path.into() },
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Parses and validates a JSON store section.
    ///
    /// Missing fields fall back to defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.trim().is_empty() {
            return Err(ConfigError::EmptyChannel);
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::ZeroBusyTimeout);
        }
        if let StoreLocation::File { path } = &self.location {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyPath);
            }
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
