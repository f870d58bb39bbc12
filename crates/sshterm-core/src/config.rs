//! Configuration types for the sshterm client.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Dimensions, Error};

/// Client configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote host settings
    pub connection: ConnectionSettings,
    /// Terminal settings
    pub terminal: TerminalSettings,
    /// Session engine tuning
    pub session: SessionSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl ClientConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: ClientConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.connection.port == 0 {
            return Err(Error::Config("connection.port must be > 0".to_string()));
        }

        if self.terminal.rows == 0 || self.terminal.cols == 0 {
            return Err(Error::Config("terminal dimensions must be > 0".to_string()));
        }

        if self.terminal.term.trim().is_empty() {
            return Err(Error::Config("terminal.term must not be empty".to_string()));
        }

        self.session.validate()
    }
}

/// Remote host settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Server hostname or IP address
    pub host: Option<String>,
    /// SSH port
    pub port: u16,
    /// Login name
    pub username: Option<String>,
    /// Private key file
    pub key_file: Option<PathBuf>,
    /// Program used to reach the remote host
    pub ssh_program: String,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: 22,
            username: None,
            key_file: None,
            ssh_program: "ssh".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

/// Terminal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSettings {
    /// Terminal type requested from the remote side
    pub term: String,
    /// Initial columns
    pub cols: u16,
    /// Initial rows
    pub rows: u16,
    /// End control sequences on any CSI final byte, not only the recognized set
    pub any_final_byte: bool,
}

impl TerminalSettings {
    /// Initial dimensions.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.rows, self.cols)
    }
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            term: "xterm".to_string(),
            cols: 80,
            rows: 24,
            any_final_byte: false,
        }
    }
}

/// Session engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Upper bound of each pump suspension, in milliseconds
    pub poll_interval_ms: u64,
    /// How long `close` waits for each pump, in milliseconds
    pub join_timeout_ms: u64,
    /// Maximum bytes taken from the channel per read
    pub read_buffer_size: usize,
}

impl SessionSettings {
    /// Pump poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-pump join timeout used by `close`.
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Validate the tuning values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(
                "session.poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.join_timeout_ms == 0 {
            return Err(Error::Config(
                "session.join_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(Error::Config(
                "session.read_buffer_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            join_timeout_ms: 1000,
            read_buffer_size: 4096,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log file; logging is disabled when unset since the terminal is in raw mode
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
