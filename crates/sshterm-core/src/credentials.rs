//! Connection credentials handed to a channel connector.

use std::path::PathBuf;
use std::time::Duration;

use crate::{ConnectionSettings, Error, Result};

/// What a connector needs to open an authenticated channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Server hostname or IP address
    pub host: String,
    /// SSH port
    pub port: u16,
    /// Login name (None = transport default)
    pub username: Option<String>,
    /// Private key file (None = agent / default keys / interactive password)
    pub key_file: Option<PathBuf>,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Credentials {
    /// Credentials for `host` on the default port.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            key_file: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set the login name.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the private key file.
    pub fn with_key_file(mut self, key_file: impl Into<PathBuf>) -> Self {
        self.key_file = Some(key_file.into());
        self
    }

    /// Build credentials from configured connection settings.
    pub fn from_settings(settings: &ConnectionSettings) -> Result<Self> {
        let host = settings
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidInput("no host given".to_string()))?;

        Ok(Self {
            host: host.to_string(),
            port: settings.port,
            username: settings.username.clone(),
            key_file: settings.key_file.clone(),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
        })
    }

    /// Parse an `[user@]host` destination.
    ///
    /// An explicit user in the destination wins over `self.username`.
    pub fn with_destination(mut self, destination: &str) -> Result<Self> {
        let destination = destination.trim();
        let (user, host) = match destination.rsplit_once('@') {
            Some((user, host)) => (Some(user), host),
            None => (None, destination),
        };

        if host.is_empty() {
            return Err(Error::InvalidInput(format!(
                "invalid destination: '{destination}'"
            )));
        }
        if let Some(user) = user {
            if user.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "invalid destination: '{destination}'"
                )));
            }
            self.username = Some(user.to_string());
        }
        self.host = host.to_string();
        Ok(self)
    }
}

impl std::fmt::Display for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.username {
            Some(user) => write!(f, "{user}@{}:{}", self.host, self.port),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}
