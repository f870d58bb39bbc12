//! Command-line arguments and how they override the configuration file.

use std::path::PathBuf;

use clap::Parser;

use sshterm_core::{ClientConfig, Credentials, Result};
use sshterm_stream::PtyConnector;

/// Host name used for credentials when running a local shell.
const LOCAL_HOST: &str = "localhost";

/// CLI arguments for sshterm
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "sshterm")]
#[command(version)]
#[command(about = "Interactive terminal client for remote shell sessions", long_about = None)]
pub struct Cli {
    /// Remote destination as [user@]host
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<String>,

    /// Remote port
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Login name on the remote host
    #[arg(short = 'l', long = "login", value_name = "USER")]
    pub login: Option<String>,

    /// Private key file
    #[arg(short = 'i', long = "identity", value_name = "FILE")]
    pub identity: Option<PathBuf>,

    /// Terminal type advertised to the remote end
    #[arg(long, value_name = "TERM")]
    pub term: Option<String>,

    /// ssh client program to run
    #[arg(long, value_name = "PROGRAM")]
    pub ssh_program: Option<String>,

    /// Run the local shell instead of connecting anywhere
    #[arg(long, conflicts_with = "destination")]
    pub local: bool,

    /// Path to a YAML config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write logs to this file (nothing is logged otherwise)
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level or filter directive (RUST_LOG wins)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Load the config file (if any), apply overrides, validate.
    pub fn load_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };
        self.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides; flags win over file values.
    pub fn apply(&self, config: &mut ClientConfig) -> Result<()> {
        let connection = &mut config.connection;
        if let Some(port) = self.port {
            connection.port = port;
        }
        if let Some(login) = &self.login {
            connection.username = Some(login.clone());
        }
        if let Some(identity) = &self.identity {
            connection.key_file = Some(identity.clone());
        }
        if let Some(program) = &self.ssh_program {
            connection.ssh_program = program.clone();
        }
        if let Some(destination) = &self.destination {
            // a user in the destination wins over --login
            let parsed = Credentials::new(LOCAL_HOST)
                .with_destination(destination)?;
            connection.host = Some(parsed.host);
            if parsed.username.is_some() {
                connection.username = parsed.username;
            }
        }

        if let Some(term) = &self.term {
            config.terminal.term = term.clone();
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        Ok(())
    }

    /// Credentials for the connector.
    pub fn credentials(&self, config: &ClientConfig) -> Result<Credentials> {
        if self.local {
            return Ok(Credentials::new(LOCAL_HOST));
        }
        Credentials::from_settings(&config.connection)
    }

    /// Connector for the chosen mode.
    pub fn connector(&self, config: &ClientConfig) -> PtyConnector {
        if self.local {
            PtyConnector::local_shell()
        } else {
            PtyConnector::ssh(config.connection.ssh_program.clone())
        }
    }
}
