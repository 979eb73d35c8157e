//! Server configuration
//!
//! The host builds a [`ServerConfig`] from its four parameters with
//! [`ServerConfig::new`]. The demo binary loads one from a TOML file with
//! environment overrides instead.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ServerError;

/// How the listing formatter renders the date column.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingTimestamps {
    /// Constant `Jan 01 12:00` for every entry.
    #[default]
    Placeholder,
    /// Real modification time of each entry.
    Modified,
}

/// Immutable configuration shared by every session.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Control port (0 picks an ephemeral port)
    pub port: u16,

    /// Single account accepted by USER/PASS
    pub username: String,
    pub password: String,

    /// Sandbox root, must already exist
    pub root_directory: PathBuf,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Text sent after `220` on connect
    #[serde(default = "default_banner")]
    pub banner: String,

    /// Upper bound on waiting for a client to connect to a PASV port
    #[serde(default = "default_passive_timeout_secs")]
    pub passive_timeout_secs: u64,

    /// Read buffer for STOR uploads
    #[serde(default = "default_transfer_buffer_size")]
    pub transfer_buffer_size: usize,

    #[serde(default)]
    pub listing_timestamps: ListingTimestamps,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_banner() -> String {
    "Simple FTP Server Ready".to_string()
}

fn default_passive_timeout_secs() -> u64 {
    30
}

fn default_transfer_buffer_size() -> usize {
    8192
}

impl ServerConfig {
    pub fn new(
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        root_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            port,
            username: username.into(),
            password: password.into(),
            root_directory: root_directory.into(),
            bind_address: default_bind_address(),
            banner: default_banner(),
            passive_timeout_secs: default_passive_timeout_secs(),
            transfer_buffer_size: default_transfer_buffer_size(),
            listing_timestamps: ListingTimestamps::default(),
        }
    }

    /// Load configuration from `path` (extension optional) with `MQFTP_*`
    /// environment overrides, e.g. `MQFTP_PORT=2121`.
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("MQFTP"))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.username.trim().is_empty() {
            return Err(ServerError::InvalidConfig("username cannot be empty".into()));
        }

        if self.root_directory.as_os_str().is_empty() {
            return Err(ServerError::InvalidConfig(
                "root_directory cannot be empty".into(),
            ));
        }

        if self.passive_timeout_secs == 0 {
            return Err(ServerError::InvalidConfig(
                "passive_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.transfer_buffer_size == 0 {
            return Err(ServerError::InvalidConfig(
                "transfer_buffer_size must be greater than 0".into(),
            ));
        }

        self.control_socket()?;
        Ok(())
    }

    /// Bind address and control port as a socket address
    pub fn control_socket(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|_| {
                ServerError::InvalidConfig(format!(
                    "invalid bind address {}:{}",
                    self.bind_address, self.port
                ))
            })
    }

    pub fn passive_timeout(&self) -> Duration {
        Duration::from_secs(self.passive_timeout_secs)
    }
}
