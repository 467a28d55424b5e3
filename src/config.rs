//! Configuration for dualcon.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.dualcon/config.toml`
//! - Console option defaults matching the firmware behaviour
//! - Pushing the loaded options into a [`Console`]
//!
//! # Configuration File
//!
//! ```toml
//! [console]
//! auto_cr = true
//! echo_local = true
//! echo_remote = false
//! cross_echo = true
//! remote_sync = false
//! # 0 disables; values below 3000 are raised to 3000
//! idle_timeout_ms = 30000
//! prompt = ":"
//!
//! [remote]
//! bind = "0.0.0.0"
//! port = 23
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::console::{Console, DEFAULT_PROMPT};
use crate::core::transport::{Channel, RemoteChannel};
use crate::core::watchdog::Clock;
use crate::error::{ConfigError, Result};

/// Default telnet port
pub const DEFAULT_PORT: u16 = 23;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Console options
    pub console: ConsoleConfig,
    /// Network listener settings
    pub remote: RemoteConfig,
}

/// Console echo/format and command options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub auto_cr: bool,
    pub echo_local: bool,
    pub echo_remote: bool,
    pub cross_echo: bool,
    pub remote_sync: bool,
    pub idle_timeout_ms: u64,
    pub prompt: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            auto_cr: true,
            echo_local: true,
            echo_remote: false,
            cross_echo: true,
            remote_sync: false,
            idle_timeout_ms: 0,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

/// Network listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Load configuration from the default file, falling back to defaults
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("{}", e),
                }
            }
        }
        Self::default()
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        let path = Self::get_config_path().ok_or(ConfigError::NoHome)?;
        self.save_to(&path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get config file path
    pub fn get_config_path() -> Option<PathBuf> {
        data_dir().map(|dir| dir.join("config.toml"))
    }

    /// Address the network listener binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.remote.bind, self.remote.port)
    }

    /// Push the console options into a console
    pub fn apply<L, R, C>(&self, console: &mut Console<L, R, C>)
    where
        L: Channel,
        R: RemoteChannel,
        C: Clock,
    {
        let c = &self.console;
        console.set_auto_cr(c.auto_cr);
        console.set_input_echo(c.echo_local, c.echo_remote);
        console.set_cross_echo(c.cross_echo);
        console.set_remote_sync(c.remote_sync);
        console.set_idle_timeout(c.idle_timeout_ms);
        console.set_prompt(&c.prompt);
    }
}

/// `~/.dualcon`, created on demand
pub fn data_dir() -> Option<PathBuf> {
    let dir = home_dir()?.join(".dualcon");
    if !dir.exists() {
        let _ = fs::create_dir_all(&dir);
    }
    Some(dir)
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
