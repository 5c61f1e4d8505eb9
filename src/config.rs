//! Configuration module for the chat relay.
//!
//! Supports command-line arguments, the `PORT` environment variable and a
//! TOML configuration file. CLI arguments take precedence over the
//! environment, which takes precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Command-line arguments for the relay
#[derive(Parser, Debug)]
#[command(name = "chat-relay")]
#[command(author = "chat-relay authors")]
#[command(version = "0.1.0")]
#[command(about = "A line-based TCP chat relay", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Maximum number of concurrent connections
    #[arg(short = 'm', long)]
    pub max_connections: Option<usize>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    pub port: Option<u16>,
    /// Maximum number of concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Number of worker threads
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            max_connections: default_max_connections(),
            workers: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_max_connections() -> usize {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub workers: Option<usize>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args, environment and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve configuration from already parsed arguments.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let port = cli
            .port
            .or(toml_config.server.port)
            .ok_or(ConfigError::MissingPort)?;

        let max_connections = cli
            .max_connections
            .unwrap_or(toml_config.server.max_connections);
        if max_connections == 0 || max_connections > Semaphore::MAX_PERMITS {
            return Err(ConfigError::InvalidMaxConnections(max_connections));
        }

        let workers = cli.workers.or(toml_config.server.workers);
        if workers == Some(0) {
            return Err(ConfigError::InvalidWorkers);
        }

        Ok(Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port,
            max_connections,
            workers,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }

    /// The `host:port` address the listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {err}", path = .0.display(), err = .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{path}': {err}", path = .0.display(), err = .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("missing PORT")]
    MissingPort,
    #[error("max_connections must be between 1 and {max}, got {0}", max = Semaphore::MAX_PERMITS)]
    InvalidMaxConnections(usize),
    #[error("workers must be at least 1")]
    InvalidWorkers,
}
