//! Configuration module for the fixture server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values. With no arguments
//! at all the server behaves exactly like the reference fixture.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::codec::DEFAULT_MAX_FRAME_SIZE;

/// Command-line arguments for the fixture server
#[derive(Parser, Debug)]
#[command(name = "bsp-fixture-server")]
#[command(author = "bsp-fixture-server authors")]
#[command(version = "0.1.0")]
#[command(about = "A scripted build server protocol peer speaking over stdio", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Reject requests that arrive out of lifecycle order
    #[arg(long)]
    pub strict: bool,

    /// Give up if no input arrives within this many milliseconds (0 = wait forever)
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// Largest accepted frame body in bytes
    #[arg(long)]
    pub max_frame_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub fixture: FixtureConfig,
}

/// Session-related configuration
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Enforce lifecycle ordering
    #[serde(default)]
    pub strict: bool,
    /// Read timeout in milliseconds (0 = none)
    #[serde(default)]
    pub read_timeout_ms: u64,
    /// Largest accepted frame body in bytes
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            strict: false,
            read_timeout_ms: 0,
            max_frame_size: default_max_frame_size(),
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

/// Server identity reported by `build/initialize`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub display_name: String,
    pub version: String,
    pub root_uri: String,
    pub language_ids: Vec<String>,
    pub index_store_path: String,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            display_name: "test server".to_string(),
            version: "0.1".to_string(),
            root_uri: "blah".to_string(),
            language_ids: vec!["a".to_string(), "b".to_string()],
            index_store_path: "some/index/store/path".to_string(),
        }
    }
}

fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub strict: bool,
    pub read_timeout: Option<Duration>,
    pub max_frame_size: usize,
    pub log_level: String,
    pub fixture: FixtureConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config::merge(CliArgs::default_args(), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Config::merge(cli, toml_config))
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let read_timeout_ms = cli
            .read_timeout_ms
            .unwrap_or(toml_config.session.read_timeout_ms);

        Config {
            strict: cli.strict || toml_config.session.strict,
            read_timeout: (read_timeout_ms > 0).then(|| Duration::from_millis(read_timeout_ms)),
            max_frame_size: cli
                .max_frame_size
                .unwrap_or(toml_config.session.max_frame_size),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
            fixture: toml_config.fixture,
        }
    }
}

impl CliArgs {
    /// Arguments as if none were given on the command line.
    fn default_args() -> Self {
        CliArgs {
            config: None,
            strict: false,
            read_timeout_ms: None,
            max_frame_size: None,
            log_level: default_log_level(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}
