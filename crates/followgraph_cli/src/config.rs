//! Configuration file support for followgraph.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `FOLLOWGRAPH_`, nested keys joined
//!    with `__`, e.g. `FOLLOWGRAPH_DATABASE__URL`)
//! 3. Config file (~/.config/followgraph/config.toml or ./followgraph.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/followgraph/followgraph.db"  # optional, this is the default
//!
//! [api]
//! base_url = "https://api.twitter.com/"
//! timeout_secs = 30
//!
//! [pool]
//! capacity_sleep_secs = 900
//! capacity_retries = 3
//!
//! [sync]
//! batch_size = 1000
//! robust = false
//!
//! [[credentials]]
//! name = "main"
//! consumer_key = "..."
//! consumer_secret = "..."
//!
//! [[credentials]]
//! name = "user"
//! consumer_key = "..."
//! consumer_secret = "..."
//! token = "..."          # optional pair, signs requests in user context
//! token_secret = "..."
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use followgraph::remote::{
    Credential, DEFAULT_BASE_URL, DEFAULT_CAPACITY_RETRIES, DEFAULT_CAPACITY_SLEEP, PoolConfig,
};
use serde::Deserialize;

const APP_NAME: &str = "followgraph";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub pool: PoolSettings,
    /// Default sync options.
    pub sync: SyncConfig,
    /// API keys shared by the credential pool.
    pub credentials: Vec<Credential>,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    pub url: Option<String>,
}

/// Remote service endpoint.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Retry policy for transient service failures.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub capacity_sleep_secs: u64,
    pub capacity_retries: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            capacity_sleep_secs: DEFAULT_CAPACITY_SLEEP.as_secs(),
            capacity_retries: DEFAULT_CAPACITY_RETRIES,
        }
    }
}

/// Default sync options.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Split each fetched page into chunks of this many rows before staging.
    pub batch_size: Option<usize>,
    /// Drop duplicate rows one at a time instead of failing the batch.
    pub robust: bool,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/followgraph/config.toml)
    /// 3. Local config file (./followgraph.toml)
    /// 4. Environment variables with FOLLOWGRAPH_ prefix
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("followgraph.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./followgraph.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(env_source());
        builder.build()?.try_deserialize()
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter creates the SQLite file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("followgraph.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            capacity_sleep: Duration::from_secs(self.pool.capacity_sleep_secs),
            capacity_retries: self.pool.capacity_retries,
        }
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/followgraph` or `~/.local/state/followgraph`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("FOLLOWGRAPH")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
