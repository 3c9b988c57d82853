//! Configuration management for Parley
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::cli::{Cli, Commands};
use crate::error::{ParleyError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration structure for Parley
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Completion service settings
    #[serde(default)]
    pub completion: CompletionConfig,
    /// Message store settings
    #[serde(default)]
    pub store: StoreConfig,
}

/// Runtime profile
///
/// Production refuses to start with missing credentials; development falls
/// back to in-process fakes so local work is never blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Local development and tests
    #[default]
    Development,
    /// Deployed service
    Production,
}

impl FromStr for Profile {
    type Err = ParleyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ParleyError::Config(format!(
                "Invalid profile: {}. Must be one of: development, production",
                other
            ))),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Runtime profile
    #[serde(default)]
    pub profile: Profile,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            profile: Profile::default(),
        }
    }
}

/// Completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API key; absent means the gateway is unconfigured
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model requested for completions
    #[serde(default = "default_model")]
    pub model: String,

    /// Connect timeout for upstream requests (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_model(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl CompletionConfig {
    /// The API key, if set to something other than blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Message store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store location: `http(s)://...`, `sqlite://<path>`, `sqlite::memory:`, or `memory`
    #[serde(default)]
    pub url: Option<String>,

    /// Access key for REST stores
    #[serde(default)]
    pub access_key: Option<String>,

    /// Session id recorded on appends and used to filter history
    #[serde(default)]
    pub session_id: Option<String>,

    /// User id recorded on appends and used to filter history
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Resolved store backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgREST-compatible HTTP store
    Rest {
        /// Project base URL
        url: url::Url,
        /// Access key sent as `apikey` and bearer token
        access_key: Option<String>,
    },
    /// SQLite database file
    Sqlite(PathBuf),
    /// SQLite database held in memory
    SqliteInMemory,
    /// Process-local vector, development only
    Memory,
}

impl StoreConfig {
    /// Resolve the configured URL into a backend
    ///
    /// Returns `Ok(None)` when no URL is configured.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is malformed or uses an unknown scheme
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::config::{StoreBackend, StoreConfig};
    ///
    /// let cfg = StoreConfig {
    ///     url: Some("sqlite::memory:".to_string()),
    ///     ..Default::default()
    /// };
    /// assert_eq!(cfg.backend().unwrap(), Some(StoreBackend::SqliteInMemory));
    /// ```
    pub fn backend(&self) -> Result<Option<StoreBackend>> {
        let Some(raw) = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(None);
        };

        if raw == "memory" {
            return Ok(Some(StoreBackend::Memory));
        }
        if raw == "sqlite::memory:" {
            return Ok(Some(StoreBackend::SqliteInMemory));
        }
        if let Some(path) = raw.strip_prefix("sqlite://") {
            let path = if path.is_empty() {
                default_sqlite_path()?
            } else {
                PathBuf::from(path)
            };
            return Ok(Some(StoreBackend::Sqlite(path)));
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            let url = url::Url::parse(raw)
                .map_err(|e| ParleyError::Config(format!("Invalid store url {}: {}", raw, e)))?;
            let access_key = self
                .access_key
                .clone()
                .filter(|k| !k.trim().is_empty());
            return Ok(Some(StoreBackend::Rest { url, access_key }));
        }

        Err(ParleyError::Config(format!(
            "Unsupported store url: {}. Use http(s)://, sqlite://<path>, sqlite::memory: or memory",
            raw
        ))
        .into())
    }
}

/// Default SQLite file in the user's data directory
fn default_sqlite_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("dev", "parley", "parley")
        .ok_or_else(|| ParleyError::Config("Could not determine data directory".into()))?;
    Ok(proj_dirs.data_dir().join("history.db"))
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli)?;

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ParleyError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ParleyError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(bind) = std::env::var("PARLEY_BIND") {
            self.server.bind = bind;
        }

        if let Ok(profile) = std::env::var("PARLEY_PROFILE") {
            match profile.parse() {
                Ok(p) => self.server.profile = p,
                Err(_) => tracing::warn!("Invalid PARLEY_PROFILE: {}", profile),
            }
        }

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            self.completion.api_key = Some(api_key);
        }

        if let Ok(api_base) = std::env::var("PARLEY_API_BASE") {
            self.completion.api_base = api_base;
        }

        if let Ok(model) = std::env::var("PARLEY_MODEL") {
            self.completion.model = model;
        }

        if let Ok(timeout) = std::env::var("PARLEY_CONNECT_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.completion.connect_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid PARLEY_CONNECT_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(store_url) = std::env::var("PARLEY_STORE_URL") {
            self.store.url = Some(store_url);
        }

        if let Ok(store_key) = std::env::var("PARLEY_STORE_KEY") {
            self.store.access_key = Some(store_key);
        }

        if let Ok(session_id) = std::env::var("PARLEY_SESSION_ID") {
            tracing::debug!(session_id = %session_id, "Env override: PARLEY_SESSION_ID");
            self.store.session_id = Some(session_id);
        }

        if let Ok(user_id) = std::env::var("PARLEY_USER_ID") {
            tracing::debug!(user_id = %user_id, "Env override: PARLEY_USER_ID");
            self.store.user_id = Some(user_id);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) -> Result<()> {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Commands::Serve { bind, profile } = &cli.command {
            if let Some(bind) = bind {
                self.server.bind = bind.clone();
            }
            if let Some(profile) = profile {
                self.server.profile = profile.parse()?;
            }
        }

        Ok(())
    }

    /// Validate the configuration for the given command
    ///
    /// Only `serve` needs the completion key and a real store, so the other
    /// commands get the structural checks alone.
    ///
    /// # Errors
    ///
    /// Returns error if any check that applies to `command` fails
    pub fn validate_for(&self, command: &Commands) -> Result<()> {
        match command {
            Commands::Serve { .. } => self.validate(),
            Commands::Chat { .. } | Commands::History { .. } => self.validate_structure(),
        }
    }

    /// Validate the configuration
    ///
    /// Structural checks always apply. In the production profile the API
    /// key and a real store are also required, so a misconfigured deployment
    /// fails at startup instead of serving degraded responses.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        self.validate_structure()?;

        if self.server.profile == Profile::Production {
            self.validate_production()?;
        }

        Ok(())
    }

    /// Checks that hold in every profile: parseable addresses and URLs,
    /// a model name and a non-zero timeout
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed or is out of range
    pub fn validate_structure(&self) -> Result<()> {
        self.server.bind.parse::<SocketAddr>().map_err(|e| {
            ParleyError::Config(format!("Invalid bind address {}: {}", self.server.bind, e))
        })?;

        if self.completion.model.trim().is_empty() {
            return Err(ParleyError::Config("completion.model cannot be empty".to_string()).into());
        }

        url::Url::parse(&self.completion.api_base).map_err(|e| {
            ParleyError::Config(format!(
                "Invalid completion.api_base {}: {}",
                self.completion.api_base, e
            ))
        })?;

        if self.completion.connect_timeout_seconds == 0 {
            return Err(ParleyError::Config(
                "completion.connect_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        self.store.backend()?;

        Ok(())
    }

    fn validate_production(&self) -> Result<()> {
        if self.completion.api_key().is_none() {
            return Err(
                ParleyError::Config("OPENAI_API_KEY must be set in production".to_string()).into(),
            );
        }

        match self.store.backend()? {
            None => Err(
                ParleyError::Config("PARLEY_STORE_URL must be set in production".to_string())
                    .into(),
            ),
            Some(StoreBackend::Memory) => Err(ParleyError::Config(
                "The in-memory store is not allowed in production".to_string(),
            )
            .into()),
            Some(StoreBackend::Rest {
                access_key: None, ..
            }) => Err(ParleyError::Config(
                "PARLEY_STORE_KEY must be set for a REST store in production".to_string(),
            )
            .into()),
            Some(_) => Ok(()),
        }
    }
}
