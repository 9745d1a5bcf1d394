//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::query::RetryPolicy;
use crate::store::StoreConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub posts: PostsConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("zine").to_string_lossy().to_string())
        .unwrap_or_else(|| "./zine_data".to_string())
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StoreSection {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(expand_home(&self.data_dir))
    }
}

/// Expand a leading `~` to the home directory
///
/// Paths without one, and `~user` forms, are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };

    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Where raw posts are read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// List the posts directory
    #[default]
    Directory,
    /// Read a manifest file from disk
    Manifest,
    /// GET the manifest and posts from `base_url`
    Http,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "directory" => Ok(SourceKind::Directory),
            "manifest" => Ok(SourceKind::Manifest),
            "http" => Ok(SourceKind::Http),
            other => Err(format!("unknown post source: {}", other)),
        }
    }
}

/// Post source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PostsConfig {
    #[serde(default)]
    pub source: SourceKind,

    #[serde(default = "default_posts_root")]
    pub root: String,

    #[serde(default = "default_posts_dir")]
    pub posts_dir: String,

    #[serde(default = "default_manifest")]
    pub manifest: String,

    pub base_url: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_posts_root() -> String {
    ".".to_string()
}

fn default_posts_dir() -> String {
    "txt".to_string()
}

fn default_manifest() -> String {
    "list.txt".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            root: default_posts_root(),
            posts_dir: default_posts_dir(),
            manifest: default_manifest(),
            base_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Read retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay() -> u64 {
    50
}

fn default_max_retry_delay() -> u64 {
    2000
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
        }
    }
}

impl QueryConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.retry_delay_ms),
            max_delay: Duration::from_millis(self.max_retry_delay_ms),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        // Try default config locations
        let config_paths = [
            dirs::config_dir().map(|p| p.join("zine").join("config.toml")),
            Some(PathBuf::from("/etc/zine/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `ZINE_*` overrides from any key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Store overrides
        if let Some(data_dir) = lookup("ZINE_DATA_DIR") {
            self.store.data_dir = data_dir;
        }

        // Post source overrides
        if let Some(root) = lookup("ZINE_POSTS_ROOT") {
            self.posts.root = root;
        }
        if let Some(source) = lookup("ZINE_POSTS_SOURCE") {
            match source.parse() {
                Ok(kind) => self.posts.source = kind,
                Err(e) => tracing::warn!("Ignoring ZINE_POSTS_SOURCE: {}", e),
            }
        }
        if let Some(url) = lookup("ZINE_POSTS_URL") {
            self.posts.base_url = Some(url);
        }

        // Logging overrides
        if let Some(level) = lookup("ZINE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("ZINE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    // quoted and escaped as a TOML string
    let data_dir = toml::Value::String(default_data_dir()).to_string();

    format!(
        r#"# Zine Configuration
#
# Environment variables override these settings:
# - ZINE_DATA_DIR
# - ZINE_POSTS_ROOT
# - ZINE_POSTS_SOURCE
# - ZINE_POSTS_URL
# - ZINE_LOG_LEVEL
# - ZINE_LOG_FORMAT

[store]
# Directory for the document store and its views
data_dir = {data_dir}

[posts]
# Where posts come from: directory, manifest or http
source = "directory"

# Folder holding the posts directory and the manifest
root = "."

# Posts directory, relative to root
posts_dir = "txt"

# Newline-delimited list of post filenames, relative to root
manifest = "list.txt"

# Base URL for the http source
# base_url = "http://localhost:8000"

# Request timeout in seconds (http source)
request_timeout_secs = 30

[query]
# Attempts per read while views are still being installed
max_attempts = 10

# First retry delay; doubles on each retry
retry_delay_ms = 50

# Upper bound on the retry delay
max_retry_delay_ms = 2000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    )
}
