//! Configuration for the bucketdav WebDAV server

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Object store backing the WebDAV namespace
    #[serde(default)]
    pub backend: BackendConfig,

    /// Basic-auth username. When both username and password are set, every
    /// request except OPTIONS must authenticate. When unset, open access.
    #[serde(default)]
    pub username: Option<String>,

    /// Basic-auth password. Must be set together with username.
    #[serde(default)]
    pub password: Option<String>,

    /// Maximum request body size in bytes (PUT uploads)
    #[serde(default = "default_max_object_size")]
    pub max_object_size: u64,

    /// Cap on in-flight copy sub-operations during recursive COPY/MOVE.
    /// Unset means unbounded.
    #[serde(default)]
    pub copy_concurrency: Option<usize>,

    /// Log level filter string.
    /// Set via config file or BDAV_LOG_LEVEL env var. Overridden by RUST_LOG.
    /// Default: "bucketdav=debug,tower_http=debug"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Object store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Ephemeral in-process store, for tests and demos
    Memory {
        /// Listing page size
        #[serde(default = "default_page_size")]
        page_size: usize,
    },

    /// Filesystem store for local storage/development
    Filesystem {
        /// Directory for data storage
        path: PathBuf,
    },

    /// S3-compatible bucket for production use
    S3 {
        /// Bucket holding the whole namespace
        bucket: String,

        /// S3 endpoint URL (for MinIO, R2 or other S3-compatible services)
        /// If not specified, uses AWS default endpoint
        #[serde(default)]
        endpoint: Option<String>,

        /// AWS region
        #[serde(default = "default_region")]
        region: String,

        /// Use path-style URLs (required for MinIO)
        #[serde(default = "default_force_path_style")]
        force_path_style: bool,

        #[serde(default)]
        access_key_id: Option<String>,

        #[serde(default)]
        secret_access_key: Option<String>,
    },
}

// Default value functions for serde
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_object_size() -> u64 {
    100 * 1024 * 1024 // 100MB
}

fn default_page_size() -> usize {
    crate::storage::MemoryStore::DEFAULT_PAGE_SIZE
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_force_path_style() -> bool {
    true
}

fn default_log_level() -> String {
    "bucketdav=debug,tower_http=debug".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Filesystem {
            path: PathBuf::from("./data"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            backend: BackendConfig::default(),
            username: None,
            password: None,
            max_object_size: default_max_object_size(),
            copy_concurrency: None,
            log_level: default_log_level(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_parse("BDAV_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(bucket) = std::env::var("BDAV_S3_BUCKET") {
            config.backend = BackendConfig::S3 {
                bucket,
                endpoint: std::env::var("BDAV_S3_ENDPOINT").ok(),
                region: std::env::var("BDAV_S3_REGION").unwrap_or_else(|_| default_region()),
                force_path_style: std::env::var("BDAV_S3_PATH_STYLE")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(true),
                access_key_id: std::env::var("BDAV_S3_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("BDAV_S3_SECRET_ACCESS_KEY").ok(),
            };
        } else if let Ok(dir) = std::env::var("BDAV_DATA_DIR") {
            config.backend = BackendConfig::Filesystem {
                path: PathBuf::from(dir),
            };
        } else if std::env::var("BDAV_MEMORY").is_ok() {
            config.backend = BackendConfig::Memory {
                page_size: default_page_size(),
            };
        }

        config.username = std::env::var("BDAV_USERNAME").ok();
        config.password = std::env::var("BDAV_PASSWORD").ok();

        if let Some(size) = env_parse("BDAV_MAX_OBJECT_SIZE") {
            config.max_object_size = size;
        }
        config.copy_concurrency = env_parse("BDAV_COPY_CONCURRENCY");

        if let Ok(level) = std::env::var("BDAV_LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Load configuration from file if it exists, otherwise from environment
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("BDAV_CONFIG") {
            if let Ok(config) = Self::from_file(&path) {
                return config;
            }
        }

        for path in &["bucketdav.toml", "/etc/bucketdav/config.toml"] {
            if std::path::Path::new(path).exists() {
                if let Ok(config) = Self::from_file(path) {
                    return config;
                }
            }
        }

        Self::from_env()
    }

    /// Returns true if Basic authentication is enabled (both credentials are set).
    pub fn auth_enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
