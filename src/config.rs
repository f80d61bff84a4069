//! Cubby Configuration
//!
//! This module provides configuration structures for the Cubby
//! file storage backend.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main Cubby configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CubbyConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Object store configuration
    pub storage: StorageConfig,

    /// Token issuing configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// User record store configuration
    #[serde(default)]
    pub users: UsersConfig,

    /// Key allocation configuration
    #[serde(default)]
    pub namespace: NamespaceConfig,

    /// Folder advisor configuration
    #[serde(default)]
    pub advisor: AdvisorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,

    /// Origins allowed by the CORS layer
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum accepted upload size in megabytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

/// Object store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process store, contents are lost on restart
    Memory,
    /// S3-compatible service
    S3,
}

/// Object store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend type
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Bucket holding every user namespace
    pub bucket: String,

    /// Region name
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible services such as MinIO
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Use path-style bucket addressing
    #[serde(default)]
    pub path_style: bool,

    /// Access key (falls back to CUBBY_S3_ACCESS_KEY)
    #[serde(default)]
    pub access_key: Option<String>,

    /// Secret key (falls back to CUBBY_S3_SECRET_KEY)
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Keys requested per listing page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

/// Token issuing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for bearer tokens (falls back to CUBBY_JWT_SECRET)
    #[serde(default)]
    pub jwt_secret: String,

    /// Token lifetime in seconds
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

/// User record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersConfig {
    /// SQLite database path
    #[serde(default = "default_users_db")]
    pub database_path: PathBuf,
}

/// Key allocation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Maximum collision-resolution attempts per upload
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Folder advisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Base URL of the advisor service (disabled when unset)
    #[serde(default)]
    pub url: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default = "default_advisor_timeout_ms")]
    pub timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Minimum accepted length for the token secret
pub const MIN_JWT_SECRET_LEN: usize = 32;

const BYTES_PER_MB: usize = 1024 * 1024;

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_max_upload_mb() -> usize {
    100
}

fn default_backend() -> StorageBackend {
    StorageBackend::S3
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_page_size() -> usize {
    1000
}

fn default_token_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_users_db() -> PathBuf {
    PathBuf::from("/var/lib/cubby/users.db")
}

fn default_max_attempts() -> u32 {
    10_000
}

fn default_advisor_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: false,
            cors_origins: default_cors_origins(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            database_path: default_users_db(),
        }
    }
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_advisor_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl CubbyConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let mut config: CubbyConfig = toml::from_str(content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Fill secrets from the environment when the file leaves them out
    fn apply_env(&mut self) {
        if self.auth.jwt_secret.is_empty() {
            if let Ok(secret) = std::env::var("CUBBY_JWT_SECRET") {
                self.auth.jwt_secret = secret;
            }
        }
        if self.storage.access_key.is_none() {
            self.storage.access_key = std::env::var("CUBBY_S3_ACCESS_KEY").ok();
        }
        if self.storage.secret_key.is_none() {
            self.storage.secret_key = std::env::var("CUBBY_S3_SECRET_KEY").ok();
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.bind_address.is_empty() {
            return Err(crate::Error::Config("server.bind_address cannot be empty".into()));
        }

        if self.storage.bucket.is_empty() {
            return Err(crate::Error::Config("storage.bucket cannot be empty".into()));
        }

        if self.storage.page_size == 0 {
            return Err(crate::Error::Config("storage.page_size must be positive".into()));
        }

        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(crate::Error::Config(format!(
                "auth.jwt_secret must be at least {} characters",
                MIN_JWT_SECRET_LEN
            )));
        }

        if self.namespace.max_attempts == 0 {
            return Err(crate::Error::Config("namespace.max_attempts must be positive".into()));
        }

        if self.server.max_upload_mb == 0 {
            return Err(crate::Error::Config("server.max_upload_mb must be positive".into()));
        }

        if self.server.max_upload_mb.checked_mul(BYTES_PER_MB).is_none() {
            return Err(crate::Error::Config(format!(
                "server.max_upload_mb {} is too large",
                self.server.max_upload_mb
            )));
        }

        Ok(())
    }

    /// Get token lifetime as Duration
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.token_ttl_secs)
    }
}

impl ServerConfig {
    /// Maximum upload body size in bytes, clamped to `usize::MAX`
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(BYTES_PER_MB)
    }
}

impl AdvisorConfig {
    /// Get advisor timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
