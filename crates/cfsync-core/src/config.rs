//! Configuration module for cfsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for cfsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub workers: WorkersConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
    pub daemon: DaemonConfig,
}

/// Identity service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// URL of the token endpoint.
    pub endpoint: String,
    pub username: String,
    pub api_key: String,
    /// Preferred endpoint region; the first catalog endpoint is used when unset or unmatched.
    pub region: Option<String>,
    /// Use the provider-internal storage URL instead of the public one.
    pub internal_url: bool,
}

/// Remote container settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Name of the container the watched root is mirrored into.
    pub container: String,
    /// Records requested per listing page; a full page means another page follows.
    pub page_size: usize,
}

/// Local tree settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory mirrored into the container.
    pub root: PathBuf,
    /// File of regular expressions; matching paths are never synchronized.
    pub exclusion_file: Option<PathBuf>,
    /// Wait (ms) after a directory appears before scanning it.
    pub settle_delay_ms: u64,
    /// Seconds a move source may wait for its destination before being discarded.
    pub move_expiry_secs: u64,
}

/// Worker pool sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub upload: usize,
    pub delete: usize,
    pub copy: usize,
}

/// Retry policy shared by listing, workers and reauthentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    /// Sleep (ms) between failed attempts.
    pub backoff_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Optional log file; stderr is used when unset.
    pub file: Option<PathBuf>,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// PID file guarding against a second instance.
    pub pid_file: PathBuf,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/cfsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cfsync")
            .join("config.yaml")
    }

    /// Total number of workers across the three pools.
    pub fn total_workers(&self) -> usize {
        self.workers.upload + self.workers.delete + self.workers.copy
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl SyncConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn move_expiry(&self) -> Duration {
        Duration::from_secs(self.move_expiry_secs)
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

/// Default Cloud Files identity endpoint.
pub const DEFAULT_AUTH_ENDPOINT: &str = "https://identity.api.rackspacecloud.com/v2.0/tokens";

/// Largest page a Swift listing returns.
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Upper bound for a single worker pool.
pub const MAX_WORKERS_PER_POOL: usize = 64;

/// Above this many workers in total the daemon warns at startup.
pub const WORKER_WARN_THRESHOLD: usize = 100;

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_AUTH_ENDPOINT.to_string(),
            username: String::new(),
            api_key: String::new(),
            region: None,
            internal_url: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            container: String::new(),
            page_size: MAX_PAGE_SIZE,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            exclusion_file: None,
            settle_delay_ms: 1000,
            move_expiry_secs: 300,
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            upload: 5,
            delete: 5,
            copy: 5,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pid_file: dirs::runtime_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("cfsyncd.pid"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"storage.container"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut require = |field: &str, value: &str| {
            if value.trim().is_empty() {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must be set".into(),
                });
            }
        };

        // --- auth / storage ---
        require("auth.endpoint", &self.auth.endpoint);
        require("auth.username", &self.auth.username);
        require("auth.api_key", &self.auth.api_key);
        require("storage.container", &self.storage.container);

        if self.storage.page_size == 0 || self.storage.page_size > MAX_PAGE_SIZE {
            errors.push(ValidationError {
                field: "storage.page_size".into(),
                message: format!("must be in range 1..={MAX_PAGE_SIZE}"),
            });
        }

        // --- sync ---
        if self.sync.root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: "must be set".into(),
            });
        } else if !self.sync.root.is_dir() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: format!("not a directory: {}", self.sync.root.display()),
            });
        }
        if let Some(file) = &self.sync.exclusion_file {
            if !file.is_file() {
                errors.push(ValidationError {
                    field: "sync.exclusion_file".into(),
                    message: format!("file does not exist: {}", file.display()),
                });
            }
        }

        // --- workers ---
        for (field, n) in [
            ("workers.upload", self.workers.upload),
            ("workers.delete", self.workers.delete),
            ("workers.copy", self.workers.copy),
        ] {
            if n == 0 || n > MAX_WORKERS_PER_POOL {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("must be in range 1..={MAX_WORKERS_PER_POOL}"),
                });
            }
        }

        // --- retry ---
        if self.retry.max_attempts == 0 {
            errors.push(ValidationError {
                field: "retry.max_attempts".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- daemon ---
        if self.daemon.pid_file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "daemon.pid_file".into(),
                message: "must be set".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides. The
/// daemon layers its command-line flags over the loaded file with it.
///
/// # Example
///
/// ```rust,no_run
/// use cfsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/srv/www"))
///     .storage_container("www-backup")
///     .workers_all(8)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Create a builder starting from an existing configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- auth ---

    pub fn auth_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.auth.endpoint = endpoint.into();
        self
    }

    pub fn auth_username(mut self, username: impl Into<String>) -> Self {
        self.config.auth.username = username.into();
        self
    }

    pub fn auth_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.auth.api_key = api_key.into();
        self
    }

    pub fn auth_region(mut self, region: impl Into<String>) -> Self {
        self.config.auth.region = Some(region.into());
        self
    }

    pub fn auth_internal_url(mut self, internal: bool) -> Self {
        self.config.auth.internal_url = internal;
        self
    }

    // --- storage ---

    pub fn storage_container(mut self, container: impl Into<String>) -> Self {
        self.config.storage.container = container.into();
        self
    }

    pub fn storage_page_size(mut self, n: usize) -> Self {
        self.config.storage.page_size = n;
        self
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn sync_exclusion_file(mut self, file: PathBuf) -> Self {
        self.config.sync.exclusion_file = Some(file);
        self
    }

    pub fn sync_settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.sync.settle_delay_ms = ms;
        self
    }

    pub fn sync_move_expiry_secs(mut self, secs: u64) -> Self {
        self.config.sync.move_expiry_secs = secs;
        self
    }

    // --- workers ---

    /// Set the same size for all three pools.
    pub fn workers_all(mut self, n: usize) -> Self {
        self.config.workers = WorkersConfig {
            upload: n,
            delete: n,
            copy: n,
        };
        self
    }

    pub fn workers_upload(mut self, n: usize) -> Self {
        self.config.workers.upload = n;
        self
    }

    pub fn workers_delete(mut self, n: usize) -> Self {
        self.config.workers.delete = n;
        self
    }

    pub fn workers_copy(mut self, n: usize) -> Self {
        self.config.workers.copy = n;
        self
    }

    // --- retry ---

    pub fn retry_max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry.backoff_ms = ms;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = Some(file);
        self
    }

    // --- daemon ---

    pub fn daemon_pid_file(mut self, file: PathBuf) -> Self {
        self.config.daemon.pid_file = file;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
