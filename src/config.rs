//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `PAGECOUNT_*` environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub counter: CounterConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Counter engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CounterConfig {
    /// Count in the local store instead of the remote API
    #[serde(default = "default_true")]
    pub use_local_counter: bool,

    /// Base URL of the remote counter API
    #[serde(default)]
    pub api_endpoint: Option<String>,

    /// Render the counter into the page
    #[serde(default = "default_true")]
    pub show_counter: bool,

    /// Minimum time between two counted visits to the same page
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Hostname reported to the remote API
    #[serde(default = "default_site")]
    pub site: String,

    /// Path-change poll interval, 0 disables polling
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Delay between a detected navigation and re-initialization
    #[serde(default = "default_navigation_delay")]
    pub navigation_delay_ms: u64,

    /// Remote request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    3000
}

fn default_site() -> String {
    "localhost".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_navigation_delay() -> u64 {
    100
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            use_local_counter: default_true(),
            api_endpoint: None,
            show_counter: default_true(),
            debounce_ms: default_debounce_ms(),
            site: default_site(),
            poll_interval_ms: default_poll_interval(),
            navigation_delay_ms: default_navigation_delay(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl CounterConfig {
    /// Remote counting is only attempted with an endpoint and local mode off
    pub fn uses_remote(&self) -> bool {
        !self.use_local_counter && self.api_endpoint.is_some()
    }
}

/// Client-side store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// JSON file standing in for the browser's local storage
    #[serde(default = "default_store_path")]
    pub store_path: String,
}

fn default_store_path() -> String {
    dirs::data_local_dir()
        .map(|p| {
            p.join("pagecount")
                .join("local_storage.json")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "./pagecount_data/local_storage.json".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

/// Counter API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Allowed CORS origins, `*` allows any
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Same client, same page: not counted again within this window
    #[serde(default = "default_debounce_minutes")]
    pub debounce_minutes: u64,

    /// How long hashed visit records are kept
    #[serde(default = "default_visit_retention")]
    pub visit_retention_hours: u64,

    /// Purge old visits whenever a page count is a multiple of this
    #[serde(default = "default_cleanup_every")]
    pub cleanup_every: u64,

    /// Salt mixed into client address hashes
    #[serde(default = "default_ip_salt")]
    pub ip_salt: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_database_path() -> String {
    "./counter.db".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_debounce_minutes() -> u64 {
    5
}

fn default_visit_retention() -> u64 {
    24
}

fn default_cleanup_every() -> u64 {
    100
}

fn default_ip_salt() -> String {
    "pagecount".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            allowed_origins: default_allowed_origins(),
            debounce_minutes: default_debounce_minutes(),
            visit_retention_hours: default_visit_retention(),
            cleanup_every: default_cleanup_every(),
            ip_salt: default_ip_salt(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
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

impl LoggingConfig {
    /// Install the global tracing subscriber.
    ///
    /// `RUST_LOG` wins over the configured level.
    pub fn init_tracing(&self) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("pagecount={},tower_http=info", self.level))
        });

        let registry = tracing_subscriber::registry().with(filter);
        let result = if self.format == "json" {
            registry.with(tracing_subscriber::fmt::layer().json()).try_init()
        } else {
            registry.with(tracing_subscriber::fmt::layer()).try_init()
        };

        if let Err(e) = result {
            eprintln!("Logging already initialized: {}", e);
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

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
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
        let config_paths = [
            dirs::config_dir().map(|p| p.join("pagecount").join("config.toml")),
            Some(PathBuf::from("/etc/pagecount/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any `PAGECOUNT_*` style lookup.
    ///
    /// The unprefixed `PORT`, `DATABASE_PATH` and `ALLOWED_ORIGINS` are
    /// honoured too, with the prefixed names taking precedence.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let either = |prefixed: &str, plain: &str| lookup(prefixed).or_else(|| lookup(plain));

        // Counter overrides
        if let Some(v) = lookup("PAGECOUNT_USE_LOCAL_COUNTER") {
            self.counter.use_local_counter = parse_flag(&v);
        }
        if let Some(v) = lookup("PAGECOUNT_API_ENDPOINT") {
            self.counter.api_endpoint = if v.trim().is_empty() { None } else { Some(v) };
        }
        if let Some(v) = lookup("PAGECOUNT_SHOW_COUNTER") {
            self.counter.show_counter = parse_flag(&v);
        }
        if let Some(ms) = lookup("PAGECOUNT_DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
            self.counter.debounce_ms = ms;
        }
        if let Some(site) = lookup("PAGECOUNT_SITE") {
            self.counter.site = site;
        }
        if let Some(ms) = lookup("PAGECOUNT_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.counter.poll_interval_ms = ms;
        }
        if let Some(ms) = lookup("PAGECOUNT_NAVIGATION_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.counter.navigation_delay_ms = ms;
        }
        if let Some(ms) = lookup("PAGECOUNT_REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.counter.request_timeout_ms = ms;
        }

        // Storage overrides
        if let Some(path) = lookup("PAGECOUNT_STORE_PATH") {
            self.storage.store_path = path;
        }

        // Server overrides
        if let Some(host) = lookup("PAGECOUNT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = either("PAGECOUNT_PORT", "PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(path) = either("PAGECOUNT_DATABASE_PATH", "DATABASE_PATH") {
            self.server.database_path = path;
        }
        if let Some(origins) = either("PAGECOUNT_ALLOWED_ORIGINS", "ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(minutes) = lookup("PAGECOUNT_DEBOUNCE_MINUTES").and_then(|v| v.parse().ok()) {
            self.server.debounce_minutes = minutes;
        }
        if let Some(salt) = lookup("PAGECOUNT_IP_SALT") {
            self.server.ip_salt = salt;
        }
        if let Some(hours) = lookup("PAGECOUNT_VISIT_RETENTION_HOURS").and_then(|v| v.parse().ok()) {
            self.server.visit_retention_hours = hours;
        }
        if let Some(every) = lookup("PAGECOUNT_CLEANUP_EVERY").and_then(|v| v.parse().ok()) {
            self.server.cleanup_every = every;
        }
        if let Some(secs) = lookup("PAGECOUNT_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.server.request_timeout_secs = secs;
        }

        // Logging overrides
        if let Some(level) = lookup("PAGECOUNT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("PAGECOUNT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value != "false" && value != "0" && value != "no"
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
    format!(
        r#"# Pagecount Configuration
#
# Environment variables override these settings:
# - PAGECOUNT_USE_LOCAL_COUNTER, PAGECOUNT_API_ENDPOINT, PAGECOUNT_SHOW_COUNTER
# - PAGECOUNT_DEBOUNCE_MS, PAGECOUNT_SITE, PAGECOUNT_POLL_INTERVAL_MS
# - PAGECOUNT_NAVIGATION_DELAY_MS, PAGECOUNT_REQUEST_TIMEOUT_MS
# - PAGECOUNT_STORE_PATH
# - PAGECOUNT_HOST, PAGECOUNT_PORT (or PORT)
# - PAGECOUNT_DATABASE_PATH (or DATABASE_PATH)
# - PAGECOUNT_ALLOWED_ORIGINS (or ALLOWED_ORIGINS, comma-separated)
# - PAGECOUNT_DEBOUNCE_MINUTES, PAGECOUNT_IP_SALT
# - PAGECOUNT_VISIT_RETENTION_HOURS, PAGECOUNT_CLEANUP_EVERY
# - PAGECOUNT_REQUEST_TIMEOUT_SECS
# - PAGECOUNT_LOG_LEVEL, PAGECOUNT_LOG_FORMAT

[counter]
# Count in local storage (no external dependencies)
use_local_counter = true

# Remote counter API, used when use_local_counter = false
# api_endpoint = "https://your-domain.com/counter-api"

# Show the counter on pages
show_counter = true

# Ignore repeat visits to the same page within this window (ms)
debounce_ms = 3000

# Hostname reported to the remote API
site = "localhost"

# Fallback path-change polling interval (ms), 0 disables
poll_interval_ms = 1000

# Delay before re-counting after navigation (ms)
navigation_delay_ms = 100

# Remote request timeout (ms)
request_timeout_ms = 5000

[storage]
# JSON file holding local counts
store_path = '{store_path}'

[server]
# Counter API host
host = "0.0.0.0"

# Counter API port
port = 5000

# SQLite database
database_path = "./counter.db"

# Allowed CORS origins ("*" for any)
allowed_origins = ["*"]

# Don't count the same client for the same page within this window
debounce_minutes = 5

# Hours to keep hashed visit records
visit_retention_hours = 24

# Purge old visit records every N counts
cleanup_every = 100

# Salt for client address hashes
ip_salt = "pagecount"

# Request timeout in seconds
request_timeout_secs = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#,
        store_path = default_store_path()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_counter_defaults() {
        let config = CounterConfig::default();
        assert!(config.use_local_counter);
        assert!(config.api_endpoint.is_none());
        assert!(config.show_counter);
        assert_eq!(config.debounce_ms, 3000);
        assert!(!config.uses_remote());
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.counter.debounce_ms, 3000);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.allowed_origins, vec!["*"]);
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.storage.store_path, default_store_path());
        assert!(!config.storage.store_path.starts_with('~'));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [counter]
            use_local_counter = false
            api_endpoint = "https://counter.example.org/api"
            "#,
        )
        .unwrap();

        assert!(config.counter.uses_remote());
        assert!(config.counter.show_counter);
        assert_eq!(config.server.debounce_minutes, 5);
    }

    #[test]
    fn test_invalid_config_is_parse_error() {
        let err = Config::parse("[counter]\ndebounce_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/pagecount.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PAGECOUNT_USE_LOCAL_COUNTER", "false"),
            ("PAGECOUNT_API_ENDPOINT", "http://localhost:5000"),
            ("PAGECOUNT_DEBOUNCE_MS", "250"),
            ("PORT", "8088"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("PAGECOUNT_DATABASE_PATH", "/tmp/c.db"),
            ("DATABASE_PATH", "/ignored.db"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert!(!config.counter.use_local_counter);
        assert_eq!(config.counter.api_endpoint.as_deref(), Some("http://localhost:5000"));
        assert_eq!(config.counter.debounce_ms, 250);
        assert_eq!(config.server.port, 8088);
        assert_eq!(
            config.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.server.database_path, "/tmp/c.db");
    }

    #[test]
    fn test_timing_and_retention_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PAGECOUNT_NAVIGATION_DELAY_MS", "0"),
            ("PAGECOUNT_REQUEST_TIMEOUT_MS", "750"),
            ("PAGECOUNT_VISIT_RETENTION_HOURS", "6"),
            ("PAGECOUNT_CLEANUP_EVERY", "10"),
            ("PAGECOUNT_REQUEST_TIMEOUT_SECS", "5"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.counter.navigation_delay_ms, 0);
        assert_eq!(config.counter.request_timeout_ms, 750);
        assert_eq!(config.server.visit_retention_hours, 6);
        assert_eq!(config.server.cleanup_every, 10);
        assert_eq!(config.server.request_timeout_secs, 5);
    }

    #[test]
    fn test_unparseable_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "PAGECOUNT_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 5000);
    }
}
