//! Configuration module for the Abacus test client.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::SectionKind;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for the test client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub pagination: PaginationConfig,
    pub connectivity: ConnectivityConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the REST API, e.g. `https://api.abacus.example/v1`.
    pub base_url: String,
    /// Bearer token. `None` until the shell has logged the student in.
    pub access_token: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Timed-session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Countdown tick in milliseconds. One tick removes one second.
    pub tick_interval_ms: u64,
    /// Seconds between reconciliations with the server clock.
    pub reconcile_interval_secs: u64,
    /// Quiet period per question before an answer is sent (milliseconds).
    pub answer_debounce_ms: u64,
    /// How often settled answers are looked for (milliseconds).
    pub debounce_poll_ms: u64,
    /// How long the "time's up" notice is shown before submitting (seconds).
    pub time_up_notice_secs: u64,
    /// Delivery attempts per queued answer before it is dropped.
    pub max_answer_attempts: u8,
}

/// Questions per page, by section kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub addition_per_page: u32,
    pub mul_div_per_page: u32,
}

/// Reachability probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Seconds between reachability probes.
    pub probe_interval_secs: u64,
}

/// Durable store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite database file.
    pub database: PathBuf,
    /// Upper bound on pooled SQLite connections.
    pub max_connections: u32,
    /// Seconds a writer waits on a locked database before failing.
    pub busy_timeout_secs: u64,
    /// Use the write-ahead log instead of a rollback journal.
    pub write_ahead_log: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/abacus/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("abacus")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            access_token: None,
            request_timeout_secs: 15,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            reconcile_interval_secs: 30,
            answer_debounce_ms: 1000,
            debounce_poll_ms: 200,
            time_up_notice_secs: 4,
            max_answer_attempts: 3,
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            addition_per_page: 10,
            mul_div_per_page: 10,
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: 5,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("abacus")
                .join("sessions.db"),
            max_connections: 4,
            busy_timeout_secs: 5,
            write_ahead_log: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Duration helpers
// ---------------------------------------------------------------------------

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn answer_debounce(&self) -> Duration {
        Duration::from_millis(self.answer_debounce_ms)
    }

    pub fn debounce_poll(&self) -> Duration {
        Duration::from_millis(self.debounce_poll_ms)
    }

    pub fn time_up_notice(&self) -> Duration {
        Duration::from_secs(self.time_up_notice_secs)
    }
}

impl PaginationConfig {
    /// Page size for a section of the given kind
    pub fn per_page(&self, kind: SectionKind) -> u32 {
        match kind {
            SectionKind::Addition => self.addition_per_page,
            SectionKind::MulDiv => self.mul_div_per_page,
        }
    }
}

impl ConnectivityConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"session.tick_interval_ms"`.
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

/// Upper bound for `session.max_answer_attempts`.
const MAX_ANSWER_ATTEMPTS: u8 = 10;

fn must_be_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- api ---
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            errors.push(ValidationError {
                field: "api.base_url".into(),
                message: format!("must be an http(s) URL, got '{}'", self.api.base_url),
            });
        }
        if matches!(&self.api.access_token, Some(t) if t.trim().is_empty()) {
            errors.push(ValidationError {
                field: "api.access_token".into(),
                message: "must not be blank when set".into(),
            });
        }
        must_be_positive(
            &mut errors,
            "api.request_timeout_secs",
            self.api.request_timeout_secs,
        );

        // --- session ---
        must_be_positive(
            &mut errors,
            "session.tick_interval_ms",
            self.session.tick_interval_ms,
        );
        must_be_positive(
            &mut errors,
            "session.reconcile_interval_secs",
            self.session.reconcile_interval_secs,
        );
        must_be_positive(
            &mut errors,
            "session.debounce_poll_ms",
            self.session.debounce_poll_ms,
        );
        if self.session.max_answer_attempts == 0
            || self.session.max_answer_attempts > MAX_ANSWER_ATTEMPTS
        {
            errors.push(ValidationError {
                field: "session.max_answer_attempts".into(),
                message: format!("must be in range 1..={}", MAX_ANSWER_ATTEMPTS),
            });
        }

        // --- pagination ---
        must_be_positive(
            &mut errors,
            "pagination.addition_per_page",
            self.pagination.addition_per_page.into(),
        );
        must_be_positive(
            &mut errors,
            "pagination.mul_div_per_page",
            self.pagination.mul_div_per_page.into(),
        );

        // --- connectivity ---
        must_be_positive(
            &mut errors,
            "connectivity.probe_interval_secs",
            self.connectivity.probe_interval_secs,
        );

        // --- storage ---
        if self.storage.database.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.database".into(),
                message: "must not be empty".into(),
            });
        }
        must_be_positive(
            &mut errors,
            "storage.max_connections",
            self.storage.max_connections.into(),
        );

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

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use abacus_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .api_base_url("https://api.abacus.example/v1")
///     .session_reconcile_interval_secs(60)
///     .logging_level("debug")
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

    // --- api ---

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn api_access_token(mut self, token: impl Into<String>) -> Self {
        self.config.api.access_token = Some(token.into());
        self
    }

    pub fn api_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.api.request_timeout_secs = seconds;
        self
    }

    // --- session ---

    pub fn session_tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.session.tick_interval_ms = ms;
        self
    }

    pub fn session_reconcile_interval_secs(mut self, seconds: u64) -> Self {
        self.config.session.reconcile_interval_secs = seconds;
        self
    }

    pub fn session_answer_debounce_ms(mut self, ms: u64) -> Self {
        self.config.session.answer_debounce_ms = ms;
        self
    }

    pub fn session_debounce_poll_ms(mut self, ms: u64) -> Self {
        self.config.session.debounce_poll_ms = ms;
        self
    }

    pub fn session_time_up_notice_secs(mut self, seconds: u64) -> Self {
        self.config.session.time_up_notice_secs = seconds;
        self
    }

    pub fn session_max_answer_attempts(mut self, attempts: u8) -> Self {
        self.config.session.max_answer_attempts = attempts;
        self
    }

    // --- pagination ---

    pub fn pagination_addition_per_page(mut self, n: u32) -> Self {
        self.config.pagination.addition_per_page = n;
        self
    }

    pub fn pagination_mul_div_per_page(mut self, n: u32) -> Self {
        self.config.pagination.mul_div_per_page = n;
        self
    }

    // --- connectivity ---

    pub fn connectivity_probe_interval_secs(mut self, seconds: u64) -> Self {
        self.config.connectivity.probe_interval_secs = seconds;
        self
    }

    // --- storage ---

    pub fn storage_database(mut self, path: PathBuf) -> Self {
        self.config.storage.database = path;
        self
    }

    pub fn storage_max_connections(mut self, n: u32) -> Self {
        self.config.storage.max_connections = n;
        self
    }

    pub fn storage_busy_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.storage.busy_timeout_secs = seconds;
        self
    }

    pub fn storage_write_ahead_log(mut self, enabled: bool) -> Self {
        self.config.storage.write_ahead_log = enabled;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    /// Consume the builder and return the [`Config`] without validation.
    pub fn build(self) -> Config {
        self.config
    }

    /// Consume the builder, validate, and return the [`Config`] or errors.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
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
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.session.tick_interval(), Duration::from_secs(1));
        assert_eq!(cfg.session.reconcile_interval(), Duration::from_secs(30));
        assert_eq!(cfg.session.answer_debounce(), Duration::from_millis(1000));
        assert_eq!(cfg.session.time_up_notice(), Duration::from_secs(4));
        assert_eq!(cfg.session.max_answer_attempts, 3);
        assert_eq!(cfg.pagination.per_page(SectionKind::Addition), 10);
        assert_eq!(cfg.api.request_timeout(), Duration::from_secs(15));
        assert!(cfg.api.access_token.is_none());
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.storage.database.ends_with("abacus/sessions.db"));
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
api:
  base_url: "https://api.abacus.example/v1"
  access_token: "token-123"
  request_timeout_secs: 5
session:
  tick_interval_ms: 1000
  reconcile_interval_secs: 60
  answer_debounce_ms: 500
  debounce_poll_ms: 100
  time_up_notice_secs: 2
  max_answer_attempts: 5
pagination:
  addition_per_page: 8
  mul_div_per_page: 20
connectivity:
  probe_interval_secs: 10
storage:
  database: "/tmp/abacus/sessions.db"
  max_connections: 2
  write_ahead_log: false
logging:
  level: "debug"
  json: true
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.api.base_url, "https://api.abacus.example/v1");
        assert_eq!(cfg.api.access_token.as_deref(), Some("token-123"));
        assert_eq!(cfg.api.request_timeout_secs, 5);
        assert_eq!(cfg.session.reconcile_interval_secs, 60);
        assert_eq!(cfg.session.max_answer_attempts, 5);
        assert_eq!(cfg.pagination.per_page(SectionKind::MulDiv), 20);
        assert_eq!(cfg.connectivity.probe_interval_secs, 10);
        assert_eq!(cfg.storage.database, PathBuf::from("/tmp/abacus/sessions.db"));
        assert_eq!(cfg.storage.max_connections, 2);
        assert_eq!(cfg.storage.busy_timeout_secs, 5);
        assert!(!cfg.storage.write_ahead_log);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn load_partial_yaml_fills_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"pagination:\n  mul_div_per_page: 4\n").unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.pagination.mul_div_per_page, 4);
        assert_eq!(cfg.pagination.addition_per_page, 10);
        assert_eq!(cfg.session.tick_interval_ms, 1000);
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.session.reconcile_interval_secs, 30);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_bad_base_url() {
        let mut cfg = Config::default();
        cfg.api.base_url = "ftp://example".into();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "api.base_url"));
    }

    #[test]
    fn validate_catches_blank_token() {
        let mut cfg = Config::default();
        cfg.api.access_token = Some("   ".into());
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "api.access_token"));
    }

    #[test]
    fn validate_catches_zero_intervals() {
        let mut cfg = Config::default();
        cfg.session.tick_interval_ms = 0;
        cfg.session.reconcile_interval_secs = 0;
        cfg.session.debounce_poll_ms = 0;
        cfg.connectivity.probe_interval_secs = 0;
        cfg.api.request_timeout_secs = 0;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"session.tick_interval_ms".to_string()));
        assert!(fields.contains(&"session.reconcile_interval_secs".to_string()));
        assert!(fields.contains(&"session.debounce_poll_ms".to_string()));
        assert!(fields.contains(&"connectivity.probe_interval_secs".to_string()));
        assert!(fields.contains(&"api.request_timeout_secs".to_string()));
    }

    #[test]
    fn validate_allows_zero_debounce_and_notice() {
        let mut cfg = Config::default();
        cfg.session.answer_debounce_ms = 0;
        cfg.session.time_up_notice_secs = 0;
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn validate_catches_attempts_out_of_range() {
        for attempts in [0, 11] {
            let mut cfg = Config::default();
            cfg.session.max_answer_attempts = attempts;
            assert!(cfg
                .validate()
                .iter()
                .any(|e| e.field == "session.max_answer_attempts"));
        }
    }

    #[test]
    fn validate_catches_zero_page_sizes() {
        let mut cfg = Config::default();
        cfg.pagination.addition_per_page = 0;
        cfg.pagination.mul_div_per_page = 0;
        assert_eq!(cfg.validate().len(), 2);
    }

    #[test]
    fn validate_catches_zero_storage_connections() {
        let mut cfg = Config::default();
        cfg.storage.max_connections = 0;
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "storage.max_connections");
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".into();
        let errors = cfg.validate();
        assert!(errors
            .iter()
            .any(|e| e.field == "logging.level" && e.message.contains("verbose")));
    }

    #[test]
    fn validate_accepts_all_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let mut cfg = Config::default();
            cfg.logging.level = level.to_string();
            assert!(cfg.validate().is_empty(), "level {level} rejected");
        }
    }

    // -- Builder --

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .api_base_url("https://api.abacus.example")
            .api_access_token("abc")
            .session_answer_debounce_ms(0)
            .session_time_up_notice_secs(0)
            .session_max_answer_attempts(4)
            .pagination_addition_per_page(6)
            .storage_database(PathBuf::from("/tmp/x.db"))
            .logging_json(true)
            .build();
        assert_eq!(cfg.api.base_url, "https://api.abacus.example");
        assert_eq!(cfg.api.access_token.as_deref(), Some("abc"));
        assert_eq!(cfg.session.answer_debounce(), Duration::ZERO);
        assert_eq!(cfg.session.max_answer_attempts, 4);
        assert_eq!(cfg.pagination.addition_per_page, 6);
        assert_eq!(cfg.storage.database, PathBuf::from("/tmp/x.db"));
        assert!(cfg.logging.json);
    }

    #[test]
    fn builder_build_validated() {
        assert!(ConfigBuilder::new().build_validated().is_ok());
        let errors = ConfigBuilder::new()
            .logging_level("loud")
            .session_tick_interval_ms(0)
            .build_validated()
            .unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("abacus/config.yaml"));
    }
}
