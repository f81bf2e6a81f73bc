//! Healthbridge settings
//!
//! One YAML file with six sections: `platform` picks the health store,
//! `sync` bounds how often and for whom the background task runs,
//! `timeouts` holds the per-call budgets for native calls, and `storage`,
//! `logging` and `export` configure the daemon. Every field has a default,
//! so an empty or missing file is a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Platform;

/// Shortest interval the background sync may run at, in seconds.
pub const MIN_SYNC_INTERVAL_SECS: u64 = 15 * 60;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Everything the daemon and the sync stack read at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub platform: PlatformConfig,
    pub sync: SyncConfig,
    pub timeouts: TimeoutConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub export: ExportConfig,
}

/// Platform detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// `auto` to detect from the build target, or `ios`, `android`, `other`.
    pub target: String,
}

/// Background synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum seconds between two syncs for the same user.
    pub min_interval_secs: u64,
    /// Name under which the periodic task is registered with the host.
    pub task_name: String,
    /// User to sync when the identity provider has no session (daemon use).
    pub user_id: Option<String>,
    /// Consecutive unsupported step reads before the sync reports a failure.
    pub read_failure_threshold: u32,
}

/// Deadlines for calls into native health libraries, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub availability_ms: u64,
    /// Permission prompts may involve the user, hence the larger budget.
    pub permission_ms: u64,
    pub read_ms: u64,
    pub write_ms: u64,
}

/// Local metrics store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
}

/// Daemon log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter level; `RUST_LOG` overrides it.
    pub level: String,
}

/// Health data export consumed by the generic bridge in the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// JSON file holding exported samples; nutrition writes are appended to it.
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Parses the YAML file at `path`; absent sections take their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing or malformed file yields the
    /// built-in settings (15 minute interval, `auto` platform).
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// `healthbridge/config.yaml` under the user's config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("healthbridge")
            .join("config.yaml")
    }

    /// Platform to run as, honouring an explicit override.
    ///
    /// Unknown values fall back to detection; `validate` reports them.
    pub fn resolve_platform(&self) -> Platform {
        match self.platform.target.as_str() {
            "auto" => Platform::current(),
            other => other.parse().unwrap_or_else(|_| Platform::current()),
        }
    }
}

impl SyncConfig {
    /// Minimum interval as a chrono duration, for comparisons against timestamps.
    pub fn min_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_interval_secs as i64)
    }
}

impl TimeoutConfig {
    pub fn availability(&self) -> Duration {
        Duration::from_millis(self.availability_ms)
    }

    pub fn permission(&self) -> Duration {
        Duration::from_millis(self.permission_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            target: "auto".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: MIN_SYNC_INTERVAL_SECS,
            task_name: "healthbridge-background-sync".to_string(),
            user_id: None,
            read_failure_threshold: 3,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            availability_ms: 8_000,
            permission_ms: 45_000,
            read_ms: 5_000,
            write_ms: 5_000,
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("healthbridge")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: data_dir().join("healthbridge.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("health-export.json"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// One rejected setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.min_interval_secs"`.
    pub field: String,
    /// What the value has to satisfy.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "setting `{}` {}", self.field, self.message)
    }
}

/// Accepted `logging.level` values.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `platform.target`.
const VALID_PLATFORM_TARGETS: &[&str] = &["auto", "ios", "android", "other"];

impl Config {
    /// Checks every section and reports each rejected setting.
    ///
    /// The sync interval may not drop below [`MIN_SYNC_INTERVAL_SECS`] and no
    /// call budget may be zero. An empty vector means the settings are usable.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- platform ---
        if !VALID_PLATFORM_TARGETS.contains(&self.platform.target.as_str()) {
            errors.push(ValidationError {
                field: "platform.target".into(),
                message: format!(
                    "has unknown platform '{}', use one of {}",
                    self.platform.target,
                    VALID_PLATFORM_TARGETS.join(", ")
                ),
            });
        }

        // --- sync ---
        if self.sync.min_interval_secs < MIN_SYNC_INTERVAL_SECS {
            errors.push(ValidationError {
                field: "sync.min_interval_secs".into(),
                message: format!("is below the {MIN_SYNC_INTERVAL_SECS}s floor"),
            });
        }
        if self.sync.task_name.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.task_name".into(),
                message: "is blank".into(),
            });
        }
        if self.sync.read_failure_threshold == 0 {
            errors.push(ValidationError {
                field: "sync.read_failure_threshold".into(),
                message: "is zero".into(),
            });
        }

        // --- timeouts ---
        for (field, value) in [
            ("timeouts.availability_ms", self.timeouts.availability_ms),
            ("timeouts.permission_ms", self.timeouts.permission_ms),
            ("timeouts.read_ms", self.timeouts.read_ms),
            ("timeouts.write_ms", self.timeouts.write_ms),
        ] {
            if value == 0 {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "is a zero budget".into(),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "has unknown level '{}', use one of {}",
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

/// Assembles a [`Config`] in code, mainly for tests and embedding hosts.
///
/// ```
/// use healthbridge_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .platform_target("ios")
///     .sync_min_interval_secs(1800)
///     .timeouts_read_ms(2_000)
///     .build();
/// assert_eq!(config.sync.min_interval_secs, 1800);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts from the built-in settings.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn platform_target(mut self, target: impl Into<String>) -> Self {
        self.config.platform.target = target.into();
        self
    }

    pub fn sync_min_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.min_interval_secs = seconds;
        self
    }

    pub fn sync_task_name(mut self, name: impl Into<String>) -> Self {
        self.config.sync.task_name = name.into();
        self
    }

    pub fn sync_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.config.sync.user_id = Some(user_id.into());
        self
    }

    pub fn sync_read_failure_threshold(mut self, n: u32) -> Self {
        self.config.sync.read_failure_threshold = n;
        self
    }

    pub fn timeouts_availability_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.availability_ms = ms;
        self
    }

    pub fn timeouts_permission_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.permission_ms = ms;
        self
    }

    pub fn timeouts_read_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.read_ms = ms;
        self
    }

    pub fn timeouts_write_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.write_ms = ms;
        self
    }

    pub fn storage_database_path(mut self, path: PathBuf) -> Self {
        self.config.storage.database_path = path;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn export_path(mut self, path: PathBuf) -> Self {
        self.config.export.path = path;
        self
    }

    /// Returns the settings as they are, even if some would be rejected.
    pub fn build(self) -> Config {
        self.config
    }

    /// Returns the settings only if [`Config::validate`] accepts them.
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
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_budgets_and_interval() {
        let cfg = Config::default();
        assert_eq!(cfg.platform.target, "auto");
        assert_eq!(cfg.sync.min_interval_secs, 900);
        assert_eq!(cfg.sync.read_failure_threshold, 3);
        assert_eq!(cfg.timeouts.availability(), Duration::from_secs(8));
        assert_eq!(cfg.timeouts.permission(), Duration::from_secs(45));
        assert_eq!(cfg.timeouts.read(), Duration::from_secs(5));
        assert_eq!(cfg.timeouts.write(), Duration::from_secs(5));
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg
            .storage
            .database_path
            .to_string_lossy()
            .ends_with("healthbridge.db"));
    }

    #[test]
    fn test_builtin_settings_are_accepted() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
platform:
  target: android
sync:
  min_interval_secs: 3600
  task_name: nightly-health
  user_id: user-42
timeouts:
  read_ms: 2500
logging:
  level: debug
"#;
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(yaml.as_bytes()).unwrap();

        let cfg = Config::load(tmp.path()).unwrap();
        assert_eq!(cfg.resolve_platform(), Platform::Android);
        assert_eq!(cfg.sync.min_interval_secs, 3600);
        assert_eq!(cfg.sync.task_name, "nightly-health");
        assert_eq!(cfg.sync.user_id.as_deref(), Some("user-42"));
        assert_eq!(cfg.timeouts.read_ms, 2500);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.timeouts.permission_ms, 45_000);
        assert_eq!(cfg.sync.read_failure_threshold, 3);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn test_missing_file_uses_builtin_settings() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/healthbridge.yaml"));
        assert_eq!(cfg.sync.min_interval_secs, MIN_SYNC_INTERVAL_SECS);
    }

    #[test]
    fn test_interval_floor_and_zero_budgets_rejected() {
        let cfg = ConfigBuilder::new()
            .sync_min_interval_secs(60)
            .timeouts_read_ms(0)
            .timeouts_write_ms(0)
            .build();
        let errors = cfg.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"sync.min_interval_secs"));
        assert!(fields.contains(&"timeouts.read_ms"));
        assert!(fields.contains(&"timeouts.write_ms"));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_unknown_platform_and_level_rejected() {
        let result = ConfigBuilder::new()
            .platform_target("symbian")
            .logging_level("verbose")
            .build_validated();
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0].to_string(),
            "setting `platform.target` has unknown platform 'symbian', use one of auto, ios, android, other"
        );
    }

    #[test]
    fn test_platform_override_wins_over_detection() {
        let cfg = ConfigBuilder::new().platform_target("ios").build();
        assert_eq!(cfg.resolve_platform(), Platform::Ios);

        let cfg = ConfigBuilder::new().platform_target("auto").build();
        assert_eq!(cfg.resolve_platform(), Platform::current());
    }

    #[test]
    fn test_interval_as_chrono_duration() {
        let cfg = Config::default();
        assert_eq!(cfg.sync.min_interval(), chrono::Duration::minutes(15));
    }
}
