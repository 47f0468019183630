//! Configuration management for Sauti services.
//!
//! The signal service reads a single configuration file at `~/.sauti/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (SAUTI_* prefix, plus the webhook URLs)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `SAUTI_BIND` → network.bind
//! - `SAUTI_PORT` → network.port
//! - `SAUTI_LOG_LEVEL` → observability.log_level
//! - `SAUTI_LOG_FORMAT` → observability.log_format
//! - `SAUTI_DB_PATH` → storage.db_path
//! - `SLACK_WEBHOOK_URL` → notifications.slack_webhook_url
//! - `ALERT_WEBHOOK_URL` → notifications.alert_webhook_url
//!
//! The two webhook URLs can additionally be overridden at runtime through
//! [`crate::runtime::RuntimeConfigStore`] without a restart.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config_loader::load_modular_config;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new()
        .map_or_else(
            || PathBuf::from(".sauti"),
            |dirs| dirs.home_dir().join(".sauti"),
        )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address. Default "127.0.0.1" (local only).
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listener port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4480
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "json" or "pretty"
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Storage
// ============================================================================

/// SQLite storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database path. Defaults to `~/.sauti/sauti.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Runtime override file. Defaults to `~/.sauti/runtime.json`.
    #[serde(default)]
    pub runtime_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Effective database path.
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| config_dir().join("sauti.db"))
    }

    /// Effective runtime override file path.
    pub fn runtime_path(&self) -> PathBuf {
        self.runtime_path
            .clone()
            .unwrap_or_else(|| config_dir().join("runtime.json"))
    }
}

// ============================================================================
// Detection
// ============================================================================

/// Crisis detection cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Run the detection cycle on a schedule
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lookback window of the scheduled cycle, in hours
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,

    /// Minimum number of feedback items before any signal is computed
    #[serde(default = "default_min_volume")]
    pub min_volume: usize,

    /// TTL for cached signal lists and dashboards
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Group size at which a repeated complaint becomes a trending issue
    #[serde(default = "default_trending_threshold")]
    pub trending_threshold: usize,

    /// Cron expression (with seconds) for the scheduled cycle
    #[serde(default = "default_detection_schedule")]
    pub schedule: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_hours: default_window_hours(),
            min_volume: default_min_volume(),
            cache_ttl_secs: default_cache_ttl_secs(),
            trending_threshold: default_trending_threshold(),
            schedule: default_detection_schedule(),
        }
    }
}

fn default_window_hours() -> u32 {
    24
}

fn default_min_volume() -> usize {
    10
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_trending_threshold() -> usize {
    5
}

fn default_detection_schedule() -> String {
    "0 */5 * * * *".into()
}

// ============================================================================
// Alerts
// ============================================================================

/// How new red flags are checked against recently stored ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedFlagDedupMode {
    /// Any red-flag alert inside the window suppresses new ones, regardless of content.
    #[default]
    TypeWindow,
    /// Only an alert with the same keyword, location and opening sentence suppresses.
    ContentKey,
}

/// Alert persistence and dedup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Drafts whose type and title were stored within this window are skipped
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,

    /// Red flag suppression policy
    #[serde(default)]
    pub red_flag_dedup: RedFlagDedupMode,

    /// Red flag suppression window, in hours
    #[serde(default = "default_red_flag_window_hours")]
    pub red_flag_window_hours: u32,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: default_dedup_window_secs(),
            red_flag_dedup: RedFlagDedupMode::default(),
            red_flag_window_hours: default_red_flag_window_hours(),
        }
    }
}

fn default_dedup_window_secs() -> u64 {
    300
}

fn default_red_flag_window_hours() -> u32 {
    24
}

// ============================================================================
// Notifications
// ============================================================================

/// A government stakeholder that receives crisis briefings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeholderConfig {
    pub id: String,
    pub name: String,
    /// Lowest severity routed to this stakeholder: low, medium, high, critical
    pub min_severity: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl StakeholderConfig {
    fn new(id: &str, name: &str, min_severity: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            min_severity: min_severity.into(),
            webhook_url: None,
            email: None,
        }
    }
}

fn default_stakeholders() -> Vec<StakeholderConfig> {
    vec![
        StakeholderConfig::new("president_office", "Office of the President", "critical"),
        StakeholderConfig::new("ministry_ict", "Ministry of ICT", "high"),
        StakeholderConfig::new("parliament", "Parliament", "high"),
        StakeholderConfig::new("county_governors", "Council of Governors", "medium"),
    ]
}

/// Outbound notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Chat webhook expecting `{"text": ...}`
    #[serde(default)]
    pub slack_webhook_url: Option<String>,

    /// Generic webhook receiving the full alert JSON
    #[serde(default)]
    pub alert_webhook_url: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,

    /// Pending notification jobs before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Deliveries in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Briefing recipients
    #[serde(default = "default_stakeholders")]
    pub stakeholders: Vec<StakeholderConfig>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            slack_webhook_url: None,
            alert_webhook_url: None,
            timeout_secs: default_notify_timeout_secs(),
            queue_capacity: default_queue_capacity(),
            max_concurrency: default_max_concurrency(),
            stakeholders: default_stakeholders(),
        }
    }
}

fn default_notify_timeout_secs() -> u64 {
    5
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_concurrency() -> usize {
    8
}

// ============================================================================
// Realtime
// ============================================================================

/// Realtime counter loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_realtime_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Most recent items included in an update
    #[serde(default = "default_feedback_limit")]
    pub feedback_limit: usize,

    /// Cron expression (with seconds) for the rule tick
    #[serde(default = "default_realtime_schedule")]
    pub schedule: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_ttl_secs: default_realtime_ttl_secs(),
            feedback_limit: default_feedback_limit(),
            schedule: default_realtime_schedule(),
        }
    }
}

fn default_realtime_ttl_secs() -> u64 {
    5
}

fn default_feedback_limit() -> usize {
    30
}

fn default_realtime_schedule() -> String {
    "*/30 * * * * *".into()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub realtime: RealtimeConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// `notifications.json` next to `config.json` is merged in when present.
    pub fn load() -> Result<Self> {
        if !config_path().exists() {
            tracing::info!("Config file not found, using defaults");
        }

        let merged = load_modular_config(None)?;
        serde_json::from_value(merged).context("Failed to parse merged configuration")
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("SAUTI_BIND") {
            self.network.bind = bind;
        }
        if let Ok(port) = std::env::var("SAUTI_PORT") {
            if let Ok(p) = port.parse() {
                self.network.port = p;
            }
        }

        if let Ok(level) = std::env::var("SAUTI_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("SAUTI_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Ok(path) = std::env::var("SAUTI_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(path));
        }

        if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
            self.notifications.slack_webhook_url = Some(url);
        }
        if let Ok(url) = std::env::var("ALERT_WEBHOOK_URL") {
            self.notifications.alert_webhook_url = Some(url);
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create config directory {}", dir.display())
                })?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Socket address string for the HTTP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.network.bind, self.network.port)
    }
}
