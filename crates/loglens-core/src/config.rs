//! Configuration types for loglens.
//!
//! [`Config::load`] reads `~/.config/loglens/config.toml`, creating it with
//! hardcoded defaults if it does not yet exist, then applies `LOGLENS__*`
//! environment overrides. [`Config::defaults`] returns the same defaults
//! without touching the filesystem (useful in tests).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::poller::BackoffPolicy;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[backend]
base_url           = "http://127.0.0.1:8000"
request_timeout_ms = 10000
page_size          = 50
export_multiplier  = 10

[poll]
logs_interval_ms      = 2000
anomalies_interval_ms = 2000
chart_interval_ms     = 2000
backoff_base_ms       = 5000
backoff_growth        = 1.5
backoff_max_ms        = 30000

[ui]
show_timestamps  = true
timestamp_format = "%H:%M:%S"
chart_height_pct = 35

[export]
directory = "."
"#;

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// `[backend]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Row limit for the live log view.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Export limit is `page_size * export_multiplier`.
    #[serde(default = "default_export_multiplier")]
    pub export_multiplier: usize,
    /// Value of the `session_id` cookie sent with every request.
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_base_url() -> String { "http://127.0.0.1:8000".to_string() }
fn default_request_timeout_ms() -> u64 { 10_000 }
fn default_page_size() -> usize { 50 }
fn default_export_multiplier() -> usize { 10 }

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            page_size: default_page_size(),
            export_multiplier: default_export_multiplier(),
            session_id: None,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn export_limit(&self) -> usize {
        self.page_size.saturating_mul(self.export_multiplier.max(1))
    }
}

/// `[poll]` section: nominal intervals per feed and the shared backoff.
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub logs_interval_ms: u64,
    #[serde(default = "default_interval_ms")]
    pub anomalies_interval_ms: u64,
    #[serde(default = "default_interval_ms")]
    pub chart_interval_ms: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_growth")]
    pub backoff_growth: f64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_interval_ms() -> u64 { 2_000 }
fn default_backoff_base_ms() -> u64 { 5_000 }
fn default_backoff_growth() -> f64 { 1.5 }
fn default_backoff_max_ms() -> u64 { 30_000 }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            logs_interval_ms: default_interval_ms(),
            anomalies_interval_ms: default_interval_ms(),
            chart_interval_ms: default_interval_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_growth: default_backoff_growth(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl PollConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(self.backoff_base_ms),
            growth: self.backoff_growth,
            max: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

/// `[ui]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_show_timestamps")]
    pub show_timestamps: bool,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    #[serde(default = "default_chart_height_pct")]
    pub chart_height_pct: u16,
}

fn default_show_timestamps() -> bool { true }
fn default_timestamp_format() -> String { "%H:%M:%S".to_string() }
fn default_chart_height_pct() -> u16 { 35 }

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_timestamps: default_show_timestamps(),
            timestamp_format: default_timestamp_format(),
            chart_height_pct: default_chart_height_pct(),
        }
    }
}

/// `[export]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_directory")]
    pub directory: PathBuf,
}

fn default_export_directory() -> PathBuf { PathBuf::from(".") }

impl Default for ExportConfig {
    fn default() -> Self {
        Self { directory: default_export_directory() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load from `~/.config/loglens/config.toml`, layered on top of the
    /// built-in defaults and under `LOGLENS__SECTION__KEY` environment
    /// variables. Creates the file with defaults if it does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();

        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, DEFAULT_CONFIG.trim_start())?;
        }

        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from(path.as_path()).required(false))
            .add_source(
                config::Environment::with_prefix("LOGLENS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    /// Reject values that would break polling: backoff must grow and be
    /// capped at or above its base, and intervals and page size are non-zero.
    pub fn validated(self) -> anyhow::Result<Self> {
        let poll = &self.poll;
        for (key, ms) in [
            ("poll.logs_interval_ms", poll.logs_interval_ms),
            ("poll.anomalies_interval_ms", poll.anomalies_interval_ms),
            ("poll.chart_interval_ms", poll.chart_interval_ms),
            ("poll.backoff_base_ms", poll.backoff_base_ms),
        ] {
            if ms == 0 {
                anyhow::bail!("{key} must be greater than 0");
            }
        }
        if poll.backoff_growth.is_nan() || poll.backoff_growth <= 1.0 {
            anyhow::bail!("poll.backoff_growth must be greater than 1.0, got {}", poll.backoff_growth);
        }
        if poll.backoff_max_ms < poll.backoff_base_ms {
            anyhow::bail!(
                "poll.backoff_max_ms ({}) must not be below poll.backoff_base_ms ({})",
                poll.backoff_max_ms,
                poll.backoff_base_ms
            );
        }
        if self.backend.page_size == 0 {
            anyhow::bail!("backend.page_size must be greater than 0");
        }
        Ok(self)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("loglens")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
