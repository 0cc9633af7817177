//! Configuration module for the label ingestion pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `LW_` and use double underscores
//! to separate nested levels:
//! - `LW_WATCH__ROOT=/srv/labels` sets `watch.root`
//! - `LW_RETRY__MAX_RETRIES=5` sets `retry.max_retries`
//! - `LW_STABILITY__INTERVAL_MS=250` sets `stability.interval_ms`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::FolderLayout;

/// Directory holding the settings file, searched upward from the cwd.
pub const CONFIG_DIR: &str = ".labelwatch";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "LW_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Watched folder layout and ingress settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Upload stability probing
    #[serde(default)]
    pub stability: StabilityConfig,

    /// Retry state machine
    #[serde(default)]
    pub retry: RetryConfig,

    /// External extraction collaborator
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Lock marker files
    #[serde(default)]
    pub lock: LockConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Folder where label photos are dropped
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Subfolder (under root) for successfully extracted labels
    #[serde(default = "default_processed_dir")]
    pub processed_dir: String,

    /// Subfolder (under root) for failed and exhausted labels
    #[serde(default = "default_retry_dir")]
    pub retry_dir: String,

    /// Accepted file extensions, case-insensitive
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Feed files already sitting in the root when the watcher starts
    #[serde(default = "default_true")]
    pub scan_on_startup: bool,

    /// Maximum number of labels handled concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Depth of the event queue between the watcher and the workers
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StabilityConfig {
    /// Maximum number of size samples before giving up
    #[serde(default = "default_samples")]
    pub samples: u32,

    /// Delay between samples in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    /// Failed attempts tolerated before a label is considered stuck
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExtractorConfig {
    /// Program to run for each stabilized label
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the label path
    #[serde(default)]
    pub args: Vec<String>,

    /// Wall-clock limit for one extraction in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LockConfig {
    /// Suffix appended to a label's file name to form its lock marker
    #[serde(default = "default_lock_suffix")]
    pub suffix: String,

    /// Markers older than this are swept at startup (0 disables the sweep)
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all targets
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `labelwatch::pipeline = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_processed_dir() -> String {
    "Processed".to_string()
}
fn default_retry_dir() -> String {
    "Retry".to_string()
}
fn default_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
}
fn default_true() -> bool {
    true
}
fn default_workers() -> usize {
    2
}
fn default_channel_capacity() -> usize {
    256
}
fn default_samples() -> u32 {
    10
}
fn default_interval_ms() -> u64 {
    1000
}
fn default_max_retries() -> u32 {
    3
}
fn default_program() -> String {
    "python".to_string()
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_lock_suffix() -> String {
    ".lock".to_string()
}
fn default_stale_after_secs() -> u64 {
    3600
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            watch: WatchConfig::default(),
            stability: StabilityConfig::default(),
            retry: RetryConfig::default(),
            extractor: ExtractorConfig::default(),
            lock: LockConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            processed_dir: default_processed_dir(),
            retry_dir: default_retry_dir(),
            extensions: default_extensions(),
            scan_on_startup: true,
            workers: default_workers(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: vec!["expiry_vision.py".to_string()],
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            suffix: default_lock_suffix(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: BTreeMap::new(),
        }
    }
}

impl StabilityConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl ExtractorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LockConfig {
    /// Age threshold for the startup sweep, `None` when disabled.
    pub fn stale_after(&self) -> Option<Duration> {
        (self.stale_after_secs > 0).then(|| Duration::from_secs(self.stale_after_secs))
    }
}

impl WatchConfig {
    /// Normalized extension set: lowercase, no leading dot.
    pub fn extension_set(&self) -> BTreeSet<String> {
        self.extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still layering env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore (__) separates nested levels,
            // single underscore stays inside field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for a `.labelwatch` directory
    /// from the current directory up to the filesystem root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join(CONFIG_FILE));
            }
        }

        None
    }

    /// Folder layout derived from the watch section.
    pub fn layout(&self) -> FolderLayout {
        FolderLayout::new(
            &self.watch.root,
            &self.watch.processed_dir,
            &self.watch.retry_dir,
        )
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.watch.extension_set().is_empty() {
            return Err("watch.extensions must name at least one extension".to_string());
        }
        if self.watch.workers == 0 {
            return Err("watch.workers must be at least 1".to_string());
        }
        if self.watch.channel_capacity == 0 {
            return Err("watch.channel_capacity must be at least 1".to_string());
        }
        if self.watch.processed_dir.trim().is_empty() || self.watch.retry_dir.trim().is_empty() {
            return Err("watch.processed_dir and watch.retry_dir must not be empty".to_string());
        }
        if self.watch.processed_dir == self.watch.retry_dir {
            return Err("watch.processed_dir and watch.retry_dir must differ".to_string());
        }
        if self.stability.samples < 2 {
            return Err("stability.samples must be at least 2".to_string());
        }
        if self.extractor.program.trim().is_empty() {
            return Err("extractor.program must not be empty".to_string());
        }
        if self.extractor.timeout_secs == 0 {
            return Err("extractor.timeout_secs must be greater than 0".to_string());
        }
        if self.lock.suffix.trim().is_empty() {
            return Err("lock.suffix must not be empty".to_string());
        }
        Ok(())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let mut settings = Settings::default();

        if let Ok(current_dir) = std::env::current_dir() {
            settings.watch.root = current_dir;
        }

        settings.save(&config_path)?;
        Ok(config_path)
    }
}
