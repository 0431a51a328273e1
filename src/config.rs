//! Configuration module for the asset export pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.blendyard/settings.toml`)
//! - Legacy JSON settings document (`settings.json`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the commands)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `BLENDYARD_` and use double
//! underscores to separate nested levels:
//! - `BLENDYARD_WATCHDOG__DELTA_THROTTLE=5` sets `watchdog.delta_throttle`
//! - `BLENDYARD_GENERAL__CONVERTER_EXECUTABLE=/opt/blender/blender` sets
//!   `general.converter_executable`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding the workspace settings file.
pub const CONFIG_DIR: &str = ".blendyard";
/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";
/// Legacy settings document looked up in the current directory.
pub const LEGACY_CONFIG_FILE: &str = "settings.json";

const ENV_PREFIX: &str = "BLENDYARD_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Converter executable and export script
    #[serde(default)]
    pub general: GeneralConfig,

    /// Source/target folders and the extension mapping
    #[serde(default)]
    pub models: ModelsConfig,

    /// Watch session settings
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Log filter configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeneralConfig {
    /// Path to the converter executable (Blender)
    #[serde(default = "default_converter")]
    pub converter_executable: PathBuf,

    /// Script the converter runs in background mode.
    /// Relative paths resolve against the current working directory.
    #[serde(default = "default_export_script")]
    pub export_script: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelsConfig {
    /// Root that one-shot conversions compute relative paths against
    #[serde(default = "default_source_folder")]
    pub source_folder: PathBuf,

    /// Root that exported files are mirrored into
    #[serde(default = "default_target_folder")]
    pub target_folder: PathBuf,

    /// Extension of source assets, without the dot
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Extension of exported interchange files, without the dot
    #[serde(default = "default_target_extension")]
    pub target_extension: String,
}

/// How modify events are throttled.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleScope {
    /// One timestamp per source file.
    #[default]
    PerPath,
    /// A single timestamp shared by every file in the session.
    Global,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchdogConfig {
    /// Folder that is recursively watched
    #[serde(default = "default_watched_folder")]
    pub watched_folder: PathBuf,

    /// Minimum seconds between two accepted modify events
    #[serde(default = "default_delta_throttle")]
    pub delta_throttle: f64,

    /// Verbose output (`0`/`1` and booleans are accepted)
    #[serde(default, deserialize_with = "flag_or_level")]
    pub verbose: bool,

    /// Whether the throttle is tracked per file or session-wide
    #[serde(default)]
    pub throttle_scope: ThrottleScope,

    /// Character the editor leaves in names of files it is still writing
    #[serde(default = "default_lock_marker")]
    pub lock_marker: char,

    /// Upper bound on converter processes running at once
    #[serde(default = "default_max_concurrent_exports")]
    pub max_concurrent_exports: usize,

    /// Capacity of the queue between the file watcher and the dispatcher
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    /// Kill a converter that runs longer than this many seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for every target
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `blendyard::watcher = "trace"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_converter() -> PathBuf {
    PathBuf::from("blender")
}
fn default_export_script() -> PathBuf {
    PathBuf::from("scripts/batch_export.py")
}
fn default_source_folder() -> PathBuf {
    PathBuf::from(".")
}
fn default_target_folder() -> PathBuf {
    PathBuf::from("export")
}
fn default_source_extension() -> String {
    "blend".to_string()
}
fn default_target_extension() -> String {
    "fbx".to_string()
}
fn default_watched_folder() -> PathBuf {
    PathBuf::from(".")
}
fn default_delta_throttle() -> f64 {
    2.0
}
fn default_lock_marker() -> char {
    '@'
}
fn default_max_concurrent_exports() -> usize {
    num_cpus::get().clamp(1, 4)
}
fn default_event_queue_capacity() -> usize {
    256
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Accepts `verbose = 1` from the legacy document as well as `verbose = true`.
fn flag_or_level<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagOrLevel {
        Flag(bool),
        Level(i64),
    }

    Ok(match FlagOrLevel::deserialize(deserializer)? {
        FlagOrLevel::Flag(flag) => flag,
        FlagOrLevel::Level(level) => level != 0,
    })
}

/// Read the legacy JSON settings document, renaming its keys to the current
/// schema. A missing file yields `None`, like figment's file providers.
fn legacy_document(path: &Path) -> Result<Option<serde_json::Value>, Box<figment::Error>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Box::new(
                format!("Cannot read {}: {e}", path.display()).into(),
            ));
        }
    };

    let mut document: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| Box::new(figment::Error::from(format!("{}: {e}", path.display()))))?;

    if let Some(general) = document
        .get_mut("general")
        .and_then(serde_json::Value::as_object_mut)
        && let Some(exe) = general.remove("blender_exe")
    {
        general.entry("converter_executable").or_insert(exe);
    }

    Ok(Some(document))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            general: GeneralConfig::default(),
            models: ModelsConfig::default(),
            watchdog: WatchdogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            converter_executable: default_converter(),
            export_script: default_export_script(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            source_folder: default_source_folder(),
            target_folder: default_target_folder(),
            source_extension: default_source_extension(),
            target_extension: default_target_extension(),
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            watched_folder: default_watched_folder(),
            delta_throttle: default_delta_throttle(),
            verbose: false,
            throttle_scope: ThrottleScope::default(),
            lock_marker: default_lock_marker(),
            max_concurrent_exports: default_max_concurrent_exports(),
            event_queue_capacity: default_event_queue_capacity(),
            export_timeout_secs: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl WatchdogConfig {
    pub fn export_timeout(&self) -> Option<Duration> {
        self.export_timeout_secs.map(Duration::from_secs)
    }
}

impl Settings {
    /// Load configuration from all sources, discovering the settings file.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(path),
            None => Self::figment_for(None)?.extract().map_err(Box::new),
        }
    }

    /// Load configuration from a specific file.
    ///
    /// `.json` files are read as the legacy settings document, anything
    /// else as TOML.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment_for(Some(path.as_ref()))?
            .extract()
            .map_err(Box::new)
    }

    fn figment_for(path: Option<&Path>) -> Result<Figment, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

        if let Some(path) = path {
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if !is_json {
                figment = figment.merge(Toml::file(path));
            } else if let Some(document) = legacy_document(path)? {
                figment = figment.merge(Serialized::globals(document));
            }
        }

        // Double underscore separates nesting levels; single underscores stay
        Ok(figment.merge(
            Env::prefixed(ENV_PREFIX)
                .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
        ))
    }

    /// Find the settings file by walking up from the current directory.
    ///
    /// Falls back to a legacy `settings.json` in the current directory.
    pub fn find_config_file() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let candidate = ancestor.join(CONFIG_DIR).join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        let legacy = current.join(LEGACY_CONFIG_FILE);
        legacy.is_file().then_some(legacy)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory.
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }

    /// Resolve the export script the converter is asked to run.
    pub fn export_script_path(&self) -> PathBuf {
        let script = &self.general.export_script;
        if script.is_absolute() {
            return script.clone();
        }
        std::env::current_dir()
            .map(|cwd| cwd.join(script))
            .unwrap_or_else(|_| script.clone())
    }
}
