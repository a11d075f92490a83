//! Settings parser for .targetctl/config.toml

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use targetctl_core::logging::DEFAULT_FILTER;
use targetctl_core::prelude::*;

const CONFIG_FILENAME: &str = "config.toml";
const CONFIG_DIR: &str = ".targetctl";

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Contents of .targetctl/config.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub commands: CommandSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Command execution settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandSettings {
    /// Default timeout for blocking waits on command results
    #[serde(default = "default_await_timeout_ms")]
    pub await_timeout_ms: u64,
}

impl CommandSettings {
    pub fn await_timeout(&self) -> Duration {
        Duration::from_millis(self.await_timeout_ms)
    }
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            await_timeout_ms: default_await_timeout_ms(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Filter used when TARGETCTL_LOG is unset
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Log directory (platform data dir when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            directory: None,
        }
    }
}

fn default_await_timeout_ms() -> u64 {
    30_000
}

fn default_filter() -> String {
    DEFAULT_FILTER.to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings Loading
// ─────────────────────────────────────────────────────────────────────────────

/// Path of the config file for `project_path`
pub fn config_path(project_path: &Path) -> PathBuf {
    project_path.join(CONFIG_DIR).join(CONFIG_FILENAME)
}

/// Parse settings from TOML text
pub fn parse_settings(content: &str) -> Result<Settings> {
    toml::from_str(content).map_err(|e| Error::config(format!("Invalid settings: {}", e)))
}

/// Load settings from .targetctl/config.toml
///
/// Returns default settings if file doesn't exist or can't be parsed.
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = config_path(project_path);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match parse_settings(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create .targetctl/config.toml with commented defaults
///
/// Leaves an existing file untouched.
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let config_dir = project_path.join(CONFIG_DIR);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .map_err(|e| Error::config(format!("Failed to create .targetctl dir: {}", e)))?;
    }

    let config_path = config_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        std::fs::write(&config_path, generate_default_config())
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default config at {:?}", config_path);
    }

    Ok(())
}

/// Save settings to .targetctl/config.toml
///
/// Writes to a temp file and renames it over the old config.
pub fn save_settings(project_path: &Path, settings: &Settings) -> Result<()> {
    let config_dir = project_path.join(CONFIG_DIR);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .map_err(|e| Error::config(format!("Failed to create .targetctl dir: {}", e)))?;
    }

    let config_path = config_dir.join(CONFIG_FILENAME);
    let temp_path = config_dir.join(".config.toml.tmp");

    let content = toml::to_string_pretty(settings)
        .map_err(|e| Error::config(format!("Failed to serialize settings: {}", e)))?;
    let full_content = format!("{}{}", generate_config_header(), content);

    std::fs::write(&temp_path, &full_content)
        .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;

    std::fs::rename(&temp_path, &config_path)
        .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

    info!("Saved settings to {:?}", config_path);
    Ok(())
}

fn generate_config_header() -> String {
    "# targetctl configuration\n\n".to_string()
}

fn generate_default_config() -> String {
    r#"# targetctl configuration

[commands]
await_timeout_ms = 30000    # Default timeout for blocking waits on results

[logging]
# Used when TARGETCTL_LOG is unset
filter = "targetctl=info,warn"
# directory = "/tmp/targetctl-logs"
"#
    .to_string()
}
