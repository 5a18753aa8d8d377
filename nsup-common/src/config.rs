//! Bootstrap configuration loading and setting resolution
//!
//! Settings are resolved with the priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "NSUP_CONFIG";

/// Default registry base URL
pub const DEFAULT_NS_URL: &str = "https://chewbbaca.online/api/NS/api";

/// Default knowledge-base endpoint
pub const DEFAULT_SPARQL_ENDPOINT: &str = "https://sparql.uniprot.org/sparql";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; absent values fall through to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Base URL of the nomenclature registry API
    #[serde(default)]
    pub ns_url: Option<String>,

    /// Worker count for CPU-bound quality control
    #[serde(default)]
    pub cpu_cores: Option<usize>,

    /// Worker count for I/O-bound annotation lookups
    #[serde(default)]
    pub threads: Option<usize>,

    /// Registry request timeout (seconds)
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Knowledge-base SPARQL endpoint
    #[serde(default)]
    pub sparql_endpoint: Option<String>,

    /// Knowledge-base query timeout (seconds)
    #[serde(default)]
    pub sparql_timeout_secs: Option<u64>,

    /// Knowledge-base request rate ceiling
    #[serde(default)]
    pub sparql_requests_per_second: Option<u32>,

    /// Registry account name
    #[serde(default)]
    pub username: Option<String>,

    /// Registry account password
    #[serde(default)]
    pub password: Option<String>,

    /// Keep intermediate work files after the run
    #[serde(default)]
    pub keep_intermediate: Option<bool>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locate the bootstrap config file
///
/// Explicit path → `NSUP_CONFIG` → `<config_dir>/nsup/nsup.toml`.
/// Returns `None` when no candidate exists on disk.
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("nsup").join("nsup.toml"))
        .filter(|p| p.exists())
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML {} failed: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))
}

/// Load the bootstrap config, degrading to defaults when no file exists
///
/// A file that exists but cannot be parsed is an error; a missing file is not.
pub fn load_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    match locate_config_file(explicit) {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            if explicit.is_some() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            warn!("Config file {} not found, using defaults", path.display());
            Ok(TomlConfig::default())
        }
        None => {
            info!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Resolve one setting across CLI → ENV → TOML
///
/// Returns `Ok(None)` when no tier provides a value so callers can apply
/// their compiled default. An environment value that fails to parse is an
/// error rather than silently skipped.
pub fn resolve_setting<T>(cli: Option<T>, env_var: &str, toml: Option<T>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if cli.is_some() {
        return Ok(cli);
    }

    if let Ok(raw) = std::env::var(env_var) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let value = trimmed.parse::<T>().map_err(|e| {
                Error::Config(format!("Invalid value for {}: {} ({})", env_var, trimmed, e))
            })?;
            return Ok(Some(value));
        }
    }

    Ok(toml)
}
