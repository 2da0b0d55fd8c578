//! core::config
//!
//! Configuration loading and resolution.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. `srisync.toml` in the working directory (or the `--config` path)
//! 3. CLI flags
//!
//! Missing config files are not an error; a `--config` path that does not
//! exist is.

pub mod schema;

pub use schema::ConfigFile;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Result of loading the configuration file.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The parsed (and validated) file, or defaults if none was found.
    pub file: ConfigFile,
    /// The path the file was loaded from, if any.
    pub path: Option<PathBuf>,
}

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "srisync.toml";

/// Load configuration from the explicit path or the default location.
///
/// # Errors
///
/// Returns an error if an explicit path cannot be read, or if any found
/// file fails to parse or validate.
pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<ConfigLoadResult, ConfigError> {
    if let Some(path) = explicit {
        let file = read_config(path)?;
        return Ok(ConfigLoadResult {
            file,
            path: Some(path.to_path_buf()),
        });
    }

    let default_path = cwd.join(CONFIG_FILE_NAME);
    if default_path.exists() {
        let file = read_config(&default_path)?;
        return Ok(ConfigLoadResult {
            file,
            path: Some(default_path),
        });
    }

    Ok(ConfigLoadResult {
        file: ConfigFile::default(),
        path: None,
    })
}

fn read_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let file: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    file.validate()?;
    Ok(file)
}

/// The fully resolved options a run executes with.
///
/// Built by layering CLI flags over the config file over defaults; the
/// engine and catalog consume this, never the raw sources.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub files: Vec<String>,
    pub output_paths: Vec<PathBuf>,

    pub cdn_base_paths: Option<Vec<String>>,
    pub cdn_base_path_replacements: Option<Vec<String>>,
    pub node_modules_replacements: Option<Vec<String>>,
    pub cdn_names: Option<Vec<String>>,
    pub packages_to_cdns: Option<BTreeMap<String, String>>,

    pub algorithms: Vec<String>,
    pub local: bool,
    pub fallback: bool,
    pub global_checks: BTreeMap<String, BTreeMap<String, String>>,
    pub no_globs: bool,
    pub force_integrity_checks: bool,
    pub add_crossorigin: Option<String>,
    pub no_local_integrity: bool,
    pub ignore_url_fetches: bool,
    pub url_integrity_check: bool,
    pub dry_run: bool,
    pub json_space: Option<usize>,
    pub disclaimer: Option<String>,

    /// The run root: version sources, local paths and relative files
    /// resolve against this.
    pub cwd: PathBuf,
}

/// Parse a `package=kind=expression` global-check directive (CLI form).
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` when the directive does not have
/// three `=`-separated fields or names an unknown kind.
pub fn parse_global_check(directive: &str) -> Result<(String, String, String), ConfigError> {
    let mut parts = directive.splitn(3, '=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(package), Some(kind), Some(expression))
            if !package.is_empty() && (kind == "script" || kind == "link") =>
        {
            Ok((
                package.to_string(),
                kind.to_string(),
                expression.to_string(),
            ))
        }
        _ => Err(ConfigError::InvalidValue(format!(
            "global check \"{directive}\" must have the form `package=script|link=expression`"
        ))),
    }
}
