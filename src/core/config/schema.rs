//! core::config::schema
//!
//! The on-disk configuration schema.
//!
//! All fields are optional; anything unset falls back to the built-in
//! defaults, and CLI flags override file values. Unknown fields are
//! rejected so typos fail loudly instead of being silently ignored.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::SriAlgorithm;

/// The `srisync.toml` file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Files or file globs to process.
    pub files: Option<Vec<String>>,
    /// Output paths, parallel to `files`; globs are disabled when set.
    pub output_paths: Option<Vec<PathBuf>>,

    /// Pattern catalog overrides (regexes with named capture groups).
    pub cdn_base_paths: Option<Vec<String>>,
    /// CDN rewrite template overrides, parallel to the catalog.
    pub cdn_base_path_replacements: Option<Vec<String>>,
    /// Local-cache template overrides, parallel to the catalog.
    pub node_modules_replacements: Option<Vec<String>>,
    /// CDN names, parallel to the catalog (used for CDN selection).
    pub cdn_names: Option<Vec<String>>,
    /// Per-package CDN selection map.
    pub packages_to_cdns: Option<BTreeMap<String, String>>,

    /// Operator algorithm whitelist.
    pub algorithms: Option<Vec<String>>,
    /// Rewrite references to local-cache paths instead of CDN URLs.
    pub local: Option<bool>,
    /// Emit local-copy fallback snippets for markup references.
    pub fallback: Option<bool>,
    /// Global-check expressions: package -> reference kind -> expression.
    pub global_checks: Option<BTreeMap<String, BTreeMap<String, String>>>,
    /// Treat `files` as literal paths.
    pub no_globs: Option<bool>,
    /// Tolerate a missing local copy (degraded verification).
    pub force_integrity_checks: Option<bool>,
    /// `crossorigin` value to set on references that carry integrity.
    pub add_crossorigin: Option<String>,
    /// Omit integrity attributes when rewriting to local paths.
    pub no_local_integrity: Option<bool>,
    /// Skip reachability probes.
    pub ignore_url_fetches: Option<bool>,
    /// Fetch the full body and cross-check every digest against it.
    pub url_integrity_check: Option<bool>,
    /// Reconcile and report without writing any file.
    pub dry_run: Option<bool>,
    /// Indent width for rewritten JSON documents (0 = compact).
    pub json_space: Option<usize>,
    /// Comment prepended to rewritten markup documents.
    pub disclaimer: Option<String>,
}

impl ConfigFile {
    /// Validate cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unknown algorithm names,
    /// empty override lists, or global-check kinds outside script/link.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(algorithms) = &self.algorithms {
            for token in algorithms {
                if SriAlgorithm::from_token(token).is_none() {
                    return Err(ConfigError::InvalidValue(format!(
                        "unknown algorithm \"{token}\" in `algorithms`"
                    )));
                }
            }
        }

        for (field, list) in [
            ("cdn_base_paths", &self.cdn_base_paths),
            ("cdn_base_path_replacements", &self.cdn_base_path_replacements),
            ("node_modules_replacements", &self.node_modules_replacements),
            ("cdn_names", &self.cdn_names),
        ] {
            if let Some(list) = list {
                if list.is_empty() {
                    return Err(ConfigError::InvalidValue(format!(
                        "`{field}` cannot be an empty list"
                    )));
                }
            }
        }

        if let Some(global_checks) = &self.global_checks {
            for (package, kinds) in global_checks {
                for kind in kinds.keys() {
                    if kind != "script" && kind != "link" {
                        return Err(ConfigError::InvalidValue(format!(
                            "global check for \"{package}\" uses unknown kind \"{kind}\" \
                             (expected \"script\" or \"link\")"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
