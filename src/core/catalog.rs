//! core::catalog
//!
//! The pattern catalog: an ordered list of location templates that recognize
//! CDN URLs and local dependency-cache paths, with parallel rewrite templates
//! for the CDN form and the local-cache form of each location.
//!
//! # Matching
//!
//! Patterns are tried in declaration order and the first regular expression
//! that matches wins. The order is part of the contract: more specific
//! patterns (a vendor CDN) must come before more general ones (the generic
//! `node_modules` pattern), so operators overriding the catalog control
//! precedence by ordering their list. Once a pattern matches structurally
//! there is no backtracking, even if later pipeline stages fail.
//!
//! # Templates
//!
//! Rewrite templates use the regex-replacement syntax for the named capture
//! groups of the matched pattern: `${name}`, `${version}`, `${dist}`,
//! `${path}`, and (for the local-cache pattern) `${prefix}`. The `${version}`
//! field is substituted with the reconciliation verdict's target version
//! before the template is applied.

use std::collections::BTreeMap;

use regex::Regex;

use super::config::{ConfigError, Options};
use super::errors::ReconcileError;
use super::types::PackageName;

const SEMVER_GROUP: &str = r"(?P<version>\d+\.\d+\.\d+)";
const PATH_GROUP: &str = r#"(?P<dist>/dist)?(?P<path>[^ '"]*)"#;

/// The built-in catalog's location patterns, in precedence order.
fn default_cdn_base_paths() -> Vec<String> {
    vec![
        format!(r"https://unpkg\.com/(?P<name>[^@]*)@{SEMVER_GROUP}{PATH_GROUP}"),
        format!(r"(?P<prefix>[./]*)node_modules/(?P<name>(?:@[^/]*/)?[^/]*){PATH_GROUP}"),
        format!(r"https://code\.jquery\.com/(?P<name>[^-]*?)-{SEMVER_GROUP}{PATH_GROUP}"),
        format!(r"https://cdn\.jsdelivr\.net/npm/(?P<name>(?:@[^/]*/)?[^@]*?)@{SEMVER_GROUP}{PATH_GROUP}"),
        format!(r"https://stackpath\.bootstrapcdn\.com/(?P<name>[^/]*)/{SEMVER_GROUP}{PATH_GROUP}"),
    ]
}

/// CDN rewrite templates, parallel to the default patterns.
fn default_cdn_replacements() -> Vec<String> {
    [
        "https://unpkg.com/${name}@${version}${dist}${path}",
        "https://unpkg.com/${name}@${version}${dist}${path}",
        "https://code.jquery.com/${name}-${version}${dist}${path}",
        "https://cdn.jsdelivr.net/npm/${name}@${version}${dist}${path}",
        "https://stackpath.bootstrapcdn.com/${name}/${version}${path}",
    ]
    .map(String::from)
    .to_vec()
}

/// Local-cache rewrite templates, parallel to the default patterns.
fn default_local_replacements() -> Vec<String> {
    [
        "node_modules/${name}${dist}${path}",
        "${prefix}node_modules/${name}${dist}${path}",
        "node_modules/${name}/dist/jquery${dist}${path}",
        "node_modules/${name}${dist}${path}",
        "node_modules/${name}/dist${path}",
    ]
    .map(String::from)
    .to_vec()
}

fn default_cdn_names() -> Vec<String> {
    ["unpkg", "node_modules", "jquery", "jsdelivr", "bootstrap"]
        .map(String::from)
        .to_vec()
}

fn default_package_cdns() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("jquery".to_string(), "jquery".to_string()),
        ("bootstrap".to_string(), "bootstrap".to_string()),
    ])
}

/// The outcome of matching one location string against the catalog.
///
/// Created per reference and consumed immediately by the reconciliation
/// pipeline; never retained.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Index of the winning pattern in catalog order.
    pub pattern_index: usize,
    /// The dependency the location refers to.
    pub package: PackageName,
    /// The version declared in the location, absent for local-cache forms.
    pub version: Option<String>,
    /// The sub-path after the package/version segment.
    pub path: String,
    /// Whether the location carried a `/dist` marker segment.
    pub dist: bool,
}

/// An ordered catalog of location patterns with their rewrite templates.
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    patterns: Vec<Regex>,
    cdn_templates: Vec<String>,
    local_templates: Vec<String>,
    cdn_names: Vec<String>,
    package_cdns: BTreeMap<String, String>,
}

impl PatternCatalog {
    /// The built-in catalog: unpkg, `node_modules`, jQuery, jsDelivr and
    /// Bootstrap CDN locations.
    pub fn standard() -> Self {
        Self::from_parts(
            default_cdn_base_paths(),
            default_cdn_replacements(),
            default_local_replacements(),
            default_cdn_names(),
            default_package_cdns(),
        )
        .expect("built-in catalog patterns are valid")
    }

    /// Build a catalog from resolved options, falling back to the built-in
    /// lists wherever no override was configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an empty or uncompilable
    /// pattern list, or a pattern without a `name` capture group.
    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        Self::from_parts(
            options
                .cdn_base_paths
                .clone()
                .unwrap_or_else(default_cdn_base_paths),
            options
                .cdn_base_path_replacements
                .clone()
                .unwrap_or_else(default_cdn_replacements),
            options
                .node_modules_replacements
                .clone()
                .unwrap_or_else(default_local_replacements),
            options.cdn_names.clone().unwrap_or_else(default_cdn_names),
            options
                .packages_to_cdns
                .clone()
                .unwrap_or_else(default_package_cdns),
        )
    }

    fn from_parts(
        patterns: Vec<String>,
        cdn_templates: Vec<String>,
        local_templates: Vec<String>,
        cdn_names: Vec<String>,
        package_cdns: BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        if patterns.is_empty() {
            return Err(ConfigError::InvalidValue(
                "cdn_base_paths cannot be empty".into(),
            ));
        }
        if cdn_templates.is_empty() || local_templates.is_empty() {
            return Err(ConfigError::InvalidValue(
                "rewrite template lists cannot be empty".into(),
            ));
        }

        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in &patterns {
            let regex = Regex::new(pattern).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid cdn_base_paths pattern: {e}"))
            })?;
            if !regex.capture_names().flatten().any(|n| n == "name") {
                return Err(ConfigError::InvalidValue(format!(
                    "pattern `{pattern}` has no `name` capture group"
                )));
            }
            compiled.push(regex);
        }

        Ok(Self {
            patterns: compiled,
            cdn_templates,
            local_templates,
            cdn_names,
            package_cdns,
        })
    }

    /// Match a location string against the catalog, first match wins.
    ///
    /// Returns `Ok(None)` when no pattern recognizes the location (such
    /// references are left untouched by the run).
    ///
    /// # Errors
    ///
    /// A structural match whose `name` capture is not a valid package name is
    /// a `ConfigurationInconsistency`; per the no-backtracking rule, later
    /// patterns are not consulted.
    pub fn find_match(&self, location: &str) -> Result<Option<MatchResult>, ReconcileError> {
        for (index, regex) in self.patterns.iter().enumerate() {
            let Some(caps) = regex.captures(location) else {
                continue;
            };
            let name = caps.name("name").map(|m| m.as_str()).unwrap_or("");
            let package = PackageName::new(name).map_err(|e| {
                ReconcileError::ConfigurationInconsistency(format!(
                    "could not extract a package name from \"{location}\": {e}"
                ))
            })?;
            return Ok(Some(MatchResult {
                pattern_index: index,
                package,
                version: caps.name("version").map(|m| m.as_str().to_string()),
                path: caps
                    .name("path")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                dist: caps.name("dist").is_some(),
            }));
        }
        Ok(None)
    }

    /// The compiled pattern at a catalog index.
    pub fn pattern(&self, index: usize) -> &Regex {
        &self.patterns[index]
    }

    /// The local-cache template for a catalog index, falling back to the
    /// first template when the override list is shorter than the catalog.
    pub fn local_template(&self, index: usize) -> &str {
        self.local_templates
            .get(index)
            .unwrap_or(&self.local_templates[0])
    }

    /// Resolve the CDN rewrite template for a match.
    ///
    /// Selection order: an explicit CDN name (per-reference hint or the
    /// operator's package map, resolved by the caller), else the CDN
    /// associated with the matched pattern index. A name not present in the
    /// CDN-name list falls back to the first template.
    pub fn cdn_template_for(&self, matched_index: usize, cdn_name: Option<&str>) -> &str {
        let index = match cdn_name {
            Some(name) => self.cdn_names.iter().position(|n| n == name),
            None => Some(matched_index),
        };
        index
            .and_then(|i| self.cdn_templates.get(i))
            .unwrap_or(&self.cdn_templates[0])
    }

    /// The operator-configured CDN for a package, if any.
    pub fn cdn_for_package(&self, package: &str) -> Option<&str> {
        self.package_cdns.get(package).map(String::as_str)
    }

    /// Number of patterns in the catalog.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
