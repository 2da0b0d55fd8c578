//! core::sources
//!
//! Read-only accessors for the three independent sources of version truth:
//!
//! - the project manifest (`package.json`) for declared ranges,
//! - at most one lock file (`package-lock.json` preferred over `yarn.lock`)
//!   for exact-pinned records,
//! - the local dependency cache (`node_modules/<name>/package.json`) for
//!   installed versions.
//!
//! The manifest and lock file are loaded once, before any reconciliation
//! starts, and are immutable for the duration of the run. Installed versions
//! are read on demand per package; nothing here mutates anything.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::diagnostics::Diagnostics;
use super::errors::ReconcileError;

/// Classification of a dependency in the project manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyClass {
    /// Listed under `dependencies`.
    Runtime,
    /// Listed under `devDependencies`.
    Development,
}

impl std::fmt::Display for DependencyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyClass::Runtime => write!(f, "dependency"),
            DependencyClass::Development => write!(f, "devDependency"),
        }
    }
}

/// A declared range looked up from the manifest.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredRange<'a> {
    /// The raw range text as written in `package.json`.
    pub raw: &'a str,
    /// Primary (`dependencies`) or secondary (`devDependencies`).
    pub class: DependencyClass,
}

/// Which lock format supplied a pinned record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    NpmLock,
    YarnLock,
}

impl std::fmt::Display for LockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockKind::NpmLock => write!(f, "`package-lock.json`"),
            LockKind::YarnLock => write!(f, "`yarn.lock`"),
        }
    }
}

/// An exact version pinned by a lock file.
#[derive(Debug, Clone)]
pub struct PinnedRecord {
    /// The exact pinned version.
    pub version: String,
    /// npm locks record whether an entry is dev-only; yarn locks do not.
    pub dev: Option<bool>,
}

#[derive(Debug)]
struct LockFile {
    kind: LockKind,
    entries: BTreeMap<String, PinnedRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct RawManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawNpmLock {
    #[serde(default)]
    dependencies: BTreeMap<String, RawNpmLockEntry>,
}

#[derive(Debug, Deserialize)]
struct RawNpmLockEntry {
    version: String,
    #[serde(default)]
    dev: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawInstalledManifest {
    version: String,
}

/// The immutable snapshot of version truth for one run.
#[derive(Debug)]
pub struct VersionSources {
    root: PathBuf,
    manifest: RawManifest,
    lock: Option<LockFile>,
}

impl VersionSources {
    /// Load the manifest and (at most one) lock file from a project root.
    ///
    /// Returns the snapshot plus the run-level diagnostics produced while
    /// loading: which sources were found, and whether a `yarn.lock` was
    /// ignored in favor of `package-lock.json`.
    ///
    /// # Errors
    ///
    /// A missing or unparsable `package.json` is fatal; lock files are
    /// optional and downgrade to informational diagnostics when absent or
    /// invalid.
    pub fn load(root: &Path) -> Result<(Self, Diagnostics), ReconcileError> {
        let mut diags = Diagnostics::new();

        let manifest_path = root.join("package.json");
        let manifest: RawManifest = read_json(&manifest_path).map_err(|_| {
            ReconcileError::ConfigurationInconsistency(format!(
                "unable to retrieve `package.json` from `{}`",
                root.display()
            ))
        })?;
        diags.info("found `package.json`");

        let npm_lock: Option<RawNpmLock> = read_json(&root.join("package-lock.json")).ok();
        if npm_lock.is_some() {
            diags.info("found `package-lock.json`");
        } else {
            diags.info("no valid `package-lock.json` found");
        }

        let yarn_contents = std::fs::read_to_string(root.join("yarn.lock")).ok();
        let lock = match (npm_lock, yarn_contents) {
            (Some(npm), yarn) => {
                if yarn.is_some() {
                    diags.warn("found `yarn.lock`; ignoring due to detected `package-lock.json`");
                }
                Some(LockFile {
                    kind: LockKind::NpmLock,
                    entries: npm
                        .dependencies
                        .into_iter()
                        .map(|(name, entry)| {
                            (
                                name,
                                PinnedRecord {
                                    version: entry.version,
                                    dev: entry.dev,
                                },
                            )
                        })
                        .collect(),
                })
            }
            (None, Some(yarn)) => {
                diags.info("found `yarn.lock`");
                Some(LockFile {
                    kind: LockKind::YarnLock,
                    entries: parse_yarn_lock(&yarn),
                })
            }
            (None, None) => {
                diags.info("no valid `yarn.lock` found");
                None
            }
        };

        Ok((
            Self {
                root: root.to_path_buf(),
                manifest,
                lock,
            },
            diags,
        ))
    }

    /// The project root the sources were loaded from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up a package's declared range; `dependencies` wins over
    /// `devDependencies` when a package appears in both.
    pub fn declared_range(&self, name: &str) -> Option<DeclaredRange<'_>> {
        if let Some(raw) = self.manifest.dependencies.get(name) {
            return Some(DeclaredRange {
                raw,
                class: DependencyClass::Runtime,
            });
        }
        self.manifest
            .dev_dependencies
            .get(name)
            .map(|raw| DeclaredRange {
                raw,
                class: DependencyClass::Development,
            })
    }

    /// Look up a package's pinned record in the active lock file, if any.
    pub fn pinned(&self, name: &str) -> Option<(&PinnedRecord, LockKind)> {
        let lock = self.lock.as_ref()?;
        lock.entries.get(name).map(|record| (record, lock.kind))
    }

    /// The path of the per-package manifest an installed version comes from.
    pub fn installed_manifest_path(&self, name: &str) -> PathBuf {
        self.root
            .join("node_modules")
            .join(name)
            .join("package.json")
    }

    /// Read the version actually installed in the local dependency cache.
    ///
    /// Returns `None` when the package is not materialized locally (or its
    /// manifest is unreadable); the reconciliation engine decides whether
    /// that is fatal.
    pub fn installed_version(&self, name: &str) -> Option<String> {
        let manifest: RawInstalledManifest =
            read_json(&self.installed_manifest_path(name)).ok()?;
        Some(manifest.version)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ReconcileError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ReconcileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        ReconcileError::ConfigurationInconsistency(format!(
            "failed to parse `{}`: {e}",
            path.display()
        ))
    })
}

/// Parse the subset of a yarn lock file this tool needs: the package name of
/// each entry header and its pinned `version` line.
fn parse_yarn_lock(contents: &str) -> BTreeMap<String, PinnedRecord> {
    let mut entries = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in contents.lines() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        if !line.starts_with(' ') {
            let header = line.trim_end();
            let Some(header) = header.strip_suffix(':') else {
                current = None;
                continue;
            };
            // Headers list one or more `name@range` selectors; they all name
            // the same package, so the first is enough.
            let first = header
                .split(',')
                .next()
                .unwrap_or("")
                .trim()
                .trim_matches('"');
            current = yarn_selector_package(first);
        } else if let Some(name) = &current {
            if let Some(rest) = line.trim_start().strip_prefix("version ") {
                let version = rest.trim().trim_matches('"').to_string();
                entries.insert(
                    name.clone(),
                    PinnedRecord {
                        version,
                        dev: None,
                    },
                );
            }
        }
    }

    entries
}

/// Split the package name out of a yarn selector such as `lodash@^4.17.0`
/// or `@popperjs/core@~2.11.0`.
fn yarn_selector_package(selector: &str) -> Option<String> {
    let at = selector.rfind('@')?;
    if at == 0 {
        return None;
    }
    Some(selector[..at].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    const MANIFEST: &str = r#"{
        "dependencies": { "leaflet": "^1.7.0" },
        "devDependencies": { "mocha": "^8.0.0" }
    }"#;

    #[test]
    fn missing_manifest_is_fatal() {
        let temp = TempDir::new().unwrap();
        let err = VersionSources::load(temp.path()).unwrap_err();
        assert!(err.to_string().contains("package.json"));
    }

    #[test]
    fn declared_range_classification() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "package.json", MANIFEST);

        let (sources, diags) = VersionSources::load(temp.path()).unwrap();
        assert!(diags.iter().any(|d| d.message.contains("package.json")));

        let leaflet = sources.declared_range("leaflet").unwrap();
        assert_eq!(leaflet.raw, "^1.7.0");
        assert_eq!(leaflet.class, DependencyClass::Runtime);

        let mocha = sources.declared_range("mocha").unwrap();
        assert_eq!(mocha.class, DependencyClass::Development);

        assert!(sources.declared_range("left-pad").is_none());
    }

    #[test]
    fn npm_lock_preferred_over_yarn() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "package.json", MANIFEST);
        write(
            temp.path(),
            "package-lock.json",
            r#"{ "dependencies": { "leaflet": { "version": "1.7.1" } } }"#,
        );
        write(
            temp.path(),
            "yarn.lock",
            "leaflet@^1.7.0:\n  version \"1.6.0\"\n",
        );

        let (sources, diags) = VersionSources::load(temp.path()).unwrap();
        assert!(diags.has_warnings());

        let (record, kind) = sources.pinned("leaflet").unwrap();
        assert_eq!(kind, LockKind::NpmLock);
        assert_eq!(record.version, "1.7.1");
    }

    #[test]
    fn npm_lock_dev_flag_preserved() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "package.json", MANIFEST);
        write(
            temp.path(),
            "package-lock.json",
            r#"{ "dependencies": { "mocha": { "version": "8.4.0", "dev": true } } }"#,
        );

        let (sources, _) = VersionSources::load(temp.path()).unwrap();
        let (record, _) = sources.pinned("mocha").unwrap();
        assert_eq!(record.dev, Some(true));
    }

    #[test]
    fn yarn_lock_parsed_when_alone() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "package.json", MANIFEST);
        write(
            temp.path(),
            "yarn.lock",
            concat!(
                "# yarn lockfile v1\n",
                "\n",
                "\"@popperjs/core@^2.11.0\", \"@popperjs/core@~2.11.2\":\n",
                "  version \"2.11.8\"\n",
                "  resolved \"https://registry.yarnpkg.com/...\"\n",
                "\n",
                "leaflet@^1.7.0:\n",
                "  version \"1.7.1\"\n",
            ),
        );

        let (sources, _) = VersionSources::load(temp.path()).unwrap();
        let (leaflet, kind) = sources.pinned("leaflet").unwrap();
        assert_eq!(kind, LockKind::YarnLock);
        assert_eq!(leaflet.version, "1.7.1");
        assert!(leaflet.dev.is_none());

        let (popper, _) = sources.pinned("@popperjs/core").unwrap();
        assert_eq!(popper.version, "2.11.8");
    }

    #[test]
    fn no_lock_files_is_fine() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "package.json", MANIFEST);

        let (sources, _) = VersionSources::load(temp.path()).unwrap();
        assert!(sources.pinned("leaflet").is_none());
    }

    #[test]
    fn installed_version_read_on_demand() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "package.json", MANIFEST);
        write(
            temp.path(),
            "node_modules/leaflet/package.json",
            r#"{ "name": "leaflet", "version": "1.7.1" }"#,
        );

        let (sources, _) = VersionSources::load(temp.path()).unwrap();
        assert_eq!(sources.installed_version("leaflet").as_deref(), Some("1.7.1"));
        assert_eq!(sources.installed_version("mocha"), None);
    }

    #[test]
    fn yarn_selector_names() {
        assert_eq!(
            yarn_selector_package("lodash@^4.17.0").as_deref(),
            Some("lodash")
        );
        assert_eq!(
            yarn_selector_package("@popperjs/core@~2.11.0").as_deref(),
            Some("@popperjs/core")
        );
        assert_eq!(yarn_selector_package("@2.0.0"), None);
        assert_eq!(yarn_selector_package("no-version"), None);
    }
}
