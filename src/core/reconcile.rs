//! core::reconcile
//!
//! The version reconciliation engine: a strict decision table evaluated once
//! per authoritative source, in sequence (URL, pinned record, installed
//! record), that decides whether a reference keeps its version or is
//! rewritten to the locally installed one.
//!
//! # Policy
//!
//! The installed local copy is the only source actually available for
//! hashing, so it is the forced rewrite target whenever any inconsistency is
//! detected. Lock files are stricter than ranges but softer than the
//! installed copy: a lock version ahead of the URL escalates to the
//! installed version, a lock version behind the URL is operator error. A
//! version above the declared range is never auto-resolved - it means the
//! manifest itself is stale.

use semver::{Comparator, Op, Version, VersionReq};

use super::diagnostics::Diagnostics;
use super::errors::ReconcileError;
use super::sources::{DependencyClass, LockKind, VersionSources};
use super::types::PackageName;

/// What to do with the reference's version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictAction {
    /// The location string is kept verbatim.
    Unchanged,
    /// The location is rewritten with this (installed) version.
    RewriteToVersion(String),
}

/// The reconciliation engine's output for one reference.
///
/// Created fresh per reference; immutable once produced.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub action: VerdictAction,
    /// Whether a lock record participated in the decision (diagnostics).
    pub used_pinned_record: bool,
    /// Set when force mode tolerated a missing local copy; hash material
    /// that cannot be computed is skipped instead of failing.
    pub degraded: bool,
}

/// Which source a version under test came from, for messages and for the
/// below-range tolerance rule.
#[derive(Debug, Clone, Copy)]
enum VersionSourceKind {
    Url,
    Lock(LockKind),
    Installed,
}

impl VersionSourceKind {
    /// Below-range is tolerated (escalates to the installed version) only
    /// for the URL and the installed record itself; a below-range lock
    /// version always requires a lock-file update.
    fn tolerates_below_range(&self) -> bool {
        matches!(self, VersionSourceKind::Url | VersionSourceKind::Installed)
    }
}

impl std::fmt::Display for VersionSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionSourceKind::Url => write!(f, "URL"),
            VersionSourceKind::Lock(kind) => write!(f, "{kind}"),
            VersionSourceKind::Installed => write!(f, "`node_modules` `package.json`"),
        }
    }
}

/// Where a version stands relative to a declared range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeStanding {
    Satisfied,
    Below,
    Above,
}

/// Classify a version against a range.
///
/// Below means strictly under the range's minimal lower bound (the largest
/// lower bound implied by the range's comparators); any other unsatisfied
/// version counts as above.
fn classify(req: &VersionReq, version: &Version) -> RangeStanding {
    if req.matches(version) {
        return RangeStanding::Satisfied;
    }
    let floor = req.comparators.iter().filter_map(comparator_floor).max();
    match floor {
        Some(floor) if *version < floor => RangeStanding::Below,
        _ => RangeStanding::Above,
    }
}

/// The lower bound a single comparator implies, if any.
fn comparator_floor(comparator: &Comparator) -> Option<Version> {
    match comparator.op {
        Op::Exact | Op::Greater | Op::GreaterEq | Op::Tilde | Op::Caret | Op::Wildcard => {
            Some(Version::new(
                comparator.major,
                comparator.minor.unwrap_or(0),
                comparator.patch.unwrap_or(0),
            ))
        }
        Op::Less | Op::LessEq => None,
        _ => None,
    }
}

fn parse_version(
    name: &PackageName,
    version: &str,
    source: VersionSourceKind,
) -> Result<Version, ReconcileError> {
    Version::parse(version).map_err(|e| {
        ReconcileError::VersionInconsistency(format!(
            "could not parse the {source} version \"{version}\" for package \"{name}\": {e}"
        ))
    })
}

/// Check one version under test against the declared range.
///
/// Returns whether the check marked the reference for escalation to the
/// installed version.
fn check_range(
    name: &PackageName,
    class: DependencyClass,
    raw_range: &str,
    req: &VersionReq,
    version: &str,
    source: VersionSourceKind,
    diags: &mut Diagnostics,
) -> Result<bool, ReconcileError> {
    let parsed = parse_version(name, version, source)?;
    match classify(req, &parsed) {
        RangeStanding::Satisfied => {
            diags.info(format!(
                "the {source}'s version ({version}) is satisfied by the {class} \"{name}\"'s \
                 current `package.json` range \"{raw_range}\"; continuing"
            ));
            Ok(false)
        }
        RangeStanding::Below => {
            let detail = format!(
                "the {source}'s version ({version}) is less than the {class} \"{name}\"'s \
                 current `package.json` range \"{raw_range}\""
            );
            if source.tolerates_below_range() {
                diags.warn(format!(
                    "{detail}; checking `node_modules` for a valid installed version to \
                     update the reference"
                ));
                Ok(true)
            } else {
                Err(ReconcileError::VersionInconsistency(format!(
                    "{detail}; update your {source} (e.g. with `npm install`)"
                )))
            }
        }
        RangeStanding::Above => Err(ReconcileError::VersionInconsistency(format!(
            "the {source}'s version ({version}) is greater than the {class} \"{name}\"'s \
             current `package.json` range \"{raw_range}\"; update the `package.json` range \
             to support the higher version, or downgrade the version in the {source}"
        ))),
    }
}

/// Run the decision table for one matched reference.
///
/// `url_version` is the version declared in the location string, absent for
/// locations already in local-cache form (those skip the three-way
/// comparison and are rewritten from the installed version directly).
///
/// # Errors
///
/// Any row of the table can fail with a `ConfigurationInconsistency` or
/// `VersionInconsistency`; a missing installed copy fails unless force mode
/// tolerates it (degraded verdict).
pub fn reconcile(
    name: &PackageName,
    url_version: Option<&str>,
    sources: &VersionSources,
    force: bool,
    diags: &mut Diagnostics,
) -> Result<Verdict, ReconcileError> {
    let declared = sources.declared_range(name.as_str()).ok_or_else(|| {
        ReconcileError::ConfigurationInconsistency(format!(
            "package \"{name}\" is not found in `package.json`"
        ))
    })?;
    let req = VersionReq::parse(declared.raw).map_err(|e| {
        ReconcileError::ConfigurationInconsistency(format!(
            "could not parse the `package.json` range \"{}\" for package \"{name}\": {e}",
            declared.raw
        ))
    })?;

    // A location with no version field is already in local form; it is
    // rewritten from the installed version without the three-way comparison.
    let mut escalate = url_version.is_none();
    let mut used_pinned_record = false;

    if let Some(url_version) = url_version {
        escalate |= check_range(
            name,
            declared.class,
            declared.raw,
            &req,
            url_version,
            VersionSourceKind::Url,
            diags,
        )?;

        if let Some((pinned, lock_kind)) = sources.pinned(name.as_str()) {
            used_pinned_record = true;

            if let Some(lock_dev) = pinned.dev {
                let manifest_dev = declared.class == DependencyClass::Development;
                if lock_dev != manifest_dev {
                    let (manifest_class, lock_class) = if manifest_dev {
                        (DependencyClass::Development, DependencyClass::Runtime)
                    } else {
                        (DependencyClass::Runtime, DependencyClass::Development)
                    };
                    return Err(ReconcileError::ConfigurationInconsistency(format!(
                        "package \"{name}\" is a {manifest_class} in `package.json` but is \
                         recorded as a {lock_class} in {lock_kind}; re-generate the lock file"
                    )));
                }
            }

            let source = VersionSourceKind::Lock(lock_kind);
            let pinned_version = parse_version(name, &pinned.version, source)?;
            let url_parsed = parse_version(name, url_version, VersionSourceKind::Url)?;
            if pinned_version == url_parsed {
                diags.info(format!(
                    "dependency \"{name}\" in your lock file already matches the URL \
                     version ({url_version})"
                ));
            } else if pinned_version > url_parsed {
                diags.warn(format!(
                    "the lock file version {} is greater for package \"{name}\" than the URL \
                     version {url_version}; checking `node_modules` for a valid installed \
                     version to update the reference",
                    pinned.version
                ));
                escalate = true;
            } else {
                return Err(ReconcileError::VersionInconsistency(format!(
                    "the lock file version {} is less for package \"{name}\" than the URL \
                     version {url_version}; update your lock file (or downgrade the version \
                     in your URL)",
                    pinned.version
                )));
            }

            check_range(
                name,
                declared.class,
                declared.raw,
                &req,
                &pinned.version,
                source,
                diags,
            )?;
        }
    }

    match sources.installed_version(name.as_str()) {
        Some(installed) => {
            diags.info(format!(
                "found a valid `package.json` for \"{name}\" (version {installed})"
            ));
            escalate |= check_range(
                name,
                declared.class,
                declared.raw,
                &req,
                &installed,
                VersionSourceKind::Installed,
                diags,
            )?;
            let action = if escalate {
                VerdictAction::RewriteToVersion(installed)
            } else {
                VerdictAction::Unchanged
            };
            Ok(Verdict {
                action,
                used_pinned_record,
                degraded: false,
            })
        }
        None if force => {
            diags.warn(format!(
                "no valid `package.json` found for \"{name}\"; continuing without local \
                 verification"
            ));
            Ok(Verdict {
                action: VerdictAction::Unchanged,
                used_pinned_record,
                degraded: true,
            })
        }
        None if escalate => Err(ReconcileError::VersionInconsistency(format!(
            "package \"{name}\" must be rewritten to an installed version, but no valid \
             `node_modules/{name}/package.json` was found; install it locally (e.g. with \
             `npm install`)"
        ))),
        None => Err(ReconcileError::LocalResourceMissing(
            sources.installed_manifest_path(name.as_str()),
        )),
    }
}
