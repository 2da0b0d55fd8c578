//! core::rewrite
//!
//! The reference locator/rewriter: applies a reconciliation verdict to
//! produce the final location string and the local dependency-cache path.
//!
//! The local path is always computed (hashing requires a real file) by
//! substituting the matched fields into the local-cache template of the
//! matched pattern. The remote location is either that local path
//! (local-only mode) or a CDN-form location built from the rewrite template
//! selected by CDN identity: per-reference hint, else the operator's
//! package-to-CDN map, else the matched pattern's own CDN. The version field
//! is substituted only when the verdict mandates rewriting; otherwise the
//! original location is preserved verbatim to avoid unintended churn.

use std::path::{Path, PathBuf};

use super::catalog::{MatchResult, PatternCatalog};
use super::errors::ReconcileError;
use super::reconcile::{Verdict, VerdictAction};

/// The rewriter's output for one reference.
#[derive(Debug, Clone)]
pub struct RewritePlan {
    /// The location to write back into the document.
    pub new_location: String,
    /// The local-cache path, relative, as substituted from the template
    /// (kept verbatim for fallback snippets and record `local` fields).
    pub local_relative: String,
    /// The on-disk path the relative path resolves to; verified to exist.
    pub local_file: PathBuf,
}

/// Build the rewrite plan for a matched reference.
///
/// # Errors
///
/// `LocalResourceMissing` when the substituted local path does not exist.
pub fn rewrite(
    catalog: &PatternCatalog,
    matched: &MatchResult,
    location: &str,
    verdict: &Verdict,
    cdn_hint: Option<&str>,
    local_mode: bool,
    root: &Path,
) -> Result<RewritePlan, ReconcileError> {
    let regex = catalog.pattern(matched.pattern_index);

    let local_template = catalog.local_template(matched.pattern_index);
    let local_relative = regex.replace(location, local_template).into_owned();
    let local_file = root.join(local_relative.trim_start_matches(['.', '/']));
    if !local_file.exists() {
        return Err(ReconcileError::LocalResourceMissing(local_file));
    }

    let new_location = if local_mode {
        local_relative.clone()
    } else {
        match &verdict.action {
            VerdictAction::Unchanged => location.to_string(),
            VerdictAction::RewriteToVersion(version) => {
                let cdn_name =
                    cdn_hint.or_else(|| catalog.cdn_for_package(matched.package.as_str()));
                let template = catalog.cdn_template_for(matched.pattern_index, cdn_name);
                let substituted = template.replace("${version}", version);
                regex.replace(location, substituted.as_str()).into_owned()
            }
        }
    };

    Ok(RewritePlan {
        new_location,
        local_relative,
        local_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reconcile::VerdictAction;
    use std::path::Path;
    use tempfile::TempDir;

    fn install(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"asset").unwrap();
    }

    fn verdict(action: VerdictAction) -> Verdict {
        Verdict {
            action,
            used_pinned_record: false,
            degraded: false,
        }
    }

    fn matched(catalog: &PatternCatalog, location: &str) -> MatchResult {
        catalog.find_match(location).unwrap().unwrap()
    }

    #[test]
    fn rewrites_unpkg_url_to_installed_version() {
        let temp = TempDir::new().unwrap();
        install(temp.path(), "node_modules/leaflet/dist/leaflet.css");

        let catalog = PatternCatalog::standard();
        let location = "https://unpkg.com/leaflet@1.5.0/dist/leaflet.css";
        let plan = rewrite(
            &catalog,
            &matched(&catalog, location),
            location,
            &verdict(VerdictAction::RewriteToVersion("1.7.1".into())),
            None,
            false,
            temp.path(),
        )
        .unwrap();

        assert_eq!(
            plan.new_location,
            "https://unpkg.com/leaflet@1.7.1/dist/leaflet.css"
        );
        assert_eq!(plan.local_relative, "node_modules/leaflet/dist/leaflet.css");
    }

    #[test]
    fn unchanged_verdict_preserves_location_verbatim() {
        let temp = TempDir::new().unwrap();
        install(temp.path(), "node_modules/leaflet/dist/leaflet.js");

        let catalog = PatternCatalog::standard();
        let location = "https://unpkg.com/leaflet@1.7.1/dist/leaflet.js";
        let plan = rewrite(
            &catalog,
            &matched(&catalog, location),
            location,
            &verdict(VerdictAction::Unchanged),
            None,
            false,
            temp.path(),
        )
        .unwrap();
        assert_eq!(plan.new_location, location);
    }

    #[test]
    fn local_mode_substitutes_local_path() {
        let temp = TempDir::new().unwrap();
        install(temp.path(), "node_modules/leaflet/dist/leaflet.js");

        let catalog = PatternCatalog::standard();
        let location = "https://unpkg.com/leaflet@1.7.1/dist/leaflet.js";
        let plan = rewrite(
            &catalog,
            &matched(&catalog, location),
            location,
            &verdict(VerdictAction::Unchanged),
            None,
            true,
            temp.path(),
        )
        .unwrap();
        assert_eq!(plan.new_location, "node_modules/leaflet/dist/leaflet.js");
    }

    #[test]
    fn jquery_cdn_maps_to_dist_local_path() {
        let temp = TempDir::new().unwrap();
        install(temp.path(), "node_modules/jquery/dist/jquery.min.js");

        let catalog = PatternCatalog::standard();
        let location = "https://code.jquery.com/jquery-3.5.1.min.js";
        let plan = rewrite(
            &catalog,
            &matched(&catalog, location),
            location,
            &verdict(VerdictAction::RewriteToVersion("3.5.1".into())),
            None,
            false,
            temp.path(),
        )
        .unwrap();

        assert_eq!(plan.local_relative, "node_modules/jquery/dist/jquery.min.js");
        // jquery is mapped to its own CDN by the default package map.
        assert_eq!(plan.new_location, "https://code.jquery.com/jquery-3.5.1.min.js");
    }

    #[test]
    fn node_modules_reference_regenerates_cdn_url() {
        let temp = TempDir::new().unwrap();
        install(temp.path(), "node_modules/lodash/lodash.min.js");

        let catalog = PatternCatalog::standard();
        let location = "../node_modules/lodash/lodash.min.js";
        let m = matched(&catalog, location);
        assert_eq!(m.pattern_index, 1);
        let plan = rewrite(
            &catalog,
            &m,
            location,
            &verdict(VerdictAction::RewriteToVersion("4.17.21".into())),
            None,
            false,
            temp.path(),
        )
        .unwrap();
        assert_eq!(
            plan.new_location,
            "https://unpkg.com/lodash@4.17.21/lodash.min.js"
        );
        assert_eq!(plan.local_relative, "../node_modules/lodash/lodash.min.js");
    }

    #[test]
    fn cdn_hint_overrides_matched_pattern() {
        let temp = TempDir::new().unwrap();
        install(temp.path(), "node_modules/leaflet/dist/leaflet.js");

        let catalog = PatternCatalog::standard();
        let location = "https://unpkg.com/leaflet@1.5.0/dist/leaflet.js";
        let plan = rewrite(
            &catalog,
            &matched(&catalog, location),
            location,
            &verdict(VerdictAction::RewriteToVersion("1.7.1".into())),
            Some("jsdelivr"),
            false,
            temp.path(),
        )
        .unwrap();
        assert_eq!(
            plan.new_location,
            "https://cdn.jsdelivr.net/npm/leaflet@1.7.1/dist/leaflet.js"
        );
    }

    #[test]
    fn unknown_cdn_hint_falls_back_to_first_template() {
        let temp = TempDir::new().unwrap();
        // The jquery-CDN local template inserts a dist/jquery segment.
        install(temp.path(), "node_modules/leaflet/dist/jquery/dist/leaflet.js");

        let catalog = PatternCatalog::standard();
        let location = "https://code.jquery.com/leaflet-1.5.0/dist/leaflet.js";
        let m = matched(&catalog, location);
        let plan = rewrite(
            &catalog,
            &m,
            location,
            &verdict(VerdictAction::RewriteToVersion("1.7.1".into())),
            Some("not-a-cdn"),
            false,
            temp.path(),
        )
        .unwrap();
        assert!(plan.new_location.starts_with("https://unpkg.com/"));
    }

    #[test]
    fn missing_local_path_is_fatal() {
        let temp = TempDir::new().unwrap();
        let catalog = PatternCatalog::standard();
        let location = "https://unpkg.com/leaflet@1.7.1/dist/leaflet.js";
        let err = rewrite(
            &catalog,
            &matched(&catalog, location),
            location,
            &verdict(VerdictAction::Unchanged),
            None,
            false,
            temp.path(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::LocalResourceMissing(_)));
    }
}
