//! engine::pipeline
//!
//! The per-reference reconciliation pipeline: match, version
//! reconciliation, local-path resolution, hash reconciliation, rewrite,
//! and (optionally) reachability verification, in that causal order.
//!
//! Each pipeline reads only the immutable run context and writes only its
//! own update record and diagnostics, so any number of pipelines run
//! concurrently without locking. A failure aborts only this reference's
//! pipeline; the engine turns that into a run-level failure.

use std::sync::Arc;

use crate::core::catalog::PatternCatalog;
use crate::core::config::Options;
use crate::core::diagnostics::Diagnostics;
use crate::core::errors::ReconcileError;
use crate::core::integrity::{reconcile_hashes, IntegritySet};
use crate::core::reconcile::reconcile;
use crate::core::rewrite::{rewrite, RewritePlan};
use crate::core::sources::VersionSources;
use crate::digest::digest_bytes;
use crate::document::{Reference, ReferenceUpdate};
use crate::probe::UrlProbe;

/// The immutable shared state one run executes against.
///
/// Loaded once before the engine starts; reference pipelines hold it via
/// `Arc` and never mutate it.
pub struct RunContext {
    pub options: Options,
    pub catalog: PatternCatalog,
    pub sources: VersionSources,
    pub probe: Arc<dyn UrlProbe>,
}

/// Run the pipeline for one reference.
///
/// Returns `None` when no catalog pattern recognizes the location (the
/// reference is left untouched), otherwise the update record to hand back
/// to the document strategy, plus this reference's diagnostics.
pub async fn reconcile_reference(
    ctx: &RunContext,
    reference: &Reference,
) -> Result<(Option<ReferenceUpdate>, Diagnostics), ReconcileError> {
    let mut diags = Diagnostics::new();

    let Some(matched) = ctx.catalog.find_match(&reference.location)? else {
        return Ok((None, diags));
    };

    let verdict = reconcile(
        &matched.package,
        matched.version.as_deref(),
        &ctx.sources,
        ctx.options.force_integrity_checks,
        &mut diags,
    )?;

    let plan = match rewrite(
        &ctx.catalog,
        &matched,
        &reference.location,
        &verdict,
        reference.cdn.as_deref(),
        ctx.options.local,
        ctx.sources.root(),
    ) {
        Ok(plan) => Some(plan),
        Err(ReconcileError::LocalResourceMissing(path)) if verdict.degraded => {
            diags.warn(format!(
                "the local path `{}` could not be found; skipping hash verification",
                path.display()
            ));
            None
        }
        Err(e) => return Err(e),
    };

    let integrity = match &plan {
        Some(plan) => {
            reconcile_hashes(
                &plan.local_file,
                reference.integrity.as_deref(),
                &reference.algorithms,
                &ctx.options.algorithms,
                &mut diags,
            )
            .await?
        }
        None => IntegritySet::new(),
    };

    let new_location = plan
        .as_ref()
        .map(|p: &RewritePlan| p.new_location.clone())
        .unwrap_or_else(|| reference.location.clone());

    if !ctx.options.local && !ctx.options.ignore_url_fetches {
        verify_reachability(
            ctx.probe.as_ref(),
            &new_location,
            ctx.options.url_integrity_check,
            &integrity,
            &mut diags,
        )
        .await?;
    }

    let kind_key = reference.kind.section();
    let global_check = ctx
        .options
        .global_checks
        .get(matched.package.as_str())
        .and_then(|kinds| kinds.get(kind_key))
        .cloned()
        .or_else(|| reference.global_check.clone());

    let add_crossorigin = if ctx.options.local {
        None
    } else {
        ctx.options
            .add_crossorigin
            .clone()
            .or_else(|| reference.crossorigin.clone())
    };

    let update = ReferenceUpdate {
        new_location,
        local_path: plan.map(|p| p.local_relative),
        new_integrity: if integrity.is_empty() {
            None
        } else {
            Some(integrity.to_attribute_value())
        },
        add_crossorigin,
        fallback: ctx.options.fallback || reference.fallback,
        global_check,
        local_mode: ctx.options.local,
        omit_local_integrity: ctx.options.no_local_integrity,
    };

    Ok((Some(update), diags))
}

/// Confirm a remote location resolves, optionally cross-checking its
/// content against every digest in the reconciled set.
///
/// # Errors
///
/// Any non-success status, connection failure, or content-digest mismatch
/// is a `NetworkResourceUnreachable`. A mismatch here is an unexpected
/// state - the local and CDN copies of the same version should match.
pub async fn verify_reachability(
    probe: &dyn UrlProbe,
    url: &str,
    full_check: bool,
    integrity: &IntegritySet,
    diags: &mut Diagnostics,
) -> Result<(), ReconcileError> {
    let response = probe.probe(url, full_check).await.map_err(|e| {
        ReconcileError::NetworkResourceUnreachable(format!("{e} while probing {url}"))
    })?;

    if response.status != 200 {
        return Err(ReconcileError::NetworkResourceUnreachable(format!(
            "received status code {} response for {url}",
            response.status
        )));
    }
    diags.info(format!(
        "received status code {} response for {url}",
        response.status
    ));

    if full_check {
        let body = response.body.unwrap_or_default();
        for (algorithm, digest) in integrity.iter() {
            let remote_digest = digest_bytes(*algorithm, &body);
            if &remote_digest != digest {
                return Err(ReconcileError::NetworkResourceUnreachable(format!(
                    "local hash of algorithm {algorithm} does not match hash for content \
                     from URL \"{url}\""
                )));
            }
            diags.info(format!(
                "hash of algorithm {algorithm} matches content from URL {url}"
            ));
        }
    }

    Ok(())
}
