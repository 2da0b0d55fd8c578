//! core::integrity
//!
//! The hash reconciliation engine: parses a reference's existing integrity
//! value, applies the operator and per-reference algorithm whitelists, and
//! recomputes every surviving digest from the local file.
//!
//! # Rules
//!
//! - Malformed integrity tokens and unrecognized algorithms are fatal;
//!   a recognized-but-unwhitelisted algorithm is dropped with a warning.
//! - The combined operator + per-reference whitelist only *filters*; only
//!   the per-reference algorithm list *adds* algorithms that were not
//!   previously present.
//! - The freshly computed digest always wins; a differing previously
//!   declared digest downgrades to a mismatch warning, never a failure.
//! - Output preserves first-seen algorithm order, and no existing integrity
//!   plus no requested algorithms yields an empty set (integrity omitted).
//!
//! The local file is read once and every digest is computed from the same
//! bytes, so per-algorithm computation is concurrent-safe by construction
//! and diagnostics stay index-stable relative to the parsed integrity list.

use std::path::Path;

use super::diagnostics::Diagnostics;
use super::errors::ReconcileError;
use super::types::SriAlgorithm;
use crate::digest::digest_bytes;

/// An ordered algorithm -> base64 digest mapping with unique keys.
///
/// Insertion order is discovery order; re-inserting an algorithm replaces
/// its digest in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegritySet {
    entries: Vec<(SriAlgorithm, String)>,
}

impl IntegritySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the digest for an algorithm, keeping first-seen
    /// position on replacement.
    pub fn insert(&mut self, algorithm: SriAlgorithm, digest: String) {
        if let Some(entry) = self.entries.iter_mut().find(|(a, _)| *a == algorithm) {
            entry.1 = digest;
        } else {
            self.entries.push((algorithm, digest));
        }
    }

    pub fn contains(&self, algorithm: SriAlgorithm) -> bool {
        self.entries.iter().any(|(a, _)| *a == algorithm)
    }

    pub fn get(&self, algorithm: SriAlgorithm) -> Option<&str> {
        self.entries
            .iter()
            .find(|(a, _)| *a == algorithm)
            .map(|(_, d)| d.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(SriAlgorithm, String)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as an `integrity` attribute value: space-separated
    /// `algorithm-digest` pairs in insertion order.
    pub fn to_attribute_value(&self) -> String {
        self.entries
            .iter()
            .map(|(algorithm, digest)| format!("{algorithm}-{digest}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Parse an integrity attribute value into `(algorithm, digest)` pairs.
///
/// Duplicate algorithms are preserved here (the reconciliation pass
/// collapses them); order is the attribute's token order.
///
/// # Errors
///
/// A token without an `algorithm-digest` separator, or one naming an
/// algorithm outside the permitted set, is an `IntegrityInconsistency`
/// naming the literal offending token.
pub fn parse_integrity_value(
    value: &str,
) -> Result<Vec<(SriAlgorithm, String)>, ReconcileError> {
    let mut pairs = Vec::new();
    for token in value.split_whitespace() {
        let Some((algorithm, digest)) = token.split_once('-') else {
            return Err(ReconcileError::IntegrityInconsistency(format!(
                "bad integrity value, \"{token}\""
            )));
        };
        let Some(algorithm) = SriAlgorithm::from_token(algorithm) else {
            return Err(ReconcileError::IntegrityInconsistency(format!(
                "unrecognized algorithm: \"{algorithm}\" (obtained from integrity value, \
                 \"{token}\")"
            )));
        };
        pairs.push((algorithm, digest.to_string()));
    }
    Ok(pairs)
}

fn validate_algorithm_list(
    tokens: &[String],
    origin: &str,
) -> Result<Vec<SriAlgorithm>, ReconcileError> {
    let mut algorithms = Vec::new();
    for token in tokens {
        let Some(algorithm) = SriAlgorithm::from_token(token) else {
            return Err(ReconcileError::IntegrityInconsistency(format!(
                "unrecognized algorithm \"{token}\" in the {origin} algorithm list"
            )));
        };
        if !algorithms.contains(&algorithm) {
            algorithms.push(algorithm);
        }
    }
    Ok(algorithms)
}

/// Reconcile the integrity material for one reference against its local
/// file.
///
/// `existing` is the integrity value currently written on the reference;
/// `per_reference` and `operator` are the two algorithm whitelists (raw
/// tokens, validated here).
///
/// # Errors
///
/// Malformed integrity syntax, unrecognized algorithms, or an unreadable
/// local file.
pub async fn reconcile_hashes(
    local_file: &Path,
    existing: Option<&str>,
    per_reference: &[String],
    operator: &[String],
    diags: &mut Diagnostics,
) -> Result<IntegritySet, ReconcileError> {
    let pairs = existing.map(parse_integrity_value).transpose()?.unwrap_or_default();
    let per_reference = validate_algorithm_list(per_reference, "per-reference")?;
    let operator = validate_algorithm_list(operator, "operator")?;

    let mut whitelist = operator;
    for algorithm in &per_reference {
        if !whitelist.contains(algorithm) {
            whitelist.push(*algorithm);
        }
    }
    let whitelist_active = !whitelist.is_empty();

    let survives =
        |algorithm: &SriAlgorithm| !whitelist_active || whitelist.contains(algorithm);
    let additions: Vec<SriAlgorithm> = per_reference
        .iter()
        .filter(|algorithm| !pairs.iter().any(|(a, _)| a == *algorithm))
        .copied()
        .collect();

    // An all-dropped reference with nothing to add never touches the file.
    let needs_file = !additions.is_empty() || pairs.iter().any(|(a, _)| survives(a));
    let bytes = if needs_file {
        tokio::fs::read(local_file)
            .await
            .map_err(|_| ReconcileError::LocalResourceMissing(local_file.to_path_buf()))?
    } else {
        Vec::new()
    };

    // One pass in attribute order keeps diagnostics index-stable.
    let mut set = IntegritySet::new();
    for (index, (algorithm, declared)) in pairs.into_iter().enumerate() {
        if !survives(&algorithm) {
            diags.warn(format!(
                "algorithm whitelist did not specify detected \"{algorithm}\", so dropping"
            ));
            continue;
        }
        let computed = digest_bytes(algorithm, &bytes);
        if computed == declared {
            diags.info(format!(
                "local hash matches corresponding hash (index {index}) within the integrity \
                 attribute; algorithm: {algorithm}; file {}",
                local_file.display()
            ));
        } else {
            diags.warn(format!(
                "local hash {computed} does not match corresponding hash (index {index}) \
                 within the integrity attribute ({declared}); algorithm: {algorithm}; \
                 file {}",
                local_file.display()
            ));
        }
        set.insert(algorithm, computed);
    }

    for algorithm in additions {
        let computed = digest_bytes(algorithm, &bytes);
        diags.info(format!(
            "computed {algorithm} digest for newly requested algorithm; file {}",
            local_file.display()
        ));
        set.insert(algorithm, computed);
    }

    Ok(set)
}
