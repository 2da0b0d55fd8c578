//! core::errors
//!
//! The reconciliation failure taxonomy.
//!
//! # Design
//!
//! Every hard failure during reconciliation falls into one of these kinds.
//! All of them abort the current run; warnings travel separately through
//! [`crate::core::diagnostics`]. Messages name the offending package, the
//! compared versions, and the remediation, so they are surfaced verbatim.

use std::path::PathBuf;

use thiserror::Error;

/// A hard reconciliation failure. Any variant aborts the whole run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The project's declared dependencies and the reference disagree at a
    /// structural level: the package is unknown, a range is unparsable, or
    /// the manifest and lock file disagree about the dependency class.
    #[error("{0}")]
    ConfigurationInconsistency(String),

    /// A version comparison failed in a way that requires operator action
    /// (above-range URL, lock behind URL, below-range with no local copy).
    #[error("{0}")]
    VersionInconsistency(String),

    /// Malformed integrity syntax or an unrecognized digest algorithm.
    #[error("{0}")]
    IntegrityInconsistency(String),

    /// The computed local dependency path does not exist; hashing requires
    /// a real file.
    #[error("the local path `{0}` could not be found")]
    LocalResourceMissing(PathBuf),

    /// A reachability probe failed, returned a non-success status, or the
    /// remote content did not match the local digests.
    #[error("{0}")]
    NetworkResourceUnreachable(String),

    /// A version source file could not be read.
    #[error("failed to read `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn local_resource_missing_names_path() {
        let err = ReconcileError::LocalResourceMissing(Path::new("node_modules/x/x.js").into());
        assert_eq!(
            err.to_string(),
            "the local path `node_modules/x/x.js` could not be found"
        );
    }

    #[test]
    fn message_variants_surface_verbatim() {
        let err = ReconcileError::ConfigurationInconsistency(
            "package \"left-pad\" is not found in `package.json`".into(),
        );
        assert_eq!(
            err.to_string(),
            "package \"left-pad\" is not found in `package.json`"
        );
    }
}
