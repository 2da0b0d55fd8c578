//! document
//!
//! Document strategies: the abstraction the engine uses to discover
//! references in a document and to apply reconciliation results back to it.
//!
//! # Design
//!
//! Two concrete strategies exist: [`MarkupStrategy`] for HTML-like
//! documents and [`RecordStrategy`] for JSON manifests keyed by logical
//! package name. The reconciliation core never depends on which variant
//! supplied a [`Reference`]; a reference's link back to its document node is
//! an opaque index into the owning strategy's internal slot list, so the
//! core stays serializable and testable without a real document tree.

pub mod markup;
pub mod record;

pub use markup::MarkupStrategy;
pub use record::RecordStrategy;

use std::path::Path;

use thiserror::Error;

use crate::core::types::ReferenceKind;

/// Errors from document parsing, mutation or serialization.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// An update referred to a reference index the strategy does not know.
    #[error("unknown reference index {0}")]
    UnknownReference(usize),

    /// The document could not be serialized.
    #[error("serialize error: {0}")]
    Serialize(String),
}

/// One discovered embed point.
///
/// `index` is the opaque handle back into the owning strategy; the core
/// never mutates documents directly, it returns a [`ReferenceUpdate`]
/// describing the desired mutation instead.
#[derive(Debug, Clone)]
pub struct Reference {
    /// Index into the owning strategy's reference list.
    pub index: usize,
    /// Script or stylesheet.
    pub kind: ReferenceKind,
    /// The URL or local path as currently written.
    pub location: String,
    /// The integrity value as currently written, if any.
    pub integrity: Option<String>,
    /// Per-reference algorithm whitelist (raw tokens; validated by the
    /// hash reconciliation engine).
    pub algorithms: Vec<String>,
    /// Explicit CDN identity override.
    pub cdn: Option<String>,
    /// Per-reference crossorigin value (record documents only).
    pub crossorigin: Option<String>,
    /// Whether a local-copy fallback was requested on the reference.
    pub fallback: bool,
    /// Guard expression for the fallback snippet; opaque to the core.
    pub global_check: Option<String>,
}

/// The mutation the engine hands back to the strategy for one reference.
#[derive(Debug, Clone)]
pub struct ReferenceUpdate {
    /// The reconciled location (CDN form, or local path in local mode).
    pub new_location: String,
    /// The local-cache path the reference resolves to, when one exists.
    pub local_path: Option<String>,
    /// The reconciled integrity value; `None` means no integrity material
    /// survived (or none was requested).
    pub new_integrity: Option<String>,
    /// `crossorigin` value to set on integrity-carrying references.
    pub add_crossorigin: Option<String>,
    /// Whether a fallback snippet/flag should be recorded.
    pub fallback: bool,
    /// Guard expression for the fallback, resolved for this reference's
    /// kind.
    pub global_check: Option<String>,
    /// Whether the run rewrites to local paths.
    pub local_mode: bool,
    /// Whether integrity should be omitted for local-path rewrites.
    pub omit_local_integrity: bool,
}

/// Serialization options forwarded from the configuration.
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    /// Indent width for record documents (default 2, 0 = compact).
    pub json_space: Option<usize>,
    /// Comment prepended to markup documents.
    pub disclaimer: Option<String>,
}

/// A document's reference-extraction and mutation capability.
///
/// Implementations must be `Send` so documents can be processed on worker
/// tasks.
pub trait DocumentStrategy: Send {
    /// Parse the document and list its references, in document order.
    fn extract_references(&mut self, contents: &str) -> Result<Vec<Reference>, DocumentError>;

    /// Apply one reconciliation result to the document.
    fn apply_update(
        &mut self,
        reference: &Reference,
        update: &ReferenceUpdate,
    ) -> Result<(), DocumentError>;

    /// Serialize the (possibly updated) document.
    fn serialize(&self, options: &SerializeOptions) -> Result<String, DocumentError>;
}

/// Choose the strategy for a file path: `.json` documents use the record
/// strategy, everything else is treated as markup.
pub fn strategy_for_path(path: &Path) -> Box<dyn DocumentStrategy> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Box::new(RecordStrategy::new()),
        _ => Box::new(MarkupStrategy::new()),
    }
}
