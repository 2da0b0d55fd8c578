//! core::diagnostics
//!
//! Per-reference diagnostic collection.
//!
//! # Design
//!
//! Each reference pipeline accumulates its own [`Diagnostics`] and returns
//! it up the call chain; the engine merges them in reference order. There is
//! no shared mutable log between concurrent reconciliations.

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational progress message.
    Info,
    /// A tolerated inconsistency that the run resolved or ignored.
    Warning,
    /// A fatal condition (normally surfaced as an error, not a diagnostic).
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic message with its severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    /// Create an informational diagnostic.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// An ordered collection of diagnostics for one reference pipeline.
///
/// Order is insertion order; the engine relies on this for reproducible
/// output across concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an informational message.
    pub fn info(&mut self, message: impl Into<String>) {
        self.entries.push(Diagnostic::info(message));
    }

    /// Append a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.entries.push(Diagnostic::warning(message));
    }

    /// Append an already-built diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Append every diagnostic from another collection, preserving order.
    pub fn merge(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    /// Whether any warnings were recorded.
    pub fn has_warnings(&self) -> bool {
        self.entries
            .iter()
            .any(|d| d.severity == Severity::Warning)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Consume the collection, yielding the ordered diagnostics.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
