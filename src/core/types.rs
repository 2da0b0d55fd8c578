//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`PackageName`] - Validated npm package name
//! - [`SriAlgorithm`] - One of the three permitted SRI digest algorithms
//! - [`ReferenceKind`] - Whether a reference is a script or a stylesheet
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use srisync::core::types::{PackageName, SriAlgorithm};
//!
//! // Valid constructions
//! let name = PackageName::new("@popperjs/core").unwrap();
//! assert_eq!(name.as_str(), "@popperjs/core");
//!
//! let algo = SriAlgorithm::from_token("sha384").unwrap();
//! assert_eq!(algo.as_str(), "sha384");
//!
//! // Invalid constructions fail at creation time
//! assert!(PackageName::new("has space").is_err());
//! assert!(SriAlgorithm::from_token("md5").is_none());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid package name: {0}")]
    InvalidPackageName(String),
}

/// Whether a reference loads a script or a stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// A `<script src>` element or a `script` record entry.
    Script,
    /// A `<link rel="stylesheet" href>` element or a `link` record entry.
    Stylesheet,
}

impl ReferenceKind {
    /// The record-strategy section name this kind is stored under.
    pub fn section(&self) -> &'static str {
        match self {
            ReferenceKind::Script => "script",
            ReferenceKind::Stylesheet => "link",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Script => write!(f, "script"),
            ReferenceKind::Stylesheet => write!(f, "stylesheet"),
        }
    }
}

/// One of the three digest algorithms permitted in an `integrity` value.
///
/// Consumers of SRI metadata recognize exactly these; anything else in an
/// integrity value is a hard error rather than a silent drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SriAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl SriAlgorithm {
    /// All permitted algorithms, in ascending digest-width order.
    pub const ALL: [SriAlgorithm; 3] = [
        SriAlgorithm::Sha256,
        SriAlgorithm::Sha384,
        SriAlgorithm::Sha512,
    ];

    /// Parse an algorithm token such as `sha384`.
    ///
    /// Returns `None` for anything outside the permitted set; the caller
    /// decides whether that is fatal (it is, for integrity values).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "sha256" => Some(SriAlgorithm::Sha256),
            "sha384" => Some(SriAlgorithm::Sha384),
            "sha512" => Some(SriAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Get the algorithm token as used in integrity values.
    pub fn as_str(&self) -> &'static str {
        match self {
            SriAlgorithm::Sha256 => "sha256",
            SriAlgorithm::Sha384 => "sha384",
            SriAlgorithm::Sha512 => "sha512",
        }
    }
}

impl std::fmt::Display for SriAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated npm package name, possibly scoped.
///
/// The rules are a practical subset of the registry's:
/// - Cannot be empty
/// - May start with a single `@scope/` segment
/// - At most one `/` (the scope separator)
/// - No whitespace, quotes, or control characters
///
/// # Example
///
/// ```
/// use srisync::core::types::PackageName;
///
/// let plain = PackageName::new("jquery").unwrap();
/// assert_eq!(plain.as_str(), "jquery");
///
/// let scoped = PackageName::new("@popperjs/core").unwrap();
/// assert_eq!(scoped.as_str(), "@popperjs/core");
///
/// assert!(PackageName::new("").is_err());
/// assert!(PackageName::new("a b").is_err());
/// assert!(PackageName::new("a/b/c").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Create a new validated package name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPackageName` if the name violates the rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidPackageName(
                "package name cannot be empty".into(),
            ));
        }

        if name.chars().any(|c| c.is_whitespace() || c.is_ascii_control()) {
            return Err(TypeError::InvalidPackageName(
                "package name cannot contain whitespace or control characters".into(),
            ));
        }

        const INVALID_CHARS: [char; 4] = ['"', '\'', '<', '>'];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidPackageName(format!(
                    "package name cannot contain '{c}'"
                )));
            }
        }

        let slashes = name.matches('/').count();
        if name.starts_with('@') {
            if slashes != 1 {
                return Err(TypeError::InvalidPackageName(
                    "scoped package name must be '@scope/name'".into(),
                ));
            }
            if name.len() < 4 || name.ends_with('/') || name[1..].starts_with('/') {
                return Err(TypeError::InvalidPackageName(
                    "scoped package name must be '@scope/name'".into(),
                ));
            }
        } else {
            if slashes != 0 {
                return Err(TypeError::InvalidPackageName(
                    "unscoped package name cannot contain '/'".into(),
                ));
            }
            if name.contains('@') {
                return Err(TypeError::InvalidPackageName(
                    "'@' is only allowed as a scope prefix".into(),
                ));
            }
        }

        Ok(())
    }

    /// Get the package name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PackageName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PackageName> for String {
    fn from(name: PackageName) -> Self {
        name.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
