//! digest
//!
//! SRI digest computation over file contents.
//!
//! Digests are rendered the way integrity values carry them: standard
//! base64 over the raw hash bytes, no padding stripped.
//!
//! # Example
//!
//! ```
//! use srisync::core::types::SriAlgorithm;
//! use srisync::digest::digest_bytes;
//!
//! let digest = digest_bytes(SriAlgorithm::Sha384, b"alert(1);\n");
//! assert_eq!(digest.len(), 64); // 384 bits, base64-encoded
//! ```

use std::io;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest as _, Sha256, Sha384, Sha512};

use crate::core::types::SriAlgorithm;

/// Compute the base64 digest of a byte slice for one algorithm.
pub fn digest_bytes(algorithm: SriAlgorithm, bytes: &[u8]) -> String {
    match algorithm {
        SriAlgorithm::Sha256 => STANDARD.encode(Sha256::digest(bytes)),
        SriAlgorithm::Sha384 => STANDARD.encode(Sha384::digest(bytes)),
        SriAlgorithm::Sha512 => STANDARD.encode(Sha512::digest(bytes)),
    }
}

/// Compute the base64 digest of a file's contents for one algorithm.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be read.
pub fn digest_file(algorithm: SriAlgorithm, path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(digest_bytes(algorithm, &bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Precomputed with `openssl dgst -sha256 -binary | base64` over "hello\n".
    const HELLO_SHA256: &str = "WCzapvTSpMF55/LTrzcywOdTF0HX0t/mLq3L0gnJASM=";

    #[test]
    fn sha256_known_vector() {
        assert_eq!(digest_bytes(SriAlgorithm::Sha256, b"hello\n"), HELLO_SHA256);
    }

    #[test]
    fn digests_differ_by_algorithm() {
        let bytes = b"console.log('x');";
        let d256 = digest_bytes(SriAlgorithm::Sha256, bytes);
        let d384 = digest_bytes(SriAlgorithm::Sha384, bytes);
        let d512 = digest_bytes(SriAlgorithm::Sha512, bytes);
        assert_ne!(d256, d384);
        assert_ne!(d384, d512);
        // 256/384/512 bits as base64 (with padding).
        assert_eq!(d256.len(), 44);
        assert_eq!(d384.len(), 64);
        assert_eq!(d512.len(), 88);
    }

    #[test]
    fn file_digest_matches_bytes_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asset.js");
        std::fs::write(&path, b"hello\n").unwrap();
        assert_eq!(
            digest_file(SriAlgorithm::Sha256, &path).unwrap(),
            HELLO_SHA256
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(digest_file(SriAlgorithm::Sha256, &dir.path().join("absent.js")).is_err());
    }
}
