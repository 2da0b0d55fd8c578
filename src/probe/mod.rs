//! probe
//!
//! URL reachability probing abstraction.
//!
//! # Design
//!
//! The `UrlProbe` trait is async because probing involves network I/O.
//! The engine only depends on the trait, so tests can substitute
//! [`mock::MockProbe`] for deterministic behavior. There is no retry
//! policy and no engine-level timeout; a single failed probe fails the
//! owning reference's pipeline, and timeouts belong to the HTTP client.

pub mod http;
pub mod mock;

pub use http::HttpProbe;
pub use mock::MockProbe;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from probe operations.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),
}

/// What a probe observed.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    /// HTTP status code.
    pub status: u16,
    /// The response body, present only for full-body probes.
    pub body: Option<Vec<u8>>,
}

/// The probe capability: a lightweight existence check, optionally
/// retrieving the body for content cross-checks.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; probes for different references
/// run concurrently.
#[async_trait]
pub trait UrlProbe: Send + Sync {
    /// The probe implementation name (for diagnostics).
    fn name(&self) -> &'static str;

    /// Probe a URL. `full_body` selects a GET with body retrieval instead
    /// of a HEAD request.
    ///
    /// # Errors
    ///
    /// `ProbeError::Network` for connection-level failures; HTTP error
    /// statuses are returned in [`ProbeResponse::status`], not as errors.
    async fn probe(&self, url: &str, full_body: bool) -> Result<ProbeResponse, ProbeError>;
}
