//! probe::mock
//!
//! Mock probe implementation for deterministic testing.
//!
//! # Design
//!
//! The mock records every probe call and answers from a configured
//! per-URL response table, falling back to a default status. A failure
//! can be injected for error-path tests.
//!
//! # Example
//!
//! ```
//! use srisync::probe::{MockProbe, UrlProbe};
//!
//! # tokio_test::block_on(async {
//! let probe = MockProbe::new();
//! probe.respond_with("https://unpkg.com/x@1.0.0/x.js", 200, Some(b"body".to_vec()));
//!
//! let response = probe.probe("https://unpkg.com/x@1.0.0/x.js", true).await.unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(probe.calls().len(), 1);
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ProbeError, ProbeResponse, UrlProbe};

/// A recorded probe invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCall {
    pub url: String,
    pub full_body: bool,
}

#[derive(Debug)]
struct MockProbeInner {
    responses: HashMap<String, (u16, Option<Vec<u8>>)>,
    default_status: u16,
    fail_with: Option<ProbeError>,
    calls: Vec<ProbeCall>,
}

/// Mock probe for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockProbe {
    inner: Arc<Mutex<MockProbeInner>>,
}

impl MockProbe {
    /// Create a mock that answers 200 with no body for every URL.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockProbeInner {
                responses: HashMap::new(),
                default_status: 200,
                fail_with: None,
                calls: Vec::new(),
            })),
        }
    }

    /// Configure the response for one URL.
    pub fn respond_with(&self, url: impl Into<String>, status: u16, body: Option<Vec<u8>>) {
        let mut inner = self.inner.lock().expect("mock probe lock poisoned");
        inner.responses.insert(url.into(), (status, body));
    }

    /// Set the status returned for unconfigured URLs.
    pub fn set_default_status(&self, status: u16) {
        let mut inner = self.inner.lock().expect("mock probe lock poisoned");
        inner.default_status = status;
    }

    /// Make every probe fail with a network error.
    pub fn fail_with(&self, error: ProbeError) {
        let mut inner = self.inner.lock().expect("mock probe lock poisoned");
        inner.fail_with = Some(error);
    }

    /// The calls recorded so far.
    pub fn calls(&self) -> Vec<ProbeCall> {
        self.inner
            .lock()
            .expect("mock probe lock poisoned")
            .calls
            .clone()
    }
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlProbe for MockProbe {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn probe(&self, url: &str, full_body: bool) -> Result<ProbeResponse, ProbeError> {
        let mut inner = self.inner.lock().expect("mock probe lock poisoned");
        inner.calls.push(ProbeCall {
            url: url.to_string(),
            full_body,
        });

        if let Some(error) = &inner.fail_with {
            return Err(error.clone());
        }

        let (status, body) = inner
            .responses
            .get(url)
            .cloned()
            .unwrap_or((inner.default_status, None));
        Ok(ProbeResponse {
            status,
            body: if full_body {
                Some(body.unwrap_or_default())
            } else {
                None
            },
        })
    }
}
