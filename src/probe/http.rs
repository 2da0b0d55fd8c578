//! probe::http
//!
//! HTTP probe implementation over reqwest.
//!
//! Existence checks use HEAD; full-content checks use GET and return the
//! body. Redirects are followed by the client, so the status observed is
//! the final one.

use async_trait::async_trait;
use reqwest::Client;

use super::{ProbeError, ProbeResponse, UrlProbe};

/// reqwest-backed probe.
#[derive(Debug, Clone, Default)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl UrlProbe for HttpProbe {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn probe(&self, url: &str, full_body: bool) -> Result<ProbeResponse, ProbeError> {
        let request = if full_body {
            self.client.get(url)
        } else {
            self.client.head(url)
        };
        let response = request
            .send()
            .await
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = if full_body {
            Some(
                response
                    .bytes()
                    .await
                    .map_err(|e| ProbeError::Network(e.to_string()))?
                    .to_vec(),
            )
        } else {
            None
        };

        Ok(ProbeResponse { status, body })
    }
}
