//! Health probe logic.
//!
//! Performs a single HTTP GET against a webhook worker's endpoint and
//! parses the capability manifest it reports.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::StatusCode;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tracing::debug;

use crate::manifest::CapabilityManifest;

/// Boxed, sendable future returned by object-safe async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type alias for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Why a health probe failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid worker url: {0}")]
    InvalidUrl(String),

    #[error("worker unreachable: {0}")]
    Unreachable(String),

    #[error("request failed with status code {0}")]
    UnhealthyStatus(u16),

    #[error("malformed capability manifest: {0}")]
    MalformedManifest(String),

    #[error("could not build TLS client: {0}")]
    Tls(String),
}

/// Coarse classification of probe failures. Every kind counts as a
/// failed health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorKind {
    Unreachable,
    UnhealthyStatus,
    MalformedManifest,
}

impl ProbeError {
    pub fn kind(&self) -> ProbeErrorKind {
        match self {
            // The request never left the process.
            ProbeError::InvalidUrl(_) | ProbeError::Unreachable(_) | ProbeError::Tls(_) => {
                ProbeErrorKind::Unreachable
            }
            ProbeError::UnhealthyStatus(_) => ProbeErrorKind::UnhealthyStatus,
            ProbeError::MalformedManifest(_) => ProbeErrorKind::MalformedManifest,
        }
    }
}

/// Fetches a worker's capability manifest.
///
/// Injected into the controller so monitors can be driven by scripted
/// probes in tests.
pub trait HealthProbe: Send + Sync {
    /// Probe `url` once. Implementations must not retry.
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ProbeResult<CapabilityManifest>>;
}

/// HTTP/1 health probe backed by a pooled hyper client.
///
/// Speaks both `http://` and `https://`; server certificates are checked
/// against the Mozilla root set.
#[derive(Clone)]
pub struct HttpProbe {
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
    timeout: Duration,
}

impl HttpProbe {
    /// Create a probe whose requests (including the body read) are bounded
    /// by `timeout`.
    pub fn new(timeout: Duration) -> ProbeResult<Self> {
        let connector = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|e| ProbeError::Tls(e.to_string()))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Ok(Self { client, timeout })
    }

    /// Perform one health check against `url`.
    ///
    /// Succeeds only on `200 OK` with a parseable manifest body.
    pub async fn check(&self, url: &str) -> ProbeResult<CapabilityManifest> {
        let uri: http::Uri = url
            .parse()
            .map_err(|e: http::uri::InvalidUri| ProbeError::InvalidUrl(e.to_string()))?;

        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri(uri)
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProbeError::InvalidUrl(e.to_string()))?;

        let result = tokio::time::timeout(self.timeout, async {
            let resp = self.client.request(req).await.map_err(|e| {
                debug!(error = %e, %url, "health probe request failed");
                ProbeError::Unreachable(e.to_string())
            })?;

            let status = resp.status();
            if status != StatusCode::OK {
                debug!(%status, %url, "health probe non-200");
                return Err(ProbeError::UnhealthyStatus(status.as_u16()));
            }

            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| ProbeError::Unreachable(format!("could not read response body: {e}")))?
                .to_bytes();

            CapabilityManifest::from_json(&body)
                .map_err(|e| ProbeError::MalformedManifest(e.to_string()))
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(%url, "health probe timed out");
                Err(ProbeError::Unreachable(format!(
                    "timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

impl HealthProbe for HttpProbe {
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ProbeResult<CapabilityManifest>> {
        Box::pin(self.check(url))
    }
}
