//! HTTP transport abstraction
//!
//! Both revocation clients perform their network I/O through the
//! [`HttpTransport`] trait so that tests can substitute a programmable
//! double. The production implementation is a thin wrapper around
//! `reqwest`'s blocking client with a per-request timeout; HTTPS-only
//! enforcement is the caller's concern, not this layer's.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// A decoded HTTP response: status code, headers, and body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers (lower-cased names)
    pub headers: HashMap<String, String>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// True for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport failure
///
/// Timeouts are distinguished from other transport failures because the
/// OCSP client maps them to different verdict statuses.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request did not complete within the allotted time
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, DNS, TLS, or protocol failure
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Blocking HTTP transport with explicit per-call timeouts.
pub trait HttpTransport: fmt::Debug + Send + Sync {
    /// Perform a GET request.
    fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;

    /// Perform a POST request with a body.
    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by `reqwest::blocking`.
///
/// The client is reused across requests for connection pooling. Timeouts are
/// applied per request, not on the client, because OCSP (10s) and CRL (30s)
/// carry different budgets.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Create a new transport.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| TransportError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn execute(
        &self,
        request: reqwest::blocking::RequestBuilder,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let response = request.timeout(timeout).send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|e| TransportError::Transport(format!("failed to read body: {e}")))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.execute(request, timeout)
    }

    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.post(url).body(body.to_vec());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.execute(request, timeout)
    }
}
