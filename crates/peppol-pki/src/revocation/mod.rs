//! Certificate Revocation Checking (OCSP/CRL)
//!
//! This module determines whether a Peppol access point certificate has been
//! revoked. It supports:
//!
//! - **OCSP (Online Certificate Status Protocol)**: RFC 6960
//! - **CRL (Certificate Revocation Lists)**: RFC 5280
//!
//! Both clients produce the same [`RevocationVerdict`] shape, so the
//! validation layer aggregates their answers without caring which protocol
//! produced them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ValidationOrchestrator                     │
//! │                (peppol-validator crate)                     │
//! └───────────────┬─────────────────────────┬───────────────────┘
//!                 │                         │
//!                 ▼                         ▼
//! ┌───────────────────────────┐ ┌───────────────────────────────┐
//! │   OcspRevocationClient    │ │     CrlRevocationClient       │
//! ├───────────────────────────┤ ├───────────────────────────────┤
//! │ 1. Check verdict cache    │ │ 1. Extract distribution points│
//! │ 2. Extract AIA OCSP URL   │ │ 2. Check per-URL CRL cache    │
//! │ 3. Per-responder rate cap │ │ 3. Fetch, parse, verify sig   │
//! │ 4. Build + POST request   │ │ 4. Scan for serial number     │
//! │ 5. Parse, cache by CertID │ │ 5. Cache verified CRL by URL  │
//! └──────┬──────────┬─────────┘ └──────┬──────────┬─────────────┘
//!        │          │                  │          │
//!        ▼          ▼                  ▼          ▼
//! ┌────────────┐ ┌──────────┐   ┌────────────┐ ┌──────────────┐
//! │  TtlCache  │ │ RateLimit│   │  TtlCache  │ │ x509-parser  │
//! │ (DashMap)  │ │ (DashMap)│   │ (DashMap)  │ │ (sig verify) │
//! └────────────┘ └──────────┘   └────────────┘ └──────────────┘
//! ```
//!
//! # Failure Policy
//!
//! The clients never raise for expected failure modes. The verdict status
//! encodes the taxonomy:
//!
//! - `Good` / `Revoked`: a definitive protocol answer
//! - `Unknown`: the OCSP responder does not know the certificate
//! - `Unavailable`: revocation data could not be obtained right now (missing
//!   extension, HTTP error, rate limited, malformed CRL body) - safe to retry
//!   later and never cached
//! - `Error`: a failure that must not be treated as mere absence (transport
//!   exception on the OCSP path, CRL signature verification failure)

pub mod cache;
pub mod config;
pub mod crl;
pub mod extensions;
pub mod ocsp;
pub mod ratelimit;
pub mod verdict;

pub use cache::{CacheStats, TtlCache};
pub use config::{CrlConfig, OcspConfig};
pub use crl::CrlRevocationClient;
pub use ocsp::OcspRevocationClient;
pub use ratelimit::ResponderRateLimiter;
pub use verdict::{RevocationReason, RevocationStatus, RevocationVerdict};

#[cfg(test)]
pub(crate) mod testutil {
    //! Shared test doubles for the revocation clients.

    use crate::http::{HttpResponse, HttpTransport, TransportError};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Programmable transport: maps URLs to canned responses and records
    /// every request made.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        routes: Mutex<HashMap<String, Result<HttpResponse, TransportError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond_with(&self, url: &str, status: u16, body: &[u8]) {
            self.routes.lock().unwrap().insert(
                url.to_string(),
                Ok(HttpResponse {
                    status,
                    headers: HashMap::new(),
                    body: body.to_vec(),
                }),
            );
        }

        pub fn fail_with(&self, url: &str, error: TransportError) {
            self.routes.lock().unwrap().insert(url.to_string(), Err(error));
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn dispatch(&self, url: &str) -> Result<HttpResponse, TransportError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.routes
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .unwrap_or_else(|| {
                    Err(TransportError::Transport(format!("no route for {url}")))
                })
        }
    }

    impl HttpTransport for MockTransport {
        fn get(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
            _timeout: Duration,
        ) -> Result<HttpResponse, TransportError> {
            self.dispatch(url)
        }

        fn post(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
            _body: &[u8],
            _timeout: Duration,
        ) -> Result<HttpResponse, TransportError> {
            self.dispatch(url)
        }
    }
}
