//! Peppol PKI Primitives
//!
//! This crate provides the certificate-revocation layer used when validating
//! Peppol network participants. Given a participant's access point
//! certificate and its issuer, it answers the question "is this certificate
//! currently trustworthy?" via two independent protocols:
//!
//! - **OCSP (Online Certificate Status Protocol)**: RFC 6960
//! - **CRL (Certificate Revocation Lists)**: RFC 5280
//!
//! # Features
//!
//! - **Uniform verdicts**: both protocols produce the same
//!   [`RevocationVerdict`] shape, so callers aggregate without caring which
//!   mechanism answered
//! - **Thread-Safe Caching**: TTL-based caching keyed by certificate pair
//!   (OCSP) or distribution-point URL (CRL), using DashMap
//! - **Per-Responder Rate Limiting**: fixed-window limits on outbound OCSP
//!   traffic, applied before any network call
//! - **CRL Signature Verification**: CRLs are verified against the issuer's
//!   public key before their contents are trusted
//! - **Injected transport and clock**: all I/O goes through the
//!   [`HttpTransport`] trait and all timing through the [`Clock`] trait, so
//!   every cache-expiry and rate-limit behavior is deterministically testable
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use peppol_pki::{Clock, ReqwestTransport, SystemClock};
//! use peppol_pki::revocation::{CrlRevocationClient, OcspRevocationClient};
//! use peppol_pki::revocation::{CrlConfig, OcspConfig};
//!
//! # fn example(cert_der: &[u8], issuer_der: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(ReqwestTransport::new()?);
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock);
//!
//! let ocsp = OcspRevocationClient::new(OcspConfig::default(), transport.clone(), clock.clone());
//! let crl = CrlRevocationClient::new(CrlConfig::default(), transport, clock);
//!
//! let verdict = ocsp.check(cert_der, issuer_der);
//! if verdict.is_revoked() {
//!     println!("revoked: {:?}", verdict.reason);
//! } else {
//!     println!("CRL says: {:?}", crl.check(cert_der, issuer_der).status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! The revocation clients never fail for expected conditions. Network
//! failures, missing extensions, rate limiting, and malformed responses all
//! map to `Unavailable` or `Error` verdicts, which are never cached, so
//! transient failures are retried on the next call rather than remembered.

pub mod clock;
pub mod error;
pub mod http;
pub mod revocation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::RevocationError;
pub use http::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use revocation::{
    CacheStats, CrlConfig, CrlRevocationClient, OcspConfig, OcspRevocationClient,
    RevocationReason, RevocationStatus, RevocationVerdict, TtlCache,
};
