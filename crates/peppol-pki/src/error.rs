//! Revocation-specific error types
//!
//! These errors are internal plumbing: the public `check` entry points fold
//! them into [`RevocationVerdict`](crate::RevocationVerdict) values instead
//! of propagating them, so callers never have to handle expected failure
//! modes (bad network, malformed data, missing extensions) as exceptions.

use crate::http::TransportError;

/// Errors that can occur while fetching or decoding revocation data
#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    /// Failed to parse an X.509 certificate
    #[error("certificate parse error: {0}")]
    CertificateParse(String),

    /// Failed to parse CRL data
    #[error("CRL parse error: {0}")]
    CrlParse(String),

    /// CRL fetch returned an unusable HTTP response
    #[error("CRL fetch failed: {0}")]
    CrlFetch(String),

    /// CRL signature did not verify against the issuer's public key
    #[error("CRL signature verification failed: {0}")]
    CrlSignature(String),

    /// Failed to parse an OCSP response
    #[error("OCSP response parse error: {0}")]
    OcspParse(String),

    /// HTTP transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RevocationError {
    /// True for failures that mean the revocation data itself must not be
    /// trusted, as opposed to data that was merely unobtainable.
    pub fn is_security_rejection(&self) -> bool {
        matches!(self, RevocationError::CrlSignature(_))
    }
}
