//! Validator seams
//!
//! The orchestrator talks to its collaborators through these traits so that
//! tests can substitute doubles and so the heavyweight implementations
//! (X.509 chain building, XML-DSig verification) stay swappable. Each trait
//! has a single production implementation; no deeper hierarchies.
//!
//! Only [`XmlSignatureValidator`] is allowed to fail: XML parsing and
//! canonicalization errors surface as [`SignatureError`], which the
//! orchestrator catches and folds into its result instead of propagating.

pub mod certificate;
pub mod endpoint;

pub use certificate::PkiCertificateValidator;
pub use endpoint::HttpEndpointValidator;

use serde::Serialize;

/// Outcome of certificate chain validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CertificateCheck {
    /// The certificate parsed and passed its core checks
    pub certificate_valid: bool,
    /// Every certificate in the chain is within its validity window
    pub not_expired: bool,
    /// Each certificate is issued and signed by the next in the chain
    pub chain_valid: bool,
    /// The leaf's public key meets the minimum key length
    pub key_length_valid: bool,
    /// The leaf carries a certificate-policies extension
    pub policy_valid: bool,
    /// The chain terminates in one of the supplied trust anchors
    pub from_known_authority: bool,
    /// Failure context, when something could not even be evaluated
    pub detail: Option<String>,
}

/// Validates an X.509 certificate chain against a set of trust anchors.
pub trait CertificateValidator: Send + Sync {
    /// Validate `chain` (leaf first) against `trust_anchors` (DER).
    fn validate_chain(&self, chain: &[Vec<u8>], trust_anchors: &[Vec<u8>]) -> CertificateCheck;
}

/// Outcome of XML signature validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignatureCheck {
    /// The document carries a signature element
    pub signature_present: bool,
    /// The cryptographic signature verifies
    pub valid: bool,
    /// The signature algorithm is on the allowed list
    pub algorithm_valid: bool,
    /// The canonicalization method is on the allowed list
    pub canonicalization_valid: bool,
    /// The signing certificate matches the expected certificate
    pub certificate_matches: bool,
}

impl SignatureCheck {
    /// True when every component check passed.
    pub fn all_passed(&self) -> bool {
        self.signature_present
            && self.valid
            && self.algorithm_valid
            && self.canonicalization_valid
            && self.certificate_matches
    }
}

/// XML signature validation failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignatureError {
    /// The document could not be parsed as XML
    #[error("malformed signed document: {0}")]
    MalformedDocument(String),

    /// Validation could not be carried out
    #[error("signature validation failed: {0}")]
    ValidationFailure(String),
}

/// Validates the XML signature on a signed metadata document.
///
/// This is the one fallible seam; the orchestrator catches errors and
/// records them in its detail map.
pub trait XmlSignatureValidator: Send + Sync {
    /// Validate the signature on `document` against `certificate` (DER).
    fn validate(&self, document: &str, certificate: &[u8])
        -> Result<SignatureCheck, SignatureError>;
}

/// Outcome of a single endpoint check; never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointCheck {
    /// Whether the check passed
    pub passed: bool,
    /// Human-readable outcome
    pub message: String,
}

impl EndpointCheck {
    /// A passing check with a message.
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    /// A failing check with a message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

/// Validates the resolved endpoint's transport metadata and reachability.
pub trait EndpointValidator: Send + Sync {
    /// Check that the transport profile identifier is supported.
    fn validate_transport_profile(&self, profile: &str) -> EndpointCheck;

    /// Check that the endpoint URL is well-formed HTTP(S).
    fn validate_endpoint_url(&self, url: &str) -> EndpointCheck;

    /// Probe the endpoint for reachability.
    fn test_connectivity(&self, url: &str) -> EndpointCheck;

    /// Check that the endpoint host matches the certificate's names.
    fn validate_ssl_certificate_matching(&self, url: &str, certificate: &[u8]) -> EndpointCheck;
}
