//! Validation input types
//!
//! A [`ValidationContext`] is everything the orchestrator needs for one
//! participant validation: the resolved endpoint (from the SMP lookup layer),
//! the participant/document identifiers, the option flags, and a correlation
//! id for tracing the request through logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which checks the orchestrator runs, and with what trust material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Validate the XML signature on the signed metadata document
    #[serde(default = "default_true")]
    pub validate_signature: bool,

    /// Run OCSP and CRL revocation checks
    #[serde(default = "default_true")]
    pub check_revocation: bool,

    /// Serve and store results from the orchestrator's result cache
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Probe the endpoint URL for reachability
    #[serde(default)]
    pub test_connectivity: bool,

    /// Match the endpoint host against the certificate's subject names
    #[serde(default)]
    pub match_ssl_certificate: bool,

    /// Trust anchors (DER) the certificate chain must terminate in
    #[serde(default)]
    pub trust_anchors: Vec<Vec<u8>>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            validate_signature: true,
            check_revocation: true,
            use_cache: true,
            test_connectivity: false,
            match_ssl_certificate: false,
            trust_anchors: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// The endpoint resolved for a participant by the SML/SMP lookup layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEndpoint {
    /// Endpoint address the participant receives documents on
    pub url: Option<String>,

    /// Transport profile identifier from the service metadata
    pub transport_profile: Option<String>,

    /// The access point certificate (DER)
    pub certificate: Option<Vec<u8>>,

    /// Issuer certificates (DER), the leaf's issuer first
    pub issuer_chain: Vec<Vec<u8>>,

    /// Service validity window from the metadata, when stated
    pub service_activation: Option<DateTime<Utc>>,
    pub service_expiration: Option<DateTime<Utc>>,

    /// The signed SMP metadata document
    pub metadata_document: Option<String>,
}

/// Input to one orchestrated validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationContext {
    /// The resolved endpoint under validation
    pub endpoint: ResolvedEndpoint,

    /// Peppol participant identifier (e.g. `iso6523-actorid-upis::9915:test`)
    pub participant_id: String,

    /// Document type identifier the endpoint was resolved for
    pub document_type_id: String,

    /// Network environment tag (e.g. `production`, `test`)
    pub environment: String,

    /// Enabled checks and trust material
    pub options: ValidationOptions,

    /// Correlation id carried through logs and into the result
    pub correlation_id: String,
}

impl ValidationContext {
    /// Cache fingerprint over the semantically relevant fields: certificate
    /// bytes, identifiers, environment, and the option flags. Fields that
    /// cannot change the outcome (correlation id) are excluded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();

        let mut feed = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        };

        feed(self.participant_id.as_bytes());
        feed(self.document_type_id.as_bytes());
        feed(self.environment.as_bytes());
        feed(self.endpoint.certificate.as_deref().unwrap_or_default());
        feed(self.endpoint.url.as_deref().unwrap_or_default().as_bytes());
        feed(
            self.endpoint
                .transport_profile
                .as_deref()
                .unwrap_or_default()
                .as_bytes(),
        );
        for anchor in &self.options.trust_anchors {
            feed(anchor);
        }

        let flags = [
            self.options.validate_signature,
            self.options.check_revocation,
            self.options.test_connectivity,
            self.options.match_ssl_certificate,
        ]
        .iter()
        .fold(0u8, |acc, flag| (acc << 1) | u8::from(*flag));
        hasher.update([flags]);

        hex::encode(hasher.finalize())
    }
}
