//! Aggregated validation result
//!
//! One [`ComprehensiveValidationResult`] per orchestration call: a fixed set
//! of sub-result booleans plus a free-form detail map holding per-stage
//! timings and captured failure messages. Partial failure is made observable
//! through the detail map instead of being raised.

use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// The aggregated outcome of validating one resolved endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComprehensiveValidationResult {
    /// The certificate chain passed core validation
    pub certificate_valid: bool,
    /// Every chain certificate is inside its validity window
    pub certificate_not_expired: bool,
    /// No revocation mechanism that ran reported the certificate revoked
    pub certificate_not_revoked: bool,
    /// The chain terminates in a configured trust anchor
    pub certificate_from_known_authority: bool,
    /// Issuer/subject linkage and signatures hold along the chain
    pub certificate_chain_valid: bool,
    /// The leaf key meets the minimum strength
    pub certificate_key_length_valid: bool,
    /// The leaf carries a certificate-policies extension
    pub certificate_policy_valid: bool,

    /// The signed metadata document's signature validated
    pub signature_valid: bool,

    /// The endpoint URL is well-formed HTTP(S)
    pub endpoint_url_valid: bool,
    /// The transport profile is supported
    pub transport_profile_supported: bool,
    /// The connectivity probe reached the endpoint
    pub endpoint_accessible: bool,

    /// OCSP answered Good
    pub ocsp_check_passed: bool,
    /// CRL answered Good
    pub crl_check_passed: bool,

    /// The conjunction of every check that ran
    pub overall_valid: bool,
    /// Production-network compliance: overall validity plus authority,
    /// policy, and key-strength rules
    pub peppol_compliant: bool,

    /// Per-stage timings (`*_time_ms`) and captured failures (`*_error`)
    pub details: HashMap<String, String>,

    /// Total wall-clock duration of the orchestration
    pub elapsed: Duration,

    /// Correlation id copied from the context
    pub correlation_id: String,
}

impl ComprehensiveValidationResult {
    /// A result with every check unset, ready for the pipeline to fill.
    ///
    /// `certificate_not_revoked` starts true: it only flips when a
    /// revocation mechanism actually reports the certificate revoked, so
    /// skipped or unavailable revocation checks leave it vacuously true.
    pub(crate) fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            certificate_valid: false,
            certificate_not_expired: false,
            certificate_not_revoked: true,
            certificate_from_known_authority: false,
            certificate_chain_valid: false,
            certificate_key_length_valid: false,
            certificate_policy_valid: false,
            signature_valid: false,
            endpoint_url_valid: false,
            transport_profile_supported: false,
            endpoint_accessible: false,
            ocsp_check_passed: false,
            crl_check_passed: false,
            overall_valid: false,
            peppol_compliant: false,
            details: HashMap::new(),
            elapsed: Duration::ZERO,
            correlation_id: correlation_id.into(),
        }
    }

    /// Whether the endpoint passed every check that ran.
    pub fn is_overall_valid(&self) -> bool {
        self.overall_valid
    }

    /// Whether the endpoint additionally satisfies the production-network
    /// rules.
    pub fn is_peppol_compliant(&self) -> bool {
        self.peppol_compliant
    }

    /// Read a diagnostic detail by key.
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_result_starts_unvalidated_but_unrevoked() {
        let result = ComprehensiveValidationResult::new("corr-7");
        assert!(!result.is_overall_valid());
        assert!(!result.is_peppol_compliant());
        assert!(result.certificate_not_revoked);
        assert!(!result.certificate_valid);
        assert_eq!(result.correlation_id, "corr-7");
        assert!(result.details.is_empty());
    }

    #[test]
    fn detail_lookup() {
        let mut result = ComprehensiveValidationResult::new("corr");
        result
            .details
            .insert("certificate_validation_time_ms".to_string(), "12".to_string());
        assert_eq!(result.detail("certificate_validation_time_ms"), Some("12"));
        assert_eq!(result.detail("absent"), None);
    }

    #[test]
    fn serializes_for_api_consumers() {
        let result = ComprehensiveValidationResult::new("corr");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["certificate_not_revoked"], true);
        assert_eq!(json["overall_valid"], false);
        assert_eq!(json["correlation_id"], "corr");
    }
}
