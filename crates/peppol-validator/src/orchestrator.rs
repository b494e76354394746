//! Validation orchestration
//!
//! [`ValidationOrchestrator`] fans one resolved endpoint out across the
//! certificate, signature, endpoint, and revocation validators, aggregates
//! the sub-results into one [`ComprehensiveValidationResult`], and caches
//! the composite verdict per request fingerprint.
//!
//! # Pipeline
//!
//! 1. **Cache**: with caching enabled, a fingerprint over the context's
//!    semantic fields answers repeat requests without re-validating
//! 2. **Certificate**: runs when the endpoint carries a certificate; a
//!    missing certificate marks the result invalid and skips the signature
//!    and revocation stages - everything downstream needs one
//! 3. **Signature**: runs when enabled, a metadata document is present, and
//!    the certificate validated; validator errors are caught into the detail
//!    map, never rethrown
//! 4. **Endpoint**: transport-profile and URL checks run whenever a URL is
//!    present, independent of certificate outcome; connectivity and SSL
//!    matching are opt-in
//! 5. **Revocation**: runs when the certificate is valid and the option is
//!    set; OCSP and CRL each go through the circuit breaker under their own
//!    dependency name, and one path's rejection or failure never aborts the
//!    other
//! 6. **Aggregation + cache store**
//!
//! One failure never hides the others: every stage writes its wall-clock
//! duration and any captured failure into the result's detail map.

use crate::breaker::{CircuitBreaker, CircuitOutcome};
use crate::context::ValidationContext;
use crate::result::ComprehensiveValidationResult;
use crate::validators::{CertificateValidator, EndpointValidator, XmlSignatureValidator};
use peppol_pki::revocation::{CrlRevocationClient, OcspRevocationClient};
use peppol_pki::{CacheStats, Clock, RevocationStatus, RevocationVerdict, TtlCache};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// TTL for cached validation results, in seconds
    #[serde(default = "default_result_cache_ttl")]
    pub result_cache_ttl_secs: u64,

    /// Maximum number of cached validation results
    #[serde(default = "default_result_cache_entries")]
    pub result_cache_max_entries: usize,

    /// Interval between periodic result-cache sweeps, in seconds
    #[serde(default = "default_result_cache_sweep")]
    pub result_cache_sweep_interval_secs: u64,

    /// Circuit-breaker dependency name for the OCSP path
    #[serde(default = "default_ocsp_dependency")]
    pub ocsp_dependency: String,

    /// Circuit-breaker dependency name for the CRL path
    #[serde(default = "default_crl_dependency")]
    pub crl_dependency: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            result_cache_ttl_secs: default_result_cache_ttl(),
            result_cache_max_entries: default_result_cache_entries(),
            result_cache_sweep_interval_secs: default_result_cache_sweep(),
            ocsp_dependency: default_ocsp_dependency(),
            crl_dependency: default_crl_dependency(),
        }
    }
}

fn default_result_cache_ttl() -> u64 {
    1800 // 30 minutes
}

fn default_result_cache_entries() -> usize {
    1000
}

fn default_result_cache_sweep() -> u64 {
    300
}

fn default_ocsp_dependency() -> String {
    "ocsp-service".to_string()
}

fn default_crl_dependency() -> String {
    "crl-service".to_string()
}

/// Orchestrates all validators for one resolved endpoint.
///
/// The orchestrator never performs network I/O itself; everything reaches
/// the outside world through the injected validators and the
/// breaker-guarded revocation clients.
pub struct ValidationOrchestrator {
    certificate_validator: Arc<dyn CertificateValidator>,
    signature_validator: Arc<dyn XmlSignatureValidator>,
    endpoint_validator: Arc<dyn EndpointValidator>,
    ocsp: Arc<OcspRevocationClient>,
    crl: Arc<CrlRevocationClient>,
    breaker: Arc<CircuitBreaker>,
    cache: TtlCache<String, ComprehensiveValidationResult>,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
}

impl ValidationOrchestrator {
    /// Wire up an orchestrator. Hand the same instance to every request
    /// handler so the result cache and breaker state are shared.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        certificate_validator: Arc<dyn CertificateValidator>,
        signature_validator: Arc<dyn XmlSignatureValidator>,
        endpoint_validator: Arc<dyn EndpointValidator>,
        ocsp: Arc<OcspRevocationClient>,
        crl: Arc<CrlRevocationClient>,
        breaker: Arc<CircuitBreaker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = TtlCache::new(
            config.result_cache_max_entries,
            Duration::from_secs(config.result_cache_sweep_interval_secs),
            clock.clone(),
        );
        Self {
            certificate_validator,
            signature_validator,
            endpoint_validator,
            ocsp,
            crl,
            breaker,
            cache,
            clock,
            config,
        }
    }

    /// Validate one resolved endpoint, aggregating every enabled check.
    ///
    /// Never fails: each stage's failure is captured into the result's
    /// detail map and the remaining stages still run.
    pub fn orchestrate(&self, context: &ValidationContext) -> ComprehensiveValidationResult {
        let started = self.clock.now();
        let fingerprint = context.fingerprint();

        if context.options.use_cache {
            if let Some(cached) = self.cache.get(&fingerprint) {
                debug!(
                    correlation_id = %context.correlation_id,
                    "validation result served from cache"
                );
                return cached;
            }
        }

        let mut result = ComprehensiveValidationResult::new(&context.correlation_id);
        let certificate = context.endpoint.certificate.as_deref();

        // Stage: certificate chain
        match certificate {
            Some(cert) => self.validate_certificate(context, cert, &mut result),
            None => {
                result.details.insert(
                    "certificate_validation_error".to_string(),
                    "no certificate in resolved endpoint".to_string(),
                );
            }
        }

        // Stage: XML signature - needs a validated certificate to check against
        if context.options.validate_signature && result.certificate_valid {
            if let (Some(document), Some(cert)) =
                (context.endpoint.metadata_document.as_deref(), certificate)
            {
                self.validate_signature(document, cert, &mut result);
            }
        }

        // Stage: endpoint - independent of certificate outcome
        match context.endpoint.url.as_deref() {
            Some(url) => self.validate_endpoint(context, url, certificate, &mut result),
            None => {
                result.details.insert(
                    "endpoint_validation_error".to_string(),
                    "no endpoint URL in resolved endpoint".to_string(),
                );
            }
        }

        // Stage: revocation - a valid certificate is a prerequisite
        if context.options.check_revocation && result.certificate_valid {
            if let Some(cert) = certificate {
                self.check_revocation(context, cert, &mut result);
            }
        }

        // Aggregation: one AND over everything that ran. Revocation
        // unavailability does not flip the overall verdict; only an actual
        // REVOKED answer does (via certificate_not_revoked).
        let signature_checked = result.details.contains_key("signature_validation_time_ms");
        result.overall_valid = result.certificate_valid
            && result.certificate_not_revoked
            && (!signature_checked || result.signature_valid)
            && result.transport_profile_supported
            && result.endpoint_url_valid;

        // Production-network rules ride on the same sub-results but stay a
        // separate flag.
        result.peppol_compliant = result.overall_valid
            && result.certificate_from_known_authority
            && result.certificate_policy_valid
            && result.certificate_key_length_valid;

        result.elapsed = self.clock.now().duration_since(started);

        if context.options.use_cache {
            self.cache.insert(
                fingerprint,
                result.clone(),
                Duration::from_secs(self.config.result_cache_ttl_secs),
            );
        }

        debug!(
            correlation_id = %context.correlation_id,
            overall_valid = result.overall_valid,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "validation complete"
        );
        result
    }

    /// Current result-cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached validation result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn validate_certificate(
        &self,
        context: &ValidationContext,
        cert: &[u8],
        result: &mut ComprehensiveValidationResult,
    ) {
        let stage_started = self.clock.now();

        let mut chain = Vec::with_capacity(1 + context.endpoint.issuer_chain.len());
        chain.push(cert.to_vec());
        chain.extend(context.endpoint.issuer_chain.iter().cloned());

        let check = self
            .certificate_validator
            .validate_chain(&chain, &context.options.trust_anchors);

        result.certificate_valid = check.certificate_valid;
        result.certificate_not_expired = check.not_expired;
        result.certificate_chain_valid = check.chain_valid;
        result.certificate_key_length_valid = check.key_length_valid;
        result.certificate_policy_valid = check.policy_valid;
        result.certificate_from_known_authority = check.from_known_authority;
        if let Some(detail) = check.detail {
            result
                .details
                .insert("certificate_validation_error".to_string(), detail);
        }

        self.record_timing(result, "certificate_validation_time_ms", stage_started);
    }

    fn validate_signature(
        &self,
        document: &str,
        cert: &[u8],
        result: &mut ComprehensiveValidationResult,
    ) {
        let stage_started = self.clock.now();

        match self.signature_validator.validate(document, cert) {
            Ok(check) => {
                result.signature_valid = check.all_passed();
                if !result.signature_valid {
                    let mut failed = Vec::new();
                    if !check.signature_present {
                        failed.push("signature missing");
                    }
                    if !check.valid {
                        failed.push("signature invalid");
                    }
                    if !check.algorithm_valid {
                        failed.push("algorithm not allowed");
                    }
                    if !check.canonicalization_valid {
                        failed.push("canonicalization not allowed");
                    }
                    if !check.certificate_matches {
                        failed.push("certificate mismatch");
                    }
                    result
                        .details
                        .insert("signature_validation_error".to_string(), failed.join(", "));
                }
            }
            Err(e) => {
                // Caught, recorded, and never rethrown
                warn!(error = %e, "XML signature validation raised");
                result
                    .details
                    .insert("signature_validation_error".to_string(), e.to_string());
            }
        }

        self.record_timing(result, "signature_validation_time_ms", stage_started);
    }

    fn validate_endpoint(
        &self,
        context: &ValidationContext,
        url: &str,
        certificate: Option<&[u8]>,
        result: &mut ComprehensiveValidationResult,
    ) {
        let stage_started = self.clock.now();

        match context.endpoint.transport_profile.as_deref() {
            Some(profile) => {
                let check = self.endpoint_validator.validate_transport_profile(profile);
                result.transport_profile_supported = check.passed;
                if !check.passed {
                    result
                        .details
                        .insert("transport_profile_error".to_string(), check.message);
                }
            }
            None => {
                result.details.insert(
                    "transport_profile_error".to_string(),
                    "no transport profile in resolved endpoint".to_string(),
                );
            }
        }

        let check = self.endpoint_validator.validate_endpoint_url(url);
        result.endpoint_url_valid = check.passed;
        if !check.passed {
            result
                .details
                .insert("endpoint_url_error".to_string(), check.message);
        }

        if context.options.test_connectivity {
            let check = self.endpoint_validator.test_connectivity(url);
            result.endpoint_accessible = check.passed;
            if !check.passed {
                result
                    .details
                    .insert("connectivity_error".to_string(), check.message);
            }
        }

        if context.options.match_ssl_certificate {
            if let Some(cert) = certificate {
                let check = self
                    .endpoint_validator
                    .validate_ssl_certificate_matching(url, cert);
                result
                    .details
                    .insert("ssl_certificate_match".to_string(), check.message);
            }
        }

        self.record_timing(result, "endpoint_validation_time_ms", stage_started);
    }

    fn check_revocation(
        &self,
        context: &ValidationContext,
        cert: &[u8],
        result: &mut ComprehensiveValidationResult,
    ) {
        let stage_started = self.clock.now();

        match context.endpoint.issuer_chain.first() {
            Some(issuer) => {
                // Both paths always run; neither aborts the other.
                let ocsp_outcome = self.guarded_check(&self.config.ocsp_dependency, || {
                    self.ocsp.check(cert, issuer)
                });
                let crl_outcome = self.guarded_check(&self.config.crl_dependency, || {
                    self.crl.check(cert, issuer)
                });

                self.apply_verdict(result, "ocsp", ocsp_outcome);
                self.apply_verdict(result, "crl", crl_outcome);
            }
            None => {
                result.details.insert(
                    "revocation_check_error".to_string(),
                    "no issuer certificate available for revocation checking".to_string(),
                );
            }
        }

        self.record_timing(result, "revocation_check_time_ms", stage_started);
    }

    /// Run one revocation path through its circuit breaker.
    ///
    /// Unavailable/Error verdicts count as failures for the breaker's health
    /// window; a rejection means the breaker kept us off the network.
    fn guarded_check(
        &self,
        dependency: &str,
        run: impl FnOnce() -> RevocationVerdict,
    ) -> Result<RevocationVerdict, String> {
        let outcome = self.breaker.call(dependency, || {
            let verdict = run();
            match verdict.status {
                RevocationStatus::Unavailable | RevocationStatus::Error => Err(verdict),
                _ => Ok(verdict),
            }
        });
        match outcome {
            CircuitOutcome::Success(verdict) => Ok(verdict),
            CircuitOutcome::Failure(verdict) => Err(verdict
                .detail
                .unwrap_or_else(|| format!("revocation check ended {:?}", verdict.status))),
            CircuitOutcome::Rejected(rejection) => Err(rejection.to_string()),
        }
    }

    fn apply_verdict(
        &self,
        result: &mut ComprehensiveValidationResult,
        path: &str,
        outcome: Result<RevocationVerdict, String>,
    ) {
        match outcome {
            Ok(verdict) => {
                let passed = verdict.is_good();
                if verdict.is_revoked() {
                    result.certificate_not_revoked = false;
                    warn!(
                        path,
                        reason = %verdict.reason.map(|r| r.description()).unwrap_or_default(),
                        "certificate reported revoked"
                    );
                    if let Some(reason) = verdict.reason {
                        result
                            .details
                            .insert("revocation_reason".to_string(), reason.description());
                    }
                    if let Some(revoked_at) = verdict.revocation_time {
                        result
                            .details
                            .insert("revocation_time".to_string(), revoked_at.to_rfc3339());
                    }
                }
                result
                    .details
                    .insert(format!("{path}_status"), format!("{:?}", verdict.status));
                match path {
                    "ocsp" => result.ocsp_check_passed = passed,
                    _ => result.crl_check_passed = passed,
                }
            }
            Err(message) => {
                result.details.insert(format!("{path}_check_error"), message);
            }
        }
    }

    fn record_timing(
        &self,
        result: &mut ComprehensiveValidationResult,
        key: &str,
        stage_started: Instant,
    ) {
        let elapsed = self.clock.now().duration_since(stage_started);
        result
            .details
            .insert(key.to_string(), elapsed.as_millis().to_string());
    }
}
