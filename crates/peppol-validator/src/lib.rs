//! Peppol Participant Validation
//!
//! This crate turns a resolved Peppol endpoint (URL, transport profile,
//! access point certificate, signed metadata) into one aggregated
//! trustworthiness verdict. It layers on top of `peppol-pki`'s revocation
//! clients and adds:
//!
//! - **CircuitBreaker**: per-dependency state machine
//!   (CLOSED/OPEN/HALF_OPEN) that shields the pipeline from slow or failing
//!   external revocation services
//! - **Validator seams**: trait abstractions for certificate, XML-signature,
//!   and endpoint validation, with production implementations where the
//!   logic lives in this repository
//! - **ValidationOrchestrator**: the staged pipeline that fans out all
//!   enabled checks, aggregates partial results under a "never let one
//!   failure hide the others" policy, and caches the composite verdict per
//!   request fingerprint
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use peppol_pki::revocation::{CrlConfig, CrlRevocationClient, OcspConfig, OcspRevocationClient};
//! use peppol_pki::{Clock, ReqwestTransport, SystemClock};
//! use peppol_validator::breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use peppol_validator::orchestrator::{OrchestratorConfig, ValidationOrchestrator};
//! use peppol_validator::validators::{HttpEndpointValidator, PkiCertificateValidator};
//! use peppol_validator::context::ValidationContext;
//! # use peppol_validator::validators::{SignatureCheck, SignatureError, XmlSignatureValidator};
//! # #[derive(Debug)] struct DsigValidator;
//! # impl XmlSignatureValidator for DsigValidator {
//! #     fn validate(&self, _: &str, _: &[u8]) -> Result<SignatureCheck, SignatureError> {
//! #         Ok(SignatureCheck::default())
//! #     }
//! # }
//!
//! # fn example(context: &ValidationContext) -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(ReqwestTransport::new()?);
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock);
//!
//! let orchestrator = ValidationOrchestrator::new(
//!     OrchestratorConfig::default(),
//!     Arc::new(PkiCertificateValidator::new(clock.clone())),
//!     Arc::new(DsigValidator),
//!     Arc::new(HttpEndpointValidator::new(transport.clone())),
//!     Arc::new(OcspRevocationClient::new(OcspConfig::default(), transport.clone(), clock.clone())),
//!     Arc::new(CrlRevocationClient::new(CrlConfig::default(), transport, clock.clone())),
//!     Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default(), clock.clone())),
//!     clock,
//! );
//!
//! let result = orchestrator.orchestrate(context);
//! println!("valid: {}", result.is_overall_valid());
//! # Ok(())
//! # }
//! ```

pub mod breaker;
pub mod context;
pub mod orchestrator;
pub mod result;
pub mod validators;

pub use breaker::{
    BreakerHealth, CallNotPermitted, CircuitBreaker, CircuitBreakerConfig, CircuitOutcome,
    CircuitState,
};
pub use context::{ResolvedEndpoint, ValidationContext, ValidationOptions};
pub use orchestrator::{OrchestratorConfig, ValidationOrchestrator};
pub use result::ComprehensiveValidationResult;
pub use validators::{
    CertificateCheck, CertificateValidator, EndpointCheck, EndpointValidator,
    HttpEndpointValidator, PkiCertificateValidator, SignatureCheck, SignatureError,
    XmlSignatureValidator,
};
