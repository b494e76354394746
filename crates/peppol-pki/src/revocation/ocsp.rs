//! OCSP (Online Certificate Status Protocol) client - RFC 6960
//!
//! Builds OCSP requests, queries the responder named in the certificate's
//! Authority Information Access extension, and parses the response into a
//! [`RevocationVerdict`].
//!
//! ## Request/Response Flow
//!
//! 1. **Cache**: a non-expired verdict for the (certificate, issuer) pair is
//!    returned without touching the network or the rate limiter
//! 2. **AIA**: the responder URL comes from the certificate; only the first
//!    OCSP access description is used
//! 3. **Rate limit**: a fixed per-responder window is consulted before any
//!    network call
//! 4. **Build + POST**: an unsigned single-certificate request with a SHA-1
//!    CertID (no nonce; replay protection is intentionally omitted)
//! 5. **Parse + cache**: successful answers are cached until shortly before
//!    their `nextUpdate`; failures are never cached
//!
//! ## ASN.1 Structures (RFC 6960)
//!
//! ```asn1
//! OCSPRequest ::= SEQUENCE {
//!     tbsRequest          TBSRequest,
//!     optionalSignature   [0] EXPLICIT Signature OPTIONAL
//! }
//!
//! CertID ::= SEQUENCE {
//!     hashAlgorithm       AlgorithmIdentifier,
//!     issuerNameHash      OCTET STRING,
//!     issuerKeyHash       OCTET STRING,
//!     serialNumber        INTEGER
//! }
//!
//! OCSPResponse ::= SEQUENCE {
//!     responseStatus      OCSPResponseStatus,
//!     responseBytes       [0] EXPLICIT ResponseBytes OPTIONAL
//! }
//!
//! SingleResponse ::= SEQUENCE {
//!     certID              CertID,
//!     certStatus          CertStatus,
//!     thisUpdate          GeneralizedTime,
//!     nextUpdate          [0] EXPLICIT GeneralizedTime OPTIONAL,
//!     singleExtensions    [1] EXPLICIT Extensions OPTIONAL
//! }
//!
//! CertStatus ::= CHOICE {
//!     good                [0] IMPLICIT NULL,
//!     revoked             [1] IMPLICIT RevokedInfo,
//!     unknown             [2] IMPLICIT UnknownInfo
//! }
//! ```
//!
//! Requests are DER-encoded with the small helpers at the bottom of this
//! module; responses are decoded by walking the DER with `asn1-rs`.

use crate::clock::Clock;
use crate::error::RevocationError;
use crate::http::HttpTransport;
use crate::revocation::cache::{CacheStats, TtlCache};
use crate::revocation::config::OcspConfig;
use crate::revocation::extensions;
use crate::revocation::ratelimit::ResponderRateLimiter;
use crate::revocation::verdict::{RevocationReason, RevocationVerdict};
use asn1_rs::{oid, Any, Class, FromDer, Tag};
use chrono::{DateTime, NaiveDateTime, Utc};
use sha1::{Digest, Sha1};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use x509_parser::prelude::*;

/// OCSP response status (RFC 6960 Section 4.2.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcspResponseStatus {
    /// Response has valid confirmations
    Successful,
    /// Illegal confirmation request
    MalformedRequest,
    /// Internal error in issuer
    InternalError,
    /// Try again later
    TryLater,
    /// Must sign the request
    SigRequired,
    /// Request unauthorized
    Unauthorized,
}

impl OcspResponseStatus {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Successful),
            1 => Some(Self::MalformedRequest),
            2 => Some(Self::InternalError),
            3 => Some(Self::TryLater),
            5 => Some(Self::SigRequired),
            6 => Some(Self::Unauthorized),
            _ => None,
        }
    }
}

/// Certificate status from a SingleResponse
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OcspCertStatus {
    Good,
    Revoked {
        revoked_at: DateTime<Utc>,
        reason: Option<RevocationReason>,
    },
    Unknown,
}

/// Decoded OCSP response, reduced to what the client needs
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedOcsp {
    /// The responder refused to answer
    NotSuccessful(OcspResponseStatus),
    /// The first SingleResponse of a successful answer
    Success {
        cert_status: OcspCertStatus,
        this_update: DateTime<Utc>,
        next_update: Option<DateTime<Utc>>,
    },
}

/// Cache key: the certificate and issuer serial pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OcspCacheKey {
    serial: Vec<u8>,
    issuer_serial: Vec<u8>,
}

/// OCSP revocation client
///
/// `check` never fails: every failure mode maps to an `Unavailable` or
/// `Error` verdict. Cached verdicts, the rate limiter, and all timing run
/// against the injected clock.
#[derive(Debug)]
pub struct OcspRevocationClient {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    cache: TtlCache<OcspCacheKey, RevocationVerdict>,
    rate_limiter: ResponderRateLimiter,
    config: OcspConfig,
}

impl OcspRevocationClient {
    /// Create a client with its own verdict cache and rate limiter.
    ///
    /// Hand the same instance to all request handlers to share the cache
    /// across calls; there is no hidden process-wide state.
    pub fn new(config: OcspConfig, transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>) -> Self {
        let cache = TtlCache::new(
            config.cache_max_entries,
            Duration::from_secs(config.cache_sweep_interval_secs),
            clock.clone(),
        );
        let rate_limiter = ResponderRateLimiter::new(
            config.rate_limit_max_requests,
            Duration::from_secs(config.rate_limit_window_secs),
            clock.clone(),
        );
        Self {
            transport,
            clock,
            cache,
            rate_limiter,
            config,
        }
    }

    /// Check the revocation status of `cert_der` against its issuer's OCSP
    /// responder.
    pub fn check(&self, cert_der: &[u8], issuer_der: &[u8]) -> RevocationVerdict {
        let started = self.clock.now();

        let (_, cert) = match parse_x509_certificate(cert_der) {
            Ok(parsed) => parsed,
            Err(e) => {
                return self.finish(
                    RevocationVerdict::error(format!("certificate parse error: {e}")),
                    started,
                )
            }
        };
        let (_, issuer) = match parse_x509_certificate(issuer_der) {
            Ok(parsed) => parsed,
            Err(e) => {
                return self.finish(
                    RevocationVerdict::error(format!("issuer certificate parse error: {e}")),
                    started,
                )
            }
        };

        let key = OcspCacheKey {
            serial: cert.raw_serial().to_vec(),
            issuer_serial: issuer.raw_serial().to_vec(),
        };

        if let Some(cached) = self.cache.get(&key) {
            debug!(
                serial = %hex::encode(&key.serial),
                "OCSP verdict served from cache"
            );
            return cached;
        }

        let Some(url) = extensions::ocsp_responder_url(&cert) else {
            return self.finish(
                RevocationVerdict::unavailable(
                    "certificate carries no OCSP responder in its AIA extension",
                ),
                started,
            );
        };

        if !self.rate_limiter.try_acquire(&url) {
            return self.finish(
                RevocationVerdict::unavailable(format!("rate limit exceeded for responder {url}"))
                    .with_source(&url),
                started,
            );
        }

        let request = build_ocsp_request(&cert, &issuer);
        let timeout = Duration::from_secs(self.config.responder_timeout_secs);
        let response = match self.transport.post(
            &url,
            &[
                ("Content-Type", "application/ocsp-request"),
                ("Accept", "application/ocsp-response"),
            ],
            &request,
            timeout,
        ) {
            Ok(response) => response,
            Err(e) => {
                warn!(responder = %url, error = %e, "OCSP transport failure");
                return self.finish(
                    RevocationVerdict::error(format!("OCSP transport failure: {e}"))
                        .with_source(&url),
                    started,
                );
            }
        };

        if !response.is_success() {
            return self.finish(
                RevocationVerdict::unavailable(format!(
                    "OCSP responder returned HTTP {}",
                    response.status
                ))
                .with_source(&url),
                started,
            );
        }

        let verdict = match parse_ocsp_response(&response.body) {
            Err(e) => RevocationVerdict::unavailable(format!("unparsable OCSP response: {e}"))
                .with_source(&url),
            Ok(ParsedOcsp::NotSuccessful(status)) => RevocationVerdict::unavailable(format!(
                "OCSP responder answered with status {status:?}"
            ))
            .with_source(&url),
            Ok(ParsedOcsp::Success {
                cert_status,
                this_update,
                next_update,
            }) => {
                let verdict = match cert_status {
                    OcspCertStatus::Good => RevocationVerdict::good(this_update, next_update),
                    OcspCertStatus::Revoked { revoked_at, reason } => RevocationVerdict::revoked(
                        revoked_at,
                        reason.unwrap_or(RevocationReason::UNSPECIFIED),
                    ),
                    OcspCertStatus::Unknown => RevocationVerdict::unknown(this_update, next_update),
                }
                .with_source(&url);

                // Successful answers are cached until shortly before their
                // nextUpdate; failure verdicts never reach this branch.
                if let Some(next_update) = next_update {
                    if let Some(expires_at) = self.cache_expiry(next_update) {
                        self.cache.insert_until(key, verdict.clone(), expires_at);
                    }
                }
                verdict
            }
        };

        self.finish(verdict, started)
    }

    /// Current verdict-cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached verdict.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn finish(&self, verdict: RevocationVerdict, started: Instant) -> RevocationVerdict {
        verdict.with_elapsed(self.clock.now().duration_since(started))
    }

    /// Absolute cache expiry for a response: `nextUpdate` minus the safety
    /// margin. `None` when that point is already in the past.
    fn cache_expiry(&self, next_update: DateTime<Utc>) -> Option<Instant> {
        let margin = chrono::TimeDelta::seconds(self.config.cache_expiry_margin_secs as i64);
        let remaining = (next_update - margin) - self.clock.now_utc();
        remaining.to_std().ok().map(|d| self.clock.now() + d)
    }
}

// ============================================================================
// Request building
// ============================================================================

/// Build an unsigned single-certificate OCSPRequest.
///
/// The CertID uses SHA-1 hashes of the issuer's subject DN and public key,
/// the RFC 6960 default every deployed responder accepts.
fn build_ocsp_request(cert: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> Vec<u8> {
    let issuer_name_hash = sha1(issuer.subject().as_raw());
    let issuer_key_hash = sha1(&issuer.public_key().subject_public_key.data);

    // CertID ::= SEQUENCE { hashAlgorithm, issuerNameHash, issuerKeyHash, serialNumber }
    let mut algorithm = Vec::new();
    algorithm.extend_from_slice(&der_oid(&[1, 3, 14, 3, 2, 26])); // SHA-1
    algorithm.extend_from_slice(&der_null());

    let mut cert_id = Vec::new();
    cert_id.extend_from_slice(&der_sequence(&algorithm));
    cert_id.extend_from_slice(&der_octet_string(&issuer_name_hash));
    cert_id.extend_from_slice(&der_octet_string(&issuer_key_hash));
    cert_id.extend_from_slice(&der_integer(cert.raw_serial()));
    let cert_id = der_sequence(&cert_id);

    // Request ::= SEQUENCE { reqCert CertID }
    let request = der_sequence(&cert_id);
    // requestList ::= SEQUENCE OF Request
    let request_list = der_sequence(&request);
    // TBSRequest ::= SEQUENCE { requestList } (version defaults, no extensions)
    let tbs_request = der_sequence(&request_list);
    // OCSPRequest ::= SEQUENCE { tbsRequest } (unsigned)
    der_sequence(&tbs_request)
}

fn sha1(data: impl AsRef<[u8]>) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(data.as_ref());
    hasher.finalize().to_vec()
}

// ============================================================================
// Response parsing
// ============================================================================

/// Decode an OCSPResponse down to the first SingleResponse.
///
/// The responder's signature is not verified here; trust in the answer comes
/// from the caller speaking to the URL the certificate itself named.
pub(crate) fn parse_ocsp_response(der: &[u8]) -> Result<ParsedOcsp, RevocationError> {
    let outer = expect_sequence(der, "OCSPResponse")?;

    // responseStatus ENUMERATED
    let (after_status, status_any) = parse_any(outer, "responseStatus")?;
    if status_any.header.tag() != Tag::Enumerated {
        return Err(parse_err("responseStatus is not an ENUMERATED"));
    }
    let status = OcspResponseStatus::from_u32(int_value(status_any.data)).ok_or_else(|| {
        parse_err(&format!(
            "unknown OCSP response status {}",
            int_value(status_any.data)
        ))
    })?;
    if status != OcspResponseStatus::Successful {
        return Ok(ParsedOcsp::NotSuccessful(status));
    }

    // responseBytes [0] EXPLICIT ResponseBytes
    let (_, tagged) = parse_any(after_status, "responseBytes")?;
    if !is_context(&tagged, 0) {
        return Err(parse_err("missing responseBytes"));
    }
    let response_bytes = expect_sequence(tagged.data, "ResponseBytes")?;

    // responseType OID, then response OCTET STRING
    let (after_type, response_type) = parse_any(response_bytes, "responseType")?;
    if response_type.header.tag() != Tag::Oid
        || response_type.data != oid!(1.3.6.1.5.5.7.48.1.1).as_bytes()
    {
        return Err(parse_err("unsupported OCSP response type"));
    }
    let (_, octets) = parse_any(after_type, "response")?;
    if octets.header.tag() != Tag::OctetString {
        return Err(parse_err("response is not an OCTET STRING"));
    }

    // BasicOCSPResponse ::= SEQUENCE { tbsResponseData, signatureAlgorithm, signature, certs }
    let basic = expect_sequence(octets.data, "BasicOCSPResponse")?;
    let (_, tbs) = parse_any(basic, "tbsResponseData")?;
    if tbs.header.tag() != Tag::Sequence {
        return Err(parse_err("tbsResponseData is not a SEQUENCE"));
    }

    // ResponseData ::= SEQUENCE { version [0] OPTIONAL, responderID, producedAt, responses, ... }
    let mut body = tbs.data;
    let (rest, first) = parse_any(body, "responderID")?;
    body = rest;
    if is_context(&first, 0) {
        // Explicit version was present; the next element is the responderID.
        let (rest, _responder_id) = parse_any(body, "responderID")?;
        body = rest;
    }
    let (rest, _produced_at) = parse_any(body, "producedAt")?;
    body = rest;

    // responses SEQUENCE OF SingleResponse - only the first is read
    let (_, responses) = parse_any(body, "responses")?;
    if responses.header.tag() != Tag::Sequence {
        return Err(parse_err("responses is not a SEQUENCE"));
    }
    if responses.data.is_empty() {
        return Err(parse_err("OCSP response carries no SingleResponse"));
    }
    let (_, single) = parse_any(responses.data, "SingleResponse")?;
    if single.header.tag() != Tag::Sequence {
        return Err(parse_err("SingleResponse is not a SEQUENCE"));
    }

    // SingleResponse ::= SEQUENCE { certID, certStatus, thisUpdate, nextUpdate [0] OPTIONAL, ... }
    let mut single_body = single.data;
    let (rest, _cert_id) = parse_any(single_body, "certID")?;
    single_body = rest;
    let (rest, status_any) = parse_any(single_body, "certStatus")?;
    single_body = rest;
    let cert_status = parse_cert_status(&status_any)?;

    let (rest, this_any) = parse_any(single_body, "thisUpdate")?;
    single_body = rest;
    let this_update = parse_generalized_time(&this_any)?;

    let mut next_update = None;
    if !single_body.is_empty() {
        let (_, maybe) = parse_any(single_body, "nextUpdate")?;
        if is_context(&maybe, 0) {
            let (_, time_any) = parse_any(maybe.data, "nextUpdate time")?;
            next_update = Some(parse_generalized_time(&time_any)?);
        }
    }

    Ok(ParsedOcsp::Success {
        cert_status,
        this_update,
        next_update,
    })
}

/// Decode the CertStatus CHOICE.
fn parse_cert_status(any: &Any<'_>) -> Result<OcspCertStatus, RevocationError> {
    if any.header.class() != Class::ContextSpecific {
        return Err(parse_err("certStatus is not context-specific"));
    }
    match any.header.tag() {
        // [0] IMPLICIT NULL - good
        Tag(0) => Ok(OcspCertStatus::Good),

        // [1] IMPLICIT RevokedInfo ::= SEQUENCE { revocationTime, revocationReason [0] OPTIONAL }
        Tag(1) => {
            let (rest, time_any) = parse_any(any.data, "revocationTime")?;
            let revoked_at = parse_generalized_time(&time_any)?;

            let mut reason = None;
            if !rest.is_empty() {
                let (_, tagged) = parse_any(rest, "revocationReason")?;
                if is_context(&tagged, 0) {
                    let (_, reason_any) = parse_any(tagged.data, "CRLReason")?;
                    if reason_any.header.tag() == Tag::Enumerated {
                        reason = Some(RevocationReason(int_value(reason_any.data) as u8));
                    }
                }
            }

            Ok(OcspCertStatus::Revoked { revoked_at, reason })
        }

        // [2] IMPLICIT UnknownInfo - unknown
        Tag(2) => Ok(OcspCertStatus::Unknown),

        other => Err(parse_err(&format!("unknown certStatus tag {other:?}"))),
    }
}

fn parse_any<'a>(input: &'a [u8], what: &str) -> Result<(&'a [u8], Any<'a>), RevocationError> {
    Any::from_der(input).map_err(|e| parse_err(&format!("{what}: {e}")))
}

/// Parse a top-level SEQUENCE and return its content bytes.
fn expect_sequence<'a>(input: &'a [u8], what: &str) -> Result<&'a [u8], RevocationError> {
    let (_, any) = parse_any(input, what)?;
    if any.header.tag() != Tag::Sequence {
        return Err(parse_err(&format!("{what} is not a SEQUENCE")));
    }
    Ok(any.data)
}

fn is_context(any: &Any<'_>, number: u32) -> bool {
    any.header.class() == Class::ContextSpecific && any.header.tag() == Tag(number)
}

/// Big-endian integer content to u32 (status and reason codes are tiny).
fn int_value(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

/// GeneralizedTime content: `YYYYMMDDHHMMSSZ`, optionally with fractional
/// seconds.
fn parse_generalized_time(any: &Any<'_>) -> Result<DateTime<Utc>, RevocationError> {
    if any.header.tag() != Tag::GeneralizedTime {
        return Err(parse_err("expected GeneralizedTime"));
    }
    let text = std::str::from_utf8(any.data)
        .map_err(|_| parse_err("GeneralizedTime is not valid UTF-8"))?;
    NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%SZ")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S%.fZ"))
        .map(|naive| naive.and_utc())
        .map_err(|e| parse_err(&format!("invalid GeneralizedTime '{text}': {e}")))
}

fn parse_err(message: &str) -> RevocationError {
    RevocationError::OcspParse(message.to_string())
}

// ============================================================================
// DER encoding helpers
// ============================================================================

/// Encode a SEQUENCE
fn der_sequence(contents: &[u8]) -> Vec<u8> {
    der_tlv(0x30, contents)
}

/// Encode an OCTET STRING
fn der_octet_string(contents: &[u8]) -> Vec<u8> {
    der_tlv(0x04, contents)
}

/// Encode an INTEGER, padding when the high bit would flip the sign
fn der_integer(value: &[u8]) -> Vec<u8> {
    let mut content = value.to_vec();
    if let Some(&first) = content.first() {
        if first & 0x80 != 0 {
            content.insert(0, 0x00);
        }
    }
    der_tlv(0x02, &content)
}

/// Encode an OBJECT IDENTIFIER
fn der_oid(components: &[u64]) -> Vec<u8> {
    if components.len() < 2 {
        return der_tlv(0x06, &[]);
    }

    let mut encoded = vec![(40 * components[0] + components[1]) as u8];
    for &component in &components[2..] {
        encoded.extend_from_slice(&encode_base128(component));
    }
    der_tlv(0x06, &encoded)
}

/// Encode NULL
fn der_null() -> Vec<u8> {
    vec![0x05, 0x00]
}

/// Encode Tag-Length-Value
fn der_tlv(tag: u8, contents: &[u8]) -> Vec<u8> {
    let mut result = vec![tag];
    result.extend_from_slice(&der_length(contents.len()));
    result.extend_from_slice(contents);
    result
}

/// Encode a DER length (short or long form)
fn der_length(length: usize) -> Vec<u8> {
    if length < 128 {
        return vec![length as u8];
    }

    let mut length_bytes = Vec::new();
    let mut remaining = length;
    while remaining > 0 {
        length_bytes.insert(0, (remaining & 0xFF) as u8);
        remaining >>= 8;
    }
    let mut result = vec![0x80 | length_bytes.len() as u8];
    result.extend_from_slice(&length_bytes);
    result
}

/// Base-128 encoding for OID components
fn encode_base128(mut value: u64) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }

    let mut result = Vec::new();
    let mut first = true;
    while value > 0 || first {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if !first {
            byte |= 0x80;
        }
        result.insert(0, byte);
        first = false;
    }
    result
}
