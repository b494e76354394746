//! CRL (Certificate Revocation List) client - RFC 5280
//!
//! Downloads the CRLs named in a certificate's distribution points, verifies
//! each CRL's signature against the issuer's public key, and scans the
//! revoked-certificate list for the target serial number.
//!
//! # URL ordering
//!
//! Distribution points are tried strictly in the order the certificate lists
//! them. The first URL that yields a definitive verdict (Good or Revoked)
//! wins and later URLs are never fetched. When every URL fails, the LAST
//! attempted URL's failure verdict is returned.
//!
//! # Trust
//!
//! A CRL's contents are only consulted after its signature verifies against
//! the issuer's public key. An unparsable or unfetchable CRL maps to
//! `Unavailable`; a CRL that parses but fails signature verification maps to
//! `Error` - a malformed-but-trusted-looking CRL must never be treated the
//! same as "no CRL available".

use crate::clock::Clock;
use crate::error::RevocationError;
use crate::http::HttpTransport;
use crate::revocation::cache::{CacheStats, TtlCache};
use crate::revocation::config::CrlConfig;
use crate::revocation::extensions;
use crate::revocation::verdict::{RevocationReason, RevocationVerdict};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use x509_parser::prelude::*;

/// One revoked serial's entry in a CRL.
#[derive(Debug, Clone, PartialEq)]
struct RevokedEntry {
    revoked_at: DateTime<Utc>,
    reason: RevocationReason,
}

/// A downloaded, signature-verified CRL reduced to what revocation checks
/// need. This is what the per-URL cache stores.
#[derive(Debug, Clone)]
pub struct CrlData {
    /// CRL issuer distinguished name
    issuer: String,
    /// When this CRL was published
    this_update: DateTime<Utc>,
    /// When the next CRL is expected, if the CRL says
    next_update: Option<DateTime<Utc>>,
    /// Revoked serial numbers with their revocation time and reason
    revoked: HashMap<Vec<u8>, RevokedEntry>,
}

impl CrlData {
    /// CRL issuer distinguished name.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Number of revoked certificates this CRL lists.
    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }
}

/// Parse a DER CRL and verify its signature with the issuer's public key.
///
/// Verification happens before anything else is read from the CRL body.
fn parse_and_verify_crl(
    crl_der: &[u8],
    issuer: &X509Certificate<'_>,
) -> Result<CrlData, RevocationError> {
    let (_, crl) = parse_x509_crl(crl_der)
        .map_err(|e| RevocationError::CrlParse(format!("failed to parse CRL DER: {e}")))?;

    crl.verify_signature(issuer.public_key())
        .map_err(|e| RevocationError::CrlSignature(e.to_string()))?;

    let this_update = asn1_time_to_datetime(&crl.last_update())
        .ok_or_else(|| RevocationError::CrlParse("invalid thisUpdate time".to_string()))?;
    let next_update = crl.next_update().and_then(|t| asn1_time_to_datetime(&t));

    let mut revoked = HashMap::new();
    for entry in crl.iter_revoked_certificates() {
        let reason = entry
            .reason_code()
            .map(|(_, code)| RevocationReason(code.0))
            .unwrap_or(RevocationReason::UNSPECIFIED);
        let revoked_at = asn1_time_to_datetime(&entry.revocation_date).unwrap_or(this_update);
        revoked.insert(
            entry.raw_serial().to_vec(),
            RevokedEntry { revoked_at, reason },
        );
    }

    Ok(CrlData {
        issuer: crl.issuer().to_string(),
        this_update,
        next_update,
        revoked,
    })
}

/// Convert an ASN.1 time to a chrono timestamp.
fn asn1_time_to_datetime(time: &ASN1Time) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(time.timestamp(), 0).single()
}

/// CRL revocation client
///
/// Verified CRLs are cached by distribution-point URL, so checking many
/// certificates from the same CA costs one download per CRL refresh
/// interval.
#[derive(Debug)]
pub struct CrlRevocationClient {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    cache: TtlCache<String, CrlData>,
    config: CrlConfig,
}

impl CrlRevocationClient {
    /// Create a client with its own CRL cache.
    pub fn new(config: CrlConfig, transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>) -> Self {
        let cache = TtlCache::new(
            config.cache_max_entries,
            Duration::from_secs(config.cache_sweep_interval_secs),
            clock.clone(),
        );
        Self {
            transport,
            clock,
            cache,
            config,
        }
    }

    /// Check the revocation status of `cert_der` against its CRL
    /// distribution points.
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

        let urls = extensions::crl_distribution_points(&cert);
        if urls.is_empty() {
            return self.finish(
                RevocationVerdict::unavailable(
                    "certificate carries no HTTP CRL distribution points",
                ),
                started,
            );
        }

        let serial = cert.raw_serial();
        let mut last_failure = None;

        for url in &urls {
            let verdict = self.check_url(url, serial, &issuer);
            if verdict.is_definitive() {
                return self.finish(verdict, started);
            }
            debug!(url = %url, status = ?verdict.status, "CRL distribution point failed, trying next");
            last_failure = Some(verdict);
        }

        // All URLs failed: report the last attempted URL's failure.
        let verdict = last_failure
            .unwrap_or_else(|| RevocationVerdict::unavailable("no CRL distribution point answered"));
        self.finish(verdict, started)
    }

    /// Current CRL-cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached CRL.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Resolve one distribution point to a verdict.
    fn check_url(
        &self,
        url: &str,
        serial: &[u8],
        issuer: &X509Certificate<'_>,
    ) -> RevocationVerdict {
        let crl = match self.cache.get(&url.to_string()) {
            Some(cached) => cached,
            None => match self.fetch_and_verify(url, issuer) {
                Ok(crl) => {
                    self.store(url, &crl);
                    crl
                }
                Err(e) if e.is_security_rejection() => {
                    warn!(url = %url, error = %e, "rejecting CRL with invalid signature");
                    return RevocationVerdict::error(e.to_string()).with_source(url);
                }
                Err(e) => {
                    return RevocationVerdict::unavailable(e.to_string()).with_source(url);
                }
            },
        };

        match crl.revoked.get(serial) {
            Some(entry) => {
                RevocationVerdict::revoked(entry.revoked_at, entry.reason).with_source(url)
            }
            None => RevocationVerdict::good(crl.this_update, crl.next_update).with_source(url),
        }
    }

    /// Download and verify the CRL at `url`.
    fn fetch_and_verify(
        &self,
        url: &str,
        issuer: &X509Certificate<'_>,
    ) -> Result<CrlData, RevocationError> {
        let response = self.transport.get(
            url,
            &[("Accept", "application/pkix-crl, application/x-pkcs7-crl")],
            Duration::from_secs(self.config.fetch_timeout_secs),
        )?;

        if !response.is_success() {
            return Err(RevocationError::CrlFetch(format!(
                "distribution point returned HTTP {}",
                response.status
            )));
        }
        if response.body.is_empty() {
            return Err(RevocationError::CrlParse("empty CRL body".to_string()));
        }

        parse_and_verify_crl(&response.body, issuer)
    }

    /// Cache a verified CRL until shortly before its nextUpdate, or for the
    /// fallback TTL when it carries none.
    fn store(&self, url: &str, crl: &CrlData) {
        match crl.next_update {
            Some(next_update) => {
                let margin =
                    chrono::TimeDelta::seconds(self.config.cache_expiry_margin_secs as i64);
                let remaining = (next_update - margin) - self.clock.now_utc();
                if let Ok(ttl) = remaining.to_std() {
                    self.cache
                        .insert_until(url.to_string(), crl.clone(), self.clock.now() + ttl);
                }
            }
            None => {
                self.cache.insert(
                    url.to_string(),
                    crl.clone(),
                    Duration::from_secs(self.config.fallback_cache_ttl_secs),
                );
            }
        }
    }

    fn finish(&self, verdict: RevocationVerdict, started: Instant) -> RevocationVerdict {
        verdict.with_elapsed(self.clock.now().duration_since(started))
    }
}
