//! Integration tests for OCSP/CRL revocation checking
//!
//! These tests validate the end-to-end revocation flow against a real test
//! PKI: certificates, a signed CRL, and OCSP responses generated with
//! OpenSSL by `fixtures/gen.sh`.
//!
//! # Test PKI
//!
//! - `ca.der` issues all access point certificates and signs the CRL and the
//!   OCSP responses
//! - `ap-good.der` carries an AIA OCSP URL and two CRL distribution points,
//!   and is not revoked
//! - `ap-revoked.der` is revoked with reason keyCompromise
//! - `ap-bare.der` carries neither AIA nor CRL distribution points
//! - `ca2.der` is an unrelated CA; nothing signed by `ca.der` may verify
//!   against it
//!
//! Run `fixtures/gen.sh` to regenerate the PKI from scratch.

use peppol_pki::revocation::{CrlConfig, CrlRevocationClient, OcspConfig, OcspRevocationClient};
use peppol_pki::{
    Clock, HttpResponse, HttpTransport, ManualClock, RevocationReason, RevocationStatus,
    TransportError,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CA: &[u8] = include_bytes!("fixtures/ca.der");
const AP_GOOD: &[u8] = include_bytes!("fixtures/ap-good.der");
const AP_REVOKED: &[u8] = include_bytes!("fixtures/ap-revoked.der");
const CRL: &[u8] = include_bytes!("fixtures/peppol.crl");
const OCSP_GOOD: &[u8] = include_bytes!("fixtures/ocsp-good.der");
const OCSP_REVOKED: &[u8] = include_bytes!("fixtures/ocsp-revoked.der");

const OCSP_URL: &str = "http://ocsp.peppol.test/status";
const CRL_A: &str = "http://crl-a.peppol.test/peppol.crl";

/// Programmable transport for driving both clients without a network.
#[derive(Debug, Default)]
struct ScriptedTransport {
    routes: Mutex<HashMap<String, Result<HttpResponse, TransportError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn respond_with(&self, url: &str, status: u16, body: &[u8]) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Ok(HttpResponse {
                status,
                headers: HashMap::new(),
                body: body.to_vec(),
            }),
        );
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn dispatch(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.routes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(TransportError::Transport(format!("no route for {url}"))))
    }
}

impl HttpTransport for ScriptedTransport {
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

fn setup() -> (Arc<ScriptedTransport>, Arc<dyn Clock>, ManualClock) {
    let transport = Arc::new(ScriptedTransport::default());
    let manual = ManualClock::new(Utc::now());
    let clock: Arc<dyn Clock> = Arc::new(manual.clone());
    (transport, clock, manual)
}

#[test]
fn both_protocols_agree_on_a_good_certificate() {
    let (transport, clock, _manual) = setup();
    transport.respond_with(OCSP_URL, 200, OCSP_GOOD);
    transport.respond_with(CRL_A, 200, CRL);

    let ocsp = OcspRevocationClient::new(OcspConfig::default(), transport.clone(), clock.clone());
    let crl = CrlRevocationClient::new(CrlConfig::default(), transport.clone(), clock);

    assert_eq!(ocsp.check(AP_GOOD, CA).status, RevocationStatus::Good);
    assert_eq!(crl.check(AP_GOOD, CA).status, RevocationStatus::Good);
}

#[test]
fn both_protocols_agree_on_a_revoked_certificate() {
    let (transport, clock, _manual) = setup();
    transport.respond_with(OCSP_URL, 200, OCSP_REVOKED);
    transport.respond_with(CRL_A, 200, CRL);

    let ocsp = OcspRevocationClient::new(OcspConfig::default(), transport.clone(), clock.clone());
    let crl = CrlRevocationClient::new(CrlConfig::default(), transport.clone(), clock);

    let ocsp_verdict = ocsp.check(AP_REVOKED, CA);
    let crl_verdict = crl.check(AP_REVOKED, CA);

    assert_eq!(ocsp_verdict.status, RevocationStatus::Revoked);
    assert_eq!(crl_verdict.status, RevocationStatus::Revoked);

    // Both mechanisms surface the same RFC 5280 reason
    assert_eq!(ocsp_verdict.reason, Some(RevocationReason::KEY_COMPROMISE));
    assert_eq!(crl_verdict.reason, Some(RevocationReason::KEY_COMPROMISE));
    assert_eq!(
        ocsp_verdict.reason.unwrap().description(),
        "Key Compromise"
    );
}

#[test]
fn cached_verdicts_survive_until_shortly_before_next_update() {
    let (transport, clock, manual) = setup();
    transport.respond_with(OCSP_URL, 200, OCSP_GOOD);

    let ocsp = OcspRevocationClient::new(OcspConfig::default(), transport.clone(), clock);

    ocsp.check(AP_GOOD, CA);
    // Well within the response's validity: served from cache
    manual.advance(Duration::from_secs(3600));
    ocsp.check(AP_GOOD, CA);
    assert_eq!(transport.call_count(), 1);
}

#[test]
fn crl_cache_keeps_answering_within_validity() {
    let (transport, clock, manual) = setup();
    transport.respond_with(CRL_A, 200, CRL);

    // Fallback TTL of one hour makes the expiry deterministic regardless of
    // the fixture CRL's own nextUpdate
    let config = CrlConfig {
        fallback_cache_ttl_secs: 3600,
        ..CrlConfig::default()
    };
    let crl = CrlRevocationClient::new(config, transport.clone(), clock);

    crl.check(AP_GOOD, CA);
    assert_eq!(transport.call_count(), 1);

    // One second before the CRL's cache entry could possibly expire nothing
    // is refetched; the fixture CRL carries a far-future nextUpdate, so the
    // cached copy keeps answering even days later
    manual.advance(Duration::from_secs(86_400));
    crl.check(AP_GOOD, CA);
    assert_eq!(transport.call_count(), 1);
}

#[test]
fn clearing_caches_is_observable_in_stats() {
    let (transport, clock, _manual) = setup();
    transport.respond_with(OCSP_URL, 200, OCSP_GOOD);
    transport.respond_with(CRL_A, 200, CRL);

    let ocsp = OcspRevocationClient::new(OcspConfig::default(), transport.clone(), clock.clone());
    let crl = CrlRevocationClient::new(CrlConfig::default(), transport.clone(), clock);

    ocsp.check(AP_GOOD, CA);
    crl.check(AP_GOOD, CA);
    assert_eq!(ocsp.cache_stats().entries, 1);
    assert_eq!(crl.cache_stats().entries, 1);

    ocsp.clear_cache();
    crl.clear_cache();
    assert_eq!(ocsp.cache_stats().entries, 0);
    assert_eq!(crl.cache_stats().entries, 0);
}

#[test]
fn production_config_round_trips_through_json() {
    let ocsp = OcspConfig {
        responder_timeout_secs: 10,
        cache_max_entries: 1000,
        rate_limit_max_requests: 100,
        rate_limit_window_secs: 60,
        ..OcspConfig::default()
    };
    let crl = CrlConfig {
        fetch_timeout_secs: 30,
        cache_max_entries: 100,
        ..CrlConfig::default()
    };

    let ocsp_json = serde_json::to_string(&ocsp).unwrap();
    let crl_json = serde_json::to_string(&crl).unwrap();

    assert_eq!(serde_json::from_str::<OcspConfig>(&ocsp_json).unwrap(), ocsp);
    assert_eq!(serde_json::from_str::<CrlConfig>(&crl_json).unwrap(), crl);
}
