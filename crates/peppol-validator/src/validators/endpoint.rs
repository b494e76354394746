//! Endpoint validation
//!
//! Production [`EndpointValidator`]: transport-profile whitelist, URL
//! well-formedness, an optional reachability probe through the injected
//! transport, and host-against-certificate name matching.

use super::{EndpointCheck, EndpointValidator};
use peppol_pki::HttpTransport;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::*;

/// Transport profile identifiers registered for the Peppol network.
const DEFAULT_PROFILES: &[&str] = &[
    "peppol-transport-as4-v2_0",
    "busdox-transport-as2-ver1p0",
    "busdox-transport-as2-ver2p0",
];

/// Endpoint validator backed by the shared HTTP transport.
#[derive(Debug)]
pub struct HttpEndpointValidator {
    transport: Arc<dyn HttpTransport>,
    supported_profiles: Vec<String>,
    probe_timeout: Duration,
}

impl HttpEndpointValidator {
    /// Create a validator accepting the standard Peppol transport profiles.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            supported_profiles: DEFAULT_PROFILES.iter().map(|p| p.to_string()).collect(),
            probe_timeout: Duration::from_secs(5),
        }
    }

    /// Replace the accepted transport profile identifiers.
    pub fn with_profiles(mut self, profiles: Vec<String>) -> Self {
        self.supported_profiles = profiles;
        self
    }
}

impl EndpointValidator for HttpEndpointValidator {
    fn validate_transport_profile(&self, profile: &str) -> EndpointCheck {
        if profile.trim().is_empty() {
            return EndpointCheck::fail("transport profile is empty");
        }
        if self.supported_profiles.iter().any(|p| p == profile) {
            EndpointCheck::pass(format!("transport profile '{profile}' is supported"))
        } else {
            EndpointCheck::fail(format!("unsupported transport profile '{profile}'"))
        }
    }

    fn validate_endpoint_url(&self, url: &str) -> EndpointCheck {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return EndpointCheck::fail(format!("malformed endpoint URL: {e}")),
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return EndpointCheck::fail(format!(
                "endpoint URL scheme '{}' is not HTTP(S)",
                parsed.scheme()
            ));
        }
        if parsed.host_str().is_none() {
            return EndpointCheck::fail("endpoint URL has no host");
        }
        EndpointCheck::pass("endpoint URL is well-formed")
    }

    fn test_connectivity(&self, url: &str) -> EndpointCheck {
        match self.transport.get(url, &[], self.probe_timeout) {
            Ok(response) if response.status < 500 => {
                EndpointCheck::pass(format!("endpoint answered HTTP {}", response.status))
            }
            Ok(response) => EndpointCheck::fail(format!(
                "endpoint answered server error HTTP {}",
                response.status
            )),
            Err(e) => EndpointCheck::fail(format!("endpoint unreachable: {e}")),
        }
    }

    fn validate_ssl_certificate_matching(&self, url: &str, certificate: &[u8]) -> EndpointCheck {
        let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
            Some(host) => host,
            None => return EndpointCheck::fail("endpoint URL has no host to match"),
        };

        let (_, cert) = match parse_x509_certificate(certificate) {
            Ok(parsed) => parsed,
            Err(e) => return EndpointCheck::fail(format!("unparsable certificate: {e}")),
        };

        let names = certificate_names(&cert);
        if names.is_empty() {
            return EndpointCheck::fail("certificate carries no subject names to match");
        }
        if names.iter().any(|name| host_matches(name, &host)) {
            EndpointCheck::pass(format!("certificate matches endpoint host '{host}'"))
        } else {
            EndpointCheck::fail(format!(
                "certificate names {names:?} do not match endpoint host '{host}'"
            ))
        }
    }
}

/// Subject alternative DNS names plus the subject CN.
fn certificate_names(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut names = Vec::new();

    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for name in &san.general_names {
                if let GeneralName::DNSName(dns) = name {
                    names.push(dns.to_string());
                }
            }
        }
    }

    for attr in cert.subject().iter_common_name() {
        if let Ok(cn) = attr.as_str() {
            names.push(cn.to_string());
        }
    }

    names
}

/// Exact or single-label-wildcard host match, case-insensitive.
fn host_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => host
            .split_once('.')
            .map(|(label, rest)| !label.is_empty() && rest == base)
            .unwrap_or(false),
        None => pattern == host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peppol_pki::{HttpResponse, TransportError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    const AP_GOOD: &[u8] = include_bytes!("../../tests/fixtures/ap-good.der");

    /// Minimal transport double: one canned answer for every URL.
    #[derive(Debug)]
    struct CannedTransport {
        answer: Mutex<Result<HttpResponse, TransportError>>,
    }

    impl CannedTransport {
        fn status(status: u16) -> Arc<Self> {
            Arc::new(Self {
                answer: Mutex::new(Ok(HttpResponse {
                    status,
                    headers: HashMap::new(),
                    body: vec![],
                })),
            })
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(Self {
                answer: Mutex::new(Err(TransportError::Transport(
                    "connection refused".to_string(),
                ))),
            })
        }
    }

    impl HttpTransport for CannedTransport {
        fn get(
            &self,
            _url: &str,
            _headers: &[(&str, &str)],
            _timeout: Duration,
        ) -> Result<HttpResponse, TransportError> {
            self.answer.lock().unwrap().clone()
        }

        fn post(
            &self,
            _url: &str,
            _headers: &[(&str, &str)],
            _body: &[u8],
            _timeout: Duration,
        ) -> Result<HttpResponse, TransportError> {
            self.answer.lock().unwrap().clone()
        }
    }

    fn validator() -> HttpEndpointValidator {
        HttpEndpointValidator::new(CannedTransport::status(200))
    }

    #[test]
    fn known_transport_profiles_pass() {
        let v = validator();
        assert!(v.validate_transport_profile("peppol-transport-as4-v2_0").passed);
        assert!(v.validate_transport_profile("busdox-transport-as2-ver1p0").passed);
        assert!(!v.validate_transport_profile("smtp").passed);
        assert!(!v.validate_transport_profile("").passed);
    }

    #[test]
    fn custom_profile_whitelist_replaces_default() {
        let v = validator().with_profiles(vec!["my-profile".to_string()]);
        assert!(v.validate_transport_profile("my-profile").passed);
        assert!(!v.validate_transport_profile("peppol-transport-as4-v2_0").passed);
    }

    #[test]
    fn url_validation() {
        let v = validator();
        assert!(v.validate_endpoint_url("https://ap.example.com/as4").passed);
        assert!(v.validate_endpoint_url("http://ap.example.com").passed);
        assert!(!v.validate_endpoint_url("ftp://ap.example.com").passed);
        assert!(!v.validate_endpoint_url("not a url").passed);
        assert!(!v.validate_endpoint_url("https:///missing-host").passed);
    }

    #[test]
    fn connectivity_reports_reachability() {
        let ok = HttpEndpointValidator::new(CannedTransport::status(200));
        assert!(ok.test_connectivity("https://ap.example.com").passed);

        // Any answer below 500 proves the endpoint is reachable
        let not_found = HttpEndpointValidator::new(CannedTransport::status(404));
        assert!(not_found.test_connectivity("https://ap.example.com").passed);

        let broken = HttpEndpointValidator::new(CannedTransport::status(503));
        assert!(!broken.test_connectivity("https://ap.example.com").passed);

        let down = HttpEndpointValidator::new(CannedTransport::unreachable());
        let check = down.test_connectivity("https://ap.example.com");
        assert!(!check.passed);
        assert!(check.message.contains("unreachable"));
    }

    #[test]
    fn host_matching_rules() {
        assert!(host_matches("ap.example.com", "AP.Example.COM"));
        assert!(host_matches("*.example.com", "ap.example.com"));
        assert!(!host_matches("*.example.com", "example.com"));
        assert!(!host_matches("*.example.com", "deep.ap.example.com"));
        assert!(!host_matches("other.example.com", "ap.example.com"));
    }

    #[test]
    fn ssl_matching_fails_for_non_hostname_subject() {
        // The fixture certificate's CN is an access point name, not a
        // hostname, so it cannot match any endpoint host
        let v = validator();
        let check = v.validate_ssl_certificate_matching("https://ap.example.com/as4", AP_GOOD);
        assert!(!check.passed);
        assert!(check.message.contains("do not match"));
    }

    #[test]
    fn ssl_matching_rejects_garbage_certificate() {
        let v = validator();
        let check = v.validate_ssl_certificate_matching("https://ap.example.com", &[0x01]);
        assert!(!check.passed);
    }
}
