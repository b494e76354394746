//! X.509 extension extraction
//!
//! Small pure functions over parsed certificates, so the client algorithms
//! stay testable without constructing real certificates for every case. All
//! extraction goes through x509-parser's ASN.1 decoding; no byte scanning.

use x509_parser::extensions::{DistributionPointName, GeneralName, ParsedExtension};
use x509_parser::oid_registry::asn1_rs::oid;
use x509_parser::prelude::*;

/// Extract the OCSP responder URL from the Authority Information Access
/// extension (OID 1.3.6.1.5.5.7.1.1).
///
/// Only the first OCSP access description is used; there is no fallback
/// across multiple AIA entries.
pub fn ocsp_responder_url(cert: &X509Certificate<'_>) -> Option<String> {
    let ocsp_method = oid!(1.3.6.1.5.5.7.48.1);

    for ext in cert.extensions() {
        if let ParsedExtension::AuthorityInfoAccess(aia) = ext.parsed_extension() {
            for desc in &aia.accessdescs {
                if desc.access_method == ocsp_method {
                    if let GeneralName::URI(uri) = &desc.access_location {
                        return Some(uri.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Extract every HTTP(S) CRL distribution point URI (OID 2.5.29.31), in the
/// order the certificate lists them.
///
/// Non-URI general names and non-HTTP schemes (e.g. LDAP) are skipped.
pub fn crl_distribution_points(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut urls = Vec::new();

    for ext in cert.extensions() {
        if let ParsedExtension::CRLDistributionPoints(points) = ext.parsed_extension() {
            for point in points.iter() {
                if let Some(DistributionPointName::FullName(names)) = &point.distribution_point {
                    for name in names {
                        if let GeneralName::URI(uri) = name {
                            if uri.starts_with("http://") || uri.starts_with("https://") {
                                urls.push(uri.to_string());
                            }
                        }
                    }
                }
            }
        }
    }

    urls
}
