//! Certificate chain validation
//!
//! Production [`CertificateValidator`]: walks the chain leaf-first, checking
//! issuer/subject linkage and signatures, validity windows against the
//! injected clock, leaf key length, policy presence, and trust-anchor
//! membership. Chain *construction* (AIA chasing, cross-signing) happens
//! upstream; this validator judges the chain it is given.

use super::{CertificateCheck, CertificateValidator};
use peppol_pki::Clock;
use std::sync::Arc;
use tracing::debug;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

/// Minimum RSA modulus length accepted on the Peppol network, in bits.
const MIN_RSA_KEY_BITS: usize = 2048;

/// x509-parser-backed certificate chain validator.
#[derive(Debug)]
pub struct PkiCertificateValidator {
    clock: Arc<dyn Clock>,
}

impl PkiCertificateValidator {
    /// Create a validator that evaluates validity windows on `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl CertificateValidator for PkiCertificateValidator {
    fn validate_chain(&self, chain: &[Vec<u8>], trust_anchors: &[Vec<u8>]) -> CertificateCheck {
        if chain.is_empty() {
            return CertificateCheck {
                detail: Some("empty certificate chain".to_string()),
                ..CertificateCheck::default()
            };
        }

        let mut parsed = Vec::with_capacity(chain.len());
        for der in chain {
            match parse_x509_certificate(der) {
                Ok((_, cert)) => parsed.push(cert),
                Err(e) => {
                    return CertificateCheck {
                        detail: Some(format!("unparsable certificate in chain: {e}")),
                        ..CertificateCheck::default()
                    }
                }
            }
        }

        let now = self.clock.now_utc().timestamp();
        let not_expired = parsed.iter().all(|cert| {
            let validity = cert.validity();
            validity.not_before.timestamp() <= now && now <= validity.not_after.timestamp()
        });

        let chain_valid = parsed.windows(2).all(|pair| {
            let (child, parent) = (&pair[0], &pair[1]);
            child.issuer().as_raw() == parent.subject().as_raw()
                && child.verify_signature(Some(parent.public_key())).is_ok()
        });

        let leaf = &parsed[0];
        let key_length_valid = leaf_key_acceptable(leaf);
        let policy_valid = has_certificate_policies(leaf);
        let root = parsed.last().unwrap_or(leaf);
        let root_der = chain.last().map(|der| der.as_slice()).unwrap_or_default();
        let from_known_authority = anchored(root_der, root, trust_anchors);

        let certificate_valid = not_expired && chain_valid;
        if !certificate_valid {
            debug!(
                subject = %leaf.subject(),
                not_expired,
                chain_valid,
                "certificate chain failed validation"
            );
        }

        CertificateCheck {
            certificate_valid,
            not_expired,
            chain_valid,
            key_length_valid,
            policy_valid,
            from_known_authority,
            detail: None,
        }
    }
}

/// Leaf key strength: RSA moduli must reach [`MIN_RSA_KEY_BITS`]; other key
/// types (EC) pass as-is.
fn leaf_key_acceptable(cert: &X509Certificate<'_>) -> bool {
    match cert.public_key().parsed() {
        Ok(PublicKey::RSA(rsa)) => rsa_modulus_bits(rsa.modulus) >= MIN_RSA_KEY_BITS,
        Ok(_) => true,
        Err(_) => false,
    }
}

fn rsa_modulus_bits(modulus: &[u8]) -> usize {
    modulus.iter().skip_while(|byte| **byte == 0).count() * 8
}

fn has_certificate_policies(cert: &X509Certificate<'_>) -> bool {
    cert.extensions()
        .iter()
        .any(|ext| matches!(ext.parsed_extension(), ParsedExtension::CertificatePolicies(_)))
}

/// The chain root is anchored when it is byte-identical to an anchor, or an
/// anchor's subject issued it and the signature verifies.
fn anchored(root_der: &[u8], root: &X509Certificate<'_>, trust_anchors: &[Vec<u8>]) -> bool {
    for anchor_der in trust_anchors {
        if anchor_der.as_slice() == root_der {
            return true;
        }
        if let Ok((_, anchor)) = parse_x509_certificate(anchor_der) {
            if root.issuer().as_raw() == anchor.subject().as_raw()
                && root.verify_signature(Some(anchor.public_key())).is_ok()
            {
                return true;
            }
        }
    }
    false
}
