//! Configuration types for revocation checking
//!
//! Tunables for the OCSP and CRL clients. Both structs deserialize with
//! sensible defaults so a service config file only needs to name what it
//! overrides.

use serde::{Deserialize, Serialize};

/// OCSP client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OcspConfig {
    /// HTTP timeout for responder requests, in seconds
    #[serde(default = "default_ocsp_timeout")]
    pub responder_timeout_secs: u64,

    /// Maximum number of cached verdicts
    #[serde(default = "default_ocsp_cache_entries")]
    pub cache_max_entries: usize,

    /// Interval between periodic cache sweeps, in seconds
    #[serde(default = "default_sweep_interval")]
    pub cache_sweep_interval_secs: u64,

    /// Cached verdicts expire this long before the response's nextUpdate,
    /// so a fresh answer is fetched before the old one goes stale
    #[serde(default = "default_expiry_margin")]
    pub cache_expiry_margin_secs: u64,

    /// Maximum requests per responder within the rate-limit window
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_max_requests: u32,

    /// Rate-limit window length, in seconds
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,
}

impl Default for OcspConfig {
    fn default() -> Self {
        Self {
            responder_timeout_secs: default_ocsp_timeout(),
            cache_max_entries: default_ocsp_cache_entries(),
            cache_sweep_interval_secs: default_sweep_interval(),
            cache_expiry_margin_secs: default_expiry_margin(),
            rate_limit_max_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window(),
        }
    }
}

/// CRL client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrlConfig {
    /// HTTP timeout for CRL downloads, in seconds
    #[serde(default = "default_crl_timeout")]
    pub fetch_timeout_secs: u64,

    /// Maximum number of cached CRLs
    #[serde(default = "default_crl_cache_entries")]
    pub cache_max_entries: usize,

    /// Interval between periodic cache sweeps, in seconds
    #[serde(default = "default_sweep_interval")]
    pub cache_sweep_interval_secs: u64,

    /// Cached CRLs expire this long before their nextUpdate
    #[serde(default = "default_expiry_margin")]
    pub cache_expiry_margin_secs: u64,

    /// Cache TTL for CRLs that carry no nextUpdate, in seconds
    #[serde(default = "default_crl_fallback_ttl")]
    pub fallback_cache_ttl_secs: u64,
}

impl Default for CrlConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_crl_timeout(),
            cache_max_entries: default_crl_cache_entries(),
            cache_sweep_interval_secs: default_sweep_interval(),
            cache_expiry_margin_secs: default_expiry_margin(),
            fallback_cache_ttl_secs: default_crl_fallback_ttl(),
        }
    }
}

// Default value functions for serde

fn default_ocsp_timeout() -> u64 {
    10
}

fn default_crl_timeout() -> u64 {
    30
}

fn default_ocsp_cache_entries() -> usize {
    1000
}

fn default_crl_cache_entries() -> usize {
    100
}

fn default_sweep_interval() -> u64 {
    300 // 5 minutes
}

fn default_expiry_margin() -> u64 {
    300 // 5 minutes
}

fn default_rate_limit_requests() -> u32 {
    100
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_crl_fallback_ttl() -> u64 {
    3600 // 1 hour
}
