//! Revocation verdicts
//!
//! Both the OCSP and CRL clients answer with the same [`RevocationVerdict`]
//! shape. A verdict is immutable once constructed; `with_*` builders return
//! new values.
//!
//! # Field Invariants
//!
//! - `revocation_time`/`reason` are set iff the status is `Revoked`
//! - `Good` and `Unknown` carry `this_update`/`next_update`
//! - `Unavailable` and `Error` carry neither, only a failure `detail`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Outcome of a revocation check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationStatus {
    /// The certificate is not revoked
    Good,
    /// The certificate has been revoked
    Revoked,
    /// The OCSP responder does not know the certificate (OCSP only)
    Unknown,
    /// Revocation data could not be obtained; safe to retry later
    Unavailable,
    /// A failure that must not be treated as mere absence
    Error,
}

/// RFC 5280 CRLReason code (Section 5.3.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevocationReason(pub u8);

impl RevocationReason {
    pub const UNSPECIFIED: Self = Self(0);
    pub const KEY_COMPROMISE: Self = Self(1);
    pub const CA_COMPROMISE: Self = Self(2);
    pub const CERTIFICATE_HOLD: Self = Self(6);

    /// The numeric CRLReason code.
    pub fn code(&self) -> u8 {
        self.0
    }

    /// Human-readable RFC 5280 reason name.
    ///
    /// Code 7 is unused per RFC 5280; it and any other unmapped code render
    /// as `Unknown Reason (N)`.
    pub fn description(&self) -> String {
        match self.0 {
            0 => "Unspecified".to_string(),
            1 => "Key Compromise".to_string(),
            2 => "CA Compromise".to_string(),
            3 => "Affiliation Changed".to_string(),
            4 => "Superseded".to_string(),
            5 => "Cessation Of Operation".to_string(),
            6 => "Certificate Hold".to_string(),
            8 => "Remove From CRL".to_string(),
            9 => "Privilege Withdrawn".to_string(),
            10 => "AA Compromise".to_string(),
            other => format!("Unknown Reason ({other})"),
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// The result of checking one certificate against one revocation mechanism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevocationVerdict {
    /// Check outcome
    pub status: RevocationStatus,

    /// When the certificate was revoked (`Revoked` only)
    pub revocation_time: Option<DateTime<Utc>>,

    /// Why the certificate was revoked (`Revoked` only)
    pub reason: Option<RevocationReason>,

    /// When the revocation data was published (`Good`/`Unknown`)
    pub this_update: Option<DateTime<Utc>>,

    /// When fresher revocation data is expected (`Good`/`Unknown`)
    pub next_update: Option<DateTime<Utc>>,

    /// The responder or distribution-point URL that produced this verdict
    pub source_url: Option<String>,

    /// Failure context for `Unavailable`/`Error`
    pub detail: Option<String>,

    /// Wall-clock duration of the check that produced this verdict
    pub elapsed: Option<Duration>,

    /// When this verdict was created
    pub checked_at: DateTime<Utc>,
}

impl RevocationVerdict {
    fn new(status: RevocationStatus) -> Self {
        Self {
            status,
            revocation_time: None,
            reason: None,
            this_update: None,
            next_update: None,
            source_url: None,
            detail: None,
            elapsed: None,
            checked_at: Utc::now(),
        }
    }

    /// The certificate is not revoked.
    pub fn good(this_update: DateTime<Utc>, next_update: Option<DateTime<Utc>>) -> Self {
        Self {
            this_update: Some(this_update),
            next_update,
            ..Self::new(RevocationStatus::Good)
        }
    }

    /// The certificate has been revoked.
    pub fn revoked(revocation_time: DateTime<Utc>, reason: RevocationReason) -> Self {
        Self {
            revocation_time: Some(revocation_time),
            reason: Some(reason),
            ..Self::new(RevocationStatus::Revoked)
        }
    }

    /// The responder does not know the certificate.
    pub fn unknown(this_update: DateTime<Utc>, next_update: Option<DateTime<Utc>>) -> Self {
        Self {
            this_update: Some(this_update),
            next_update,
            ..Self::new(RevocationStatus::Unknown)
        }
    }

    /// Revocation data could not be obtained.
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(RevocationStatus::Unavailable)
        }
    }

    /// The check failed in a way that must not be treated as absence.
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(RevocationStatus::Error)
        }
    }

    /// Attach the URL that produced this verdict.
    pub fn with_source(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Produce a new verdict carrying the elapsed check duration.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// True for `Good` and `Revoked`: the protocol gave a definitive answer.
    pub fn is_definitive(&self) -> bool {
        matches!(
            self.status,
            RevocationStatus::Good | RevocationStatus::Revoked
        )
    }

    /// True iff the status is `Revoked`.
    pub fn is_revoked(&self) -> bool {
        self.status == RevocationStatus::Revoked
    }

    /// True iff the status is `Good`.
    pub fn is_good(&self) -> bool {
        self.status == RevocationStatus::Good
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn good_verdict_carries_update_window_only() {
        let now = Utc::now();
        let verdict = RevocationVerdict::good(now, Some(now + TimeDelta::days(7)));

        assert_eq!(verdict.status, RevocationStatus::Good);
        assert!(verdict.is_good());
        assert!(verdict.is_definitive());
        assert_eq!(verdict.this_update, Some(now));
        assert!(verdict.next_update.is_some());
        assert!(verdict.revocation_time.is_none());
        assert!(verdict.reason.is_none());
        assert!(verdict.detail.is_none());
    }

    #[test]
    fn revoked_verdict_carries_time_and_reason_only() {
        let revoked_at = Utc::now() - TimeDelta::days(3);
        let verdict = RevocationVerdict::revoked(revoked_at, RevocationReason::KEY_COMPROMISE);

        assert!(verdict.is_revoked());
        assert!(verdict.is_definitive());
        assert_eq!(verdict.revocation_time, Some(revoked_at));
        assert_eq!(verdict.reason, Some(RevocationReason(1)));
        assert!(verdict.this_update.is_none());
        assert!(verdict.next_update.is_none());
    }

    #[test]
    fn failure_verdicts_carry_detail_only() {
        let unavailable = RevocationVerdict::unavailable("responder rate limited");
        assert_eq!(unavailable.status, RevocationStatus::Unavailable);
        assert!(!unavailable.is_definitive());
        assert_eq!(unavailable.detail.as_deref(), Some("responder rate limited"));
        assert!(unavailable.this_update.is_none());

        let error = RevocationVerdict::error("signature verification failed");
        assert_eq!(error.status, RevocationStatus::Error);
        assert!(!error.is_definitive());
        assert!(error.revocation_time.is_none());
    }

    #[test]
    fn with_elapsed_produces_new_value() {
        let verdict = RevocationVerdict::good(Utc::now(), None);
        assert!(verdict.elapsed.is_none());

        let timed = verdict.clone().with_elapsed(Duration::from_millis(42));
        assert_eq!(timed.elapsed, Some(Duration::from_millis(42)));
        assert!(verdict.elapsed.is_none());
        assert_eq!(timed.status, verdict.status);
    }

    #[test]
    fn reason_descriptions_match_rfc_5280() {
        let expected = [
            (0, "Unspecified"),
            (1, "Key Compromise"),
            (2, "CA Compromise"),
            (3, "Affiliation Changed"),
            (4, "Superseded"),
            (5, "Cessation Of Operation"),
            (6, "Certificate Hold"),
            (8, "Remove From CRL"),
            (9, "Privilege Withdrawn"),
            (10, "AA Compromise"),
        ];
        for (code, name) in expected {
            assert_eq!(RevocationReason(code).description(), name);
        }
    }

    #[test]
    fn unmapped_reason_renders_code() {
        assert_eq!(RevocationReason(99).description(), "Unknown Reason (99)");
        assert_eq!(RevocationReason(7).description(), "Unknown Reason (7)");
        assert_eq!(format!("{}", RevocationReason(1)), "Key Compromise");
    }

    #[test]
    fn status_serialization() {
        let json = serde_json::to_string(&RevocationStatus::Unavailable).unwrap();
        assert_eq!(json, "\"unavailable\"");

        let status: RevocationStatus = serde_json::from_str("\"revoked\"").unwrap();
        assert_eq!(status, RevocationStatus::Revoked);
    }
}
