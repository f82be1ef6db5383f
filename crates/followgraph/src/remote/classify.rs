//! Classification of failed remote calls.
//!
//! Every failure maps to exactly one [`ErrorClass`]. Predicates are checked
//! in a fixed priority order (rate limited, service error, not found,
//! forbidden) so a response matching several is classified the same way
//! every time.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Service error codes for an exhausted request budget.
const RATE_LIMIT_CODES: &[i64] = &[88];
/// Service error codes for temporary over-capacity conditions.
const CAPACITY_CODES: &[i64] = &[130, 131];
/// HTTP statuses treated as a temporary service failure.
const CAPACITY_STATUSES: &[u16] = &[500, 502, 503, 504];
/// Service error codes for users, pages or lists that do not exist.
const NOT_FOUND_CODES: &[i64] = &[17, 34, 50, 63];
/// Service error code for "not authorized to see this status".
const FORBIDDEN_CODES: &[i64] = &[179];

/// Window assumed when a rate-limit response carries no reset header.
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::minutes(15);

/// A raw failure from a per-credential call, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    /// HTTP status, or `None` if no response arrived.
    pub status: Option<u16>,
    /// First service-specific error code in the response body.
    pub api_code: Option<i64>,
    pub message: String,
    /// `x-rate-limit-reset` header, seconds since the Unix epoch.
    pub rate_limit_reset: Option<i64>,
    /// The request was never sent because it could not be built.
    pub local: bool,
}

impl CallFailure {
    /// A failure where no response was received.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            api_code: None,
            message: message.into(),
            rate_limit_reset: None,
            local: false,
        }
    }

    /// A request that could not be built, e.g. an unparseable URL.
    pub fn local(message: impl Into<String>) -> Self {
        Self {
            local: true,
            ..Self::transport(message)
        }
    }

    /// A failure carried by an HTTP response.
    pub fn http(status: u16, api_code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            api_code,
            message: message.into(),
            rate_limit_reset: None,
            local: false,
        }
    }

    #[must_use]
    pub fn with_reset(mut self, epoch_secs: i64) -> Self {
        self.rate_limit_reset = Some(epoch_secs);
        self
    }

    fn code_in(&self, codes: &[i64]) -> bool {
        self.api_code.is_some_and(|c| codes.contains(&c))
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429) || self.code_in(RATE_LIMIT_CODES)
    }

    pub fn is_service_error(&self) -> bool {
        (self.status.is_none() && !self.local)
            || self.code_in(CAPACITY_CODES)
            || self.status.is_some_and(|s| CAPACITY_STATUSES.contains(&s))
    }

    pub fn is_not_found(&self) -> bool {
        self.code_in(NOT_FOUND_CODES) || (self.status == Some(404) && self.api_code.is_none())
    }

    pub fn is_forbidden(&self) -> bool {
        match self.status {
            Some(401) => self.api_code.is_none(),
            Some(403) => self.api_code.is_none() || self.code_in(FORBIDDEN_CODES),
            _ => false,
        }
    }

    /// When the credential that produced this failure may be used again.
    pub fn resume_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.rate_limit_reset
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or(now + DEFAULT_RATE_LIMIT_WINDOW)
    }
}

/// The closed set of failure kinds the rest of the system reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Credential exhausted; usable again at `resume_at`.
    RateLimited { resume_at: DateTime<Utc> },
    /// Transient service trouble; worth retrying after a pause.
    ServiceError,
    /// The requested user, list or page does not exist.
    NotFound,
    /// The resource exists but is hidden, e.g. a protected account.
    Forbidden,
    /// Anything else. Never retried.
    Unclassified,
}

/// Classify `failure` as seen at `now`.
pub fn classify(failure: &CallFailure, now: DateTime<Utc>) -> ErrorClass {
    if failure.is_rate_limited() {
        ErrorClass::RateLimited {
            resume_at: failure.resume_at(now),
        }
    } else if failure.is_service_error() {
        ErrorClass::ServiceError
    } else if failure.is_not_found() {
        ErrorClass::NotFound
    } else if failure.is_forbidden() {
        ErrorClass::Forbidden
    } else {
        ErrorClass::Unclassified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid timestamp")
    }

    #[test]
    fn rate_limit_uses_reset_header() {
        let failure = CallFailure::http(429, Some(88), "Rate limit exceeded").with_reset(1_700_000_600);
        assert_eq!(
            classify(&failure, now()),
            ErrorClass::RateLimited {
                resume_at: Utc.timestamp_opt(1_700_000_600, 0).single().expect("valid")
            }
        );
    }

    #[test]
    fn rate_limit_without_header_defaults_to_window() {
        let failure = CallFailure::http(429, None, "Too Many Requests");
        assert_eq!(
            classify(&failure, now()),
            ErrorClass::RateLimited {
                resume_at: now() + DEFAULT_RATE_LIMIT_WINDOW
            }
        );
    }

    #[test]
    fn code_88_is_rate_limited_regardless_of_status() {
        let failure = CallFailure::http(400, Some(88), "limit");
        assert!(matches!(
            classify(&failure, now()),
            ErrorClass::RateLimited { .. }
        ));
    }

    #[test]
    fn transport_failure_is_service_error() {
        assert_eq!(
            classify(&CallFailure::transport("connection reset"), now()),
            ErrorClass::ServiceError
        );
    }

    #[test]
    fn local_failure_is_unclassified() {
        let failure = CallFailure::local("relative URL without a base");
        assert_eq!(failure.status, None);
        assert_eq!(classify(&failure, now()), ErrorClass::Unclassified);
    }

    #[test]
    fn over_capacity_statuses_and_codes_are_service_errors() {
        for status in [500, 502, 503, 504] {
            assert_eq!(
                classify(&CallFailure::http(status, None, "oops"), now()),
                ErrorClass::ServiceError,
                "status {status}"
            );
        }
        for code in [130, 131] {
            assert_eq!(
                classify(&CallFailure::http(200, Some(code), "over capacity"), now()),
                ErrorClass::ServiceError,
                "code {code}"
            );
        }
    }

    #[test]
    fn not_found_codes_and_bare_404() {
        for code in [17, 34, 50, 63] {
            assert_eq!(
                classify(&CallFailure::http(404, Some(code), "missing"), now()),
                ErrorClass::NotFound,
                "code {code}"
            );
        }
        assert_eq!(
            classify(&CallFailure::http(404, None, "missing"), now()),
            ErrorClass::NotFound
        );
        assert_eq!(
            classify(&CallFailure::http(404, Some(999), "other"), now()),
            ErrorClass::Unclassified
        );
    }

    #[test]
    fn forbidden_variants() {
        assert_eq!(
            classify(&CallFailure::http(401, None, "protected"), now()),
            ErrorClass::Forbidden
        );
        assert_eq!(
            classify(&CallFailure::http(403, Some(179), "hidden"), now()),
            ErrorClass::Forbidden
        );
        assert_eq!(
            classify(&CallFailure::http(403, None, "hidden"), now()),
            ErrorClass::Forbidden
        );
        assert_eq!(
            classify(&CallFailure::http(401, Some(32), "bad auth"), now()),
            ErrorClass::Unclassified
        );
    }

    #[test]
    fn priority_prefers_rate_limit_over_service_error() {
        // 503 alone is a service error, but code 88 wins.
        let failure = CallFailure::http(503, Some(88), "limit");
        assert!(matches!(
            classify(&failure, now()),
            ErrorClass::RateLimited { .. }
        ));
    }

    #[test]
    fn priority_prefers_service_error_over_not_found() {
        let failure = CallFailure::http(503, Some(34), "weird");
        assert_eq!(classify(&failure, now()), ErrorClass::ServiceError);
    }
}
