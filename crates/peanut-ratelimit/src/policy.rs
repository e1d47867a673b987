//! Rate-limit policies and key construction.

/// A fixed-window rate-limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Whether overshoot doubles the advertised retry interval.
    pub exponential_backoff: bool,
    /// Ceiling for the backoff interval in milliseconds.
    pub max_backoff_ms: u64,
}

const MINUTE_MS: u64 = 60_000;

impl RatePolicy {
    /// Password login attempts, keyed by client IP: 10/min, 5 min cap.
    #[must_use]
    pub fn login() -> Self {
        Self {
            max_requests: 10,
            window_ms: MINUTE_MS,
            exponential_backoff: true,
            max_backoff_ms: 5 * MINUTE_MS,
        }
    }

    /// TOTP verification attempts, keyed by client IP: 5/min, 10 min cap.
    #[must_use]
    pub fn totp() -> Self {
        Self {
            max_requests: 5,
            window_ms: MINUTE_MS,
            exponential_backoff: true,
            max_backoff_ms: 10 * MINUTE_MS,
        }
    }

    /// Agent dispatch, keyed by user id: 60/min, 5 min cap.
    #[must_use]
    pub fn dispatch() -> Self {
        Self {
            max_requests: 60,
            window_ms: MINUTE_MS,
            exponential_backoff: true,
            max_backoff_ms: 5 * MINUTE_MS,
        }
    }

    /// Vault completion proxying, keyed by user id: 30/min, 10 min cap.
    #[must_use]
    pub fn vault_complete() -> Self {
        Self {
            max_requests: 30,
            window_ms: MINUTE_MS,
            exponential_backoff: true,
            max_backoff_ms: 10 * MINUTE_MS,
        }
    }
}

/// Build a limiter key from a domain tag and a principal.
///
/// `login`/`totp` use the client IP as principal; authenticated
/// endpoints use the user id.
#[must_use]
pub fn key(domain: &str, principal: &str) -> String {
    format!("{domain}:{principal}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_policies() {
        assert_eq!(RatePolicy::login().max_requests, 10);
        assert_eq!(RatePolicy::login().max_backoff_ms, 300_000);
        assert_eq!(RatePolicy::totp().max_requests, 5);
        assert_eq!(RatePolicy::totp().max_backoff_ms, 600_000);
        assert_eq!(RatePolicy::dispatch().max_requests, 60);
        assert_eq!(RatePolicy::vault_complete().max_requests, 30);
    }

    #[test]
    fn test_key_shape() {
        assert_eq!(key("login", "203.0.113.9"), "login:203.0.113.9");
        assert_eq!(key("dispatch", "u123"), "dispatch:u123");
    }
}
