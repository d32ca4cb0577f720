//! Retry policy for replayed requests.

use std::time::Duration;

use super::request::DEFAULT_MAX_RETRIES;

/// How the manager treats failed deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before an entry is dropped; stamped on each entry at enqueue.
    pub max_retries: u32,
    /// Drop an entry on the first non-retryable 4xx instead of spending its
    /// retry budget.
    pub drop_client_errors: bool,
    /// Upper bound on a single send.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            drop_client_errors: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Whether `status` counts as a successful delivery.
    #[must_use]
    pub const fn is_success(status: u16) -> bool {
        status >= 200 && status < 300
    }

    /// Whether a response with `status` should drop the entry immediately.
    ///
    /// 408 and 429 are client-class statuses that can succeed later, so they
    /// always stay retryable.
    #[must_use]
    pub const fn drops_immediately(&self, status: u16) -> bool {
        self.drop_client_errors && status >= 400 && status < 500 && status != 408 && status != 429
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert!(!policy.drop_client_errors);
        assert_eq!(policy.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_is_success() {
        assert!(RetryPolicy::is_success(200));
        assert!(RetryPolicy::is_success(204));
        assert!(!RetryPolicy::is_success(304));
        assert!(!RetryPolicy::is_success(500));
    }

    #[test]
    fn test_client_errors_retried_by_default() {
        let policy = RetryPolicy::default();
        assert!(!policy.drops_immediately(400));
        assert!(!policy.drops_immediately(422));
    }

    #[test]
    fn test_drop_client_errors() {
        let policy = RetryPolicy {
            drop_client_errors: true,
            ..RetryPolicy::default()
        };
        assert!(policy.drops_immediately(400));
        assert!(policy.drops_immediately(404));
        assert!(!policy.drops_immediately(408));
        assert!(!policy.drops_immediately(429));
        assert!(!policy.drops_immediately(500));
    }
}
