//! # Linear back-off for push retries.
//!
//! [`RetryBackoff`] computes the delay before retry `n` as
//! `first + increment × (n − 1)`, optionally jittered. The growth is linear
//! rather than multiplicative: a push retry exists to ride out a short
//! transport hiccup or an in-flight predecessor, not to probe a failing
//! dependency for minutes.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use pushvisor::{JitterPolicy, RetryBackoff};
//!
//! let backoff = RetryBackoff {
//!     first: Duration::from_millis(50),
//!     increment: Duration::from_millis(50),
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay(1), Duration::from_millis(50));
//! assert_eq!(backoff.delay(2), Duration::from_millis(100));
//! assert_eq!(backoff.delay(3), Duration::from_millis(150));
//! ```

use std::time::Duration;

use crate::policies::JitterPolicy;

/// Linear retry back-off policy.
#[derive(Clone, Copy, Debug)]
pub struct RetryBackoff {
    /// Delay before the first retry.
    pub first: Duration,
    /// Increment added per further retry.
    pub increment: Duration,
    /// Jitter applied to the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for RetryBackoff {
    /// Returns a policy with `first = 500ms`, `increment = 500ms`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            increment: Duration::from_millis(500),
            jitter: JitterPolicy::None,
        }
    }
}

impl RetryBackoff {
    /// Computes the delay before retry number `retry` (1-based).
    ///
    /// `retry == 0` yields `first`; the arithmetic is unsigned and saturating,
    /// so the result never underflows.
    pub fn delay(&self, retry: u32) -> Duration {
        let steps = retry.saturating_sub(1);
        let base = self.first.saturating_add(self.increment.saturating_mul(steps));
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryBackoff {
        RetryBackoff {
            first: Duration::from_millis(50),
            increment: Duration::from_millis(50),
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn delay_grows_linearly() {
        let p = policy();
        assert_eq!(p.delay(1), Duration::from_millis(50));
        assert_eq!(p.delay(2), Duration::from_millis(100));
        assert_eq!(p.delay(3), Duration::from_millis(150));
    }

    #[test]
    fn retry_zero_yields_first() {
        assert_eq!(policy().delay(0), Duration::from_millis(50));
    }

    #[test]
    fn full_jitter_stays_within_base() {
        let p = RetryBackoff {
            jitter: JitterPolicy::Full,
            ..policy()
        };
        for _ in 0..32 {
            assert!(p.delay(2) <= Duration::from_millis(100));
        }
    }
}
