//! # Jitter for retry delays.
//!
//! [`JitterPolicy`] randomizes back-off delays so that retries for many
//! destinations which failed together do not land on the transport in one
//! synchronized wave.
//!
//! - [`JitterPolicy::None`] exact delays (default; keeps retry timing exact)
//! - [`JitterPolicy::Full`] random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`] `delay/2 + random[0, delay/2]`

use std::time::Duration;

use rand::Rng;

/// Policy controlling randomization of retry delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JitterPolicy {
    /// No jitter: use the exact computed delay.
    #[default]
    None,

    /// Full jitter: random in `[0, delay]`.
    ///
    /// Maximum spread; a retry may fire almost immediately.
    Full,

    /// Equal jitter: `delay/2 + random[0, delay/2]`.
    ///
    /// Preserves at least half of the computed delay.
    Equal,
}

impl JitterPolicy {
    /// Applies the policy to a computed delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Self::full(delay),
            JitterPolicy::Equal => Self::equal(delay),
        }
    }

    fn full(delay: Duration) -> Duration {
        let ms = (delay.as_millis().min(u128::from(u64::MAX))) as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=ms))
    }

    fn equal(delay: Duration) -> Duration {
        let ms = (delay.as_millis().min(u128::from(u64::MAX))) as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        let half = ms / 2;
        let jitter = if half == 0 {
            0
        } else {
            rand::rng().random_range(0..=half)
        };
        Duration::from_millis(half + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(120);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn equal_keeps_at_least_half() {
        let d = Duration::from_millis(100);
        for _ in 0..32 {
            let j = JitterPolicy::Equal.apply(d);
            assert!(j >= Duration::from_millis(50));
            assert!(j <= d);
        }
    }

    #[test]
    fn zero_delay_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
