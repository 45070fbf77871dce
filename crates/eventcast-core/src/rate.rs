//! Rate configuration and tick interval derivation.
//!
//! The producer sleeps `period / rate` seconds between events. The period is
//! a fixed scaling factor (4 seconds by default) so the default rate of 2.0
//! gives one event every two seconds, slow enough to follow by eye.
//!
//! # Design Principles
//!
//! - The interval is computed once, at construction, and never changes.
//! - A non-positive or non-finite rate never yields a zero sleep: it falls
//!   back to [`MIN_TICK_DELAY`], so the loop cannot spin.
//! - Every derived interval is at least [`MIN_TICK_DELAY`].
//!
//! # Rate cap
//!
//! Because of that floor, the effective rate never exceeds one event per
//! millisecond (1000 events/s). With the default 4 s period any configured
//! rate above 4000 is capped; [`TickRate::is_capped`] reports when that
//! happened and the generator logs it at startup.

use std::time::Duration;

/// Default events-per-second rate.
pub const DEFAULT_RATE: f64 = 2.0;

/// Default scaling period, in seconds.
pub const DEFAULT_PERIOD_SECONDS: f64 = 4.0;

/// Shortest sleep the producer will ever take between ticks.
pub const MIN_TICK_DELAY: Duration = Duration::from_millis(1);

/// Errors that can occur when deriving a tick interval.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    /// The scaling period is zero, negative, or not a number.
    #[error("invalid period: {period} seconds (must be finite and positive)")]
    InvalidPeriod {
        /// The rejected period.
        period: f64,
    },

    /// `period / rate` does not fit in a [`Duration`].
    #[error("interval for rate {rate} with period {period}s is too large")]
    IntervalOverflow {
        /// The configured rate.
        rate: f64,
        /// The configured period.
        period: f64,
    },
}

/// A validated rate together with the interval it maps to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickRate {
    /// Requested events per second, as configured.
    rate: f64,

    /// Scaling period in seconds.
    period: f64,

    /// Sleep between the start of consecutive ticks.
    interval: Duration,

    /// Whether the rate was unusable and [`MIN_TICK_DELAY`] was substituted.
    fallback: bool,

    /// Whether `period / rate` fell below [`MIN_TICK_DELAY`] and was raised.
    capped: bool,
}

impl TickRate {
    /// Derive the tick interval for `rate` events per second.
    ///
    /// # Errors
    ///
    /// Returns [`RateError::InvalidPeriod`] if `period_seconds` is not a
    /// positive finite number, or [`RateError::IntervalOverflow`] if the
    /// rate is so small the interval cannot be represented.
    pub fn new(rate: f64, period_seconds: f64) -> Result<Self, RateError> {
        if !period_seconds.is_finite() || period_seconds <= 0.0 {
            return Err(RateError::InvalidPeriod {
                period: period_seconds,
            });
        }

        if !rate.is_finite() || rate <= 0.0 {
            return Ok(Self {
                rate,
                period: period_seconds,
                interval: MIN_TICK_DELAY,
                fallback: true,
                capped: false,
            });
        }

        let interval = Duration::try_from_secs_f64(period_seconds / rate).map_err(|_err| {
            RateError::IntervalOverflow {
                rate,
                period: period_seconds,
            }
        })?;

        Ok(Self {
            rate,
            period: period_seconds,
            interval: interval.max(MIN_TICK_DELAY),
            fallback: false,
            capped: interval < MIN_TICK_DELAY,
        })
    }

    /// The rate as configured (may be non-positive when [`is_fallback`] is set).
    ///
    /// [`is_fallback`]: Self::is_fallback
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// The scaling period in seconds.
    pub const fn period_seconds(&self) -> f64 {
        self.period
    }

    /// Time from the start of one tick to the start of the next.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the configured rate was unusable.
    pub const fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Whether the rate was too high and the interval was raised to
    /// [`MIN_TICK_DELAY`].
    pub const fn is_capped(&self) -> bool {
        self.capped
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self {
            rate: DEFAULT_RATE,
            period: DEFAULT_PERIOD_SECONDS,
            interval: Duration::from_secs(2),
            fallback: false,
            capped: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_is_two_seconds() {
        let rate = TickRate::new(DEFAULT_RATE, DEFAULT_PERIOD_SECONDS).unwrap();
        assert_eq!(rate.interval(), Duration::from_secs(2));
        assert!(!rate.is_fallback());
        assert_eq!(rate, TickRate::default());
    }

    #[test]
    fn interval_scales_inversely_with_rate() {
        let slow = TickRate::new(1.0, 4.0).unwrap();
        let fast = TickRate::new(8.0, 4.0).unwrap();
        assert_eq!(slow.interval(), Duration::from_secs(4));
        assert_eq!(fast.interval(), Duration::from_millis(500));
    }

    #[test]
    fn zero_rate_falls_back_to_min_delay() {
        let rate = TickRate::new(0.0, 4.0).unwrap();
        assert_eq!(rate.interval(), MIN_TICK_DELAY);
        assert!(rate.is_fallback());
    }

    #[test]
    fn negative_and_nan_rates_fall_back() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let rate = TickRate::new(bad, 4.0).unwrap();
            assert_eq!(rate.interval(), MIN_TICK_DELAY);
            assert!(rate.is_fallback());
        }
    }

    #[test]
    fn huge_rate_is_clamped_to_min_delay() {
        let rate = TickRate::new(1.0e9, 4.0).unwrap();
        assert_eq!(rate.interval(), MIN_TICK_DELAY);
        assert!(!rate.is_fallback());
        assert!(rate.is_capped());
    }

    #[test]
    fn cap_starts_above_one_event_per_millisecond() {
        let below_limit = TickRate::new(2000.0, 4.0).unwrap();
        assert!(below_limit.interval() > MIN_TICK_DELAY);
        assert!(!below_limit.is_capped());

        let over_limit = TickRate::new(5000.0, 4.0).unwrap();
        assert_eq!(over_limit.interval(), MIN_TICK_DELAY);
        assert!(over_limit.is_capped());

        assert!(!TickRate::default().is_capped());
        assert!(!TickRate::new(0.0, 4.0).unwrap().is_capped());
    }

    #[test]
    fn invalid_period_is_rejected() {
        assert!(TickRate::new(2.0, 0.0).is_err());
        assert!(TickRate::new(2.0, -4.0).is_err());
        assert!(TickRate::new(2.0, f64::NAN).is_err());
    }

    #[test]
    fn tiny_rate_overflows() {
        let result = TickRate::new(f64::MIN_POSITIVE, 4.0);
        assert!(matches!(result, Err(RateError::IntervalOverflow { .. })));
    }
}
