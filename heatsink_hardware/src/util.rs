//! Duty-cycle to pulse timing conversion.

use std::time::Duration;

/// One PWM period split into its low (`down`) and high (`up`) segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseSplit {
    pub down: Duration,
    pub up: Duration,
    pub period: Duration,
}

impl PulseSplit {
    /// A flat split spends the whole period at one level, so no oscillation
    /// is needed to hold it.
    #[inline]
    pub fn is_flat(&self) -> bool {
        self.up == self.period || self.down == self.period
    }
}

/// Clamp `ratio` to `[0, 1]` and split `period` into `up = round(ratio * period)`
/// and `down = period - up`. A NaN ratio is treated as `1.0` (fan at max).
pub fn split_period(ratio: f64, period: Duration) -> PulseSplit {
    let ratio = clamp_ratio(ratio);
    let nanos = period.as_nanos() as f64;
    let up_nanos = (ratio * nanos).round();
    let up = Duration::from_nanos(up_nanos as u64).min(period);
    PulseSplit {
        down: period.saturating_sub(up),
        up,
        period,
    }
}

#[inline]
pub fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return 1.0;
    }
    ratio.clamp(0.0, 1.0)
}
