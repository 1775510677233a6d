//! Temperature to duty-cycle mappings.

use std::f64::consts::PI;

use crate::error::BuildError;

/// Shape of the temperature response between the two calibration bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanResponse {
    /// Proportional to the normalized temperature.
    Linear,
    /// Normalized temperature raised to π: quiet through brief spikes,
    /// steep near the maximum.
    #[default]
    PowPi,
}

/// Maps a temperature to a duty-cycle ratio in `[0, 1]`.
pub trait ResponseCurve: Send + Sync {
    fn ratio(&self, temperature: f64) -> f64;
}

impl<F> ResponseCurve for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn ratio(&self, temperature: f64) -> f64 {
        self(temperature)
    }
}

/// The built-in curves: exactly 0 at or below `min_temp`, exactly 1 at or
/// above `max_temp`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyCycler {
    min_temp: f64,
    max_temp: f64,
    response: FanResponse,
}

impl DutyCycler {
    pub fn new(min_temp: f64, max_temp: f64, response: FanResponse) -> Result<Self, BuildError> {
        if !(min_temp < max_temp) {
            return Err(BuildError::BadTemperatures {
                min: min_temp,
                max: max_temp,
            });
        }
        Ok(Self {
            min_temp,
            max_temp,
            response,
        })
    }

    pub fn response(&self) -> FanResponse {
        self.response
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min_temp, self.max_temp)
    }

    fn fraction(&self, temperature: f64) -> f64 {
        if temperature.is_nan() {
            return 1.0;
        }
        if temperature <= self.min_temp {
            return 0.0;
        }
        if temperature >= self.max_temp {
            return 1.0;
        }
        (temperature - self.min_temp) / (self.max_temp - self.min_temp)
    }
}

impl ResponseCurve for DutyCycler {
    fn ratio(&self, temperature: f64) -> f64 {
        let fraction = self.fraction(temperature);
        match self.response {
            FanResponse::Linear => fraction,
            FanResponse::PowPi => fraction.powf(PI),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(10.0, 0.0)]
    #[case(20.0, 1.0)]
    #[case(15.0, 0.5)]
    #[case(25.0, 1.0)]
    #[case(9.0, 0.0)]
    fn linear_between_ten_and_twenty(#[case] t: f64, #[case] expected: f64) {
        let dc = DutyCycler::new(10.0, 20.0, FanResponse::Linear).unwrap();
        assert_eq!(dc.ratio(t), expected);
    }

    #[rstest]
    #[case(16.0, 0.200_928_5)]
    #[case(18.0, 0.496_076_0)]
    #[case(10.0, 0.0)]
    #[case(20.0, 1.0)]
    #[case(-40.0, 0.0)]
    fn pow_pi_between_ten_and_twenty(#[case] t: f64, #[case] expected: f64) {
        let dc = DutyCycler::new(10.0, 20.0, FanResponse::PowPi).unwrap();
        assert!((dc.ratio(t) - expected).abs() < 1e-6, "ratio({t}) = {}", dc.ratio(t));
    }

    #[rstest]
    #[case(20.0, 10.0)]
    #[case(10.0, 10.0)]
    #[case(f64::NAN, 10.0)]
    fn rejects_bad_bounds(#[case] min: f64, #[case] max: f64) {
        assert!(matches!(
            DutyCycler::new(min, max, FanResponse::Linear),
            Err(BuildError::BadTemperatures { .. })
        ));
    }

    #[test]
    fn closures_are_curves() {
        let curve = |t: f64| t / 100.0;
        assert_eq!(ResponseCurve::ratio(&curve, 40.0), 0.4);
    }

    proptest! {
        #[test]
        fn ratio_stays_in_unit_interval(t in any::<f64>(), pow in any::<bool>()) {
            let response = if pow { FanResponse::PowPi } else { FanResponse::Linear };
            let dc = DutyCycler::new(30.0, 70.0, response).unwrap();
            let r = dc.ratio(t);
            prop_assert!((0.0..=1.0).contains(&r), "ratio({}) = {}", t, r);
        }

        #[test]
        fn ratio_is_monotonic(a in 0.0f64..100.0, b in 0.0f64..100.0) {
            let dc = DutyCycler::new(30.0, 70.0, FanResponse::PowPi).unwrap();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(dc.ratio(lo) <= dc.ratio(hi));
        }
    }
}
