//! Runtime configuration for the controller.
//!
//! Separate from the deserialized document in `heatsink_config`; see
//! `conversions` for the mapping.

use std::time::Duration;

use crate::duty_cycle::FanResponse;

pub const DEFAULT_CHECK_PERIOD: Duration = Duration::from_secs(1);

/// Controller configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatsinkCfg {
    /// Display name. Defaults to `"heatsink/" + fan name`.
    pub name: Option<String>,
    /// At or below this temperature the fan runs at its minimum.
    pub min_temp: f64,
    /// At or above this temperature the fan runs at its maximum. Must be
    /// greater than `min_temp`; there is no default pair.
    pub max_temp: f64,
    /// Time between control cycles. Zero means [`DEFAULT_CHECK_PERIOD`].
    pub check_period: Duration,
    pub response: FanResponse,
}

impl Default for HeatsinkCfg {
    fn default() -> Self {
        Self {
            name: None,
            min_temp: 0.0,
            max_temp: 0.0,
            check_period: DEFAULT_CHECK_PERIOD,
            response: FanResponse::default(),
        }
    }
}

impl HeatsinkCfg {
    pub fn with_bounds(min_temp: f64, max_temp: f64) -> Self {
        Self {
            min_temp,
            max_temp,
            ..Self::default()
        }
    }

    pub(crate) fn effective_check_period(&self) -> Duration {
        if self.check_period.is_zero() {
            DEFAULT_CHECK_PERIOD
        } else {
            self.check_period
        }
    }
}
