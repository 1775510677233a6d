//! Capability traits shared by the heatsink crates.
//!
//! Backends (sysfs files, simulators, test doubles) implement these traits;
//! the controller in `heatsink_core` only ever sees trait objects.
pub mod clock;
pub mod multi_error;

pub use clock::{Clock, MonotonicClock, RecordingClock};
pub use multi_error::MultiError;

/// Error type used at trait boundaries so any backend error can cross them.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A device that provides temperature readings in degrees Celsius.
///
/// Implementations must be safe to call from several threads; the controller
/// reads from its loop thread while `close` may arrive from a stopping thread.
pub trait ThermoSensor: Send + Sync {
    /// Current reading. A closed sensor returns a "closed" error.
    fn temperature(&self) -> Result<f64, BoxError>;
    /// Display name, used in logs and error messages.
    fn name(&self) -> &str;
    /// Release the device. A second call returns a "closed" error.
    fn close(&self) -> Result<(), BoxError>;
}

/// A fan whose speed is commanded as a duty-cycle ratio in `[0, 1]`.
pub trait FanDriver: Send + Sync {
    /// Command the fan. Out-of-range ratios are clamped by the driver.
    /// A closed driver returns a "closed" error.
    fn set_duty_cycle(&self, ratio: f64) -> Result<(), BoxError>;
    fn name(&self) -> &str;
    /// Leave the fan in its fail-safe state and release the device.
    /// A second call returns a "closed" error.
    fn close(&self) -> Result<(), BoxError>;
}

impl<T: ThermoSensor + ?Sized> ThermoSensor for Box<T> {
    fn temperature(&self) -> Result<f64, BoxError> {
        (**self).temperature()
    }
    fn name(&self) -> &str {
        (**self).name()
    }
    fn close(&self) -> Result<(), BoxError> {
        (**self).close()
    }
}

impl<T: FanDriver + ?Sized> FanDriver for Box<T> {
    fn set_duty_cycle(&self, ratio: f64) -> Result<(), BoxError> {
        (**self).set_duty_cycle(ratio)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
    fn close(&self) -> Result<(), BoxError> {
        (**self).close()
    }
}

impl<T: ThermoSensor + ?Sized> ThermoSensor for std::sync::Arc<T> {
    fn temperature(&self) -> Result<f64, BoxError> {
        (**self).temperature()
    }
    fn name(&self) -> &str {
        (**self).name()
    }
    fn close(&self) -> Result<(), BoxError> {
        (**self).close()
    }
}

impl<T: FanDriver + ?Sized> FanDriver for std::sync::Arc<T> {
    fn set_duty_cycle(&self, ratio: f64) -> Result<(), BoxError> {
        (**self).set_duty_cycle(ratio)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
    fn close(&self) -> Result<(), BoxError> {
        (**self).close()
    }
}
