use heatsink_traits::{BoxError, MultiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeatsinkError {
    /// The controller was stopped before this call.
    #[error("thermal controller is stopped")]
    Stopped,
    /// Every sensor failed in one cycle; one [`SensorFailure`] per sensor,
    /// in sensor order.
    #[error("determining max core temperature: {0}")]
    AllSensorsFailed(MultiError),
    #[error("setting fan's duty cycle: {0}")]
    Fan(BoxError),
    /// Closing the fan and sensors during stop; one entry per failed close.
    #[error("{0}")]
    Teardown(MultiError),
}

/// A single sensor's failed reading within a control cycle.
#[derive(Debug, Error)]
#[error("thermo sensor '{name}': {cause}")]
pub struct SensorFailure {
    pub name: String,
    pub cause: BoxError,
}

/// A single resource's failed close during stop.
#[derive(Debug, Error)]
#[error("error closing {kind} '{name}': {cause}")]
pub struct CloseFailure {
    pub kind: &'static str,
    pub name: String,
    pub cause: BoxError,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("missing fan")]
    MissingFan,
    #[error("no thermal sensors given")]
    NoSensors,
    #[error("duplicate sensor '{0}'")]
    DuplicateSensor(String),
    #[error("min temperature ({min}) must be less than max temperature ({max})")]
    BadTemperatures { min: f64, max: f64 },
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// True when `err` is the "already stopped" sentinel.
pub fn is_stopped(err: &Report) -> bool {
    matches!(err.downcast_ref::<HeatsinkError>(), Some(HeatsinkError::Stopped))
}
