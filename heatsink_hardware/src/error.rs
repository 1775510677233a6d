use heatsink_traits::MultiError;
use thiserror::Error;

/// Which of the two actuation levels a write was meant to command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedLevel {
    Min,
    Max,
}

impl std::fmt::Display for SpeedLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeedLevel::Min => f.write_str("minimum"),
            SpeedLevel::Max => f.write_str("maximum"),
        }
    }
}

#[derive(Debug, Error)]
pub enum HwError {
    #[error("fan driver is closed")]
    FanClosed,
    #[error("thermal sensor is closed")]
    SensorClosed,
    // Causes live in the message; none is also chained as `source`.
    #[error("failed to set {level} speed: {cause}")]
    SetSpeed {
        level: SpeedLevel,
        cause: std::io::Error,
    },
    #[error("generating initial pulse: {0}")]
    Pulse(Box<HwError>),
    #[error("failed to set fan speed to max while closing driver: {0}")]
    FailSafe(std::io::Error),
    #[error("failed to close device file while closing driver: {0}")]
    CloseDevice(std::io::Error),
    #[error("{0}")]
    Close(MultiError),
    #[error("malformed temperature reading {raw:?}: {reason}")]
    Parse { raw: String, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HwError {
    /// True for the "already closed" sentinels of fans and sensors.
    pub fn is_closed(&self) -> bool {
        matches!(self, HwError::FanClosed | HwError::SensorClosed)
    }
}

pub type Result<T> = std::result::Result<T, HwError>;
