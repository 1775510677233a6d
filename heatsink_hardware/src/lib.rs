//! Device backends for the heatsink controller: a software-PWM fan driver,
//! sysfs and in-memory PWM devices, and temperature sensors.
pub mod device;
pub mod error;
pub mod pwm;
pub mod sensor;
pub mod util;

pub use device::{MemoryPwm, PwmDevice, PwmLog, SysfsPwm};
pub use error::{HwError, SpeedLevel};
pub use pwm::{PwmFan, PwmFanCfg};
pub use sensor::FileSensor;

use heatsink_traits::{BoxError, ThermoSensor};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Simulated sensor: replays scripted readings, then repeats the last one.
#[derive(Debug)]
pub struct SimulatedSensor {
    name: String,
    readings: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
    closed: AtomicBool,
}

impl SimulatedSensor {
    pub fn fixed(name: impl Into<String>, celsius: f64) -> Self {
        Self::scripted(name, [celsius])
    }

    pub fn scripted(name: impl Into<String>, readings: impl IntoIterator<Item = f64>) -> Self {
        let readings: VecDeque<f64> = readings.into_iter().collect();
        let first = readings.front().copied().unwrap_or(0.0);
        Self {
            name: name.into(),
            readings: Mutex::new(readings),
            last: Mutex::new(first),
            closed: AtomicBool::new(false),
        }
    }
}

impl ThermoSensor for SimulatedSensor {
    fn temperature(&self) -> Result<f64, BoxError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HwError::SensorClosed.into());
        }
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let next = self
            .readings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(t) = next {
            *last = t;
        }
        tracing::trace!(sensor = %self.name, celsius = *last, "simulated reading");
        Ok(*last)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&self) -> Result<(), BoxError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(HwError::SensorClosed.into());
        }
        Ok(())
    }
}
