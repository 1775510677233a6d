//! Test doubles for the controller's collaborators.
//!
//! Both keep their state behind an `Arc`, so a clone kept by the test still
//! observes the instance moved into the controller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use heatsink_traits::{BoxError, FanDriver, ThermoSensor};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct FanState {
    ratios: Vec<f64>,
    closes: usize,
    fail_set: Option<String>,
    fail_close: Option<String>,
}

/// Fan that records every commanded ratio and counts closes.
#[derive(Debug, Clone)]
pub struct RecordingFan {
    name: String,
    state: Arc<Mutex<FanState>>,
}

impl RecordingFan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    pub fn ratios(&self) -> Vec<f64> {
        lock(&self.state).ratios.clone()
    }

    pub fn close_count(&self) -> usize {
        lock(&self.state).closes
    }

    /// Make later `set_duty_cycle` calls fail with `msg`.
    pub fn fail_set(&self, msg: &str) {
        lock(&self.state).fail_set = Some(msg.to_string());
    }

    /// Make the first `close` fail with `msg` (it still counts as closed).
    pub fn fail_close(&self, msg: &str) {
        lock(&self.state).fail_close = Some(msg.to_string());
    }
}

impl FanDriver for RecordingFan {
    fn set_duty_cycle(&self, ratio: f64) -> Result<(), BoxError> {
        let mut st = lock(&self.state);
        if st.closes > 0 {
            return Err("fan driver is closed".into());
        }
        if let Some(msg) = &st.fail_set {
            return Err(msg.clone().into());
        }
        st.ratios.push(ratio);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&self) -> Result<(), BoxError> {
        let mut st = lock(&self.state);
        st.closes += 1;
        if st.closes > 1 {
            return Err("fan driver is closed".into());
        }
        match &st.fail_close {
            Some(msg) => Err(msg.clone().into()),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
struct SensorState {
    reading: Result<f64, String>,
    reads: usize,
    closes: usize,
    fail_close: Option<String>,
}

/// Sensor whose reading (or failure) is set by the test.
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    name: String,
    state: Arc<Mutex<SensorState>>,
}

impl ScriptedSensor {
    pub fn new(name: impl Into<String>, celsius: f64) -> Self {
        Self::with_reading(name, Ok(celsius))
    }

    pub fn failing(name: impl Into<String>, msg: &str) -> Self {
        Self::with_reading(name, Err(msg.to_string()))
    }

    fn with_reading(name: impl Into<String>, reading: Result<f64, String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(SensorState {
                reading,
                reads: 0,
                closes: 0,
                fail_close: None,
            })),
        }
    }

    pub fn set_celsius(&self, celsius: f64) {
        lock(&self.state).reading = Ok(celsius);
    }

    pub fn set_failure(&self, msg: &str) {
        lock(&self.state).reading = Err(msg.to_string());
    }

    pub fn fail_close(&self, msg: &str) {
        lock(&self.state).fail_close = Some(msg.to_string());
    }

    pub fn read_count(&self) -> usize {
        lock(&self.state).reads
    }

    pub fn close_count(&self) -> usize {
        lock(&self.state).closes
    }
}

impl ThermoSensor for ScriptedSensor {
    fn temperature(&self) -> Result<f64, BoxError> {
        let mut st = lock(&self.state);
        if st.closes > 0 {
            return Err("thermal sensor is closed".into());
        }
        st.reads += 1;
        st.reading.clone().map_err(Into::into)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&self) -> Result<(), BoxError> {
        let mut st = lock(&self.state);
        st.closes += 1;
        if st.closes > 1 {
            return Err("thermal sensor is closed".into());
        }
        match &st.fail_close {
            Some(msg) => Err(msg.clone().into()),
            None => Ok(()),
        }
    }
}
