//! Builder for [`Heatsink`].
//!
//! Everything is checked in `try_build()`: a fan, at least one sensor, unique
//! sensor names, and `min_temp < max_temp`.

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use heatsink_traits::{Clock, FanDriver, MonotonicClock, ThermoSensor};

use crate::config::HeatsinkCfg;
use crate::controller::Heatsink;
use crate::duty_cycle::{DutyCycler, FanResponse, ResponseCurve};
use crate::error::{BuildError, Report, Result};

#[derive(Default)]
pub struct HeatsinkBuilder {
    fan: Option<Box<dyn FanDriver>>,
    sensors: Vec<Box<dyn ThermoSensor>>,
    cfg: HeatsinkCfg,
    curve: Option<Box<dyn ResponseCurve>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl HeatsinkBuilder {
    pub fn with_fan(mut self, fan: impl FanDriver + 'static) -> Self {
        self.fan = Some(Box::new(fan));
        self
    }

    pub fn with_sensor(mut self, sensor: impl ThermoSensor + 'static) -> Self {
        self.sensors.push(Box::new(sensor));
        self
    }

    pub fn with_sensors(mut self, sensors: impl IntoIterator<Item = Box<dyn ThermoSensor>>) -> Self {
        self.sensors.extend(sensors);
        self
    }

    /// Replace the whole configuration. Individual `with_*` setters applied
    /// afterwards override its fields.
    pub fn with_config(mut self, cfg: HeatsinkCfg) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.cfg.name = Some(name.into());
        self
    }

    pub fn with_temperatures(mut self, min_temp: f64, max_temp: f64) -> Self {
        self.cfg.min_temp = min_temp;
        self.cfg.max_temp = max_temp;
        self
    }

    pub fn with_check_period(mut self, period: Duration) -> Self {
        self.cfg.check_period = period;
        self
    }

    pub fn with_response(mut self, response: FanResponse) -> Self {
        self.cfg.response = response;
        self
    }

    /// Use a custom temperature → ratio mapping instead of the configured
    /// response. The temperature bounds are still validated.
    pub fn with_curve(mut self, curve: impl ResponseCurve + 'static) -> Self {
        self.curve = Some(Box::new(curve));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn try_build(self) -> Result<Heatsink> {
        let fan = self.fan.ok_or_else(|| Report::new(BuildError::MissingFan))?;
        validate_and_build(fan, self.sensors, &self.cfg, self.curve, self.clock)
    }
}

fn validate_and_build(
    fan: Box<dyn FanDriver>,
    sensors: Vec<Box<dyn ThermoSensor>>,
    cfg: &HeatsinkCfg,
    curve: Option<Box<dyn ResponseCurve>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<Heatsink> {
    if sensors.is_empty() {
        return Err(Report::new(BuildError::NoSensors));
    }
    {
        let mut names = HashSet::with_capacity(sensors.len());
        for sensor in &sensors {
            if !names.insert(sensor.name()) {
                return Err(Report::new(BuildError::DuplicateSensor(
                    sensor.name().to_string(),
                )));
            }
        }
    }

    let cycler = DutyCycler::new(cfg.min_temp, cfg.max_temp, cfg.response).map_err(Report::new)?;
    let curve: Box<dyn ResponseCurve> = match curve {
        Some(custom) => custom,
        None => Box::new(cycler),
    };
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(c) => c,
        None => Arc::new(MonotonicClock::new()),
    };

    let name = cfg
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("heatsink/{}", fan.name()));

    Ok(Heatsink {
        name,
        fan,
        sensors,
        curve,
        check_period: cfg.effective_check_period(),
        clock,
        stopped: AtomicBool::new(false),
        cycle: Mutex::new(()),
    })
}
