//! The sample → decide → act loop.
//!
//! Each cycle sleeps for the check period, then, under the cycle lock,
//! reads every sensor, takes the hottest successful reading, maps it through
//! the response curve and commands the fan. `stop` takes the same lock, so
//! teardown never overlaps an in-flight cycle.
//!
//! Every exit from `start` (request, error, or unwinding panic) runs `stop`,
//! which closes the fan (leaving it at full speed) and every sensor exactly
//! once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use heatsink_traits::{Clock, FanDriver, MultiError, ThermoSensor};

use crate::builder::HeatsinkBuilder;
use crate::duty_cycle::ResponseCurve;
use crate::error::{self, CloseFailure, HeatsinkError, Report, Result, SensorFailure};

pub struct Heatsink {
    pub(crate) name: String,
    pub(crate) fan: Box<dyn FanDriver>,
    pub(crate) sensors: Vec<Box<dyn ThermoSensor>>,
    pub(crate) curve: Box<dyn ResponseCurve>,
    pub(crate) check_period: Duration,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) stopped: AtomicBool,
    pub(crate) cycle: Mutex<()>,
}

impl std::fmt::Debug for Heatsink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heatsink")
            .field("name", &self.name)
            .field("fan", &self.fan.name())
            .field(
                "sensors",
                &self.sensors.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("check_period", &self.check_period)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl Heatsink {
    pub fn builder() -> HeatsinkBuilder {
        HeatsinkBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check_period(&self) -> Duration {
        self.check_period
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn lock_cycle(&self) -> MutexGuard<'_, ()> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the control loop on the calling thread until stopped or until a
    /// fatal error.
    ///
    /// Returns `Ok(())` when [`Heatsink::stop`] ended the loop, the first
    /// fatal error otherwise ([`HeatsinkError::AllSensorsFailed`] or
    /// [`HeatsinkError::Fan`]). A controller that is already stopped returns
    /// [`HeatsinkError::Stopped`] without touching anything.
    pub fn start(&self) -> Result<()> {
        if self.is_stopped() {
            return Err(Report::new(HeatsinkError::Stopped));
        }
        tracing::info!(
            heatsink = %self.name,
            sensors = self.sensors.len(),
            check_period = ?self.check_period,
            "started thermal control"
        );
        let _stop = StopOnExit(self);

        loop {
            self.clock.sleep(self.check_period);
            let _cycle = self.lock_cycle();
            if self.is_stopped() {
                return Ok(());
            }
            self.run_cycle()?;
        }
    }

    fn run_cycle(&self) -> Result<()> {
        let temperature = self.max_temperature()?;
        let ratio = self.curve.ratio(temperature);
        tracing::debug!(heatsink = %self.name, celsius = temperature, ratio, "commanding fan");
        self.fan
            .set_duty_cycle(ratio)
            .map_err(|e| Report::new(HeatsinkError::Fan(e)))
    }

    /// Hottest reading across sensors that answered. Failed sensors are
    /// logged and skipped; when none answers, the error lists every sensor
    /// in order.
    pub fn max_temperature(&self) -> Result<f64> {
        let mut hottest: Option<f64> = None;
        let mut failures = MultiError::new();
        for sensor in &self.sensors {
            match sensor.temperature() {
                Ok(t) if t.is_finite() => {
                    hottest = Some(hottest.map_or(t, |h| h.max(t)));
                }
                Ok(t) => failures.push(SensorFailure {
                    name: sensor.name().to_string(),
                    cause: format!("non-finite reading {t}").into(),
                }),
                Err(cause) => failures.push(SensorFailure {
                    name: sensor.name().to_string(),
                    cause,
                }),
            }
        }

        let Some(hottest) = hottest else {
            return Err(Report::new(HeatsinkError::AllSensorsFailed(failures)));
        };
        for failure in failures.iter() {
            tracing::error!(heatsink = %self.name, error = %failure, "failed to read temperature");
        }
        Ok(hottest)
    }

    /// Stop the loop and release the fan and all sensors.
    ///
    /// Only the first call does anything; later calls, from any thread,
    /// return [`HeatsinkError::Stopped`]. Every resource is closed even when
    /// an earlier close fails, and all failures are returned together.
    pub fn stop(&self) -> Result<()> {
        let _cycle = self.lock_cycle();
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Err(Report::new(HeatsinkError::Stopped));
        }

        let mut failures = MultiError::new();
        if let Err(cause) = self.fan.close() {
            failures.push(CloseFailure {
                kind: "fan",
                name: self.fan.name().to_string(),
                cause,
            });
        }
        for sensor in &self.sensors {
            if let Err(cause) = sensor.close() {
                failures.push(CloseFailure {
                    kind: "sensor",
                    name: sensor.name().to_string(),
                    cause,
                });
            }
        }

        tracing::info!(heatsink = %self.name, failures = failures.len(), "stopped thermal control");
        failures
            .into_result()
            .map_err(|e| Report::new(HeatsinkError::Teardown(e)))
    }
}

/// Runs `stop` when the loop exits by any path. Teardown failures are
/// logged; the loop's own outcome stays the return value of `start`.
struct StopOnExit<'a>(&'a Heatsink);

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.0.stop()
            && !error::is_stopped(&e)
        {
            tracing::error!(heatsink = %self.0.name, error = %e, "error stopping thermal control");
        }
    }
}
