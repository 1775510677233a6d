//! Software PWM for fans whose controller only knows two speeds.
//!
//! A `PwmFan` owns its device exclusively and keeps exactly one background
//! oscillation thread alive between calls:
//!
//! - an idle thread that only waits to be retired, or
//! - a pulsing thread that alternates min/max at the split computed from the
//!   last duty-cycle ratio.
//!
//! `set_duty_cycle` retires the current thread (rendezvous on a zero-capacity
//! channel, then join), performs one synchronous pulse so I/O faults surface
//! to the caller, and installs the next generation. `close` drops the shared
//! close signal, joins the current generation, and leaves the fan at its
//! maximum level before releasing the device.
//!
//! Background threads check for retirement only between full periods, so a
//! retire or close waits for at most one period.
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel as xch;
use heatsink_traits::{BoxError, Clock, FanDriver, MonotonicClock, MultiError};

use crate::device::{PwmDevice, SysfsPwm};
use crate::error::{HwError, Result, SpeedLevel};
use crate::util::{PulseSplit, split_period};

pub const DEFAULT_PERIOD: Duration = Duration::from_millis(50);
pub const DEFAULT_MIN_LEVEL: &str = "0";
pub const DEFAULT_MAX_LEVEL: &str = "255";

/// Construction parameters for [`PwmFan`].
///
/// Defaults: period 50ms, min level `"0"`, max level `"255"`, name = device
/// path (or `"pwm-fan"` for devices without a path). A zero period and empty
/// levels fall back to these defaults.
#[derive(Debug, Clone)]
pub struct PwmFanCfg {
    pub name: Option<String>,
    pub period: Duration,
    pub min_level: String,
    pub max_level: String,
}

impl Default for PwmFanCfg {
    fn default() -> Self {
        Self {
            name: None,
            period: DEFAULT_PERIOD,
            min_level: DEFAULT_MIN_LEVEL.to_string(),
            max_level: DEFAULT_MAX_LEVEL.to_string(),
        }
    }
}

impl PwmFanCfg {
    fn normalized(mut self) -> Self {
        if self.period.is_zero() {
            self.period = DEFAULT_PERIOD;
        }
        if self.min_level.is_empty() {
            self.min_level = DEFAULT_MIN_LEVEL.to_string();
        }
        if self.max_level.is_empty() {
            self.max_level = DEFAULT_MAX_LEVEL.to_string();
        }
        if self.name.as_deref() == Some("") {
            self.name = None;
        }
        self
    }
}

/// State shared between the fan handle and its oscillation threads.
struct Shared<D> {
    name: String,
    device: Mutex<D>,
    min_level: String,
    max_level: String,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<D: PwmDevice> Shared<D> {
    fn device(&self) -> MutexGuard<'_, D> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, level: SpeedLevel) -> std::io::Result<()> {
        let value = match level {
            SpeedLevel::Min => &self.min_level,
            SpeedLevel::Max => &self.max_level,
        };
        let mut dev = self.device();
        dev.rewind()?;
        dev.truncate()?;
        dev.write_level(value.as_bytes())
    }

    fn set_speed(&self, level: SpeedLevel) -> Result<()> {
        self.write(level)
            .map_err(|cause| HwError::SetSpeed { level, cause })
    }

    /// One full period, minimum first. A transition toward the minimum is the
    /// less audible one, so it goes first whatever the target.
    fn pulse_once(&self, split: PulseSplit) -> Result<()> {
        self.set_speed(SpeedLevel::Min)?;
        if split.down == split.period {
            return Ok(());
        }
        self.clock.sleep(split.down);

        self.set_speed(SpeedLevel::Max)?;
        if split.up == split.period {
            return Ok(());
        }
        self.clock.sleep(split.up);
        Ok(())
    }

    fn oscillate(&self, split: PulseSplit, retire: &xch::Receiver<()>, closed: &xch::Receiver<()>) {
        loop {
            // Faults here have no caller to report to; the next
            // set_duty_cycle pulses synchronously and surfaces them.
            if let Err(e) = self.write(SpeedLevel::Min) {
                tracing::trace!(fan = %self.name, error = %e, "background min write failed");
            }
            self.clock.sleep(split.down);
            if let Err(e) = self.write(SpeedLevel::Max) {
                tracing::trace!(fan = %self.name, error = %e, "background max write failed");
            }
            self.clock.sleep(split.up);

            let stop = xch::select! {
                recv(retire) -> _ => true,
                recv(closed) -> _ => true,
                default => false,
            };
            if stop {
                break;
            }
        }
    }
}

/// One generation of background oscillation.
struct Oscillator {
    retire: xch::Sender<()>,
    handle: JoinHandle<()>,
}

impl Oscillator {
    fn spawn<D: PwmDevice>(
        shared: &Arc<Shared<D>>,
        closed: &xch::Receiver<()>,
        split: Option<PulseSplit>,
    ) -> Result<Self> {
        let (retire, retire_rx) = xch::bounded::<()>(0);
        let closed = closed.clone();
        let shared = Arc::clone(shared);
        let handle = thread::Builder::new()
            .name(format!("pwm:{}", shared.name))
            .spawn(move || match split {
                Some(split) => shared.oscillate(split, &retire_rx, &closed),
                None => {
                    xch::select! {
                        recv(retire_rx) -> _ => {},
                        recv(closed) -> _ => {},
                    }
                }
            })?;
        Ok(Self { retire, handle })
    }

    /// Hand the retire notice to the thread and wait until it has exited.
    /// A thread that already left because the fan closed makes `send` fail
    /// immediately instead of blocking.
    fn retire(self) {
        let _ = self.retire.send(());
        self.join();
    }

    fn join(self) {
        drop(self.retire);
        if self.handle.join().is_err() {
            tracing::warn!("pwm oscillation thread panicked");
        }
    }
}

/// Two-speed fan driven with software PWM. Safe to share between threads;
/// ratio changes and closing are serialized internally.
pub struct PwmFan<D: PwmDevice = SysfsPwm> {
    name: String,
    period: Duration,
    shared: Arc<Shared<D>>,
    /// Current oscillation generation. Held for the whole of every
    /// set_duty_cycle and for teardown in close.
    busy: Mutex<Option<Oscillator>>,
    /// Close signal: taking and dropping the sender disconnects every
    /// receiver, which all generations observe.
    closing: Mutex<Option<xch::Sender<()>>>,
    closed: xch::Receiver<()>,
}

impl PwmFan<SysfsPwm> {
    /// Open a sysfs PWM attribute for exclusive writing.
    pub fn open(path: impl AsRef<Path>, cfg: PwmFanCfg) -> Result<Self> {
        let path = path.as_ref();
        let device = SysfsPwm::open(path)?;
        let cfg = PwmFanCfg {
            name: cfg
                .name
                .filter(|n| !n.is_empty())
                .or_else(|| Some(path.display().to_string())),
            ..cfg
        };
        Self::new(device, cfg)
    }
}

impl<D: PwmDevice> PwmFan<D> {
    pub fn new(device: D, cfg: PwmFanCfg) -> Result<Self> {
        Self::with_clock(device, cfg, Arc::new(MonotonicClock::new()))
    }

    /// Build a fan over `device` with a custom time source. The fan starts
    /// with an idle oscillation thread so the first ratio change never
    /// waits on a missing receiver.
    pub fn with_clock(
        device: D,
        cfg: PwmFanCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self> {
        let cfg = cfg.normalized();
        let name = cfg.name.unwrap_or_else(|| "pwm-fan".to_string());
        let shared = Arc::new(Shared {
            name: name.clone(),
            device: Mutex::new(device),
            min_level: cfg.min_level,
            max_level: cfg.max_level,
            clock,
        });
        let (closing, closed) = xch::bounded::<()>(0);
        let idle = Oscillator::spawn(&shared, &closed, None)?;

        tracing::debug!(fan = %name, period = ?cfg.period, "pwm fan ready");
        Ok(Self {
            name,
            period: cfg.period,
            shared,
            busy: Mutex::new(Some(idle)),
            closing: Mutex::new(Some(closing)),
            closed,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn min_level(&self) -> &str {
        &self.shared.min_level
    }

    pub fn max_level(&self) -> &str {
        &self.shared.max_level
    }

    pub fn is_closed(&self) -> bool {
        matches!(
            self.closed.try_recv(),
            Err(xch::TryRecvError::Disconnected)
        )
    }

    /// Command the fan with `ratio`, clamped to `[0, 1]`.
    ///
    /// Blocks for up to two periods: one while the previous generation
    /// retires and one for the synchronous pulse. Errors from that pulse are
    /// returned; the fan is then left idle until the next call.
    pub fn set_duty_cycle(&self, ratio: f64) -> Result<()> {
        let mut current = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return Err(HwError::FanClosed);
        }
        if let Some(previous) = current.take() {
            previous.retire();
        }
        // close() may have started while the previous generation retired.
        if self.is_closed() {
            return Err(HwError::FanClosed);
        }

        let split = split_period(ratio, self.period);
        let pulse = self.shared.pulse_once(split);
        let next = if pulse.is_err() || split.is_flat() {
            Oscillator::spawn(&self.shared, &self.closed, None)
        } else {
            Oscillator::spawn(&self.shared, &self.closed, Some(split))
        };
        tracing::trace!(fan = %self.name, ratio, up = ?split.up, down = ?split.down, "pwm generation switched");

        let installed = next.map(|osc| *current = Some(osc));
        pulse.map_err(|e| HwError::Pulse(Box::new(e)))?;
        installed
    }

    /// Stop oscillating, set the maximum level, and release the device.
    ///
    /// Both the fail-safe write and the device close are attempted; every
    /// failure is reported, first detected first. Later calls return
    /// [`HwError::FanClosed`] without touching the device.
    pub fn close(&self) -> Result<()> {
        let mut closing = self.closing.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(signal) = closing.take() else {
            return Err(HwError::FanClosed);
        };
        drop(signal);

        let mut current = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(osc) = current.take() {
            osc.join();
        }

        let mut errs = MultiError::new();
        if let Err(e) = self.shared.write(SpeedLevel::Max) {
            errs.push(HwError::FailSafe(e));
        }
        if let Err(e) = self.shared.device().close() {
            errs.push(HwError::CloseDevice(e));
        }
        tracing::debug!(fan = %self.name, failures = errs.len(), "pwm fan closed at max speed");
        errs.into_result().map_err(HwError::Close)
    }
}

impl<D: PwmDevice> FanDriver for PwmFan<D> {
    fn set_duty_cycle(&self, ratio: f64) -> std::result::Result<(), BoxError> {
        PwmFan::set_duty_cycle(self, ratio).map_err(Into::into)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&self) -> std::result::Result<(), BoxError> {
        PwmFan::close(self).map_err(Into::into)
    }
}

impl<D: PwmDevice> Drop for PwmFan<D> {
    fn drop(&mut self) {
        match PwmFan::close(self) {
            Ok(()) => tracing::debug!(fan = %self.name, "pwm fan closed on drop"),
            Err(HwError::FanClosed) => {}
            Err(e) => tracing::warn!(fan = %self.name, error = %e, "fail-safe close on drop failed"),
        }
    }
}

impl<D: PwmDevice> std::fmt::Debug for PwmFan<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PwmFan")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("min_level", &self.shared.min_level)
            .field("max_level", &self.shared.max_level)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryPwm;

    #[test]
    fn defaults_apply_for_zero_and_empty_values() {
        let cfg = PwmFanCfg {
            name: Some(String::new()),
            period: Duration::ZERO,
            min_level: String::new(),
            max_level: String::new(),
        };
        let fan = PwmFan::new(MemoryPwm::new(), cfg).unwrap();
        assert_eq!(fan.name(), "pwm-fan");
        assert_eq!(fan.period(), DEFAULT_PERIOD);
        assert_eq!(fan.min_level(), "0");
        assert_eq!(fan.max_level(), "255");
    }

    #[test]
    fn open_names_fan_after_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pwm2");
        std::fs::write(&path, "").unwrap();
        let fan = PwmFan::open(&path, PwmFanCfg::default()).unwrap();
        assert_eq!(fan.name(), path.display().to_string());
        fan.close().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "255");
    }

    #[test]
    fn drop_leaves_fan_at_max() {
        let dev = MemoryPwm::new();
        let log = dev.log();
        let fan = PwmFan::new(dev, PwmFanCfg::default()).unwrap();
        fan.set_duty_cycle(0.0).unwrap();
        drop(fan);
        assert_eq!(log.last().as_deref(), Some("255"));
        assert_eq!(log.close_count(), 1);
    }
}
