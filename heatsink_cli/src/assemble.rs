//! Config → live controllers: resolves globs, opens devices and builds one
//! `Heatsink` per config entry.

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use heatsink_config::{Config, FanEntry, HeatsinkEntry};
use heatsink_core::{Heatsink, HeatsinkCfg};
use heatsink_hardware::{FileSensor, MemoryPwm, PwmFan, PwmFanCfg, SimulatedSensor};
use heatsink_traits::{FanDriver, ThermoSensor};

use crate::error_fmt::ConfigUnreadable;

/// Read, decode and validate the config at `path`.
pub fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path).wrap_err_with(|| ConfigUnreadable {
        path: path.to_path_buf(),
    })?;
    let cfg = heatsink_config::load_str(&text, heatsink_config::Format::from_path(path))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn fan_cfg(entry: &FanEntry) -> eyre::Result<PwmFanCfg> {
    let mut cfg = PwmFanCfg {
        name: Some(entry.name.clone()).filter(|n| !n.is_empty()),
        min_level: entry.min_speed_value.clone(),
        max_level: entry.max_speed_value.clone(),
        ..PwmFanCfg::default()
    };
    if let Some(period) = entry.period()? {
        cfg.period = period;
    }
    Ok(cfg)
}

/// Build every configured heatsink. Devices opened for earlier entries are
/// released again (fans at full speed) if a later entry fails.
pub fn heatsinks(cfg: &Config, simulate: bool) -> eyre::Result<Vec<Heatsink>> {
    let mut out = Vec::with_capacity(cfg.heatsinks.len());
    for (i, entry) in cfg.heatsinks.iter().enumerate() {
        let hs = heatsink(entry, i, simulate)
            .wrap_err_with(|| format!("heatsink '{}'", entry.label(i)))?;
        out.push(hs);
    }
    tracing::info!(heatsinks = out.len(), simulate, "all heatsinks were created successfully");
    Ok(out)
}

fn heatsink(entry: &HeatsinkEntry, index: usize, simulate: bool) -> eyre::Result<Heatsink> {
    let hs_cfg = HeatsinkCfg::try_from(entry)?;
    let fan_cfg = fan_cfg(&entry.fan)?;

    let (fan, sensors) = if simulate {
        simulated_devices(entry, index, fan_cfg)?
    } else {
        sysfs_devices(entry, fan_cfg)?
    };

    let hs = Heatsink::builder()
        .with_config(hs_cfg)
        .with_fan(fan)
        .with_sensors(sensors)
        .try_build()?;
    tracing::info!(
        heatsink = %hs.name(),
        check_period = ?hs.check_period(),
        min_temp = entry.min_temp,
        max_temp = entry.max_temp,
        response = %entry.fan.response().unwrap_or_default(),
        "created heatsink"
    );
    Ok(hs)
}

type Devices = (Box<dyn FanDriver>, Vec<Box<dyn ThermoSensor>>);

fn sysfs_devices(entry: &HeatsinkEntry, fan_cfg: PwmFanCfg) -> eyre::Result<Devices> {
    let sensors = open_sensors(&heatsink_config::resolve_sensor_paths(&entry.sensor_path_globs)?)
        .wrap_err("failed to create all sensors")?;

    let fan_path = heatsink_config::resolve_fan_path(&entry.fan.path_glob)?;
    let fan = PwmFan::open(&fan_path, fan_cfg)
        .wrap_err_with(|| format!("failed to create fan '{}'", fan_path.display()))?;
    tracing::info!(
        fan = %fan.name(),
        path = %fan_path.display(),
        period = ?fan.period(),
        min_speed_value = %fan.min_level(),
        max_speed_value = %fan.max_level(),
        "created PWM fan"
    );
    let fan: Box<dyn FanDriver> = Box::new(fan);
    Ok((fan, sensors))
}

fn open_sensors(paths: &[PathBuf]) -> eyre::Result<Vec<Box<dyn ThermoSensor>>> {
    let mut sensors: Vec<Box<dyn ThermoSensor>> = Vec::with_capacity(paths.len());
    for path in paths {
        let sensor = FileSensor::open(path, None)
            .wrap_err_with(|| format!("'{}'", path.display()))?;
        tracing::info!(sensor = %path.display(), "created thermo sensor");
        sensors.push(Box::new(sensor));
    }
    Ok(sensors)
}

/// In-memory fan plus one simulated sensor per configured glob. Each sensor
/// sweeps from below `min_temp` to above `max_temp` and then holds there.
fn simulated_devices(
    entry: &HeatsinkEntry,
    index: usize,
    mut fan_cfg: PwmFanCfg,
) -> eyre::Result<Devices> {
    if fan_cfg.name.is_none() {
        fan_cfg.name = Some(format!("sim-fan{index}"));
    }
    let fan = PwmFan::new(MemoryPwm::new(), fan_cfg)?;

    let lo = entry.min_temp - 5.0;
    let hi = entry.max_temp + 5.0;
    let sweep: Vec<f64> = (0..=10).map(|k| lo + (hi - lo) * f64::from(k) / 10.0).collect();
    let sensors: Vec<Box<dyn ThermoSensor>> = entry
        .sensor_path_globs
        .iter()
        .filter(|g| !g.trim().is_empty())
        .enumerate()
        .map(|(j, glob)| {
            Box::new(SimulatedSensor::scripted(format!("sim{j}:{glob}"), sweep.clone()))
                as Box<dyn ThermoSensor>
        })
        .collect();
    tracing::info!(fan = %fan.name(), sensors = sensors.len(), "created simulated devices");
    let fan: Box<dyn FanDriver> = Box::new(fan);
    Ok((fan, sensors))
}
