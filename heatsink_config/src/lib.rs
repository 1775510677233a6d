#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the heatsink daemon.
//!
//! - `Config` lists heatsinks, each with one fan and a set of sensor globs.
//!   It is decoded from JSON (or TOML for `.toml` files) and validated with
//!   [`Config::validate`].
//! - Durations use the `300ms` / `1m30s` notation; blank means "default".
//! - Globs are resolved against the filesystem at assembly time, not here.
use std::fmt;
use std::path::Path;
use std::time::Duration;

use eyre::{WrapErr, bail};
use serde::Deserialize;

pub mod duration;
pub mod paths;

pub use duration::{parse_duration, parse_optional_duration};
pub use paths::{resolve_fan_path, resolve_sensor_paths};

/// How a heatsink maps temperature to fan duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    Linear,
    #[default]
    PowPi,
}

impl std::str::FromStr for ResponseType {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "powpi" => Ok(Self::PowPi),
            "linear" => Ok(Self::Linear),
            _ => bail!("unknown fan response type '{s}'"),
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => f.write_str("linear"),
            Self::PowPi => f.write_str("powpi"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FanEntry {
    /// Display name; defaults to the resolved device path.
    pub name: String,
    /// Glob that must match exactly one PWM attribute file.
    pub path_glob: String,
    /// PWM period (e.g. `"50ms"`); blank for the driver default.
    pub pwm_period: String,
    /// Value written for minimum speed; blank for `"0"`.
    pub min_speed_value: String,
    /// Value written for maximum speed; blank for `"255"`.
    pub max_speed_value: String,
    /// `linear` or `powpi` (case-insensitive); blank for `powpi`.
    pub response_type: String,
}

impl FanEntry {
    pub fn period(&self) -> eyre::Result<Option<Duration>> {
        parse_optional_duration(&self.pwm_period).wrap_err("fan.pwm_period")
    }

    pub fn response(&self) -> eyre::Result<ResponseType> {
        self.response_type.parse()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HeatsinkEntry {
    pub name: String,
    pub fan: FanEntry,
    pub sensor_path_globs: Vec<String>,
    /// Control cycle period (e.g. `"1s"`); blank for the controller default.
    pub temp_check_period: String,
    pub min_temp: f64,
    pub max_temp: f64,
}

impl HeatsinkEntry {
    pub fn check_period(&self) -> eyre::Result<Option<Duration>> {
        parse_optional_duration(&self.temp_check_period).wrap_err("temp_check_period")
    }

    /// Name used in diagnostics: the configured name, or the entry's
    /// position when it has none.
    pub fn label(&self, index: usize) -> String {
        if self.name.is_empty() {
            format!("heatsinks[{index}]")
        } else {
            self.name.clone()
        }
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if !(self.min_temp.is_finite() && self.max_temp.is_finite()) {
            bail!("min_temp and max_temp must be finite numbers");
        }
        if !(self.min_temp < self.max_temp) {
            bail!(
                "min_temp ({}) must be less than max_temp ({})",
                self.min_temp,
                self.max_temp
            );
        }
        self.check_period()?;
        self.fan.period()?;
        self.fan.response()?;
        if self.fan.path_glob.trim().is_empty() {
            bail!("fan.path_glob must not be empty");
        }
        if self.sensor_path_globs.iter().all(|g| g.trim().is_empty()) {
            bail!("sensor_path_globs must list at least one glob");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub heatsinks: Vec<HeatsinkEntry>,
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.heatsinks.is_empty() {
            bail!("no heatsink config in given data");
        }
        for (i, hs) in self.heatsinks.iter().enumerate() {
            hs.validate()
                .wrap_err_with(|| format!("heatsink '{}'", hs.label(i)))?;
        }
        Ok(())
    }
}

/// Text formats a config file may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    /// TOML for `*.toml`, JSON for everything else.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

pub fn load_json(s: &str) -> Result<Config, serde_json::Error> {
    serde_json::from_str::<Config>(s)
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_str(s: &str, format: Format) -> eyre::Result<Config> {
    match format {
        Format::Json => load_json(s).wrap_err("error decoding json config"),
        Format::Toml => load_toml(s).wrap_err("error decoding toml config"),
    }
}

/// Read and decode `path`, picking the format from its extension.
/// Does not validate.
pub fn load_path(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("open config {}", path.display()))?;
    load_str(&text, Format::from_path(path))
}
