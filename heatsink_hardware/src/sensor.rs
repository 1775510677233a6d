//! File-backed digital temperature sensors (`temp*_input` hwmon attributes).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use heatsink_traits::{BoxError, ThermoSensor};

use crate::error::{HwError, Result};

/// Reads an integer in millidegrees Celsius from the start of a file on every
/// call. Calls from several threads serialize on an internal lock.
#[derive(Debug)]
pub struct FileSensor {
    name: String,
    file: Mutex<Option<File>>,
}

impl FileSensor {
    /// Open `path` read-only. The sensor is named after the path unless
    /// `name` is given and non-empty.
    pub fn open(path: impl AsRef<Path>, name: Option<String>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn temperature(&self) -> Result<f64> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let file = guard.as_mut().ok_or(HwError::SensorClosed)?;
        file.seek(SeekFrom::Start(0))?;
        let mut raw = String::new();
        file.read_to_string(&mut raw)?;
        parse_millidegrees(&raw)
    }

    pub fn close(&self) -> Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.take() {
            Some(file) => {
                drop(file);
                tracing::trace!(sensor = %self.name, "sensor closed");
                Ok(())
            }
            None => Err(HwError::SensorClosed),
        }
    }
}

impl ThermoSensor for FileSensor {
    fn temperature(&self) -> std::result::Result<f64, BoxError> {
        FileSensor::temperature(self).map_err(Into::into)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&self) -> std::result::Result<(), BoxError> {
        FileSensor::close(self).map_err(Into::into)
    }
}

/// Parse the leading integer token of a hwmon reading (millidegrees Celsius)
/// into degrees Celsius.
pub fn parse_millidegrees(raw: &str) -> Result<f64> {
    let token = raw.split_whitespace().next().ok_or_else(|| HwError::Parse {
        raw: raw.to_string(),
        reason: "empty reading".to_string(),
    })?;
    let millis: i64 = token.parse().map_err(|e: std::num::ParseIntError| HwError::Parse {
        raw: raw.to_string(),
        reason: e.to_string(),
    })?;
    Ok(millis as f64 / 1000.0)
}
