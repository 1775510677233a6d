//! Two-level actuation devices driven by [`crate::pwm::PwmFan`].
//!
//! A device only ever receives one of two opaque level strings. Every write
//! replaces the previous content: rewind, truncate, then write.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub trait PwmDevice: Send + 'static {
    fn rewind(&mut self) -> io::Result<()>;
    fn truncate(&mut self) -> io::Result<()>;
    fn write_level(&mut self, level: &[u8]) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
}

fn closed_device() -> io::Error {
    io::Error::other("device file is closed")
}

/// A write-only sysfs attribute such as `/sys/class/hwmon/hwmon0/pwm1`.
#[derive(Debug)]
pub struct SysfsPwm {
    path: PathBuf,
    file: Option<File>,
}

impl SysfsPwm {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().write(true).open(&path)?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file.as_mut().ok_or_else(closed_device)
    }
}

impl PwmDevice for SysfsPwm {
    fn rewind(&mut self) -> io::Result<()> {
        self.file()?.seek(SeekFrom::Start(0)).map(|_| ())
    }

    fn truncate(&mut self) -> io::Result<()> {
        self.file()?.set_len(0)
    }

    fn write_level(&mut self, level: &[u8]) -> io::Result<()> {
        let file = self.file()?;
        file.write_all(level)?;
        file.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(file) => {
                drop(file);
                Ok(())
            }
            None => Err(closed_device()),
        }
    }
}

#[derive(Debug, Default)]
struct LogState {
    writes: Vec<String>,
    closes: usize,
}

/// Shared record of everything a [`MemoryPwm`] was asked to do.
#[derive(Debug, Default, Clone)]
pub struct PwmLog {
    state: Arc<Mutex<LogState>>,
}

impl PwmLog {
    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every level written so far, oldest first.
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// The level currently held by the device, if any was written.
    pub fn last(&self) -> Option<String> {
        self.lock().writes.last().cloned()
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }
}

/// In-memory device for simulation and tests.
#[derive(Debug, Default)]
pub struct MemoryPwm {
    log: PwmLog,
    closed: bool,
}

impl MemoryPwm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that observes this device after it has been moved into a fan.
    pub fn log(&self) -> PwmLog {
        self.log.clone()
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(closed_device());
        }
        Ok(())
    }
}

impl PwmDevice for MemoryPwm {
    fn rewind(&mut self) -> io::Result<()> {
        self.ensure_open()
    }

    fn truncate(&mut self) -> io::Result<()> {
        self.ensure_open()
    }

    fn write_level(&mut self, level: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        self.log
            .lock()
            .writes
            .push(String::from_utf8_lossy(level).into_owned());
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.closed = true;
        self.log.lock().closes += 1;
        Ok(())
    }
}
