//! Ordered collection of errors reported as one.

use std::fmt;

use crate::BoxError;

/// Several independent failures collected without short-circuiting, e.g. one
/// per sensor in a control cycle or one per resource during teardown.
///
/// Entries keep the order in which they were detected. A single entry
/// displays as that entry's message alone; several entries display one per
/// line, each prefixed with `- `.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<BoxError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: impl Into<BoxError>) {
        self.errors.push(err.into());
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoxError> {
        self.errors.iter()
    }

    /// `Ok(())` when nothing was collected, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [only] = self.errors.as_slice() {
            return write!(f, "{only}");
        }
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "- {err}")?;
        }
        Ok(())
    }
}

/// Entries are part of the message, so there is no `source` chain.
impl std::error::Error for MultiError {}
