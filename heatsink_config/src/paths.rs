//! Glob expansion for fan and sensor device files.

use std::collections::HashSet;
use std::path::PathBuf;

use eyre::{WrapErr, bail};

/// Expand `pattern` into the paths that currently exist, sorted. Entries
/// that cannot be read while walking are skipped.
pub fn expand(pattern: &str) -> eyre::Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern).wrap_err_with(|| format!("invalid glob '{pattern}'"))?;
    Ok(entries.filter_map(Result::ok).collect())
}

/// The single file a fan glob names. Zero or several matches are errors.
pub fn resolve_fan_path(pattern: &str) -> eyre::Result<PathBuf> {
    let mut matches = expand(pattern)?;
    match matches.len() {
        0 => bail!("'{pattern}': no file matches for the given glob"),
        1 => Ok(matches.remove(0)),
        n => bail!("'{pattern}': too many matches for the given glob ({n} files)"),
    }
}

/// Every file matched by `patterns`, in pattern order, each path once.
/// At least one file must match overall.
pub fn resolve_sensor_paths<S: AsRef<str>>(patterns: &[S]) -> eyre::Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for pattern in patterns {
        for path in expand(pattern.as_ref())? {
            if seen.insert(path.clone()) {
                out.push(path);
            }
        }
    }
    if out.is_empty() {
        let joined: Vec<&str> = patterns.iter().map(AsRef::as_ref).collect();
        bail!("[{}]: no file matches for the given globs", joined.join(", "));
    }
    Ok(out)
}
