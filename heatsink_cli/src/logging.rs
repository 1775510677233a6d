//! Tracing subscriber setup: console layer (pretty or JSON) plus an
//! optional JSON-lines file sink.

use std::io;
use std::path::Path;

use eyre::{WrapErr, eyre};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::FILE_GUARD;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
/// Console output goes to stderr so command output on stdout stays clean.
pub fn init(json: bool, level: &str, file: Option<&Path>) -> eyre::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(level).wrap_err_with(|| format!("invalid log level {level:?}"))?,
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if json {
        layers.push(fmt::layer().json().with_writer(io::stderr).boxed());
    } else {
        layers.push(fmt::layer().with_writer(io::stderr).with_target(false).boxed());
    }

    if let Some(path) = file {
        let name = path
            .file_name()
            .ok_or_else(|| eyre!("log file path {} has no file name", path.display()))?;
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(name.to_string_lossy().into_owned())
            .build(dir)
            .wrap_err_with(|| format!("opening log file {}", path.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .wrap_err("installing tracing subscriber")
}
