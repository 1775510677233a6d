//! Human-readable error descriptions, exit codes and structured JSON errors.

use std::fmt;
use std::path::PathBuf;

/// Exit code when the config file cannot be opened (sysexits `EX_NOINPUT`).
pub const EXIT_NO_INPUT: u8 = 66;
/// Exit code for an invalid config or a failure assembling devices
/// (sysexits `EX_CONFIG`).
pub const EXIT_CONFIG: u8 = 78;
/// Exit code for bad command-line usage (sysexits `EX_USAGE`).
pub const EXIT_USAGE: u8 = 64;

/// Context attached when the config file itself cannot be read.
#[derive(Debug)]
pub struct ConfigUnreadable {
    pub path: PathBuf,
}

impl fmt::Display for ConfigUnreadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "opening config file {}", self.path.display())
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use heatsink_core::error::{BuildError, HeatsinkError};

    if let Some(ctx) = err.downcast_ref::<ConfigUnreadable>() {
        let cause = err.root_cause();
        return format!(
            "What happened: The config file {} could not be read ({cause}).\nLikely causes: Wrong path or missing read permission.\nHow to fix: Pass an existing JSON file via --config.",
            ctx.path.display()
        );
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingFan => {
                "What happened: No fan was provided to the controller.\nLikely causes: The fan failed to open or was not wired into the builder.\nHow to fix: Ensure the fan is created successfully and passed via with_fan(...).".to_string()
            }
            BuildError::NoSensors => {
                "What happened: No temperature sensors were provided.\nLikely causes: sensor_path_globs is empty.\nHow to fix: List at least one sensor glob for every heatsink.".to_string()
            }
            BuildError::DuplicateSensor(name) => format!(
                "What happened: Sensor '{name}' was given twice.\nLikely causes: Two sensors share a name.\nHow to fix: Give every sensor of a heatsink a distinct name or path."
            ),
            BuildError::BadTemperatures { min, max } => format!(
                "What happened: Invalid temperature bounds (min {min}, max {max}).\nLikely causes: min_temp is not below max_temp.\nHow to fix: Set min_temp lower than max_temp in the config."
            ),
        };
    }

    if let Some(he) = err.downcast_ref::<HeatsinkError>() {
        return match he {
            HeatsinkError::AllSensorsFailed(_) => format!(
                "What happened: Every temperature sensor failed to read ({he}).\nLikely causes: Sensors were unloaded or their files vanished.\nHow to fix: Check the hwmon driver and the sensor_path_globs."
            ),
            HeatsinkError::Fan(_) => format!(
                "What happened: The fan could not be commanded ({he}).\nLikely causes: The PWM file is not writable or the driver was unloaded.\nHow to fix: Check permissions on the fan's path_glob target."
            ),
            _ => format!(
                "What happened: {he}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config and glob resolution
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("no file matches") {
        return format!(
            "What happened: A device glob matched no file ({msg}).\nLikely causes: Wrong hwmon path or the driver is not loaded.\nHow to fix: Check the glob against `ls /sys/class/hwmon/*/`."
        );
    }
    if lower.contains("too many matches") {
        return format!(
            "What happened: A fan glob matched several files ({msg}).\nLikely causes: The pattern is too broad.\nHow to fix: Narrow fan.path_glob so it names exactly one pwm file."
        );
    }
    if lower.contains("decoding json config") || lower.contains("decoding toml config") {
        return format!(
            "What happened: The config file is not well-formed ({msg}).\nLikely causes: A syntax error or a value of the wrong type.\nHow to fix: Fix the reported line and column, then rerun."
        );
    }

    format!(
        "Something went wrong: {msg}\nHow to fix: Re-run with --log-level=debug for details."
    )
}

/// Exit code for a setup failure: 66 when the config file cannot be read,
/// 78 for everything else.
pub fn exit_code_for_error(err: &eyre::Report) -> u8 {
    if err.downcast_ref::<ConfigUnreadable>().is_some() {
        return EXIT_NO_INPUT;
    }
    EXIT_CONFIG
}

fn reason_name(err: &eyre::Report) -> &'static str {
    use heatsink_core::error::{BuildError, HeatsinkError};

    if err.downcast_ref::<ConfigUnreadable>().is_some() {
        "ConfigUnreadable"
    } else if err.downcast_ref::<BuildError>().is_some() {
        "BuildError"
    } else if err.downcast_ref::<HeatsinkError>().is_some() {
        "HeatsinkError"
    } else {
        "Error"
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "message": humanize(err),
        "error": format!("{err:#}"),
        "exit_code": exit_code_for_error(err),
    })
    .to_string()
}
