//! `heatsinkd`: runs one thermal controller per configured heatsink.

mod assemble;
mod cli;
mod error_fmt;
mod logging;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel as xch;
use eyre::WrapErr;
use heatsink_core::Heatsink;
use heatsink_core::error::is_stopped;

use crate::cli::{Cli, Commands, JSON_MODE, json_mode};
use crate::error_fmt::{EXIT_CONFIG, EXIT_USAGE, exit_code_for_error, format_error_json, humanize};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(e) = logging::init(cli.json, &cli.log_level, cli.log_file.as_deref()) {
        report(&e);
        return ExitCode::from(EXIT_USAGE);
    }

    let outcome = match &cli.cmd {
        Commands::Run {
            config,
            simulate,
            run_for,
        } => run(config, *simulate, *run_for),
        Commands::Check { config } => check(config),
    };
    match outcome {
        Ok(code) => code,
        Err(e) => {
            report(&e);
            ExitCode::from(exit_code_for_error(&e))
        }
    }
}

fn report(err: &eyre::Report) {
    tracing::error!(error = %format!("{err:#}"), "heatsinkd failed");
    if json_mode() {
        eprintln!("{}", format_error_json(err));
    } else {
        eprintln!("{}", humanize(err));
    }
}

fn stop_all(heatsinks: &[Arc<Heatsink>]) {
    for hs in heatsinks {
        if let Err(e) = hs.stop()
            && !is_stopped(&e)
        {
            tracing::error!(heatsink = %hs.name(), error = %e, "error stopping thermal control");
        }
    }
}

/// Run every heatsink on its own thread until Ctrl-C, `run_for` elapses,
/// or all of them end. Exit 0 when every controller ended by request, 1 when
/// any ended with an error.
fn run(config: &Path, simulate: bool, run_for: Option<Duration>) -> eyre::Result<ExitCode> {
    let cfg = assemble::load_config(config)?;
    let heatsinks: Vec<Arc<Heatsink>> = assemble::heatsinks(&cfg, simulate)?
        .into_iter()
        .map(Arc::new)
        .collect();

    {
        let heatsinks = heatsinks.clone();
        ctrlc::set_handler(move || {
            tracing::info!("interrupt received, stopping thermal control");
            stop_all(&heatsinks);
        })
        .wrap_err("installing Ctrl-C handler")?;
    }

    let (done_tx, done_rx) = xch::unbounded::<(String, eyre::Result<()>)>();
    let mut workers = Vec::with_capacity(heatsinks.len());
    for hs in &heatsinks {
        let hs = Arc::clone(hs);
        let done = done_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("heatsink:{}", hs.name()))
            .spawn(move || {
                let outcome = hs.start();
                let _ = done.send((hs.name().to_string(), outcome));
            });
        match spawned {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                stop_all(&heatsinks);
                return Err(e).wrap_err("spawning controller thread");
            }
        }
    }
    drop(done_tx);

    let deadline = run_for.map_or_else(xch::never, xch::after);
    let mut remaining = heatsinks.len();
    let mut failed = 0usize;
    while remaining > 0 {
        xch::select! {
            recv(done_rx) -> msg => match msg {
                Ok((name, Ok(()))) => {
                    remaining -= 1;
                    tracing::info!(heatsink = %name, "thermal control ended");
                }
                Ok((name, Err(e))) => {
                    remaining -= 1;
                    failed += 1;
                    tracing::error!(heatsink = %name, error = %e, "thermal control returned an error");
                    if !json_mode() {
                        eprintln!("heatsink '{name}': {}", humanize(&e));
                    }
                }
                // Every worker is gone; the ones that never reported panicked.
                Err(_) => break,
            },
            recv(deadline) -> _ => {
                tracing::info!("run time elapsed, stopping thermal control");
                stop_all(&heatsinks);
            }
        }
    }
    failed += remaining;

    for handle in workers {
        if handle.join().is_err() {
            tracing::error!("controller thread panicked");
        }
    }

    if failed == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Validate the config, resolve every glob and read each sensor once.
fn check(config: &Path) -> eyre::Result<ExitCode> {
    let cfg = assemble::load_config(config)?;
    let mut report = Vec::new();
    let mut failed = 0usize;

    for (i, entry) in cfg.heatsinks.iter().enumerate() {
        let label = entry.label(i);
        let fan_cfg = assemble::fan_cfg(&entry.fan)?;
        let fan_path = heatsink_config::resolve_fan_path(&entry.fan.path_glob)
            .wrap_err_with(|| format!("heatsink '{label}'"))?;
        let sensor_paths = heatsink_config::resolve_sensor_paths(&entry.sensor_path_globs)
            .wrap_err_with(|| format!("heatsink '{label}'"))?;

        let mut sensors = Vec::with_capacity(sensor_paths.len());
        for path in &sensor_paths {
            let reading = heatsink_hardware::FileSensor::open(path, None).and_then(|s| {
                let t = s.temperature();
                let _ = s.close();
                t
            });
            match reading {
                Ok(celsius) => {
                    sensors.push(serde_json::json!({ "path": path, "celsius": celsius }));
                }
                Err(e) => {
                    failed += 1;
                    sensors.push(serde_json::json!({ "path": path, "error": e.to_string() }));
                }
            }
        }

        report.push(serde_json::json!({
            "heatsink": label,
            "fan": fan_path,
            "pwm_period_ms": fan_cfg.period.as_millis() as u64,
            "response": entry.fan.response()?.to_string(),
            "min_temp": entry.min_temp,
            "max_temp": entry.max_temp,
            "sensors": sensors,
        }));
    }

    if json_mode() {
        println!("{}", serde_json::Value::Array(report));
    } else {
        for hs in &report {
            println!(
                "heatsink '{}': fan {} (period {}ms, response {}, {}..{} °C)",
                hs["heatsink"].as_str().unwrap_or_default(),
                hs["fan"].as_str().unwrap_or_default(),
                hs["pwm_period_ms"],
                hs["response"].as_str().unwrap_or_default(),
                hs["min_temp"],
                hs["max_temp"],
            );
            for s in hs["sensors"].as_array().into_iter().flatten() {
                let path = s["path"].as_str().unwrap_or_default();
                match s["celsius"].as_f64() {
                    Some(c) => println!("  sensor {path}: {c:.1} °C"),
                    None => println!("  sensor {path}: {}", s["error"].as_str().unwrap_or_default()),
                }
            }
        }
    }

    if failed == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_CONFIG))
    }
}
