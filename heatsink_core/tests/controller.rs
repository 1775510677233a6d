use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use heatsink_core::error::is_stopped;
use heatsink_core::mocks::{RecordingFan, ScriptedSensor};
use heatsink_core::{CloseFailure, Heatsink, HeatsinkError, SensorFailure};
use heatsink_traits::RecordingClock;

const PERIOD: Duration = Duration::from_millis(5);

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

fn heatsink(fan: &RecordingFan, sensors: &[&ScriptedSensor]) -> Heatsink {
    let mut b = Heatsink::builder()
        .with_fan(fan.clone())
        .with_temperatures(30.0, 70.0)
        .with_check_period(PERIOD);
    for s in sensors {
        b = b.with_sensor((*s).clone());
    }
    b.try_build().expect("valid heatsink")
}

fn heatsink_error(err: &eyre::Report) -> &HeatsinkError {
    err.downcast_ref::<HeatsinkError>()
        .unwrap_or_else(|| panic!("expected HeatsinkError, got: {err}"))
}

#[test]
fn commands_ratio_of_hottest_sensor() {
    let fan = RecordingFan::new("fan");
    let a = ScriptedSensor::new("a", 36.0);
    let b = ScriptedSensor::new("b", 40.0);
    let hs = Arc::new(
        Heatsink::builder()
            .with_fan(fan.clone())
            .with_sensor(a.clone())
            .with_sensor(b.clone())
            .with_temperatures(30.0, 70.0)
            .with_check_period(PERIOD)
            .with_curve(|t: f64| t / 100.0)
            .try_build()
            .unwrap(),
    );

    let runner = {
        let hs = Arc::clone(&hs);
        thread::spawn(move || hs.start())
    };
    wait_until("first command", || !fan.ratios().is_empty());
    hs.stop().expect("first stop");
    runner.join().unwrap().expect("stopped by request");

    let ratios = fan.ratios();
    assert!((ratios[0] - 0.40).abs() < 1e-12, "{ratios:?}");
    assert_eq!(fan.close_count(), 1);
    assert_eq!(a.close_count(), 1);
    assert_eq!(b.close_count(), 1);
}

#[test]
fn every_sensor_failing_aborts_with_one_entry_per_sensor() {
    let fan = RecordingFan::new("fan");
    let a = ScriptedSensor::failing("a", "a is unplugged");
    let b = ScriptedSensor::failing("b", "b is unplugged");
    let c = ScriptedSensor::failing("c", "c is unplugged");
    let hs = heatsink(&fan, &[&a, &b, &c]);

    let err = hs.start().expect_err("all sensors fail");
    let HeatsinkError::AllSensorsFailed(errs) = heatsink_error(&err) else {
        panic!("unexpected error: {err}");
    };
    let names: Vec<&str> = errs
        .iter()
        .map(|e| e.downcast_ref::<SensorFailure>().unwrap().name.as_str())
        .collect();
    assert_eq!(names, ["a", "b", "c"]);
    assert!(err.to_string().starts_with("determining max core temperature"));

    assert!(hs.is_stopped());
    assert!(fan.ratios().is_empty());
    assert_eq!(fan.close_count(), 1);
    for s in [&a, &b, &c] {
        assert_eq!(s.close_count(), 1);
    }
}

#[test]
fn single_sensor_failure_is_not_fatal() {
    let fan = RecordingFan::new("fan");
    let broken = ScriptedSensor::failing("broken", "i2c timeout");
    let ok = ScriptedSensor::new("ok", 50.0);
    let hs = Arc::new(heatsink(&fan, &[&broken, &ok]));

    let runner = {
        let hs = Arc::clone(&hs);
        thread::spawn(move || hs.start())
    };
    wait_until("two cycles", || fan.ratios().len() >= 2);
    hs.stop().unwrap();
    runner.join().unwrap().expect("not fatal");

    // PowPi over 30..70 at 50 degrees.
    let expected = 0.5f64.powf(std::f64::consts::PI);
    assert!(fan.ratios().iter().all(|r| (r - expected).abs() < 1e-12));
    assert!(broken.read_count() >= 2);
}

#[test]
fn fan_error_aborts_loop_and_tears_down() {
    let fan = RecordingFan::new("fan");
    fan.fail_set("device unplugged");
    let s = ScriptedSensor::new("s", 45.0);
    let hs = heatsink(&fan, &[&s]);

    let err = hs.start().expect_err("fan fails");
    assert!(matches!(heatsink_error(&err), HeatsinkError::Fan(_)));
    assert_eq!(
        err.to_string(),
        "setting fan's duty cycle: device unplugged"
    );
    // The alternate form walks the cause chain; each cause appears once.
    assert_eq!(
        format!("{err:#}"),
        "setting fan's duty cycle: device unplugged"
    );
    assert!(hs.is_stopped());
    assert_eq!(fan.close_count(), 1);
    assert_eq!(s.close_count(), 1);
}

#[test]
fn second_stop_is_a_sentinel_without_side_effects() {
    let fan = RecordingFan::new("fan");
    let s = ScriptedSensor::new("s", 45.0);
    let hs = heatsink(&fan, &[&s]);

    hs.stop().expect("first stop");
    let err = hs.stop().expect_err("second stop");
    assert!(is_stopped(&err));
    assert_eq!(err.to_string(), "thermal controller is stopped");
    assert_eq!(fan.close_count(), 1);
    assert_eq!(s.close_count(), 1);
}

#[test]
fn start_after_stop_touches_nothing() {
    let fan = RecordingFan::new("fan");
    let s = ScriptedSensor::new("s", 45.0);
    let hs = heatsink(&fan, &[&s]);
    hs.stop().unwrap();

    let err = hs.start().expect_err("already stopped");
    assert!(is_stopped(&err));
    assert_eq!(s.read_count(), 0);
    assert_eq!(fan.close_count(), 1);
}

#[test]
fn concurrent_stops_tear_down_once() {
    let fan = RecordingFan::new("fan");
    let s = ScriptedSensor::new("s", 45.0);
    let hs = heatsink(&fan, &[&s]);

    let results: Vec<eyre::Result<()>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..32).map(|_| scope.spawn(|| hs.stop())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(is_stopped)
    );
    assert_eq!(fan.close_count(), 1);
    assert_eq!(s.close_count(), 1);
}

#[test]
fn teardown_closes_everything_and_reports_every_failure() {
    let fan = RecordingFan::new("fan");
    fan.fail_close("fan stuck");
    let a = ScriptedSensor::new("a", 30.0);
    let b = ScriptedSensor::new("b", 30.0);
    b.fail_close("b busy");
    let c = ScriptedSensor::new("c", 30.0);
    let hs = heatsink(&fan, &[&a, &b, &c]);

    let err = hs.stop().expect_err("two failures");
    let HeatsinkError::Teardown(errs) = heatsink_error(&err) else {
        panic!("unexpected error: {err}");
    };
    let failed: Vec<(&str, &str)> = errs
        .iter()
        .map(|e| {
            let f = e.downcast_ref::<CloseFailure>().unwrap();
            (f.kind, f.name.as_str())
        })
        .collect();
    assert_eq!(failed, [("fan", "fan"), ("sensor", "b")]);
    assert_eq!(err.to_string().lines().count(), 2);
    for s in [&a, &b, &c] {
        assert_eq!(s.close_count(), 1);
    }
}

#[test]
fn single_teardown_failure_renders_verbatim() {
    let fan = RecordingFan::new("fan");
    let s = ScriptedSensor::new("s", 30.0);
    s.fail_close("read-only");
    let hs = heatsink(&fan, &[&s]);
    let err = hs.stop().expect_err("one failure");
    assert_eq!(err.to_string(), "error closing sensor 's': read-only");
}

#[test]
fn panicking_curve_still_tears_down() {
    let fan = RecordingFan::new("fan");
    let s = ScriptedSensor::new("s", 30.0);
    let hs = Heatsink::builder()
        .with_fan(fan.clone())
        .with_sensor(s.clone())
        .with_temperatures(30.0, 70.0)
        .with_check_period(PERIOD)
        .with_curve(|_t: f64| -> f64 { panic!("curve blew up") })
        .try_build()
        .unwrap();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| hs.start()));
    assert!(outcome.is_err());
    assert!(hs.is_stopped());
    assert_eq!(fan.close_count(), 1);
    assert_eq!(s.close_count(), 1);
}

#[test]
fn non_finite_reading_counts_as_failure() {
    let fan = RecordingFan::new("fan");
    let nan = ScriptedSensor::new("nan", f64::NAN);
    let hs = heatsink(&fan, &[&nan]);
    let err = hs.max_temperature().expect_err("only reading is NaN");
    assert!(matches!(
        heatsink_error(&err),
        HeatsinkError::AllSensorsFailed(errs) if errs.len() == 1
    ));
    assert!(err.to_string().contains("thermo sensor 'nan'"));
}

#[test]
fn every_cycle_waits_one_check_period_first() {
    let fan = RecordingFan::new("fan");
    let s = ScriptedSensor::new("s", 50.0);
    let clock = RecordingClock::new();
    let hs = Arc::new(
        Heatsink::builder()
            .with_fan(fan.clone())
            .with_sensor(s.clone())
            .with_temperatures(30.0, 70.0)
            .with_check_period(Duration::from_millis(7))
            .with_clock(Arc::new(clock.clone()))
            .try_build()
            .unwrap(),
    );

    let runner = {
        let hs = Arc::clone(&hs);
        thread::spawn(move || hs.start())
    };
    wait_until("three commands", || fan.ratios().len() >= 3);
    hs.stop().expect("first stop");
    runner.join().unwrap().expect("stopped by request");

    let sleeps = clock.sleeps();
    assert!(sleeps.iter().all(|d| *d == Duration::from_millis(7)), "{sleeps:?}");
    // One sleep precedes every command; the last may have ended in the stop.
    let commands = fan.ratios().len();
    assert!(sleeps.len() == commands || sleeps.len() == commands + 1, "{sleeps:?}");
}
