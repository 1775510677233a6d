use heatsink_config::{Config, ResponseType, load_json, load_path, load_toml};
use rstest::rstest;
use std::time::Duration;

const GOOD: &str = r#"{
  "heatsinks": [
    {
      "name": "cpu",
      "fan": {
        "name": "cpu-fan",
        "path_glob": "/sys/class/hwmon/hwmon*/pwm1",
        "pwm_period": "40ms",
        "min_speed_value": "20",
        "max_speed_value": "200",
        "response_type": "Linear"
      },
      "sensor_path_globs": ["/sys/class/hwmon/hwmon*/temp*_input"],
      "temp_check_period": "2s",
      "min_temp": 40,
      "max_temp": 80
    }
  ]
}"#;

fn good() -> Config {
    load_json(GOOD).expect("parse JSON")
}

fn has_cause(err: &eyre::Report, needle: &str) -> bool {
    err.chain().any(|c| c.to_string().contains(needle))
}

#[test]
fn accepts_complete_config() {
    let cfg = good();
    cfg.validate().expect("valid");
    let hs = &cfg.heatsinks[0];
    assert_eq!(hs.check_period().unwrap(), Some(Duration::from_secs(2)));
    assert_eq!(hs.fan.period().unwrap(), Some(Duration::from_millis(40)));
    assert_eq!(hs.fan.response().unwrap(), ResponseType::Linear);
    assert_eq!(hs.fan.min_speed_value, "20");
}

#[test]
fn unknown_fields_are_ignored() {
    let cfg = load_json(r#"{"heatsinks":[{"fan":{"path_glob":"x"},"extra":1}],"version":2}"#)
        .expect("parse");
    assert_eq!(cfg.heatsinks.len(), 1);
}

#[test]
fn rejects_malformed_json() {
    assert!(load_json("{ bad json").is_err());
}

#[test]
fn rejects_missing_heatsinks() {
    let cfg = load_json("{}").unwrap();
    let err = cfg.validate().expect_err("no heatsinks");
    assert!(err.to_string().contains("no heatsink config"));
}

#[rstest]
#[case(80.0, 40.0)]
#[case(50.0, 50.0)]
fn rejects_inverted_or_equal_bounds(#[case] min: f64, #[case] max: f64) {
    let mut cfg = good();
    cfg.heatsinks[0].min_temp = min;
    cfg.heatsinks[0].max_temp = max;
    let err = cfg.validate().expect_err("bad bounds");
    assert!(has_cause(&err, "must be less than max_temp"), "{err:#}");
    assert!(err.to_string().contains("heatsink 'cpu'"));
}

#[test]
fn rejects_nan_bound() {
    let mut cfg = good();
    cfg.heatsinks[0].max_temp = f64::NAN;
    let err = cfg.validate().expect_err("nan");
    assert!(has_cause(&err, "finite"));
}

#[rstest]
#[case::check_period("temp_check_period")]
#[case::pwm_period("fan.pwm_period")]
fn rejects_bad_durations(#[case] field: &str) {
    let mut cfg = good();
    match field {
        "temp_check_period" => cfg.heatsinks[0].temp_check_period = "soon".into(),
        _ => cfg.heatsinks[0].fan.pwm_period = "-5ms".into(),
    }
    let err = cfg.validate().expect_err("bad duration");
    assert!(has_cause(&err, field), "{err:#}");
}

#[test]
fn rejects_unknown_response_type() {
    let mut cfg = good();
    cfg.heatsinks[0].fan.response_type = "exponential".into();
    let err = cfg.validate().expect_err("unknown response");
    assert!(has_cause(&err, "unknown fan response type 'exponential'"));
}

#[test]
fn rejects_empty_globs() {
    let mut cfg = good();
    cfg.heatsinks[0].fan.path_glob.clear();
    assert!(has_cause(
        &cfg.validate().unwrap_err(),
        "fan.path_glob must not be empty"
    ));

    let mut cfg = good();
    cfg.heatsinks[0].sensor_path_globs = vec![" ".into()];
    assert!(has_cause(
        &cfg.validate().unwrap_err(),
        "sensor_path_globs must list at least one glob"
    ));
}

#[test]
fn unnamed_heatsink_is_labelled_by_position() {
    let mut cfg = good();
    let mut second = cfg.heatsinks[0].clone();
    second.name.clear();
    second.min_temp = 90.0;
    cfg.heatsinks.push(second);
    let err = cfg.validate().expect_err("second is bad");
    assert!(err.to_string().contains("heatsinks[1]"), "{err}");
}

#[test]
fn toml_config_loads_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("heatsink.toml");
    std::fs::write(
        &path,
        r#"
[[heatsinks]]
name = "gpu"
sensor_path_globs = ["/tmp/t*"]
min_temp = 35.0
max_temp = 70.0

[heatsinks.fan]
path_glob = "/tmp/pwm*"
response_type = "powpi"
"#,
    )
    .unwrap();
    let cfg = load_path(&path).expect("load toml");
    cfg.validate().expect("valid");
    assert_eq!(cfg.heatsinks[0].name, "gpu");
    assert_eq!(cfg.heatsinks[0].check_period().unwrap(), None);

    assert!(load_toml("heatsinks = 3").is_err());
}

#[test]
fn missing_file_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let err = load_path(&path).expect_err("missing");
    assert!(err.to_string().contains("absent.json"));
    assert!(err.downcast_ref::<std::io::Error>().is_some());
}
