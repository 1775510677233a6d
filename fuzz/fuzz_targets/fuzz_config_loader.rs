#![no_main]
use heatsink_config::{Format, load_str, parse_duration};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Decoding and validation may reject anything, but must never panic.
    for format in [Format::Json, Format::Toml] {
        if let Ok(cfg) = load_str(data, format) {
            let _ = cfg.validate();
        }
    }
    let _ = parse_duration(data);
});
