//! Conversions from `heatsink_config` entries to core types.

use crate::config::HeatsinkCfg;
use crate::duty_cycle::FanResponse;

impl From<heatsink_config::ResponseType> for FanResponse {
    fn from(r: heatsink_config::ResponseType) -> Self {
        match r {
            heatsink_config::ResponseType::Linear => Self::Linear,
            heatsink_config::ResponseType::PowPi => Self::PowPi,
        }
    }
}

impl TryFrom<&heatsink_config::HeatsinkEntry> for HeatsinkCfg {
    type Error = eyre::Report;

    fn try_from(e: &heatsink_config::HeatsinkEntry) -> Result<Self, Self::Error> {
        let mut cfg = HeatsinkCfg::with_bounds(e.min_temp, e.max_temp);
        cfg.name = Some(e.name.clone()).filter(|n| !n.is_empty());
        if let Some(period) = e.check_period()? {
            cfg.check_period = period;
        }
        cfg.response = e.fan.response()?.into();
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn entry_maps_onto_cfg() {
        let doc = heatsink_config::load_json(
            r#"{"heatsinks":[{"name":"cpu","fan":{"response_type":"linear"},
                "temp_check_period":"250ms","min_temp":35,"max_temp":75}]}"#,
        )
        .unwrap();
        let cfg = HeatsinkCfg::try_from(&doc.heatsinks[0]).unwrap();
        assert_eq!(cfg.name.as_deref(), Some("cpu"));
        assert_eq!(cfg.check_period, Duration::from_millis(250));
        assert_eq!(cfg.response, FanResponse::Linear);
        assert_eq!((cfg.min_temp, cfg.max_temp), (35.0, 75.0));
    }

    #[test]
    fn blank_fields_keep_defaults() {
        let entry = heatsink_config::HeatsinkEntry::default();
        let cfg = HeatsinkCfg::try_from(&entry).unwrap();
        assert_eq!(cfg.name, None);
        assert_eq!(cfg.check_period, crate::config::DEFAULT_CHECK_PERIOD);
        assert_eq!(cfg.response, FanResponse::PowPi);
    }
}
