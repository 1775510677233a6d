#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Closed-loop thermal control (hardware-agnostic).
//!
//! All device access goes through `heatsink_traits::ThermoSensor` and
//! `heatsink_traits::FanDriver`.
//!
//! ## Architecture
//!
//! - **Response curves**: temperature → duty-cycle ratio (`duty_cycle` module)
//! - **Configuration**: `HeatsinkCfg` (`config` module) and the mapping from
//!   the textual config document (`conversions`)
//! - **Controller**: the `Heatsink` loop and its stop/teardown path
//!   (`controller` module), assembled by `HeatsinkBuilder`

pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod duty_cycle;
pub mod error;
pub mod mocks;

pub use builder::HeatsinkBuilder;
pub use config::{DEFAULT_CHECK_PERIOD, HeatsinkCfg};
pub use controller::Heatsink;
pub use duty_cycle::{DutyCycler, FanResponse, ResponseCurve};
pub use error::{BuildError, CloseFailure, HeatsinkError, SensorFailure};
