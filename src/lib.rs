//! Hourly dispatch simulation, costing and capacity optimisation for electricity grids.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod adjustment;
pub mod cli;
pub mod constraint;
pub mod dispatch;
pub mod error;
pub mod facility;
pub mod finance;
pub mod id;
pub mod input;
pub mod log;
pub mod metrics;
pub mod model;
pub mod optimiser;
pub mod output;
pub mod progress;
pub mod scenario;
pub mod settings;
pub mod trace;
pub mod units;
pub mod variable;
pub mod year;

#[cfg(test)]
mod fixture;

/// The folder in which the program settings file is kept
pub fn get_powermatch_config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_default().join("powermatch")
}
