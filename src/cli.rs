//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, ScenarioConfig};

/// Replays a metered solar history through a simulated array, battery, and
/// net-metered grid connection, and reports the savings against a system
/// with neither solar nor storage.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Load the scenario from a TOML file.
    #[clap(long, conflicts_with = "preset")]
    pub scenario: Option<PathBuf>,

    /// Use a built-in preset (default, no_battery, large_battery).
    #[clap(long)]
    pub preset: Option<String>,

    /// Metered history CSV; a synthetic history is generated when omitted.
    #[clap(long)]
    pub history: Option<PathBuf>,

    /// Override the production de-bias fraction.
    #[clap(long)]
    pub bias: Option<f64>,

    /// Export the simulated interval rows to CSV.
    #[clap(long = "telemetry-out")]
    pub telemetry_out: Option<PathBuf>,

    /// Print every simulated interval.
    #[clap(long)]
    pub rows: bool,
}

impl CliOptions {
    /// Resolves the scenario source and applies command-line overrides.
    ///
    /// Falls back to the `default` preset when neither `--scenario` nor
    /// `--preset` is given.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be loaded or the preset is
    /// unknown.
    pub fn scenario_config(&self) -> Result<ScenarioConfig, ConfigError> {
        let mut config = match (&self.scenario, &self.preset) {
            (Some(path), _) => ScenarioConfig::from_toml_file(path)?,
            (None, Some(name)) => ScenarioConfig::from_preset(name)?,
            (None, None) => ScenarioConfig::default_preset(),
        };
        if let Some(bias) = self.bias {
            config.simulation.bias = bias;
        }
        Ok(config)
    }
}
