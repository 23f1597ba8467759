//! Scenario assembly: simulated run, no-solar baseline, and their comparison.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, ScenarioConfig};
use crate::error::{HistoryError, SimError};
use crate::history::HistoricalSeries;
use crate::io::import::load_history;
use crate::sim::kpi::{KpiReport, SavingsReport};
use crate::sim::types::SimulationRun;

/// Reasons a scenario could not be run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The configuration failed validation; every violation is listed.
    #[error("invalid scenario configuration ({} errors)", .0.len())]
    InvalidConfig(Vec<ConfigError>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Simulation(#[from] SimError),
}

/// Everything computed for one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    /// Run with the configured array and battery.
    pub simulated: SimulationRun,
    /// Run with no panels and no battery.
    pub baseline: SimulationRun,
    pub simulated_kpi: KpiReport,
    pub baseline_kpi: KpiReport,
    pub savings: SavingsReport,
}

/// Validates `config`, then loads the history from `path` or generates it
/// from `[history]`.
///
/// # Errors
///
/// Returns [`RunError::InvalidConfig`] before touching any history if the
/// configuration is invalid, or [`RunError::History`] if the CSV file cannot
/// be read or is unsorted.
pub fn load_series(
    config: &ScenarioConfig,
    path: Option<&Path>,
) -> Result<HistoricalSeries, RunError> {
    check_config(config)?;
    let series = match path {
        Some(path) => load_history(path, config.history.panel_count)?,
        None => config.synthetic_history().generate(),
    };
    Ok(series)
}

fn check_config(config: &ScenarioConfig) -> Result<(), RunError> {
    let errors = config.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(RunError::InvalidConfig(errors))
    }
}

/// Validates `config`, then replays `series` through the configured system
/// and through its no-solar baseline.
///
/// The two runs use independent device sets built from the same
/// configuration.
///
/// # Errors
///
/// Returns [`RunError::InvalidConfig`] before simulating anything if the
/// configuration is invalid, or the first simulation error of either run.
pub fn run_scenario(
    config: &ScenarioConfig,
    series: &HistoricalSeries,
) -> Result<ScenarioOutcome, RunError> {
    check_config(config)?;

    let simulated = config.build_engine()?.run(series)?;
    let baseline = config.baseline_variant().build_engine()?.run(series)?;

    let simulated_kpi = KpiReport::from_rows(&simulated.rows);
    let baseline_kpi = KpiReport::from_rows(&baseline.rows);
    let savings = SavingsReport::compare(&simulated_kpi, &baseline_kpi);
    info!(
        savings_dollars = savings.savings_dollars,
        savings_pct = savings.savings_pct,
        "scenario complete"
    );

    Ok(ScenarioOutcome {
        simulated,
        baseline,
        simulated_kpi,
        baseline_kpi,
        savings,
    })
}
