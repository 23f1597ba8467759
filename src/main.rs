//! Solar savings simulator entry point: CLI wiring and report output.

use std::process;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use solar_savings::cli::CliOptions;
use solar_savings::config::ConfigError;
use solar_savings::io::export::export_csv;
use solar_savings::runner::{RunError, load_series, run_scenario};
use solar_savings::telemetry::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = CliOptions::parse();

    let config = match cli.scenario_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let series = match load_series(&config, cli.history.as_deref()) {
        Ok(series) => series,
        Err(RunError::InvalidConfig(errors)) => exit_invalid(&errors),
        Err(e) => {
            let context = match &cli.history {
                Some(path) => format!("loading history from {}", path.display()),
                None => "generating synthetic history".to_string(),
            };
            return Err(anyhow::Error::new(e).context(context));
        }
    };

    let outcome = match run_scenario(&config, &series) {
        Ok(outcome) => outcome,
        Err(RunError::InvalidConfig(errors)) => exit_invalid(&errors),
        Err(e) => return Err(anyhow::Error::new(e).context("simulation failed")),
    };

    if cli.rows {
        for row in &outcome.simulated.rows {
            println!("{row}");
        }
        println!();
    }

    println!("Simulated system");
    println!("{}", outcome.simulated_kpi);
    println!();
    println!("Baseline (no solar, no battery)");
    println!("{}", outcome.baseline_kpi);
    println!();
    println!("{}", outcome.savings);

    if let Some(path) = &cli.telemetry_out {
        export_csv(&outcome.simulated.rows, path)
            .with_context(|| format!("writing telemetry to {}", path.display()))?;
        info!(path = %path.display(), rows = outcome.simulated.rows.len(), "telemetry exported");
    }

    Ok(())
}

/// Prints every configuration error and exits with status 1.
fn exit_invalid(errors: &[ConfigError]) -> ! {
    for e in errors {
        eprintln!("{e}");
    }
    process::exit(1);
}
