//! Core simulation types: run configuration, output rows, and run annotations.

use std::fmt;

use chrono::NaiveDateTime;

/// Run-level simulation parameters.
///
/// # Examples
///
/// ```
/// use solar_savings::sim::types::SimConfig;
///
/// let cfg = SimConfig::new(0.05);
/// assert_eq!(cfg.bias, 0.05);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimConfig {
    /// Fraction of metered production that leaked into the consumption
    /// reading and is removed from both before dispatch.
    pub bias: f64,
}

impl SimConfig {
    /// Creates a new simulation configuration.
    ///
    /// # Panics
    ///
    /// Panics if `bias` is outside `[0, 1)`.
    pub fn new(bias: f64) -> Self {
        assert!((0.0..1.0).contains(&bias), "bias must be in [0, 1)");
        Self { bias }
    }
}

/// Complete record of one simulated interval.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRow {
    /// Start of the interval.
    pub timestamp: NaiveDateTime,
    /// Solar energy produced by the simulated array (Wh).
    pub produced_wh: f64,
    /// Net load served by the dispatch (Wh).
    pub consumed_wh: f64,
    /// Energy held in the battery after the interval (Wh).
    pub stored_wh: f64,
    /// Energy accepted by the battery (Wh).
    pub battery_charge_wh: f64,
    /// Energy delivered by the battery (Wh).
    pub battery_discharge_wh: f64,
    /// Energy sent to the grid (Wh).
    pub exported_wh: f64,
    /// Energy bought from the grid (Wh).
    pub imported_wh: f64,
    /// Battery SOC after the interval (0.0 to 1.0).
    pub battery_soc: f64,
    /// Battery lifetime throughput after the interval (Wh).
    pub battery_throughput_wh: f64,
    /// Net purchase cost for the interval after credits (dollars).
    pub cost_dollars: f64,
    /// Generation credit earned in the interval (dollars).
    pub credit_earned_dollars: f64,
    /// Banked credit spent in the interval (dollars).
    pub credit_used_dollars: f64,
    /// Credit balance after the interval (dollars).
    pub available_credits_dollars: f64,
    /// Cumulative net spend after the interval (dollars).
    pub cumulative_spent_dollars: f64,
    pub is_peak: bool,
    pub is_weekend: bool,
}

impl fmt::Display for IntervalRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | pv={:>7.1} load={:>7.1} Wh | bat +{:.1}/-{:.1} Wh (SoC={:.1}%) | \
             grid in={:.1} out={:.1} Wh | cost=${:.4} credit=${:.4} bank=${:.2} | {}{}",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.produced_wh,
            self.consumed_wh,
            self.battery_charge_wh,
            self.battery_discharge_wh,
            self.battery_soc * 100.0,
            self.imported_wh,
            self.exported_wh,
            self.cost_dollars,
            self.credit_earned_dollars,
            self.available_credits_dollars,
            if self.is_weekend { "weekend" } else { "weekday" },
            if self.is_peak { " peak" } else { "" },
        )
    }
}

/// Non-fatal annotation: consecutive records are not spaced by their
/// nominal interval length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalWarning {
    /// Index of the later record of the pair.
    pub index: usize,
    /// End timestamp of the later record.
    pub timestamp_end: NaiveDateTime,
    /// Nominal length of the later record (seconds).
    pub expected_seconds: i64,
    /// Observed spacing between the two end timestamps (seconds).
    pub observed_seconds: i64,
}

impl fmt::Display for IntervalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.observed_seconds > self.expected_seconds {
            "gap"
        } else {
            "overlap"
        };
        write!(
            f,
            "inconsistent interval length at record {} ({}): {kind}, expected {} s, observed {} s",
            self.index, self.timestamp_end, self.expected_seconds, self.observed_seconds
        )
    }
}

/// Output of one simulation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationRun {
    pub rows: Vec<IntervalRow>,
    pub warnings: Vec<IntervalWarning>,
}

/// Lifecycle of a dispatch controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Uninitialized,
    /// `processed` intervals have been simulated.
    Running { processed: usize },
    Complete,
}
