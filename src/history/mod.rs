//! Historical interval records replayed by the simulation.

use chrono::{NaiveDateTime, TimeDelta};
use serde::Deserialize;

use crate::sim::types::IntervalWarning;

/// Seeded synthetic history generator.
pub mod synthetic;

/// One metered interval of the existing system.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoricalInterval {
    pub timestamp_end: NaiveDateTime,
    pub interval_length_seconds: u32,
    pub production_wh: f64,
    pub consumption_wh: f64,
    pub import_wh: f64,
    pub export_wh: f64,
    pub batt_charge_wh: f64,
    pub batt_discharge_wh: f64,
}

impl HistoricalInterval {
    pub fn interval_length(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.interval_length_seconds))
    }

    pub fn timestamp_start(&self) -> NaiveDateTime {
        self.timestamp_end - self.interval_length()
    }

    /// Energy metered as flowing both ways within the interval.
    ///
    /// Simultaneous import/export and simultaneous charge/discharge net out
    /// physically but still pass through the devices.
    pub fn transient_wh(&self) -> f64 {
        self.import_wh.min(self.export_wh).max(0.0)
            + self.batt_charge_wh.min(self.batt_discharge_wh).max(0.0)
    }
}

/// Time-ordered history of one system, with the panel count that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalSeries {
    /// Panels in the metered system; production is normalized by this.
    pub panel_count: u32,
    pub intervals: Vec<HistoricalInterval>,
}

impl HistoricalSeries {
    pub fn new(panel_count: u32, intervals: Vec<HistoricalInterval>) -> Self {
        Self {
            panel_count,
            intervals,
        }
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Flags consecutive records whose end timestamps are not spaced by the
    /// later record's nominal length.
    pub fn check_consistency(&self) -> Vec<IntervalWarning> {
        self.intervals
            .windows(2)
            .enumerate()
            .filter_map(|(i, pair)| {
                let observed = (pair[1].timestamp_end - pair[0].timestamp_end).num_seconds();
                let expected = i64::from(pair[1].interval_length_seconds);
                (observed != expected).then(|| IntervalWarning {
                    index: i + 1,
                    timestamp_end: pair[1].timestamp_end,
                    expected_seconds: expected,
                    observed_seconds: observed,
                })
            })
            .collect()
    }
}
