//! CSV import of historical interval records.
//!
//! Expected columns (header row required, any order):
//! `timestamp_end, interval_length_seconds, production_wh, consumption_wh,
//! import_wh, export_wh, batt_charge_wh, batt_discharge_wh`. Timestamps use
//! the ISO 8601 form `2025-01-06T00:15:00`.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::debug;

use crate::error::HistoryError;
use crate::history::{HistoricalInterval, HistoricalSeries};

/// Reads a history CSV file recorded by a system of `panel_count` panels.
///
/// # Errors
///
/// See [`read_history`]; additionally returns [`HistoryError::Io`] if the
/// file cannot be opened.
pub fn load_history(path: &Path, panel_count: u32) -> Result<HistoricalSeries, HistoryError> {
    let file = File::open(path)?;
    let series = read_history(io::BufReader::new(file), panel_count)?;
    debug!(path = %path.display(), records = series.len(), "history loaded");
    Ok(series)
}

/// Parses history records from any reader.
///
/// End timestamps must be strictly increasing; a repeated or earlier
/// timestamp is rejected.
///
/// # Errors
///
/// Returns [`HistoryError::Csv`] for malformed rows and
/// [`HistoryError::OutOfOrder`] for unsorted records.
pub fn read_history(reader: impl Read, panel_count: u32) -> Result<HistoricalSeries, HistoryError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut intervals: Vec<HistoricalInterval> = Vec::new();
    for (index, record) in rdr.deserialize().enumerate() {
        let interval: HistoricalInterval = record?;
        if intervals
            .last()
            .is_some_and(|prev| interval.timestamp_end <= prev.timestamp_end)
        {
            return Err(HistoryError::OutOfOrder {
                index,
                timestamp_end: interval.timestamp_end,
            });
        }
        intervals.push(interval);
    }

    Ok(HistoricalSeries::new(panel_count, intervals))
}
