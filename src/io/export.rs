//! CSV export for simulated interval rows.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::IntervalRow;

/// Column header for the interval row export.
const HEADER: &str = "timestamp,produced_wh,consumed_wh,stored_wh,\
                      battery_charge_wh,battery_discharge_wh,exported_wh,imported_wh,\
                      battery_soc,battery_throughput_wh,cost_dollars,credit_earned_dollars,\
                      credit_used_dollars,available_credits_dollars,cumulative_spent_dollars,\
                      is_peak,is_weekend";

/// Exports interval rows to a CSV file at the given path.
///
/// Writes a header row followed by one data row per interval. Produces
/// deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(rows: &[IntervalRow], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(rows, buf)
}

/// Writes interval rows as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(rows: &[IntervalRow], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in rows {
        wtr.write_record(&[
            r.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            format!("{:.3}", r.produced_wh),
            format!("{:.3}", r.consumed_wh),
            format!("{:.3}", r.stored_wh),
            format!("{:.3}", r.battery_charge_wh),
            format!("{:.3}", r.battery_discharge_wh),
            format!("{:.3}", r.exported_wh),
            format!("{:.3}", r.imported_wh),
            format!("{:.6}", r.battery_soc),
            format!("{:.3}", r.battery_throughput_wh),
            format!("{:.6}", r.cost_dollars),
            format!("{:.6}", r.credit_earned_dollars),
            format!("{:.6}", r.credit_used_dollars),
            format!("{:.6}", r.available_credits_dollars),
            format!("{:.6}", r.cumulative_spent_dollars),
            r.is_peak.to_string(),
            r.is_weekend.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
