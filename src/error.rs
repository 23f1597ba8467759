//! Error types shared by the simulation core and its adapters.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Fatal simulation errors. Any of these aborts the run with no partial output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// The clock was asked to move backward (unsorted or corrupted input).
    #[error("time order violation: cannot move clock from {current} back to {requested}")]
    TimeOrder {
        current: NaiveDateTime,
        requested: NaiveDateTime,
    },

    /// A table lookup fell outside the table domain.
    #[error("lookup value {value} is outside the table domain [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    /// The device list could not cover a load requirement.
    #[error("unmet load: {unmet_wh:.3} Wh of {requested_wh:.3} Wh could not be supplied")]
    UnmetLoad { requested_wh: f64, unmet_wh: f64 },

    /// A lookup table was built from malformed points.
    #[error("invalid table: {0}")]
    InvalidTable(String),
}

/// Errors raised while loading historical interval data.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("cannot read history: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed history CSV: {0}")]
    Csv(#[from] csv::Error),

    /// Record `index` does not end after the record preceding it.
    #[error("history record {index} ends at {timestamp_end}, not after the previous record")]
    OutOfOrder {
        index: usize,
        timestamp_end: NaiveDateTime,
    },
}
