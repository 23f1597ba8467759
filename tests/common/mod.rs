//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use solar_savings::devices::battery::{DEFAULT_DERATING_FRACTION, DEFAULT_DERATING_SOC};
use solar_savings::devices::{BatteryStore, GridConnection, SolarSource, TariffSchedule};
use solar_savings::history::HistoricalInterval;
use solar_savings::sim::engine::Engine;
use solar_savings::sim::table::Table1D;
use solar_savings::sim::types::SimConfig;

/// 2025-01-06 is a Monday.
pub fn monday(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 6)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .expect("valid timestamp")
}

/// A 15-minute record with no metered battery activity and no transients.
pub fn interval(end: NaiveDateTime, production_wh: f64, consumption_wh: f64) -> HistoricalInterval {
    HistoricalInterval {
        timestamp_end: end,
        interval_length_seconds: 900,
        production_wh,
        consumption_wh,
        import_wh: (consumption_wh - production_wh).max(0.0),
        export_wh: (production_wh - consumption_wh).max(0.0),
        batt_charge_wh: 0.0,
        batt_discharge_wh: 0.0,
    }
}

/// Default derating curve (25% at empty, full rate from 20% SOC).
pub fn derating() -> Table1D {
    Table1D::new(DEFAULT_DERATING_SOC.to_vec(), DEFAULT_DERATING_FRACTION.to_vec())
        .expect("default derating table is valid")
}

/// Battery with the given usable capacity, SOC, and C-rate at 90%/90% efficiency.
pub fn battery(capacity_wh: f64, soc: f64, max_c_rate: f64) -> BatteryStore {
    BatteryStore::new(capacity_wh, soc, 0.9, 0.9, max_c_rate, derating())
}

/// Engine with no bias and no starting credits.
pub fn engine(panels: u32, battery: BatteryStore, tariff: TariffSchedule) -> Engine {
    Engine::new(
        SimConfig::default(),
        SolarSource::new(panels),
        battery,
        GridConnection::new(tariff, 0.0),
    )
}
