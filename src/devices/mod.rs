//! Dispatch participants: solar array, battery store, and grid connection.

/// Rate- and efficiency-limited battery store.
pub mod battery;
/// Utility connection with tariff billing and a credit ledger.
pub mod grid;
/// Photovoltaic array replaying metered production.
pub mod solar;
/// Time-of-use tariff schedule.
pub mod tariff;
pub mod types;

// Re-export the main types for convenience
pub use battery::{BatteryMeter, BatteryStore};
pub use grid::{GridConnection, GridMeter};
pub use solar::SolarSource;
pub use tariff::{DayTariff, RateClass, TariffPeriod, TariffSchedule};
pub use types::{DeviceContext, IntervalMeter, PowerDevice};
