//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

use crate::devices::battery::{DEFAULT_DERATING_FRACTION, DEFAULT_DERATING_SOC};
use crate::devices::{
    BatteryStore, DayTariff, GridConnection, RateClass, SolarSource, TariffSchedule,
};
use crate::history::synthetic::SyntheticHistory;
use crate::sim::engine::Engine;
use crate::sim::table::Table1D;
use crate::sim::types::SimConfig;

/// Longest synthetic history, in days.
pub const MAX_HISTORY_DAYS: u32 = 3660;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the `default` preset. Load from TOML
/// with [`ScenarioConfig::from_toml_file`] or use [`ScenarioConfig::from_preset`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Simulated photovoltaic array.
    #[serde(default)]
    pub solar: SolarConfig,
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Tariff schedule and starting credit balance.
    #[serde(default)]
    pub grid: GridConfig,
    /// Metered system and synthetic history parameters.
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Run-level parameters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Fraction of production removed from both metered readings (0.0 to <1.0).
    pub bias: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarConfig {
    /// Panels in the simulated array.
    pub panel_count: u32,
}

impl Default for SolarConfig {
    fn default() -> Self {
        Self { panel_count: 20 }
    }
}

/// Battery storage parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Usable capacity (kWh); 0 disables the battery.
    pub usable_capacity_kwh: f64,
    /// Initial state of charge (0.0–1.0).
    pub initial_soc: f64,
    /// Charge efficiency (0.0–1.0].
    pub charge_efficiency: f64,
    /// Discharge efficiency (0.0–1.0].
    pub discharge_efficiency: f64,
    /// C-rate available at full derating fraction.
    pub max_c_rate: f64,
    /// SOC breakpoints of the derating curve.
    pub derating_soc: Vec<f64>,
    /// Fraction of `max_c_rate` available at each breakpoint.
    pub derating_c_rate_fraction: Vec<f64>,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            usable_capacity_kwh: 13.5,
            initial_soc: 0.5,
            charge_efficiency: 0.9,
            discharge_efficiency: 0.9,
            max_c_rate: 3.0,
            derating_soc: DEFAULT_DERATING_SOC.to_vec(),
            derating_c_rate_fraction: DEFAULT_DERATING_FRACTION.to_vec(),
        }
    }
}

/// Grid tariff and credit ledger parameters.
///
/// Peak window times are strings such as `"15:00:00"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Credit balance at the start of the run (dollars).
    pub initial_credits_dollars: f64,
    pub weekday: DayTariff,
    pub weekend: DayTariff,
}

impl Default for GridConfig {
    fn default() -> Self {
        let tariff = TariffSchedule::default();
        Self {
            initial_credits_dollars: 0.0,
            weekday: tariff.weekday,
            weekend: tariff.weekend,
        }
    }
}

/// Metered system description and synthetic history generator parameters.
///
/// `start` is a quoted ISO 8601 string such as `"2025-01-06T00:00:00"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Panels in the metered system (production is divided by this).
    pub panel_count: u32,
    /// Start of the first synthetic interval.
    pub start: NaiveDateTime,
    /// Number of synthetic days.
    pub days: u32,
    /// Synthetic interval length (minutes, must divide a day).
    pub interval_minutes: u32,
    /// Synthetic generator seed.
    pub seed: u64,
    /// Peak output of one panel (W).
    pub panel_peak_w: f64,
    pub sunrise_hour: f64,
    pub sunset_hour: f64,
    /// Relative production noise.
    pub production_noise_std: f64,
    /// Average household demand (W).
    pub base_load_w: f64,
    pub load_amplitude_w: f64,
    pub load_phase_rad: f64,
    /// Absolute demand noise (W).
    pub load_noise_std_w: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        Self {
            panel_count: 20,
            start,
            days: 7,
            interval_minutes: 15,
            seed: 42,
            panel_peak_w: 320.0,
            sunrise_hour: 7.0,
            sunset_hour: 18.0,
            production_noise_std: 0.1,
            base_load_w: 800.0,
            load_amplitude_w: 500.0,
            load_phase_rad: 1.2,
            load_noise_std_w: 100.0,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.initial_soc"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Available preset names.
    pub const PRESETS: &[&str] = &["default", "no_battery", "large_battery"];

    /// Solar with a battery sized for a typical home, under the default tariff.
    pub fn default_preset() -> Self {
        Self::default()
    }

    /// Solar only.
    pub fn no_battery() -> Self {
        Self {
            battery: BatteryConfig {
                usable_capacity_kwh: 0.0,
                ..BatteryConfig::default()
            },
            ..Self::default()
        }
    }

    /// A larger array paired with two battery packs.
    pub fn large_battery() -> Self {
        Self {
            solar: SolarConfig { panel_count: 30 },
            battery: BatteryConfig {
                usable_capacity_kwh: 27.0,
                initial_soc: 0.2,
                max_c_rate: 1.0,
                ..BatteryConfig::default()
            },
            ..Self::default()
        }
    }

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "default" => Ok(Self::default_preset()),
            "no_battery" => Ok(Self::no_battery()),
            "large_battery" => Ok(Self::large_battery()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// The same scenario without solar or storage, for the savings comparison.
    ///
    /// The metered history and the tariff are unchanged.
    pub fn baseline_variant(&self) -> Self {
        let mut baseline = self.clone();
        baseline.solar.panel_count = 0;
        baseline.battery.usable_capacity_kwh = 0.0;
        baseline
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let bias = self.simulation.bias;
        if !(0.0..1.0).contains(&bias) {
            errors.push(ConfigError::new("simulation.bias", "must be in [0.0, 1.0)"));
        }

        self.validate_battery(&mut errors);
        self.validate_grid(&mut errors);
        self.validate_history(&mut errors);
        errors
    }

    fn validate_battery(&self, errors: &mut Vec<ConfigError>) {
        let bat = &self.battery;
        if !(bat.usable_capacity_kwh >= 0.0 && bat.usable_capacity_kwh.is_finite()) {
            errors.push(ConfigError::new("battery.usable_capacity_kwh", "must be >= 0"));
        }
        if !(0.0..=1.0).contains(&bat.initial_soc) {
            errors.push(ConfigError::new("battery.initial_soc", "must be in [0.0, 1.0]"));
        }
        for (field, eff) in [
            ("battery.charge_efficiency", bat.charge_efficiency),
            ("battery.discharge_efficiency", bat.discharge_efficiency),
        ] {
            if !(eff > 0.0 && eff <= 1.0) {
                errors.push(ConfigError::new(field, "must be in (0.0, 1.0]"));
            }
        }
        if !(bat.max_c_rate >= 0.0 && bat.max_c_rate.is_finite()) {
            errors.push(ConfigError::new("battery.max_c_rate", "must be >= 0"));
        }

        match self.derating_table() {
            Err(e) => errors.push(ConfigError::new("battery.derating_soc", e.to_string())),
            Ok(table) => {
                if table.x_min() > 0.0 || table.x_max() < 1.0 {
                    errors.push(ConfigError::new(
                        "battery.derating_soc",
                        "must cover the SOC range [0.0, 1.0]",
                    ));
                }
                if !table.is_non_decreasing() {
                    errors.push(ConfigError::new(
                        "battery.derating_c_rate_fraction",
                        "must be non-decreasing in SOC",
                    ));
                }
                if table.y().iter().any(|&f| f < 0.0) {
                    errors.push(ConfigError::new(
                        "battery.derating_c_rate_fraction",
                        "must be >= 0",
                    ));
                }
            }
        }
    }

    fn validate_grid(&self, errors: &mut Vec<ConfigError>) {
        let grid = &self.grid;
        if !(grid.initial_credits_dollars >= 0.0) {
            errors.push(ConfigError::new("grid.initial_credits_dollars", "must be >= 0"));
        }
        for (day_name, day) in [("weekday", &grid.weekday), ("weekend", &grid.weekend)] {
            for (class_name, class) in [("on_peak", &day.on_peak), ("off_peak", &day.off_peak)] {
                for (rate_name, rate) in rate_fields(class) {
                    if !(rate >= 0.0 && rate.is_finite()) {
                        errors.push(ConfigError::new(
                            format!("grid.{day_name}.{class_name}.{rate_name}"),
                            "must be >= 0",
                        ));
                    }
                }
            }
        }
    }

    fn validate_history(&self, errors: &mut Vec<ConfigError>) {
        let h = &self.history;
        if h.panel_count == 0 {
            errors.push(ConfigError::new("history.panel_count", "must be > 0"));
        }
        if h.days == 0 || h.days > MAX_HISTORY_DAYS {
            errors.push(ConfigError::new(
                "history.days",
                format!("must be in 1..={MAX_HISTORY_DAYS}"),
            ));
        }
        if h.interval_minutes == 0 || (24 * 60) % h.interval_minutes != 0 {
            errors.push(ConfigError::new(
                "history.interval_minutes",
                "must be > 0 and divide 1440",
            ));
        }
        if !(0.0 <= h.sunrise_hour && h.sunrise_hour < h.sunset_hour && h.sunset_hour <= 24.0) {
            errors.push(ConfigError::new(
                "history.sunrise_hour",
                "must satisfy 0 <= sunrise_hour < sunset_hour <= 24",
            ));
        }
        for (field, value) in [
            ("history.panel_peak_w", h.panel_peak_w),
            ("history.production_noise_std", h.production_noise_std),
            ("history.base_load_w", h.base_load_w),
            ("history.load_noise_std_w", h.load_noise_std_w),
        ] {
            if !(value >= 0.0) {
                errors.push(ConfigError::new(field, "must be >= 0"));
            }
        }
    }

    fn derating_table(&self) -> Result<Table1D, crate::error::SimError> {
        Table1D::new(
            self.battery.derating_soc.clone(),
            self.battery.derating_c_rate_fraction.clone(),
        )
    }

    pub fn sim_config(&self) -> SimConfig {
        SimConfig::new(self.simulation.bias)
    }

    pub fn tariff(&self) -> TariffSchedule {
        TariffSchedule {
            weekday: self.grid.weekday,
            weekend: self.grid.weekend,
        }
    }

    pub fn build_solar(&self) -> SolarSource {
        SolarSource::new(self.solar.panel_count)
    }

    /// # Errors
    ///
    /// Returns a `ConfigError` if the derating table is malformed.
    pub fn build_battery(&self) -> Result<BatteryStore, ConfigError> {
        let derating = self
            .derating_table()
            .map_err(|e| ConfigError::new("battery.derating_soc", e.to_string()))?;
        let bat = &self.battery;
        Ok(BatteryStore::new(
            bat.usable_capacity_kwh * 1000.0,
            bat.initial_soc,
            bat.charge_efficiency,
            bat.discharge_efficiency,
            bat.max_c_rate,
            derating,
        ))
    }

    pub fn build_grid(&self) -> GridConnection {
        GridConnection::new(self.tariff(), self.grid.initial_credits_dollars)
    }

    /// Builds an engine with fresh devices.
    ///
    /// Call [`ScenarioConfig::validate`] first; the device constructors
    /// panic on values it rejects.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the derating table is malformed.
    pub fn build_engine(&self) -> Result<Engine, ConfigError> {
        Ok(Engine::new(
            self.sim_config(),
            self.build_solar(),
            self.build_battery()?,
            self.build_grid(),
        ))
    }

    /// Synthetic history generator described by `[history]`.
    pub fn synthetic_history(&self) -> SyntheticHistory {
        let h = &self.history;
        SyntheticHistory {
            panel_peak_w: h.panel_peak_w,
            sunrise_hour: h.sunrise_hour,
            sunset_hour: h.sunset_hour,
            production_noise_std: h.production_noise_std,
            base_load_w: h.base_load_w,
            load_amplitude_w: h.load_amplitude_w,
            load_phase_rad: h.load_phase_rad,
            load_noise_std_w: h.load_noise_std_w,
            ..SyntheticHistory::new(h.start, h.days, h.interval_minutes, h.panel_count, h.seed)
        }
    }
}

fn rate_fields(class: &RateClass) -> [(&'static str, f64); 3] {
    [
        ("purchase_per_kwh", class.purchase_per_kwh),
        ("generation_credit_per_kwh", class.generation_credit_per_kwh),
        ("creditable_per_kwh", class.creditable_per_kwh),
    ]
}
