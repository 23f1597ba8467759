//! Dispatch controller that replays a history through the device set.

use tracing::{debug, info, warn};

use crate::devices::{BatteryStore, DeviceContext, GridConnection, PowerDevice, SolarSource};
use crate::error::SimError;
use crate::history::{HistoricalInterval, HistoricalSeries};

use super::clock::SimClock;
use super::dispatcher::{ENERGY_EPSILON_WH, LoadDispatcher};
use super::types::{IntervalRow, RunPhase, SimConfig, SimulationRun};

/// Simulation engine owning the clock, the devices, and the dispatcher.
///
/// Holds typed device fields rather than trait objects since the device set
/// is fixed; the priority list handed to the dispatcher is built per interval
/// as `[solar, battery, grid]`.
///
/// An engine carries its device state from one interval to the next. Calling
/// [`Engine::run`] twice continues from where the first run stopped; call
/// [`Engine::reset`] or build a new engine for an independent run.
#[derive(Debug, Clone)]
pub struct Engine {
    config: SimConfig,
    solar: SolarSource,
    battery: BatteryStore,
    grid: GridConnection,
    dispatcher: LoadDispatcher,
    clock: Option<SimClock>,
    phase: RunPhase,
}

impl Engine {
    /// Creates a new simulation engine.
    ///
    /// # Arguments
    ///
    /// * `config` - Run-level parameters
    /// * `solar` - Simulated photovoltaic array
    /// * `battery` - Battery store (zero capacity for none)
    /// * `grid` - Grid connection with its tariff and credit balance
    pub fn new(
        config: SimConfig,
        solar: SolarSource,
        battery: BatteryStore,
        grid: GridConnection,
    ) -> Self {
        Self {
            config,
            solar,
            battery,
            grid,
            dispatcher: LoadDispatcher::new(),
            clock: None,
            phase: RunPhase::Uninitialized,
        }
    }

    /// Simulates one interval and returns its output row.
    ///
    /// `source_panel_count` is the panel count of the metered system, used
    /// to reduce the recorded production to a per-panel figure.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TimeOrder`] if the interval does not start after
    /// the previous one, or propagates a device or dispatch error.
    pub fn step(
        &mut self,
        interval: &HistoricalInterval,
        source_panel_count: u32,
    ) -> Result<IntervalRow, SimError> {
        // 1. Advance the clock to the interval start
        let start = interval.timestamp_start();
        // meters are keyed on the start, so a repeated start would merge rows
        let previous_start = match self.phase {
            RunPhase::Uninitialized => None,
            _ => self.clock.map(|clock| clock.current()),
        };
        if previous_start == Some(start) {
            return Err(SimError::TimeOrder {
                current: start,
                requested: start,
            });
        }
        let clock = self
            .clock
            .get_or_insert_with(|| SimClock::new(start - interval.interval_length()));
        clock.advance(start)?;
        let context = DeviceContext::new(start, clock.elapsed());

        // 2. Remove production that leaked into the consumption reading
        let bleed_wh = interval.production_wh * self.config.bias;
        let consumption_wh = (interval.consumption_wh - bleed_wh).max(0.0);
        let production_wh = interval.production_wh - bleed_wh;

        // 3. Per-panel production into the simulated array
        let per_panel_wh = if source_panel_count == 0 {
            0.0
        } else {
            production_wh / f64::from(source_panel_count)
        };
        let produced_wh = self.solar.set_generation_per_panel(per_panel_wh);

        // 4. Serve the net load
        let mut net_load_wh =
            consumption_wh + interval.batt_discharge_wh - interval.batt_charge_wh;
        if net_load_wh < 0.0 {
            warn!(
                timestamp = %start,
                net_load_wh,
                "metered battery charge exceeds consumption; clamping net load to zero"
            );
            net_load_wh = 0.0;
        }

        let mut devices: [&mut dyn PowerDevice; 3] =
            [&mut self.solar, &mut self.battery, &mut self.grid];
        self.dispatcher.dispatch(&context, net_load_wh, &mut devices)?;

        // 5. Route the solar surplus
        let mut surplus_wh = devices[0].produce();
        for device in devices.iter_mut() {
            if surplus_wh <= ENERGY_EPSILON_WH {
                break;
            }
            surplus_wh -= device.absorb(&context, surplus_wh)?;
        }

        // 6. Pass transient energy through the devices
        let mut transient_wh = interval.transient_wh();
        for device in devices.iter_mut() {
            if transient_wh <= ENERGY_EPSILON_WH {
                break;
            }
            transient_wh -= device.transient_absorb(&context, transient_wh)?;
        }

        // 7. Build the row
        let battery = self.battery.interval_meter(&context);
        let grid = self.grid.interval_meter(&context);
        let period = self.grid.period(&context);
        let row = IntervalRow {
            timestamp: start,
            produced_wh,
            consumed_wh: net_load_wh,
            stored_wh: self.battery.stored_energy_wh(),
            battery_charge_wh: battery.charge_wh,
            battery_discharge_wh: battery.discharge_wh,
            exported_wh: grid.export_wh,
            imported_wh: grid.import_wh,
            battery_soc: self.battery.soc(),
            battery_throughput_wh: self.battery.lifetime_throughput_wh(),
            cost_dollars: grid.cost_dollars,
            credit_earned_dollars: grid.credits_earned_dollars,
            credit_used_dollars: grid.credits_used_dollars,
            available_credits_dollars: self.grid.available_credits_dollars(),
            cumulative_spent_dollars: self.grid.lifetime_spent_dollars(),
            is_peak: period.on_peak,
            is_weekend: period.weekend,
        };

        debug!(
            timestamp = %row.timestamp,
            produced_wh = row.produced_wh,
            consumed_wh = row.consumed_wh,
            imported_wh = row.imported_wh,
            exported_wh = row.exported_wh,
            soc = row.battery_soc,
            cost = row.cost_dollars,
            "interval simulated"
        );

        let processed = match self.phase {
            RunPhase::Running { processed } => processed + 1,
            RunPhase::Uninitialized | RunPhase::Complete => 1,
        };
        self.phase = RunPhase::Running { processed };
        Ok(row)
    }

    /// Simulates every interval of `series` in order.
    ///
    /// Spacing inconsistencies between records are logged and returned as
    /// warnings on the run; they do not stop it.
    ///
    /// # Errors
    ///
    /// Any step error aborts the run; no partial rows are returned.
    pub fn run(&mut self, series: &HistoricalSeries) -> Result<SimulationRun, SimError> {
        info!(
            intervals = series.len(),
            panels = self.solar.panel_count(),
            battery_wh = self.battery.usable_capacity_wh(),
            bias = self.config.bias,
            "simulation started"
        );

        let warnings = series.check_consistency();
        for w in &warnings {
            warn!("{w}");
        }

        let mut rows = Vec::with_capacity(series.len());
        for interval in &series.intervals {
            rows.push(self.step(interval, series.panel_count)?);
        }
        self.phase = RunPhase::Complete;

        info!(
            intervals = rows.len(),
            warnings = warnings.len(),
            spent = self.grid.lifetime_spent_dollars(),
            credits = self.grid.available_credits_dollars(),
            "simulation complete"
        );
        Ok(SimulationRun { rows, warnings })
    }

    /// Returns every device and the dispatcher to its initial state and
    /// forgets the clock.
    pub fn reset(&mut self) {
        self.solar.reset_lifetime_state();
        self.battery.reset_lifetime_state();
        self.grid.reset_lifetime_state();
        self.dispatcher.reset();
        self.clock = None;
        self.phase = RunPhase::Uninitialized;
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn solar(&self) -> &SolarSource {
        &self.solar
    }

    pub fn battery(&self) -> &BatteryStore {
        &self.battery
    }

    pub fn grid(&self) -> &GridConnection {
        &self.grid
    }

    pub fn dispatcher(&self) -> &LoadDispatcher {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    use super::*;
    use crate::devices::battery::{DEFAULT_DERATING_FRACTION, DEFAULT_DERATING_SOC};
    use crate::devices::{DayTariff, RateClass, TariffSchedule};
    use crate::sim::table::Table1D;

    /// 2025-01-06 is a Monday.
    fn monday(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    fn interval(end: NaiveDateTime, production_wh: f64, consumption_wh: f64) -> HistoricalInterval {
        HistoricalInterval {
            timestamp_end: end,
            interval_length_seconds: 900,
            production_wh,
            consumption_wh,
            import_wh: 0.0,
            export_wh: 0.0,
            batt_charge_wh: 0.0,
            batt_discharge_wh: 0.0,
        }
    }

    fn battery(capacity_wh: f64, soc: f64, max_c_rate: f64) -> BatteryStore {
        let derating =
            Table1D::new(DEFAULT_DERATING_SOC.to_vec(), DEFAULT_DERATING_FRACTION.to_vec())
                .unwrap();
        BatteryStore::new(capacity_wh, soc, 0.93, 0.9, max_c_rate, derating)
    }

    fn engine(panels: u32, battery: BatteryStore, tariff: TariffSchedule) -> Engine {
        Engine::new(
            SimConfig::default(),
            SolarSource::new(panels),
            battery,
            GridConnection::new(tariff, 0.0),
        )
    }

    #[test]
    fn test_solar_surplus_charges_battery() {
        let mut e = engine(1, battery(10_000.0, 0.5, 100.0), TariffSchedule::flat(0.20));
        let series = HistoricalSeries::new(1, vec![interval(monday(12, 15), 1000.0, 400.0)]);
        let run = e.run(&series).unwrap();

        assert_eq!(run.rows.len(), 1);
        let row = &run.rows[0];
        assert_eq!(row.timestamp, monday(12, 0));
        assert_eq!(row.produced_wh, 1000.0);
        assert_eq!(row.consumed_wh, 400.0);
        assert_eq!(row.battery_charge_wh, 600.0);
        assert_eq!(row.battery_discharge_wh, 0.0);
        assert_eq!(row.imported_wh, 0.0);
        assert_eq!(row.exported_wh, 0.0);
        assert_eq!(row.cost_dollars, 0.0);
        assert_abs_diff_eq!(row.stored_wh, 5_000.0 + 600.0 * 0.93, epsilon = 1e-9);
        assert_eq!(e.phase(), RunPhase::Complete);
    }

    #[test]
    fn test_no_battery_imports_at_off_peak_rate() {
        let day = DayTariff {
            on_peak_start: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            on_peak_end: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            on_peak: RateClass::flat(0.25),
            off_peak: RateClass {
                purchase_per_kwh: 0.18,
                generation_credit_per_kwh: 0.08,
                creditable_per_kwh: 0.18,
            },
        };
        let tariff = TariffSchedule {
            weekday: day,
            weekend: day,
        };
        let mut e = engine(1, battery(0.0, 0.0, 1.0), tariff);
        let series = HistoricalSeries::new(1, vec![interval(monday(2, 15), 0.0, 1000.0)]);
        let row = e.run(&series).unwrap().rows.remove(0);

        assert_eq!(row.imported_wh, 1000.0);
        assert_abs_diff_eq!(row.cost_dollars, 0.18, epsilon = 1e-12);
        assert_eq!(row.available_credits_dollars, 0.0);
        assert_eq!(row.credit_used_dollars, 0.0);
        assert!(!row.is_peak);
        assert!(!row.is_weekend);
    }

    #[test]
    fn test_identical_engines_produce_identical_rows() {
        let intervals: Vec<_> = (1..=96)
            .map(|i| {
                let end = monday(0, 0) + chrono::TimeDelta::minutes(15 * i);
                let prod = if (28..68).contains(&i) { 800.0 } else { 0.0 };
                interval(end, prod, 250.0 + f64::from(i as u32 % 7) * 40.0)
            })
            .collect();
        let series = HistoricalSeries::new(4, intervals);
        let make = || engine(6, battery(13_500.0, 0.2, 0.5), TariffSchedule::default());

        let a = make().run(&series).unwrap();
        let b = make().run(&series).unwrap();
        assert_eq!(a, b);

        let mut reused = make();
        reused.run(&series).unwrap();
        reused.reset();
        assert_eq!(reused.phase(), RunPhase::Uninitialized);
        assert_eq!(reused.run(&series).unwrap(), a);
    }

    #[test]
    fn test_unsorted_input_is_a_time_order_error() {
        let mut e = engine(1, battery(10_000.0, 0.5, 1.0), TariffSchedule::default());
        let series = HistoricalSeries::new(
            1,
            vec![
                interval(monday(10, 15), 0.0, 100.0),
                interval(monday(10, 0), 0.0, 100.0),
            ],
        );
        let err = e.run(&series).unwrap_err();
        assert!(matches!(err, SimError::TimeOrder { .. }));
        assert_ne!(e.phase(), RunPhase::Complete);
    }

    #[test]
    fn test_repeated_interval_is_a_time_order_error() {
        let mut e = engine(0, battery(0.0, 0.0, 1.0), TariffSchedule::flat(0.2));
        let i = interval(monday(2, 15), 0.0, 1000.0);
        let row = e.step(&i, 1).unwrap();
        assert_eq!(row.imported_wh, 1000.0);

        let err = e.step(&i, 1).unwrap_err();
        assert!(matches!(err, SimError::TimeOrder { .. }));
        // the rejected interval left the ledger alone
        assert_abs_diff_eq!(e.grid().lifetime_spent_dollars(), 0.2, epsilon = 1e-12);

        let series = HistoricalSeries::new(1, vec![i.clone(), i]);
        e.reset();
        assert!(matches!(e.run(&series), Err(SimError::TimeOrder { .. })));
    }

    #[test]
    fn test_bias_removes_bleed_from_both_readings() {
        let mut e = Engine::new(
            SimConfig::new(0.1),
            SolarSource::new(1),
            battery(0.0, 0.0, 1.0),
            GridConnection::new(TariffSchedule::flat(0.2), 0.0),
        );
        let series = HistoricalSeries::new(1, vec![interval(monday(12, 15), 1000.0, 400.0)]);
        let row = e.run(&series).unwrap().rows.remove(0);

        assert_abs_diff_eq!(row.produced_wh, 900.0, epsilon = 1e-9);
        assert_abs_diff_eq!(row.consumed_wh, 300.0, epsilon = 1e-9);
        assert_abs_diff_eq!(row.exported_wh, 600.0, epsilon = 1e-9);
        assert_abs_diff_eq!(row.credit_earned_dollars, 0.12, epsilon = 1e-12);
    }

    #[test]
    fn test_production_scales_with_panel_ratio() {
        let mut e = engine(20, battery(0.0, 0.0, 1.0), TariffSchedule::flat(0.2));
        let series = HistoricalSeries::new(10, vec![interval(monday(12, 15), 1000.0, 0.0)]);
        let row = e.run(&series).unwrap().rows.remove(0);
        assert_eq!(row.produced_wh, 2000.0);
        assert_eq!(row.exported_wh, 2000.0);

        // a history without panels contributes no production
        let mut e = engine(20, battery(0.0, 0.0, 1.0), TariffSchedule::flat(0.2));
        let series = HistoricalSeries::new(0, vec![interval(monday(12, 15), 1000.0, 0.0)]);
        let row = e.run(&series).unwrap().rows.remove(0);
        assert_eq!(row.produced_wh, 0.0);
        assert_eq!(row.exported_wh, 0.0);
    }

    #[test]
    fn test_metered_battery_activity_adjusts_net_load() {
        let mut e = engine(0, battery(0.0, 0.0, 1.0), TariffSchedule::flat(0.2));
        let mut first = interval(monday(1, 15), 0.0, 400.0);
        first.batt_charge_wh = 300.0;
        let mut second = interval(monday(1, 30), 0.0, 400.0);
        second.batt_discharge_wh = 200.0;
        let mut third = interval(monday(1, 45), 0.0, 100.0);
        third.batt_charge_wh = 500.0;

        let run = e
            .run(&HistoricalSeries::new(1, vec![first, second, third]))
            .unwrap();
        assert_eq!(run.rows[0].consumed_wh, 100.0);
        assert_eq!(run.rows[1].consumed_wh, 600.0);
        assert_eq!(run.rows[2].consumed_wh, 0.0);
        assert_eq!(run.rows[2].imported_wh, 0.0);
    }

    #[test]
    fn test_transient_energy_meters_both_directions() {
        let mut e = engine(0, battery(0.0, 0.0, 1.0), TariffSchedule::flat(0.2));
        let mut i = interval(monday(3, 15), 0.0, 0.0);
        i.import_wh = 100.0;
        i.export_wh = 150.0;
        let row = e
            .run(&HistoricalSeries::new(1, vec![i]))
            .unwrap()
            .rows
            .remove(0);

        assert_eq!(row.imported_wh, 100.0);
        assert_eq!(row.exported_wh, 100.0);
        assert_abs_diff_eq!(row.cost_dollars, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transient_energy_prefers_battery() {
        let mut e = engine(0, battery(10_000.0, 0.5, 3.0), TariffSchedule::flat(0.2));
        let mut i = interval(monday(3, 15), 0.0, 0.0);
        i.batt_charge_wh = 200.0;
        i.batt_discharge_wh = 200.0;
        let row = e
            .run(&HistoricalSeries::new(1, vec![i]))
            .unwrap()
            .rows
            .remove(0);

        assert_eq!(row.battery_charge_wh, 200.0);
        assert_eq!(row.battery_discharge_wh, 200.0);
        assert_eq!(row.imported_wh, 0.0);
        assert_eq!(row.exported_wh, 0.0);
        assert!(row.stored_wh < 5_000.0);
    }

    #[test]
    fn test_transient_energy_an_empty_battery_cannot_return_goes_to_grid() {
        let mut e = engine(0, battery(10_000.0, 0.0, 3.0), TariffSchedule::flat(0.2));
        let mut i = interval(monday(3, 15), 0.0, 0.0);
        i.batt_charge_wh = 200.0;
        i.batt_discharge_wh = 200.0;
        let row = e
            .run(&HistoricalSeries::new(1, vec![i]))
            .unwrap()
            .rows
            .remove(0);

        assert_eq!(row.battery_charge_wh, 0.0);
        assert_eq!(row.battery_discharge_wh, 0.0);
        assert_eq!(row.exported_wh, 200.0);
        assert_eq!(row.imported_wh, 200.0);
        assert_eq!(row.stored_wh, 0.0);
        assert_abs_diff_eq!(row.cost_dollars, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_battery_carries_energy_between_intervals() {
        let mut e = engine(1, battery(10_000.0, 0.0, 100.0), TariffSchedule::flat(0.2));
        let series = HistoricalSeries::new(
            1,
            vec![
                interval(monday(12, 15), 1000.0, 0.0),
                interval(monday(12, 30), 0.0, 500.0),
            ],
        );
        let run = e.run(&series).unwrap();

        assert_eq!(run.rows[0].battery_charge_wh, 1000.0);
        assert_eq!(run.rows[1].battery_charge_wh, 0.0);
        assert_eq!(run.rows[1].battery_discharge_wh, 500.0);
        assert_eq!(run.rows[1].imported_wh, 0.0);
        assert_abs_diff_eq!(run.rows[1].battery_throughput_wh, 930.0, epsilon = 1e-9);
        assert_eq!(e.dispatcher().cumulative_usage_wh(), 500.0);
    }

    #[test]
    fn test_spacing_gap_is_a_warning_not_an_error() {
        let mut e = engine(0, battery(0.0, 0.0, 1.0), TariffSchedule::flat(0.2));
        let series = HistoricalSeries::new(
            1,
            vec![
                interval(monday(1, 15), 0.0, 100.0),
                interval(monday(2, 0), 0.0, 100.0),
            ],
        );
        let run = e.run(&series).unwrap();
        assert_eq!(run.rows.len(), 2);
        assert_eq!(run.warnings.len(), 1);
        assert_eq!(run.warnings[0].index, 1);
    }

    #[test]
    fn test_step_tracks_phase() {
        let mut e = engine(0, battery(0.0, 0.0, 1.0), TariffSchedule::flat(0.2));
        assert_eq!(e.phase(), RunPhase::Uninitialized);
        e.step(&interval(monday(1, 15), 0.0, 1.0), 1).unwrap();
        e.step(&interval(monday(1, 30), 0.0, 1.0), 1).unwrap();
        assert_eq!(e.phase(), RunPhase::Running { processed: 2 });
    }

    #[test]
    fn test_peak_and_weekend_flags() {
        let mut e = engine(0, battery(0.0, 0.0, 1.0), TariffSchedule::default());
        // Saturday 2025-01-11
        let saturday = NaiveDate::from_ymd_opt(2025, 1, 11)
            .and_then(|d| d.and_hms_opt(16, 15, 0))
            .unwrap();
        let series = HistoricalSeries::new(
            1,
            vec![
                interval(monday(16, 15), 0.0, 1000.0),
                interval(saturday, 0.0, 1000.0),
            ],
        );
        let run = e.run(&series).unwrap();
        assert!(run.rows[0].is_peak && !run.rows[0].is_weekend);
        assert_abs_diff_eq!(run.rows[0].cost_dollars, 0.19374, epsilon = 1e-12);
        assert!(!run.rows[1].is_peak && run.rows[1].is_weekend);
        assert_abs_diff_eq!(run.rows[1].cost_dollars, 0.17885, epsilon = 1e-12);
    }
}
