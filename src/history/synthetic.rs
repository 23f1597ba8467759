use chrono::{NaiveDateTime, TimeDelta};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{HistoricalInterval, HistoricalSeries};

/// Generates a plausible metered history for a system without a battery.
///
/// Production follows a half-cosine daylight profile; consumption is a
/// sinusoidal daily pattern. Both carry Gaussian noise from a seeded RNG,
/// so a given parameter set always yields the same series. Import and export
/// are the net of the two, as a battery-less meter would record them.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use solar_savings::history::synthetic::SyntheticHistory;
///
/// let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let series = SyntheticHistory::new(start, 1, 15, 20, 42).generate();
/// assert_eq!(series.len(), 96);
/// ```
#[derive(Debug, Clone)]
pub struct SyntheticHistory {
    /// Start of the first interval.
    pub start: NaiveDateTime,
    pub days: u32,
    pub interval_minutes: u32,
    /// Panels in the simulated metered system.
    pub panel_count: u32,
    pub seed: u64,

    /// Peak output of one panel (W).
    pub panel_peak_w: f64,
    /// Sunrise hour of day (inclusive).
    pub sunrise_hour: f64,
    /// Sunset hour of day (exclusive).
    pub sunset_hour: f64,
    /// Relative noise on production (e.g. 0.1 for ±10%).
    pub production_noise_std: f64,

    /// Average household demand (W).
    pub base_load_w: f64,
    /// Amplitude of the daily demand swing (W).
    pub load_amplitude_w: f64,
    /// Phase of the daily demand swing (radians).
    pub load_phase_rad: f64,
    /// Absolute noise on demand (W).
    pub load_noise_std_w: f64,
}

impl SyntheticHistory {
    pub fn new(
        start: NaiveDateTime,
        days: u32,
        interval_minutes: u32,
        panel_count: u32,
        seed: u64,
    ) -> Self {
        Self {
            start,
            days,
            interval_minutes: interval_minutes.max(1),
            panel_count,
            seed,
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

    /// Fraction of peak solar output at `hour` (0 outside daylight).
    fn daylight_frac(&self, hour: f64) -> f64 {
        if hour < self.sunrise_hour || hour >= self.sunset_hour {
            return 0.0;
        }
        let pos = (hour - self.sunrise_hour) / (self.sunset_hour - self.sunrise_hour);
        (std::f64::consts::PI * pos).sin()
    }

    /// Produces the series.
    pub fn generate(&self) -> HistoricalSeries {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let interval_minutes = self.interval_minutes.max(1);
        let steps_per_day = (24 * 60 / interval_minutes) as usize;
        let total = steps_per_day.saturating_mul(self.days as usize);
        let step = TimeDelta::minutes(i64::from(interval_minutes));
        let dt_hours = f64::from(interval_minutes) / 60.0;
        let array_peak_w = self.panel_peak_w * f64::from(self.panel_count);

        let mut intervals = Vec::with_capacity(total);
        let mut start = self.start;
        for _ in 0..total {
            let end = start + step;
            let hour = f64::from(self.minutes_into_day(start)) / 60.0 + dt_hours / 2.0;

            let frac = self.daylight_frac(hour);
            let production_w = if frac > 0.0 {
                let mult = 1.0 + gaussian_noise(&mut rng, self.production_noise_std);
                (array_peak_w * frac * mult).max(0.0)
            } else {
                0.0
            };

            let angle = 2.0 * std::f64::consts::PI * hour / 24.0 + self.load_phase_rad;
            let load_w = (self.base_load_w
                + self.load_amplitude_w * angle.sin()
                + gaussian_noise(&mut rng, self.load_noise_std_w))
            .max(0.0);

            let production_wh = (production_w * dt_hours).round();
            let consumption_wh = (load_w * dt_hours).round();
            intervals.push(HistoricalInterval {
                timestamp_end: end,
                interval_length_seconds: interval_minutes * 60,
                production_wh,
                consumption_wh,
                import_wh: (consumption_wh - production_wh).max(0.0),
                export_wh: (production_wh - consumption_wh).max(0.0),
                batt_charge_wh: 0.0,
                batt_discharge_wh: 0.0,
            });
            start = end;
        }

        HistoricalSeries::new(self.panel_count, intervals)
    }

    fn minutes_into_day(&self, t: NaiveDateTime) -> u32 {
        use chrono::Timelike;
        t.hour() * 60 + t.minute()
    }
}

/// Gaussian noise via the Box-Muller transform.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}
