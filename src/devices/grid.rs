use crate::devices::tariff::{TariffPeriod, TariffSchedule};
use crate::devices::types::{DeviceContext, IntervalMeter, PowerDevice, requested};
use crate::error::SimError;

/// Energy and money moved across the grid connection in one interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridMeter {
    /// Energy purchased (Wh).
    pub import_wh: f64,
    /// Energy exported (Wh).
    pub export_wh: f64,
    /// Purchase cost after credits were applied (dollars).
    pub cost_dollars: f64,
    /// Credits earned by exports (dollars).
    pub credits_earned_dollars: f64,
    /// Banked credits spent against purchases (dollars).
    pub credits_used_dollars: f64,
}

/// A utility connection billing imports and crediting exports.
///
/// The grid is an unlimited source and sink: `supply` and `absorb` always
/// move the full request. Exports bank generation credits; purchases draw on
/// the bank at no more than the creditable rate of the active rate class,
/// itself capped at the purchase rate.
#[derive(Debug, Clone)]
pub struct GridConnection {
    tariff: TariffSchedule,

    /// Credit balance restored by [`PowerDevice::reset_lifetime_state`].
    initial_credits_dollars: f64,

    /// Banked generation credits (dollars, never negative).
    available_credits_dollars: f64,

    /// Net money paid for imports over the run (dollars).
    lifetime_spent_dollars: f64,

    meter: IntervalMeter<GridMeter>,
}

impl GridConnection {
    /// Creates a grid connection with a starting credit balance.
    ///
    /// # Panics
    ///
    /// Panics if `initial_credits_dollars` is negative.
    pub fn new(tariff: TariffSchedule, initial_credits_dollars: f64) -> Self {
        assert!(initial_credits_dollars >= 0.0);
        Self {
            tariff,
            initial_credits_dollars,
            available_credits_dollars: initial_credits_dollars,
            lifetime_spent_dollars: 0.0,
            meter: IntervalMeter::default(),
        }
    }

    pub fn tariff(&self) -> &TariffSchedule {
        &self.tariff
    }

    pub fn available_credits_dollars(&self) -> f64 {
        self.available_credits_dollars
    }

    pub fn lifetime_spent_dollars(&self) -> f64 {
        self.lifetime_spent_dollars
    }

    /// Tariff classification of the interval in `context`.
    pub fn period(&self, context: &DeviceContext) -> TariffPeriod {
        self.tariff.period(context.timestamp)
    }

    /// Import/export and billing totals for the interval in `context`.
    pub fn interval_meter(&self, context: &DeviceContext) -> GridMeter {
        self.meter.reading(context.timestamp)
    }

    /// Banks `dollars` of credit.
    pub fn add_credits(&mut self, dollars: f64) {
        self.available_credits_dollars += dollars.max(0.0);
    }

    /// Spends up to `dollars` of banked credit; returns the amount spent.
    pub fn use_credits(&mut self, dollars: f64) -> f64 {
        let used = dollars.max(0.0).min(self.available_credits_dollars);
        self.available_credits_dollars -= used;
        used
    }
}

impl PowerDevice for GridConnection {
    fn produce(&mut self) -> f64 {
        0.0
    }

    fn absorb(&mut self, context: &DeviceContext, desired_wh: f64) -> Result<f64, SimError> {
        let exported = requested(desired_wh);
        let rate = self.tariff.rate(context.timestamp);
        let earned = exported / 1000.0 * rate.generation_credit_per_kwh;
        self.add_credits(earned);

        self.meter.record(context.timestamp, |m| {
            m.export_wh += exported;
            m.credits_earned_dollars += earned;
        });
        Ok(exported)
    }

    fn supply(&mut self, context: &DeviceContext, desired_wh: f64) -> Result<f64, SimError> {
        let imported = requested(desired_wh);
        let rate = *self.tariff.rate(context.timestamp);
        let kwh = imported / 1000.0;
        let gross = kwh * rate.purchase_per_kwh;
        let eligible = kwh * rate.effective_creditable_per_kwh();
        let used = self.use_credits(eligible.min(gross));
        let net = gross - used;
        self.lifetime_spent_dollars += net;

        self.meter.record(context.timestamp, |m| {
            m.import_wh += imported;
            m.cost_dollars += net;
            m.credits_used_dollars += used;
        });
        Ok(imported)
    }

    fn reset_lifetime_state(&mut self) {
        self.available_credits_dollars = self.initial_credits_dollars;
        self.lifetime_spent_dollars = 0.0;
        self.meter.clear();
    }

    fn device_type(&self) -> &'static str {
        "Grid"
    }
}
