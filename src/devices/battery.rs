use crate::devices::types::{DeviceContext, IntervalMeter, PowerDevice, requested};
use crate::error::SimError;
use crate::sim::dispatcher::ENERGY_EPSILON_WH;
use crate::sim::table::Table1D;

/// Pack voltage used to express the C-rate limit as a current limit.
pub const NOMINAL_VOLTAGE: f64 = 48.0;

/// State-of-charge breakpoints of the default derating curve.
pub const DEFAULT_DERATING_SOC: [f64; 4] = [0.0, 0.1, 0.2, 1.0];

/// Fraction of the maximum C-rate available at each default breakpoint.
pub const DEFAULT_DERATING_FRACTION: [f64; 4] = [0.25, 0.5, 1.0, 1.0];

/// Charge and discharge totals for one interval (Wh at the battery terminals).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatteryMeter {
    pub charge_wh: f64,
    pub discharge_wh: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Charge,
    Discharge,
}

/// A battery energy store with efficiency losses and a SOC-dependent rate limit.
///
/// Energy passed to [`PowerDevice::absorb`] and returned from
/// [`PowerDevice::supply`] is measured at the terminals; the stored energy
/// moves by `accepted × charge_efficiency` on charge and by
/// `provided / discharge_efficiency` on discharge.
///
/// The transfer rate is limited by `max_c_rate` scaled by a derating table
/// indexed by SOC. A transfer is feasible when the implied current does not
/// exceed the current allowed by the average of the derated C-rates at the
/// starting and projected ending SOC.
///
/// A store with zero usable capacity reports a SOC of 1 and never transfers
/// energy.
#[derive(Debug, Clone)]
pub struct BatteryStore {
    /// Usable capacity in watt-hours.
    usable_capacity_wh: f64,

    /// SOC restored by [`PowerDevice::reset_lifetime_state`].
    initial_soc: f64,

    /// Energy currently stored, within `[0, usable_capacity_wh]`.
    stored_energy_wh: f64,

    /// Charging efficiency (0..1.0].
    charge_efficiency: f64,

    /// Discharging efficiency (0..1.0].
    discharge_efficiency: f64,

    /// C-rate available when the derating fraction is 1.
    max_c_rate: f64,

    /// SOC to fraction-of-`max_c_rate` curve.
    derating: Table1D,

    /// Sum of net increases of stored energy (Wh).
    lifetime_throughput_wh: f64,

    meter: IntervalMeter<BatteryMeter>,
}

impl BatteryStore {
    /// Creates a new battery store.
    ///
    /// # Arguments
    ///
    /// * `usable_capacity_wh` - Usable capacity in Wh (0 disables the battery)
    /// * `initial_soc` - Initial state of charge (0.0 to 1.0)
    /// * `charge_efficiency` - Charging efficiency (0..1.0]
    /// * `discharge_efficiency` - Discharging efficiency (0..1.0]
    /// * `max_c_rate` - Maximum C-rate before derating
    /// * `derating` - SOC to C-rate fraction table; should cover SOC [0, 1]
    ///
    /// # Panics
    ///
    /// Panics if capacity or C-rate is negative, SOC is out of range, or an
    /// efficiency is outside (0, 1].
    pub fn new(
        usable_capacity_wh: f64,
        initial_soc: f64,
        charge_efficiency: f64,
        discharge_efficiency: f64,
        max_c_rate: f64,
        derating: Table1D,
    ) -> Self {
        assert!(usable_capacity_wh >= 0.0);
        assert!((0.0..=1.0).contains(&initial_soc));
        assert!(charge_efficiency > 0.0 && charge_efficiency <= 1.0);
        assert!(discharge_efficiency > 0.0 && discharge_efficiency <= 1.0);
        assert!(max_c_rate >= 0.0);

        Self {
            usable_capacity_wh,
            initial_soc,
            stored_energy_wh: usable_capacity_wh * initial_soc,
            charge_efficiency,
            discharge_efficiency,
            max_c_rate,
            derating,
            lifetime_throughput_wh: 0.0,
            meter: IntervalMeter::default(),
        }
    }

    pub fn usable_capacity_wh(&self) -> f64 {
        self.usable_capacity_wh
    }

    pub fn stored_energy_wh(&self) -> f64 {
        self.stored_energy_wh
    }

    pub fn lifetime_throughput_wh(&self) -> f64 {
        self.lifetime_throughput_wh
    }

    pub fn max_c_rate(&self) -> f64 {
        self.max_c_rate
    }

    pub fn charge_efficiency(&self) -> f64 {
        self.charge_efficiency
    }

    pub fn discharge_efficiency(&self) -> f64 {
        self.discharge_efficiency
    }

    /// State of charge in `[0, 1]`; 1 for a zero-capacity store.
    pub fn soc(&self) -> f64 {
        if self.usable_capacity_wh <= 0.0 {
            return 1.0;
        }
        (self.stored_energy_wh / self.usable_capacity_wh).clamp(0.0, 1.0)
    }

    /// Charge/discharge totals for the interval starting at `context.timestamp`.
    pub fn interval_meter(&self, context: &DeviceContext) -> BatteryMeter {
        self.meter.reading(context.timestamp)
    }

    fn available_c_rate(&self, soc: f64) -> Result<f64, SimError> {
        Ok(self.max_c_rate * self.derating.lookup(soc)?)
    }

    /// SOC after moving `energy_wh` through the terminals.
    fn projected_soc(&self, energy_wh: f64, direction: Direction) -> f64 {
        let stored = match direction {
            Direction::Charge => self.stored_energy_wh + energy_wh * self.charge_efficiency,
            Direction::Discharge => self.stored_energy_wh - energy_wh / self.discharge_efficiency,
        };
        (stored / self.usable_capacity_wh).clamp(0.0, 1.0)
    }

    fn is_feasible(
        &self,
        context: &DeviceContext,
        energy_wh: f64,
        direction: Direction,
    ) -> Result<bool, SimError> {
        if energy_wh <= 0.0 {
            return Ok(true);
        }
        let hours = context.hours();
        if hours <= 0.0 {
            return Ok(false);
        }

        let start_c = self.available_c_rate(self.soc())?;
        let end_c = self.available_c_rate(self.projected_soc(energy_wh, direction))?;
        let amp_limit = 0.5 * (start_c + end_c) * self.usable_capacity_wh / NOMINAL_VOLTAGE;
        let amps = energy_wh / hours / NOMINAL_VOLTAGE;
        Ok(amps <= amp_limit)
    }

    /// Largest transfer up to `available_wh` allowed by the rate limit.
    ///
    /// Returns `available_wh` when it is feasible outright, otherwise the
    /// largest feasible whole number of watt-hours. Feasibility is monotonic
    /// in the transfer size for a non-decreasing derating curve, so a binary
    /// search over integers finds the same value as a linear scan.
    fn max_transfer_wh(
        &self,
        context: &DeviceContext,
        available_wh: f64,
        direction: Direction,
    ) -> Result<f64, SimError> {
        if available_wh <= 0.0 {
            return Ok(0.0);
        }
        if self.is_feasible(context, available_wh, direction)? {
            return Ok(available_wh);
        }

        let mut hi = available_wh.floor() as u64;
        if self.is_feasible(context, hi as f64, direction)? {
            return Ok(hi as f64);
        }
        // invariant: lo feasible, hi infeasible
        let mut lo = 0_u64;
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.is_feasible(context, mid as f64, direction)? {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(lo as f64)
    }

    /// Copy of the store after charging then discharging `energy_wh`, or
    /// `None` when either leg falls short.
    fn round_trip(
        &self,
        context: &DeviceContext,
        energy_wh: f64,
    ) -> Result<Option<Self>, SimError> {
        let mut trial = self.clone();
        let accepted = trial.absorb(context, energy_wh)?;
        if accepted < energy_wh - ENERGY_EPSILON_WH {
            return Ok(None);
        }
        let returned = trial.supply(context, accepted)?;
        if returned < accepted - ENERGY_EPSILON_WH {
            return Ok(None);
        }
        Ok(Some(trial))
    }
}

impl PowerDevice for BatteryStore {
    fn produce(&mut self) -> f64 {
        0.0
    }

    fn absorb(&mut self, context: &DeviceContext, desired_wh: f64) -> Result<f64, SimError> {
        let desired_wh = requested(desired_wh);
        if self.usable_capacity_wh <= 0.0 || desired_wh <= 0.0 {
            return Ok(0.0);
        }

        let headroom_wh = (self.usable_capacity_wh - self.stored_energy_wh).max(0.0);
        let acceptable_wh = headroom_wh / self.charge_efficiency;
        let limit_wh = self.max_transfer_wh(context, acceptable_wh, Direction::Charge)?;
        let accepted = desired_wh.min(limit_wh);
        if accepted <= 0.0 {
            return Ok(0.0);
        }

        let before = self.stored_energy_wh;
        self.stored_energy_wh = if accepted >= acceptable_wh {
            self.usable_capacity_wh
        } else {
            (before + accepted * self.charge_efficiency).clamp(0.0, self.usable_capacity_wh)
        };
        if self.stored_energy_wh > before {
            self.lifetime_throughput_wh += self.stored_energy_wh - before;
        }

        self.meter
            .record(context.timestamp, |m| m.charge_wh += accepted);
        Ok(accepted)
    }

    fn supply(&mut self, context: &DeviceContext, desired_wh: f64) -> Result<f64, SimError> {
        let desired_wh = requested(desired_wh);
        if self.usable_capacity_wh <= 0.0 || desired_wh <= 0.0 {
            return Ok(0.0);
        }

        let exportable_wh = self.stored_energy_wh * self.discharge_efficiency;
        let limit_wh = self.max_transfer_wh(context, exportable_wh, Direction::Discharge)?;
        let provided = desired_wh.min(limit_wh);
        if provided <= 0.0 {
            return Ok(0.0);
        }

        // throughput accrues on charge only
        self.stored_energy_wh = if provided >= exportable_wh {
            0.0
        } else {
            (self.stored_energy_wh - provided / self.discharge_efficiency)
                .clamp(0.0, self.usable_capacity_wh)
        };

        self.meter
            .record(context.timestamp, |m| m.discharge_wh += provided);
        Ok(provided)
    }

    /// Charges and discharges the same energy within one interval.
    ///
    /// The amount is capped so the discharge leg can return everything the
    /// charge leg took in: `(stored + x·ηc)·ηd >= x`, plus both rate limits.
    /// Returns that amount; the caller routes the rest elsewhere.
    fn transient_absorb(
        &mut self,
        context: &DeviceContext,
        desired_wh: f64,
    ) -> Result<f64, SimError> {
        let desired_wh = requested(desired_wh);
        if self.usable_capacity_wh <= 0.0 || desired_wh <= 0.0 {
            return Ok(0.0);
        }

        let round_trip_efficiency = self.charge_efficiency * self.discharge_efficiency;
        let energy_cap_wh = if round_trip_efficiency >= 1.0 {
            desired_wh
        } else {
            self.stored_energy_wh * self.discharge_efficiency / (1.0 - round_trip_efficiency)
        };
        let target_wh = desired_wh.min(energy_cap_wh);
        if target_wh <= ENERGY_EPSILON_WH {
            return Ok(0.0);
        }
        if let Some(trial) = self.round_trip(context, target_wh)? {
            *self = trial;
            return Ok(target_wh);
        }

        // a rate limit binds; keep the largest whole watt-hour that round-trips
        let mut lo = 0_u64;
        let mut hi = target_wh.floor() as u64;
        let mut best = None;
        if hi > 0 {
            if let Some(trial) = self.round_trip(context, hi as f64)? {
                lo = hi;
                best = Some(trial);
            }
        }
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            match self.round_trip(context, mid as f64)? {
                Some(trial) => {
                    lo = mid;
                    best = Some(trial);
                }
                None => hi = mid,
            }
        }
        match best {
            Some(trial) if lo > 0 => {
                *self = trial;
                Ok(lo as f64)
            }
            _ => Ok(0.0),
        }
    }

    fn reset_lifetime_state(&mut self) {
        self.stored_energy_wh = self.usable_capacity_wh * self.initial_soc;
        self.lifetime_throughput_wh = 0.0;
        self.meter.clear();
    }

    fn device_type(&self) -> &'static str {
        "Battery"
    }
}
