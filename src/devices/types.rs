//! Common types and traits for dispatch participants.

use chrono::{NaiveDateTime, TimeDelta};

use crate::error::SimError;

/// Contextual information passed to devices for every energy transfer.
///
/// # Fields
/// * `timestamp` - Start of the interval being simulated; keys interval meters
/// * `duration` - Length of the interval, used for power (rate) limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceContext {
    pub timestamp: NaiveDateTime,
    pub duration: TimeDelta,
}

impl DeviceContext {
    pub fn new(timestamp: NaiveDateTime, duration: TimeDelta) -> Self {
        Self {
            timestamp,
            duration,
        }
    }

    /// Interval duration in fractional hours.
    pub fn hours(&self) -> f64 {
        self.duration.num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Trait defining a participant in the energy dispatch.
///
/// All energies are in watt-hours and non-negative. Requests below zero are
/// treated as zero.
pub trait PowerDevice {
    /// Returns and clears any energy the device generated on its own.
    fn produce(&mut self) -> f64;

    /// Attempts to take in `desired_wh`; returns the energy accepted.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError`] if the device's rate model cannot be evaluated.
    fn absorb(&mut self, context: &DeviceContext, desired_wh: f64) -> Result<f64, SimError>;

    /// Attempts to deliver `desired_wh`; returns the energy provided.
    ///
    /// The device may deplete more internal energy than it returns because
    /// of conversion losses.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError`] if the device's rate model cannot be evaluated.
    fn supply(&mut self, context: &DeviceContext, desired_wh: f64) -> Result<f64, SimError>;

    /// Passes energy through the device within one interval.
    ///
    /// Both legs must carry the same energy; the return value is that
    /// amount, and the caller passes the remainder on to the next device.
    /// The default absorbs what the device accepts and reclaims the part
    /// the supply leg returns, which is exact for lossless devices. Devices
    /// that cannot return what they took in override it.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`PowerDevice::absorb`] and [`PowerDevice::supply`].
    fn transient_absorb(
        &mut self,
        context: &DeviceContext,
        desired_wh: f64,
    ) -> Result<f64, SimError> {
        let accepted = self.absorb(context, desired_wh)?;
        if accepted <= 0.0 {
            return Ok(0.0);
        }
        let returned = self.supply(context, accepted)?;
        Ok(returned.min(accepted))
    }

    /// Clears lifetime accumulators and restores the initial state.
    fn reset_lifetime_state(&mut self);

    /// Returns a human-readable type name for the device.
    fn device_type(&self) -> &'static str;
}

/// Values accumulated over a single interval, keyed by the interval start.
///
/// Recording against a new interval discards the previous values first, so
/// a device never has to watch a clock to know when to reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalMeter<M> {
    interval_start: Option<NaiveDateTime>,
    values: M,
}

impl<M: Default + Clone> IntervalMeter<M> {
    /// Applies `update` to the values for the interval starting `at`.
    pub fn record(&mut self, at: NaiveDateTime, update: impl FnOnce(&mut M)) {
        if self.interval_start != Some(at) {
            self.interval_start = Some(at);
            self.values = M::default();
        }
        update(&mut self.values);
    }

    /// Returns the values for `at`, or zeroed values if nothing was recorded then.
    pub fn reading(&self, at: NaiveDateTime) -> M {
        if self.interval_start == Some(at) {
            self.values.clone()
        } else {
            M::default()
        }
    }

    pub fn clear(&mut self) {
        self.interval_start = None;
        self.values = M::default();
    }
}

/// Clamps a requested energy to a usable non-negative value.
pub(crate) fn requested(desired_wh: f64) -> f64 {
    if desired_wh.is_nan() {
        0.0
    } else {
        desired_wh.max(0.0)
    }
}
