use crate::devices::types::{DeviceContext, PowerDevice, requested};
use crate::error::SimError;

/// A photovoltaic array replaying metered production.
///
/// `SolarSource` holds the energy produced in the current interval until it
/// is drawn down by the load or drained as surplus. It cannot store energy.
#[derive(Debug, Clone)]
pub struct SolarSource {
    /// Number of panels in the simulated array.
    panel_count: u32,

    /// Energy produced this interval and not yet used (Wh).
    pending_energy_wh: f64,

    /// Total energy delivered by the array (Wh).
    lifetime_energy_wh: f64,
}

impl SolarSource {
    pub fn new(panel_count: u32) -> Self {
        Self {
            panel_count,
            pending_energy_wh: 0.0,
            lifetime_energy_wh: 0.0,
        }
    }

    pub fn panel_count(&self) -> u32 {
        self.panel_count
    }

    pub fn pending_energy_wh(&self) -> f64 {
        self.pending_energy_wh
    }

    pub fn lifetime_energy_wh(&self) -> f64 {
        self.lifetime_energy_wh
    }

    /// Loads this interval's production from a per-panel figure.
    ///
    /// Replaces any energy still pending and returns the array total (Wh).
    pub fn set_generation_per_panel(&mut self, wh_per_panel: f64) -> f64 {
        self.pending_energy_wh = requested(wh_per_panel) * f64::from(self.panel_count);
        self.pending_energy_wh
    }
}

impl PowerDevice for SolarSource {
    fn produce(&mut self) -> f64 {
        let drained = self.pending_energy_wh;
        self.pending_energy_wh = 0.0;
        self.lifetime_energy_wh += drained;
        drained
    }

    fn absorb(&mut self, _context: &DeviceContext, _desired_wh: f64) -> Result<f64, SimError> {
        Ok(0.0)
    }

    fn supply(&mut self, _context: &DeviceContext, desired_wh: f64) -> Result<f64, SimError> {
        let provided = requested(desired_wh).min(self.pending_energy_wh);
        self.pending_energy_wh -= provided;
        self.lifetime_energy_wh += provided;
        Ok(provided)
    }

    fn reset_lifetime_state(&mut self) {
        self.pending_energy_wh = 0.0;
        self.lifetime_energy_wh = 0.0;
    }

    fn device_type(&self) -> &'static str {
        "Solar"
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeDelta};

    use super::*;

    fn ctx() -> DeviceContext {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 2)
            .and_then(|d| d.and_hms_opt(5, 16, 0))
            .unwrap();
        DeviceContext::new(ts, TimeDelta::minutes(15))
    }

    #[test]
    fn test_new_solar_source() {
        let solar = SolarSource::new(10);
        assert_eq!(solar.panel_count(), 10);
        assert_eq!(solar.pending_energy_wh(), 0.0);
        assert_eq!(solar.lifetime_energy_wh(), 0.0);
    }

    #[test]
    fn test_generation_scales_with_panels() {
        let mut solar = SolarSource::new(5);
        assert_eq!(solar.set_generation_per_panel(100.0), 500.0);
        assert_eq!(solar.pending_energy_wh(), 500.0);
    }

    #[test]
    fn test_produce_drains_pending() {
        let mut solar = SolarSource::new(4);
        solar.set_generation_per_panel(50.0);
        assert_eq!(solar.produce(), 200.0);
        assert_eq!(solar.pending_energy_wh(), 0.0);
        assert_eq!(solar.lifetime_energy_wh(), 200.0);
        assert_eq!(solar.produce(), 0.0);
    }

    #[test]
    fn test_cannot_absorb() {
        let mut solar = SolarSource::new(5);
        assert_eq!(solar.absorb(&ctx(), 500.0).unwrap(), 0.0);
        assert_eq!(solar.transient_absorb(&ctx(), 500.0).unwrap(), 0.0);
    }

    #[test]
    fn test_supply_draws_down_pending() {
        let mut solar = SolarSource::new(3);
        solar.set_generation_per_panel(100.0);
        assert_eq!(solar.supply(&ctx(), 150.0).unwrap(), 150.0);
        assert_eq!(solar.pending_energy_wh(), 150.0);
        assert_eq!(solar.lifetime_energy_wh(), 150.0);

        // asking for more than remains yields only what is pending
        assert_eq!(solar.supply(&ctx(), 500.0).unwrap(), 150.0);
        assert_eq!(solar.pending_energy_wh(), 0.0);
        assert_eq!(solar.lifetime_energy_wh(), 300.0);
    }

    #[test]
    fn test_reset_lifetime_state() {
        let mut solar = SolarSource::new(2);
        solar.set_generation_per_panel(200.0);
        solar.produce();
        solar.set_generation_per_panel(10.0);
        solar.reset_lifetime_state();
        assert_eq!(solar.pending_energy_wh(), 0.0);
        assert_eq!(solar.lifetime_energy_wh(), 0.0);
    }

    #[test]
    fn test_zero_panels_produce_nothing() {
        let mut solar = SolarSource::new(0);
        assert_eq!(solar.set_generation_per_panel(250.0), 0.0);
        assert_eq!(solar.supply(&ctx(), 100.0).unwrap(), 0.0);
    }
}
