//! Apportions an energy requirement across an ordered device list.

use tracing::trace;

use crate::devices::{DeviceContext, PowerDevice};
use crate::error::SimError;

/// Residual energy below this is treated as fully served (Wh).
pub const ENERGY_EPSILON_WH: f64 = 1e-9;

/// Serves a load by drawing on devices in priority order.
///
/// Each device is asked for whatever is still outstanding; the first device
/// in the list is drained before the next is consulted.
#[derive(Debug, Clone, Default)]
pub struct LoadDispatcher {
    /// Total energy requested over the dispatcher's lifetime (Wh).
    cumulative_usage_wh: f64,
    /// Energy still unserved during the current dispatch (Wh).
    remaining_requirement_wh: f64,
}

impl LoadDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cumulative_usage_wh(&self) -> f64 {
        self.cumulative_usage_wh
    }

    pub fn remaining_requirement_wh(&self) -> f64 {
        self.remaining_requirement_wh
    }

    /// Satisfies `requirement_wh` from `devices`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnmetLoad`] if the devices together cannot cover
    /// the requirement, or propagates a device error.
    pub fn dispatch(
        &mut self,
        context: &DeviceContext,
        requirement_wh: f64,
        devices: &mut [&mut dyn PowerDevice],
    ) -> Result<(), SimError> {
        let requirement_wh = requirement_wh.max(0.0);
        self.remaining_requirement_wh = requirement_wh;
        self.cumulative_usage_wh += requirement_wh;

        for device in devices.iter_mut() {
            if self.remaining_requirement_wh <= ENERGY_EPSILON_WH {
                break;
            }
            let provided = device.supply(context, self.remaining_requirement_wh)?;
            trace!(device = device.device_type(), provided, "load share");
            self.remaining_requirement_wh -= provided;
        }

        if self.remaining_requirement_wh > ENERGY_EPSILON_WH {
            return Err(SimError::UnmetLoad {
                requested_wh: requirement_wh,
                unmet_wh: self.remaining_requirement_wh,
            });
        }
        self.remaining_requirement_wh = 0.0;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.cumulative_usage_wh = 0.0;
        self.remaining_requirement_wh = 0.0;
    }
}
