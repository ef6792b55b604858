//! NPN bipolar transistor, transport-form Ebers-Moll.
//!
//! Emitter current for base-emitter voltage `vbe` and base-collector voltage
//! `vbc`:
//!
//! ```text
//! Ie = Is * (exp(vbe/Vt) - exp(vbc/Vt)) + Is/βf * (exp(vbe/Vt) - 1)
//! ```
//!
//! The emitter follower stage inverts this law in closed form; the model is
//! also used to check that stage's output.

use super::diode::limited_exp;
use super::{DeviceModel, OperatingPoint, Region};
use crate::THERMAL_VOLTAGE;

/// NPN transistor parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bjt {
    /// Transport saturation current (Is), in amperes
    pub saturation_current: f64,
    /// Forward current gain (βf)
    pub beta_f: f64,
    /// Thermal voltage (Vt), in volts
    pub thermal_voltage: f64,
}

impl Default for Bjt {
    fn default() -> Self {
        Self {
            saturation_current: 0.1e-15,
            beta_f: 100.0,
            thermal_voltage: THERMAL_VOLTAGE,
        }
    }
}

impl Bjt {
    /// Create a transistor from its Ebers-Moll parameters.
    pub fn new(saturation_current: f64, beta_f: f64, thermal_voltage: f64) -> Self {
        Self {
            saturation_current,
            beta_f,
            thermal_voltage,
        }
    }
}

impl DeviceModel for Bjt {
    /// The control voltage is `vbc`, the channel voltage `vbe`. Reports the
    /// emitter current and `dIe/dVbe`.
    fn evaluate(&self, vbc: f64, vbe: f64) -> OperatingPoint {
        let is = self.saturation_current;
        let (e_be, slope_be) = limited_exp(vbe / self.thermal_voltage);
        let (e_bc, _) = limited_exp(vbc / self.thermal_voltage);

        let region = if vbe <= 0.0 {
            Region::Cutoff
        } else if vbc >= 0.0 {
            Region::Saturation
        } else {
            Region::Forward
        };

        OperatingPoint::new(
            is * (e_be - e_bc) + is / self.beta_f * (e_be - 1.0),
            is * (1.0 + 1.0 / self.beta_f) / self.thermal_voltage * slope_be,
            region,
        )
    }
}
