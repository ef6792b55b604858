//! Diode models.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / (n * Vt)) - 1)
//!
//! [`Diode`] is evaluated by the asymmetric clipper's Newton solver on every
//! sample. [`DiodePair`] is a reference model: the symmetric clipper inverts
//! its law in closed form and never calls it, and the clipper's tests use it
//! to check the output.
//!
//! Above [`EXP_LIMIT`] thermal voltages the exponential is continued
//! linearly, so a Newton iterate that overshoots far into forward bias stays
//! finite instead of overflowing to infinity.

use super::{DeviceModel, OperatingPoint, Region};
use crate::THERMAL_VOLTAGE;

/// Largest exponent evaluated exactly (e^80 ≈ 5.5e34).
const EXP_LIMIT: f64 = 80.0;

/// `exp(x)` continued linearly past `EXP_LIMIT`; returns `(value, slope)`.
#[inline]
pub(super) fn limited_exp(x: f64) -> (f64, f64) {
    if x > EXP_LIMIT {
        let e = EXP_LIMIT.exp();
        (e * (1.0 + x - EXP_LIMIT), e)
    } else {
        let e = x.exp();
        (e, e)
    }
}

/// Single junction diode. The control voltage is ignored.
#[derive(Debug, Clone, Copy)]
pub struct Diode {
    /// Saturation current (Is), in amperes
    pub saturation_current: f64,
    /// Ideality factor (n), typically 1.0 to 2.0
    pub ideality: f64,
    /// Thermal voltage (Vt), in volts
    pub thermal_voltage: f64,
}

impl Default for Diode {
    fn default() -> Self {
        Self {
            saturation_current: 1e-14,
            ideality: 1.0,
            thermal_voltage: THERMAL_VOLTAGE,
        }
    }
}

impl Diode {
    /// Create a diode from its Shockley parameters.
    pub fn new(saturation_current: f64, ideality: f64, thermal_voltage: f64) -> Self {
        Self {
            saturation_current,
            ideality,
            thermal_voltage,
        }
    }

    /// Thermal voltage times ideality factor.
    pub fn n_vt(&self) -> f64 {
        self.ideality * self.thermal_voltage
    }
}

impl DeviceModel for Diode {
    fn evaluate(&self, _vc: f64, v: f64) -> OperatingPoint {
        let n_vt = self.n_vt();
        let (e, slope) = limited_exp(v / n_vt);
        let region = if v >= 0.0 {
            Region::Forward
        } else {
            Region::Reverse
        };
        OperatingPoint::new(
            self.saturation_current * (e - 1.0),
            self.saturation_current / n_vt * slope,
            region,
        )
    }
}

/// Antiparallel diode pair with identical junctions.
///
/// Only the junction that is forward biased is evaluated: the branch is
/// selected by the sign of `v` (positive branch for `v >= 0`), which is the
/// same single-exponential approximation the closed-form clipper inverts.
#[derive(Debug, Clone, Copy)]
pub struct DiodePair {
    /// Saturation current of each junction, in amperes
    pub saturation_current: f64,
    /// Thermal voltage (Vt), in volts
    pub thermal_voltage: f64,
}

impl Default for DiodePair {
    fn default() -> Self {
        Self {
            saturation_current: 200e-9,
            thermal_voltage: THERMAL_VOLTAGE,
        }
    }
}

impl DiodePair {
    /// Create a pair of identical junctions.
    pub fn new(saturation_current: f64, thermal_voltage: f64) -> Self {
        Self {
            saturation_current,
            thermal_voltage,
        }
    }
}

impl DeviceModel for DiodePair {
    fn evaluate(&self, _vc: f64, v: f64) -> OperatingPoint {
        let (sign, region) = if v >= 0.0 {
            (1.0, Region::Forward)
        } else {
            (-1.0, Region::Reverse)
        };
        let (e, slope) = limited_exp(v.abs() / self.thermal_voltage);
        OperatingPoint::new(
            sign * self.saturation_current * (e - 1.0),
            self.saturation_current / self.thermal_voltage * slope,
            region,
        )
    }
}
