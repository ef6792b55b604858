//! Quadratic triode law used by the wave-digital triode stage.
//!
//! Plate current as a function of grid-cathode and plate-cathode voltage:
//!
//! ```text
//! G  = kp + kpg * Vgk + 2 * kp2 * Vpk
//! Ip = G^2 / (4 * kp2)        for G >= 0 and Vpk >= 0
//! Ip = 0                      otherwise (cutoff)
//! ```
//!
//! This is a reference model. [`TriodeWaveStage`](crate::stages::TriodeWaveStage)
//! never calls it: the stage's closed-form scattering solves the same law
//! exactly. It is exposed so the plate current can be inspected on its own,
//! and the stage's tests use it to check the bias point.

use super::{DeviceModel, OperatingPoint, Region};

/// Calibrated triode coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriodeModel {
    /// Constant drive term
    pub kp: f64,
    /// Plate voltage coefficient
    pub kp2: f64,
    /// Grid voltage coefficient
    pub kpg: f64,
}

impl Default for TriodeModel {
    fn default() -> Self {
        Self {
            kp: 1.014e-5,
            kp2: 5.498e-8,
            kpg: 1.076e-5,
        }
    }
}

impl TriodeModel {
    /// Create a model from calibrated tube coefficients.
    pub fn new(kp: f64, kp2: f64, kpg: f64) -> Self {
        Self { kp, kp2, kpg }
    }

    /// Drive term `G`. The tube conducts while this is non-negative.
    #[inline]
    pub fn drive(&self, vgk: f64, vpk: f64) -> f64 {
        self.kp + self.kpg * vgk + 2.0 * self.kp2 * vpk
    }
}

impl DeviceModel for TriodeModel {
    fn evaluate(&self, vgk: f64, vpk: f64) -> OperatingPoint {
        let g = self.drive(vgk, vpk);
        if vpk < 0.0 || g < 0.0 {
            return OperatingPoint::CUTOFF;
        }
        // dIp/dVpk = 2G * 2kp2 / (4kp2) = G
        OperatingPoint::new(g * g / (4.0 * self.kp2), g, Region::Forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_quiescent_current_magnitude() {
        // Around the default bias point (Vgk ~ -1 V, Vpk ~ 146 V) a 12AX7-like
        // stage draws on the order of a milliamp.
        let t = TriodeModel::default();
        let ip = t.current(-1.03, 145.8);
        assert!(ip > 1e-4 && ip < 1e-2, "ip = {ip}");
        assert_eq!(t.region(-1.03, 145.8), Region::Forward);
    }

    #[test]
    fn test_cutoff() {
        let t = TriodeModel::default();
        // Deep negative grid drives G below zero
        assert_eq!(t.evaluate(-100.0, 100.0), OperatingPoint::CUTOFF);
        // Reverse plate voltage never conducts
        assert_eq!(t.evaluate(0.0, -1.0), OperatingPoint::CUTOFF);
    }

    #[test]
    fn test_continuous_at_cutoff_edge() {
        let t = TriodeModel::default();
        let vpk = 100.0;
        // Solve G = 0 for Vgk
        let vgk = -(t.kp + 2.0 * t.kp2 * vpk) / t.kpg;
        let on = t.evaluate(vgk + 1e-9, vpk);
        let off = t.evaluate(vgk - 1e-9, vpk);
        assert_abs_diff_eq!(on.current, off.current, epsilon = 1e-12);
        assert_abs_diff_eq!(on.conductance, off.conductance, epsilon = 1e-12);
    }

    #[test]
    fn test_conductance_matches_finite_difference() {
        let t = TriodeModel::default();
        let h = 1e-4;
        for &(vgk, vpk) in &[(-1.0, 150.0), (0.0, 80.0), (-2.0, 220.0)] {
            let fd = (t.current(vgk, vpk + h) - t.current(vgk, vpk - h)) / (2.0 * h);
            assert_relative_eq!(t.conductance(vgk, vpk), fd, max_relative = 1e-6);
        }
    }
}
