//! Nonlinear device models.
//!
//! Each model is a pure function from terminal voltages to an
//! [`OperatingPoint`]: the device current, its derivative with respect to the
//! channel voltage, and the [`Region`] that produced them. Models carry only
//! their calibration, never the region of a previous call, so inputs that
//! jump between samples cannot leave a stale region behind.
//!
//! Terminal convention for [`DeviceModel::evaluate`]:
//! - `vc`: control voltage (gate-source for MOSFETs, grid-cathode for tubes,
//!   base-collector for the BJT; ignored by two-terminal devices)
//! - `v`: channel voltage (drain-source, plate-cathode, base-emitter, or the
//!   junction voltage of a diode)

mod bjt;
mod diode;
mod mosfet;
mod triode;

pub use bjt::Bjt;
pub use diode::{Diode, DiodePair};
pub use mosfet::{Nmos, Pmos, CHANNEL_LENGTH_MODULATION};
pub use triode::TriodeModel;

/// Operating region selected by a device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// No conduction: current and conductance are zero (or leakage only)
    Cutoff,
    /// MOSFET linear region, current quadratic in `vds`
    Triode,
    /// MOSFET saturation (current set by the gate overdrive) or a BJT with
    /// its collector junction forward biased
    Saturation,
    /// Junction or tube conducting in the positive direction
    Forward,
    /// Junction conducting in the negative direction
    Reverse,
}

/// Result of evaluating a device at one bias point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatingPoint {
    /// Device current in amperes
    pub current: f64,
    /// d(current)/d(channel voltage) in siemens
    pub conductance: f64,
    /// Region that produced the values above
    pub region: Region,
}

impl OperatingPoint {
    /// A non-conducting operating point.
    pub const CUTOFF: OperatingPoint = OperatingPoint {
        current: 0.0,
        conductance: 0.0,
        region: Region::Cutoff,
    };

    /// Bundle a model's outputs.
    pub fn new(current: f64, conductance: f64, region: Region) -> Self {
        Self {
            current,
            conductance,
            region,
        }
    }
}

/// Shared contract of every nonlinear device.
pub trait DeviceModel {
    /// Evaluate the device at control voltage `vc` and channel voltage `v`.
    fn evaluate(&self, vc: f64, v: f64) -> OperatingPoint;

    /// Device current at the given bias.
    fn current(&self, vc: f64, v: f64) -> f64 {
        self.evaluate(vc, v).current
    }

    /// d(current)/d(channel voltage) at the given bias.
    fn conductance(&self, vc: f64, v: f64) -> f64 {
        self.evaluate(vc, v).conductance
    }

    /// Operating region at the given bias.
    fn region(&self, vc: f64, v: f64) -> Region {
        self.evaluate(vc, v).region
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_are_object_safe() {
        let models: [Box<dyn DeviceModel>; 6] = [
            Box::new(Nmos::default()),
            Box::new(Pmos::default()),
            Box::new(Diode::default()),
            Box::new(DiodePair::default()),
            Box::new(TriodeModel::default()),
            Box::new(Bjt::default()),
        ];
        for model in &models {
            let op = model.evaluate(0.0, 0.0);
            assert!(op.current.is_finite());
            assert!(op.conductance.is_finite());
        }
    }

    #[test]
    fn test_default_methods_agree_with_evaluate() {
        let nmos = Nmos::default();
        let op = nmos.evaluate(5.0, 1.0);
        assert_eq!(nmos.current(5.0, 1.0), op.current);
        assert_eq!(nmos.conductance(5.0, 1.0), op.conductance);
        assert_eq!(nmos.region(5.0, 1.0), Region::Triode);
    }
}
