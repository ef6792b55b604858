//! Calibrated MOSFET models for CMOS inverter stages.
//!
//! Extended Shichman-Hodges: the threshold `vt` and transconductance
//! `alpha` are not constants but fitted functions of `vgs` (linear for the
//! NMOS, cubic alpha for the PMOS). The fit comes from measurements of a
//! 4049-style unbuffered inverter and is kept here as opaque calibration data.
//!
//! Currents use a single reference direction: positive current flows from the
//! output node towards the negative rail. The PMOS therefore reports negative
//! current while it sources.

use super::{DeviceModel, OperatingPoint, Region};

/// NMOS threshold fit `vt = VT[0] + VT[1] * vgs`.
const NMOS_VT: [f64; 2] = [1.208306917691355, 0.3139084341943607];
/// NMOS transconductance fit `alpha = ALPHA[0] + ALPHA[1] * vgs`.
const NMOS_ALPHA: [f64; 2] = [0.020662094888127674, -0.0017181795239085821];

/// PMOS threshold fit `vt = VT[0] + VT[1] * vgs`.
const PMOS_VT: [f64; 2] = [-0.25610349392710086, 0.27051216771368214];
/// PMOS transconductance fit, cubic in `vgs`.
const PMOS_ALPHA: [f64; 4] = [
    -0.0003577445606469842,
    -0.0008620153809796321,
    -0.00016848836814836602,
    -1.0800821774906936e-5,
];

/// Default PMOS channel-length modulation (1/V).
pub const CHANNEL_LENGTH_MODULATION: f64 = 0.06;

/// N-channel device of the inverter (pull-down).
#[derive(Debug, Clone, Copy, Default)]
pub struct Nmos;

impl Nmos {
    /// The NMOS calibration has no free parameters.
    pub fn new() -> Self {
        Self
    }

    /// Threshold voltage at the given `vgs`.
    pub fn threshold(&self, vgs: f64) -> f64 {
        NMOS_VT[0] + NMOS_VT[1] * vgs
    }

    /// Transconductance coefficient at the given `vgs`.
    pub fn alpha(&self, vgs: f64) -> f64 {
        NMOS_ALPHA[0] + NMOS_ALPHA[1] * vgs
    }
}

impl DeviceModel for Nmos {
    fn evaluate(&self, vgs: f64, vds: f64) -> OperatingPoint {
        let vt = self.threshold(vgs);
        if vgs <= vt {
            return OperatingPoint::CUTOFF;
        }

        let alpha = self.alpha(vgs);
        let overdrive = vgs - vt;

        if vds < overdrive {
            OperatingPoint::new(
                alpha * (overdrive - 0.5 * vds) * vds,
                alpha * (overdrive - vds),
                Region::Triode,
            )
        } else {
            OperatingPoint::new(0.5 * alpha * overdrive * overdrive, 0.0, Region::Saturation)
        }
    }
}

/// P-channel device of the inverter (pull-up).
///
/// Unlike the NMOS it carries channel-length modulation `(1 - delta * vds)`.
#[derive(Debug, Clone, Copy)]
pub struct Pmos {
    /// Channel-length modulation factor (1/V)
    pub delta: f64,
}

impl Default for Pmos {
    fn default() -> Self {
        Self {
            delta: CHANNEL_LENGTH_MODULATION,
        }
    }
}

impl Pmos {
    /// PMOS with channel-length modulation factor `delta`.
    pub fn new(delta: f64) -> Self {
        Self { delta }
    }

    /// Threshold voltage at the given `vgs`.
    pub fn threshold(&self, vgs: f64) -> f64 {
        PMOS_VT[0] + PMOS_VT[1] * vgs
    }

    /// Transconductance coefficient at the given `vgs`.
    pub fn alpha(&self, vgs: f64) -> f64 {
        let [a0, a1, a2, a3] = PMOS_ALPHA;
        a0 + vgs * (a1 + vgs * (a2 + vgs * a3))
    }
}

impl DeviceModel for Pmos {
    fn evaluate(&self, vgs: f64, vds: f64) -> OperatingPoint {
        let vt = self.threshold(vgs);
        if vgs >= vt {
            return OperatingPoint::CUTOFF;
        }

        let alpha = self.alpha(vgs);
        let delta = self.delta;
        let overdrive = vgs - vt;

        if vds >= overdrive {
            let current = -alpha * (overdrive - 0.5 * vds) * vds * (1.0 - delta * vds);
            let conductance = -alpha
                * (1.5 * delta * vds * vds - (2.0 * delta * overdrive + 1.0) * vds + overdrive);
            OperatingPoint::new(current, conductance, Region::Triode)
        } else {
            let square = overdrive * overdrive;
            OperatingPoint::new(
                -0.5 * alpha * square * (1.0 - delta * vds),
                0.5 * alpha * delta * square,
                Region::Saturation,
            )
        }
    }
}
