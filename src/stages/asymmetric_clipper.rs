//! Single-diode (asymmetric) clipper.
//!
//! An RC low-pass whose output node is shunted to ground by one diode:
//!
//! ```text
//! C dv/dt = (vin - v) / R - Id(v)
//! ```
//!
//! Only the forward half-wave is limited to about one diode drop; the
//! reverse half-wave passes through the low-pass. The ODE is discretized
//! with the trapezoidal rule and the resulting scalar equation
//!
//! ```text
//! f(v) = a*v + b*Id(v) - c
//! a = 1 + T/(2RC),  b = T/(2C),  c = v[n-1] + T/2 * (vin/(RC) + g[n-1])
//! ```
//!
//! is solved by clamped Newton iteration. Because `Id` has the sign of `v`,
//! the root lies between 0 and the diode-free solution `c/a`.

use crate::devices::{DeviceModel, Diode};
use crate::error::{require_positive, require_sample_rate, OverdriveError, Result};
use crate::solver::{FixedIterationSolver, SolverConfig};
use crate::THERMAL_VOLTAGE;

use super::Stage;

const STAGE: &str = "asymmetric_clipper";

/// Newton updates per sample for this stage.
pub const ASYMMETRIC_ITERATIONS: usize = 8;

/// Circuit values for [`AsymmetricClipperStage`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsymmetricClipperParams {
    /// Series resistance (ohms)
    pub resistance: f64,
    /// Shunt capacitance (farads)
    pub capacitance: f64,
    /// Diode saturation current (amperes)
    pub saturation_current: f64,
    /// Diode ideality factor
    pub ideality: f64,
    /// Thermal voltage (volts)
    pub thermal_voltage: f64,
    /// Newton settings; iterations default to [`ASYMMETRIC_ITERATIONS`]
    pub solver: SolverConfig,
}

impl Default for AsymmetricClipperParams {
    fn default() -> Self {
        Self {
            resistance: 6650.0,
            capacitance: 220e-9,
            saturation_current: 2.5e-9,
            ideality: 1.7,
            thermal_voltage: THERMAL_VOLTAGE,
            solver: SolverConfig::default().with_iterations(ASYMMETRIC_ITERATIONS),
        }
    }
}

impl AsymmetricClipperParams {
    /// Same as [`AsymmetricClipperParams::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the series resistor, in ohms.
    pub fn with_resistance(mut self, resistance: f64) -> Self {
        self.resistance = resistance;
        self
    }

    /// Set the shunt capacitor, in farads.
    pub fn with_capacitance(mut self, capacitance: f64) -> Self {
        self.capacitance = capacitance;
        self
    }

    /// Set the diode's saturation current and ideality factor.
    pub fn with_diode(mut self, saturation_current: f64, ideality: f64) -> Self {
        self.saturation_current = saturation_current;
        self.ideality = ideality;
        self
    }

    /// Replace the Newton iteration count and damping.
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    fn validate(&self) -> Result<()> {
        require_positive(STAGE, "resistance", self.resistance)?;
        require_positive(STAGE, "capacitance", self.capacitance)?;
        require_positive(STAGE, "saturation_current", self.saturation_current)?;
        require_positive(STAGE, "ideality", self.ideality)?;
        require_positive(STAGE, "thermal_voltage", self.thermal_voltage)?;
        if self.solver.iterations == 0 {
            return Err(OverdriveError::invalid_parameter(
                STAGE,
                "iterations",
                "at least one Newton update is required",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Coefficients {
    a: f64,
    b: f64,
    half_t: f64,
    inv_rc: f64,
    inv_c: f64,
    diode: Diode,
    solver: FixedIterationSolver,
}

impl Coefficients {
    fn derive(sample_rate: f64, p: &AsymmetricClipperParams) -> Self {
        let t = 1.0 / sample_rate;
        let rc = p.resistance * p.capacitance;
        Self {
            a: 1.0 + t / (2.0 * rc),
            b: t / (2.0 * p.capacitance),
            half_t: 0.5 * t,
            inv_rc: 1.0 / rc,
            inv_c: 1.0 / p.capacitance,
            diode: Diode::new(p.saturation_current, p.ideality, p.thermal_voltage),
            solver: FixedIterationSolver::with_config(p.solver),
        }
    }
}

/// Previous output voltage and its time derivative.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct State {
    v: f64,
    g: f64,
}

fn step(k: &Coefficients, s: State, vin: f64) -> (f64, State) {
    let c = s.v + k.half_t * (vin * k.inv_rc + s.g);
    let linear = c / k.a;
    let (lo, hi) = if linear < 0.0 {
        (linear, 0.0)
    } else {
        (0.0, linear)
    };

    let v = k.solver.solve_clamped(s.v, lo, hi, |v| {
        let op = k.diode.evaluate(0.0, v);
        (k.a * v + k.b * op.current - c, k.a + k.b * op.conductance)
    });

    let id = k.diode.current(0.0, v);
    let g = (vin - v) * k.inv_rc - id * k.inv_c;
    (v, State { v, g })
}

/// RC + single diode clipper solved with bounded Newton iteration.
#[derive(Debug, Clone)]
pub struct AsymmetricClipperStage {
    sample_rate: f64,
    params: AsymmetricClipperParams,
    coeffs: Coefficients,
    state: State,
}

impl AsymmetricClipperStage {
    /// Build the stage with an uncharged capacitor.
    pub fn new(sample_rate: f64, params: AsymmetricClipperParams) -> Result<Self> {
        let sample_rate = require_sample_rate(sample_rate)?;
        params.validate()?;

        let coeffs = Coefficients::derive(sample_rate, &params);
        log::debug!(
            "{STAGE}: fs={sample_rate} a={:.9} b={:.6e} n*Vt={:.5} iterations={}",
            coeffs.a,
            coeffs.b,
            coeffs.diode.n_vt(),
            params.solver.iterations
        );

        Ok(Self {
            sample_rate,
            params,
            coeffs,
            state: State::default(),
        })
    }

    /// Parameters the stage was built from.
    pub fn params(&self) -> &AsymmetricClipperParams {
        &self.params
    }
}

impl Stage for AsymmetricClipperStage {
    #[inline]
    fn process_sample(&mut self, vin: f64) -> f64 {
        let (vout, next) = step(&self.coeffs, self.state, vin);
        self.state = next;
        vout
    }

    fn reset(&mut self) {
        self.state = State::default();
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    const FS: f64 = 44100.0;

    fn sine(amplitude: f64, freq: f64, periods: f64) -> Vec<f64> {
        let len = (periods * FS / freq) as usize;
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / FS).sin())
            .collect()
    }

    fn extremes(signal: &[f64]) -> (f64, f64) {
        signal
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), &y| (lo.min(y), hi.max(y)))
    }

    #[test]
    fn test_forward_half_wave_is_clipped() {
        let mut stage = AsymmetricClipperStage::new(FS, AsymmetricClipperParams::default()).unwrap();
        let output = stage.process(&sine(10.0, 120.0, 3.0));
        let (lo, hi) = extremes(&output);

        // Forward side stops around one diode drop
        assert!(hi > 0.4 && hi < 0.8, "positive peak {hi}");
        // Reverse side only sees the low-pass
        assert!(lo < -5.0, "negative peak {lo}");
    }

    #[test]
    fn test_small_signal_is_nearly_linear() {
        let mut stage = AsymmetricClipperStage::new(FS, AsymmetricClipperParams::default()).unwrap();
        let output = stage.process(&sine(0.1, 120.0, 3.0));
        let (lo, hi) = extremes(&output);
        assert!(hi < 0.1 && lo > -0.1);
        assert!(hi > 0.05 && lo < -0.05);
    }

    #[test]
    fn test_solution_satisfies_trapezoidal_step() {
        let params = AsymmetricClipperParams::default();
        let mut stage = AsymmetricClipperStage::new(FS, params).unwrap();
        let k = stage.coeffs;

        for vin in sine(10.0, 120.0, 1.0) {
            let prev = stage.state;
            let v = stage.process_sample(vin);
            let c = prev.v + k.half_t * (vin * k.inv_rc + prev.g);
            let residual = k.a * v + k.b * k.diode.current(0.0, v) - c;
            assert_abs_diff_eq!(residual, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_silence_is_a_fixed_point() {
        let mut stage = AsymmetricClipperStage::new(FS, AsymmetricClipperParams::default()).unwrap();
        for _ in 0..100 {
            assert_eq!(stage.process_sample(0.0), 0.0);
        }
    }

    #[test]
    fn test_invalid_params_rejected() {
        let bad = AsymmetricClipperParams::default().with_diode(2.5e-9, 0.0);
        assert!(matches!(
            AsymmetricClipperStage::new(FS, bad),
            Err(OverdriveError::InvalidParameter { .. })
        ));
        assert!(AsymmetricClipperStage::new(-1.0, AsymmetricClipperParams::default()).is_err());
    }
}
