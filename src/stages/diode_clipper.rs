//! Symmetric diode clipper.
//!
//! ```text
//!  vin ──[ R ]──┬──── vout
//!               │
//!              [C] ▷|◁  antiparallel diodes
//!               │
//!              GND
//! ```
//!
//! The capacitor is discretized with the bilinear transform
//! `s -> b0 (1 - z^-1) / (1 + a1 z^-1)`, which leaves one history term `p`.
//! With only the forward-biased junction kept (`r = ±1`), the implicit
//! equation for the output,
//!
//! ```text
//! v + k3 * r * exp(r * v / Vt) = k2 * q + k3 * r,      q = vin / (RC) - p
//! ```
//!
//! is inverted exactly with the Wright omega function.

use crate::error::{require_positive, require_sample_rate, OverdriveError, Result};
use crate::math::omega;
use crate::THERMAL_VOLTAGE;

use super::{branch_sign, Stage};

const STAGE: &str = "diode_clipper";

/// Circuit values for [`DiodeClipperStage`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiodeClipperParams {
    /// Series resistance (ohms)
    pub resistance: f64,
    /// Shunt capacitance (farads)
    pub capacitance: f64,
    /// Saturation current of each diode (amperes)
    pub saturation_current: f64,
    /// Thermal voltage (volts)
    pub thermal_voltage: f64,
    /// Inputs with smaller magnitude pass through untouched
    pub bypass_threshold: f64,
}

impl Default for DiodeClipperParams {
    fn default() -> Self {
        Self {
            resistance: 2200.0,
            capacitance: 10e-9,
            saturation_current: 200e-9,
            thermal_voltage: THERMAL_VOLTAGE,
            bypass_threshold: 0.1,
        }
    }
}

impl DiodeClipperParams {
    /// Same as [`DiodeClipperParams::default`].
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

    /// Set the saturation current of each diode.
    pub fn with_saturation_current(mut self, saturation_current: f64) -> Self {
        self.saturation_current = saturation_current;
        self
    }

    /// Set the thermal voltage.
    pub fn with_thermal_voltage(mut self, thermal_voltage: f64) -> Self {
        self.thermal_voltage = thermal_voltage;
        self
    }

    /// Set the pass-through threshold. Zero disables the bypass.
    pub fn with_bypass_threshold(mut self, bypass_threshold: f64) -> Self {
        self.bypass_threshold = bypass_threshold;
        self
    }

    fn validate(&self) -> Result<()> {
        require_positive(STAGE, "resistance", self.resistance)?;
        require_positive(STAGE, "capacitance", self.capacitance)?;
        require_positive(STAGE, "saturation_current", self.saturation_current)?;
        require_positive(STAGE, "thermal_voltage", self.thermal_voltage)?;
        if !(self.bypass_threshold.is_finite() && self.bypass_threshold >= 0.0) {
            log::warn!("{STAGE}: rejecting bypass_threshold = {}", self.bypass_threshold);
            return Err(OverdriveError::invalid_parameter(
                STAGE,
                "bypass_threshold",
                format!("must be finite and non-negative, got {}", self.bypass_threshold),
            ));
        }
        Ok(())
    }
}

/// Discretization constants, fixed at construction.
#[derive(Debug, Clone, Copy)]
struct Coefficients {
    a1: f64,
    k1: f64,
    k2: f64,
    k3: f64,
    k4: f64,
    k5: f64,
    k6: f64,
    thermal_voltage: f64,
    bypass_threshold: f64,
}

impl Coefficients {
    fn derive(sample_rate: f64, params: &DiodeClipperParams) -> Self {
        let b0 = 2.0 * sample_rate;
        let b1 = -2.0 * sample_rate;
        let a1 = 1.0;

        let rc = params.resistance * params.capacitance;
        let denom = b0 * rc + 1.0;
        let k3 = params.saturation_current * params.resistance / denom;

        Self {
            a1,
            k1: 1.0 / rc,
            k2: rc / denom,
            k3,
            k4: 1.0 / params.thermal_voltage,
            k5: (k3 / params.thermal_voltage).ln(),
            k6: b1 - a1 * b0,
            thermal_voltage: params.thermal_voltage,
            bypass_threshold: params.bypass_threshold,
        }
    }
}

/// Integrator history. Zero is the quiescent (uncharged) circuit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct State {
    p: f64,
}

fn step(k: &Coefficients, state: State, vin: f64) -> (f64, State) {
    let vout = if vin.abs() < k.bypass_threshold {
        vin
    } else {
        let q = k.k1 * vin - state.p;
        let r = branch_sign(q);
        let w = k.k2 * q + k.k3 * r;
        w - k.thermal_voltage * r * omega(k.k4 * r * w + k.k5)
    };
    let p = k.k6 * vout - k.a1 * state.p;
    (vout, State { p })
}

/// Closed-form RC + antiparallel diode clipper.
#[derive(Debug, Clone)]
pub struct DiodeClipperStage {
    sample_rate: f64,
    params: DiodeClipperParams,
    coeffs: Coefficients,
    state: State,
}

impl DiodeClipperStage {
    /// Build the stage with an uncharged capacitor.
    ///
    /// Fails if the sample rate or any component value is not finite and
    /// positive.
    pub fn new(sample_rate: f64, params: DiodeClipperParams) -> Result<Self> {
        let sample_rate = require_sample_rate(sample_rate)?;
        params.validate()?;

        let coeffs = Coefficients::derive(sample_rate, &params);
        log::debug!(
            "{STAGE}: fs={sample_rate} k1={:.6e} k2={:.6e} k3={:.6e} k5={:.6} k6={:.6e}",
            coeffs.k1,
            coeffs.k2,
            coeffs.k3,
            coeffs.k5,
            coeffs.k6
        );

        Ok(Self {
            sample_rate,
            params,
            coeffs,
            state: State::default(),
        })
    }

    /// Parameters the stage was built from.
    pub fn params(&self) -> &DiodeClipperParams {
        &self.params
    }

    /// Current integrator history term.
    pub fn history(&self) -> f64 {
        self.state.p
    }
}

impl Stage for DiodeClipperStage {
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
    use crate::devices::{DeviceModel, DiodePair};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn sine(amplitude: f64, freq: f64, sample_rate: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    fn zero_crossings(signal: &[f64]) -> Vec<usize> {
        (1..signal.len())
            .filter(|&i| (signal[i - 1] < 0.0) != (signal[i] < 0.0))
            .collect()
    }

    #[test]
    fn test_history_does_not_vanish() {
        let k = Coefficients::derive(48000.0, &DiodeClipperParams::default());
        assert_eq!(k.k6, -4.0 * 48000.0);
    }

    #[test]
    fn test_silence_is_a_fixed_point() {
        let mut stage = DiodeClipperStage::new(48000.0, DiodeClipperParams::default()).unwrap();
        for _ in 0..1000 {
            assert_eq!(stage.process_sample(0.0), 0.0);
            assert_eq!(stage.history(), 0.0);
        }
    }

    #[test]
    fn test_bypass_passes_small_input_exactly() {
        let mut stage = DiodeClipperStage::new(48000.0, DiodeClipperParams::default()).unwrap();
        // Drive some history first so the bypass is not trivially at rest
        stage.process(&[0.5, 0.8, -0.3]);
        for &x in &[0.05, -0.099, 0.0, 0.0999999] {
            assert_eq!(stage.process_sample(x), x);
        }
    }

    #[test]
    fn test_bypass_still_updates_history() {
        let mut stage = DiodeClipperStage::new(48000.0, DiodeClipperParams::default()).unwrap();
        stage.process_sample(0.05);
        assert_eq!(stage.history(), -4.0 * 48000.0 * 0.05);
    }

    #[test]
    fn test_solution_satisfies_discretized_kcl() {
        let fs = 88200.0;
        let params = DiodeClipperParams::default();
        let pair = DiodePair::new(params.saturation_current, params.thermal_voltage);
        let rc = params.resistance * params.capacitance;

        let mut stage = DiodeClipperStage::new(fs, params).unwrap();
        for vin in sine(0.3, 440.0, fs, 400) {
            let p = stage.history();
            let v = stage.process_sample(vin);
            if vin.abs() < params.bypass_threshold {
                continue;
            }
            // 2fs * v - (vin - v)/(RC) + Id(v)/C + p = 0
            let residual = 2.0 * fs * v - (vin - v) / rc
                + pair.current(0.0, v) / params.capacitance
                + p;
            assert_abs_diff_eq!(residual, 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_sine_is_clipped_without_phase_shift() {
        let fs = 88200.0;
        let params = DiodeClipperParams::new()
            .with_resistance(2200.0)
            .with_capacitance(1e-8)
            .with_saturation_current(200e-9)
            .with_thermal_voltage(0.02585);
        let mut stage = DiodeClipperStage::new(fs, params).unwrap();

        let len = (5.0 / 440.0 * fs) as usize;
        let input = sine(0.3, 440.0, fs, len);
        let output = stage.process(&input);

        let peak = output.iter().fold(0.0f64, |m, y| m.max(y.abs()));
        assert!(peak < 0.3, "peak {peak}");
        assert!(peak > 0.1);

        let zin = zero_crossings(&input);
        let zout = zero_crossings(&output);
        assert_eq!(zin.len(), zout.len());
        for (a, b) in zin.iter().zip(&zout) {
            assert!(a.abs_diff(*b) <= 1, "crossing {a} vs {b}");
        }
    }

    #[test]
    fn test_large_input_stays_bounded() {
        let mut stage = DiodeClipperStage::new(88200.0, DiodeClipperParams::default()).unwrap();
        let output = stage.process(&sine(5.0, 440.0, 88200.0, 1000));
        for y in output {
            assert!(y.is_finite());
            assert!(y.abs() < 1.0);
        }
    }

    #[test]
    fn test_invalid_params_rejected() {
        let bad = DiodeClipperParams::default().with_resistance(0.0);
        assert!(matches!(
            DiodeClipperStage::new(48000.0, bad),
            Err(OverdriveError::InvalidParameter { .. })
        ));

        let bad = DiodeClipperParams::default().with_bypass_threshold(-0.1);
        assert!(DiodeClipperStage::new(48000.0, bad).is_err());

        let zero_bypass = DiodeClipperParams::default().with_bypass_threshold(0.0);
        assert!(DiodeClipperStage::new(48000.0, zero_bypass).is_ok());
    }

    #[test]
    fn test_reset_clears_history() {
        let mut stage = DiodeClipperStage::new(48000.0, DiodeClipperParams::default()).unwrap();
        stage.process(&[1.0, 0.5, -0.7]);
        assert_ne!(stage.history(), 0.0);
        stage.reset();
        assert_eq!(stage.history(), 0.0);
    }
}
