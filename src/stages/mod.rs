//! Per-sample nonlinear circuit stages.
//!
//! Each stage turns one continuous-time circuit into a discrete-time update:
//! - [`DiodeClipperStage`]: RC low-pass into an antiparallel diode pair,
//!   solved in closed form with the Wright omega function
//! - [`AsymmetricClipperStage`]: RC low-pass into a single diode, solved with
//!   the fixed-iteration Newton solver
//! - [`CmosInverterStage`]: unbuffered CMOS inverter, Newton on the output
//!   node KCL
//! - [`TriodeWaveStage`]: common-cathode triode preamp as a wave digital
//!   filter with closed-form scattering at the tube
//! - [`BjtStage`]: memoryless NPN emitter follower, solved in closed form
//!   with the Wright omega function
//!
//! Every stage splits into immutable coefficients computed once by its
//! constructor and a small `Copy` state record. A sample is computed as
//! `(vout, next_state)` from `(coefficients, state, vin)` and then committed,
//! so nothing observable changes until the update is complete.

mod asymmetric_clipper;
mod bjt;
mod cmos;
mod diode_clipper;
mod triode;

pub use asymmetric_clipper::{
    AsymmetricClipperParams, AsymmetricClipperStage, ASYMMETRIC_ITERATIONS,
};
pub use bjt::{BjtParams, BjtStage};
pub use cmos::{CmosInverterStage, CmosParams};
pub use diode_clipper::{DiodeClipperParams, DiodeClipperStage};
pub use triode::{TriodeParams, TriodeWaveStage};

use std::fmt;

use crate::error::Result;

/// A mono audio-rate processor.
///
/// `process_sample` is total: it never fails, never allocates and costs the
/// same for every input.
pub trait Stage {
    /// Advance the circuit by one sample.
    fn process_sample(&mut self, vin: f64) -> f64;

    /// Return the history to the state the constructor produced.
    fn reset(&mut self);

    /// Sample rate the coefficients were derived for, in Hz.
    fn sample_rate(&self) -> f64;

    /// Process `min(input.len(), output.len())` samples in order.
    fn process_block(&mut self, input: &[f64], output: &mut [f64]) {
        for (out, &vin) in output.iter_mut().zip(input) {
            *out = self.process_sample(vin);
        }
    }

    /// Process a whole signal into a new buffer.
    fn process(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|&vin| self.process_sample(vin)).collect()
    }
}

/// Sign used to select the conducting diode branch. Zero counts as positive.
#[inline]
pub(crate) fn branch_sign(x: f64) -> f64 {
    if x >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// The available stage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum StageKind {
    /// Symmetric diode clipper
    Diode,
    /// Single-diode asymmetric clipper
    Asymmetric,
    /// CMOS inverter overdrive
    Cmos,
    /// Triode preamp
    Triode,
    /// BJT emitter follower
    Bjt,
}

impl StageKind {
    /// All stage kinds, in declaration order.
    pub const ALL: [StageKind; 5] = [
        StageKind::Diode,
        StageKind::Asymmetric,
        StageKind::Cmos,
        StageKind::Triode,
        StageKind::Bjt,
    ];

    /// Build a stage of this kind with its default parameters.
    ///
    /// The CMOS stage uses rails centred on 0 V so that audio-level input
    /// swings around the inverter's switching point.
    pub fn build(self, sample_rate: f64) -> Result<Box<dyn Stage>> {
        let stage: Box<dyn Stage> = match self {
            StageKind::Diode => Box::new(DiodeClipperStage::new(
                sample_rate,
                DiodeClipperParams::default(),
            )?),
            StageKind::Asymmetric => Box::new(AsymmetricClipperStage::new(
                sample_rate,
                AsymmetricClipperParams::default(),
            )?),
            StageKind::Cmos => Box::new(CmosInverterStage::new(
                sample_rate,
                CmosParams::bipolar(9.0),
            )?),
            StageKind::Triode => {
                Box::new(TriodeWaveStage::new(sample_rate, TriodeParams::default())?)
            }
            StageKind::Bjt => Box::new(BjtStage::new(sample_rate, BjtParams::default())?),
        };
        Ok(stage)
    }

    /// Name used on the command line and in log messages.
    pub fn name(self) -> &'static str {
        match self {
            StageKind::Diode => "diode",
            StageKind::Asymmetric => "asymmetric",
            StageKind::Cmos => "cmos",
            StageKind::Triode => "triode",
            StageKind::Bjt => "bjt",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OverdriveError;

    #[test]
    fn test_branch_sign_zero_is_positive() {
        assert_eq!(branch_sign(0.0), 1.0);
        assert_eq!(branch_sign(-0.0), 1.0);
        assert_eq!(branch_sign(1e-300), 1.0);
        assert_eq!(branch_sign(-1e-300), -1.0);
    }

    #[test]
    fn test_every_kind_builds() {
        for kind in StageKind::ALL {
            let mut stage = kind.build(48000.0).unwrap();
            assert_eq!(stage.sample_rate(), 48000.0);
            let y = stage.process_sample(0.5);
            assert!(y.is_finite(), "{kind} produced {y}");
        }
    }

    #[test]
    fn test_build_rejects_bad_sample_rate() {
        for kind in StageKind::ALL {
            assert!(matches!(
                kind.build(0.0),
                Err(OverdriveError::InvalidSampleRate { .. })
            ));
        }
    }

    #[test]
    fn test_block_matches_sample_by_sample() {
        let input: Vec<f64> = (0..256)
            .map(|i| 0.8 * (i as f64 * 0.05).sin())
            .collect();

        for kind in StageKind::ALL {
            let mut a = kind.build(44100.0).unwrap();
            let mut b = kind.build(44100.0).unwrap();

            let expected: Vec<f64> = input.iter().map(|&x| a.process_sample(x)).collect();
            let mut output = vec![0.0; input.len()];
            b.process_block(&input, &mut output);
            assert_eq!(output, expected, "{kind}");
        }
    }

    #[test]
    fn test_block_stops_at_shorter_buffer() {
        let mut stage = StageKind::Diode.build(48000.0).unwrap();
        let input = [0.5; 8];
        let mut output = [f64::NAN; 4];
        stage.process_block(&input, &mut output);
        assert!(output.iter().all(|y| y.is_finite()));
    }

    #[test]
    fn test_non_finite_input_does_not_panic() {
        for kind in StageKind::ALL {
            let mut stage = kind.build(48000.0).unwrap();
            stage.process(&[f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0.5]);
        }
    }

    #[test]
    fn test_reset_replays_identically() {
        let input: Vec<f64> = (0..128).map(|i| (i as f64 * 0.1).sin()).collect();
        for kind in StageKind::ALL {
            let mut stage = kind.build(48000.0).unwrap();
            let first = stage.process(&input);
            stage.reset();
            let second = stage.process(&input);
            assert_eq!(first, second, "{kind}");
        }
    }
}
