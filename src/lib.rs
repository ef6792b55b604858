//! # Overdrive Core
//!
//! Real-time nonlinear circuit stages for virtual-analog overdrive.
//!
//! Each stage models one small analog circuit (diode clippers, a CMOS
//! inverter, a triode preamp, a BJT follower) as a discrete-time system that produces one
//! output sample per input sample with a fixed amount of work. Capacitors
//! become per-sample history terms, and the implicit equation for the output
//! is either inverted in closed form or solved with a bounded number of
//! Newton updates.
//!
//! ## Architecture
//!
//! - [`math`] - the Wright omega function used to invert diode laws
//! - [`solver`] - fixed-iteration Newton-Raphson
//! - [`devices`] - stateless device models (MOSFETs, diodes, triode, BJT)
//! - [`stages`] - the circuit stages and the [`Stage`] trait
//! - [`audio`] - PCM streaming for the CLI (CLI only)
//!
//! ## Usage
//!
//! ```
//! use overdrive_core::{DiodeClipperParams, DiodeClipperStage, Stage};
//!
//! let mut stage = DiodeClipperStage::new(48000.0, DiodeClipperParams::default())?;
//! let output = stage.process(&[0.0, 0.5, 1.0, 0.5, 0.0]);
//! assert!(output.iter().all(|y| y.abs() < 1.0));
//! # Ok::<(), overdrive_core::OverdriveError>(())
//! ```
//!
//! ### Native CLI
//!
//! ```bash
//! ffmpeg -i input.wav -f f32le -ac 1 -ar 48000 - | overdrive diode | ffmpeg -f f32le -ac 1 -ar 48000 -i - output.wav
//! ```

pub mod devices;
pub mod error;
pub mod math;
pub mod solver;
pub mod stages;

#[cfg(feature = "cli")]
pub mod audio;

// Re-export main types for convenience
pub use error::{OverdriveError, Result};
pub use math::omega;
pub use solver::{FixedIterationSolver, SolverConfig};
pub use stages::{
    AsymmetricClipperParams, AsymmetricClipperStage, BjtParams, BjtStage, CmosInverterStage,
    CmosParams, DiodeClipperParams, DiodeClipperStage, Stage, StageKind, TriodeParams,
    TriodeWaveStage,
};

/// Default sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: f64 = 48000.0;

/// Thermal voltage at room temperature (approximately 26mV)
pub const THERMAL_VOLTAGE: f64 = 0.02585;
