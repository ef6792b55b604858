//! Unbuffered CMOS inverter used as an overdrive stage.
//!
//! The gate of both transistors is driven by the input; the output node sits
//! between the PMOS (to `vdd`) and the NMOS (to `vss`). With no load on the
//! output, KCL at that node reduces to
//!
//! ```text
//! f(v) = In(vin - vss, v - vss) + Ip(vin - vdd, v - vdd) = 0
//! ```
//!
//! which is solved every sample by a fixed number of clamped Newton updates
//! seeded with the previous output.

use crate::devices::{DeviceModel, Nmos, Pmos, CHANNEL_LENGTH_MODULATION};
use crate::error::{require_sample_rate, OverdriveError, Result};
use crate::solver::{FixedIterationSolver, SolverConfig};

use super::Stage;

const STAGE: &str = "cmos";

/// Supply rails and solver settings for [`CmosInverterStage`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CmosParams {
    /// Positive rail (volts)
    pub vdd: f64,
    /// Negative rail (volts)
    pub vss: f64,
    /// PMOS channel-length modulation (1/V)
    pub delta: f64,
    /// Newton settings for the output node
    pub solver: SolverConfig,
}

impl Default for CmosParams {
    fn default() -> Self {
        Self {
            vdd: 9.0,
            vss: 0.0,
            delta: CHANNEL_LENGTH_MODULATION,
            solver: SolverConfig::default(),
        }
    }
}

impl CmosParams {
    /// Same as [`CmosParams::default`]: a 0 V to 9 V supply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rails at `±span/2`, so a signal centred on 0 V drives the inverter
    /// around mid-supply.
    pub fn bipolar(span: f64) -> Self {
        Self::default().with_rails(0.5 * span, -0.5 * span)
    }

    /// Set the supply rails. `vdd` must be above `vss`.
    pub fn with_rails(mut self, vdd: f64, vss: f64) -> Self {
        self.vdd = vdd;
        self.vss = vss;
        self
    }

    /// Set the PMOS channel-length modulation factor.
    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    /// Replace the Newton iteration count and damping.
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Midpoint between the rails, used as the initial output.
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.vdd + self.vss)
    }

    fn validate(&self) -> Result<()> {
        if !(self.vdd.is_finite() && self.vss.is_finite() && self.vdd > self.vss) {
            log::warn!("{STAGE}: rejecting rails vdd={} vss={}", self.vdd, self.vss);
            return Err(OverdriveError::invalid_parameter(
                STAGE,
                "vdd",
                format!("must be finite and above vss ({}), got {}", self.vss, self.vdd),
            ));
        }
        if !(self.delta.is_finite() && self.delta >= 0.0) {
            log::warn!("{STAGE}: rejecting delta = {}", self.delta);
            return Err(OverdriveError::invalid_parameter(
                STAGE,
                "delta",
                format!("must be finite and non-negative, got {}", self.delta),
            ));
        }
        if self.solver.iterations == 0 {
            return Err(OverdriveError::invalid_parameter(
                STAGE,
                "iterations",
                "at least one Newton update is required",
            ));
        }
        if !(self.solver.epsilon.is_finite() && self.solver.epsilon >= 0.0) {
            return Err(OverdriveError::invalid_parameter(
                STAGE,
                "epsilon",
                format!("must be finite and non-negative, got {}", self.solver.epsilon),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Circuit {
    nmos: Nmos,
    pmos: Pmos,
    vdd: f64,
    vss: f64,
    solver: FixedIterationSolver,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct State {
    vout: f64,
}

fn step(c: &Circuit, state: State, vin: f64) -> (f64, State) {
    let vgs_n = vin - c.vss;
    let vgs_p = vin - c.vdd;

    let vout = c.solver.solve_clamped(state.vout, c.vss, c.vdd, |v| {
        let n = c.nmos.evaluate(vgs_n, v - c.vss);
        let p = c.pmos.evaluate(vgs_p, v - c.vdd);
        (n.current + p.current, n.conductance + p.conductance)
    });

    (vout, State { vout })
}

/// CMOS inverter stage solved with bounded Newton iteration.
#[derive(Debug, Clone)]
pub struct CmosInverterStage {
    sample_rate: f64,
    params: CmosParams,
    circuit: Circuit,
    state: State,
}

impl CmosInverterStage {
    /// The circuit has no reactive parts, so the sample rate is only
    /// validated and reported back.
    pub fn new(sample_rate: f64, params: CmosParams) -> Result<Self> {
        let sample_rate = require_sample_rate(sample_rate)?;
        params.validate()?;

        log::debug!(
            "{STAGE}: fs={sample_rate} vdd={} vss={} delta={} iterations={}",
            params.vdd,
            params.vss,
            params.delta,
            params.solver.iterations
        );

        Ok(Self {
            sample_rate,
            params,
            circuit: Circuit {
                nmos: Nmos::new(),
                pmos: Pmos::new(params.delta),
                vdd: params.vdd,
                vss: params.vss,
                solver: FixedIterationSolver::with_config(params.solver),
            },
            state: State {
                vout: params.midpoint(),
            },
        })
    }

    /// Parameters the stage was built from.
    pub fn params(&self) -> &CmosParams {
        &self.params
    }

    /// Output of the last processed sample (the next Newton seed).
    pub fn last_output(&self) -> f64 {
        self.state.vout
    }
}

impl Stage for CmosInverterStage {
    #[inline]
    fn process_sample(&mut self, vin: f64) -> f64 {
        let (vout, next) = step(&self.circuit, self.state, vin);
        self.state = next;
        vout
    }

    fn reset(&mut self) {
        self.state = State {
            vout: self.params.midpoint(),
        };
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}
