//! NPN emitter follower.
//!
//! The base is driven by the input riding on a bias of half the supply, the
//! collector sits on the supply `Vp` and the emitter drives `Re` to ground.
//! With the emitter voltage `ve = Re * Ie` the Ebers-Moll law of
//! [`Bjt`](crate::devices::Bjt) has the closed-form solution
//!
//! ```text
//! vx = Is * Re * (exp((vb - Vp) / Vt) + 1/βf)
//! ve = Vt * omega((vb + vx) / Vt + ln(Is * Re / Vt * (1 + 1/βf))) - vx
//! ```
//!
//! Once the base reaches the supply the collector junction is forward biased
//! and the follower saturates; the output is then held at its value for
//! `vb = Vp`, which makes the transfer curve continuous there. The output is
//! referred back to the bias, so silence maps to the small negative offset
//! of the base-emitter drop. The stage has no memory.

use crate::error::{require_positive, require_sample_rate, Result};
use crate::math::omega;
use crate::THERMAL_VOLTAGE;

use super::Stage;

const STAGE: &str = "bjt";

/// Transistor and circuit values for [`BjtStage`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BjtParams {
    /// Collector supply Vp, in volts
    pub supply: f64,
    /// Emitter resistor Re, in ohms
    pub emitter_resistance: f64,
    /// Transport saturation current Is, in amperes
    pub saturation_current: f64,
    /// Forward current gain βf
    pub beta_f: f64,
    /// Thermal voltage Vt, in volts
    pub thermal_voltage: f64,
}

impl Default for BjtParams {
    fn default() -> Self {
        Self {
            supply: 9.0,
            emitter_resistance: 1000.0,
            saturation_current: 0.1e-15,
            beta_f: 100.0,
            thermal_voltage: THERMAL_VOLTAGE,
        }
    }
}

impl BjtParams {
    /// Same as [`BjtParams::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the collector supply.
    pub fn with_supply(mut self, supply: f64) -> Self {
        self.supply = supply;
        self
    }

    /// Replace the emitter resistor.
    pub fn with_emitter_resistance(mut self, resistance: f64) -> Self {
        self.emitter_resistance = resistance;
        self
    }

    /// Replace the transistor's Ebers-Moll parameters.
    pub fn with_transistor(mut self, saturation_current: f64, beta_f: f64) -> Self {
        self.saturation_current = saturation_current;
        self.beta_f = beta_f;
        self
    }

    fn validate(&self) -> Result<()> {
        require_positive(STAGE, "supply", self.supply)?;
        require_positive(STAGE, "emitter_resistance", self.emitter_resistance)?;
        require_positive(STAGE, "saturation_current", self.saturation_current)?;
        require_positive(STAGE, "beta_f", self.beta_f)?;
        require_positive(STAGE, "thermal_voltage", self.thermal_voltage)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Coefficients {
    supply: f64,
    vt: f64,
    is_re: f64,
    inv_beta: f64,
    /// `ln(Is * Re / Vt * (1 + 1/βf))`
    k: f64,
    /// Base bias, half the supply
    vref: f64,
    /// Output once the base reaches the supply
    saturated: f64,
}

impl Coefficients {
    fn derive(p: &BjtParams) -> Self {
        let vt = p.thermal_voltage;
        let is_re = p.saturation_current * p.emitter_resistance;
        let inv_beta = 1.0 / p.beta_f;
        let k = (is_re / vt * (1.0 + inv_beta)).ln();
        let vref = 0.5 * p.supply;

        let vx_sat = is_re * (1.0 + inv_beta);
        let saturated = vt * omega((p.supply + vx_sat) / vt + k) - vx_sat - vref;

        Self {
            supply: p.supply,
            vt,
            is_re,
            inv_beta,
            k,
            vref,
            saturated,
        }
    }
}

#[inline]
fn step(k: &Coefficients, vin: f64) -> f64 {
    let vb = vin + k.vref;
    if vb >= k.supply {
        return k.saturated;
    }
    let vx = k.is_re * (((vb - k.supply) / k.vt).exp() + k.inv_beta);
    k.vt * omega((vb + vx) / k.vt + k.k) - vx - k.vref
}

/// Closed-form emitter follower stage.
#[derive(Debug, Clone)]
pub struct BjtStage {
    sample_rate: f64,
    params: BjtParams,
    coeffs: Coefficients,
}

impl BjtStage {
    /// Build the stage. Fails if the sample rate or a parameter is not finite
    /// and positive.
    pub fn new(sample_rate: f64, params: BjtParams) -> Result<Self> {
        let sample_rate = require_sample_rate(sample_rate)?;
        params.validate()?;

        let coeffs = Coefficients::derive(&params);
        log::debug!(
            "{STAGE}: fs={sample_rate} k={:.6} vref={} saturated={:.6}",
            coeffs.k,
            coeffs.vref,
            coeffs.saturated
        );

        Ok(Self {
            sample_rate,
            params,
            coeffs,
        })
    }

    /// Parameters the stage was built from.
    pub fn params(&self) -> &BjtParams {
        &self.params
    }

    /// Output level the follower clips to once the base reaches the supply.
    pub fn saturation_level(&self) -> f64 {
        self.coeffs.saturated
    }
}

impl Stage for BjtStage {
    #[inline]
    fn process_sample(&mut self, vin: f64) -> f64 {
        step(&self.coeffs, vin)
    }

    fn reset(&mut self) {}

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}
